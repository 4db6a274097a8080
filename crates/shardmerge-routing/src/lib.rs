pub mod registry;
pub mod table;

pub use registry::{RoutingRegistry, ShardId, ShardRoutingConfig, default_routing_registry};
pub use table::{RoutingIssue, failure_class, parse_routing_table};
