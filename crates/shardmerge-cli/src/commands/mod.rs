pub mod merge;
pub mod routing;
pub mod validate;
