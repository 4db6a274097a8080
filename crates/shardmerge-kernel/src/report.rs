//! Plain-text summary of a validation result.

use crate::validate::{MergeValidationResult, ShardValidationResult};
use std::fmt::Write;

const GLYPH_VALID: &str = "✓";
const GLYPH_WARNINGS: &str = "⚠";
const GLYPH_INVALID: &str = "✗";

/// Render `validation` as a deterministic multi-line report.
pub fn render_summary(validation: &MergeValidationResult) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "shardmerge summary");
    let _ = writeln!(
        out,
        "  Overall coverage: {:.1}%",
        validation.overall_coverage * 100.0
    );
    let _ = writeln!(
        out,
        "  Valid: {}",
        if validation.is_valid { "yes" } else { "no" }
    );
    let _ = writeln!(out, "  Conflicts: {}", validation.conflicts.len());

    let _ = writeln!(out, "  Shards:");
    for result in &validation.shard_results {
        let _ = writeln!(
            out,
            "    {} {} ({}%)",
            glyph(result),
            result.shard_id,
            (result.coverage * 100.0).round() as i64
        );
        for error in &result.errors {
            let _ = writeln!(out, "      error: {error}");
        }
        for warning in &result.warnings {
            let _ = writeln!(out, "      warning: {warning}");
        }
    }

    if !validation.conflicts.is_empty() {
        let _ = writeln!(out, "  Conflict paths:");
        for conflict in &validation.conflicts {
            let _ = writeln!(
                out,
                "    {}: {} vs {}",
                conflict.path, conflict.shard_a, conflict.shard_b
            );
        }
    }
    out
}

fn glyph(result: &ShardValidationResult) -> &'static str {
    if !result.is_valid {
        GLYPH_INVALID
    } else if result.warnings.is_empty() {
        GLYPH_VALID
    } else {
        GLYPH_WARNINGS
    }
}
