//! Output formatting for CLI commands.
//!
//! Supports text and JSON output formats.

use crate::core::Chunk;
use crate::error::Error;
use crate::selection::StrategyInfo;
use crate::splitter::{CacheSummary, HealthReport, SegmentationOutcome};
use crate::syntax::QueryType;
use serde::Serialize;
use std::fmt::Write;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output.
    Json,
}

impl OutputFormat {
    /// Parses format from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Formats a segmentation result.
#[must_use]
pub fn format_segmentation(
    outcome: &SegmentationOutcome,
    source: &str,
    language: &str,
    preview_len: usize,
    format: OutputFormat,
) -> String {
    match format {
        OutputFormat::Text => format_segmentation_text(outcome, source, language, preview_len),
        OutputFormat::Json => {
            #[derive(Serialize)]
            #[serde(rename_all = "camelCase")]
            struct SegmentOutput<'a> {
                source: &'a str,
                language: &'a str,
                #[serde(flatten)]
                outcome: &'a SegmentationOutcome,
            }
            format_json(&SegmentOutput {
                source,
                language,
                outcome,
            })
        }
    }
}

fn format_segmentation_text(
    outcome: &SegmentationOutcome,
    source: &str,
    language: &str,
    preview_len: usize,
) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "{source} ({language}): {} chunks via {}",
        outcome.chunks.len(),
        outcome.strategy
    );
    if let Some(reason) = outcome.fallback_reason {
        let _ = writeln!(output, "Fallback: {reason}");
    }
    output.push('\n');

    let _ = writeln!(
        output,
        "{:<6} {:<13} {:<10} {:<10} {:<20} Preview",
        "Index", "Lines", "Size", "Type", "Name"
    );
    output.push_str(&"-".repeat(80));
    output.push('\n');

    for (i, chunk) in outcome.chunks.iter().enumerate() {
        let lines = format!("{}-{}", chunk.start_line(), chunk.end_line());
        let preview = chunk.preview(preview_len).replace('\n', "\\n");
        let _ = writeln!(
            output,
            "{:<6} {:<13} {:<10} {:<10} {:<20} {}",
            i,
            lines,
            format_size(chunk.size()),
            chunk.chunk_type().as_str(),
            truncate(chunk_name(chunk), 20),
            preview
        );
    }

    output
}

fn chunk_name(chunk: &Chunk) -> &str {
    let meta = &chunk.metadata;
    meta.function_name
        .as_deref()
        .or(meta.class_name.as_deref())
        .or(meta.section.as_deref())
        .unwrap_or("-")
}

/// Formats the strategy list.
#[must_use]
pub fn format_strategies(strategies: &[StrategyInfo], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = String::new();
            let _ = writeln!(output, "{:<17} {:<9} Description", "Strategy", "Priority");
            output.push_str(&"-".repeat(70));
            output.push('\n');
            for info in strategies {
                let _ = writeln!(
                    output,
                    "{:<17} {:<9} {}",
                    info.name, info.priority, info.description
                );
            }
            output
        }
        OutputFormat::Json => format_json(&strategies),
    }
}

/// Formats a health report.
#[must_use]
pub fn format_health(report: &HealthReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_health_text(report),
        OutputFormat::Json => format_json(report),
    }
}

fn format_health_text(report: &HealthReport) -> String {
    let c = &report.components;
    let mut output = String::new();
    output.push_str("codesplit health\n");
    output.push_str("================\n\n");
    let _ = writeln!(
        output,
        "  Status:        {}",
        if report.is_healthy { "healthy" } else { "unhealthy" }
    );
    let names: Vec<&str> = c.strategies.iter().map(|s| s.name).collect();
    let _ = writeln!(output, "  Strategies:    {}", names.join(", "));
    let _ = writeln!(output, "  Pipeline:      {}", c.pipeline.join(" -> "));
    let _ = writeln!(
        output,
        "  Protection:    {} ({:?})",
        if c.protection.enable_protection { "on" } else { "off" },
        c.protection.protection_level
    );
    let bytes = |b: u64| format_size(usize::try_from(b).unwrap_or(usize::MAX));
    let current = c.memory.current.map_or_else(|| "unknown".to_string(), bytes);
    let limit = bytes(c.memory.limit);
    let _ = writeln!(
        output,
        "  Memory:        {current} of {limit}, {}",
        c.memory.trend.as_str()
    );
    let _ = writeln!(
        output,
        "  Errors:        {}/{}{}",
        c.error_threshold.error_count,
        c.error_threshold.max_errors,
        if c.error_threshold.fallback_active {
            " (fallback active)"
        } else {
            ""
        }
    );
    let _ = writeln!(output, "  Selection:     {}", cache_line(&c.selection_cache));
    if let Some(parse) = &c.parse_cache {
        let _ = writeln!(output, "  Parse cache:   {}", cache_line(parse));
    }
    let _ = writeln!(output, "  Queries:       {} compiled", c.compiled_queries);
    let _ = writeln!(output, "  Cleanup:       {}", c.cleanup_strategies.join(", "));

    if !report.issues.is_empty() {
        output.push_str("\nIssues:\n");
        for issue in &report.issues {
            let _ = writeln!(output, "  - {issue}");
        }
    }
    output
}

fn cache_line(cache: &CacheSummary) -> String {
    format!(
        "{}/{} entries, {} hits, {} misses",
        cache.entries, cache.capacity, cache.hits, cache.misses
    )
}

/// Formats query patterns for a language.
#[must_use]
pub fn format_queries(
    language: &str,
    patterns: &[(QueryType, &'static str)],
    format: OutputFormat,
) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = String::new();
            for (query_type, pattern) in patterns {
                let _ = writeln!(output, ";; {language} {query_type}");
                output.push_str(pattern.trim_end());
                output.push_str("\n\n");
            }
            output
        }
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct QueryOutput<'a> {
                language: &'a str,
                #[serde(rename = "type")]
                query_type: &'static str,
                pattern: &'static str,
            }
            let entries: Vec<QueryOutput<'_>> = patterns
                .iter()
                .map(|&(query_type, pattern)| QueryOutput {
                    language,
                    query_type: query_type.as_str(),
                    pattern,
                })
                .collect();
            format_json(&entries)
        }
    }
}

/// Formats an error for output.
#[must_use]
pub fn format_error(err: &Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => err.to_string(),
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct ErrorOutput {
                error: String,
                kind: &'static str,
            }
            let kind = match err {
                Error::Segmentation(_) => "segmentation",
                Error::Config(_) => "config",
                Error::Io(_) => "io",
                Error::Command(_) => "command",
            };
            format_json(&ErrorOutput {
                error: err.to_string(),
                kind,
            })
        }
    }
}

/// Formats a value as JSON.
#[must_use]
pub fn format_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
}

/// Formats a byte size for display.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;
    const GB: usize = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Truncates a string to a maximum length, ending on a char boundary.
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s[..crate::io::find_char_boundary(s, max_len)].to_string()
    } else {
        let end = crate::io::find_char_boundary(s, max_len - 3);
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ChunkMetadata, ChunkType};
    use crate::error::CommandError;
    use crate::selection::FallbackReason;

    fn outcome() -> SegmentationOutcome {
        let mut meta = ChunkMetadata::new(1, 3, "rust", ChunkType::Function);
        meta.function_name = Some("main".to_string());
        SegmentationOutcome {
            chunks: vec![Chunk::new("fn main() {\n    run();\n}".to_string(), meta)],
            strategy: "standardization".to_string(),
            fallback_reason: Some(FallbackReason::StrategyDeclined),
        }
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::parse("json"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("text"), OutputFormat::Text);
        assert_eq!(OutputFormat::parse("unknown"), OutputFormat::Text);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1_048_576), "1.00 MB");
        assert_eq!(format_size(1_073_741_824), "1.00 GB");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 8), "hello...");
        assert_eq!(truncate("hi", 2), "hi");
        assert_eq!(truncate("héllo wörld", 6), "hé...");
    }

    #[test]
    fn test_format_segmentation_text() {
        let text = format_segmentation(&outcome(), "main.rs", "rust", 12, OutputFormat::Text);
        assert!(text.starts_with("main.rs (rust): 1 chunks via standardization"));
        assert!(text.contains("Fallback: strategy_declined"));
        assert!(text.contains("1-3"));
        assert!(text.contains("main"));
        assert!(text.contains("fn main() {\\n"));
    }

    #[test]
    fn test_format_segmentation_json() {
        let json = format_segmentation(&outcome(), "main.rs", "rust", 12, OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["source"], "main.rs");
        assert_eq!(value["strategy"], "standardization");
        assert_eq!(value["fallbackReason"], "strategy_declined");
        assert_eq!(value["chunks"][0]["metadata"]["startLine"], 1);
        assert_eq!(value["chunks"][0]["metadata"]["functionName"], "main");
    }

    #[test]
    fn test_format_queries_text() {
        let text = format_queries(
            "rust",
            &[(QueryType::Imports, "(use_declaration) @import\n")],
            OutputFormat::Text,
        );
        assert!(text.starts_with(";; rust imports\n(use_declaration) @import"));
    }

    #[test]
    fn test_format_error() {
        let err: Error = CommandError::UnknownLanguage("Makefile".to_string()).into();
        let text = format_error(&err, OutputFormat::Text);
        assert!(text.contains("Makefile"));

        let json = format_error(&err, OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["kind"], "command");
        assert!(value["error"].as_str().unwrap().contains("--language"));
    }
}
