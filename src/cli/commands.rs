//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

use crate::cli::output::{
    OutputFormat, format_health, format_queries, format_segmentation, format_strategies,
};
use crate::cli::parser::{Cli, Commands, SegmentArgs};
use crate::core::ChunkingOptions;
use crate::core::language::normalize_language;
use crate::error::{CommandError, Result};
use crate::io::read_source;
use crate::splitter::Splitter;
use crate::syntax::{QueryRegistry, QueryType};
use std::io::{self, Read};

/// Executes the CLI command.
///
/// # Arguments
///
/// * `cli` - Parsed CLI arguments.
///
/// # Returns
///
/// Result with output string on success.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Segment(args) => cmd_segment(args, format),
        Commands::Strategies => cmd_strategies(format),
        Commands::Health => cmd_health(format),
        Commands::Queries {
            language,
            query_type,
        } => cmd_queries(language, query_type.as_deref(), format),
    }
}

fn cmd_segment(args: &SegmentArgs, format: OutputFormat) -> Result<String> {
    let language = args.resolve_language()?;
    let patch = args.options_patch()?;
    let options = ChunkingOptions::default().merged(&patch);

    let (content, source) = if args.file.as_os_str() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        (buffer, "<stdin>".to_string())
    } else {
        (read_source(&args.file)?, args.file.display().to_string())
    };

    tracing::debug!(
        source = %source,
        language = %language,
        bytes = content.len(),
        "segmenting"
    );

    let splitter = Splitter::new(options)?;
    let file_path = (source != "<stdin>").then_some(source.as_str());
    let outcome = splitter.segment(&content, file_path, Some(language.as_str()), None)?;

    Ok(format_segmentation(
        &outcome,
        &source,
        &language,
        args.preview,
        format,
    ))
}

fn cmd_strategies(format: OutputFormat) -> Result<String> {
    let splitter = Splitter::new(ChunkingOptions::default())?;
    Ok(format_strategies(&splitter.available_strategies(), format))
}

fn cmd_health(format: OutputFormat) -> Result<String> {
    let splitter = Splitter::new(ChunkingOptions::default())?;
    let report = splitter.health_check();
    if !report.is_healthy {
        tracing::warn!(issues = ?report.issues, "health check reported issues");
    }
    Ok(format_health(&report, format))
}

fn cmd_queries(language: &str, query_type: Option<&str>, format: OutputFormat) -> Result<String> {
    let language = normalize_language(language);
    let registry = QueryRegistry::new();
    if !registry.supports(&language) {
        return Err(CommandError::UnsupportedLanguage(language).into());
    }

    let types = match query_type {
        Some(name) => vec![QueryType::parse(name).ok_or_else(|| {
            CommandError::InvalidArgument(format!(
                "unknown query type: {name} (expected functions, classes or imports)"
            ))
        })?],
        None => QueryType::ALL.to_vec(),
    };

    let mut patterns = Vec::with_capacity(types.len());
    for query_type in types {
        // Only list patterns that compile against the bundled grammar.
        if registry.get(&language, query_type)?.is_none() {
            continue;
        }
        if let Some(pattern) = registry.pattern(&language, query_type) {
            patterns.push((query_type, pattern));
        }
    }

    Ok(format_queries(&language, &patterns, format))
}
