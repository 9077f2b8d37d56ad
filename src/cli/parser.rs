//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use crate::core::{ChunkingOptionsPatch, ProtectionLevel};
use crate::error::{CommandError, Result};
use crate::io::read_source;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

/// codesplit: content-aware segmentation of code and documents.
///
/// Splits a file into chunks using markdown, syntax-tree, bracket or line
/// strategies and prints them with their metadata.
#[derive(Parser, Debug)]
#[command(name = "codesplit")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    ///
    /// `RUST_LOG` takes precedence when set.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Segment a file into chunks.
    Segment(SegmentArgs),

    /// List registered strategies in priority order.
    Strategies,

    /// Run a health check on a default splitter.
    Health,

    /// Print the syntax query patterns for a language.
    Queries {
        /// Language name (rust, python, javascript, go).
        language: String,

        /// Restrict output to one query type (functions, classes, imports).
        #[arg(short = 't', long)]
        query_type: Option<String>,
    },
}

/// Protection level accepted on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionArg {
    /// No memory checks.
    Low,
    /// Memory checked on each request.
    Medium,
    /// Memory checked on each request and by a background monitor.
    High,
}

impl From<ProtectionArg> for ProtectionLevel {
    fn from(arg: ProtectionArg) -> Self {
        match arg {
            ProtectionArg::Low => Self::Low,
            ProtectionArg::Medium => Self::Medium,
            ProtectionArg::High => Self::High,
        }
    }
}

/// Arguments for `segment`.
#[derive(Args, Debug, Clone)]
pub struct SegmentArgs {
    /// File to segment (`-` reads standard input).
    pub file: PathBuf,

    /// Language of the content. Detected from the file extension if omitted.
    #[arg(short, long)]
    pub language: Option<String>,

    /// Preferred strategy (markdown, standardization, bracket, line, auto).
    #[arg(short, long)]
    pub strategy: Option<String>,

    /// JSON file with option overrides. Flags take precedence.
    #[arg(short, long, env = "CODESPLIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Maximum chunk size in bytes.
    #[arg(long)]
    pub max_chunk_size: Option<usize>,

    /// Maximum lines per chunk.
    #[arg(long)]
    pub max_lines: Option<usize>,

    /// Overlap carried into each chunk, in bytes. Zero disables overlap.
    #[arg(long)]
    pub overlap: Option<usize>,

    /// Chunks below this size are merged or dropped.
    #[arg(long)]
    pub min_chunk_size: Option<usize>,

    /// Disable the small-chunk filter.
    #[arg(long)]
    pub no_filter: bool,

    /// Disable chunk rebalancing.
    #[arg(long)]
    pub no_rebalance: bool,

    /// Surface parser failures instead of falling back.
    #[arg(long)]
    pub strict: bool,

    /// Resource protection level.
    #[arg(long, value_enum)]
    pub protection: Option<ProtectionArg>,

    /// Preview length for text output.
    #[arg(long, default_value = "60")]
    pub preview: usize,
}

impl SegmentArgs {
    /// Builds the options patch: the config file first, then flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed.
    pub fn options_patch(&self) -> Result<ChunkingOptionsPatch> {
        let mut patch = match &self.config {
            Some(path) => ChunkingOptionsPatch::from_json(&read_source(path)?)?,
            None => ChunkingOptionsPatch::default(),
        };

        if self.max_chunk_size.is_some() {
            patch.max_chunk_size = self.max_chunk_size;
        }
        if self.max_lines.is_some() {
            patch.max_lines_per_chunk = self.max_lines;
        }
        if self.overlap.is_some() {
            patch.overlap_size = self.overlap;
        }
        if self.min_chunk_size.is_some() {
            patch.min_chunk_size = self.min_chunk_size;
        }
        if self.no_filter {
            patch.enable_small_chunk_filter = Some(false);
        }
        if self.no_rebalance {
            patch.enable_chunk_rebalancing = Some(false);
        }
        if self.strict {
            patch.standardization_fallback = Some(false);
        }
        if let Some(level) = self.protection {
            patch.protection_level = Some(level.into());
        }
        if let Some(strategy) = &self.strategy {
            patch.preferred_strategy = Some(strategy.clone());
        }
        Ok(patch)
    }

    /// Resolves the language from `--language` or the file extension.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::UnknownLanguage`] when neither yields a
    /// language.
    pub fn resolve_language(&self) -> Result<String> {
        if let Some(language) = &self.language {
            return Ok(language.clone());
        }
        language_for_path(&self.file)
            .map(str::to_string)
            .ok_or_else(|| CommandError::UnknownLanguage(self.file.display().to_string()).into())
    }
}

/// Maps a file extension to a language name.
#[must_use]
pub fn language_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    let language = match ext.as_str() {
        "rs" => "rust",
        "py" | "pyi" => "python",
        "js" | "mjs" | "cjs" | "jsx" => "javascript",
        "ts" | "mts" | "cts" => "typescript",
        "tsx" => "tsx",
        "go" => "go",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "scala" => "scala",
        "c" | "h" => "c",
        "cc" | "cpp" | "cxx" | "hpp" | "hh" | "hxx" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "lua" => "lua",
        "sh" | "bash" | "zsh" => "shell",
        "sql" => "sql",
        "html" | "htm" => "html",
        "xml" | "xsd" | "svg" => "xml",
        "vue" => "vue",
        "css" => "css",
        "scss" => "scss",
        "md" | "markdown" => "markdown",
        "mdx" => "mdx",
        "txt" | "text" | "log" => "text",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        _ => return None,
    };
    Some(language)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use test_case::test_case;

    #[test]
    fn test_cli_parse() {
        Cli::command().debug_assert();
    }

    #[test_case("src/main.rs", Some("rust"))]
    #[test_case("README.md", Some("markdown"))]
    #[test_case("pkg/server.GO", Some("go"))]
    #[test_case("index.html", Some("html"))]
    #[test_case("notes.txt", Some("text"))]
    #[test_case("Makefile", None)]
    #[test_case("archive.tar.zst", None)]
    fn test_language_for_path(path: &str, expected: Option<&str>) {
        assert_eq!(language_for_path(Path::new(path)), expected);
    }

    #[test]
    fn test_segment_flags_override_defaults() {
        let cli = Cli::parse_from([
            "codesplit",
            "segment",
            "lib.rs",
            "--max-chunk-size",
            "500",
            "--overlap",
            "0",
            "--strategy",
            "bracket",
            "--protection",
            "low",
            "--no-filter",
        ]);
        let Commands::Segment(args) = cli.command else {
            unreachable!("expected segment");
        };
        let patch = args.options_patch().unwrap();
        assert_eq!(patch.max_chunk_size, Some(500));
        assert_eq!(patch.overlap_size, Some(0));
        assert_eq!(patch.preferred_strategy.as_deref(), Some("bracket"));
        assert_eq!(patch.protection_level, Some(ProtectionLevel::Low));
        assert_eq!(patch.enable_small_chunk_filter, Some(false));
        assert_eq!(patch.enable_chunk_rebalancing, None);
        assert_eq!(args.resolve_language().unwrap(), "rust");
    }

    #[test]
    fn test_config_file_then_flags() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("opts.json");
        std::fs::write(&config, r#"{"max_chunk_size": 800, "overlap_size": 50}"#).unwrap();

        let cli = Cli::parse_from([
            "codesplit",
            "segment",
            "notes",
            "--config",
            config.to_str().unwrap(),
            "--overlap",
            "10",
            "--language",
            "text",
        ]);
        let Commands::Segment(args) = cli.command else {
            unreachable!("expected segment");
        };
        let patch = args.options_patch().unwrap();
        assert_eq!(patch.max_chunk_size, Some(800));
        assert_eq!(patch.overlap_size, Some(10));
        assert_eq!(args.resolve_language().unwrap(), "text");
    }

    #[test]
    fn test_unknown_extension_requires_language() {
        let cli = Cli::parse_from(["codesplit", "segment", "Dockerfile"]);
        let Commands::Segment(args) = cli.command else {
            unreachable!("expected segment");
        };
        assert!(args.resolve_language().is_err());
    }

    #[test]
    fn test_verbose_counts() {
        let cli = Cli::parse_from(["codesplit", "-vv", "strategies"]);
        assert_eq!(cli.verbose, 2);
    }
}
