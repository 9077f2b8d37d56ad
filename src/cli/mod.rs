//! CLI layer for codesplit.
//!
//! Provides the command-line interface using clap, with commands for
//! segmenting files and inspecting strategies, health and syntax queries.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands, SegmentArgs, language_for_path};
