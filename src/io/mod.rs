//! I/O utilities for codesplit.
//!
//! Provides source file reading with memory mapping for large files,
//! along with the line and Unicode helpers shared by every strategy.

pub mod reader;
pub mod unicode;

pub use reader::{SourceFile, read_source};
pub use unicode::{find_char_boundary, join_lines, line_count, split_lines};
