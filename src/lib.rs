//! # codesplit
//!
//! Content-aware segmentation of source code and documents into chunks.
//!
//! A [`Splitter`] picks a strategy for each input, runs it with a fallback
//! chain and post-processes the result so that chunks stay within size
//! limits, carry a little context from their neighbours and are not
//! trivially small.
//!
//! ## Features
//!
//! - **Strategies**: markdown, syntax-tree standardization, bracket balance
//!   and plain line splitting, selected by priority and content complexity
//! - **Post-processing**: overlap, small-chunk filtering and rebalancing
//! - **Resource guards**: a memory guard and an error-threshold manager that
//!   degrade to the line strategy instead of failing
//! - **Unicode aware**: oversize lines are sliced on grapheme boundaries
//!
//! ## Example
//!
//! ```
//! use codesplit::{ChunkingOptions, Splitter};
//!
//! let splitter = Splitter::new(ChunkingOptions::default()).unwrap();
//! let outcome = splitter
//!     .segment("fn main() {\n    println!(\"hi\");\n}\n", None, Some("rust"), None)
//!     .unwrap();
//! assert!(!outcome.chunks.is_empty());
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
// Note: unsafe is needed for memory-mapped I/O (memmap2)
#![warn(unsafe_code)]

#[macro_use]
mod macros;

pub mod cache;
pub mod chunking;
pub mod cli;
pub mod core;
pub mod error;
pub mod guard;
pub mod io;
pub mod processing;
pub mod selection;
pub mod splitter;
pub mod syntax;

// Re-export commonly used types at crate root
pub use error::{ConfigError, Error, Result, SegmentationError};

// Re-export core domain types
pub use core::{
    Chunk, ChunkMetadata, ChunkType, ChunkingOptions, ChunkingOptionsPatch, ProtectionLevel,
    SegmentationContext,
};

// Re-export chunking types
pub use chunking::{SegmentationStrategy, available_strategies};

// Re-export the façade
pub use selection::{FallbackReason, StrategyInfo};
pub use splitter::{HealthReport, SegmentationOutcome, Splitter, SplitterBuilder};

// Re-export CLI types
pub use cli::{Cli, Commands, OutputFormat};
