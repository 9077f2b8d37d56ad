//! Core domain models for codesplit.
//!
//! Chunks, options and the per-request segmentation context. These are
//! pure domain models with no I/O dependencies.

pub mod chunk;
pub mod context;
pub mod language;
pub mod options;

pub use chunk::{Chunk, ChunkMetadata, ChunkType};
pub use context::{ContextMetadata, SegmentationContext};
pub use options::{
    ChunkingOptions, ChunkingOptionsPatch, FilterConfig, ProtectionConfig, ProtectionLevel,
};
