//! Segmentation strategies.
//!
//! Four strategies map a [`SegmentationContext`] to a flat chunk list:
//!
//! - **Markdown** (priority 1): heading, fence and table aware
//! - **Standardization** (priority 2): constructs extracted from a syntax tree
//! - **Bracket** (priority 4): bracket and XML-tag depth tracking
//! - **Line** (priority 5): plain line/size caps, the universal fallback

pub mod bracket;
pub mod complexity;
pub mod line;
pub mod markdown;
pub mod standardization;
pub mod traits;

pub use bracket::BracketStrategy;
pub use complexity::{COMPLEX_CODE_THRESHOLD, ComplexityCalculator, StructureCounts};
pub use line::{LINE_STRATEGY, LineStrategy};
pub use markdown::MarkdownStrategy;
pub use standardization::StandardizationStrategy;
pub use traits::SegmentationStrategy;

use crate::core::{Chunk, ChunkMetadata, ChunkType, SegmentationContext};
use crate::io::join_lines;

/// Lists the built-in strategy names in default priority order.
#[must_use]
pub fn available_strategies() -> Vec<&'static str> {
    vec!["markdown", "standardization", "bracket", "line"]
}

/// Builds a chunk from the 1-based inclusive line range `start..=end`.
pub(crate) fn build_chunk(
    ctx: &SegmentationContext,
    lines: &[&str],
    start: usize,
    end: usize,
    chunk_type: ChunkType,
    strategy: &str,
) -> Chunk {
    let content = join_lines(lines, start, end);
    let mut metadata = ChunkMetadata::new(start, end, ctx.language_or_default(), chunk_type);
    metadata.file_path.clone_from(&ctx.file_path);
    metadata.complexity = ComplexityCalculator::calculate(&content);
    metadata.strategy = Some(strategy.to_string());
    Chunk::new(content, metadata)
}

/// The single chunk emitted for empty content: `""` spanning `1..=0`.
pub(crate) fn empty_chunk(ctx: &SegmentationContext, chunk_type: ChunkType, strategy: &str) -> Chunk {
    let mut metadata = ChunkMetadata::new(1, 0, ctx.language_or_default(), chunk_type);
    metadata.file_path.clone_from(&ctx.file_path);
    metadata.strategy = Some(strategy.to_string());
    Chunk::new(String::new(), metadata)
}

/// Partitions lines `first..=last` into consecutive ranges that respect
/// `max_bytes` and `max_lines`.
///
/// A single line longer than `max_bytes` gets a range of its own; the
/// rebalancer slices it later.
pub(crate) fn line_ranges(
    lines: &[&str],
    first: usize,
    last: usize,
    max_bytes: usize,
    max_lines: usize,
) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    if first == 0 || first > last || lines.is_empty() {
        return ranges;
    }
    let last = last.min(lines.len());
    let max_lines = max_lines.max(1);

    let mut start = first;
    let mut size = 0usize;
    for line_no in first..=last {
        let len = lines[line_no - 1].len();
        let count = line_no - start;
        if count > 0 && (size + 1 + len > max_bytes || count >= max_lines) {
            ranges.push((start, line_no - 1));
            start = line_no;
            size = len;
        } else if count == 0 {
            size = len;
        } else {
            size += 1 + len;
        }
    }
    ranges.push((start, last));
    ranges
}
