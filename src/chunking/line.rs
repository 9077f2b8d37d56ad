//! Line-based segmentation strategy.
//!
//! Splits purely on the line and size caps. It handles every input and is
//! the target of execution-time fallback.

use crate::chunking::traits::SegmentationStrategy;
use crate::chunking::{build_chunk, empty_chunk, line_ranges};
use crate::core::{Chunk, ChunkType, SegmentationContext};
use crate::error::Result;

/// Name of the universal fallback strategy.
pub const LINE_STRATEGY: &str = "line";

/// Universal line strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineStrategy;

impl LineStrategy {
    /// Creates the line strategy.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SegmentationStrategy for LineStrategy {
    fn segment(&self, ctx: &SegmentationContext) -> Result<Vec<Chunk>> {
        if ctx.content.is_empty() {
            return Ok(vec![empty_chunk(ctx, ChunkType::Line, LINE_STRATEGY)]);
        }

        let lines = ctx.lines();
        let ranges = line_ranges(
            &lines,
            1,
            lines.len(),
            ctx.options.max_chunk_size,
            ctx.options.max_lines_per_chunk,
        );

        Ok(ranges
            .into_iter()
            .map(|(start, end)| build_chunk(ctx, &lines, start, end, ChunkType::Line, LINE_STRATEGY))
            .collect())
    }

    fn can_handle(&self, _ctx: &SegmentationContext) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        LINE_STRATEGY
    }

    fn priority(&self) -> u32 {
        5
    }

    fn description(&self) -> &'static str {
        "Line and size capped segmentation, used as the universal fallback"
    }
}
