//! Overlap between neighbouring chunks.
//!
//! Code files: only chunks above `max_chunk_size` are re-split, and each
//! new piece starts with a few lines from the tail of the previous piece.
//! Other files: each non-final chunk gets a few lines of the following
//! source appended.

use crate::chunking::line_ranges;
use crate::core::Chunk;
use crate::processing::{PostProcessor, ProcessingContext};
use regex::Regex;

/// Lines searched for a boundary at the tail of a piece.
const BOUNDARY_SEARCH_LINES: usize = 5;

/// Overlap lines used when no boundary is found, and the non-code cap.
const FIXED_OVERLAP_LINES: usize = 3;

/// Non-code overlap may not exceed this share of the chunk's lines.
const MAX_OVERLAP_LINE_RATIO: f64 = 0.3;

fn function_open() -> &'static Regex {
    static_regex!(
        FUNCTION_OPEN,
        r"^\s*(?:(?:pub(?:\([^)]*\))?|export|default|async|static|public|private|protected|override)\s+)*(?:fn|def|function|func|fun|sub)\b"
    )
}

fn block_close() -> &'static Regex {
    static_regex!(BLOCK_CLOSE, r"^\s*[}\])]+[;,]?\s*$")
}

fn is_boundary(line: &str) -> bool {
    line.trim().is_empty() || function_open().is_match(line) || block_close().is_match(line)
}

/// Adds overlap to chunk boundaries.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlapProcessor;

impl OverlapProcessor {
    /// Creates the overlap processor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Index into `lines` where the overlap taken from a piece's tail starts.
    ///
    /// `lines` are the piece's lines; the first line is never used.
    fn overlap_start(lines: &[&str], budget: usize) -> Option<usize> {
        if lines.len() < 2 {
            return None;
        }
        let earliest = lines.len().saturating_sub(BOUNDARY_SEARCH_LINES).max(1);
        let mut start = (earliest..lines.len())
            .rev()
            .find(|&idx| is_boundary(lines[idx]))
            .unwrap_or_else(|| lines.len().saturating_sub(FIXED_OVERLAP_LINES).max(1));

        // Shrink from the front until the overlap fits the byte budget.
        while start < lines.len() {
            let bytes: usize = lines[start..].iter().map(|l| l.len() + 1).sum();
            if bytes <= budget {
                return Some(start);
            }
            start += 1;
        }
        None
    }

    fn split_code_chunk(chunk: &Chunk, max_size: usize, max_lines: usize, overlap: usize) -> Vec<Chunk> {
        let lines: Vec<&str> = chunk.content.split('\n').collect();
        if lines.len() < 2 {
            return vec![chunk.clone()];
        }
        let piece_budget = max_size.saturating_sub(overlap + 1).max(1);
        let ranges = line_ranges(&lines, 1, lines.len(), piece_budget, max_lines);
        if ranges.len() < 2 {
            return vec![chunk.clone()];
        }

        let offset = chunk.start_line() - 1;
        let mut pieces = Vec::with_capacity(ranges.len());
        let mut previous: Option<(usize, usize)> = None;

        for (start, end) in ranges {
            let mut from = start;
            if let Some((prev_start, prev_end)) = previous {
                let prev_lines = &lines[prev_start - 1..prev_end];
                if let Some(idx) = Self::overlap_start(prev_lines, overlap) {
                    from = prev_start + idx;
                }
            }
            let mut piece = chunk.clone();
            piece.content = lines[from - 1..end].join("\n");
            piece.metadata.start_line = offset + from;
            piece.metadata.end_line = offset + end;
            piece.metadata.has_overlap = from < start;
            piece.metadata.complexity = crate::chunking::ComplexityCalculator::calculate(&piece.content);
            pieces.push(piece);
            previous = Some((start, end));
        }
        pieces
    }

    fn process_code(chunks: Vec<Chunk>, ctx: &ProcessingContext<'_>) -> Vec<Chunk> {
        let options = &ctx.source.options;
        let overlap = options.effective_overlap();
        let mut out = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if chunk.size() > options.max_chunk_size {
                out.extend(Self::split_code_chunk(
                    &chunk,
                    options.max_chunk_size,
                    options.max_lines_per_chunk,
                    overlap,
                ));
            } else {
                out.push(chunk);
            }
        }
        out
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn process_text(mut chunks: Vec<Chunk>, ctx: &ProcessingContext<'_>) -> Vec<Chunk> {
        let options = &ctx.source.options;
        let budget = options.effective_overlap();
        let source = ctx.source.lines();

        for i in 0..chunks.len().saturating_sub(1) {
            let (next_start, next_end) = (chunks[i + 1].start_line(), chunks[i + 1].end_line());
            let chunk = &mut chunks[i];
            if chunk.metadata.end_line >= next_start || next_start > source.len() {
                continue;
            }
            let ratio_cap = (chunk.line_span() as f64 * MAX_OVERLAP_LINE_RATIO).floor() as usize;
            let count = FIXED_OVERLAP_LINES.min(ratio_cap).min(next_end + 1 - next_start);

            let mut appended = 0;
            let mut bytes = 0;
            for line in source.iter().skip(next_start - 1).take(count) {
                let cost = line.len() + 1;
                if bytes + cost > budget || chunk.size() + bytes + cost > options.max_chunk_size {
                    break;
                }
                bytes += cost;
                appended += 1;
            }
            if appended == 0 {
                continue;
            }

            for line in source.iter().skip(next_start - 1).take(appended) {
                chunk.content.push('\n');
                chunk.content.push_str(line);
            }
            chunk.metadata.end_line = next_start + appended - 1;
            chunk.metadata.has_overlap = true;
        }
        chunks
    }
}

impl PostProcessor for OverlapProcessor {
    fn name(&self) -> &'static str {
        "overlap"
    }

    fn should_apply(&self, ctx: &ProcessingContext<'_>) -> bool {
        let options = &ctx.source.options;
        if ctx.degraded || options.overlap_size == 0 || options.effective_overlap() == 0 {
            return false;
        }
        !ctx.source.metadata.is_code_file || options.enable_code_overlap
    }

    fn process(&self, chunks: Vec<Chunk>, ctx: &ProcessingContext<'_>) -> Vec<Chunk> {
        if ctx.source.metadata.is_code_file {
            Self::process_code(chunks, ctx)
        } else {
            Self::process_text(chunks, ctx)
        }
    }
}
