//! Size rebalancing.
//!
//! Oversized chunks are split towards the batch's average size; undersized
//! chunks are merged into a compatible predecessor when the result fits.

use crate::chunking::{ComplexityCalculator, line_ranges};
use crate::core::Chunk;
use crate::io::unicode::grapheme_slices;
use crate::processing::{PostProcessor, ProcessingContext, merge_chunks};

/// Splits and merges chunks to keep sizes within `[min, max]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rebalancer;

impl Rebalancer {
    /// Creates the rebalancer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Average chunk size clamped to `[min, max]`.
    #[must_use]
    pub fn target_size(chunks: &[Chunk], min: usize, max: usize) -> usize {
        if chunks.is_empty() {
            return max;
        }
        let total: usize = chunks.iter().map(Chunk::size).sum();
        (total / chunks.len()).clamp(min.min(max), max)
    }

    fn piece(chunk: &Chunk, content: String, start: usize, end: usize) -> Chunk {
        let mut piece = chunk.clone();
        piece.metadata.complexity = ComplexityCalculator::calculate(&content);
        piece.content = content;
        piece.metadata.start_line = start;
        piece.metadata.end_line = end;
        piece
    }

    /// Splits a chunk above `max` into pieces of about `target` bytes.
    fn split(chunk: &Chunk, target: usize, max: usize, max_lines: usize) -> Vec<Part> {
        let lines: Vec<&str> = chunk.content.split('\n').collect();
        let offset = chunk.start_line().saturating_sub(1);
        let last = chunk.end_line().max(chunk.start_line());
        let mut pieces = Vec::new();

        for (start, end) in line_ranges(&lines, 1, lines.len(), target, max_lines) {
            let text = lines[start - 1..end].join("\n");
            let first_line = (offset + start).min(last);
            if text.len() <= max {
                pieces.push(Part::whole(Self::piece(chunk, text, first_line, (offset + end).min(last))));
            } else {
                // A single line longer than the cap.
                for slice in grapheme_slices(&text, max) {
                    pieces.push(Part {
                        chunk: Self::piece(chunk, slice.to_string(), first_line, first_line),
                        fragment: true,
                    });
                }
            }
        }
        pieces
    }

    /// Joins `next` onto `prev`.
    ///
    /// Slices of the same line are concatenated; anything else goes through
    /// [`merge_chunks`], which drops lines the two share.
    fn join(prev: &Part, next: &Part) -> Part {
        if prev.fragment && next.fragment && prev.chunk.end_line() == next.chunk.start_line() {
            let content = format!("{}{}", prev.chunk.content, next.chunk.content);
            let line = prev.chunk.end_line();
            return Part {
                chunk: Self::piece(&prev.chunk, content, line, line),
                fragment: true,
            };
        }
        Part::whole(merge_chunks(&prev.chunk, &next.chunk))
    }

    fn merge_undersized(parts: Vec<Part>, min: usize, max: usize) -> Vec<Chunk> {
        let mut out: Vec<Part> = Vec::with_capacity(parts.len());
        for next in parts {
            if next.chunk.size() < min
                && let Some(prev) = out.last_mut()
                && prev.chunk.chunk_type().is_compatible_with(next.chunk.chunk_type())
            {
                let merged = Self::join(prev, &next);
                if merged.chunk.size() <= max {
                    *prev = merged;
                    continue;
                }
            }
            out.push(next);
        }

        // A lone undersized tail merges regardless of type.
        let len = out.len();
        if len >= 2
            && out[len - 1].chunk.size() < min
            && out[..len - 1].iter().all(|p| p.chunk.size() >= min)
        {
            let merged = Self::join(&out[len - 2], &out[len - 1]);
            if merged.chunk.size() <= max {
                out.truncate(len - 2);
                out.push(merged);
            }
        }
        out.into_iter().map(|p| p.chunk).collect()
    }
}

/// A chunk in flight, flagged when it is a slice of one oversized line.
struct Part {
    chunk: Chunk,
    fragment: bool,
}

impl Part {
    const fn whole(chunk: Chunk) -> Self {
        Self { chunk, fragment: false }
    }
}

impl PostProcessor for Rebalancer {
    fn name(&self) -> &'static str {
        "rebalance"
    }

    fn should_apply(&self, ctx: &ProcessingContext<'_>) -> bool {
        ctx.source.options.filter.enable_chunk_rebalancing
    }

    fn process(&self, chunks: Vec<Chunk>, ctx: &ProcessingContext<'_>) -> Vec<Chunk> {
        let options = &ctx.source.options;
        let max = options.rebalance_max();
        let min = options.filter.min_chunk_size.min(max);
        let target = Self::target_size(&chunks, min, max);

        let mut sized = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if chunk.size() > max {
                sized.extend(Self::split(&chunk, target, max, options.max_lines_per_chunk));
            } else {
                sized.push(Part::whole(chunk));
            }
        }
        Self::merge_undersized(sized, min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ChunkType, ChunkingOptions, SegmentationContext};
    use crate::processing::test_support::chunk;

    fn run(chunks: Vec<Chunk>, min: usize, max: usize) -> Vec<Chunk> {
        let mut options = ChunkingOptions {
            max_chunk_size: max,
            overlap_size: 0,
            ..ChunkingOptions::default()
        };
        options.filter.min_chunk_size = min;
        options.filter.max_chunk_size = max;
        let ctx = SegmentationContext::new("x", None, Some("rust"), options);
        Rebalancer::new().process(chunks, &ProcessingContext::new(&ctx, false))
    }

    #[test]
    fn test_target_size_clamped() {
        let chunks = vec![
            chunk(&"a".repeat(10), 1, 1, ChunkType::Code),
            chunk(&"b".repeat(30), 2, 2, ChunkType::Code),
        ];
        assert_eq!(Rebalancer::target_size(&chunks, 5, 100), 20);
        assert_eq!(Rebalancer::target_size(&chunks, 50, 100), 50);
        assert_eq!(Rebalancer::target_size(&chunks, 1, 15), 15);
    }

    #[test]
    fn test_oversized_split_by_line() {
        let content = (1..=10).map(|i| format!("line {i:02}")).collect::<Vec<_>>().join("\n");
        let out = run(vec![chunk(&content, 1, 10, ChunkType::Line)], 1, 40);
        assert!(out.len() > 1);
        assert!(out.iter().all(|c| c.size() <= 40));
        assert_eq!(out[0].start_line(), 1);
        assert_eq!(out.last().unwrap().end_line(), 10);
        let rebuilt = out.iter().map(|c| c.content.as_str()).collect::<Vec<_>>().join("\n");
        assert_eq!(rebuilt, content);
    }

    #[test]
    fn test_single_long_line_sliced() {
        let long = "x".repeat(250);
        let out = run(vec![chunk(&long, 7, 7, ChunkType::Line)], 1, 100);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|c| c.size() <= 100 && c.start_line() == 7));
    }

    #[test]
    fn test_sliced_line_keeps_every_byte() {
        let long = "x".repeat(250);
        let out = run(vec![chunk(&long, 7, 7, ChunkType::Line)], 100, 100);
        assert_eq!(out.iter().map(Chunk::size).collect::<Vec<_>>(), vec![100, 100, 50]);
        assert_eq!(out.iter().map(|c| c.content.as_str()).collect::<String>(), long);
    }

    #[test]
    fn test_join_concatenates_slices_of_one_line() {
        let a = Part { chunk: chunk("abc", 4, 4, ChunkType::Line), fragment: true };
        let b = Part { chunk: chunk("def", 4, 4, ChunkType::Line), fragment: true };
        let joined = Rebalancer::join(&a, &b);
        assert!(joined.fragment);
        assert_eq!(joined.chunk.content, "abcdef");
        assert_eq!((joined.chunk.start_line(), joined.chunk.end_line()), (4, 4));

        let a = Part::whole(chunk("a\nb", 3, 4, ChunkType::Line));
        let b = Part::whole(chunk("b\nc", 4, 5, ChunkType::Line));
        let joined = Rebalancer::join(&a, &b);
        assert!(!joined.fragment);
        assert_eq!(joined.chunk.content, "a\nb\nc");
    }

    #[test]
    fn test_sliced_line_between_whole_lines() {
        let content = format!("head line\n{}\ntail line", "w".repeat(230));
        let out = run(vec![chunk(&content, 1, 3, ChunkType::Line)], 20, 100);
        assert!(out.iter().all(|c| c.size() <= 100));
        assert_eq!(out.first().unwrap().start_line(), 1);
        assert_eq!(out.last().unwrap().end_line(), 3);
        let kept: usize = out.iter().map(|c| c.content.matches('w').count()).sum();
        assert_eq!(kept, 230);
        assert!(out.iter().any(|c| c.content.contains("head line")));
        assert!(out.iter().any(|c| c.content.contains("tail line")));
    }

    #[test]
    fn test_undersized_merges_into_compatible_previous() {
        let chunks = vec![
            chunk(&"a".repeat(60), 1, 1, ChunkType::Function),
            chunk("fn b() {}", 2, 2, ChunkType::Method),
            chunk(&"c".repeat(60), 3, 3, ChunkType::Heading),
        ];
        let out = run(chunks, 20, 100);
        assert_eq!(out.len(), 2);
        assert_eq!((out[0].start_line(), out[0].end_line()), (1, 2));
    }

    #[test]
    fn test_incompatible_types_not_merged() {
        let chunks = vec![
            chunk(&"a".repeat(60), 1, 1, ChunkType::Function),
            chunk("let b = 1;", 2, 2, ChunkType::Code),
            chunk(&"c".repeat(60), 3, 3, ChunkType::Code),
        ];
        let out = run(chunks, 20, 100);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_merge_respects_max() {
        let chunks = vec![
            chunk(&"a".repeat(95), 1, 1, ChunkType::Code),
            chunk("b = 1", 2, 2, ChunkType::Code),
            chunk(&"c".repeat(95), 3, 3, ChunkType::Code),
        ];
        let out = run(chunks, 20, 100);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_final_undersized_merges_regardless_of_type() {
        let chunks = vec![
            chunk(&"a".repeat(60), 1, 1, ChunkType::Function),
            chunk("}", 2, 2, ChunkType::Code),
        ];
        let out = run(chunks, 20, 100);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].chunk_type(), ChunkType::Function);
        assert_eq!(out[0].end_line(), 2);
    }
}
