//! Small-chunk filter and quality scoring.

use crate::chunking::ComplexityCalculator;
use crate::core::Chunk;
use crate::processing::{PostProcessor, ProcessingContext, merge_chunks, merge_into_next};

/// Blank-line share above which a chunk is penalized.
const MAX_BLANK_RATIO: f64 = 0.5;

/// Comment-line share above which a chunk is penalized.
const MAX_COMMENT_RATIO: f64 = 0.8;

const QUALITY_BASE: f64 = 0.3;
const QUALITY_PENALTY: f64 = 0.3;

const COMMENT_PREFIXES: &[&str] = &["//", "#", "/*", "*", "--", ";", "<!--", "\"\"\"", "'''"];

/// Returns whether a chunk counts as normal-sized regardless of the minimum.
///
/// The `>= 12` clause subsumes `>= 20`; both are kept as observed.
///
/// # Examples
///
/// ```
/// use codesplit::processing::is_normal_size;
///
/// assert!(is_normal_size("a b"));
/// assert!(is_normal_size("abcdefghijkl"));
/// assert!(!is_normal_size("}"));
/// ```
#[must_use]
#[allow(clippy::overly_complex_bool_expr, clippy::nonminimal_bool)]
pub fn is_normal_size(content: &str) -> bool {
    let len = content.len();
    len >= 20 || content.contains(' ') || len >= 12
}

fn is_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    COMMENT_PREFIXES.iter().any(|p| trimmed.starts_with(p))
}

/// Scores chunk quality in `[0, 1]`.
///
/// Structural density (functions, classes and control keywords per line)
/// raises the score; mostly-blank or mostly-comment chunks are penalized.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn quality_score(content: &str) -> f64 {
    let lines: Vec<&str> = content.split('\n').collect();
    let total = lines.len().max(1) as f64;
    let blank = lines.iter().filter(|l| l.trim().is_empty()).count() as f64;
    let non_blank = (total - blank).max(1.0);
    let comments = lines
        .iter()
        .filter(|l| !l.trim().is_empty() && is_comment(l))
        .count() as f64;

    let counts = ComplexityCalculator::counts(content);
    let structure = (counts.functions * 2 + counts.classes * 2 + counts.control) as f64;
    let density = (structure / non_blank).min(1.0);

    let mut score = QUALITY_BASE + (1.0 - QUALITY_BASE) * density;
    if blank / total > MAX_BLANK_RATIO {
        score -= QUALITY_PENALTY;
    }
    if comments / non_blank > MAX_COMMENT_RATIO {
        score -= QUALITY_PENALTY;
    }
    score.clamp(0.0, 1.0)
}

/// Folds tiny chunks into normal neighbours and optionally drops
/// low-quality code chunks.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkFilter;

impl ChunkFilter {
    /// Creates the filter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn is_tiny(chunk: &Chunk, min_size: usize) -> bool {
        chunk.size() < min_size && !is_normal_size(&chunk.content)
    }

    fn filter_small(chunks: Vec<Chunk>, min_size: usize) -> Vec<Chunk> {
        if chunks.len() <= 1 {
            return chunks;
        }
        let original = chunks.clone();
        let mut out: Vec<Chunk> = Vec::with_capacity(chunks.len());
        let mut pending: Option<Chunk> = None;
        let mut iter = chunks.into_iter().peekable();

        while let Some(mut chunk) = iter.next() {
            if let Some(tiny) = pending.take() {
                chunk = merge_into_next(&tiny, &chunk);
            }
            if !Self::is_tiny(&chunk, min_size) {
                out.push(chunk);
                continue;
            }
            if let Some(prev) = out.last_mut()
                && is_normal_size(&prev.content)
            {
                *prev = merge_chunks(prev, &chunk);
                continue;
            }
            if iter.peek().is_some_and(|next| is_normal_size(&next.content)) {
                pending = Some(chunk);
                continue;
            }
            tracing::warn!(
                start_line = chunk.start_line(),
                end_line = chunk.end_line(),
                size = chunk.size(),
                "discarding tiny chunk with no normal-sized neighbour"
            );
        }

        if out.is_empty() {
            return original;
        }
        out
    }

    fn filter_quality(chunks: Vec<Chunk>, min_quality: f64) -> Vec<Chunk> {
        if chunks.len() <= 1 {
            return chunks;
        }
        let (kept, dropped): (Vec<Chunk>, Vec<Chunk>) = chunks
            .into_iter()
            .partition(|c| quality_score(&c.content) >= min_quality);
        if kept.is_empty() {
            return dropped;
        }
        if !dropped.is_empty() {
            tracing::warn!(dropped = dropped.len(), min_quality, "dropped low-quality chunks");
        }
        kept
    }
}

impl PostProcessor for ChunkFilter {
    fn name(&self) -> &'static str {
        "filter"
    }

    fn should_apply(&self, ctx: &ProcessingContext<'_>) -> bool {
        let filter = &ctx.source.options.filter;
        filter.enable_small_chunk_filter
            || (filter.enable_quality_filter && ctx.source.metadata.is_code_file)
    }

    fn process(&self, chunks: Vec<Chunk>, ctx: &ProcessingContext<'_>) -> Vec<Chunk> {
        let filter = &ctx.source.options.filter;
        let mut chunks = chunks;
        if filter.enable_small_chunk_filter {
            chunks = Self::filter_small(chunks, filter.min_chunk_size);
        }
        if filter.enable_quality_filter && ctx.source.metadata.is_code_file {
            chunks = Self::filter_quality(chunks, filter.min_quality);
        }
        chunks
    }
}
