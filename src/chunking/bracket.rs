//! Bracket-balance segmentation strategy.
//!
//! Tracks `{}`, `()` and `[]` depth (ignoring string literals) and, for
//! markup languages, XML tag depth. A chunk closes once the structure is
//! balanced and at least [`MIN_BALANCED_LINES`] lines have accumulated, or
//! when a line or size cap is reached.

use crate::chunking::traits::SegmentationStrategy;
use crate::chunking::{build_chunk, empty_chunk, line_ranges};
use crate::core::{Chunk, ChunkType, SegmentationContext};
use crate::error::Result;
use regex::Regex;

/// Strategy name.
pub const BRACKET_STRATEGY: &str = "bracket";

/// Lines processed with bracket tracking; later lines are split by caps only.
pub const MAX_TRACKED_LINES: usize = 10_000;

/// Minimum lines in a balanced chunk.
pub const MIN_BALANCED_LINES: usize = 5;

/// Hard line limit per block, lowered by `max_lines_per_chunk`.
pub const MAX_BLOCK_LINES: usize = 50;

/// Languages whose tags count towards XML depth.
const MARKUP_LANGUAGES: &[&str] = &["html", "xml", "vue"];

fn xml_tag() -> &'static Regex {
    static_regex!(XML_TAG, r"<(/?)([A-Za-z][\w:.-]*)[^<>]*?(/?)>")
}

/// Depth state carried across lines.
#[derive(Debug, Default)]
struct BracketState {
    depth: usize,
    xml_depth: usize,
    /// Open template literal, which may span lines.
    in_template: bool,
}

impl BracketState {
    fn is_balanced(&self) -> bool {
        self.depth == 0 && self.xml_depth == 0 && !self.in_template
    }

    fn scan(&mut self, line: &str, track_xml: bool) {
        let mut quote: Option<char> = if self.in_template { Some('`') } else { None };
        let mut escaped = false;

        for c in line.chars() {
            if let Some(q) = quote {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
                continue;
            }
            match c {
                '"' | '\'' | '`' => quote = Some(c),
                '{' | '(' | '[' => self.depth += 1,
                '}' | ')' | ']' => self.depth = self.depth.saturating_sub(1),
                _ => {}
            }
        }
        // Plain quotes never span lines.
        self.in_template = quote == Some('`');

        if track_xml {
            for caps in xml_tag().captures_iter(line) {
                let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
                let self_closing = caps.get(3).is_some_and(|m| !m.as_str().is_empty());
                if closing {
                    self.xml_depth = self.xml_depth.saturating_sub(1);
                } else if !self_closing {
                    self.xml_depth += 1;
                }
            }
        }
    }
}

/// Bracket-balance strategy.
///
/// # Examples
///
/// ```
/// use codesplit::chunking::{BracketStrategy, SegmentationStrategy};
/// use codesplit::core::{ChunkingOptions, SegmentationContext};
///
/// let content = (0..20)
///     .map(|i| format!("function f{i}() {{ return {i}; }}"))
///     .collect::<Vec<_>>()
///     .join("\n");
/// let ctx = SegmentationContext::new(content, None, Some("javascript"), ChunkingOptions::default());
/// let chunks = BracketStrategy::new().segment(&ctx).unwrap();
/// assert_eq!(chunks.len(), 4);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct BracketStrategy {
    tolerance_factor: f64,
    max_block_chars: Option<usize>,
}

impl Default for BracketStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl BracketStrategy {
    /// Creates a bracket strategy with tolerance 1.0 and `max_chunk_size` blocks.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tolerance_factor: 1.0,
            max_block_chars: None,
        }
    }

    /// Sets the tolerance applied to the block size limit.
    #[must_use]
    pub const fn with_tolerance_factor(mut self, factor: f64) -> Self {
        self.tolerance_factor = factor;
        self
    }

    /// Overrides the block size limit. Defaults to `max_chunk_size`.
    #[must_use]
    pub const fn with_max_block_chars(mut self, chars: usize) -> Self {
        self.max_block_chars = Some(chars);
        self
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn size_limit(&self, ctx: &SegmentationContext) -> usize {
        let base = self.max_block_chars.unwrap_or(ctx.options.max_chunk_size);
        ((base as f64 * self.tolerance_factor).floor() as usize).max(1)
    }
}

impl SegmentationStrategy for BracketStrategy {
    fn segment(&self, ctx: &SegmentationContext) -> Result<Vec<Chunk>> {
        if ctx.content.is_empty() {
            return Ok(vec![empty_chunk(ctx, ChunkType::Bracket, BRACKET_STRATEGY)]);
        }

        let lines = ctx.lines();
        let size_limit = self.size_limit(ctx);
        let max_lines = MAX_BLOCK_LINES.min(ctx.options.max_lines_per_chunk).max(1);
        let track_xml = ctx
            .language
            .as_deref()
            .is_some_and(|lang| MARKUP_LANGUAGES.contains(&lang));
        let tracked = lines.len().min(MAX_TRACKED_LINES);

        let mut ranges = Vec::new();
        let mut state = BracketState::default();
        let mut start = 1;
        let mut size = 0usize;

        for line_no in 1..=tracked {
            let line = lines[line_no - 1];
            let count = line_no - start;

            // Close before a line that would push the block over the size limit.
            if count > 0 && size + 1 + line.len() > size_limit {
                ranges.push((start, line_no - 1));
                start = line_no;
                size = 0;
            }

            size = if line_no == start { line.len() } else { size + 1 + line.len() };
            state.scan(line, track_xml);

            let count = line_no - start + 1;
            if (state.is_balanced() && count >= MIN_BALANCED_LINES)
                || count >= max_lines
                || size >= size_limit
            {
                ranges.push((start, line_no));
                start = line_no + 1;
                size = 0;
            }
        }
        if start <= tracked {
            ranges.push((start, tracked));
        }

        if lines.len() > tracked {
            tracing::debug!(
                lines = lines.len(),
                tracked,
                "bracket tracking capped, splitting remainder by line caps"
            );
            ranges.extend(line_ranges(
                &lines,
                tracked + 1,
                lines.len(),
                size_limit,
                max_lines,
            ));
        }

        Ok(ranges
            .into_iter()
            .map(|(s, e)| build_chunk(ctx, &lines, s, e, ChunkType::Bracket, BRACKET_STRATEGY))
            .collect())
    }

    fn can_handle(&self, ctx: &SegmentationContext) -> bool {
        ctx.options.enable_bracket_balance && ctx.metadata.is_code_file
    }

    fn name(&self) -> &'static str {
        BRACKET_STRATEGY
    }

    fn priority(&self) -> u32 {
        4
    }

    fn description(&self) -> &'static str {
        "Splits code at balanced bracket boundaries"
    }
}
