//! Markdown segmentation strategy.
//!
//! One pass over the lines, tracking fenced code blocks and tables. A fence
//! or table is never split, even when that pushes a chunk over the caps;
//! the rebalancer deals with oversized chunks afterwards.

use crate::chunking::traits::SegmentationStrategy;
use crate::chunking::{build_chunk, empty_chunk};
use crate::core::{Chunk, ChunkType, SegmentationContext};
use crate::error::Result;
use regex::Regex;

/// Strategy name.
pub const MARKDOWN_STRATEGY: &str = "markdown";

/// A horizontal rule only closes chunks longer than this.
const MIN_LINES_BEFORE_RULE: usize = 3;

/// Level used for chunks that were not opened by a heading.
const NO_HEADING_LEVEL: usize = 7;

fn heading() -> &'static Regex {
    static_regex!(HEADING, r"^ {0,3}(#{1,6})(?:[ \t]+(.*?))?[ \t#]*$")
}

fn horizontal_rule() -> &'static Regex {
    static_regex!(HORIZONTAL_RULE, r"^ {0,3}(?:(?:-[ \t]*){3,}|(?:\*[ \t]*){3,}|(?:_[ \t]*){3,})$")
}

fn fence_open() -> &'static Regex {
    static_regex!(FENCE_OPEN, r"^ {0,3}(`{3,}|~{3,})[ \t]*([^`\s]*)")
}

/// An open fenced block: marker character and length.
#[derive(Debug, Clone, Copy)]
struct Fence {
    marker: char,
    len: usize,
}

impl Fence {
    fn closes(self, line: &str) -> bool {
        let trimmed = line.trim_start_matches(' ');
        let run = trimmed.chars().take_while(|&c| c == self.marker).count();
        run >= self.len && trimmed[run * self.marker.len_utf8()..].trim().is_empty()
    }
}

/// Chunk being accumulated.
#[derive(Debug)]
struct Section {
    start: usize,
    lines: usize,
    size: usize,
    heading_level: Option<usize>,
    title: Option<String>,
    has_fence: bool,
    code_language: Option<String>,
}

impl Section {
    const fn new(start: usize) -> Self {
        Self {
            start,
            lines: 0,
            size: 0,
            heading_level: None,
            title: None,
            has_fence: false,
            code_language: None,
        }
    }

    const fn is_empty(&self) -> bool {
        self.lines == 0
    }

    const fn level(&self) -> usize {
        match self.heading_level {
            Some(level) => level,
            None => NO_HEADING_LEVEL,
        }
    }

    const fn push(&mut self, len: usize) {
        self.size = if self.lines == 0 { len } else { self.size + 1 + len };
        self.lines += 1;
    }

    const fn would_exceed(&self, len: usize, max_bytes: usize, max_lines: usize) -> bool {
        !self.is_empty() && (self.size + 1 + len > max_bytes || self.lines >= max_lines)
    }
}

fn heading_of(line: &str) -> Option<(usize, String)> {
    let caps = heading().captures(line)?;
    let level = caps.get(1)?.as_str().len();
    let title = caps.get(2).map_or("", |m| m.as_str()).trim().to_string();
    Some((level, title))
}

fn is_table_row(line: &str) -> bool {
    line.trim_start().starts_with('|')
}

/// Heading, fence and table aware markdown strategy.
///
/// # Examples
///
/// ```
/// use codesplit::chunking::{MarkdownStrategy, SegmentationStrategy};
/// use codesplit::core::{ChunkType, ChunkingOptions, SegmentationContext};
///
/// let ctx = SegmentationContext::new(
///     "# Intro\ntext\n## Usage\nmore",
///     None,
///     Some("markdown"),
///     ChunkingOptions::default(),
/// );
/// let chunks = MarkdownStrategy::new().segment(&ctx).unwrap();
/// assert_eq!(chunks.len(), 1);
/// assert_eq!(chunks[0].chunk_type(), ChunkType::Heading);
/// assert_eq!(chunks[0].metadata.section.as_deref(), Some("Intro"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownStrategy;

impl MarkdownStrategy {
    /// Creates the markdown strategy.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn finish(ctx: &SegmentationContext, lines: &[&str], section: &Section, end: usize) -> Chunk {
        let chunk_type = if section.heading_level.is_some() {
            ChunkType::Heading
        } else if section.has_fence {
            ChunkType::CodeBlock
        } else {
            ChunkType::Paragraph
        };
        let mut chunk = build_chunk(ctx, lines, section.start, end, chunk_type, MARKDOWN_STRATEGY);
        chunk.metadata.section.clone_from(&section.title);
        chunk.metadata.code_language.clone_from(&section.code_language);
        chunk
    }
}

impl SegmentationStrategy for MarkdownStrategy {
    fn segment(&self, ctx: &SegmentationContext) -> Result<Vec<Chunk>> {
        if ctx.content.is_empty() {
            return Ok(vec![empty_chunk(ctx, ChunkType::Paragraph, MARKDOWN_STRATEGY)]);
        }

        let lines = ctx.lines();
        let max_bytes = ctx.options.max_chunk_size;
        let max_lines = ctx.options.max_lines_per_chunk.max(1);

        let mut chunks = Vec::new();
        let mut section = Section::new(1);
        let mut fence: Option<Fence> = None;
        let mut in_table = false;

        for (idx, line) in lines.iter().enumerate() {
            let line_no = idx + 1;

            if let Some(open) = fence {
                section.push(line.len());
                if open.closes(line) {
                    fence = None;
                }
                continue;
            }

            let table_row = is_table_row(line);
            let continues_table = in_table && table_row;
            in_table = table_row;

            let heading = heading_of(line);
            let split_for_heading = heading
                .as_ref()
                .is_some_and(|(level, _)| !section.is_empty() && *level <= section.level());
            let split_for_caps =
                !continues_table && section.would_exceed(line.len(), max_bytes, max_lines);

            if split_for_heading || split_for_caps {
                chunks.push(Self::finish(ctx, &lines, &section, line_no - 1));
                section = Section::new(line_no);
            }

            if let Some((level, title)) = heading
                && section.is_empty()
            {
                section.heading_level = Some(level);
                section.title = Some(title);
            }

            section.push(line.len());

            if let Some(caps) = fence_open().captures(line) {
                let run = caps.get(1).map_or("", |m| m.as_str());
                if let Some(marker) = run.chars().next() {
                    fence = Some(Fence {
                        marker,
                        len: run.chars().count(),
                    });
                    section.has_fence = true;
                    if section.code_language.is_none() {
                        section.code_language = caps
                            .get(2)
                            .map(|m| m.as_str())
                            .filter(|info| !info.is_empty())
                            .map(str::to_string);
                    }
                }
                continue;
            }

            if section.lines > MIN_LINES_BEFORE_RULE && horizontal_rule().is_match(line) {
                chunks.push(Self::finish(ctx, &lines, &section, line_no));
                section = Section::new(line_no + 1);
            }
        }

        if !section.is_empty() {
            chunks.push(Self::finish(ctx, &lines, &section, lines.len()));
        }
        if fence.is_some() {
            tracing::debug!("unterminated code fence runs to end of file");
        }

        Ok(chunks)
    }

    fn can_handle(&self, ctx: &SegmentationContext) -> bool {
        ctx.metadata.is_markdown_file
    }

    fn name(&self) -> &'static str {
        MARKDOWN_STRATEGY
    }

    fn priority(&self) -> u32 {
        1
    }

    fn supported_languages(&self) -> Option<Vec<String>> {
        Some(vec!["markdown".to_string(), "mdx".to_string()])
    }

    fn description(&self) -> &'static str {
        "Splits markdown at headings and rules without breaking fences or tables"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ChunkingOptions;

    fn segment(content: &str) -> Vec<Chunk> {
        segment_with(content, ChunkingOptions::default())
    }

    fn segment_with(content: &str, options: ChunkingOptions) -> Vec<Chunk> {
        let ctx = SegmentationContext::new(content, None, Some("markdown"), options);
        MarkdownStrategy::new().segment(&ctx).unwrap()
    }

    fn spans(chunks: &[Chunk]) -> Vec<(usize, usize)> {
        chunks.iter().map(|c| (c.start_line(), c.end_line())).collect()
    }

    #[test]
    fn test_heading_levels() {
        let chunks = segment("# A\na\n## B\nb\n# C\nc");
        assert_eq!(spans(&chunks), vec![(1, 4), (5, 6)]);
        assert_eq!(chunks[1].metadata.section.as_deref(), Some("C"));
    }

    #[test]
    fn test_sibling_headings_split() {
        let chunks = segment("## A\na\n## B\nb");
        assert_eq!(spans(&chunks), vec![(1, 2), (3, 4)]);
    }

    #[test]
    fn test_preamble_is_paragraph() {
        let chunks = segment("intro text\n\n# Title\nbody");
        assert_eq!(spans(&chunks), vec![(1, 2), (3, 4)]);
        assert_eq!(chunks[0].chunk_type(), ChunkType::Paragraph);
        assert_eq!(chunks[1].chunk_type(), ChunkType::Heading);
    }

    #[test]
    fn test_fence_kept_together() {
        let content = "Some text\n```js\nfunction a() {\n\n  return 1;\n\n}\n# not a heading\n```\nafter";
        let chunks = segment_with(
            content,
            ChunkingOptions {
                max_lines_per_chunk: 3,
                ..ChunkingOptions::default()
            },
        );
        let fence_chunk = chunks
            .iter()
            .find(|c| c.content.contains("```js"))
            .unwrap();
        assert_eq!(fence_chunk.content.matches("```").count(), 2);
        assert_eq!(fence_chunk.chunk_type(), ChunkType::CodeBlock);
        assert_eq!(fence_chunk.metadata.code_language.as_deref(), Some("js"));
    }

    #[test]
    fn test_tilde_fence() {
        let chunks = segment("~~~\n# inside\n~~~\n# Outside\nx");
        assert_eq!(spans(&chunks), vec![(1, 3), (4, 5)]);
    }

    #[test]
    fn test_table_not_split() {
        let content = "| a | b |\n|---|---|\n| 1 | 2 |\n| 3 | 4 |";
        let chunks = segment_with(
            content,
            ChunkingOptions {
                max_lines_per_chunk: 2,
                ..ChunkingOptions::default()
            },
        );
        assert_eq!(spans(&chunks), vec![(1, 4)]);
    }

    #[test]
    fn test_rule_splits_long_chunk() {
        let chunks = segment("a\nb\nc\nd\n---\ne");
        assert_eq!(spans(&chunks), vec![(1, 5), (6, 6)]);
    }

    #[test]
    fn test_rule_ignored_in_short_chunk() {
        let chunks = segment("a\n---\nb");
        assert_eq!(spans(&chunks), vec![(1, 3)]);
    }

    #[test]
    fn test_caps_split() {
        let content = "word\n".repeat(30);
        let chunks = segment_with(
            &content,
            ChunkingOptions {
                max_lines_per_chunk: 10,
                ..ChunkingOptions::default()
            },
        );
        assert!(chunks.iter().all(|c| c.line_span() <= 10));
        assert_eq!(chunks.last().unwrap().end_line(), 31);
    }

    #[test]
    fn test_empty_content() {
        let chunks = segment("");
        assert_eq!(chunks.len(), 1);
        assert_eq!((chunks[0].start_line(), chunks[0].end_line()), (1, 0));
    }

    #[test]
    fn test_can_handle() {
        let md = SegmentationContext::new("# x", None, Some("md"), ChunkingOptions::default());
        let rs = SegmentationContext::new("fn x", None, Some("rust"), ChunkingOptions::default());
        assert!(MarkdownStrategy::new().can_handle(&md));
        assert!(!MarkdownStrategy::new().can_handle(&rs));
    }
}
