//! Segmentation context.
//!
//! A [`SegmentationContext`] is built once per request. Its metadata is
//! derived at construction and never changes afterwards.

use crate::core::language::{is_code_language, is_markdown_language, normalize_language};
use crate::core::options::ChunkingOptions;
use crate::io::{line_count, split_lines};
use serde::Serialize;

/// Files with at most this many lines may count as small.
pub const SMALL_FILE_MAX_LINES: usize = 20;

/// Files below this many bytes may count as small.
pub const SMALL_FILE_MAX_BYTES: usize = 1000;

/// Language reported when none was resolved.
pub const UNKNOWN_LANGUAGE: &str = "text";

/// Facts derived from the content at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContextMetadata {
    /// Content length in bytes.
    pub content_length: usize,
    /// Number of lines.
    pub line_count: usize,
    /// Short enough for the line strategy.
    pub is_small_file: bool,
    /// Language is a code language.
    pub is_code_file: bool,
    /// Language is markdown.
    pub is_markdown_file: bool,
}

/// Input to every segmentation strategy.
///
/// # Examples
///
/// ```
/// use codesplit::core::{ChunkingOptions, SegmentationContext};
///
/// let ctx = SegmentationContext::new(
///     "fn main() {}\n",
///     Some("src/main.rs"),
///     Some("rust"),
///     ChunkingOptions::default(),
/// );
/// assert_eq!(ctx.metadata.line_count, 2);
/// assert!(ctx.metadata.is_code_file);
/// assert!(ctx.metadata.is_small_file);
/// ```
#[derive(Debug, Clone)]
pub struct SegmentationContext {
    /// Content to segment.
    pub content: String,
    /// Source path, informational only.
    pub file_path: Option<String>,
    /// Normalized language, when resolved.
    pub language: Option<String>,
    /// Options in effect for this request.
    pub options: ChunkingOptions,
    /// Derived metadata.
    pub metadata: ContextMetadata,
}

impl SegmentationContext {
    /// Creates a context and derives its metadata.
    #[must_use]
    pub fn new(
        content: impl Into<String>,
        file_path: Option<&str>,
        language: Option<&str>,
        options: ChunkingOptions,
    ) -> Self {
        let content = content.into();
        let language = language
            .map(normalize_language)
            .filter(|lang| !lang.is_empty());
        let lines = line_count(&content);

        let metadata = ContextMetadata {
            content_length: content.len(),
            line_count: lines,
            is_small_file: lines <= SMALL_FILE_MAX_LINES && content.len() < SMALL_FILE_MAX_BYTES,
            is_code_file: language.as_deref().is_some_and(is_code_language),
            is_markdown_file: language.as_deref().is_some_and(is_markdown_language),
        };

        Self {
            content,
            file_path: file_path.map(str::to_string),
            language,
            options,
            metadata,
        }
    }

    /// Language name for chunk metadata.
    #[must_use]
    pub fn language_or_default(&self) -> &str {
        self.language.as_deref().unwrap_or(UNKNOWN_LANGUAGE)
    }

    /// Content split into lines.
    #[must_use]
    pub fn lines(&self) -> Vec<&str> {
        split_lines(&self.content)
    }

    /// Returns a copy carrying different options.
    #[must_use]
    pub fn with_options(&self, options: ChunkingOptions) -> Self {
        Self {
            options,
            ..self.clone()
        }
    }
}
