//! Chunk representation.
//!
//! Chunks are the unit emitted to downstream indexing: a contiguous slice
//! of the source with its line range and classification metadata.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification tag for a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    /// A function or free-standing callable.
    Function,
    /// A class, struct, trait or other type container.
    Class,
    /// A method inside a container.
    Method,
    /// Markdown section opened by a heading.
    Heading,
    /// Markdown prose without a heading.
    Paragraph,
    /// Markdown fenced code block.
    CodeBlock,
    /// Output of bracket-balance segmentation.
    Bracket,
    /// Output of plain line segmentation.
    Line,
    /// A construct extracted by the standardization strategy.
    Standardization,
    /// Semantically detected region.
    Semantic,
    /// Code between extracted constructs.
    Code,
    /// Import block.
    Import,
    /// Anything else.
    Generic,
}

impl ChunkType {
    /// Returns the lowercase tag name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Method => "method",
            Self::Heading => "heading",
            Self::Paragraph => "paragraph",
            Self::CodeBlock => "code_block",
            Self::Bracket => "bracket",
            Self::Line => "line",
            Self::Standardization => "standardization",
            Self::Semantic => "semantic",
            Self::Code => "code",
            Self::Import => "import",
            Self::Generic => "generic",
        }
    }

    /// Returns whether chunks of these two types may be merged.
    ///
    /// Types are compatible when identical, when both are structural
    /// (`function`, `class`, `method`, `semantic`), or when both are loose
    /// code (`code`, `import`).
    ///
    /// # Examples
    ///
    /// ```
    /// use codesplit::core::ChunkType;
    ///
    /// assert!(ChunkType::Function.is_compatible_with(ChunkType::Class));
    /// assert!(ChunkType::Code.is_compatible_with(ChunkType::Import));
    /// assert!(!ChunkType::Code.is_compatible_with(ChunkType::Function));
    /// ```
    #[must_use]
    pub fn is_compatible_with(self, other: Self) -> bool {
        if self == other {
            return true;
        }
        let structural = |t: Self| matches!(t, Self::Function | Self::Class | Self::Method | Self::Semantic);
        let loose = |t: Self| matches!(t, Self::Code | Self::Import);
        (structural(self) && structural(other)) || (loose(self) && loose(other))
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents a chunk of source content.
///
/// # Examples
///
/// ```
/// use codesplit::core::{Chunk, ChunkMetadata, ChunkType};
///
/// let chunk = Chunk::new(
///     "fn main() {}".to_string(),
///     ChunkMetadata::new(1, 1, "rust", ChunkType::Line),
/// );
/// assert_eq!(chunk.size(), 12);
/// assert_eq!(chunk.line_span(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk content.
    pub content: String,

    /// Chunk metadata.
    pub metadata: ChunkMetadata,
}

/// Metadata associated with a chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    /// First line of the chunk (1-based).
    pub start_line: usize,

    /// Last line of the chunk (inclusive).
    pub end_line: usize,

    /// Resolved language of the source.
    pub language: String,

    /// Source file path, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    /// Classification tag.
    #[serde(rename = "type")]
    pub chunk_type: ChunkType,

    /// Structural complexity score.
    pub complexity: f64,

    /// Enclosing or defined function name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,

    /// Enclosing or defined class name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,

    /// Markdown section title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,

    /// Fenced code block language.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_language: Option<String>,

    /// Strategy that produced the chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,

    /// Whether the chunk carries content duplicated from a neighbor.
    #[serde(default)]
    pub has_overlap: bool,

    /// Names of other constructs referenced by this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    /// Declaration modifiers (`pub`, `async`, `static`, ...).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<String>,
}

impl ChunkMetadata {
    /// Creates metadata for a line range with every optional field empty.
    #[must_use]
    pub fn new(start_line: usize, end_line: usize, language: &str, chunk_type: ChunkType) -> Self {
        Self {
            start_line,
            end_line,
            language: language.to_string(),
            file_path: None,
            chunk_type,
            complexity: 0.0,
            function_name: None,
            class_name: None,
            section: None,
            code_language: None,
            strategy: None,
            has_overlap: false,
            dependencies: Vec::new(),
            modifiers: Vec::new(),
        }
    }
}

impl Chunk {
    /// Creates a new chunk.
    #[must_use]
    pub const fn new(content: String, metadata: ChunkMetadata) -> Self {
        Self { content, metadata }
    }

    /// Returns the size of the chunk in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.content.len()
    }

    /// Checks if the chunk is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Returns the number of source lines covered.
    #[must_use]
    pub const fn line_span(&self) -> usize {
        (self.metadata.end_line + 1).saturating_sub(self.metadata.start_line)
    }

    /// Returns the first line.
    #[must_use]
    pub const fn start_line(&self) -> usize {
        self.metadata.start_line
    }

    /// Returns the last line.
    #[must_use]
    pub const fn end_line(&self) -> usize {
        self.metadata.end_line
    }

    /// Returns the chunk type.
    #[must_use]
    pub const fn chunk_type(&self) -> ChunkType {
        self.metadata.chunk_type
    }

    /// Estimates token count using the ~4 characters per token heuristic.
    #[must_use]
    pub fn estimate_tokens(&self) -> usize {
        self.content.len().div_ceil(4)
    }

    /// Returns a preview of the chunk content (first `max_len` bytes).
    #[must_use]
    pub fn preview(&self, max_len: usize) -> &str {
        if self.content.len() <= max_len {
            &self.content
        } else {
            let end = crate::io::find_char_boundary(&self.content, max_len);
            &self.content[..end]
        }
    }

    /// Checks whether this chunk's line range shares lines with another.
    #[must_use]
    pub const fn shares_lines_with(&self, other: &Self) -> bool {
        self.metadata.start_line <= other.metadata.end_line
            && other.metadata.start_line <= self.metadata.end_line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(content: &str, start: usize, end: usize) -> Chunk {
        Chunk::new(
            content.to_string(),
            ChunkMetadata::new(start, end, "rust", ChunkType::Line),
        )
    }

    #[test]
    fn test_chunk_size_and_span() {
        let c = chunk("a\nb\nc", 3, 5);
        assert_eq!(c.size(), 5);
        assert_eq!(c.line_span(), 3);
        assert_eq!(c.start_line(), 3);
        assert_eq!(c.end_line(), 5);
    }

    #[test]
    fn test_empty_chunk_span() {
        let c = chunk("", 1, 0);
        assert!(c.is_empty());
        assert_eq!(c.line_span(), 0);
    }

    #[test]
    fn test_chunk_estimate_tokens() {
        let c = chunk("Hello, world!", 1, 1);
        assert!(c.estimate_tokens() >= 3);
        assert!(c.estimate_tokens() <= 4);
    }

    #[test]
    fn test_chunk_preview() {
        let c = chunk("Hello, world!", 1, 1);
        assert_eq!(c.preview(5), "Hello");
        assert_eq!(c.preview(100), "Hello, world!");
        let c = chunk("世界", 1, 1);
        assert_eq!(c.preview(4), "世");
    }

    #[test]
    fn test_shares_lines_with() {
        let a = chunk("x", 1, 5);
        assert!(a.shares_lines_with(&chunk("y", 5, 9)));
        assert!(!a.shares_lines_with(&chunk("y", 6, 9)));
    }

    #[test]
    fn test_type_compatibility() {
        assert!(ChunkType::Line.is_compatible_with(ChunkType::Line));
        assert!(ChunkType::Method.is_compatible_with(ChunkType::Semantic));
        assert!(ChunkType::Import.is_compatible_with(ChunkType::Code));
        assert!(!ChunkType::Heading.is_compatible_with(ChunkType::Paragraph));
        assert!(!ChunkType::Function.is_compatible_with(ChunkType::Code));
    }

    #[test]
    fn test_chunk_serialization() {
        let mut c = chunk("fn a() {}", 1, 1);
        c.metadata.chunk_type = ChunkType::CodeBlock;
        c.metadata.function_name = Some("a".to_string());
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains("\"type\":\"code_block\""));
        assert!(json.contains("\"startLine\":1"));
        assert!(json.contains("\"functionName\":\"a\""));
        assert!(!json.contains("className"));

        let back: Chunk = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_chunk_type_display() {
        assert_eq!(ChunkType::CodeBlock.to_string(), "code_block");
        assert_eq!(ChunkType::Standardization.to_string(), "standardization");
    }
}
