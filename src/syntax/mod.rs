//! Syntax layer used by the standardization strategy.
//!
//! A [`SyntaxParser`] turns source text into a tree-sitter [`Tree`]; a
//! [`QueryNormalizer`] runs the registered queries over that tree and
//! flattens the matches into [`StructureConstruct`]s. The tree never
//! leaves this layer's callers: strategies turn constructs into chunks.

pub mod normalizer;
pub mod parser;
pub mod queries;

pub use normalizer::TreeSitterNormalizer;
pub use parser::TreeSitterParser;
pub use queries::{QueryRegistry, QueryType};

use crate::error::Result;
use serde::Serialize;
use std::fmt;
pub use tree_sitter::Tree;

/// Kind of an extracted construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstructKind {
    /// Free function.
    Function,
    /// Class, struct, enum, trait or impl block.
    Class,
    /// Method defined inside a container.
    Method,
    /// Import or use statement.
    Import,
}

impl ConstructKind {
    /// Parses the kind from a `@definition.<kind>` capture suffix.
    #[must_use]
    pub fn from_capture(capture: &str) -> Option<Self> {
        match capture.strip_prefix("definition.")? {
            "function" => Some(Self::Function),
            "class" => Some(Self::Class),
            "method" => Some(Self::Method),
            "import" => Some(Self::Import),
            _ => None,
        }
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Method => "method",
            Self::Import => "import",
        }
    }
}

impl fmt::Display for ConstructKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named construct found in the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructureConstruct {
    /// Construct kind.
    pub kind: ConstructKind,
    /// Declared name; empty for imports.
    pub name: String,
    /// First line (1-based).
    pub start_line: usize,
    /// Last line (inclusive).
    pub end_line: usize,
    /// Names of other constructs referenced from this one.
    pub dependencies: Vec<String>,
    /// Declaration modifiers found on the first line.
    pub modifiers: Vec<String>,
}

impl StructureConstruct {
    /// Returns whether `other` lies within this construct's line range.
    #[must_use]
    pub const fn contains(&self, other: &Self) -> bool {
        self.start_line <= other.start_line && other.end_line <= self.end_line
    }
}

/// Produces a syntax tree for source text.
pub trait SyntaxParser: Send + Sync {
    /// Returns whether a grammar is available for `language`.
    fn supports(&self, language: &str) -> bool;

    /// Parses `content`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SegmentationError::ParseFailed`] when no grammar is
    /// available or the parser gives up.
    fn parse(&self, language: &str, content: &str) -> Result<Tree>;
}

/// Flattens a syntax tree into constructs.
pub trait QueryNormalizer: Send + Sync {
    /// Extracts constructs in source order.
    ///
    /// Returns `Ok(None)` when no query is registered for `language`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SegmentationError::NormalizationFailed`] when a
    /// query cannot be compiled or run.
    fn normalize(
        &self,
        tree: &Tree,
        language: &str,
        content: &str,
    ) -> Result<Option<Vec<StructureConstruct>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_capture() {
        assert_eq!(
            ConstructKind::from_capture("definition.function"),
            Some(ConstructKind::Function)
        );
        assert_eq!(
            ConstructKind::from_capture("definition.class"),
            Some(ConstructKind::Class)
        );
        assert_eq!(ConstructKind::from_capture("name"), None);
        assert_eq!(ConstructKind::from_capture("definition.other"), None);
    }

    #[test]
    fn test_contains() {
        let outer = StructureConstruct {
            kind: ConstructKind::Class,
            name: "A".to_string(),
            start_line: 1,
            end_line: 10,
            dependencies: vec![],
            modifiers: vec![],
        };
        let inner = StructureConstruct {
            kind: ConstructKind::Method,
            name: "b".to_string(),
            start_line: 3,
            end_line: 5,
            dependencies: vec![],
            modifiers: vec![],
        };
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
    }
}
