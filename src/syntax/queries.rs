//! Query-pattern registry.
//!
//! Patterns are embedded per `(language, query type)`. Compiled queries are
//! cached so each pattern is compiled at most once per registry.
//!
//! Capture naming convention:
//! - `name` → construct name
//! - `definition.function` → full function definition
//! - `definition.class` → full class/struct/enum/trait definition
//! - `definition.method` → full method definition
//! - `definition.import` → import statement

use crate::error::{Result, SegmentationError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tree_sitter::{Language, Query};

/// Category of query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    /// Function and method definitions.
    Functions,
    /// Type definitions.
    Classes,
    /// Import statements.
    Imports,
}

impl QueryType {
    /// All query types in extraction order.
    pub const ALL: [Self; 3] = [Self::Functions, Self::Classes, Self::Imports];

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Functions => "functions",
            Self::Classes => "classes",
            Self::Imports => "imports",
        }
    }

    /// Parses a query type name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "functions" | "function" => Some(Self::Functions),
            "classes" | "class" => Some(Self::Classes),
            "imports" | "import" => Some(Self::Imports),
            _ => None,
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const RUST_FUNCTIONS: &str = r"
(function_item name: (identifier) @name) @definition.function
";

const RUST_CLASSES: &str = r"
(struct_item name: (type_identifier) @name) @definition.class
(enum_item name: (type_identifier) @name) @definition.class
(trait_item name: (type_identifier) @name) @definition.class
(impl_item type: (_) @name) @definition.class
(mod_item name: (identifier) @name body: (declaration_list)) @definition.class
";

const RUST_IMPORTS: &str = r"
(use_declaration) @definition.import
(extern_crate_declaration) @definition.import
";

const PYTHON_FUNCTIONS: &str = r"
(function_definition name: (identifier) @name) @definition.function
";

const PYTHON_CLASSES: &str = r"
(class_definition name: (identifier) @name) @definition.class
";

const PYTHON_IMPORTS: &str = r"
(import_statement) @definition.import
(import_from_statement) @definition.import
";

const JAVASCRIPT_FUNCTIONS: &str = r"
(function_declaration name: (identifier) @name) @definition.function
(generator_function_declaration name: (identifier) @name) @definition.function
(method_definition name: (property_identifier) @name) @definition.method
(lexical_declaration
  (variable_declarator
    name: (identifier) @name
    value: (arrow_function))) @definition.function
";

const JAVASCRIPT_CLASSES: &str = r"
(class_declaration name: (identifier) @name) @definition.class
";

const JAVASCRIPT_IMPORTS: &str = r"
(import_statement) @definition.import
";

const GO_FUNCTIONS: &str = r"
(function_declaration name: (identifier) @name) @definition.function
(method_declaration name: (field_identifier) @name) @definition.method
";

const GO_CLASSES: &str = r"
(type_declaration (type_spec name: (type_identifier) @name)) @definition.class
";

const GO_IMPORTS: &str = r"
(import_declaration) @definition.import
";

/// Languages with embedded patterns.
pub const QUERY_LANGUAGES: &[&str] = &["go", "javascript", "python", "rust"];

/// Returns the tree-sitter grammar for a normalized language name.
#[must_use]
pub fn grammar(language: &str) -> Option<Language> {
    match language {
        "rust" => Some(tree_sitter_rust::LANGUAGE.into()),
        "python" => Some(tree_sitter_python::LANGUAGE.into()),
        "javascript" => Some(tree_sitter_javascript::LANGUAGE.into()),
        "go" => Some(tree_sitter_go::LANGUAGE.into()),
        _ => None,
    }
}

/// Registry of query patterns and their compiled form.
///
/// # Examples
///
/// ```
/// use codesplit::syntax::{QueryRegistry, QueryType};
///
/// let registry = QueryRegistry::new();
/// assert!(registry.pattern("rust", QueryType::Functions).is_some());
/// assert!(registry.pattern("cobol", QueryType::Functions).is_none());
/// assert!(registry.get("cobol", QueryType::Functions).unwrap().is_none());
/// ```
#[derive(Default)]
pub struct QueryRegistry {
    compiled: RwLock<HashMap<(String, QueryType), Arc<Query>>>,
}

impl fmt::Debug for QueryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryRegistry")
            .field("compiled", &self.compiled.read().len())
            .finish()
    }
}

impl QueryRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw pattern source, or `None` when unsupported.
    #[must_use]
    pub fn pattern(&self, language: &str, query_type: QueryType) -> Option<&'static str> {
        let pattern = match (language, query_type) {
            ("rust", QueryType::Functions) => RUST_FUNCTIONS,
            ("rust", QueryType::Classes) => RUST_CLASSES,
            ("rust", QueryType::Imports) => RUST_IMPORTS,
            ("python", QueryType::Functions) => PYTHON_FUNCTIONS,
            ("python", QueryType::Classes) => PYTHON_CLASSES,
            ("python", QueryType::Imports) => PYTHON_IMPORTS,
            ("javascript", QueryType::Functions) => JAVASCRIPT_FUNCTIONS,
            ("javascript", QueryType::Classes) => JAVASCRIPT_CLASSES,
            ("javascript", QueryType::Imports) => JAVASCRIPT_IMPORTS,
            ("go", QueryType::Functions) => GO_FUNCTIONS,
            ("go", QueryType::Classes) => GO_CLASSES,
            ("go", QueryType::Imports) => GO_IMPORTS,
            _ => return None,
        };
        Some(pattern.trim())
    }

    /// Returns whether any pattern exists for `language`.
    #[must_use]
    pub fn supports(&self, language: &str) -> bool {
        QUERY_LANGUAGES.contains(&language)
    }

    /// Returns the compiled query, compiling and caching it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentationError::NormalizationFailed`] if the pattern does
    /// not compile against the grammar.
    pub fn get(&self, language: &str, query_type: QueryType) -> Result<Option<Arc<Query>>> {
        let key = (language.to_string(), query_type);
        if let Some(query) = self.compiled.read().get(&key) {
            return Ok(Some(Arc::clone(query)));
        }

        let (Some(source), Some(grammar)) = (self.pattern(language, query_type), grammar(language))
        else {
            return Ok(None);
        };

        let query = Query::new(&grammar, source).map_err(|e| {
            SegmentationError::NormalizationFailed {
                language: language.to_string(),
                reason: format!("{query_type} query: {e}"),
            }
        })?;
        let query = Arc::new(query);
        self.compiled.write().insert(key, Arc::clone(&query));
        tracing::debug!(language, query_type = %query_type, "compiled query");
        Ok(Some(query))
    }

    /// Number of compiled queries held.
    #[must_use]
    pub fn compiled_count(&self) -> usize {
        self.compiled.read().len()
    }

    /// Drops every compiled query.
    pub fn clear(&self) {
        self.compiled.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("rust")]
    #[test_case("python")]
    #[test_case("javascript")]
    #[test_case("go")]
    fn test_all_patterns_compile(language: &str) {
        let registry = QueryRegistry::new();
        for query_type in QueryType::ALL {
            let query = registry.get(language, query_type).unwrap();
            assert!(query.is_some(), "{language} {query_type}");
        }
        assert_eq!(registry.compiled_count(), 3);
    }

    #[test]
    fn test_pattern_reload_is_identical() {
        let first = QueryRegistry::new();
        let second = QueryRegistry::new();
        for &language in QUERY_LANGUAGES {
            for query_type in QueryType::ALL {
                let a = first.pattern(language, query_type).unwrap();
                let b = second.pattern(language, query_type).unwrap();
                assert_eq!(a.as_bytes(), b.as_bytes());
                assert_eq!(a, first.pattern(language, query_type).unwrap());
            }
        }
    }

    #[test]
    fn test_compiled_query_is_cached() {
        let registry = QueryRegistry::new();
        let a = registry.get("rust", QueryType::Functions).unwrap().unwrap();
        let b = registry.get("rust", QueryType::Functions).unwrap().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        registry.clear();
        assert_eq!(registry.compiled_count(), 0);
    }

    #[test]
    fn test_unsupported_language() {
        let registry = QueryRegistry::new();
        assert!(!registry.supports("cobol"));
        assert!(registry.get("cobol", QueryType::Classes).unwrap().is_none());
    }

    #[test]
    fn test_query_type_parse() {
        assert_eq!(QueryType::parse("Functions"), Some(QueryType::Functions));
        assert_eq!(QueryType::parse("import"), Some(QueryType::Imports));
        assert_eq!(QueryType::parse("x"), None);
    }
}
