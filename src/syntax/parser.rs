//! Tree-sitter backed parser with a parse cache.

use crate::cache::{EvictableCache, LruCache};
use crate::error::{Result, SegmentationError};
use crate::syntax::SyntaxParser;
use crate::syntax::queries::grammar;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tree_sitter::{Parser, Tree};

/// Default number of cached trees.
pub const DEFAULT_PARSE_CACHE_SIZE: usize = 64;

/// Name of the parse cache in cleanup reports.
pub const PARSE_CACHE_NAME: &str = "parse-cache";

/// Cache of parsed trees keyed by a hash of language and content.
pub type ParseCache = LruCache<u64, Tree>;

fn cache_key(language: &str, content: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    language.hash(&mut hasher);
    content.hash(&mut hasher);
    hasher.finish()
}

/// Parser for the languages with a bundled grammar.
#[derive(Debug, Clone)]
pub struct TreeSitterParser {
    cache: Arc<ParseCache>,
}

impl Default for TreeSitterParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeSitterParser {
    /// Creates a parser with the default cache size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_cache_size(DEFAULT_PARSE_CACHE_SIZE)
    }

    /// Creates a parser caching at most `entries` trees.
    #[must_use]
    pub fn with_cache_size(entries: usize) -> Self {
        Self {
            cache: Arc::new(LruCache::new(PARSE_CACHE_NAME, entries)),
        }
    }

    /// Shared handle to the parse cache, for cleanup strategies.
    #[must_use]
    pub fn cache(&self) -> Arc<ParseCache> {
        Arc::clone(&self.cache)
    }
}

impl SyntaxParser for TreeSitterParser {
    fn supports(&self, language: &str) -> bool {
        grammar(language).is_some()
    }

    fn parse(&self, language: &str, content: &str) -> Result<Tree> {
        let key = cache_key(language, content);
        if let Some(tree) = self.cache.get(&key) {
            return Ok(tree);
        }

        let failed = |reason: String| SegmentationError::ParseFailed {
            language: language.to_string(),
            reason,
        };

        let grammar = grammar(language).ok_or_else(|| failed("no grammar available".to_string()))?;
        let mut parser = Parser::new();
        parser
            .set_language(&grammar)
            .map_err(|e| failed(format!("failed to set language: {e}")))?;
        let tree = parser
            .parse(content, None)
            .ok_or_else(|| failed("parser returned no tree".to_string()))?;

        if tree.root_node().has_error() {
            tracing::debug!(language, "syntax tree contains error nodes");
        }

        // Trees hold roughly their source size plus node overhead.
        self.cache.insert_sized(key, tree.clone(), content.len() * 2);
        Ok(tree)
    }
}
