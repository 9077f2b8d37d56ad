//! Segmentation strategy trait.
//!
//! Strategies are stateless: the same context always yields the same
//! chunks, so a single instance can be shared across threads.

use crate::core::{Chunk, SegmentationContext};
use crate::error::{Result, SegmentationError};

/// Trait for segmenting content into chunks.
///
/// Returning an empty list means "decline, try the next strategy".
///
/// # Examples
///
/// ```
/// use codesplit::chunking::{LineStrategy, SegmentationStrategy};
/// use codesplit::core::{ChunkingOptions, SegmentationContext};
///
/// let ctx = SegmentationContext::new("console.log('x');", None, Some("javascript"), ChunkingOptions::default());
/// let chunks = LineStrategy::new().segment(&ctx).unwrap();
/// assert_eq!(chunks.len(), 1);
/// assert_eq!(chunks[0].metadata.start_line, 1);
/// assert_eq!(chunks[0].metadata.end_line, 1);
/// ```
pub trait SegmentationStrategy: Send + Sync {
    /// Segments the context into chunks.
    ///
    /// # Errors
    ///
    /// Returns an error when segmentation fails. The context manager
    /// decides whether that error is recovered.
    fn segment(&self, ctx: &SegmentationContext) -> Result<Vec<Chunk>>;

    /// Returns whether the strategy applies to this context.
    fn can_handle(&self, ctx: &SegmentationContext) -> bool;

    /// Returns the strategy name.
    fn name(&self) -> &'static str;

    /// Returns the built-in priority. Lower runs first.
    fn priority(&self) -> u32;

    /// Languages the strategy is restricted to, if any.
    fn supported_languages(&self) -> Option<Vec<String>> {
        None
    }

    /// Returns a description of the strategy.
    fn description(&self) -> &'static str {
        "No description available"
    }

    /// Validates the context before segmentation.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentationError::InvalidContext`] when the strategy
    /// cannot work with the context.
    fn validate_context(&self, ctx: &SegmentationContext) -> Result<()> {
        if let Some(languages) = self.supported_languages()
            && let Some(language) = ctx.language.as_deref()
            && !languages.iter().any(|l| l == language)
        {
            return Err(SegmentationError::InvalidContext {
                reason: format!("{} does not support {language}", self.name()),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ChunkingOptions;

    /// A minimal strategy that uses all default trait implementations
    struct MinimalStrategy;

    impl SegmentationStrategy for MinimalStrategy {
        fn segment(&self, _ctx: &SegmentationContext) -> Result<Vec<Chunk>> {
            Ok(vec![])
        }

        fn can_handle(&self, _ctx: &SegmentationContext) -> bool {
            true
        }

        fn name(&self) -> &'static str {
            "minimal"
        }

        fn priority(&self) -> u32 {
            9
        }
    }

    struct RustOnly;

    impl SegmentationStrategy for RustOnly {
        fn segment(&self, _ctx: &SegmentationContext) -> Result<Vec<Chunk>> {
            Ok(vec![])
        }

        fn can_handle(&self, _ctx: &SegmentationContext) -> bool {
            true
        }

        fn name(&self) -> &'static str {
            "rust-only"
        }

        fn priority(&self) -> u32 {
            3
        }

        fn supported_languages(&self) -> Option<Vec<String>> {
            Some(vec!["rust".to_string()])
        }
    }

    fn ctx(language: &str) -> SegmentationContext {
        SegmentationContext::new("x", None, Some(language), ChunkingOptions::default())
    }

    #[test]
    fn test_default_description() {
        assert_eq!(MinimalStrategy.description(), "No description available");
        assert!(MinimalStrategy.supported_languages().is_none());
    }

    #[test]
    fn test_default_validation_accepts_anything() {
        assert!(MinimalStrategy.validate_context(&ctx("cobol")).is_ok());
    }

    #[test]
    fn test_validation_checks_supported_languages() {
        assert!(RustOnly.validate_context(&ctx("rust")).is_ok());
        assert!(RustOnly.validate_context(&ctx("python")).is_err());
    }
}
