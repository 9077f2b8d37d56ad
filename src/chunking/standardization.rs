//! Standardization segmentation strategy.
//!
//! Parses the content, normalizes the tree into constructs and emits one
//! chunk per outermost construct. Nested constructs are folded into their
//! parent. Lines between constructs become `code` (or `import`) chunks so
//! the output still tiles the file.

use crate::chunking::traits::SegmentationStrategy;
use crate::chunking::{build_chunk, line_ranges};
use crate::core::{Chunk, ChunkType, SegmentationContext};
use crate::error::Result;
use crate::syntax::{ConstructKind, QueryNormalizer, StructureConstruct, SyntaxParser};
use std::sync::Arc;

/// Strategy name.
pub const STANDARDIZATION_STRATEGY: &str = "standardization";

/// Strategy backed by a syntax parser and a query normalizer.
pub struct StandardizationStrategy {
    parser: Arc<dyn SyntaxParser>,
    normalizer: Arc<dyn QueryNormalizer>,
}

impl std::fmt::Debug for StandardizationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandardizationStrategy").finish_non_exhaustive()
    }
}

impl StandardizationStrategy {
    /// Creates the strategy.
    #[must_use]
    pub fn new(parser: Arc<dyn SyntaxParser>, normalizer: Arc<dyn QueryNormalizer>) -> Self {
        Self { parser, normalizer }
    }

    /// Runs parser and normalizer. `None` means "no query for this language".
    fn extract(&self, ctx: &SegmentationContext, language: &str) -> Result<Option<Vec<StructureConstruct>>> {
        let tree = self.parser.parse(language, &ctx.content)?;
        self.normalizer.normalize(&tree, language, &ctx.content)
    }

    fn construct_chunk(
        ctx: &SegmentationContext,
        lines: &[&str],
        construct: &StructureConstruct,
    ) -> Chunk {
        let mut chunk = build_chunk(
            ctx,
            lines,
            construct.start_line,
            construct.end_line,
            ChunkType::Standardization,
            STANDARDIZATION_STRATEGY,
        );
        match construct.kind {
            ConstructKind::Function | ConstructKind::Method => {
                chunk.metadata.function_name = Some(construct.name.clone());
            }
            ConstructKind::Class => {
                chunk.metadata.class_name = Some(construct.name.clone());
            }
            ConstructKind::Import => {}
        }
        chunk.metadata.dependencies.clone_from(&construct.dependencies);
        chunk.metadata.modifiers.clone_from(&construct.modifiers);
        chunk
    }

    /// Emits the lines `first..=last` between constructs.
    fn gap_chunks(
        ctx: &SegmentationContext,
        lines: &[&str],
        first: usize,
        last: usize,
        imports: &[(usize, usize)],
        out: &mut Vec<Chunk>,
    ) {
        let ranges = line_ranges(
            lines,
            first,
            last,
            ctx.options.max_chunk_size,
            ctx.options.max_lines_per_chunk,
        );
        for (start, end) in ranges {
            let only_imports = (start..=end).all(|line_no| {
                lines[line_no - 1].trim().is_empty()
                    || imports.iter().any(|&(s, e)| s <= line_no && line_no <= e)
            }) && (start..=end).any(|line_no| !lines[line_no - 1].trim().is_empty());
            let chunk_type = if only_imports {
                ChunkType::Import
            } else {
                ChunkType::Code
            };
            out.push(build_chunk(ctx, lines, start, end, chunk_type, STANDARDIZATION_STRATEGY));
        }
    }
}

/// Keeps constructs not nested in (or overlapping) an earlier one.
///
/// Expects constructs sorted by start line, longer first.
fn outermost(constructs: &[StructureConstruct]) -> Vec<&StructureConstruct> {
    let mut kept: Vec<&StructureConstruct> = Vec::new();
    for construct in constructs {
        if kept.last().is_some_and(|last| construct.start_line <= last.end_line) {
            continue;
        }
        kept.push(construct);
    }
    kept
}

impl SegmentationStrategy for StandardizationStrategy {
    fn segment(&self, ctx: &SegmentationContext) -> Result<Vec<Chunk>> {
        if ctx.content.is_empty() {
            return Ok(Vec::new());
        }
        let Some(language) = ctx.language.as_deref() else {
            return Ok(Vec::new());
        };

        let constructs = match self.extract(ctx, language) {
            Ok(Some(constructs)) => constructs,
            Ok(None) => {
                tracing::debug!(language, "no query registered, declining");
                return Ok(Vec::new());
            }
            Err(e) if ctx.options.standardization_fallback => {
                tracing::warn!(language, error = %e, "standardization failed, falling back");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let (imports, named): (Vec<_>, Vec<_>) = constructs
            .into_iter()
            .partition(|c| c.kind == ConstructKind::Import);
        if named.is_empty() {
            return Ok(Vec::new());
        }
        let import_ranges: Vec<(usize, usize)> =
            imports.iter().map(|c| (c.start_line, c.end_line)).collect();

        let lines = ctx.lines();
        let last_line = lines.len();
        let mut chunks = Vec::new();
        let mut next = 1;

        for construct in outermost(&named) {
            if construct.start_line > last_line {
                break;
            }
            if construct.start_line > next {
                Self::gap_chunks(ctx, &lines, next, construct.start_line - 1, &import_ranges, &mut chunks);
            }
            let mut bounded = construct.clone();
            bounded.end_line = bounded.end_line.min(last_line);
            chunks.push(Self::construct_chunk(ctx, &lines, &bounded));
            next = bounded.end_line + 1;
        }
        if next <= last_line {
            Self::gap_chunks(ctx, &lines, next, last_line, &import_ranges, &mut chunks);
        }

        tracing::debug!(
            language,
            constructs = named.len(),
            chunks = chunks.len(),
            "standardized"
        );
        Ok(chunks)
    }

    fn can_handle(&self, ctx: &SegmentationContext) -> bool {
        ctx.options.enable_standardization
            && ctx.metadata.is_code_file
            && ctx
                .language
                .as_deref()
                .is_some_and(|lang| self.parser.supports(lang))
    }

    fn name(&self) -> &'static str {
        STANDARDIZATION_STRATEGY
    }

    fn priority(&self) -> u32 {
        2
    }

    fn description(&self) -> &'static str {
        "Extracts functions and types from a syntax tree"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ChunkingOptions;
    use crate::error::SegmentationError;
    use crate::syntax::{Tree, TreeSitterNormalizer, TreeSitterParser};

    struct FailingParser;

    impl SyntaxParser for FailingParser {
        fn supports(&self, _language: &str) -> bool {
            true
        }

        fn parse(&self, language: &str, _content: &str) -> Result<Tree> {
            Err(SegmentationError::ParseFailed {
                language: language.to_string(),
                reason: "simulated".to_string(),
            }
            .into())
        }
    }

    fn strategy() -> StandardizationStrategy {
        StandardizationStrategy::new(
            Arc::new(TreeSitterParser::new()),
            Arc::new(TreeSitterNormalizer::default()),
        )
    }

    fn failing() -> StandardizationStrategy {
        StandardizationStrategy::new(
            Arc::new(FailingParser),
            Arc::new(TreeSitterNormalizer::default()),
        )
    }

    fn ctx(content: &str, language: &str, fallback: bool) -> SegmentationContext {
        let options = ChunkingOptions {
            standardization_fallback: fallback,
            ..ChunkingOptions::default()
        };
        SegmentationContext::new(content, None, Some(language), options)
    }

    #[test]
    fn test_outermost_constructs_tile() {
        let content = "use std::io;\n\nstruct A {\n    x: u32,\n}\n\nimpl A {\n    fn get(&self) -> u32 {\n        self.x\n    }\n}\n";
        let chunks = strategy().segment(&ctx(content, "rust", true)).unwrap();

        let spans: Vec<_> = chunks.iter().map(|c| (c.start_line(), c.end_line())).collect();
        assert_eq!(spans, vec![(1, 2), (3, 5), (6, 6), (7, 11), (12, 12)]);
        assert_eq!(chunks[0].chunk_type(), ChunkType::Import);
        assert_eq!(chunks[1].chunk_type(), ChunkType::Standardization);
        assert_eq!(chunks[1].metadata.class_name.as_deref(), Some("A"));
        assert_eq!(chunks[2].chunk_type(), ChunkType::Code);
    }

    #[test]
    fn test_function_names() {
        let content = "def a():\n    return b()\n\ndef b():\n    return 1\n";
        let chunks = strategy().segment(&ctx(content, "python", true)).unwrap();
        let names: Vec<_> = chunks
            .iter()
            .filter_map(|c| c.metadata.function_name.as_deref())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(chunks[0].metadata.dependencies, vec!["b".to_string()]);
    }

    #[test]
    fn test_parse_failure_with_fallback_declines() {
        let chunks = failing().segment(&ctx("fn a() {}", "rust", true)).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_parse_failure_without_fallback_propagates() {
        let err = failing().segment(&ctx("fn a() {}", "rust", false)).unwrap_err();
        assert!(err.is_parse_failure());
    }

    #[test]
    fn test_no_constructs_declines() {
        let chunks = strategy().segment(&ctx("let x = 1;\n", "javascript", true)).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_empty_declines() {
        assert!(strategy().segment(&ctx("", "rust", false)).unwrap().is_empty());
    }

    #[test]
    fn test_can_handle() {
        let s = strategy();
        assert!(s.can_handle(&ctx("fn a() {}", "rust", true)));
        assert!(!s.can_handle(&ctx("int a;", "c", true)));
        assert!(!s.can_handle(&ctx("# a", "markdown", true)));
    }
}
