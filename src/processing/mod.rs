//! Post-processing pipeline.
//!
//! A strategy's raw chunks pass through three processors in fixed order:
//!
//! 1. [`OverlapProcessor`]: duplicates context across split boundaries
//! 2. [`ChunkFilter`]: folds tiny chunks into their neighbours
//! 3. [`Rebalancer`]: splits oversized and merges undersized chunks

pub mod filter;
pub mod overlap;
pub mod rebalance;

pub use filter::{ChunkFilter, is_normal_size, quality_score};
pub use overlap::OverlapProcessor;
pub use rebalance::Rebalancer;

use crate::chunking::ComplexityCalculator;
use crate::core::{Chunk, SegmentationContext};

/// Input shared by every processor.
#[derive(Debug, Clone, Copy)]
pub struct ProcessingContext<'a> {
    /// The request being processed.
    pub source: &'a SegmentationContext,
    /// Resource guards forced the degraded path.
    pub degraded: bool,
}

impl<'a> ProcessingContext<'a> {
    /// Creates a processing context.
    #[must_use]
    pub const fn new(source: &'a SegmentationContext, degraded: bool) -> Self {
        Self { source, degraded }
    }
}

/// A single post-processing stage.
pub trait PostProcessor: Send + Sync {
    /// Stage name for logging.
    fn name(&self) -> &'static str;

    /// Returns whether the stage runs for this request.
    fn should_apply(&self, ctx: &ProcessingContext<'_>) -> bool;

    /// Transforms the chunk list.
    fn process(&self, chunks: Vec<Chunk>, ctx: &ProcessingContext<'_>) -> Vec<Chunk>;
}

/// Ordered list of post-processors.
pub struct Pipeline {
    processors: Vec<Box<dyn PostProcessor>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.processors.iter().map(|p| p.name()))
            .finish()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard()
    }
}

impl Pipeline {
    /// Overlap, filter, rebalance.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            processors: vec![
                Box::new(OverlapProcessor::new()),
                Box::new(ChunkFilter::new()),
                Box::new(Rebalancer::new()),
            ],
        }
    }

    /// Stage names in execution order.
    #[must_use]
    pub fn processor_names(&self) -> Vec<&'static str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    /// Runs every applicable stage.
    #[must_use]
    pub fn run(&self, mut chunks: Vec<Chunk>, ctx: &ProcessingContext<'_>) -> Vec<Chunk> {
        if ctx.source.content.is_empty() || chunks.is_empty() {
            return chunks;
        }
        for processor in &self.processors {
            if !processor.should_apply(ctx) {
                continue;
            }
            let before = chunks.len();
            chunks = processor.process(chunks, ctx);
            tracing::debug!(
                stage = processor.name(),
                before,
                after = chunks.len(),
                "post-processed"
            );
        }
        chunks
    }
}

/// Merges `second` into `first`.
///
/// Lines the two chunks share are kept once. Type and names come from
/// `first`, falling back to `second` for absent names.
#[must_use]
pub fn merge_chunks(first: &Chunk, second: &Chunk) -> Chunk {
    let mut content = first.content.clone();
    if second.start_line() > first.end_line() || first.is_empty() {
        if !first.is_empty() {
            content.push('\n');
        }
        content.push_str(&second.content);
    } else {
        let shared = first.end_line() + 1 - second.start_line();
        let rest: Vec<&str> = second.content.split('\n').skip(shared).collect();
        if !rest.is_empty() {
            content.push('\n');
            content.push_str(&rest.join("\n"));
        }
    }

    let mut metadata = first.metadata.clone();
    metadata.start_line = first.start_line().min(second.start_line());
    metadata.end_line = first.end_line().max(second.end_line());
    metadata.complexity = ComplexityCalculator::calculate(&content);
    metadata.has_overlap = first.metadata.has_overlap || second.metadata.has_overlap;
    if metadata.function_name.is_none() {
        metadata.function_name.clone_from(&second.metadata.function_name);
    }
    if metadata.class_name.is_none() {
        metadata.class_name.clone_from(&second.metadata.class_name);
    }
    if metadata.section.is_none() {
        metadata.section.clone_from(&second.metadata.section);
    }
    if metadata.code_language.is_none() {
        metadata.code_language.clone_from(&second.metadata.code_language);
    }
    for dep in &second.metadata.dependencies {
        if !metadata.dependencies.contains(dep) {
            metadata.dependencies.push(dep.clone());
        }
    }
    Chunk::new(content, metadata)
}

/// Merges `tiny` into the front of `next`, keeping `next`'s classification.
#[must_use]
pub fn merge_into_next(tiny: &Chunk, next: &Chunk) -> Chunk {
    let mut merged = merge_chunks(tiny, next);
    merged.metadata.chunk_type = next.metadata.chunk_type;
    merged.metadata.function_name.clone_from(&next.metadata.function_name);
    merged.metadata.class_name.clone_from(&next.metadata.class_name);
    merged.metadata.section.clone_from(&next.metadata.section);
    merged.metadata.code_language.clone_from(&next.metadata.code_language);
    merged.metadata.modifiers.clone_from(&next.metadata.modifiers);
    merged
}
