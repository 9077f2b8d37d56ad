//! Strategy registry, selection cache and execution with fallback.
//!
//! The [`ContextManager`] keeps the strategies sorted by effective priority,
//! picks one per request (caching the choice per context shape), and runs
//! it. A strategy that returns no chunks declines and the next candidate is
//! tried; a strategy that fails is retried once with the line strategy.

use crate::cache::{CacheStats, EvictableCache, LruCache};
use crate::chunking::bracket::BRACKET_STRATEGY;
use crate::chunking::markdown::MARKDOWN_STRATEGY;
use crate::chunking::standardization::STANDARDIZATION_STRATEGY;
use crate::chunking::{ComplexityCalculator, LINE_STRATEGY, LineStrategy, SegmentationStrategy};
use crate::core::{Chunk, ChunkingOptions, SegmentationContext};
use crate::error::{Error, Result, SegmentationError};
use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Name of the selection cache in logs and cleanup results.
pub const SELECTION_CACHE_NAME: &str = "strategy-selection";

/// Default number of cached selections.
pub const DEFAULT_SELECTION_CACHE_SIZE: usize = 256;

/// Preference value meaning "choose automatically".
pub const AUTO_STRATEGY: &str = "auto";

/// Why the chunks did not come from the first-choice strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// The selected strategy returned no chunks.
    StrategyDeclined,
    /// The selected strategy failed and the line strategy took over.
    StrategyFailed,
    /// Memory stayed over the limit after cleanup.
    MemoryPressure,
    /// Too many recent errors.
    ErrorThreshold,
}

impl FallbackReason {
    /// Returns the reason as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StrategyDeclined => "strategy_declined",
            Self::StrategyFailed => "strategy_failed",
            Self::MemoryPressure => "memory_pressure",
            Self::ErrorThreshold => "error_threshold",
        }
    }
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selection cache key: the context shape plus the preference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectionKey {
    language: String,
    is_code_file: bool,
    is_small_file: bool,
    is_markdown_file: bool,
    preferred: String,
}

impl SelectionKey {
    /// Builds the key for a context.
    #[must_use]
    pub fn new(ctx: &SegmentationContext, preferred: Option<&str>) -> Self {
        Self {
            language: ctx.language_or_default().to_string(),
            is_code_file: ctx.metadata.is_code_file,
            is_small_file: ctx.metadata.is_small_file,
            is_markdown_file: ctx.metadata.is_markdown_file,
            preferred: preferred.unwrap_or(AUTO_STRATEGY).to_string(),
        }
    }
}

/// Cache of selected strategy names.
pub type SelectionCache = LruCache<SelectionKey, &'static str>;

/// A strategy as registered with the manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyRegistration {
    /// Strategy name.
    pub name: &'static str,
    /// Effective priority. Lower runs first.
    pub priority: u32,
    /// Languages the strategy is restricted to, if any.
    pub supported_languages: Option<Vec<String>>,
}

/// Public summary of a strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyInfo {
    /// Strategy name.
    pub name: &'static str,
    /// Effective priority.
    pub priority: u32,
    /// Human-readable description.
    pub description: &'static str,
}

/// A strategy error that was recovered by the line strategy.
#[derive(Debug)]
pub struct StrategyFailure {
    /// Strategy that failed.
    pub strategy: &'static str,
    /// The error it returned.
    pub error: Error,
}

/// Result of [`ContextManager::execute_strategy`].
#[derive(Debug)]
pub struct Execution {
    /// Chunks produced.
    pub chunks: Vec<Chunk>,
    /// Strategy that produced them.
    pub strategy: &'static str,
    /// Set when the requested strategy failed and the line strategy ran.
    pub failure: Option<StrategyFailure>,
}

/// Result of a full selection and execution run.
#[derive(Debug)]
pub struct SelectionOutcome {
    /// Raw chunks, before post-processing.
    pub chunks: Vec<Chunk>,
    /// Strategy that produced them.
    pub strategy: &'static str,
    /// Set when the first choice did not produce the chunks.
    pub fallback_reason: Option<FallbackReason>,
    /// Errors recovered along the way.
    pub failures: Vec<StrategyFailure>,
}

/// One step of the fallback chain.
enum Attempt {
    Produced(Execution),
    Declined(&'static str),
}

struct Registered {
    strategy: Arc<dyn SegmentationStrategy>,
    priority: u32,
}

/// Selects and runs segmentation strategies.
pub struct ContextManager {
    registry: RwLock<Vec<Registered>>,
    fallback: Arc<dyn SegmentationStrategy>,
    cache: Arc<SelectionCache>,
}

impl fmt::Debug for ContextManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextManager")
            .field("strategies", &self.registrations())
            .field("cached", &self.cache.stats())
            .finish_non_exhaustive()
    }
}

impl ContextManager {
    /// Creates a manager over `strategies`, sorted by the priorities in
    /// `options`. A line strategy is added when none is registered.
    #[must_use]
    pub fn new(strategies: Vec<Arc<dyn SegmentationStrategy>>, options: &ChunkingOptions) -> Self {
        Self::with_cache_size(strategies, options, DEFAULT_SELECTION_CACHE_SIZE)
    }

    /// Like [`ContextManager::new`] with an explicit selection cache size.
    #[must_use]
    pub fn with_cache_size(
        mut strategies: Vec<Arc<dyn SegmentationStrategy>>,
        options: &ChunkingOptions,
        cache_size: usize,
    ) -> Self {
        let existing = strategies.iter().find(|s| s.name() == LINE_STRATEGY).cloned();
        let fallback = match existing {
            Some(line) => line,
            None => {
                let line: Arc<dyn SegmentationStrategy> = Arc::new(LineStrategy::new());
                strategies.push(Arc::clone(&line));
                line
            }
        };

        let registry = strategies
            .into_iter()
            .map(|strategy| Registered {
                priority: options.priority_for(strategy.name(), strategy.priority()),
                strategy,
            })
            .collect();

        let manager = Self {
            registry: RwLock::new(registry),
            fallback,
            cache: Arc::new(LruCache::new(SELECTION_CACHE_NAME, cache_size)),
        };
        manager.sort();
        manager
    }

    fn sort(&self) {
        self.registry.write().sort_by_key(|r| r.priority);
    }

    /// Recomputes priorities from `options`, re-sorts and drops cached
    /// selections.
    pub fn reprioritize(&self, options: &ChunkingOptions) {
        {
            let mut registry = self.registry.write();
            for entry in registry.iter_mut() {
                entry.priority = options.priority_for(entry.strategy.name(), entry.strategy.priority());
            }
            registry.sort_by_key(|r| r.priority);
        }
        self.cache.evict_all();
        tracing::debug!(order = ?self.strategy_names(), "strategy priorities updated");
    }

    /// Registered strategies in priority order.
    #[must_use]
    pub fn registrations(&self) -> Vec<StrategyRegistration> {
        self.registry
            .read()
            .iter()
            .map(|r| StrategyRegistration {
                name: r.strategy.name(),
                priority: r.priority,
                supported_languages: r.strategy.supported_languages(),
            })
            .collect()
    }

    /// Strategy summaries in priority order.
    #[must_use]
    pub fn strategy_infos(&self) -> Vec<StrategyInfo> {
        self.registry
            .read()
            .iter()
            .map(|r| StrategyInfo {
                name: r.strategy.name(),
                priority: r.priority,
                description: r.strategy.description(),
            })
            .collect()
    }

    /// Strategy names in priority order.
    #[must_use]
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.registry.read().iter().map(|r| r.strategy.name()).collect()
    }

    /// The selection cache, for cleanup registration.
    #[must_use]
    pub fn selection_cache(&self) -> Arc<SelectionCache> {
        Arc::clone(&self.cache)
    }

    /// Selection cache statistics.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn find(&self, name: &str) -> Option<Arc<dyn SegmentationStrategy>> {
        self.registry
            .read()
            .iter()
            .find(|r| r.strategy.name() == name)
            .map(|r| Arc::clone(&r.strategy))
    }

    /// Strategies that can handle `ctx`, in priority order.
    #[must_use]
    pub fn candidates(&self, ctx: &SegmentationContext) -> Vec<Arc<dyn SegmentationStrategy>> {
        self.registry
            .read()
            .iter()
            .filter(|r| r.strategy.can_handle(ctx))
            .map(|r| Arc::clone(&r.strategy))
            .collect()
    }

    /// Picks a strategy for `ctx`, consulting the selection cache.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentationError::UnknownStrategy`] when `preferred` names
    /// no registered strategy.
    pub fn select_strategy(
        &self,
        ctx: &SegmentationContext,
        preferred: Option<&str>,
    ) -> Result<Arc<dyn SegmentationStrategy>> {
        let preferred = preferred.filter(|p| !p.is_empty() && *p != AUTO_STRATEGY);
        if let Some(name) = preferred
            && self.find(name).is_none()
        {
            return Err(SegmentationError::UnknownStrategy {
                name: name.to_string(),
            }
            .into());
        }

        let key = SelectionKey::new(ctx, preferred);
        if let Some(name) = self.cache.get(&key) {
            if let Some(strategy) = self.find(name)
                && strategy.can_handle(ctx)
            {
                tracing::debug!(strategy = name, "strategy selection cache hit");
                return Ok(strategy);
            }
            self.cache.remove(&key);
        }

        let selected = self.choose(ctx, preferred);
        tracing::debug!(
            strategy = selected.name(),
            language = ctx.language_or_default(),
            "strategy selected"
        );
        self.cache.insert(key, selected.name());
        Ok(selected)
    }

    fn choose(&self, ctx: &SegmentationContext, preferred: Option<&str>) -> Arc<dyn SegmentationStrategy> {
        let candidates = self.candidates(ctx);
        let pick = |name: &str| candidates.iter().find(|s| s.name() == name).cloned();

        if let Some(name) = preferred
            && let Some(strategy) = pick(name)
        {
            return strategy;
        }

        let meta = &ctx.metadata;
        let heuristic = if meta.is_markdown_file {
            pick(MARKDOWN_STRATEGY)
        } else if meta.is_small_file {
            pick(LINE_STRATEGY)
        } else if meta.is_code_file {
            if ctx.options.enable_semantic_detection && ComplexityCalculator::is_complex(&ctx.content) {
                pick(STANDARDIZATION_STRATEGY).or_else(|| pick(BRACKET_STRATEGY))
            } else {
                pick(BRACKET_STRATEGY)
            }
        } else {
            None
        };

        heuristic
            .or_else(|| candidates.first().cloned())
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }

    /// Validates and runs one strategy, timing the call.
    ///
    /// A failure is retried once with the line strategy.
    ///
    /// # Errors
    ///
    /// Propagates parse and normalization failures, and any failure of the
    /// line strategy itself.
    pub fn execute_strategy(
        &self,
        strategy: &dyn SegmentationStrategy,
        ctx: &SegmentationContext,
    ) -> Result<Execution> {
        let name = strategy.name();
        let started = Instant::now();
        let result = strategy
            .validate_context(ctx)
            .and_then(|()| strategy.segment(ctx));
        let elapsed_us = started.elapsed().as_micros();

        match result {
            Ok(chunks) => {
                tracing::debug!(strategy = name, chunks = chunks.len(), elapsed_us, "strategy executed");
                Ok(Execution {
                    chunks,
                    strategy: name,
                    failure: None,
                })
            }
            Err(error) if error.is_parse_failure() || name == LINE_STRATEGY => Err(error),
            Err(error) => {
                tracing::warn!(strategy = name, %error, "strategy failed, retrying with line strategy");
                let chunks = self.fallback.segment(ctx)?;
                Ok(Execution {
                    chunks,
                    strategy: LINE_STRATEGY,
                    failure: Some(StrategyFailure {
                        strategy: name,
                        error,
                    }),
                })
            }
        }
    }

    fn attempt(&self, strategy: &dyn SegmentationStrategy, ctx: &SegmentationContext) -> Result<Attempt> {
        let execution = self.execute_strategy(strategy, ctx)?;
        if execution.chunks.is_empty() && execution.failure.is_none() {
            tracing::debug!(strategy = execution.strategy, "strategy declined");
            return Ok(Attempt::Declined(execution.strategy));
        }
        Ok(Attempt::Produced(execution))
    }

    /// Selects a strategy and runs the fallback chain: the selection, the
    /// remaining candidates in priority order, then the line strategy.
    ///
    /// # Errors
    ///
    /// See [`ContextManager::select_strategy`] and
    /// [`ContextManager::execute_strategy`].
    pub fn run(&self, ctx: &SegmentationContext) -> Result<SelectionOutcome> {
        let first = self.select_strategy(ctx, ctx.options.preferred_strategy.as_deref())?;

        let mut chain = vec![Arc::clone(&first)];
        chain.extend(
            self.candidates(ctx)
                .into_iter()
                .filter(|s| s.name() != first.name() && s.name() != LINE_STRATEGY),
        );
        if first.name() != LINE_STRATEGY {
            chain.push(Arc::clone(&self.fallback));
        }

        let mut declined = Vec::new();
        for strategy in &chain {
            match self.attempt(strategy.as_ref(), ctx)? {
                Attempt::Declined(name) => declined.push(name),
                Attempt::Produced(execution) => {
                    let fallback_reason = if execution.failure.is_some() {
                        Some(FallbackReason::StrategyFailed)
                    } else if declined.is_empty() {
                        None
                    } else {
                        Some(FallbackReason::StrategyDeclined)
                    };
                    if !declined.is_empty() {
                        tracing::debug!(?declined, strategy = execution.strategy, "fell back after declines");
                    }
                    return Ok(SelectionOutcome {
                        chunks: execution.chunks,
                        strategy: execution.strategy,
                        fallback_reason,
                        failures: execution.failure.into_iter().collect(),
                    });
                }
            }
        }

        Ok(SelectionOutcome {
            chunks: Vec::new(),
            strategy: LINE_STRATEGY,
            fallback_reason: Some(FallbackReason::StrategyDeclined),
            failures: Vec::new(),
        })
    }

    /// Runs only the line strategy.
    ///
    /// # Errors
    ///
    /// Propagates a line strategy failure.
    pub fn run_line_only(&self, ctx: &SegmentationContext) -> Result<Vec<Chunk>> {
        self.fallback.segment(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::{BracketStrategy, MarkdownStrategy};
    use crate::core::ChunkType;

    #[derive(Debug, Clone, Copy)]
    enum Behavior {
        Produce,
        Decline,
        Fail,
        ParseFail,
    }

    /// Stand-in for the standardization strategy.
    struct Stub {
        behavior: Behavior,
    }

    impl SegmentationStrategy for Stub {
        fn segment(&self, ctx: &SegmentationContext) -> Result<Vec<Chunk>> {
            match self.behavior {
                Behavior::Produce => Ok(vec![crate::chunking::build_chunk(
                    ctx,
                    &ctx.lines(),
                    1,
                    ctx.metadata.line_count,
                    ChunkType::Standardization,
                    STANDARDIZATION_STRATEGY,
                )]),
                Behavior::Decline => Ok(Vec::new()),
                Behavior::Fail => Err(SegmentationError::StrategyFailed {
                    strategy: STANDARDIZATION_STRATEGY.to_string(),
                    reason: "boom".to_string(),
                }
                .into()),
                Behavior::ParseFail => Err(SegmentationError::ParseFailed {
                    language: "rust".to_string(),
                    reason: "bad tree".to_string(),
                }
                .into()),
            }
        }

        fn can_handle(&self, ctx: &SegmentationContext) -> bool {
            ctx.metadata.is_code_file
        }

        fn name(&self) -> &'static str {
            STANDARDIZATION_STRATEGY
        }

        fn priority(&self) -> u32 {
            2
        }
    }

    fn manager(behavior: Behavior) -> ContextManager {
        let strategies: Vec<Arc<dyn SegmentationStrategy>> = vec![
            Arc::new(LineStrategy::new()),
            Arc::new(BracketStrategy::new()),
            Arc::new(Stub { behavior }),
            Arc::new(MarkdownStrategy::new()),
        ];
        ContextManager::new(strategies, &ChunkingOptions::default())
    }

    fn complex_rust() -> String {
        (0..40)
            .map(|i| format!("fn f{i}(x: u32) -> u32 {{ if x > {i} {{ x }} else {{ {i} }} }}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn simple_rust() -> String {
        (0..40).map(|i| format!("let v{i} = {i};")).collect::<Vec<_>>().join("\n")
    }

    fn ctx(content: &str, language: &str) -> SegmentationContext {
        SegmentationContext::new(content, None, Some(language), ChunkingOptions::default())
    }

    #[test]
    fn test_registry_sorted_by_priority() {
        let manager = manager(Behavior::Produce);
        assert_eq!(
            manager.strategy_names(),
            vec!["markdown", "standardization", "bracket", "line"]
        );
    }

    #[test]
    fn test_line_added_when_missing() {
        let strategies: Vec<Arc<dyn SegmentationStrategy>> = vec![Arc::new(BracketStrategy::new())];
        let manager = ContextManager::new(strategies, &ChunkingOptions::default());
        assert_eq!(manager.strategy_names(), vec!["bracket", "line"]);
    }

    #[test]
    fn test_heuristic_selection() {
        let manager = manager(Behavior::Produce);
        let pick = |content: &str, language: &str| {
            manager
                .select_strategy(&ctx(content, language), None)
                .unwrap()
                .name()
        };
        assert_eq!(pick("# Title\n\ntext", "markdown"), "markdown");
        assert_eq!(pick("let x = 1;", "rust"), "line");
        assert_eq!(pick(&complex_rust(), "rust"), "standardization");
        assert_eq!(pick(&simple_rust(), "go"), "bracket");
        assert_eq!(pick(&"plain words\n".repeat(40), "text"), "line");
    }

    #[test]
    fn test_preferred_strategy() {
        let manager = manager(Behavior::Produce);
        let c = ctx(&complex_rust(), "rust");
        assert_eq!(manager.select_strategy(&c, Some("bracket")).unwrap().name(), "bracket");
        assert_eq!(manager.select_strategy(&c, Some("auto")).unwrap().name(), "standardization");
        // Markdown cannot handle rust, so the heuristic applies.
        assert_eq!(manager.select_strategy(&c, Some("markdown")).unwrap().name(), "standardization");
    }

    #[test]
    fn test_unknown_preferred_strategy() {
        let manager = manager(Behavior::Produce);
        let result = manager.select_strategy(&ctx("x", "rust"), Some("semantic-v2"));
        assert!(matches!(
            result,
            Err(Error::Segmentation(SegmentationError::UnknownStrategy { .. }))
        ));
    }

    #[test]
    fn test_cache_hit_revalidated() {
        let manager = manager(Behavior::Produce);
        let content = simple_rust();
        assert_eq!(manager.select_strategy(&ctx(&content, "go"), None).unwrap().name(), "bracket");
        assert_eq!(manager.selection_cache().len(), 1);

        let disabled = SegmentationContext::new(
            content.as_str(),
            None,
            Some("go"),
            ChunkingOptions {
                enable_bracket_balance: false,
                ..ChunkingOptions::default()
            },
        );
        // Same key, but bracket no longer handles it.
        let selected = manager.select_strategy(&disabled, None).unwrap();
        assert_ne!(selected.name(), "bracket");
        assert!(manager.cache_stats().hits >= 1);
    }

    #[test]
    fn test_execute_retries_with_line_on_failure() {
        let manager = manager(Behavior::Fail);
        let c = ctx(&complex_rust(), "rust");
        let stub = Stub {
            behavior: Behavior::Fail,
        };
        let execution = manager.execute_strategy(&stub, &c).unwrap();
        assert_eq!(execution.strategy, LINE_STRATEGY);
        assert!(!execution.chunks.is_empty());
        assert_eq!(execution.failure.unwrap().strategy, STANDARDIZATION_STRATEGY);
    }

    #[test]
    fn test_parse_failure_propagates() {
        let manager = manager(Behavior::ParseFail);
        let result = manager.run(&ctx(&complex_rust(), "rust"));
        assert!(result.unwrap_err().is_parse_failure());
    }

    #[test]
    fn test_run_failure_reports_reason() {
        let manager = manager(Behavior::Fail);
        let outcome = manager.run(&ctx(&complex_rust(), "rust")).unwrap();
        assert_eq!(outcome.strategy, LINE_STRATEGY);
        assert_eq!(outcome.fallback_reason, Some(FallbackReason::StrategyFailed));
        assert_eq!(outcome.failures.len(), 1);
    }

    #[test]
    fn test_run_decline_falls_through_to_next_candidate() {
        let manager = manager(Behavior::Decline);
        let outcome = manager.run(&ctx(&complex_rust(), "rust")).unwrap();
        assert_eq!(outcome.strategy, BRACKET_STRATEGY);
        assert_eq!(outcome.fallback_reason, Some(FallbackReason::StrategyDeclined));
        assert!(outcome.failures.is_empty());
    }

    #[test]
    fn test_run_first_choice_has_no_reason() {
        let manager = manager(Behavior::Produce);
        let outcome = manager.run(&ctx(&complex_rust(), "rust")).unwrap();
        assert_eq!(outcome.strategy, STANDARDIZATION_STRATEGY);
        assert!(outcome.fallback_reason.is_none());
    }

    #[test]
    fn test_reprioritize_resorts_and_clears_cache() {
        let manager = manager(Behavior::Produce);
        manager.select_strategy(&ctx("x", "rust"), None).unwrap();
        assert!(!manager.selection_cache().is_empty());

        let mut options = ChunkingOptions::default();
        options.strategy_priorities.insert("line".to_string(), 0);
        manager.reprioritize(&options);

        assert_eq!(manager.strategy_names()[0], "line");
        assert_eq!(manager.strategy_infos()[0].priority, 0);
        assert!(manager.selection_cache().is_empty());
    }
}
