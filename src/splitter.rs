//! The segmentation entry point.
//!
//! A [`Splitter`] owns the strategy registry, the post-processing pipeline
//! and both resource guards. Each call to [`Splitter::segment`] builds a
//! context, consults the guards, runs the selected strategy with fallback
//! and post-processes the result.

use crate::cache::{CacheStats, EvictableCache};
use crate::chunking::{
    BracketStrategy, LINE_STRATEGY, LineStrategy, MarkdownStrategy, SegmentationStrategy,
    StandardizationStrategy,
};
use crate::core::{
    Chunk, ChunkingOptions, ChunkingOptionsPatch, ProtectionConfig, ProtectionLevel,
    SegmentationContext,
};
use crate::error::{Error, Result, SegmentationError};
use crate::guard::{
    CleanupCoordinator, Clock, ErrorThresholdManager, LruCacheCleanup, MemoryEvent, MemoryGuard,
    MemoryGuardConfig, MemoryProbe, MemoryStats, ParserCacheCleanup, SysinfoProbe, SystemClock,
    ThresholdStats,
};
use crate::processing::{Pipeline, ProcessingContext};
use crate::selection::{ContextManager, FallbackReason, SelectionOutcome, StrategyInfo};
use crate::syntax::parser::{DEFAULT_PARSE_CACHE_SIZE, ParseCache};
use crate::syntax::{QueryNormalizer, QueryRegistry, SyntaxParser, TreeSitterNormalizer, TreeSitterParser};
use crossbeam::channel::Receiver;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Share of the memory limit above which a rising trend is reported.
const MEMORY_WARNING_RATIO: f64 = 0.8;

/// Result of one segmentation request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentationOutcome {
    /// Final chunks.
    pub chunks: Vec<Chunk>,
    /// Strategy that produced the raw chunks.
    pub strategy: String,
    /// Set when the first-choice strategy did not produce the chunks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,
}

/// Cache figures for health reports.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSummary {
    /// Entries held.
    pub entries: usize,
    /// Maximum entries.
    pub capacity: usize,
    /// Lookups that hit.
    pub hits: u64,
    /// Lookups that missed.
    pub misses: u64,
    /// Entries evicted for space.
    pub evictions: u64,
}

impl CacheSummary {
    fn new(entries: usize, capacity: usize, stats: CacheStats) -> Self {
        Self {
            entries,
            capacity,
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
        }
    }
}

/// Per-component health details.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthComponents {
    /// Registered strategies in priority order.
    pub strategies: Vec<StrategyInfo>,
    /// Post-processing stages in order.
    pub pipeline: Vec<&'static str>,
    /// Memory guard state.
    pub memory: MemoryStats,
    /// Error-threshold state.
    pub error_threshold: ThresholdStats,
    /// Strategy selection cache.
    pub selection_cache: CacheSummary,
    /// Parse cache, when the built-in parser is used.
    pub parse_cache: Option<CacheSummary>,
    /// Compiled syntax queries.
    pub compiled_queries: usize,
    /// Registered cleanup strategies.
    pub cleanup_strategies: Vec<&'static str>,
    /// Protection settings.
    pub protection: ProtectionConfig,
}

/// Result of [`Splitter::health_check`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// No issues found.
    pub is_healthy: bool,
    /// Problems found.
    pub issues: Vec<String>,
    /// Component details.
    pub components: HealthComponents,
}

/// Guard settings that require rebuilding the guards when changed.
#[derive(Debug, Clone, PartialEq)]
struct GuardSettings {
    error_threshold: usize,
    error_reset_interval_ms: u64,
    memory_limit_mb: u64,
    memory_check_interval_ms: u64,
    memory_history_size: usize,
    protection: ProtectionConfig,
}

impl GuardSettings {
    fn of(options: &ChunkingOptions) -> Self {
        Self {
            error_threshold: options.error_threshold,
            error_reset_interval_ms: options.error_reset_interval_ms,
            memory_limit_mb: options.memory_limit_mb,
            memory_check_interval_ms: options.memory_check_interval_ms,
            memory_history_size: options.memory_history_size,
            protection: options.protection.clone(),
        }
    }
}

#[derive(Clone)]
struct Guards {
    threshold: Arc<ErrorThresholdManager>,
    memory: Arc<MemoryGuard>,
    events: Receiver<MemoryEvent>,
}

impl Guards {
    fn new(
        options: &ChunkingOptions,
        clock: &Arc<dyn Clock>,
        probe: &Arc<dyn MemoryProbe>,
        cleanup: &Arc<CleanupCoordinator>,
    ) -> Result<Self> {
        let threshold = ErrorThresholdManager::new(
            options.error_threshold,
            Duration::from_millis(options.error_reset_interval_ms),
            Arc::clone(clock),
            Some(Arc::clone(cleanup)),
        );
        let (memory, events) = MemoryGuard::new(
            MemoryGuardConfig::from_options(options),
            Arc::clone(probe),
            Arc::clone(clock),
            Arc::clone(cleanup),
        );
        let memory = Arc::new(memory);
        let protection = &options.protection;
        if protection.enable_protection && protection.protection_level == ProtectionLevel::High {
            memory.start_monitoring()?;
        }
        Ok(Self {
            threshold: Arc::new(threshold),
            memory,
            events,
        })
    }
}

/// Builder for [`Splitter`].
pub struct SplitterBuilder {
    options: ChunkingOptions,
    clock: Arc<dyn Clock>,
    probe: Option<Arc<dyn MemoryProbe>>,
    syntax: Option<(Arc<dyn SyntaxParser>, Arc<dyn QueryNormalizer>)>,
    parse_cache_size: usize,
}

impl std::fmt::Debug for SplitterBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SplitterBuilder")
            .field("options", &self.options)
            .field("parse_cache_size", &self.parse_cache_size)
            .finish_non_exhaustive()
    }
}

impl Default for SplitterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SplitterBuilder {
    /// Starts from default options, the system clock, the sysinfo probe and
    /// the tree-sitter syntax layer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            options: ChunkingOptions::default(),
            clock: Arc::new(SystemClock),
            probe: None,
            syntax: None,
            parse_cache_size: DEFAULT_PARSE_CACHE_SIZE,
        }
    }

    /// Sets the options.
    #[must_use]
    pub fn options(mut self, options: ChunkingOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the clock used by the guards.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the memory probe.
    #[must_use]
    pub fn memory_probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Replaces the syntax layer used by the standardization strategy.
    #[must_use]
    pub fn syntax(mut self, parser: Arc<dyn SyntaxParser>, normalizer: Arc<dyn QueryNormalizer>) -> Self {
        self.syntax = Some((parser, normalizer));
        self
    }

    /// Sets how many parse trees the built-in parser caches.
    #[must_use]
    pub const fn parse_cache_size(mut self, entries: usize) -> Self {
        self.parse_cache_size = entries;
        self
    }

    /// Builds the splitter.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid options, or an I/O error
    /// when the memory monitor thread cannot be started.
    pub fn build(self) -> Result<Splitter> {
        self.options.validate()?;

        let queries = Arc::new(QueryRegistry::new());
        let (parser, normalizer, parse_cache): (Arc<dyn SyntaxParser>, Arc<dyn QueryNormalizer>, _) =
            match self.syntax {
                Some((parser, normalizer)) => (parser, normalizer, None),
                None => {
                    let parser = TreeSitterParser::with_cache_size(self.parse_cache_size);
                    let cache = parser.cache();
                    (
                        Arc::new(parser),
                        Arc::new(TreeSitterNormalizer::new(Arc::clone(&queries))),
                        Some(cache),
                    )
                }
            };

        let strategies: Vec<Arc<dyn SegmentationStrategy>> = vec![
            Arc::new(MarkdownStrategy::new()),
            Arc::new(StandardizationStrategy::new(parser, normalizer)),
            Arc::new(BracketStrategy::new()),
            Arc::new(LineStrategy::new()),
        ];
        let manager = ContextManager::new(strategies, &self.options);

        let mut coordinator = CleanupCoordinator::new();
        if let Some(cache) = &parse_cache {
            coordinator = coordinator.with_strategy(Box::new(ParserCacheCleanup::new(
                Arc::clone(cache) as Arc<dyn EvictableCache>,
            )));
        }
        coordinator = coordinator.with_strategy(Box::new(LruCacheCleanup::new(vec![
            manager.selection_cache() as Arc<dyn EvictableCache>,
        ])));
        let cleanup = Arc::new(coordinator);

        let probe = self
            .probe
            .unwrap_or_else(|| Arc::new(SysinfoProbe::new()) as Arc<dyn MemoryProbe>);
        let guards = Guards::new(&self.options, &self.clock, &probe, &cleanup)?;

        tracing::debug!(
            strategies = ?manager.strategy_names(),
            protection = ?self.options.protection.protection_level,
            "splitter ready"
        );

        Ok(Splitter {
            options: RwLock::new(self.options),
            manager,
            pipeline: Pipeline::standard(),
            guards: RwLock::new(guards),
            degraded: AtomicBool::new(false),
            cleanup,
            clock: self.clock,
            probe,
            queries,
            parse_cache,
        })
    }
}

/// Segments content into chunks.
///
/// # Examples
///
/// ```
/// use codesplit::Splitter;
///
/// let splitter = Splitter::new(Default::default()).unwrap();
/// let outcome = splitter.segment("console.log('x');", None, Some("javascript"), None).unwrap();
/// assert_eq!(outcome.chunks.len(), 1);
/// assert_eq!(outcome.strategy, "line");
/// ```
pub struct Splitter {
    options: RwLock<ChunkingOptions>,
    manager: ContextManager,
    pipeline: Pipeline,
    guards: RwLock<Guards>,
    degraded: AtomicBool,
    cleanup: Arc<CleanupCoordinator>,
    clock: Arc<dyn Clock>,
    probe: Arc<dyn MemoryProbe>,
    queries: Arc<QueryRegistry>,
    parse_cache: Option<Arc<ParseCache>>,
}

impl std::fmt::Debug for Splitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Splitter")
            .field("manager", &self.manager)
            .field("pipeline", &self.pipeline)
            .field("degraded", &self.degraded.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Splitter {
    /// Creates a splitter with the default collaborators.
    ///
    /// # Errors
    ///
    /// See [`SplitterBuilder::build`].
    pub fn new(options: ChunkingOptions) -> Result<Self> {
        SplitterBuilder::new().options(options).build()
    }

    /// Starts a builder.
    #[must_use]
    pub fn builder() -> SplitterBuilder {
        SplitterBuilder::new()
    }

    /// Current options.
    #[must_use]
    pub fn options(&self) -> ChunkingOptions {
        self.options.read().clone()
    }

    /// The query registry backing the built-in normalizer.
    #[must_use]
    pub fn query_registry(&self) -> Arc<QueryRegistry> {
        Arc::clone(&self.queries)
    }

    fn guards(&self) -> Guards {
        self.guards.read().clone()
    }

    /// Segments `content`.
    ///
    /// `overrides` apply to this call only.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid options, an unknown
    /// preferred strategy, a failure of the line strategy, or a parse
    /// failure when standardization fallback is disabled.
    pub fn segment(
        &self,
        content: &str,
        file_path: Option<&str>,
        language: Option<&str>,
        overrides: Option<&ChunkingOptionsPatch>,
    ) -> Result<SegmentationOutcome> {
        let options = {
            let base = self.options.read();
            overrides.map_or_else(|| base.clone(), |patch| base.merged(patch))
        };
        options.validate()?;

        let ctx = SegmentationContext::new(content, file_path, language, options);
        let guards = self.guards();
        let forced = self.resource_fallback(&guards, &ctx.options);

        let outcome = match forced {
            Some(reason) => {
                tracing::warn!(%reason, "resource guard forced line-only segmentation");
                SelectionOutcome {
                    chunks: self.manager.run_line_only(&ctx)?,
                    strategy: LINE_STRATEGY,
                    fallback_reason: Some(reason),
                    failures: Vec::new(),
                }
            }
            None => match self.manager.run(&ctx) {
                Ok(outcome) => outcome,
                Err(error) => {
                    if counts_toward_threshold(&error) {
                        guards
                            .threshold
                            .record_error(error.to_string(), ctx.file_path.as_deref());
                    }
                    return Err(error);
                }
            },
        };

        for failure in &outcome.failures {
            guards
                .threshold
                .record_error(failure.error.to_string(), Some(failure.strategy));
        }

        let processing = ProcessingContext::new(&ctx, forced.is_some());
        let chunks = self.pipeline.run(outcome.chunks, &processing);
        tracing::debug!(
            strategy = outcome.strategy,
            chunks = chunks.len(),
            lines = ctx.metadata.line_count,
            fallback = ?outcome.fallback_reason,
            "segmentation finished"
        );

        Ok(SegmentationOutcome {
            chunks,
            strategy: outcome.strategy.to_string(),
            fallback_reason: outcome.fallback_reason,
        })
    }

    fn drain_events(&self, events: &Receiver<MemoryEvent>) {
        for event in events.try_iter() {
            match event {
                MemoryEvent::Degraded { usage, limit } => {
                    if !self.degraded.swap(true, Ordering::SeqCst) {
                        tracing::warn!(usage, limit, "memory pressure, switching to line-only segmentation");
                    }
                }
                MemoryEvent::Recovered => {
                    if self.degraded.swap(false, Ordering::SeqCst) {
                        tracing::info!("memory pressure cleared");
                    }
                }
            }
        }
    }

    fn resource_fallback(&self, guards: &Guards, options: &ChunkingOptions) -> Option<FallbackReason> {
        let protection = &options.protection;
        if !protection.enable_protection {
            return None;
        }
        if protection.protection_level != ProtectionLevel::Low {
            guards.memory.check();
        }
        self.drain_events(&guards.events);

        if self.degraded.load(Ordering::SeqCst) {
            return Some(FallbackReason::MemoryPressure);
        }
        if guards.threshold.should_use_fallback() {
            return Some(FallbackReason::ErrorThreshold);
        }
        None
    }

    /// Applies a partial options update.
    ///
    /// Strategy priorities are re-sorted; guards are rebuilt when their
    /// settings change.
    ///
    /// # Errors
    ///
    /// Returns a configuration error and leaves the options unchanged when
    /// the result is invalid.
    pub fn set_options(&self, patch: &ChunkingOptionsPatch) -> Result<()> {
        let (updated, rebuild) = {
            let current = self.options.read();
            let updated = current.merged(patch);
            let rebuild = GuardSettings::of(&current) != GuardSettings::of(&updated);
            (updated, rebuild)
        };
        updated.validate()?;

        if rebuild {
            let fresh = Guards::new(&updated, &self.clock, &self.probe, &self.cleanup)?;
            let previous = std::mem::replace(&mut *self.guards.write(), fresh);
            previous.memory.stop_monitoring();
            self.degraded.store(false, Ordering::SeqCst);
            tracing::debug!("resource guards rebuilt");
        }

        self.manager.reprioritize(&updated);
        *self.options.write() = updated;
        tracing::info!("options updated");
        Ok(())
    }

    /// Registered strategies in priority order.
    #[must_use]
    pub fn available_strategies(&self) -> Vec<StrategyInfo> {
        self.manager.strategy_infos()
    }

    /// Reports component state and any problems found.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn health_check(&self) -> HealthReport {
        let options = self.options();
        let guards = self.guards();
        if options.protection.enable_protection {
            guards.memory.check();
        }
        self.drain_events(&guards.events);

        let mut issues = Vec::new();
        let memory = guards.memory.stats();
        if self.degraded.load(Ordering::SeqCst) {
            issues.push(format!(
                "memory usage {} MB exceeds limit {} MB",
                memory.current.unwrap_or(0) / (1024 * 1024),
                options.memory_limit_mb
            ));
        } else if memory.trend == crate::guard::MemoryTrend::Increasing
            && memory
                .current
                .is_some_and(|c| c as f64 > memory.limit as f64 * MEMORY_WARNING_RATIO)
        {
            issues.push("memory usage rising close to the limit".to_string());
        }

        let error_threshold = guards.threshold.stats();
        if error_threshold.fallback_active {
            issues.push(format!(
                "error threshold reached ({} errors), line-only fallback active",
                error_threshold.error_count
            ));
        }

        let probe = SegmentationContext::new("health check", None, None, options.clone());
        if let Err(error) = self.manager.run_line_only(&probe) {
            issues.push(format!("line strategy failed: {error}"));
        }

        let selection = self.manager.selection_cache();
        let components = HealthComponents {
            strategies: self.manager.strategy_infos(),
            pipeline: self.pipeline.processor_names(),
            memory,
            error_threshold,
            selection_cache: CacheSummary::new(selection.len(), selection.capacity(), selection.stats()),
            parse_cache: self
                .parse_cache
                .as_ref()
                .map(|cache| CacheSummary::new(cache.len(), cache.capacity(), cache.stats())),
            compiled_queries: self.queries.compiled_count(),
            cleanup_strategies: self.cleanup.strategy_names(),
            protection: options.protection,
        };

        if !issues.is_empty() {
            tracing::warn!(?issues, "health check found issues");
        }
        HealthReport {
            is_healthy: issues.is_empty(),
            issues,
            components,
        }
    }
}

impl Drop for Splitter {
    fn drop(&mut self) {
        self.guards.get_mut().memory.stop_monitoring();
    }
}

/// Caller mistakes do not count as segmentation errors.
const fn counts_toward_threshold(error: &Error) -> bool {
    !matches!(
        error,
        Error::Config(_) | Error::Segmentation(SegmentationError::UnknownStrategy { .. })
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::{ManualClock, StaticProbe};
    use crate::syntax::Tree;

    const MB: u64 = 1024 * 1024;

    struct FailingParser;

    impl SyntaxParser for FailingParser {
        fn supports(&self, _language: &str) -> bool {
            true
        }

        fn parse(&self, language: &str, _content: &str) -> Result<Tree> {
            Err(SegmentationError::ParseFailed {
                language: language.to_string(),
                reason: "grammar crashed".to_string(),
            }
            .into())
        }
    }

    fn complex_rust() -> String {
        (0..40)
            .map(|i| format!("fn f{i}(x: u32) -> u32 {{\n    if x > {i} {{ x }} else {{ {i} }}\n}}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn splitter_with(options: ChunkingOptions, probe: Arc<StaticProbe>, clock: Arc<ManualClock>) -> Splitter {
        Splitter::builder()
            .options(options)
            .memory_probe(probe)
            .clock(clock)
            .build()
            .unwrap()
    }

    fn splitter() -> Splitter {
        splitter_with(
            ChunkingOptions::default(),
            Arc::new(StaticProbe::new(10 * MB)),
            Arc::new(ManualClock::new()),
        )
    }

    #[test]
    fn test_empty_content() {
        let outcome = splitter().segment("", None, Some("rust"), None).unwrap();
        assert_eq!(outcome.chunks.len(), 1);
        assert_eq!(outcome.chunks[0].content, "");
        assert_eq!((outcome.chunks[0].start_line(), outcome.chunks[0].end_line()), (1, 0));
    }

    #[test]
    fn test_single_line_javascript() {
        let outcome = splitter()
            .segment("console.log('x');", None, Some("javascript"), None)
            .unwrap();
        assert_eq!(outcome.strategy, LINE_STRATEGY);
        assert_eq!(outcome.chunks.len(), 1);
        assert!(outcome.fallback_reason.is_none());
    }

    #[test]
    fn test_markdown_routed_to_markdown() {
        let outcome = splitter()
            .segment("# Title\n\nSome text here.", Some("README.md"), Some("markdown"), None)
            .unwrap();
        assert_eq!(outcome.strategy, "markdown");
        assert_eq!(outcome.chunks[0].metadata.file_path.as_deref(), Some("README.md"));
    }

    #[test]
    fn test_complex_code_uses_standardization() {
        let splitter = splitter();
        let outcome = splitter.segment(&complex_rust(), None, Some("rust"), None).unwrap();
        assert_eq!(outcome.strategy, "standardization");
        assert!(outcome.chunks.iter().any(|c| c.metadata.function_name.is_some()));
        assert!(splitter.query_registry().compiled_count() > 0);
    }

    #[test]
    fn test_invalid_overrides_rejected() {
        let splitter = splitter();
        let patch = ChunkingOptionsPatch {
            max_chunk_size: Some(0),
            ..ChunkingOptionsPatch::default()
        };
        let result = splitter.segment("x", None, None, Some(&patch));
        assert!(result.unwrap_err().is_config());
        assert_eq!(splitter.guards().threshold.error_count(), 0);
    }

    #[test]
    fn test_parse_failure_without_fallback_propagates_and_counts() {
        let options = ChunkingOptions {
            standardization_fallback: false,
            error_threshold: 2,
            ..ChunkingOptions::default()
        };
        let clock = Arc::new(ManualClock::new());
        let splitter = Splitter::builder()
            .options(options)
            .memory_probe(Arc::new(StaticProbe::new(10 * MB)))
            .clock(clock.clone())
            .syntax(Arc::new(FailingParser), Arc::new(TreeSitterNormalizer::default()))
            .build()
            .unwrap();

        let content = complex_rust();
        for _ in 0..2 {
            let err = splitter.segment(&content, None, Some("rust"), None).unwrap_err();
            assert!(err.is_parse_failure());
        }

        let outcome = splitter.segment(&content, None, Some("rust"), None).unwrap();
        assert_eq!(outcome.strategy, LINE_STRATEGY);
        assert_eq!(outcome.fallback_reason, Some(FallbackReason::ErrorThreshold));
        assert!(!outcome.chunks.iter().any(|c| c.metadata.has_overlap));

        clock.advance(Duration::from_millis(ChunkingOptions::default().error_reset_interval_ms));
        let err = splitter.segment(&content, None, Some("rust"), None).unwrap_err();
        assert!(err.is_parse_failure());
    }

    #[test]
    fn test_parse_failure_with_fallback_uses_next_strategy() {
        let splitter = Splitter::builder()
            .memory_probe(Arc::new(StaticProbe::new(10 * MB)))
            .syntax(Arc::new(FailingParser), Arc::new(TreeSitterNormalizer::default()))
            .build()
            .unwrap();
        let outcome = splitter.segment(&complex_rust(), None, Some("rust"), None).unwrap();
        assert_eq!(outcome.strategy, "bracket");
        assert_eq!(outcome.fallback_reason, Some(FallbackReason::StrategyDeclined));
    }

    #[test]
    fn test_memory_pressure_forces_line_only() {
        let probe = Arc::new(StaticProbe::new(10 * MB));
        let options = ChunkingOptions {
            memory_limit_mb: 5,
            ..ChunkingOptions::default()
        };
        let splitter = splitter_with(options, probe.clone(), Arc::new(ManualClock::new()));

        let outcome = splitter.segment(&complex_rust(), None, Some("rust"), None).unwrap();
        assert_eq!(outcome.strategy, LINE_STRATEGY);
        assert_eq!(outcome.fallback_reason, Some(FallbackReason::MemoryPressure));
        assert!(!splitter.health_check().is_healthy);

        probe.set(MB);
        let outcome = splitter.segment(&complex_rust(), None, Some("rust"), None).unwrap();
        assert_ne!(outcome.fallback_reason, Some(FallbackReason::MemoryPressure));
    }

    #[test]
    fn test_low_protection_ignores_memory() {
        let mut options = ChunkingOptions {
            memory_limit_mb: 5,
            ..ChunkingOptions::default()
        };
        options.protection.protection_level = ProtectionLevel::Low;
        let splitter = splitter_with(options, Arc::new(StaticProbe::new(10 * MB)), Arc::new(ManualClock::new()));
        let outcome = splitter.segment(&complex_rust(), None, Some("rust"), None).unwrap();
        assert!(outcome.fallback_reason.is_none());
    }

    #[test]
    fn test_set_options_reorders_and_validates() {
        let splitter = splitter();
        let patch = ChunkingOptionsPatch {
            strategy_priorities: Some([("bracket".to_string(), 0)].into_iter().collect()),
            ..ChunkingOptionsPatch::default()
        };
        splitter.set_options(&patch).unwrap();
        assert_eq!(splitter.available_strategies()[0].name, "bracket");

        let bad = ChunkingOptionsPatch {
            overlap_size: Some(5000),
            ..ChunkingOptionsPatch::default()
        };
        assert!(splitter.set_options(&bad).unwrap_err().is_config());
        assert_eq!(splitter.options().overlap_size, ChunkingOptions::default().overlap_size);
    }

    #[test]
    fn test_high_protection_monitors() {
        let mut options = ChunkingOptions::default();
        options.protection.protection_level = ProtectionLevel::High;
        let splitter = splitter_with(options, Arc::new(StaticProbe::new(10 * MB)), Arc::new(ManualClock::new()));
        assert!(splitter.guards().memory.is_monitoring());

        let patch = ChunkingOptionsPatch {
            protection_level: Some(ProtectionLevel::Low),
            ..ChunkingOptionsPatch::default()
        };
        splitter.set_options(&patch).unwrap();
        assert!(!splitter.guards().memory.is_monitoring());
    }

    #[test]
    fn test_health_check_reports_components() {
        let report = splitter().health_check();
        assert!(report.is_healthy, "{:?}", report.issues);
        assert_eq!(report.components.strategies.len(), 4);
        assert_eq!(report.components.pipeline, vec!["overlap", "filter", "rebalance"]);
        assert_eq!(
            report.components.cleanup_strategies,
            vec!["parser-cache", "lru-cache"]
        );
        assert!(report.components.parse_cache.is_some());
    }
}
