//! Cleanup strategies run under memory pressure or after repeated errors.

use crate::cache::EvictableCache;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Reason passed when the error threshold triggers cleanup.
pub const ERROR_THRESHOLD_TRIGGER: &str = "error-threshold";

/// Reason passed when the memory guard triggers cleanup.
pub const MEMORY_PRESSURE_TRIGGER: &str = "memory-pressure";

/// What prompted a cleanup.
#[derive(Debug, Clone)]
pub struct CleanupContext {
    /// Trigger reason, matched against strategy keywords.
    pub reason: String,
    /// Process memory in bytes, when known.
    pub memory_usage: Option<u64>,
    /// Configured memory limit in bytes.
    pub memory_limit: u64,
}

impl CleanupContext {
    /// Creates a cleanup context.
    #[must_use]
    pub fn new(reason: impl Into<String>, memory_usage: Option<u64>, memory_limit: u64) -> Self {
        Self {
            reason: reason.into(),
            memory_usage,
            memory_limit,
        }
    }

    /// Usage divided by limit, or zero when unknown.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn pressure_ratio(&self) -> f64 {
        match self.memory_usage {
            Some(usage) if self.memory_limit > 0 => usage as f64 / self.memory_limit as f64,
            _ => 0.0,
        }
    }

    fn reason_mentions(&self, keywords: &[&str]) -> bool {
        let reason = self.reason.to_lowercase();
        keywords.iter().any(|k| reason.contains(k))
    }
}

/// Outcome of a cleanup run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResult {
    /// Whether the run completed.
    pub success: bool,
    /// Estimated bytes released.
    pub memory_freed: u64,
    /// Names of the caches that were flushed.
    pub cleaned_caches: Vec<String>,
    /// Wall time spent.
    pub duration: Duration,
}

impl CleanupResult {
    fn absorb(&mut self, other: Self) {
        self.success &= other.success;
        self.memory_freed += other.memory_freed;
        self.cleaned_caches.extend(other.cleaned_caches);
    }
}

/// A pluggable way to release memory.
pub trait CleanupStrategy: Send + Sync {
    /// Strategy name.
    fn name(&self) -> &'static str;

    /// Lower runs first.
    fn priority(&self) -> u32;

    /// Whether the trigger warrants this strategy.
    fn is_applicable(&self, ctx: &CleanupContext) -> bool;

    /// Whether the target actually holds anything.
    fn is_available(&self) -> bool;

    /// Estimated bytes the strategy would free. Used only for ranking.
    fn estimate_cleanup_impact(&self, ctx: &CleanupContext) -> u64;

    /// Runs the cleanup.
    fn cleanup(&self, ctx: &CleanupContext) -> CleanupResult;
}

fn flush(caches: &[Arc<dyn EvictableCache>]) -> CleanupResult {
    let started = Instant::now();
    let mut result = CleanupResult {
        success: true,
        ..CleanupResult::default()
    };
    for cache in caches {
        if cache.is_empty() {
            continue;
        }
        result.memory_freed += cache.evict_all();
        result.cleaned_caches.push(cache.cache_name().to_string());
    }
    result.duration = started.elapsed();
    result
}

/// Flushes the syntax-tree parse cache.
pub struct ParserCacheCleanup {
    cache: Arc<dyn EvictableCache>,
}

impl ParserCacheCleanup {
    /// Creates the strategy over the parse cache.
    #[must_use]
    pub fn new(cache: Arc<dyn EvictableCache>) -> Self {
        Self { cache }
    }
}

impl CleanupStrategy for ParserCacheCleanup {
    fn name(&self) -> &'static str {
        "parser-cache"
    }

    fn priority(&self) -> u32 {
        1
    }

    fn is_applicable(&self, ctx: &CleanupContext) -> bool {
        ctx.pressure_ratio() >= 0.7 || ctx.reason_mentions(&["parse", "memory", "error"])
    }

    fn is_available(&self) -> bool {
        !self.cache.is_empty()
    }

    fn estimate_cleanup_impact(&self, _ctx: &CleanupContext) -> u64 {
        self.cache.estimated_bytes()
    }

    fn cleanup(&self, _ctx: &CleanupContext) -> CleanupResult {
        flush(std::slice::from_ref(&self.cache))
    }
}

/// Flushes every registered LRU cache.
pub struct LruCacheCleanup {
    caches: Vec<Arc<dyn EvictableCache>>,
}

impl LruCacheCleanup {
    /// Creates the strategy over `caches`.
    #[must_use]
    pub fn new(caches: Vec<Arc<dyn EvictableCache>>) -> Self {
        Self { caches }
    }
}

impl CleanupStrategy for LruCacheCleanup {
    fn name(&self) -> &'static str {
        "lru-cache"
    }

    fn priority(&self) -> u32 {
        2
    }

    fn is_applicable(&self, ctx: &CleanupContext) -> bool {
        ctx.pressure_ratio() >= 0.8 || ctx.reason_mentions(&["cache", "memory", "error"])
    }

    fn is_available(&self) -> bool {
        self.caches.iter().any(|c| !c.is_empty())
    }

    fn estimate_cleanup_impact(&self, _ctx: &CleanupContext) -> u64 {
        self.caches.iter().map(|c| c.estimated_bytes()).sum()
    }

    fn cleanup(&self, _ctx: &CleanupContext) -> CleanupResult {
        flush(&self.caches)
    }
}

/// Runs cleanup strategies in priority order.
#[derive(Default)]
pub struct CleanupCoordinator {
    strategies: Vec<Box<dyn CleanupStrategy>>,
}

impl std::fmt::Debug for CleanupCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.strategies.iter().map(|s| s.name()))
            .finish()
    }
}

impl CleanupCoordinator {
    /// Creates a coordinator with no strategies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Box<dyn CleanupStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Registered strategy names.
    #[must_use]
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Runs applicable, available strategies until `under_pressure` turns false.
    ///
    /// Ties in priority go to the larger estimated impact.
    pub fn run(&self, ctx: &CleanupContext, under_pressure: impl Fn() -> bool) -> CleanupResult {
        let started = Instant::now();
        let mut candidates: Vec<(&dyn CleanupStrategy, u64)> = self
            .strategies
            .iter()
            .map(|s| &**s)
            .filter(|s| s.is_applicable(ctx) && s.is_available())
            .map(|s| (s, s.estimate_cleanup_impact(ctx)))
            .collect();
        candidates.sort_by(|(a, ia), (b, ib)| a.priority().cmp(&b.priority()).then(ib.cmp(ia)));

        let mut result = CleanupResult {
            success: true,
            ..CleanupResult::default()
        };
        for (strategy, _) in candidates {
            let outcome = strategy.cleanup(ctx);
            tracing::debug!(
                strategy = strategy.name(),
                freed = outcome.memory_freed,
                "cleanup strategy ran"
            );
            result.absorb(outcome);
            if !under_pressure() {
                break;
            }
        }
        result.duration = started.elapsed();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LruCache;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn filled(name: &str, bytes: usize) -> Arc<LruCache<u32, u32>> {
        let cache = Arc::new(LruCache::new(name, 10));
        cache.insert_sized(1, 1, bytes);
        cache
    }

    #[test]
    fn test_pressure_ratio() {
        let ctx = CleanupContext::new("x", Some(50), 100);
        assert!((ctx.pressure_ratio() - 0.5).abs() < f64::EPSILON);
        assert!(CleanupContext::new("x", None, 100).pressure_ratio().abs() < f64::EPSILON);
    }

    #[test]
    fn test_applicability() {
        let parser = ParserCacheCleanup::new(filled("parse", 10));
        let lru = LruCacheCleanup::new(vec![filled("lru", 10) as Arc<dyn EvictableCache>]);

        let mild = CleanupContext::new("routine", Some(75), 100);
        assert!(parser.is_applicable(&mild));
        assert!(!lru.is_applicable(&mild));

        let errors = CleanupContext::new(ERROR_THRESHOLD_TRIGGER, None, 100);
        assert!(parser.is_applicable(&errors));
        assert!(lru.is_applicable(&errors));
    }

    #[test]
    fn test_runs_in_priority_order_until_relieved() {
        let parse = filled("parse", 100);
        let lru = filled("lru", 50);
        let coordinator = CleanupCoordinator::new()
            .with_strategy(Box::new(LruCacheCleanup::new(vec![lru.clone() as Arc<dyn EvictableCache>])))
            .with_strategy(Box::new(ParserCacheCleanup::new(parse.clone())));

        let ctx = CleanupContext::new(MEMORY_PRESSURE_TRIGGER, Some(95), 100);
        let result = coordinator.run(&ctx, || false);
        assert!(result.success);
        assert_eq!(result.cleaned_caches, vec!["parse".to_string()]);
        assert_eq!(result.memory_freed, 100);
        assert!(parse.is_empty());
        assert!(!lru.is_empty());
    }

    #[test]
    fn test_runs_all_while_under_pressure() {
        let calls = AtomicUsize::new(0);
        let coordinator = CleanupCoordinator::new()
            .with_strategy(Box::new(ParserCacheCleanup::new(filled("parse", 10))))
            .with_strategy(Box::new(LruCacheCleanup::new(vec![filled("lru", 20) as Arc<dyn EvictableCache>])));
        let ctx = CleanupContext::new(ERROR_THRESHOLD_TRIGGER, None, 100);
        let result = coordinator.run(&ctx, || {
            calls.fetch_add(1, Ordering::SeqCst);
            true
        });
        assert_eq!(result.memory_freed, 30);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_skips_unavailable() {
        let empty: Arc<LruCache<u32, u32>> = Arc::new(LruCache::new("empty", 10));
        let coordinator =
            CleanupCoordinator::new().with_strategy(Box::new(ParserCacheCleanup::new(empty)));
        let ctx = CleanupContext::new(ERROR_THRESHOLD_TRIGGER, None, 100);
        let result = coordinator.run(&ctx, || true);
        assert!(result.cleaned_caches.is_empty());
        assert_eq!(coordinator.strategy_names(), vec!["parser-cache"]);
    }
}
