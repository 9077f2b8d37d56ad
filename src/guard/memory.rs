//! Process memory guard.
//!
//! The guard is either idle or monitoring. While monitoring, a background
//! thread samples process memory on a crossbeam ticker. Samples feed a
//! ring buffer from which the trend and running average are derived.
//! Exceeding the limit triggers cleanup; if usage is still over the limit
//! afterwards, the guard turns degraded and sends one
//! [`MemoryEvent::Degraded`] to its owner. Falling back under the limit sends
//! [`MemoryEvent::Recovered`].

use crate::error::Result;
use crate::guard::cleanup::{CleanupContext, CleanupCoordinator, MEMORY_PRESSURE_TRIGGER};
use crate::guard::clock::Clock;
use crate::guard::ring::RingBuffer;
use crate::core::ChunkingOptions;
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use sysinfo::{Pid, System};

/// Samples compared when computing the trend.
pub const TREND_WINDOW: usize = 5;

/// Share of the limit a trend delta must exceed to count as a change.
pub const TREND_THRESHOLD_RATIO: f64 = 0.05;

/// Reads current process memory.
pub trait MemoryProbe: Send + Sync {
    /// Resident memory in bytes, or `None` when unavailable.
    fn usage_bytes(&self) -> Option<u64>;
}

/// Probe backed by `sysinfo`.
pub struct SysinfoProbe {
    pid: Option<Pid>,
    system: Mutex<System>,
}

impl std::fmt::Debug for SysinfoProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SysinfoProbe").field("pid", &self.pid).finish()
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoProbe {
    /// Creates a probe for the current process.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pid: sysinfo::get_current_pid().ok(),
            system: Mutex::new(System::new()),
        }
    }
}

impl MemoryProbe for SysinfoProbe {
    fn usage_bytes(&self) -> Option<u64> {
        let pid = self.pid?;
        let mut system = self.system.lock();
        system.refresh_process(pid);
        system.process(pid).map(sysinfo::Process::memory)
    }
}

/// Probe returning a settable value.
#[derive(Debug, Default)]
pub struct StaticProbe {
    bytes: AtomicU64,
}

impl StaticProbe {
    /// Creates a probe reporting `bytes`.
    #[must_use]
    pub const fn new(bytes: u64) -> Self {
        Self {
            bytes: AtomicU64::new(bytes),
        }
    }

    /// Changes the reported value.
    pub fn set(&self, bytes: u64) {
        self.bytes.store(bytes, Ordering::SeqCst);
    }
}

impl MemoryProbe for StaticProbe {
    fn usage_bytes(&self) -> Option<u64> {
        Some(self.bytes.load(Ordering::SeqCst))
    }
}

/// Direction of recent memory usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryTrend {
    /// Usage grew by more than the threshold.
    Increasing,
    /// Usage shrank by more than the threshold.
    Decreasing,
    /// Neither.
    Stable,
}

impl MemoryTrend {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Increasing => "increasing",
            Self::Decreasing => "decreasing",
            Self::Stable => "stable",
        }
    }
}

/// A timestamped memory reading.
#[derive(Debug, Clone, Copy)]
pub struct MemorySample {
    /// When the sample was taken.
    pub at: Instant,
    /// Resident bytes.
    pub bytes: u64,
}

/// Signals sent to the guard's owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryEvent {
    /// Usage stayed over the limit after cleanup.
    Degraded {
        /// Usage in bytes.
        usage: u64,
        /// Limit in bytes.
        limit: u64,
    },
    /// Usage fell back under the limit.
    Recovered,
}

/// Snapshot for health reports.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    /// Latest sample in bytes.
    pub current: Option<u64>,
    /// Mean over the history.
    pub average: Option<u64>,
    /// Trend over the last samples.
    pub trend: MemoryTrend,
    /// Limit in bytes.
    pub limit: u64,
    /// Samples held.
    pub samples: usize,
    /// Whether the background sampler runs.
    pub monitoring: bool,
    /// Whether usage is over the limit after cleanup.
    pub degraded: bool,
}

/// Guard settings.
#[derive(Debug, Clone, Copy)]
pub struct MemoryGuardConfig {
    /// Limit in bytes.
    pub limit_bytes: u64,
    /// Sampling period.
    pub check_interval: Duration,
    /// Samples kept.
    pub history_size: usize,
}

impl MemoryGuardConfig {
    /// Derives the guard settings from chunking options.
    #[must_use]
    pub const fn from_options(options: &ChunkingOptions) -> Self {
        Self {
            limit_bytes: options.memory_limit_bytes(),
            check_interval: Duration::from_millis(options.memory_check_interval_ms),
            history_size: options.memory_history_size,
        }
    }
}

struct Monitor {
    stop: Sender<()>,
    thread: JoinHandle<()>,
}

/// Memory guard.
pub struct MemoryGuard {
    config: MemoryGuardConfig,
    probe: Arc<dyn MemoryProbe>,
    clock: Arc<dyn Clock>,
    cleanup: Arc<CleanupCoordinator>,
    history: Mutex<RingBuffer<MemorySample>>,
    degraded: AtomicBool,
    events: Sender<MemoryEvent>,
    monitor: Mutex<Option<Monitor>>,
}

impl std::fmt::Debug for MemoryGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryGuard")
            .field("config", &self.config)
            .field("monitoring", &self.is_monitoring())
            .field("degraded", &self.is_degraded())
            .finish_non_exhaustive()
    }
}

impl MemoryGuard {
    /// Creates an idle guard and the receiver for its events.
    #[must_use]
    pub fn new(
        config: MemoryGuardConfig,
        probe: Arc<dyn MemoryProbe>,
        clock: Arc<dyn Clock>,
        cleanup: Arc<CleanupCoordinator>,
    ) -> (Self, Receiver<MemoryEvent>) {
        let (events, receiver) = channel::unbounded();
        let guard = Self {
            config,
            probe,
            clock,
            cleanup,
            history: Mutex::new(RingBuffer::new(config.history_size)),
            degraded: AtomicBool::new(false),
            events,
            monitor: Mutex::new(None),
        };
        (guard, receiver)
    }

    /// Limit in bytes.
    #[must_use]
    pub const fn limit(&self) -> u64 {
        self.config.limit_bytes
    }

    fn sample(&self) -> Option<u64> {
        let bytes = self.probe.usage_bytes()?;
        self.history.lock().push(MemorySample {
            at: self.clock.now(),
            bytes,
        });
        Some(bytes)
    }

    /// Takes a sample and reacts if usage is over the limit.
    ///
    /// Returns `true` when usage is within the limit (or unknown).
    pub fn check(&self) -> bool {
        let Some(usage) = self.sample() else {
            return true;
        };
        if usage <= self.config.limit_bytes {
            if self.degraded.swap(false, Ordering::SeqCst) {
                tracing::info!(usage, "memory back under limit");
                let _ = self.events.send(MemoryEvent::Recovered);
            }
            return true;
        }
        self.check_and_recover(usage)
    }

    fn check_and_recover(&self, usage: u64) -> bool {
        let limit = self.config.limit_bytes;
        tracing::warn!(usage, limit, "memory over limit, running cleanup");

        let ctx = CleanupContext::new(MEMORY_PRESSURE_TRIGGER, Some(usage), limit);
        let result = self
            .cleanup
            .run(&ctx, || self.probe.usage_bytes().is_some_and(|u| u > limit));
        tracing::info!(
            freed = result.memory_freed,
            caches = ?result.cleaned_caches,
            duration_ms = result.duration.as_millis(),
            "memory cleanup finished"
        );

        match self.sample() {
            Some(after) if after > limit => {
                // Events mark transitions only.
                if !self.degraded.swap(true, Ordering::SeqCst) {
                    tracing::warn!(usage = after, limit, "memory still over limit, degrading");
                    let _ = self.events.send(MemoryEvent::Degraded { usage: after, limit });
                }
                false
            }
            _ => {
                if self.degraded.swap(false, Ordering::SeqCst) {
                    let _ = self.events.send(MemoryEvent::Recovered);
                }
                true
            }
        }
    }

    /// Whether the last check left usage over the limit.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    /// Trend from the delta across the last [`TREND_WINDOW`] samples.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn trend(&self) -> MemoryTrend {
        let history = self.history.lock();
        let (Some(last), Some(first)) = (history.last(), history.nth_back(TREND_WINDOW - 1)) else {
            return MemoryTrend::Stable;
        };
        let threshold = (self.config.limit_bytes as f64 * TREND_THRESHOLD_RATIO) as u64;
        if last.bytes > first.bytes + threshold {
            MemoryTrend::Increasing
        } else if first.bytes > last.bytes + threshold {
            MemoryTrend::Decreasing
        } else {
            MemoryTrend::Stable
        }
    }

    /// Mean of the recorded samples.
    #[must_use]
    pub fn average(&self) -> Option<u64> {
        let history = self.history.lock();
        if history.is_empty() {
            return None;
        }
        let total: u128 = history.iter().map(|s| u128::from(s.bytes)).sum();
        u64::try_from(total / history.len() as u128).ok()
    }

    /// Health snapshot.
    #[must_use]
    pub fn stats(&self) -> MemoryStats {
        let (current, samples) = {
            let history = self.history.lock();
            (history.last().map(|s| s.bytes), history.len())
        };
        MemoryStats {
            current,
            average: self.average(),
            trend: self.trend(),
            limit: self.config.limit_bytes,
            samples,
            monitoring: self.is_monitoring(),
            degraded: self.is_degraded(),
        }
    }

    /// Whether the background sampler runs.
    #[must_use]
    pub fn is_monitoring(&self) -> bool {
        self.monitor.lock().is_some()
    }

    /// Starts the background sampler. Does nothing if already monitoring.
    ///
    /// # Errors
    ///
    /// Returns an error if the sampler thread cannot be spawned.
    pub fn start_monitoring(self: &Arc<Self>) -> Result<()> {
        let mut monitor = self.monitor.lock();
        if monitor.is_some() {
            return Ok(());
        }

        let ticker = channel::tick(self.config.check_interval);
        let (stop, stopped) = channel::bounded::<()>(1);
        let weak: Weak<Self> = Arc::downgrade(self);
        let thread = std::thread::Builder::new()
            .name("codesplit-memory".to_string())
            .spawn(move || {
                loop {
                    crossbeam::select! {
                        recv(ticker) -> _ => {
                            let Some(guard) = weak.upgrade() else { break };
                            guard.check();
                        }
                        recv(stopped) -> _ => break,
                    }
                }
            })?;

        tracing::debug!(interval_ms = self.config.check_interval.as_millis(), "memory monitoring started");
        *monitor = Some(Monitor { stop, thread });
        Ok(())
    }

    /// Stops the background sampler and waits for it to exit.
    pub fn stop_monitoring(&self) {
        let Some(monitor) = self.monitor.lock().take() else {
            return;
        };
        let _ = monitor.stop.send(());
        if monitor.thread.thread().id() != std::thread::current().id() {
            let _ = monitor.thread.join();
        }
        tracing::debug!("memory monitoring stopped");
    }
}

impl Drop for MemoryGuard {
    fn drop(&mut self) {
        if let Some(monitor) = self.monitor.get_mut().take() {
            let _ = monitor.stop.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{EvictableCache, LruCache};
    use crate::guard::cleanup::LruCacheCleanup;
    use crate::guard::clock::ManualClock;

    const MB: u64 = 1024 * 1024;

    fn guard(probe: Arc<StaticProbe>, cleanup: CleanupCoordinator) -> (MemoryGuard, Receiver<MemoryEvent>) {
        MemoryGuard::new(
            MemoryGuardConfig {
                limit_bytes: 100 * MB,
                check_interval: Duration::from_millis(10),
                history_size: 10,
            },
            probe,
            Arc::new(ManualClock::new()),
            Arc::new(cleanup),
        )
    }

    #[test]
    fn test_under_limit() {
        let probe = Arc::new(StaticProbe::new(10 * MB));
        let (guard, events) = guard(probe, CleanupCoordinator::new());
        assert!(guard.check());
        assert!(!guard.is_degraded());
        assert!(events.try_recv().is_err());
        assert_eq!(guard.average(), Some(10 * MB));
    }

    #[test]
    fn test_over_limit_degrades_and_recovers() {
        let probe = Arc::new(StaticProbe::new(150 * MB));
        let (guard, events) = guard(probe.clone(), CleanupCoordinator::new());
        assert!(!guard.check());
        assert!(guard.is_degraded());
        assert_eq!(
            events.try_recv().unwrap(),
            MemoryEvent::Degraded {
                usage: 150 * MB,
                limit: 100 * MB
            }
        );

        probe.set(50 * MB);
        assert!(guard.check());
        assert_eq!(events.try_recv().unwrap(), MemoryEvent::Recovered);
    }

    #[test]
    fn test_sustained_pressure_sends_one_event() {
        let probe = Arc::new(StaticProbe::new(150 * MB));
        let (guard, events) = guard(probe.clone(), CleanupCoordinator::new());
        for _ in 0..5 {
            assert!(!guard.check());
        }
        assert_eq!(events.try_iter().count(), 1);

        probe.set(50 * MB);
        guard.check();
        guard.check();
        probe.set(150 * MB);
        guard.check();
        guard.check();
        let later: Vec<MemoryEvent> = events.try_iter().collect();
        assert_eq!(
            later,
            vec![
                MemoryEvent::Recovered,
                MemoryEvent::Degraded {
                    usage: 150 * MB,
                    limit: 100 * MB
                }
            ]
        );
    }

    #[test]
    fn test_cleanup_runs_on_pressure() {
        let cache: Arc<LruCache<u32, u32>> = Arc::new(LruCache::new("selection", 10));
        cache.insert(1, 1);
        let coordinator = CleanupCoordinator::new()
            .with_strategy(Box::new(LruCacheCleanup::new(vec![cache.clone() as Arc<dyn EvictableCache>])));
        let probe = Arc::new(StaticProbe::new(150 * MB));
        let (guard, _events) = guard(probe, coordinator);
        guard.check();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_trend() {
        let probe = Arc::new(StaticProbe::new(10 * MB));
        let (guard, _events) = guard(probe.clone(), CleanupCoordinator::new());
        for _ in 0..4 {
            guard.check();
        }
        assert_eq!(guard.trend(), MemoryTrend::Stable);
        probe.set(20 * MB);
        guard.check();
        assert_eq!(guard.trend(), MemoryTrend::Increasing);

        for _ in 0..5 {
            guard.check();
        }
        probe.set(5 * MB);
        guard.check();
        assert_eq!(guard.trend(), MemoryTrend::Decreasing);
    }

    #[test]
    fn test_monitoring_lifecycle() {
        let probe = Arc::new(StaticProbe::new(10 * MB));
        let (guard, _events) = guard(probe, CleanupCoordinator::new());
        let guard = Arc::new(guard);
        assert!(!guard.is_monitoring());
        guard.start_monitoring().unwrap();
        guard.start_monitoring().unwrap();
        assert!(guard.is_monitoring());
        std::thread::sleep(Duration::from_millis(50));
        guard.stop_monitoring();
        assert!(!guard.is_monitoring());
        assert!(guard.stats().samples > 0);
    }
}
