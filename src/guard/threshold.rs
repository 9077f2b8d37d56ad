//! Error-threshold manager.
//!
//! Counts recent segmentation errors. Once the count reaches the threshold
//! the manager enters fallback mode: callers use the line strategy only,
//! and a cleanup run is dispatched onto the rayon pool. Fallback mode ends
//! when `reset_interval` has passed since it was triggered.

use crate::guard::cleanup::{CleanupContext, CleanupCoordinator, ERROR_THRESHOLD_TRIGGER};
use crate::guard::clock::Clock;
use crate::guard::ring::RingBuffer;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Errors kept for diagnostics.
const ERROR_HISTORY: usize = 50;

/// One recorded failure.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    /// When the error was recorded.
    pub at: Instant,
    /// Error message.
    pub message: String,
    /// Where it happened, e.g. a strategy or file name.
    pub context: Option<String>,
}

/// Snapshot for health reports.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdStats {
    /// Errors since the last reset.
    pub error_count: usize,
    /// Configured threshold.
    pub max_errors: usize,
    /// Whether fallback mode is active.
    pub fallback_active: bool,
}

#[derive(Debug)]
struct State {
    count: usize,
    triggered_at: Option<Instant>,
    recent: RingBuffer<ErrorRecord>,
}

/// Tracks errors and decides when to force the fallback path.
pub struct ErrorThresholdManager {
    max_errors: usize,
    reset_interval: Duration,
    clock: Arc<dyn Clock>,
    cleanup: Option<Arc<CleanupCoordinator>>,
    state: Mutex<State>,
}

impl std::fmt::Debug for ErrorThresholdManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorThresholdManager")
            .field("max_errors", &self.max_errors)
            .field("reset_interval", &self.reset_interval)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl ErrorThresholdManager {
    /// Creates a manager. `max_errors` is raised to at least one.
    #[must_use]
    pub fn new(
        max_errors: usize,
        reset_interval: Duration,
        clock: Arc<dyn Clock>,
        cleanup: Option<Arc<CleanupCoordinator>>,
    ) -> Self {
        Self {
            max_errors: max_errors.max(1),
            reset_interval,
            clock,
            cleanup,
            state: Mutex::new(State {
                count: 0,
                triggered_at: None,
                recent: RingBuffer::new(ERROR_HISTORY),
            }),
        }
    }

    /// Records a failure. Reaching the threshold enters fallback mode.
    pub fn record_error(&self, message: impl Into<String>, context: Option<&str>) {
        let now = self.clock.now();
        let message = message.into();
        let triggered = {
            let mut state = self.state.lock();
            state.count += 1;
            state.recent.push(ErrorRecord {
                at: now,
                message: message.clone(),
                context: context.map(str::to_string),
            });
            if state.count >= self.max_errors && state.triggered_at.is_none() {
                state.triggered_at = Some(now);
                true
            } else {
                false
            }
        };

        tracing::debug!(error = %message, context, "segmentation error recorded");
        if triggered {
            tracing::warn!(
                max_errors = self.max_errors,
                reset_after_ms = self.reset_interval.as_millis(),
                "error threshold reached, switching to line-only fallback"
            );
            self.dispatch_cleanup();
        }
    }

    fn dispatch_cleanup(&self) {
        let Some(cleanup) = self.cleanup.clone() else {
            return;
        };
        rayon::spawn(move || {
            let ctx = CleanupContext::new(ERROR_THRESHOLD_TRIGGER, None, 0);
            let result = cleanup.run(&ctx, || true);
            if result.success {
                tracing::info!(
                    freed = result.memory_freed,
                    caches = ?result.cleaned_caches,
                    "error-threshold cleanup finished"
                );
            } else {
                tracing::warn!(caches = ?result.cleaned_caches, "error-threshold cleanup incomplete");
            }
        });
    }

    /// Whether callers must use the fallback path.
    ///
    /// Resets the manager once `reset_interval` has passed since the
    /// threshold was reached.
    pub fn should_use_fallback(&self) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let Some(triggered_at) = state.triggered_at else {
            return false;
        };
        if now.saturating_duration_since(triggered_at) >= self.reset_interval {
            state.count = 0;
            state.triggered_at = None;
            tracing::info!("error threshold reset, resuming normal selection");
            return false;
        }
        true
    }

    /// Errors since the last reset.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.state.lock().count
    }

    /// Configured threshold.
    #[must_use]
    pub const fn max_errors(&self) -> usize {
        self.max_errors
    }

    /// Most recent errors, oldest first.
    #[must_use]
    pub fn recent_errors(&self) -> Vec<ErrorRecord> {
        self.state.lock().recent.iter().cloned().collect()
    }

    /// Clears the count and leaves fallback mode.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.count = 0;
        state.triggered_at = None;
        state.recent.clear();
    }

    /// Health snapshot.
    #[must_use]
    pub fn stats(&self) -> ThresholdStats {
        let state = self.state.lock();
        ThresholdStats {
            error_count: state.count,
            max_errors: self.max_errors,
            fallback_active: state.triggered_at.is_some(),
        }
    }
}
