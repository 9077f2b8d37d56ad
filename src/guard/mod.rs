//! Resource protection.
//!
//! The memory guard samples process memory and runs cleanup when usage
//! exceeds the limit. The error-threshold manager switches segmentation to
//! the line-only path after repeated failures. Both share a
//! [`CleanupCoordinator`] and a [`Clock`].

pub mod cleanup;
pub mod clock;
pub mod memory;
pub mod ring;
pub mod threshold;

pub use cleanup::{
    CleanupContext, CleanupCoordinator, CleanupResult, CleanupStrategy, ERROR_THRESHOLD_TRIGGER,
    LruCacheCleanup, MEMORY_PRESSURE_TRIGGER, ParserCacheCleanup,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use memory::{
    MemoryEvent, MemoryGuard, MemoryGuardConfig, MemoryProbe, MemorySample, MemoryStats,
    MemoryTrend, StaticProbe, SysinfoProbe,
};
pub use ring::RingBuffer;
pub use threshold::{ErrorRecord, ErrorThresholdManager, ThresholdStats};
