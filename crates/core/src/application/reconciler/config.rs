// Reconciler timing parameters (No magic values)
use std::time::Duration;

/// Cool-down after a blob's last modification before it may be promoted (2 min)
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(2 * 60);

/// Retry delay while a blob is still being transformed or imported (3s)
pub const DEFAULT_BUSY_RETRY: Duration = Duration::from_secs(3);

/// Retry delay while a transformed blob is inside its debounce window (10s)
pub const DEFAULT_SETTLING_RETRY: Duration = Duration::from_secs(10);

/// Retry delay after promoting blobs, so the service can reflect the change (15s)
pub const DEFAULT_PROMOTION_RETRY: Duration = Duration::from_secs(15);

/// Timing knobs of the reconciliation engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    pub debounce: Duration,
    pub busy_retry: Duration,
    pub settling_retry: Duration,
    pub promotion_retry: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            busy_retry: DEFAULT_BUSY_RETRY,
            settling_retry: DEFAULT_SETTLING_RETRY,
            promotion_retry: DEFAULT_PROMOTION_RETRY,
        }
    }
}
