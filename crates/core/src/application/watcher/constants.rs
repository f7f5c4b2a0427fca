// Watcher constants (No magic values)
use std::time::Duration;

/// Sleep between sweeps when no job asked for an earlier retry (10s)
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Sleep after a sweep failed outright before trying again (5s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(5);

/// Jobs reconciled at the same time within one sweep
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;
