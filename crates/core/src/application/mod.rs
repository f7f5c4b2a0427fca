// Application Layer - Use Cases and Business Logic

pub mod apply;
pub mod reconciler;
pub mod reset;
pub mod watcher;

// Re-exports
pub use apply::DecisionApplier;
pub use reconciler::{BlobReconciler, Decision, ReconcilerConfig};
pub use reset::{reset_job_config, ResetPlan};
pub use watcher::{
    shutdown_channel, ShutdownSender, ShutdownToken, SweepReport, Watcher, WatcherSettings,
};
