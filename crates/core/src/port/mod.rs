// Port Layer - Interfaces for external dependencies

pub mod blob_status_source;
pub mod job_store;
pub mod time_provider; // For deterministic testing

// Re-exports
pub use blob_status_source::BlobStatusSource;
pub use job_store::JobStore;
pub use time_provider::TimeProvider;
