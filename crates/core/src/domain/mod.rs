// Domain Layer - Pure business logic and entities

pub mod blob;
pub mod error;
pub mod job;

// Re-exports
pub use blob::{
    BlobId, BlobState, BlobStatus, ImportMetadata, ImportResult, ImportStatus, ProcessingInfo,
    MODIFICATION_HISTORY_CONFLICT,
};
pub use error::DomainError;
pub use job::{HarvestSearch, HarvestType, Job, JobConfig, JobId, JobState};
