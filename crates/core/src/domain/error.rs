// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Job {0} has no blobs")]
    EmptyBlobList(String),

    #[error("Unknown job state: {0}")]
    UnknownJobState(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
