// Blob Domain Model - read-only snapshots of the remote processing service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Blob ID (assigned by the processing service)
pub type BlobId = String;

/// Import-result reason reported when the target record was edited after the
/// harvest. The blob finished, but the job has to be harvested again.
pub const MODIFICATION_HISTORY_CONFLICT: &str = "409 - Modification history mismatch (CAT)";

/// Blob lifecycle state as reported by the processing service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlobState {
    PendingTransformation,
    TransformationInProgress,
    Transformed,
    Processing,
    Processed,
    TransformationFailed,
    Aborted,
    /// Any state the service added after this enum was written
    #[serde(other)]
    Unrecognized,
}

impl std::fmt::Display for BlobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BlobState::PendingTransformation => "PENDING_TRANSFORMATION",
            BlobState::TransformationInProgress => "TRANSFORMATION_IN_PROGRESS",
            BlobState::Transformed => "TRANSFORMED",
            BlobState::Processing => "PROCESSING",
            BlobState::Processed => "PROCESSED",
            BlobState::TransformationFailed => "TRANSFORMATION_FAILED",
            BlobState::Aborted => "ABORTED",
            BlobState::Unrecognized => "UNRECOGNIZED",
        };
        f.write_str(s)
    }
}

/// Outcome of importing one record of a blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportStatus {
    Created,
    Updated,
    Deleted,
    Skipped,
    Duplicate,
    Invalid,
    Error,
    #[serde(other)]
    Unrecognized,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Present when the record was skipped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub status: ImportStatus,
    #[serde(default)]
    pub metadata: ImportMetadata,
}

impl ImportResult {
    /// Skipped because the target record's modification history diverged
    pub fn is_modification_conflict(&self) -> bool {
        self.status == ImportStatus::Skipped
            && self.metadata.reason.as_deref() == Some(MODIFICATION_HISTORY_CONFLICT)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingInfo {
    #[serde(default)]
    pub number_of_records: u64,

    #[serde(default)]
    pub failed_records: Vec<Value>,

    /// Ordered as reported by the service
    #[serde(default)]
    pub import_results: Vec<ImportResult>,
}

/// Status snapshot of one blob, fetched once per reconciliation pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobStatus {
    pub id: BlobId,
    pub state: BlobState,
    pub modification_time: DateTime<Utc>,
    #[serde(default)]
    pub processing_info: ProcessingInfo,
}

impl BlobStatus {
    pub fn new(id: impl Into<String>, state: BlobState, modification_time: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            state,
            modification_time,
            processing_info: ProcessingInfo::default(),
        }
    }

    pub fn with_records(mut self, number_of_records: u64) -> Self {
        self.processing_info.number_of_records = number_of_records;
        self
    }

    pub fn with_import_result(mut self, result: ImportResult) -> Self {
        self.processing_info.import_results.push(result);
        self
    }

    pub fn has_modification_conflict(&self) -> bool {
        self.processing_info
            .import_results
            .iter()
            .any(ImportResult::is_modification_conflict)
    }
}
