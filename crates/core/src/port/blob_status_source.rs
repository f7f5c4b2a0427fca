// Blob Status Source Port (remote blob-processing service)

use crate::domain::{BlobId, BlobStatus};
use crate::error::Result;
use async_trait::async_trait;

/// Read and advance blobs held by the remote processing service.
///
/// Implementations:
/// - HttpBlobStatusSource: record-import REST API (infra-http)
/// - mocks::InMemoryBlobSource: tests
#[async_trait]
pub trait BlobStatusSource: Send + Sync {
    /// Current lifecycle status of a blob
    ///
    /// # Errors
    /// - `AppError::NotFound` if the service does not know the blob
    /// - `AppError::Transport` on connection or protocol failure
    async fn read_status(&self, blob_id: &BlobId) -> Result<BlobStatus>;

    /// Ask the service to mark a blob as processed.
    ///
    /// Must be safe to repeat: the next pass re-reads the blob either way.
    async fn advance_to_processed(&self, blob_id: &BlobId) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::BlobState;
    use crate::error::AppError;
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex};

    /// In-memory Blob Status Source for testing
    ///
    /// `advance_to_processed` takes effect immediately and is recorded.
    #[derive(Default)]
    pub struct InMemoryBlobSource {
        blobs: Arc<Mutex<HashMap<BlobId, BlobStatus>>>,
        reads: Arc<Mutex<Vec<BlobId>>>,
        advanced: Arc<Mutex<Vec<BlobId>>>,
        unreachable: Arc<Mutex<HashSet<BlobId>>>,
    }

    impl InMemoryBlobSource {
        pub fn new(blobs: Vec<BlobStatus>) -> Self {
            let source = Self::default();
            for blob in blobs {
                source.put(blob);
            }
            source
        }

        /// Insert or replace a blob snapshot
        pub fn put(&self, blob: BlobStatus) {
            self.blobs.lock().unwrap().insert(blob.id.clone(), blob);
        }

        pub fn state_of(&self, blob_id: &str) -> Option<BlobState> {
            self.blobs.lock().unwrap().get(blob_id).map(|b| b.state)
        }

        /// Blob ids read so far, in call order
        pub fn reads(&self) -> Vec<BlobId> {
            self.reads.lock().unwrap().clone()
        }

        /// Blob ids advanced so far, in call order
        pub fn advanced(&self) -> Vec<BlobId> {
            self.advanced.lock().unwrap().clone()
        }

        /// Make reads of this blob fail with a transport error
        pub fn make_unreachable(&self, blob_id: impl Into<String>) {
            self.unreachable.lock().unwrap().insert(blob_id.into());
        }
    }

    #[async_trait]
    impl BlobStatusSource for InMemoryBlobSource {
        async fn read_status(&self, blob_id: &BlobId) -> Result<BlobStatus> {
            self.reads.lock().unwrap().push(blob_id.clone());

            if self.unreachable.lock().unwrap().contains(blob_id) {
                return Err(AppError::Transport(format!(
                    "connection refused while reading blob {}",
                    blob_id
                )));
            }

            self.blobs
                .lock()
                .unwrap()
                .get(blob_id)
                .cloned()
                .ok_or_else(|| AppError::NotFound(format!("Blob {} not found", blob_id)))
        }

        async fn advance_to_processed(&self, blob_id: &BlobId) -> Result<()> {
            let mut blobs = self.blobs.lock().unwrap();
            let blob = blobs
                .get_mut(blob_id)
                .ok_or_else(|| AppError::NotFound(format!("Blob {} not found", blob_id)))?;
            blob.state = BlobState::Processed;
            self.advanced.lock().unwrap().push(blob_id.clone());
            Ok(())
        }
    }
}
