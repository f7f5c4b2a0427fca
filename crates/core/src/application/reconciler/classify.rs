//! Blob status classification
//!
//! Pure mapping from one [`BlobStatus`] snapshot to what it means for the
//! owning job in this pass. Holds the debounce and conflict rules; performs
//! no I/O.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::domain::{BlobState, BlobStatus};

/// What one blob contributes to the job decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobVerdict {
    /// Still moving through the service (or in a state we do not know)
    Busy,
    /// Transformed, but modified too recently to promote
    Settling,
    /// Transformed, settled and non-empty: advance it to processed
    Promote,
    /// Transformed and settled, but carries no records. Never promoted.
    Empty,
    /// Processed; `conflict` when an import hit a modification-history mismatch
    Resolved { conflict: bool },
    /// Transformation failed; the job has to be harvested again
    Failed,
    /// Aborted by the service; terminal for the whole job
    Aborted,
}

impl BlobVerdict {
    /// Counts towards the job's resolved blobs
    pub const fn is_resolved(&self) -> bool {
        matches!(self, BlobVerdict::Resolved { .. } | BlobVerdict::Failed)
    }

    /// Forces a restart once the job is otherwise resolved
    pub const fn needs_restart(&self) -> bool {
        matches!(
            self,
            BlobVerdict::Resolved { conflict: true } | BlobVerdict::Failed
        )
    }
}

/// True once `modification_time + debounce` is at or before `now`
pub fn debounce_satisfied(
    modification_time: DateTime<Utc>,
    now: DateTime<Utc>,
    debounce: Duration,
) -> bool {
    match chrono::Duration::from_std(debounce) {
        Ok(window) => modification_time
            .checked_add_signed(window)
            .is_some_and(|eligible_at| eligible_at <= now),
        Err(_) => false,
    }
}

/// Classify a blob snapshot taken at `now`
pub fn classify(status: &BlobStatus, now: DateTime<Utc>, debounce: Duration) -> BlobVerdict {
    match status.state {
        BlobState::PendingTransformation
        | BlobState::TransformationInProgress
        | BlobState::Processing
        | BlobState::Unrecognized => BlobVerdict::Busy,
        BlobState::Transformed => {
            if !debounce_satisfied(status.modification_time, now, debounce) {
                BlobVerdict::Settling
            } else if status.processing_info.number_of_records == 0 {
                BlobVerdict::Empty
            } else {
                BlobVerdict::Promote
            }
        }
        BlobState::Processed => BlobVerdict::Resolved {
            conflict: status.has_modification_conflict(),
        },
        BlobState::TransformationFailed => BlobVerdict::Failed,
        BlobState::Aborted => BlobVerdict::Aborted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ImportMetadata, ImportResult, ImportStatus, MODIFICATION_HISTORY_CONFLICT};
    use chrono::TimeZone;

    const TWO_MINUTES: Duration = Duration::from_secs(120);

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_600_000_000 + secs, 0).unwrap()
    }

    fn conflict() -> ImportResult {
        ImportResult {
            timestamp: None,
            status: ImportStatus::Skipped,
            metadata: ImportMetadata {
                id: Some("016122561".to_string()),
                reason: Some(MODIFICATION_HISTORY_CONFLICT.to_string()),
            },
        }
    }

    #[test]
    fn test_busy_states() {
        for state in [
            BlobState::PendingTransformation,
            BlobState::TransformationInProgress,
            BlobState::Processing,
            BlobState::Unrecognized,
        ] {
            let blob = BlobStatus::new("b1", state, at(0));
            assert_eq!(classify(&blob, at(3600), TWO_MINUTES), BlobVerdict::Busy);
        }
    }

    #[test]
    fn test_debounce_boundary() {
        let blob = BlobStatus::new("b1", BlobState::Transformed, at(0)).with_records(3);

        assert_eq!(classify(&blob, at(119), TWO_MINUTES), BlobVerdict::Settling);
        assert_eq!(classify(&blob, at(120), TWO_MINUTES), BlobVerdict::Promote);
        assert_eq!(classify(&blob, at(600), TWO_MINUTES), BlobVerdict::Promote);
    }

    #[test]
    fn test_transformed_without_records_is_never_promoted() {
        let blob = BlobStatus::new("b1", BlobState::Transformed, at(0));

        assert_eq!(classify(&blob, at(0), TWO_MINUTES), BlobVerdict::Settling);
        assert_eq!(classify(&blob, at(120), TWO_MINUTES), BlobVerdict::Empty);
        assert_eq!(classify(&blob, at(86_400 * 30), TWO_MINUTES), BlobVerdict::Empty);
    }

    #[test]
    fn test_modification_time_in_future_is_not_settled() {
        assert!(!debounce_satisfied(at(300), at(0), TWO_MINUTES));
        assert!(debounce_satisfied(at(0), at(0), Duration::ZERO));
    }

    #[test]
    fn test_processed_with_and_without_conflict() {
        let clean = BlobStatus::new("b1", BlobState::Processed, at(0));
        assert_eq!(
            classify(&clean, at(0), TWO_MINUTES),
            BlobVerdict::Resolved { conflict: false }
        );

        let conflicted =
            BlobStatus::new("b2", BlobState::Processed, at(0)).with_import_result(conflict());
        let verdict = classify(&conflicted, at(0), TWO_MINUTES);
        assert_eq!(verdict, BlobVerdict::Resolved { conflict: true });
        assert!(verdict.is_resolved());
        assert!(verdict.needs_restart());
    }

    #[test]
    fn test_failed_and_aborted() {
        let failed = BlobStatus::new("b1", BlobState::TransformationFailed, at(0));
        let verdict = classify(&failed, at(0), TWO_MINUTES);
        assert_eq!(verdict, BlobVerdict::Failed);
        assert!(verdict.is_resolved() && verdict.needs_restart());

        let aborted = BlobStatus::new("b2", BlobState::Aborted, at(0));
        let verdict = classify(&aborted, at(0), TWO_MINUTES);
        assert_eq!(verdict, BlobVerdict::Aborted);
        assert!(!verdict.is_resolved());
    }
}
