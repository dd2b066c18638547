//! Batch job snapshots and status arithmetic.
//!
//! A `BatchJob` is the client's view of a remote batch. It is only ever
//! written by the vendor; each poll replaces the whole snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::file::FileId;

/// Identifier assigned by the vendor to a batch job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchJobId(pub String);

impl From<&str> for BatchJobId {
    fn from(id: &str) -> Self {
        BatchJobId(id.to_string())
    }
}

impl std::ops::Deref for BatchJobId {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for BatchJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Remote lifecycle state of a batch job.
///
/// Statuses not in this list deserialize to `Unknown` and are treated as
/// still working, so a new vendor state cannot crash a poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Input file is being validated (initial state after submit)
    Validating,
    /// Requests are being processed
    InProgress,
    /// Processing finished, output files being assembled
    Finalizing,
    /// Cancellation requested but not yet effective
    Cancelling,
    /// All requests reached a terminal state with output available
    Completed,
    /// The batch failed as a whole
    Failed,
    /// The completion window elapsed before the batch finished
    Expired,
    /// The batch was cancelled
    Cancelled,
    /// A status this client does not recognize
    #[serde(other)]
    Unknown,
}

impl BatchStatus {
    /// Check if no further transition can occur from this status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchStatus::Completed
                | BatchStatus::Failed
                | BatchStatus::Expired
                | BatchStatus::Cancelled
        )
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BatchStatus::Validating => "validating",
            BatchStatus::InProgress => "in_progress",
            BatchStatus::Finalizing => "finalizing",
            BatchStatus::Cancelling => "cancelling",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
            BatchStatus::Expired => "expired",
            BatchStatus::Cancelled => "cancelled",
            BatchStatus::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Request counters reported by the vendor.
///
/// Every field defaults to zero so a payload that omits `request_counts`
/// (or individual members) still deserializes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCounts {
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub completed: i64,
    #[serde(default)]
    pub failed: i64,
}

/// A snapshot of a remote batch job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    pub id: BatchJobId,
    pub status: BatchStatus,
    #[serde(default)]
    pub input_file_id: Option<FileId>,
    /// File containing the successful results, once the batch finalizes
    #[serde(default)]
    pub output_file_id: Option<FileId>,
    /// File containing per-request errors, if any occurred
    #[serde(default)]
    pub error_file_id: Option<FileId>,
    #[serde(default)]
    pub request_counts: RequestCounts,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl BatchJob {
    /// Compute the derived progress view for this snapshot.
    ///
    /// `n_processing` is whatever the vendor has not yet accounted for as
    /// completed or failed, clamped at zero in case counters arrive skewed.
    pub fn summary(&self) -> BatchStatusSummary {
        let counts = self.request_counts;
        BatchStatusSummary {
            working: !self.status.is_terminal(),
            n_processing: (counts.total - counts.completed - counts.failed).max(0),
            n_succeeded: counts.completed,
            n_failed: counts.failed,
        }
    }
}

/// Derived progress counters for a batch job snapshot.
///
/// Recomputed on every poll, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchStatusSummary {
    /// True while the job has not reached a terminal status
    pub working: bool,
    pub n_processing: i64,
    pub n_succeeded: i64,
    pub n_failed: i64,
}

impl fmt::Display for BatchStatusSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} processing, {} succeeded, {} failed",
            if self.working { "working" } else { "done" },
            self.n_processing,
            self.n_succeeded,
            self.n_failed
        )
    }
}
