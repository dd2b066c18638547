//! Core domain types for the batch client.
//!
//! This module contains pure data types with no transport dependencies:
//! - Batch job snapshots and derived status
//! - Remote file metadata
//! - Per-request result records

pub mod batch;
pub mod file;
pub mod result;

pub use batch::{BatchJob, BatchJobId, BatchStatus, BatchStatusSummary, RequestCounts};
pub use file::{FileId, FileObject, Purpose};
pub use result::{CUSTOM_ID_PREFIX, ResultRecord, ResultResponse};
