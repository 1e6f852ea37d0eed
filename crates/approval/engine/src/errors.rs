//! Error types for the approval engine
//!
//! Every error carries a stable, human-readable message suitable for
//! direct display or logging. Authorization errors never enumerate who
//! else would have been eligible.

use approval_store::StorageError;

/// Errors surfaced by approval engine operations
#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    /// Referenced expense, record, or template does not exist
    #[error("{0}")]
    NotFound(String),

    /// The record's current state rejects the operation; re-fetch to
    /// observe what happened
    #[error("{0}")]
    Conflict(String),

    /// The acting user is not eligible for this operation
    #[error("{0}")]
    Authorization(String),

    /// Malformed decision or delegation payload
    #[error("{0}")]
    Validation(String),

    /// The approver directory failed or returned an unusable answer
    #[error("directory error: {0}")]
    Directory(String),

    /// Notification dispatch failed; always swallowed and logged by
    /// callers, never surfaced from an engine operation
    #[error("notification error: {0}")]
    Notification(String),

    /// Store failure on a write path; the transaction was rolled back
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApprovalError {
    pub fn record_not_found() -> Self {
        Self::NotFound("Approval record not found".to_string())
    }

    pub fn already_processed() -> Self {
        Self::Conflict("Approval has already been processed".to_string())
    }

    pub fn not_authorized() -> Self {
        Self::Authorization("User is not authorized to approve this expense".to_string())
    }
}

/// Result type alias for approval engine operations
pub type ApprovalResult<T> = Result<T, ApprovalError>;
