//! Error types for the purge engine.
//!
//! Every variant is fatal to the current purge invocation. Recoverable
//! conditions ("not configured" lock queries, a declined confirmation) are
//! not errors and never reach this type.

use crate::store::StoreError;

/// Purge engine error type.
#[derive(Debug, thiserror::Error)]
pub enum PurgeError {
    /// A listing page could not be fetched. No partial listing is trusted.
    #[error("failed to enumerate versions of bucket {bucket}")]
    Enumeration {
        /// The bucket being listed.
        bucket: String,
        /// The underlying store error.
        #[source]
        source: StoreError,
    },

    /// A retention or legal-hold query failed with something other than
    /// "not configured".
    #[error("failed to classify {key} (VersionId={version_id})")]
    Classification {
        /// The object key.
        key: String,
        /// The version ID.
        version_id: String,
        /// The underlying store error.
        #[source]
        source: StoreError,
    },

    /// A delete request failed as a whole. Batches that completed before it
    /// are included in `deleted`.
    #[error(
        "delete batch {batch_index} ({batch_len} entries) failed for bucket {bucket} after {deleted} deletions"
    )]
    DeleteBatch {
        /// The bucket being purged.
        bucket: String,
        /// Zero-based index of the failing batch within its pass.
        batch_index: usize,
        /// Number of entries in the failing batch.
        batch_len: usize,
        /// Entries deleted by this invocation before the failure.
        deleted: usize,
        /// The underlying store error.
        #[source]
        source: StoreError,
    },

    /// The purge configuration is unusable.
    #[error("invalid purge configuration: {0}")]
    InvalidConfig(String),

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PurgeError {
    /// The underlying store error, if this error came from the store.
    #[must_use]
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Enumeration { source, .. }
            | Self::Classification { source, .. }
            | Self::DeleteBatch { source, .. } => Some(source),
            Self::InvalidConfig(_) | Self::Internal(_) => None,
        }
    }
}

/// Convenience result type for purge operations.
pub type PurgeResult<T> = Result<T, PurgeError>;
