//! The object-store capability consumed by the purge engine.
//!
//! [`VersionStore`] is the seam between the engine and a concrete client.
//! The engine never talks to S3 directly; it receives an `Arc<S>` where
//! `S: VersionStore`, so tests can substitute
//! [`InMemoryVersionStore`](crate::memory::InMemoryVersionStore) or a
//! fault-injecting wrapper.
//!
//! # Object safety
//!
//! The trait uses `#[async_trait]` so that implementations can be shared as
//! `Arc<dyn VersionStore>` as well as through generics.

use async_trait::async_trait;

use crate::types::{LegalHoldStatus, ObjectVersionRef, PurgeBatch, Retention};

/// Well-known S3 error codes the engine and its adapters care about.
pub mod codes {
    /// No Object Lock configuration exists for the bucket or version.
    pub const NO_SUCH_OBJECT_LOCK_CONFIGURATION: &str = "NoSuchObjectLockConfiguration";
    /// The request does not apply (e.g. lock query on a bucket without Object Lock).
    pub const INVALID_REQUEST: &str = "InvalidRequest";
    /// Access denied, also returned when a lock blocks a versioned delete.
    pub const ACCESS_DENIED: &str = "AccessDenied";
    /// The bucket does not exist.
    pub const NO_SUCH_BUCKET: &str = "NoSuchBucket";
    /// The version does not exist.
    pub const NO_SUCH_VERSION: &str = "NoSuchVersion";
    /// The method is not allowed for this resource (e.g. a delete marker).
    pub const METHOD_NOT_ALLOWED: &str = "MethodNotAllowed";
}

/// Lock-query error codes that mean "no restriction applies" by default.
pub const DEFAULT_NOT_CONFIGURED_CODES: [&str; 2] = [
    codes::NO_SUCH_OBJECT_LOCK_CONFIGURATION,
    codes::INVALID_REQUEST,
];

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error reported by a [`VersionStore`] call.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store answered with a service error code.
    #[error("{code}: {message}")]
    Service {
        /// The service error code (e.g. `AccessDenied`).
        code: String,
        /// Human-readable message.
        message: String,
    },

    /// The store answered, but the response cannot be used.
    #[error("malformed store response: {0}")]
    Malformed(String),

    /// The request never produced a service answer (network, timeout, ...).
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

impl StoreError {
    /// Build a [`StoreError::Service`].
    #[must_use]
    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            code: code.into(),
            message: message.into(),
        }
    }

    /// The service error code, if the store produced one.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Service { code, .. } => Some(code),
            Self::Malformed(_) | Self::Transport(_) => None,
        }
    }
}

/// Convenience result type for store calls.
pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// LockQueryResult
// ---------------------------------------------------------------------------

/// Result of a retention or legal-hold query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockQueryResult<T> {
    /// The store reported lock state for the version.
    Found(T),
    /// No lock configuration applies to the version.
    NotConfigured,
}

impl<T> LockQueryResult<T> {
    /// Collapse the "not configured" subset of query failures into
    /// [`LockQueryResult::NotConfigured`].
    ///
    /// Errors whose code appears in `not_configured` become `NotConfigured`;
    /// every other error is returned unchanged.
    pub fn collapse<C: AsRef<str>>(
        result: StoreResult<T>,
        not_configured: &[C],
    ) -> StoreResult<Self> {
        match result {
            Ok(value) => Ok(Self::Found(value)),
            Err(err)
                if err
                    .code()
                    .is_some_and(|code| not_configured.iter().any(|c| c.as_ref() == code)) =>
            {
                Ok(Self::NotConfigured)
            }
            Err(err) => Err(err),
        }
    }

    /// The found value, if any.
    #[must_use]
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::NotConfigured => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Listing / deletion payloads
// ---------------------------------------------------------------------------

/// Continuation markers for the next listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    /// Key to resume after.
    pub key_marker: String,
    /// Version ID to resume after within `key_marker`.
    pub version_id_marker: Option<String>,
}

/// One page of a version listing.
#[derive(Debug, Clone, Default)]
pub struct VersionPage {
    /// Object versions and delete markers on this page.
    pub versions: Vec<ObjectVersionRef>,
    /// Cursor for the next page; `None` on the last page.
    pub next: Option<PageCursor>,
}

/// A single entry the store refused to delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteFailure {
    /// The object key.
    pub key: String,
    /// The version ID, when the store echoed it back.
    pub version_id: Option<String>,
    /// The error code (e.g. `AccessDenied`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

/// Per-item outcome of one delete request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    /// Number of entries the store deleted.
    pub deleted: usize,
    /// Entries the store refused to delete.
    pub failures: Vec<DeleteFailure>,
}

// ---------------------------------------------------------------------------
// VersionStore
// ---------------------------------------------------------------------------

/// Capabilities the purge engine needs from a versioned object store.
#[async_trait]
pub trait VersionStore: Send + Sync + 'static {
    /// Fetch one page of object versions and delete markers.
    ///
    /// `cursor` is `None` for the first page.
    async fn list_versions(
        &self,
        bucket: &str,
        cursor: Option<&PageCursor>,
    ) -> StoreResult<VersionPage>;

    /// Query the retention of one exact key + version.
    async fn get_retention(
        &self,
        bucket: &str,
        version: &ObjectVersionRef,
    ) -> StoreResult<LockQueryResult<Retention>>;

    /// Query the legal hold of one exact key + version.
    async fn get_legal_hold(
        &self,
        bucket: &str,
        version: &ObjectVersionRef,
    ) -> StoreResult<LockQueryResult<LegalHoldStatus>>;

    /// Delete every entry of `batch` in a single request.
    ///
    /// An `Err` means the request as a whole failed; refusals of individual
    /// entries are reported in [`DeleteReport::failures`].
    async fn delete_versions(&self, bucket: &str, batch: &PurgeBatch)
    -> StoreResult<DeleteReport>;
}
