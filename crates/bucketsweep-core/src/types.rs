//! Data model shared by the enumerator, classifier, and coordinator.
//!
//! Every value here is transient: it is produced by one purge invocation and
//! dropped when that invocation ends. Nothing is cached across passes.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of entries a single delete request may carry.
///
/// This is the per-request ceiling of the S3 `DeleteObjects` API.
pub const MAX_BATCH_SIZE: usize = 1000;

// ---------------------------------------------------------------------------
// ObjectVersionRef
// ---------------------------------------------------------------------------

/// One immutable version entry (object version or delete marker) in a
/// versioned bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectVersionRef {
    /// The object key.
    pub key: String,
    /// The version ID (`"null"` for objects written while versioning was off).
    pub version_id: String,
    /// Whether this entry is a delete marker.
    pub is_delete_marker: bool,
}

impl ObjectVersionRef {
    /// Reference an object version.
    #[must_use]
    pub fn version(key: impl Into<String>, version_id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            version_id: version_id.into(),
            is_delete_marker: false,
        }
    }

    /// Reference a delete marker.
    #[must_use]
    pub fn delete_marker(key: impl Into<String>, version_id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            version_id: version_id.into(),
            is_delete_marker: true,
        }
    }
}

impl fmt::Display for ObjectVersionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (VersionId={})", self.key, self.version_id)?;
        if self.is_delete_marker {
            f.write_str(" [delete marker]")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Retention / legal hold
// ---------------------------------------------------------------------------

/// Object Lock retention mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RetentionMode {
    /// Users with special permissions may shorten or remove the retention.
    Governance,
    /// No user, including the root account, can delete the version early.
    Compliance,
}

impl RetentionMode {
    /// Return the wire representation of the mode.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Governance => "GOVERNANCE",
            Self::Compliance => "COMPLIANCE",
        }
    }
}

impl fmt::Display for RetentionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a [`RetentionMode`] from a string fails.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown retention mode: {0}")]
pub struct ParseRetentionModeError(String);

impl FromStr for RetentionMode {
    type Err = ParseRetentionModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GOVERNANCE" => Ok(Self::Governance),
            "COMPLIANCE" => Ok(Self::Compliance),
            _ => Err(ParseRetentionModeError(s.to_owned())),
        }
    }
}

/// Retention settings attached to a single object version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Retention {
    /// Retention mode.
    pub mode: RetentionMode,
    /// The version cannot be deleted before this instant.
    pub retain_until: DateTime<Utc>,
}

impl Retention {
    /// Whether the retention still blocks deletion at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.retain_until > now
    }
}

/// Legal hold status of a single object version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LegalHoldStatus {
    /// A legal hold is in effect.
    On,
    /// No legal hold.
    #[default]
    Off,
}

// ---------------------------------------------------------------------------
// LockStatus
// ---------------------------------------------------------------------------

/// Deletability of one entry, derived at classification time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    rename_all = "camelCase",
    rename_all_fields = "camelCase",
    tag = "status"
)]
pub enum LockStatus {
    /// Nothing prevents deletion.
    Unlocked,
    /// An unexpired retention period protects the version.
    RetentionLocked {
        /// Retention mode.
        mode: RetentionMode,
        /// End of the retention period.
        retain_until: DateTime<Utc>,
    },
    /// A legal hold protects the version.
    LegalHold,
}

impl LockStatus {
    /// Whether the entry must never be included in a delete request.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        !matches!(self, Self::Unlocked)
    }
}

impl fmt::Display for LockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlocked => f.write_str("UNLOCKED"),
            Self::RetentionLocked { mode, retain_until } => {
                write!(f, "LOCKED ({mode}) until {}", retain_until.to_rfc3339())
            }
            Self::LegalHold => f.write_str("LEGAL HOLD"),
        }
    }
}

/// An entry that was classified as locked, together with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockedEntry {
    /// The protected entry.
    pub version: ObjectVersionRef,
    /// Why it is protected.
    pub status: LockStatus,
}

// ---------------------------------------------------------------------------
// PurgeBatch
// ---------------------------------------------------------------------------

/// An ordered set of at most [`MAX_BATCH_SIZE`] entries that were all
/// unlocked when classified. Sent as one delete request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeBatch {
    entries: Vec<ObjectVersionRef>,
}

impl PurgeBatch {
    /// Split `deletable` into batches of at most `batch_size` entries.
    ///
    /// `batch_size` is clamped to `1..=MAX_BATCH_SIZE`, so no batch produced
    /// here can exceed the store's request ceiling.
    #[must_use]
    pub fn partition(deletable: Vec<ObjectVersionRef>, batch_size: usize) -> Vec<Self> {
        let size = batch_size.clamp(1, MAX_BATCH_SIZE);
        let mut batches = Vec::with_capacity(deletable.len().div_ceil(size));
        let mut iter = deletable.into_iter().peekable();
        while iter.peek().is_some() {
            batches.push(Self {
                entries: iter.by_ref().take(size).collect(),
            });
        }
        batches
    }

    /// The entries in this batch.
    #[must_use]
    pub fn entries(&self) -> &[ObjectVersionRef] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the batch is empty. Batches built by [`Self::partition`]
    /// never are.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// PurgeOutcome
// ---------------------------------------------------------------------------

/// How a purge invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TerminalState {
    /// The bucket holds no versions and no delete markers.
    Empty,
    /// Every remaining entry is one that was classified as locked.
    EmptyExceptLocked,
    /// The confirmation gate was declined.
    Declined,
    /// The pass or time limit was reached before convergence.
    NotConverged,
    /// The purge was cancelled between passes or between batches.
    Cancelled,
}

impl TerminalState {
    /// Whether this state counts as convergence.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Empty | Self::EmptyExceptLocked)
    }
}

impl fmt::Display for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Empty => "empty",
            Self::EmptyExceptLocked => "empty except locked",
            Self::Declined => "declined",
            Self::NotConverged => "not converged",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Terminal report of one purge invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeOutcome {
    /// The purged bucket.
    pub bucket: String,
    /// How the purge ended.
    pub state: TerminalState,
    /// Whether the bucket reached a stable terminal state.
    pub converged: bool,
    /// Entries confirmed deleted across all passes.
    pub deleted_count: usize,
    /// Entries classified as locked in the last pass.
    pub locked_count: usize,
    /// Entries present at the last scan.
    pub remaining_count: usize,
    /// Number of passes started.
    pub passes: u32,
    /// The locked entries of the last pass.
    pub locked: Vec<LockedEntry>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
