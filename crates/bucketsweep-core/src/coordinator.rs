//! Purge Coordinator: drives a bucket to a stable terminal state.
//!
//! Each pass runs `Scanning -> Confirming -> Deleting -> Rescanning`. A
//! pass ends the purge when the re-scan finds only the entries that were
//! classified as locked; otherwise another pass starts, up to
//! [`PurgeConfig::max_passes`] and [`PurgeConfig::max_duration`].
//!
//! ```text
//!             +-----------+   empty    +-------+
//!   start --> | Scanning  | ---------> | Empty |
//!             +-----------+            +-------+
//!                   |
//!                   v          declined   +----------+
//!             +-----------+ ------------> | Declined |
//!             | Confirming|               +----------+
//!             +-----------+
//!                   |
//!                   v
//!             +-----------+  batch error  +------------------+
//!             | Deleting  | ------------> | PurgeError::     |
//!             +-----------+               | DeleteBatch      |
//!                   |                     +------------------+
//!                   v
//!             +-----------+  remaining == locked  +-------------------+
//!             | Rescanning| --------------------> | Empty /           |
//!             +-----------+                       | EmptyExceptLocked |
//!                   |                             +-------------------+
//!                   +--> next pass (or NotConverged when limits are hit)
//! ```
//!
//! Cancellation is observed between passes, while scanning, at the
//! confirmation gate, and before each delete request is issued. Requests
//! already in flight are always drained.

use std::fmt;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use futures::TryStreamExt;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::classifier::LockClassifier;
use crate::config::PurgeConfig;
use crate::enumerator::VersionEnumerator;
use crate::error::{PurgeError, PurgeResult};
use crate::store::{DeleteReport, StoreError, StoreResult, VersionStore};
use crate::types::{LockedEntry, ObjectVersionRef, PurgeBatch, PurgeOutcome, TerminalState};

// ---------------------------------------------------------------------------
// Confirmation gate
// ---------------------------------------------------------------------------

/// What the caller is asked to authorize before a pass deletes anything.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmationRequest<'a> {
    /// The bucket being purged.
    pub bucket: &'a str,
    /// One-based pass number.
    pub pass: u32,
    /// Number of entries that will be permanently deleted.
    pub deletable: usize,
    /// Entries that will be skipped because they are locked.
    pub locked: &'a [LockedEntry],
}

/// Authorizes destructive passes.
#[async_trait]
pub trait Confirm: Send + Sync {
    /// Return `true` to let the pass delete `request.deletable` entries.
    async fn confirm(&self, request: &ConfirmationRequest<'_>) -> bool;
}

/// A [`Confirm`] that approves every pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

#[async_trait]
impl Confirm for AutoConfirm {
    async fn confirm(&self, _request: &ConfirmationRequest<'_>) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// Step of a purge pass, reported in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgePhase {
    /// Enumerating and classifying every entry.
    Scanning,
    /// Waiting on the confirmation gate.
    Confirming,
    /// Issuing delete requests.
    Deleting,
    /// Counting what is left.
    Rescanning,
}

impl fmt::Display for PurgePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Scanning => "scanning",
            Self::Confirming => "confirming",
            Self::Deleting => "deleting",
            Self::Rescanning => "rescanning",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Per-pass bookkeeping
// ---------------------------------------------------------------------------

/// Classified contents of the bucket at the start of a pass.
#[derive(Debug, Default)]
struct PassScan {
    deletable: Vec<ObjectVersionRef>,
    locked: Vec<LockedEntry>,
}

impl PassScan {
    fn total(&self) -> usize {
        self.deletable.len() + self.locked.len()
    }
}

/// Result of the delete phase of one pass.
#[derive(Debug, Default)]
struct DeletePass {
    deleted: usize,
    cancelled: bool,
}

/// Tallies owned by the coordinator across passes.
#[derive(Debug, Default)]
struct Tally {
    deleted: usize,
    passes: u32,
    remaining: usize,
    locked: Vec<LockedEntry>,
}

impl Tally {
    fn finish(self, bucket: &str, state: TerminalState) -> PurgeOutcome {
        PurgeOutcome {
            bucket: bucket.to_owned(),
            state,
            converged: state.is_converged(),
            deleted_count: self.deleted,
            locked_count: self.locked.len(),
            remaining_count: self.remaining,
            passes: self.passes,
            locked: self.locked,
        }
    }
}

// ---------------------------------------------------------------------------
// PurgeCoordinator
// ---------------------------------------------------------------------------

/// Empties a versioned bucket, skipping locked entries, until it converges.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use bucketsweep_core::config::PurgeConfig;
/// use bucketsweep_core::coordinator::{AutoConfirm, PurgeCoordinator};
/// use bucketsweep_core::memory::InMemoryVersionStore;
/// use bucketsweep_core::types::TerminalState;
///
/// # tokio_test::block_on(async {
/// let store = Arc::new(InMemoryVersionStore::new());
/// store.create_bucket("logs", false);
/// store.put_object("logs", "a.txt").unwrap();
///
/// let coordinator = PurgeCoordinator::new(store, PurgeConfig::default());
/// let outcome = coordinator.purge("logs", &AutoConfirm).await.unwrap();
/// assert_eq!(outcome.state, TerminalState::Empty);
/// assert_eq!(outcome.deleted_count, 1);
/// # });
/// ```
#[derive(Debug)]
pub struct PurgeCoordinator<S> {
    store: Arc<S>,
    enumerator: VersionEnumerator<S>,
    classifier: LockClassifier<S>,
    config: PurgeConfig,
    cancel: CancellationToken,
}

impl<S: VersionStore> PurgeCoordinator<S> {
    /// Create a coordinator over `store`.
    #[must_use]
    pub fn new(store: Arc<S>, config: PurgeConfig) -> Self {
        Self {
            enumerator: VersionEnumerator::new(Arc::clone(&store)),
            classifier: LockClassifier::new(Arc::clone(&store)),
            store,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Observe `token` for cancellation.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &PurgeConfig {
        &self.config
    }

    /// Purge `bucket`, asking `confirm` before every destructive pass.
    ///
    /// Returns an outcome for every normal ending, including a declined
    /// confirmation, exhausted limits, and cancellation. Errors are fatal:
    /// listing failures, unexpected lock-query failures, and failed delete
    /// requests.
    pub async fn purge(&self, bucket: &str, confirm: &dyn Confirm) -> PurgeResult<PurgeOutcome> {
        self.config.validate()?;

        let deadline = self.config.max_duration().map(|d| Instant::now() + d);
        let mut tally = Tally::default();

        info!(
            bucket = %bucket,
            max_passes = self.config.max_passes,
            batch_size = self.config.batch_size,
            "starting purge"
        );

        loop {
            if self.cancel.is_cancelled() {
                info!(bucket = %bucket, passes = tally.passes, "purge cancelled");
                return Ok(tally.finish(bucket, TerminalState::Cancelled));
            }
            if tally.passes > 0 && limits_reached(&self.config, tally.passes, deadline) {
                warn!(
                    bucket = %bucket,
                    passes = tally.passes,
                    remaining = tally.remaining,
                    locked = tally.locked.len(),
                    "purge did not converge"
                );
                return Ok(tally.finish(bucket, TerminalState::NotConverged));
            }

            tally.passes += 1;
            let pass = tally.passes;

            info!(bucket = %bucket, pass, phase = %PurgePhase::Scanning, "starting pass");
            let scan = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    info!(bucket = %bucket, pass, "purge cancelled while scanning");
                    return Ok(tally.finish(bucket, TerminalState::Cancelled));
                }
                scan = self.scan(bucket) => scan?,
            };
            tally.remaining = scan.total();
            info!(
                bucket = %bucket,
                pass,
                deletable = scan.deletable.len(),
                locked = scan.locked.len(),
                "scan complete"
            );

            if scan.total() == 0 {
                tally.locked.clear();
                info!(bucket = %bucket, pass, "bucket is empty");
                return Ok(tally.finish(bucket, TerminalState::Empty));
            }

            let PassScan { deletable, locked } = scan;
            tally.locked = locked;

            if deletable.is_empty() {
                info!(
                    bucket = %bucket,
                    pass,
                    locked = tally.locked.len(),
                    "only locked entries remain"
                );
                return Ok(tally.finish(bucket, TerminalState::EmptyExceptLocked));
            }

            debug!(
                bucket = %bucket,
                pass,
                phase = %PurgePhase::Confirming,
                "awaiting confirmation"
            );
            let request = ConfirmationRequest {
                bucket,
                pass,
                deletable: deletable.len(),
                locked: &tally.locked,
            };
            if !confirm.confirm(&request).await {
                // An interrupted prompt also answers "no".
                if self.cancel.is_cancelled() {
                    info!(bucket = %bucket, pass, "purge cancelled at confirmation");
                    return Ok(tally.finish(bucket, TerminalState::Cancelled));
                }
                info!(bucket = %bucket, pass, "purge declined");
                return Ok(tally.finish(bucket, TerminalState::Declined));
            }

            info!(
                bucket = %bucket,
                pass,
                phase = %PurgePhase::Deleting,
                entries = deletable.len(),
                "deleting unlocked entries"
            );
            let outcome = self.delete_all(bucket, deletable, tally.deleted).await?;
            tally.deleted += outcome.deleted;
            if outcome.cancelled {
                info!(
                    bucket = %bucket,
                    pass,
                    deleted = tally.deleted,
                    "purge cancelled between batches"
                );
                return Ok(tally.finish(bucket, TerminalState::Cancelled));
            }

            debug!(
                bucket = %bucket,
                pass,
                phase = %PurgePhase::Rescanning,
                "counting remaining entries"
            );
            let remaining = self.enumerator.count(bucket).await?;
            tally.remaining = remaining;

            if remaining == tally.locked.len() {
                let state = if remaining == 0 {
                    TerminalState::Empty
                } else {
                    TerminalState::EmptyExceptLocked
                };
                info!(
                    bucket = %bucket,
                    pass,
                    deleted = tally.deleted,
                    locked = tally.locked.len(),
                    "purge converged"
                );
                return Ok(tally.finish(bucket, state));
            }

            info!(
                bucket = %bucket,
                pass,
                remaining,
                locked = tally.locked.len(),
                "entries still remain, retrying"
            );
        }
    }

    /// Enumerate and classify every entry of `bucket`.
    async fn scan(&self, bucket: &str) -> PurgeResult<PassScan> {
        let entries = self.enumerator.scan(bucket);
        let mut scan = self
            .classifier
            .classify_stream(bucket, entries, self.config.classify_concurrency)
            .try_fold(PassScan::default(), |mut scan, (version, status)| async move {
                if status.is_locked() {
                    scan.locked.push(LockedEntry { version, status });
                } else {
                    scan.deletable.push(version);
                }
                Ok::<_, PurgeError>(scan)
            })
            .await?;

        // Classification completes out of order; restore key order.
        scan.deletable
            .sort_by(|a, b| (&a.key, &a.version_id).cmp(&(&b.key, &b.version_id)));
        scan.locked.sort_by(|a, b| {
            (&a.version.key, &a.version.version_id).cmp(&(&b.version.key, &b.version.version_id))
        });
        Ok(scan)
    }

    /// Issue every batch with bounded concurrency and wait for all of them.
    ///
    /// The first failed request stops further issuance; requests already in
    /// flight are drained before the error is returned.
    async fn delete_all(
        &self,
        bucket: &str,
        deletable: Vec<ObjectVersionRef>,
        deleted_before: usize,
    ) -> PurgeResult<DeletePass> {
        let batches = PurgeBatch::partition(deletable, self.config.batch_size);
        let mut pending = batches.into_iter().enumerate();
        let mut in_flight: JoinSet<(usize, usize, StoreResult<DeleteReport>)> = JoinSet::new();
        let mut pass = DeletePass::default();
        let mut failure: Option<(usize, usize, StoreError)> = None;

        loop {
            while failure.is_none()
                && !pass.cancelled
                && in_flight.len() < self.config.delete_concurrency
            {
                if self.cancel.is_cancelled() {
                    pass.cancelled = true;
                    break;
                }
                let Some((index, batch)) = pending.next() else {
                    break;
                };
                let store = Arc::clone(&self.store);
                let bucket = bucket.to_owned();
                in_flight.spawn(async move {
                    let len = batch.len();
                    let result = store.delete_versions(&bucket, &batch).await;
                    (index, len, result)
                });
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };
            let (index, len, result) = joined.context("delete batch task failed")?;

            match result {
                Ok(report) => {
                    for item in &report.failures {
                        warn!(
                            bucket = %bucket,
                            key = %item.key,
                            version_id = item.version_id.as_deref().unwrap_or(""),
                            code = %item.code,
                            message = %item.message,
                            "entry was not deleted"
                        );
                    }
                    debug!(
                        bucket = %bucket,
                        batch_index = index,
                        batch_len = len,
                        deleted = report.deleted,
                        errors = report.failures.len(),
                        "delete batch completed"
                    );
                    pass.deleted += report.deleted;
                }
                Err(source) => {
                    warn!(
                        bucket = %bucket,
                        batch_index = index,
                        batch_len = len,
                        error = %source,
                        "delete batch failed"
                    );
                    if failure.is_none() {
                        failure = Some((index, len, source));
                    }
                }
            }
        }

        if let Some((batch_index, batch_len, source)) = failure {
            return Err(PurgeError::DeleteBatch {
                bucket: bucket.to_owned(),
                batch_index,
                batch_len,
                deleted: deleted_before + pass.deleted,
                source,
            });
        }
        Ok(pass)
    }
}

fn limits_reached(config: &PurgeConfig, passes: u32, deadline: Option<Instant>) -> bool {
    passes >= config.max_passes || deadline.is_some_and(|d| Instant::now() >= d)
}
