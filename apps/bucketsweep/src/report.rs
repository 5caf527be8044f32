//! Human-readable rendering of purge outcomes and inventories.

use std::fmt;

use bucketsweep_core::inventory::BucketInventory;
use bucketsweep_core::types::{LockedEntry, PurgeOutcome, TerminalState};

/// Locked entries listed after a purge before the rest are elided.
pub const LOCKED_SUMMARY_LIMIT: usize = 10;

/// Terminal summary of a purge.
#[derive(Debug)]
pub struct OutcomeReport<'a>(pub &'a PurgeOutcome);

impl fmt::Display for OutcomeReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.0;

        if !o.locked.is_empty() && o.state != TerminalState::Declined {
            write!(f, "{}", LockedSummary::new(&o.locked, LOCKED_SUMMARY_LIMIT))?;
        }

        match o.state {
            TerminalState::Empty if o.deleted_count == 0 => {
                write!(f, "Bucket {} is already empty.", o.bucket)
            }
            TerminalState::Empty => write!(
                f,
                "Bucket {} emptied: {} entries deleted in {} {}.",
                o.bucket,
                o.deleted_count,
                o.passes,
                plural(o.passes, "pass", "passes")
            ),
            TerminalState::EmptyExceptLocked => write!(
                f,
                "Bucket {} emptied (except {} locked objects): {} entries deleted.",
                o.bucket, o.locked_count, o.deleted_count
            ),
            TerminalState::Declined => f.write_str("Aborted by user."),
            TerminalState::NotConverged => write!(
                f,
                "{} entries still remain in {} after {} {} ({} deleted); giving up.",
                o.remaining_count,
                o.bucket,
                o.passes,
                plural(o.passes, "pass", "passes"),
                o.deleted_count
            ),
            TerminalState::Cancelled => write!(
                f,
                "Purge of {} cancelled after deleting {} entries.",
                o.bucket, o.deleted_count
            ),
        }
    }
}

/// The first `limit` locked entries, then a count of the rest.
#[derive(Debug)]
pub struct LockedSummary<'a> {
    locked: &'a [LockedEntry],
    limit: usize,
}

impl<'a> LockedSummary<'a> {
    /// Summarize `locked`, listing at most `limit` entries.
    #[must_use]
    pub fn new(locked: &'a [LockedEntry], limit: usize) -> Self {
        Self { locked, limit }
    }
}

impl fmt::Display for LockedSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Skipped {} locked objects:", self.locked.len())?;
        for entry in self.locked.iter().take(self.limit) {
            writeln!(f, "  {} {}", entry.version, entry.status)?;
        }
        if self.locked.len() > self.limit {
            writeln!(f, "  ... and {} more", self.locked.len() - self.limit)?;
        }
        Ok(())
    }
}

/// Full listing produced by `bucketsweep inspect`.
#[derive(Debug)]
pub struct InventoryReport<'a>(pub &'a BucketInventory);

impl fmt::Display for InventoryReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inv = self.0;
        writeln!(f, "Bucket:          {}", inv.bucket)?;
        writeln!(f, "Object versions: {}", inv.object_versions)?;
        writeln!(f, "Delete markers:  {}", inv.delete_markers)?;
        writeln!(f, "Total entries:   {}", inv.total_entries())?;
        writeln!(f, "Distinct keys:   {}", inv.distinct_keys)?;
        write!(f, "Locked objects:  {}", inv.locked_count())?;
        for entry in &inv.locked {
            write!(f, "\n  {} {}", entry.status, entry.version)?;
        }
        Ok(())
    }
}

fn plural(n: u32, one: &'static str, many: &'static str) -> &'static str {
    if n == 1 { one } else { many }
}
