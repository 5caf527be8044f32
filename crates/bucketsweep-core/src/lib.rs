//! Convergent purge engine for versioned object-store buckets.
//!
//! This crate empties a versioned bucket of every object version and delete
//! marker while leaving versions protected by Object Lock retention or legal
//! holds in place. It re-scans after each deletion pass and stops once only
//! the protected versions remain, or once its pass or time limit is reached.
//!
//! # Architecture
//!
//! ```text
//!   PurgeCoordinator (passes, confirmation, batching, tallies)
//!        |
//!        +--> VersionEnumerator (paginated listing)
//!        |
//!        +--> LockClassifier (retention + legal hold queries)
//!        |
//!        v
//!   VersionStore trait (AWS SDK adapter, in-memory store)
//! ```

pub mod classifier;
pub mod config;
pub mod coordinator;
pub mod enumerator;
pub mod error;
pub mod inventory;
pub mod memory;
pub mod store;
pub mod types;

pub use config::PurgeConfig;
pub use coordinator::{AutoConfirm, Confirm, ConfirmationRequest, PurgeCoordinator};
pub use error::{PurgeError, PurgeResult};
pub use store::{StoreError, VersionStore};
