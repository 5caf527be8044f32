//! Amazon S3 adapter for the bucketsweep purge engine.
//!
//! [`AwsVersionStore`] implements [`bucketsweep_core::VersionStore`] with
//! `aws-sdk-s3`. Credentials and, unless overridden, the region come from the
//! SDK's default provider chain.

pub mod config;
pub mod store;

pub use config::AwsStoreConfig;
pub use store::AwsVersionStore;
