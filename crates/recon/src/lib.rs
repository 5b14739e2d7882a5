//! Reconciliation engine for Steward.
//!
//! Takes the flat record stream produced by the storage collectors, merges
//! it into one deduplicated cluster-wide set, and drives the identity
//! gateway over the merged set to classify every account.

pub mod merge;
pub mod metrics;
pub mod verify;

pub use merge::{MergeOutcome, MergeSummary, merge};
pub use verify::{Verifier, VerifySummary};
