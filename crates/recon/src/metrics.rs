//! Reconciliation metrics via the `metrics` crate.
//!
//! Naming follows `steward_{subsystem}_{name}_{unit}`: counters end in
//! `_total`, histograms in `_seconds`, gauges carry no suffix. The account
//! gauges are the run's headline numbers, emitted once per completed pass.

use metrics::{counter, gauge, histogram};

const ACCOUNTS_VALID: &str = "steward_accounts_valid";
const ACCOUNTS_ORPHAN: &str = "steward_accounts_orphan";
const ACCOUNTS_DELETED: &str = "steward_accounts_deleted";

const MERGE_LINES_TOTAL: &str = "steward_merge_lines_total";
const MERGE_REJECTED_TOTAL: &str = "steward_merge_rejected_total";
const MERGE_UNIQUE_ACCOUNTS: &str = "steward_merge_unique_accounts";

const VERIFY_DURATION: &str = "steward_verify_duration_seconds";

/// Publishes the per-run account gauges.
#[inline]
pub fn record_account_gauges(valid: u64, orphan: u64, deleted: u64) {
    gauge!(ACCOUNTS_VALID).set(valid as f64);
    gauge!(ACCOUNTS_ORPHAN).set(orphan as f64);
    gauge!(ACCOUNTS_DELETED).set(deleted as f64);
}

/// Records merge input/output counters.
#[inline]
pub fn record_merge(lines_read: usize, rejected: usize, unique: usize) {
    counter!(MERGE_LINES_TOTAL).increment(lines_read as u64);
    counter!(MERGE_REJECTED_TOTAL).increment(rejected as u64);
    gauge!(MERGE_UNIQUE_ACCOUNTS).set(unique as f64);
}

/// Records the duration of one verification pass.
#[inline]
pub fn record_verify_duration(secs: f64) {
    histogram!(VERIFY_DURATION).record(secs);
}
