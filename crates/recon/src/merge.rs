//! Deduplicating merge of per-node account record sets.
//!
//! Each storage node contributes one file of collector lines; concatenated,
//! they contain one snapshot per replica of every account. The merge
//! decodes every non-empty line, drops the object expirer's system account,
//! dedupes by account id (last wins; replica snapshots are expected to be
//! identical), and sorts for deterministic output.
//!
//! Re-running merge over a superset of the same lines is idempotent: the
//! final set is the same.

use std::collections::HashMap;

use tracing::{info, warn};

use steward_types::{AccountRecord, FieldSchema, decode_record};

use crate::metrics::record_merge;

/// Summary counters for one merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeSummary {
    /// Non-empty input lines seen.
    pub lines_read: usize,
    /// Lines rejected as malformed.
    pub rejected: usize,
    /// Unique accounts in the output.
    pub unique: usize,
}

/// Merge result: the deduplicated, sorted record set plus its counters.
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    /// Unique records ordered by `(domain_id, project_id, account_id)`.
    pub records: Vec<AccountRecord>,
    /// Input/output counters for observability.
    pub summary: MergeSummary,
}

/// Merges concatenated collector output into one cluster-wide record set.
///
/// Malformed lines are rejected, logged with their line number, and skipped;
/// a single bad line never aborts the merge. The output order is total:
/// `(domain_id, project_id)` ascending with `account_id` breaking ties, so
/// two merges of the same input set produce identical output regardless of
/// input line order.
pub fn merge(contents: &str, delimiter: char) -> MergeOutcome {
    let mut accounts: HashMap<String, AccountRecord> = HashMap::new();
    let mut summary = MergeSummary::default();

    for (line_number, line) in contents.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        summary.lines_read += 1;

        let record = match decode_record(line, FieldSchema::Collected, delimiter) {
            Ok(record) => record,
            Err(err) => {
                warn!(line = line_number + 1, error = %err, "rejecting malformed record line");
                summary.rejected += 1;
                continue;
            },
        };

        // The object expirer's account has no tenant to reconcile against.
        if record.is_system_account() {
            continue;
        }

        // Later snapshots win; duplicates are replica copies of the same
        // account and expected to be identical.
        accounts.insert(record.account_id.clone(), record);
    }

    let mut records: Vec<AccountRecord> = accounts.into_values().collect();
    records.sort_by(|a, b| {
        (&a.domain_id, &a.project_id, &a.account_id)
            .cmp(&(&b.domain_id, &b.project_id, &b.account_id))
    });

    summary.unique = records.len();
    info!(
        lines = summary.lines_read,
        rejected = summary.rejected,
        unique = summary.unique,
        "accounts merged"
    );
    record_merge(summary.lines_read, summary.rejected, summary.unique);

    MergeOutcome { records, summary }
}
