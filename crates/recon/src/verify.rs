//! Account verification state machine.
//!
//! Drives the identity gateway over the merged record set in one sequential
//! pass. Records arrive sorted by `(domain_id, project_id)`, so every record
//! of a domain is adjacent; the domain is resolved once at the start of the
//! run of records sharing it and the outcome is reused for the rest of the
//! run. This is an ordering dependency, not an incidental optimization.
//!
//! Per account, first match wins:
//!
//! 1. tombstoned (`status_deleted`) → `DELETED`, no identity call
//! 2. `domain_id` unknown → stays `UNKNOWN`
//! 3. domain invalid or disabled → `INVALID`; domain unresolvable → stays
//!    `UNKNOWN` (never orphan on backend unavailability)
//! 4. project enabled → `VALID`; project disabled → `INVALID`; project
//!    absent → `ORPHAN`; project unresolvable → stays `UNKNOWN`

use std::{sync::Arc, time::Instant};

use tracing::{debug, info, warn};

use steward_identity::{
    DomainResolution, DomainView, IdentityGateway, ProjectResolution,
};
use steward_types::{AccountRecord, AccountStatus, UNKNOWN};

use crate::metrics::{record_account_gauges, record_verify_duration};

/// Aggregate counters for one verification pass.
///
/// `total == valid + invalid + orphan + deleted + unknown` holds for every
/// completed pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VerifySummary {
    /// Records processed.
    pub total: u64,
    /// Domain and project both enabled.
    pub valid: u64,
    /// Domain or project disabled, or domain rejected as invalid.
    pub invalid: u64,
    /// Project missing from an otherwise healthy domain.
    pub orphan: u64,
    /// Tombstoned by the storage engine.
    pub deleted: u64,
    /// Unverifiable this run.
    pub unknown: u64,
}

/// Gateway resolution reused across one domain's record run. The
/// default-domain heuristic is deliberately not memoized here: it matches
/// per project id, so it runs per record against the warm cache.
enum DomainDecision {
    /// The domain resolved; project lookups proceed against this view.
    Usable(DomainView),
    /// The domain is invalid or disabled; every record in the run is
    /// `INVALID` without per-record project lookups.
    Invalid,
    /// No backend resolves the domain this run.
    Unresolved,
}

/// One-run account verifier.
#[derive(bon::Builder)]
#[builder(on(_, required))]
pub struct Verifier {
    /// Gateway owning the run's identity cache.
    gateway: Arc<IdentityGateway>,
    /// Whether the default-domain heuristic may be tried for domains no
    /// backend resolves. Weak evidence, logged loudly when it matches.
    #[builder(default = true)]
    default_domain_fallback: bool,
}

impl Verifier {
    /// Classifies every record in place and returns the pass counters.
    ///
    /// Records must be in merge order. Status assignment for a record
    /// depends only on that record and the run-scoped identity cache, so
    /// aborting between records leaves valid partial output.
    pub async fn verify(&self, records: &mut [AccountRecord]) -> VerifySummary {
        let started = Instant::now();
        let mut summary = VerifySummary::default();
        let mut current: Option<(String, DomainDecision)> = None;

        for record in records.iter_mut() {
            summary.total += 1;

            // Rule 1: a tombstoned storage account never needs reconciling.
            if record.status_deleted {
                record.status = AccountStatus::Deleted;
                summary.deleted += 1;
                warn!(
                    account = %record.account_id,
                    domain_id = %record.domain_id,
                    "account is DELETED"
                );
                continue;
            }

            // Rule 2: no domain metadata was ever recorded on the account.
            if record.domain_id == UNKNOWN {
                summary.unknown += 1;
                continue;
            }

            // Rule 3: resolve the domain once per domain run.
            let reusable = matches!(&current, Some((id, _)) if *id == record.domain_id);
            if !reusable {
                let decision = match self.gateway.resolve_domain(&record.domain_id).await {
                    DomainResolution::Found(view) => DomainDecision::Usable(view),
                    DomainResolution::Invalid => DomainDecision::Invalid,
                    DomainResolution::NotFound => DomainDecision::Unresolved,
                };
                current = Some((record.domain_id.clone(), decision));
            }

            let view = match &current {
                Some((_, DomainDecision::Usable(view))) => view.clone(),
                Some((_, DomainDecision::Invalid)) => {
                    record.status = AccountStatus::Invalid;
                    summary.invalid += 1;
                    warn!(
                        account = %record.account_id,
                        domain_id = %record.domain_id,
                        "account is INVALID (domain invalid)"
                    );
                    continue;
                },
                Some((_, DomainDecision::Unresolved)) | None => {
                    // Last-resort tier: a scraped per-backend default domain
                    // that happens to contain this project id.
                    let fallback = self
                        .default_domain_fallback
                        .then(|| self.gateway.find_default_domain(&record.project_id))
                        .flatten();
                    match fallback {
                        Some(view) => view,
                        None => {
                            summary.unknown += 1;
                            warn!(
                                account = %record.account_id,
                                domain_id = %record.domain_id,
                                "account could not be verified in any identity backend"
                            );
                            continue;
                        },
                    }
                },
            };

            record.domain_name = view.domain_name.clone();
            record.backend = view.backend_host.clone();

            if !view.enabled {
                // The whole domain run is disabled; no project lookups.
                record.status = AccountStatus::Invalid;
                summary.invalid += 1;
                warn!(
                    account = %record.account_id,
                    domain = %view.domain_name,
                    "account is INVALID (domain disabled)"
                );
                continue;
            }

            // Rule 4: resolve the project within the domain.
            match self.gateway.resolve_project(&view.domain_id, &record.project_id).await {
                ProjectResolution::Found(project) => {
                    record.project_name = project.name.clone();
                    if project.enabled {
                        record.status = AccountStatus::Valid;
                        summary.valid += 1;
                        debug!(
                            account = %record.account_id,
                            domain = %view.domain_name,
                            project = %project.name,
                            "account is VALID"
                        );
                    } else {
                        record.status = AccountStatus::Invalid;
                        summary.invalid += 1;
                        warn!(
                            account = %record.account_id,
                            domain = %view.domain_name,
                            project = %project.name,
                            "account is INVALID (project disabled)"
                        );
                    }
                },
                ProjectResolution::NotFound => {
                    record.status = AccountStatus::Orphan;
                    summary.orphan += 1;
                    warn!(
                        account = %record.account_id,
                        domain = %view.domain_name,
                        "account is ORPHAN"
                    );
                },
                ProjectResolution::Unavailable => {
                    summary.unknown += 1;
                    warn!(
                        account = %record.account_id,
                        domain = %view.domain_name,
                        project_id = %record.project_id,
                        "project lookup unavailable, leaving account unresolved"
                    );
                },
            }
        }

        info!(
            valid = summary.valid,
            orphan = summary.orphan,
            deleted = summary.deleted,
            invalid = summary.invalid,
            unknown = summary.unknown,
            total = summary.total,
            "account verification completed"
        );
        record_account_gauges(summary.valid, summary.orphan, summary.deleted);
        record_verify_duration(started.elapsed().as_secs_f64());

        summary
    }
}
