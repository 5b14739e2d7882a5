//! Identity gateway metrics via the `metrics` crate.
//!
//! Naming follows `steward_identity_{name}_{unit}`: counters end in
//! `_total`, histograms in `_seconds`, gauges carry no suffix.

use metrics::{counter, gauge, histogram};

const DOMAIN_LOOKUPS_TOTAL: &str = "steward_identity_domain_lookups_total";
const DOMAIN_LOOKUP_LATENCY: &str = "steward_identity_domain_lookup_latency_seconds";
const PROJECT_LOOKUPS_TOTAL: &str = "steward_identity_project_lookups_total";
const SCRAPED_DOMAINS: &str = "steward_identity_scraped_domains";
const CACHE_HITS_TOTAL: &str = "steward_identity_cache_hits_total";

/// Records one domain resolution attempt against a backend.
#[inline]
pub fn record_domain_lookup(endpoint: &str, outcome: &'static str, latency_secs: f64) {
    counter!(DOMAIN_LOOKUPS_TOTAL, "endpoint" => endpoint.to_owned(), "outcome" => outcome)
        .increment(1);
    histogram!(DOMAIN_LOOKUP_LATENCY, "endpoint" => endpoint.to_owned()).record(latency_secs);
}

/// Records one direct project lookup.
#[inline]
pub fn record_project_lookup(endpoint: &str, outcome: &'static str) {
    counter!(PROJECT_LOOKUPS_TOTAL, "endpoint" => endpoint.to_owned(), "outcome" => outcome)
        .increment(1);
}

/// Records the number of domains held in the cache after a bulk scrape.
#[inline]
pub fn record_scraped_domains(count: usize) {
    gauge!(SCRAPED_DOMAINS).set(count as f64);
}

/// Records a domain resolution answered from the cache.
#[inline]
pub fn record_cache_hit() {
    counter!(CACHE_HITS_TOTAL).increment(1);
}
