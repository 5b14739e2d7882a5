//! Controllable in-memory identity endpoint for tests.
//!
//! Provides a programmable [`IdentityEndpoint`] without a real identity
//! service: seedable domains and projects, per-entity failure injection,
//! optional artificial latency, and request counters for verifying how
//! often the gateway actually hits the backend.
//!
//! # Example
//!
//! ```
//! use steward_identity::{
//!     BackendError, DomainRecord, IdentityEndpoint, MockEndpoint, ProjectRecord,
//! };
//!
//! let endpoint = MockEndpoint::new("region-a")
//!     .with_domain(
//!         DomainRecord { id: "d1".into(), name: "alpha".into(), enabled: true },
//!         vec![ProjectRecord { id: "p1".into(), name: "staging".into(), enabled: true }],
//!     )
//!     .fail_domain("d2", BackendError::Unauthorized { message: "wrong cluster".into() });
//! assert_eq!(endpoint.name(), "region-a");
//! ```

use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    backend::{DomainRecord, IdentityEndpoint, ProjectRecord},
    error::BackendError,
};

#[derive(Clone)]
struct MockDomain {
    record: DomainRecord,
    projects: Vec<ProjectRecord>,
}

/// Programmable mock identity endpoint.
pub struct MockEndpoint {
    name: String,
    host: String,
    domains: HashMap<String, MockDomain>,
    domain_failures: HashMap<String, BackendError>,
    project_failures: HashMap<String, BackendError>,
    project_listing_failures: HashMap<String, BackendError>,
    listing_failure: Option<BackendError>,
    delay: Option<Duration>,
    domain_calls: AtomicUsize,
    project_calls: AtomicUsize,
    list_calls: AtomicUsize,
    project_list_calls: AtomicUsize,
}

impl MockEndpoint {
    /// Creates an empty endpoint; every lookup answers `NotFound` until
    /// domains are seeded.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let host = format!("{name}.identity.test");
        Self {
            name,
            host,
            domains: HashMap::new(),
            domain_failures: HashMap::new(),
            project_failures: HashMap::new(),
            project_listing_failures: HashMap::new(),
            listing_failure: None,
            delay: None,
            domain_calls: AtomicUsize::new(0),
            project_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            project_list_calls: AtomicUsize::new(0),
        }
    }

    /// Seeds a domain and its projects.
    #[must_use]
    pub fn with_domain(mut self, record: DomainRecord, projects: Vec<ProjectRecord>) -> Self {
        self.domains.insert(record.id.clone(), MockDomain { record, projects });
        self
    }

    /// Makes `get_domain` for one domain id fail with the given error.
    #[must_use]
    pub fn fail_domain(mut self, domain_id: impl Into<String>, error: BackendError) -> Self {
        self.domain_failures.insert(domain_id.into(), error);
        self
    }

    /// Makes `get_project` for one project id fail with the given error.
    #[must_use]
    pub fn fail_project(mut self, project_id: impl Into<String>, error: BackendError) -> Self {
        self.project_failures.insert(project_id.into(), error);
        self
    }

    /// Makes `list_projects` for one domain fail with the given error.
    #[must_use]
    pub fn fail_projects(mut self, domain_id: impl Into<String>, error: BackendError) -> Self {
        self.project_listing_failures.insert(domain_id.into(), error);
        self
    }

    /// Makes `list_domains` fail with the given error.
    #[must_use]
    pub fn fail_listing(mut self, error: BackendError) -> Self {
        self.listing_failure = Some(error);
        self
    }

    /// Delays every call, for exercising timeouts.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `get_domain` calls received.
    pub fn domain_calls(&self) -> usize {
        self.domain_calls.load(Ordering::SeqCst)
    }

    /// Number of `get_project` calls received.
    pub fn project_calls(&self) -> usize {
        self.project_calls.load(Ordering::SeqCst)
    }

    /// Number of `list_domains` calls received.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `list_projects` calls received.
    pub fn project_list_calls(&self) -> usize {
        self.project_list_calls.load(Ordering::SeqCst)
    }

    async fn apply_delay(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl IdentityEndpoint for MockEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn host(&self) -> &str {
        &self.host
    }

    async fn get_domain(&self, domain_id: &str) -> Result<DomainRecord, BackendError> {
        self.domain_calls.fetch_add(1, Ordering::SeqCst);
        self.apply_delay().await;

        if let Some(err) = self.domain_failures.get(domain_id) {
            return Err(err.clone());
        }
        self.domains
            .get(domain_id)
            .map(|d| d.record.clone())
            .ok_or_else(|| BackendError::NotFound {
                message: format!("domain {domain_id} does not exist"),
            })
    }

    async fn get_project(
        &self,
        domain_id: &str,
        project_id: &str,
    ) -> Result<ProjectRecord, BackendError> {
        self.project_calls.fetch_add(1, Ordering::SeqCst);
        self.apply_delay().await;

        if let Some(err) = self.project_failures.get(project_id) {
            return Err(err.clone());
        }
        self.domains
            .get(domain_id)
            .and_then(|d| d.projects.iter().find(|p| p.id == project_id))
            .cloned()
            .ok_or_else(|| BackendError::NotFound {
                message: format!("project {project_id} not in domain {domain_id}"),
            })
    }

    async fn list_domains(&self) -> Result<Vec<DomainRecord>, BackendError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.apply_delay().await;

        if let Some(err) = &self.listing_failure {
            return Err(err.clone());
        }
        Ok(self.domains.values().map(|d| d.record.clone()).collect())
    }

    async fn list_projects(&self, domain_id: &str) -> Result<Vec<ProjectRecord>, BackendError> {
        self.project_list_calls.fetch_add(1, Ordering::SeqCst);
        self.apply_delay().await;

        if let Some(err) = self.project_listing_failures.get(domain_id) {
            return Err(err.clone());
        }
        self.domains
            .get(domain_id)
            .map(|d| d.projects.clone())
            .ok_or_else(|| BackendError::NotFound {
                message: format!("domain {domain_id} does not exist"),
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn domain(id: &str) -> DomainRecord {
        DomainRecord { id: id.to_owned(), name: id.to_owned(), enabled: true }
    }

    #[tokio::test]
    async fn test_seeded_domain_resolves() {
        let ep = MockEndpoint::new("mock").with_domain(domain("d1"), vec![]);
        let record = ep.get_domain("d1").await.expect("domain");
        assert_eq!(record.id, "d1");
        assert_eq!(ep.domain_calls(), 1);
    }

    #[tokio::test]
    async fn test_unseeded_domain_is_not_found() {
        let ep = MockEndpoint::new("mock");
        let err = ep.get_domain("ghost").await.unwrap_err();
        assert!(matches!(err, BackendError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_listing_calls_counted_per_method() {
        let ep = MockEndpoint::new("mock")
            .with_domain(domain("d1"), vec![])
            .with_domain(domain("d2"), vec![]);

        ep.list_domains().await.expect("domains");
        ep.list_projects("d1").await.expect("projects");
        ep.list_projects("d2").await.expect("projects");

        assert_eq!(ep.list_calls(), 1);
        assert_eq!(ep.project_list_calls(), 2);
    }

    #[tokio::test]
    async fn test_injected_failure_replays() {
        let ep = MockEndpoint::new("mock").fail_domain(
            "d1",
            BackendError::Forbidden { message: "denied".to_owned() },
        );
        for _ in 0..2 {
            let err = ep.get_domain("d1").await.unwrap_err();
            assert!(matches!(err, BackendError::Forbidden { .. }));
        }
        assert_eq!(ep.domain_calls(), 2);
    }
}
