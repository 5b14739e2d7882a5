//! Identity endpoint call contracts.
//!
//! An [`IdentityEndpoint`] is one configured identity backend. The gateway
//! drives a prioritized list of them; the wire protocol behind each call is
//! the endpoint's concern.

use async_trait::async_trait;

use crate::error::BackendError;

/// A domain as returned by an identity backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRecord {
    /// Identity-service domain id.
    pub id: String,
    /// Human-readable domain name.
    pub name: String,
    /// Whether the domain is enabled.
    pub enabled: bool,
}

/// A project as returned by an identity backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRecord {
    /// Identity-service project id.
    pub id: String,
    /// Human-readable project name.
    pub name: String,
    /// Whether the project is enabled.
    pub enabled: bool,
}

/// One configured identity backend.
///
/// Implementations must be cheap to call repeatedly; the gateway handles
/// caching and never issues concurrent calls for the same domain.
#[async_trait]
pub trait IdentityEndpoint: Send + Sync {
    /// Configured endpoint name, used in logs and metrics labels.
    fn name(&self) -> &str;

    /// Backend host for the `backend` record field.
    fn host(&self) -> &str;

    /// Fetches a single domain using domain-scoped credentials.
    async fn get_domain(&self, domain_id: &str) -> Result<DomainRecord, BackendError>;

    /// Fetches a single project within a domain. A missing project is the
    /// `NotFound` outcome, not a failure.
    async fn get_project(&self, domain_id: &str, project_id: &str)
        -> Result<ProjectRecord, BackendError>;

    /// Lists all domains visible to this endpoint's credentials.
    async fn list_domains(&self) -> Result<Vec<DomainRecord>, BackendError>;

    /// Lists all projects of one domain.
    async fn list_projects(&self, domain_id: &str) -> Result<Vec<ProjectRecord>, BackendError>;
}
