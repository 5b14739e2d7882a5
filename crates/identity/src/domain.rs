//! Cached domain and project shapes.
//!
//! [`DomainInfo`] is the gateway's cache entry shape, populated either by a
//! single-domain lookup or by a bulk scrape so downstream code is
//! backend-source-agnostic. The cache owns these exclusively; callers get
//! [`DomainView`] summaries and [`ProjectInfo`] clones.

use std::collections::HashMap;

/// A project as known to the identity service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
    /// Identity-service project id.
    pub id: String,
    /// Human-readable project name.
    pub name: String,
    /// Whether the project is enabled.
    pub enabled: bool,
}

/// A domain and its known projects, as cached by the gateway.
#[derive(Debug, Clone)]
pub struct DomainInfo {
    /// Identity-service domain id. Scraped `default` domains are remapped
    /// to `default_<endpoint>` since every backend has its own default.
    pub domain_id: String,
    /// Human-readable domain name.
    pub domain_name: String,
    /// Host of the identity backend that knows this domain.
    pub backend_host: String,
    /// Whether the domain is enabled.
    pub enabled: bool,
    /// Projects known to belong to this domain, keyed by project id.
    pub projects: HashMap<String, ProjectInfo>,
}

impl DomainInfo {
    /// Read-only summary handed to callers.
    pub fn view(&self) -> DomainView {
        DomainView {
            domain_id: self.domain_id.clone(),
            domain_name: self.domain_name.clone(),
            backend_host: self.backend_host.clone(),
            enabled: self.enabled,
        }
    }
}

/// Lightweight copy of a cached domain, without the project map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainView {
    /// Identity-service domain id (possibly a remapped `default_` id).
    pub domain_id: String,
    /// Human-readable domain name.
    pub domain_name: String,
    /// Host of the identity backend that resolved the domain.
    pub backend_host: String,
    /// Whether the domain is enabled.
    pub enabled: bool,
}
