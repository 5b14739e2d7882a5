//! Thin REST implementation of [`IdentityEndpoint`].
//!
//! Speaks the keystone-v3-style identity API: password authentication for a
//! subject token (optionally scoped to the queried domain), then plain GETs
//! for domains and projects. Only the call contracts the gateway needs are
//! implemented; HTTP status codes map onto the [`BackendError`] taxonomy
//! and everything else about the wire protocol stays here.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::debug;

use crate::{
    backend::{DomainRecord, IdentityEndpoint, ProjectRecord},
    error::{BackendError, GatewayError},
};

const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";
const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// One identity endpoint definition from configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    /// Endpoint name for logs, metrics, and default-domain remapping.
    pub name: String,
    /// Identity API base URL, e.g. `https://identity.example.net/v3`.
    pub auth_url: String,
    /// Service user name.
    pub username: String,
    /// Service user password.
    pub password: String,
    /// Domain the service user itself lives in.
    #[serde(default = "default_user_domain")]
    pub user_domain: String,
    /// Whether domain lookups use a session scoped to the queried domain.
    /// The scoped session failing with 401/403 is how an endpoint signals
    /// it does not own the domain.
    #[serde(default = "default_domain_scoped")]
    pub domain_scoped: bool,
    /// Skip TLS certificate verification.
    #[serde(default)]
    pub insecure: bool,
}

fn default_user_domain() -> String {
    "Default".to_owned()
}

fn default_domain_scoped() -> bool {
    true
}

/// REST-backed identity endpoint.
#[derive(Debug)]
pub struct RestEndpoint {
    config: EndpointConfig,
    host: String,
    client: reqwest::Client,
    /// Subject tokens keyed by domain scope (`None` = unscoped).
    tokens: Mutex<HashMap<Option<String>, String>>,
}

#[derive(Deserialize)]
struct DomainBody {
    domain: WireDomain,
}

#[derive(Deserialize)]
struct DomainListBody {
    domains: Vec<WireDomain>,
}

#[derive(Deserialize)]
struct WireDomain {
    id: String,
    name: String,
    enabled: bool,
}

#[derive(Deserialize)]
struct ProjectBody {
    project: WireProject,
}

#[derive(Deserialize)]
struct ProjectListBody {
    projects: Vec<WireProject>,
}

#[derive(Deserialize)]
struct WireProject {
    id: String,
    name: String,
    enabled: bool,
}

impl RestEndpoint {
    /// Builds an endpoint from its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidEndpoint`] for an unparseable URL or
    /// an HTTP client that cannot be constructed.
    pub fn new(config: EndpointConfig) -> Result<Self, GatewayError> {
        let url = reqwest::Url::parse(&config.auth_url).map_err(|e| {
            GatewayError::InvalidEndpoint { name: config.name.clone(), message: e.to_string() }
        })?;
        let host = url.host_str().unwrap_or("_unknown").to_owned();

        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .build()
            .map_err(|e| GatewayError::InvalidEndpoint {
                name: config.name.clone(),
                message: e.to_string(),
            })?;

        Ok(Self { config, host, client, tokens: Mutex::new(HashMap::new()) })
    }

    /// Returns a subject token for the given domain scope, authenticating
    /// on first use per scope.
    async fn token(&self, scope: Option<&str>) -> Result<String, BackendError> {
        let key = scope.map(str::to_owned);
        if let Some(token) = self.tokens.lock().get(&key) {
            return Ok(token.clone());
        }

        let mut auth = serde_json::json!({
            "identity": {
                "methods": ["password"],
                "password": {
                    "user": {
                        "name": self.config.username,
                        "domain": { "name": self.config.user_domain },
                        "password": self.config.password,
                    }
                }
            }
        });
        if let Some(domain_id) = scope {
            auth["scope"] = serde_json::json!({ "domain": { "id": domain_id } });
        }

        let response = self
            .client
            .post(format!("{}/auth/tokens", self.config.auth_url))
            .json(&serde_json::json!({ "auth": auth }))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, "authentication rejected"));
        }

        let token = response
            .headers()
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .ok_or_else(|| BackendError::Unreachable {
                message: "authentication response carried no subject token".to_owned(),
            })?;

        debug!(endpoint = %self.config.name, scoped = scope.is_some(), "session established");
        self.tokens.lock().insert(key, token.clone());
        Ok(token)
    }

    /// Issues an authenticated GET and decodes the JSON body.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        scope: Option<&str>,
    ) -> Result<T, BackendError> {
        let token = self.token(scope).await?;
        let response = self
            .client
            .get(format!("{}{path}", self.config.auth_url))
            .header(AUTH_TOKEN_HEADER, token)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            if status == reqwest::StatusCode::UNAUTHORIZED {
                // The cached token for this scope is no longer honored.
                self.tokens.lock().remove(&scope.map(str::to_owned));
            }
            return Err(status_error(status, path));
        }

        response.json().await.map_err(|e| BackendError::Unreachable {
            message: format!("unexpected response body for {path}: {e}"),
        })
    }

    fn domain_scope<'a>(&self, domain_id: &'a str) -> Option<&'a str> {
        self.config.domain_scoped.then_some(domain_id)
    }
}

fn transport_error(err: reqwest::Error) -> BackendError {
    BackendError::Unreachable { message: err.to_string() }
}

fn status_error(status: reqwest::StatusCode, context: &str) -> BackendError {
    let message = format!("{context} ({status})");
    match status {
        reqwest::StatusCode::BAD_REQUEST => BackendError::BadRequest { message },
        reqwest::StatusCode::UNAUTHORIZED => BackendError::Unauthorized { message },
        reqwest::StatusCode::FORBIDDEN => BackendError::Forbidden { message },
        reqwest::StatusCode::NOT_FOUND => BackendError::NotFound { message },
        _ => BackendError::Unreachable { message },
    }
}

#[async_trait]
impl IdentityEndpoint for RestEndpoint {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn host(&self) -> &str {
        &self.host
    }

    async fn get_domain(&self, domain_id: &str) -> Result<DomainRecord, BackendError> {
        let body: DomainBody = self
            .get_json(&format!("/domains/{domain_id}"), self.domain_scope(domain_id))
            .await?;
        Ok(DomainRecord { id: body.domain.id, name: body.domain.name, enabled: body.domain.enabled })
    }

    async fn get_project(
        &self,
        domain_id: &str,
        project_id: &str,
    ) -> Result<ProjectRecord, BackendError> {
        let body: ProjectBody = self
            .get_json(&format!("/projects/{project_id}"), self.domain_scope(domain_id))
            .await?;
        Ok(ProjectRecord {
            id: body.project.id,
            name: body.project.name,
            enabled: body.project.enabled,
        })
    }

    async fn list_domains(&self) -> Result<Vec<DomainRecord>, BackendError> {
        let body: DomainListBody = self.get_json("/domains", None).await?;
        Ok(body
            .domains
            .into_iter()
            .map(|d| DomainRecord { id: d.id, name: d.name, enabled: d.enabled })
            .collect())
    }

    async fn list_projects(&self, domain_id: &str) -> Result<Vec<ProjectRecord>, BackendError> {
        let body: ProjectListBody =
            self.get_json(&format!("/projects?domain_id={domain_id}"), None).await?;
        Ok(body
            .projects
            .into_iter()
            .map(|p| ProjectRecord { id: p.id, name: p.name, enabled: p.enabled })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn config() -> EndpointConfig {
        EndpointConfig {
            name: "region-a".to_owned(),
            auth_url: "https://identity.example.net/v3".to_owned(),
            username: "steward".to_owned(),
            password: "secret".to_owned(),
            user_domain: "Default".to_owned(),
            domain_scoped: true,
            insecure: false,
        }
    }

    #[test]
    fn test_host_derived_from_auth_url() {
        let endpoint = RestEndpoint::new(config()).expect("endpoint");
        assert_eq!(endpoint.host(), "identity.example.net");
        assert_eq!(endpoint.name(), "region-a");
    }

    #[test]
    fn test_invalid_url_rejected_at_startup() {
        let mut cfg = config();
        cfg.auth_url = "not a url".to_owned();
        let err = RestEndpoint::new(cfg).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidEndpoint { .. }));
    }

    #[test]
    fn test_status_mapping() {
        use reqwest::StatusCode;

        assert!(matches!(
            status_error(StatusCode::BAD_REQUEST, "x"),
            BackendError::BadRequest { .. }
        ));
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "x"),
            BackendError::Unauthorized { .. }
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, "x"),
            BackendError::Forbidden { .. }
        ));
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "x"),
            BackendError::NotFound { .. }
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, "x"),
            BackendError::Unreachable { .. }
        ));
    }

    #[test]
    fn test_unscoped_when_domain_scoping_disabled() {
        let mut cfg = config();
        cfg.domain_scoped = false;
        let endpoint = RestEndpoint::new(cfg).expect("endpoint");
        assert_eq!(endpoint.domain_scope("d1"), None);

        let scoped = RestEndpoint::new(config()).expect("endpoint");
        assert_eq!(scoped.domain_scope("d1"), Some("d1"));
    }
}
