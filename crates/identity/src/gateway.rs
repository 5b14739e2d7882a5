//! Domain and project resolution with a process-lifetime cache.
//!
//! The gateway resolves a `domain_id` to a cached [`DomainInfo`] by trying
//! an ordered list of resolution tiers: the cache (including bulk-scrape
//! entries), then each configured verify endpoint in priority order. Every
//! backend failure is classified and recovered here; only the final typed
//! resolution surfaces to the caller.
//!
//! The cache is populated once per run and never invalidated mid-run:
//! verification assumes identity-backend state is stable for the run.

use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::{
    backend::IdentityEndpoint,
    domain::{DomainInfo, DomainView, ProjectInfo},
    error::{BackendError, GatewayError},
    metrics::{
        record_cache_hit, record_domain_lookup, record_project_lookup, record_scraped_domains,
    },
};

/// Default per-call timeout for identity-backend calls.
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Prefix of remapped per-backend default-domain ids.
const DEFAULT_DOMAIN_PREFIX: &str = "default_";

/// Gateway tuning knobs.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Upper bound for every identity-backend call. A hung backend must not
    /// stall the reconciliation; timeout is classified as unreachable.
    pub call_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self { call_timeout: DEFAULT_CALL_TIMEOUT }
    }
}

/// Outcome of resolving a domain id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainResolution {
    /// The domain exists on some backend. The view carries its enabled
    /// flag; a disabled domain still resolves as `Found`.
    Found(DomainView),
    /// A backend rejected the domain as invalid (`BadRequest`). Terminal
    /// for this domain.
    Invalid,
    /// No endpoint or cached scrape knows the domain. "Domain unknown",
    /// not a crash: the backend itself may simply be unreachable.
    NotFound,
}

/// Outcome of resolving a project within a resolved domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectResolution {
    /// The project exists in the domain.
    Found(ProjectInfo),
    /// The backend authoritatively reports the project absent from the
    /// domain. A normal outcome, and the orphan signal.
    NotFound,
    /// The project could not be looked up this run (backend unreachable or
    /// session unusable). Never to be conflated with `NotFound`.
    Unavailable,
}

/// How a cached domain was obtained.
enum CacheSlot {
    /// Resolved through a verify endpoint whose session is still usable
    /// for direct project lookups.
    Live { info: DomainInfo, endpoint: usize },
    /// Populated by a bulk scrape; the project map is a complete listing,
    /// so a project miss is authoritative.
    Scraped { info: DomainInfo },
    /// A backend rejected the domain as invalid.
    Invalid,
}

impl CacheSlot {
    fn info(&self) -> Option<&DomainInfo> {
        match self {
            Self::Live { info, .. } | Self::Scraped { info } => Some(info),
            Self::Invalid => None,
        }
    }
}

/// Identity gateway with per-domain resolution and a bulk-scrape fallback
/// cache. One instance lives for exactly one reconciliation run.
pub struct IdentityGateway {
    verify_endpoints: Vec<Arc<dyn IdentityEndpoint>>,
    scrape_endpoints: Vec<Arc<dyn IdentityEndpoint>>,
    cache: RwLock<HashMap<String, CacheSlot>>,
    call_timeout: Duration,
}

impl std::fmt::Debug for IdentityGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityGateway")
            .field("verify_endpoints", &self.verify_endpoints.len())
            .field("scrape_endpoints", &self.scrape_endpoints.len())
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

impl IdentityGateway {
    /// Creates a gateway over prioritized verify endpoints and optional
    /// scrape endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NoEndpoints`] when both lists are empty;
    /// with no resolution tier at all, startup is the right place to fail.
    pub fn new(
        verify_endpoints: Vec<Arc<dyn IdentityEndpoint>>,
        scrape_endpoints: Vec<Arc<dyn IdentityEndpoint>>,
        config: GatewayConfig,
    ) -> Result<Self, GatewayError> {
        if verify_endpoints.is_empty() && scrape_endpoints.is_empty() {
            return Err(GatewayError::NoEndpoints);
        }
        Ok(Self {
            verify_endpoints,
            scrape_endpoints,
            cache: RwLock::new(HashMap::new()),
            call_timeout: config.call_timeout,
        })
    }

    /// Resolves a domain id to a cached domain.
    ///
    /// Checks the cache first (prior lookups and bulk-scrape entries), then
    /// tries each verify endpoint in priority order. `BadRequest` is
    /// terminal for the domain; `Unauthorized`, `Forbidden`, `NotFound`,
    /// and `Unreachable` fall through to the next endpoint.
    pub async fn resolve_domain(&self, domain_id: &str) -> DomainResolution {
        if let Some(resolution) = self.cached_resolution(domain_id) {
            record_cache_hit();
            return resolution;
        }

        for (idx, endpoint) in self.verify_endpoints.iter().enumerate() {
            let started = std::time::Instant::now();
            let result = self.bounded(endpoint.get_domain(domain_id)).await;
            let latency = started.elapsed().as_secs_f64();

            match result {
                Ok(record) => {
                    record_domain_lookup(endpoint.name(), "found", latency);
                    debug!(
                        domain_id,
                        endpoint = endpoint.name(),
                        enabled = record.enabled,
                        "domain resolved"
                    );
                    let info = DomainInfo {
                        domain_id: record.id,
                        domain_name: record.name,
                        backend_host: endpoint.host().to_owned(),
                        enabled: record.enabled,
                        projects: HashMap::new(),
                    };
                    let view = info.view();
                    self.cache
                        .write()
                        .insert(domain_id.to_owned(), CacheSlot::Live { info, endpoint: idx });
                    return DomainResolution::Found(view);
                },
                Err(err) => {
                    record_domain_lookup(endpoint.name(), err.outcome(), latency);
                    if err.falls_through() {
                        debug!(
                            domain_id,
                            endpoint = endpoint.name(),
                            error = %err,
                            "domain not in this backend, trying next tier"
                        );
                        continue;
                    }
                    warn!(
                        domain_id,
                        endpoint = endpoint.name(),
                        error = %err,
                        "domain rejected as invalid"
                    );
                    self.cache.write().insert(domain_id.to_owned(), CacheSlot::Invalid);
                    return DomainResolution::Invalid;
                },
            }
        }

        DomainResolution::NotFound
    }

    /// Resolves a project within a previously resolved domain.
    ///
    /// The cached project map answers first. On a miss, a live entry issues
    /// a direct lookup through the endpoint that owns the domain; a scraped
    /// entry's listing is complete, so its miss is an authoritative
    /// `NotFound`.
    pub async fn resolve_project(&self, domain_id: &str, project_id: &str) -> ProjectResolution {
        enum Next {
            Direct(usize),
            NotFound,
            Unavailable,
        }

        let next = {
            let cache = self.cache.read();
            match cache.get(domain_id) {
                Some(slot) => {
                    if let Some(project) =
                        slot.info().and_then(|info| info.projects.get(project_id))
                    {
                        return ProjectResolution::Found(project.clone());
                    }
                    match slot {
                        CacheSlot::Live { endpoint, .. } => Next::Direct(*endpoint),
                        CacheSlot::Scraped { .. } => Next::NotFound,
                        CacheSlot::Invalid => Next::Unavailable,
                    }
                },
                None => {
                    debug!(domain_id, project_id, "project lookup against unresolved domain");
                    Next::Unavailable
                },
            }
        };

        let endpoint_idx = match next {
            Next::Direct(idx) => idx,
            Next::NotFound => return ProjectResolution::NotFound,
            Next::Unavailable => return ProjectResolution::Unavailable,
        };

        let endpoint = &self.verify_endpoints[endpoint_idx];
        match self.bounded(endpoint.get_project(domain_id, project_id)).await {
            Ok(record) => {
                record_project_lookup(endpoint.name(), "found");
                let project =
                    ProjectInfo { id: record.id, name: record.name, enabled: record.enabled };
                let mut cache = self.cache.write();
                if let Some(CacheSlot::Live { info, .. }) = cache.get_mut(domain_id) {
                    info.projects.insert(project.id.clone(), project.clone());
                }
                ProjectResolution::Found(project)
            },
            Err(BackendError::NotFound { .. }) => {
                record_project_lookup(endpoint.name(), "not_found");
                debug!(domain_id, project_id, "project not in domain");
                ProjectResolution::NotFound
            },
            Err(err) => {
                record_project_lookup(endpoint.name(), err.outcome());
                warn!(
                    domain_id,
                    project_id,
                    endpoint = endpoint.name(),
                    error = %err,
                    "project lookup failed, leaving unresolved"
                );
                ProjectResolution::Unavailable
            },
        }
    }

    /// Warms the cache by listing all domains and their projects from each
    /// scrape endpoint.
    ///
    /// Used as a fallback data source for domains no domain-scoped session
    /// can reach. Per-domain failures are logged and skipped; a failing
    /// endpoint never aborts the scrape wholesale. Returns the number of
    /// domains cached afterwards.
    pub async fn bulk_scrape(&self) -> usize {
        for endpoint in &self.scrape_endpoints {
            let domains = match self.bounded(endpoint.list_domains()).await {
                Ok(domains) => domains,
                Err(err) => {
                    warn!(endpoint = endpoint.name(), error = %err, "domain scrape failed");
                    continue;
                },
            };

            let mut scraped = 0usize;
            for domain in domains {
                let projects = match self.bounded(endpoint.list_projects(&domain.id)).await {
                    Ok(projects) => projects,
                    Err(err) => {
                        warn!(
                            endpoint = endpoint.name(),
                            domain_id = %domain.id,
                            error = %err,
                            "project scrape failed, skipping domain"
                        );
                        continue;
                    },
                };

                // Every backend has its own `default` domain; keep them
                // distinct so the heuristic below can tell them apart.
                let domain_id = if domain.id == "default" {
                    format!("{DEFAULT_DOMAIN_PREFIX}{}", endpoint.name())
                } else {
                    domain.id
                };

                let info = DomainInfo {
                    domain_id: domain_id.clone(),
                    domain_name: domain.name,
                    backend_host: endpoint.host().to_owned(),
                    enabled: domain.enabled,
                    projects: projects
                        .into_iter()
                        .map(|p| {
                            (p.id.clone(), ProjectInfo { id: p.id, name: p.name, enabled: p.enabled })
                        })
                        .collect(),
                };

                let mut cache = self.cache.write();
                // A live entry with a usable session outranks a scrape.
                if !matches!(cache.get(&domain_id), Some(CacheSlot::Live { .. })) {
                    cache.insert(domain_id, CacheSlot::Scraped { info });
                }
                scraped += 1;
            }

            info!(endpoint = endpoint.name(), domains = scraped, "domains scraped");
        }

        let count = self.cached_domains();
        record_scraped_domains(count);
        count
    }

    /// Last-resort heuristic: scans cached per-backend default domains for
    /// one that contains the project. False positives are possible across
    /// clusters with colliding project ids, so a match is logged loudly and
    /// callers must treat it as weak evidence.
    pub fn find_default_domain(&self, project_id: &str) -> Option<DomainView> {
        let cache = self.cache.read();
        for (domain_id, slot) in cache.iter() {
            if !domain_id.starts_with(DEFAULT_DOMAIN_PREFIX) {
                continue;
            }
            if let Some(info) = slot.info() {
                if info.projects.contains_key(project_id) {
                    warn!(
                        project_id,
                        domain_id = %info.domain_id,
                        "matched via default-domain heuristic"
                    );
                    return Some(info.view());
                }
            }
        }
        None
    }

    /// Number of domains currently cached.
    pub fn cached_domains(&self) -> usize {
        self.cache.read().values().filter(|slot| slot.info().is_some()).count()
    }

    fn cached_resolution(&self, domain_id: &str) -> Option<DomainResolution> {
        let cache = self.cache.read();
        cache.get(domain_id).map(|slot| match slot.info() {
            Some(info) => DomainResolution::Found(info.view()),
            None => DomainResolution::Invalid,
        })
    }

    /// Bounds a backend call by the configured timeout; a hung backend is
    /// classified as unreachable.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, BackendError>>,
    ) -> Result<T, BackendError> {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Unreachable {
                message: format!("call timed out after {:?}", self.call_timeout),
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        backend::{DomainRecord, ProjectRecord},
        mock::MockEndpoint,
    };

    fn enabled_domain(id: &str, name: &str) -> DomainRecord {
        DomainRecord { id: id.to_owned(), name: name.to_owned(), enabled: true }
    }

    fn enabled_project(id: &str, name: &str) -> ProjectRecord {
        ProjectRecord { id: id.to_owned(), name: name.to_owned(), enabled: true }
    }

    fn gateway(
        verify: Vec<Arc<dyn IdentityEndpoint>>,
        scrape: Vec<Arc<dyn IdentityEndpoint>>,
    ) -> IdentityGateway {
        IdentityGateway::new(verify, scrape, GatewayConfig::default()).expect("gateway")
    }

    #[test]
    fn test_no_endpoints_is_fatal() {
        let err = IdentityGateway::new(vec![], vec![], GatewayConfig::default()).unwrap_err();
        assert!(matches!(err, GatewayError::NoEndpoints));
    }

    #[tokio::test]
    async fn test_resolve_domain_first_endpoint_wins() {
        let first = Arc::new(
            MockEndpoint::new("first").with_domain(enabled_domain("d1", "alpha"), vec![]),
        );
        let second = Arc::new(
            MockEndpoint::new("second").with_domain(enabled_domain("d1", "shadow"), vec![]),
        );
        let gw = gateway(vec![first.clone(), second.clone()], vec![]);

        match gw.resolve_domain("d1").await {
            DomainResolution::Found(view) => {
                assert_eq!(view.domain_name, "alpha");
                assert_eq!(view.backend_host, first.host());
            },
            other => panic!("unexpected resolution: {other:?}"),
        }
        assert_eq!(second.domain_calls(), 0);
    }

    #[tokio::test]
    async fn test_resolve_domain_falls_through_unauthorized() {
        let first = Arc::new(MockEndpoint::new("first").fail_domain(
            "d1",
            BackendError::Unauthorized { message: "wrong cluster".to_owned() },
        ));
        let second = Arc::new(
            MockEndpoint::new("second").with_domain(enabled_domain("d1", "beta"), vec![]),
        );
        let gw = gateway(vec![first.clone(), second], vec![]);

        let resolution = gw.resolve_domain("d1").await;
        assert!(matches!(resolution, DomainResolution::Found(ref v) if v.domain_name == "beta"));
        assert_eq!(first.domain_calls(), 1);
    }

    #[tokio::test]
    async fn test_bad_request_is_terminal_and_cached() {
        let first = Arc::new(MockEndpoint::new("first").fail_domain(
            "d1",
            BackendError::BadRequest { message: "disabled".to_owned() },
        ));
        let second = Arc::new(
            MockEndpoint::new("second").with_domain(enabled_domain("d1", "never"), vec![]),
        );
        let gw = gateway(vec![first.clone(), second.clone()], vec![]);

        assert_eq!(gw.resolve_domain("d1").await, DomainResolution::Invalid);
        // Terminal: the second endpoint is never consulted.
        assert_eq!(second.domain_calls(), 0);

        // Cached: repeat resolution does not touch the backend again.
        assert_eq!(gw.resolve_domain("d1").await, DomainResolution::Invalid);
        assert_eq!(first.domain_calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_domain_resolves_not_found() {
        let ep = Arc::new(MockEndpoint::new("only"));
        let gw = gateway(vec![ep], vec![]);
        assert_eq!(gw.resolve_domain("ghost").await, DomainResolution::NotFound);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_backend() {
        let ep = Arc::new(
            MockEndpoint::new("only").with_domain(enabled_domain("d1", "alpha"), vec![]),
        );
        let gw = gateway(vec![ep.clone()], vec![]);

        let _ = gw.resolve_domain("d1").await;
        let _ = gw.resolve_domain("d1").await;
        assert_eq!(ep.domain_calls(), 1);
    }

    #[tokio::test]
    async fn test_scrape_serves_unauthorized_domain() {
        let verify = Arc::new(MockEndpoint::new("verify").fail_domain(
            "d1",
            BackendError::Unauthorized { message: "no domain scope".to_owned() },
        ));
        let scraper = Arc::new(MockEndpoint::new("scraper").with_domain(
            enabled_domain("d1", "alpha"),
            vec![enabled_project("p1", "staging")],
        ));
        let gw = gateway(vec![verify], vec![scraper.clone()]);

        assert_eq!(gw.bulk_scrape().await, 1);
        assert_eq!(scraper.project_list_calls(), 1, "one project listing per scraped domain");

        // Cache tier answers before the verify endpoint is even tried.
        let resolution = gw.resolve_domain("d1").await;
        assert!(matches!(resolution, DomainResolution::Found(ref v) if v.domain_name == "alpha"));

        let project = gw.resolve_project("d1", "p1").await;
        assert!(matches!(project, ProjectResolution::Found(ref p) if p.name == "staging"));
    }

    #[tokio::test]
    async fn test_scraped_project_miss_is_authoritative() {
        let scraper = Arc::new(MockEndpoint::new("scraper").with_domain(
            enabled_domain("d1", "alpha"),
            vec![enabled_project("p1", "staging")],
        ));
        let gw = gateway(vec![], vec![scraper]);
        gw.bulk_scrape().await;

        assert_eq!(gw.resolve_project("d1", "gone").await, ProjectResolution::NotFound);
    }

    #[tokio::test]
    async fn test_scrape_skips_failing_domain() {
        let scraper = Arc::new(
            MockEndpoint::new("scraper")
                .with_domain(enabled_domain("d1", "alpha"), vec![enabled_project("p1", "one")])
                .with_domain(enabled_domain("d2", "beta"), vec![enabled_project("p2", "two")])
                .fail_projects(
                    "d1",
                    BackendError::Forbidden { message: "listing denied".to_owned() },
                ),
        );
        let gw = gateway(vec![], vec![scraper]);

        // d1's project listing fails; d2 still lands in the cache.
        assert_eq!(gw.bulk_scrape().await, 1);
        assert!(matches!(gw.resolve_domain("d2").await, DomainResolution::Found(_)));
        assert_eq!(gw.resolve_domain("d1").await, DomainResolution::NotFound);
    }

    #[tokio::test]
    async fn test_scrape_failing_endpoint_does_not_abort() {
        let broken = Arc::new(MockEndpoint::new("broken").fail_listing(
            BackendError::Unreachable { message: "connect refused".to_owned() },
        ));
        let working = Arc::new(MockEndpoint::new("working").with_domain(
            enabled_domain("d1", "alpha"),
            vec![],
        ));
        let gw = gateway(vec![], vec![broken, working]);

        assert_eq!(gw.bulk_scrape().await, 1);
    }

    #[tokio::test]
    async fn test_default_domain_remap_and_heuristic() {
        let scraper = Arc::new(MockEndpoint::new("region-a").with_domain(
            enabled_domain("default", "Default"),
            vec![enabled_project("p9", "legacy")],
        ));
        let gw = gateway(vec![], vec![scraper]);
        gw.bulk_scrape().await;

        // The scraped id is remapped away from the colliding `default`.
        assert_eq!(gw.resolve_domain("default").await, DomainResolution::NotFound);

        let view = gw.find_default_domain("p9").expect("heuristic match");
        assert_eq!(view.domain_id, "default_region-a");
        assert!(gw.find_default_domain("p-missing").is_none());
    }

    #[tokio::test]
    async fn test_direct_project_lookup_cached() {
        let ep = Arc::new(
            MockEndpoint::new("only").with_domain(
                enabled_domain("d1", "alpha"),
                vec![enabled_project("p1", "staging")],
            ),
        );
        let gw = gateway(vec![ep.clone()], vec![]);

        let _ = gw.resolve_domain("d1").await;
        // Live entries start with an empty project map, so the first lookup
        // goes to the backend and the second is served from cache.
        assert!(matches!(gw.resolve_project("d1", "p1").await, ProjectResolution::Found(_)));
        assert!(matches!(gw.resolve_project("d1", "p1").await, ProjectResolution::Found(_)));
        assert_eq!(ep.project_calls(), 1);
    }

    #[tokio::test]
    async fn test_project_unreachable_is_unavailable_not_orphan() {
        let ep = Arc::new(
            MockEndpoint::new("only")
                .with_domain(enabled_domain("d1", "alpha"), vec![])
                .fail_project(
                    "p1",
                    BackendError::Unreachable { message: "timeout".to_owned() },
                ),
        );
        let gw = gateway(vec![ep], vec![]);

        let _ = gw.resolve_domain("d1").await;
        assert_eq!(gw.resolve_project("d1", "p1").await, ProjectResolution::Unavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_backend_times_out_to_not_found() {
        let ep = Arc::new(
            MockEndpoint::new("slow")
                .with_domain(enabled_domain("d1", "alpha"), vec![])
                .with_delay(Duration::from_secs(60)),
        );
        let gw = IdentityGateway::new(
            vec![ep],
            vec![],
            GatewayConfig { call_timeout: Duration::from_millis(50) },
        )
        .expect("gateway");

        assert_eq!(gw.resolve_domain("d1").await, DomainResolution::NotFound);
    }
}
