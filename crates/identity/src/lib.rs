//! Identity gateway for Steward.
//!
//! Wraps an identity backend with per-domain resolution, a scraped
//! bulk-domain cache, and classification of backend failures into typed,
//! actionable outcomes. Backend unavailability or authorization failure for
//! a single domain never aborts a reconciliation run.

pub mod backend;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod mock;
pub mod rest;

pub use backend::{DomainRecord, IdentityEndpoint, ProjectRecord};
pub use domain::{DomainInfo, DomainView, ProjectInfo};
pub use error::{BackendError, GatewayError};
pub use gateway::{DomainResolution, GatewayConfig, IdentityGateway, ProjectResolution};
pub use mock::MockEndpoint;
pub use rest::{EndpointConfig, RestEndpoint};
