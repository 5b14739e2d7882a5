//! Error types for identity backend calls and gateway construction.
//!
//! Backend errors carry a fall-through classification: some outcomes are
//! terminal for a domain, others mean "try the next resolution tier".

use snafu::Snafu;

/// Typed outcome of a single identity-backend call.
///
/// Cloneable so the mock endpoint can replay programmed failures.
#[derive(Debug, Clone, Snafu)]
#[snafu(visibility(pub))]
pub enum BackendError {
    /// The backend rejected the request as invalid for this domain.
    /// Terminal: not retried against other endpoints.
    #[snafu(display("bad request: {message}"))]
    BadRequest {
        /// Backend-provided description.
        message: String,
    },

    /// Missing or rejected credentials; this endpoint does not own the
    /// domain. Falls through to the next endpoint or a cached scrape.
    #[snafu(display("unauthorized: {message}"))]
    Unauthorized {
        /// Backend-provided description.
        message: String,
    },

    /// Authenticated but not permitted; treated like [`BackendError::Unauthorized`].
    #[snafu(display("forbidden: {message}"))]
    Forbidden {
        /// Backend-provided description.
        message: String,
    },

    /// The entity does not exist on this backend. A normal, expected
    /// outcome, not a failure to log loudly.
    #[snafu(display("not found: {message}"))]
    NotFound {
        /// Backend-provided description.
        message: String,
    },

    /// The backend could not be reached or the call timed out. Treated
    /// conservatively as unresolved, never as proof of deletion.
    #[snafu(display("backend unreachable: {message}"))]
    Unreachable {
        /// Transport or timeout description.
        message: String,
    },
}

impl BackendError {
    /// True when the failure means "this tier cannot answer" and the next
    /// resolution tier should be tried. Only [`BackendError::BadRequest`]
    /// is terminal for the queried domain.
    #[must_use]
    pub fn falls_through(&self) -> bool {
        !matches!(self, Self::BadRequest { .. })
    }

    /// Stable label for metrics and logs.
    #[must_use]
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "bad_request",
            Self::Unauthorized { .. } => "unauthorized",
            Self::Forbidden { .. } => "forbidden",
            Self::NotFound { .. } => "not_found",
            Self::Unreachable { .. } => "unreachable",
        }
    }
}

/// Gateway construction and configuration errors. Fatal at startup, unlike
/// per-domain backend errors which are recovered locally.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum GatewayError {
    /// Neither verify nor scrape endpoints are configured, so no domain
    /// could ever resolve.
    #[snafu(display("no identity endpoints configured"))]
    NoEndpoints,

    /// An endpoint definition could not be turned into a client.
    #[snafu(display("invalid endpoint '{name}': {message}"))]
    InvalidEndpoint {
        /// Endpoint name from configuration.
        name: String,
        /// What was wrong with it.
        message: String,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_request_is_terminal() {
        let err = BackendError::BadRequest { message: "domain disabled".to_owned() };
        assert!(!err.falls_through());
    }

    #[test]
    fn test_other_outcomes_fall_through() {
        let errors = [
            BackendError::Unauthorized { message: "no token".to_owned() },
            BackendError::Forbidden { message: "wrong scope".to_owned() },
            BackendError::NotFound { message: "no such domain".to_owned() },
            BackendError::Unreachable { message: "timeout".to_owned() },
        ];
        for err in errors {
            assert!(err.falls_through(), "{err} should fall through");
        }
    }

    #[test]
    fn test_outcome_labels() {
        let err = BackendError::Unreachable { message: "connect refused".to_owned() };
        assert_eq!(err.outcome(), "unreachable");
    }
}
