//! Client side of the external analysis service.
//!
//! The service itself (rule matching) is out of scope; this crate covers
//! everything needed to talk to it and to survive without it:
//! * `AnalysisClient`: transport seam used by the scheduler (HTTP in
//!   production, scripted fakes in tests).
//! * `wire`: decoding of the service's JSON payload into `core_model::Match`.
//! * `fallback`: deterministic local heuristic used while offline or after a
//!   failed request. Emits the same `Match` shape as the service.
//! * `health`: reachability probing and transition tracking.

use core_model::Match;
use std::future::Future;
use thiserror::Error;

pub mod fallback;
pub mod health;
pub mod http;
pub mod wire;

pub use core_events::HealthStatus;
pub use fallback::FallbackHeuristic;
pub use health::{HealthMonitor, HealthProbeSource};
pub use http::HttpAnalysisClient;

/// Failures talking to the service. All of them are recovered by the
/// scheduler; none reach the annotator, selection, or applicator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("service returned status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AnalysisError::Timeout
        } else if let Some(status) = err.status() {
            AnalysisError::Status(status.as_u16())
        } else {
            AnalysisError::Transport(err.to_string())
        }
    }
}

/// One analysis request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRequest {
    pub text: String,
    /// Locale code such as `en-US`, or `auto`.
    pub language: String,
}

impl CheckRequest {
    pub fn new(text: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: language.into(),
        }
    }
}

/// Transport to the analysis service.
///
/// `check` must return matches with char offsets into `request.text`.
/// Dropping the returned future should abort the underlying request where
/// the transport supports it; correctness never depends on that.
pub trait AnalysisClient: Send + Sync + 'static {
    fn check(
        &self,
        request: CheckRequest,
    ) -> impl Future<Output = Result<Vec<Match>, AnalysisError>> + Send;

    /// Lightweight reachability probe. Any failure reads as offline.
    fn probe(&self) -> impl Future<Output = HealthStatus> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_are_readable() {
        assert_eq!(
            AnalysisError::Status(503).to_string(),
            "service returned status 503"
        );
        assert_eq!(
            AnalysisError::Malformed("missing matches".into()).to_string(),
            "malformed response: missing matches"
        );
    }
}
