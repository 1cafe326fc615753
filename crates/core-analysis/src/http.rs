use crate::{AnalysisClient, AnalysisError, CheckRequest, HealthStatus, wire};
use core_model::Match;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// HTTP transport for a LanguageTool-compatible service.
///
/// * `POST {endpoint}/v2/check` with form fields `text` and `language`.
/// * `GET {endpoint}/v2/languages` as the health probe.
///
/// Request bodies are never logged; only their lengths.
#[derive(Debug, Clone)]
pub struct HttpAnalysisClient {
    http: reqwest::Client,
    endpoint: String,
    probe_timeout: Duration,
}

impl HttpAnalysisClient {
    pub fn new(
        endpoint: impl Into<String>,
        request_timeout: Duration,
        probe_timeout: Duration,
    ) -> Result<Self, AnalysisError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(AnalysisError::from)?;
        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            probe_timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path)
    }
}

impl AnalysisClient for HttpAnalysisClient {
    async fn check(&self, request: CheckRequest) -> Result<Vec<Match>, AnalysisError> {
        let started = Instant::now();
        let response = self
            .http
            .post(self.url("v2/check"))
            .form(&[
                ("text", request.text.as_str()),
                ("language", request.language.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            debug!(
                target: "analysis.http",
                status = status.as_u16(),
                "check_non_success"
            );
            return Err(AnalysisError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        let matches = wire::decode_matches(&request.text, &body)?;
        trace!(
            target: "analysis.http",
            text_len = request.text.len(),
            body_len = body.len(),
            matches = matches.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "check_ok"
        );
        Ok(matches)
    }

    async fn probe(&self) -> HealthStatus {
        let result = self
            .http
            .get(self.url("v2/languages"))
            .timeout(self.probe_timeout)
            .send()
            .await;
        match result {
            Ok(resp) if resp.status().is_success() => HealthStatus::Online,
            Ok(resp) => {
                debug!(
                    target: "analysis.health",
                    status = resp.status().as_u16(),
                    "probe_non_success"
                );
                HealthStatus::Offline
            }
            Err(err) => {
                debug!(target: "analysis.health", error = %err, "probe_failed");
                HealthStatus::Offline
            }
        }
    }
}
