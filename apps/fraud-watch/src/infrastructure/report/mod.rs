//! HTTP Report Sink
//!
//! Submits dashboard reports to the external report store. The store
//! answers `{"success": true, "report_id": ...}` or
//! `{"success": false, "message" | "error_message": ...}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::application::ports::{ReportError, ReportId, ReportRequest, ReportSink};
use crate::infrastructure::config::ApiToken;

/// Submission bound used unless [`HttpReportSink::with_timeout`] says otherwise.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Report store adapter over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpReportSink {
    client: Client,
    url: String,
    token: Option<ApiToken>,
    timeout: Duration,
}

impl HttpReportSink {
    /// Create a sink posting to `url`, with an optional bearer token passed
    /// through unchanged.
    #[must_use]
    pub const fn new(client: Client, url: String, token: Option<ApiToken>) -> Self {
        Self {
            client,
            url,
            token,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Bound each submission, response body included.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Deserialize)]
struct StoreResponse {
    success: bool,
    #[serde(default)]
    report_id: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

#[async_trait]
impl ReportSink for HttpReportSink {
    async fn submit(&self, request: &ReportRequest) -> Result<ReportId, ReportError> {
        let mut builder = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token.expose());
        }

        let response = builder.send().await.map_err(|e| ReportError::Transport {
            message: e.to_string(),
        })?;
        let status = response.status();
        let body = response.text().await.map_err(|e| ReportError::Transport {
            message: e.to_string(),
        })?;

        // Failure bodies still carry the store's message when they parse.
        match serde_json::from_str::<StoreResponse>(&body) {
            Ok(parsed) => interpret(parsed),
            Err(_) if !status.is_success() => Err(ReportError::Transport {
                message: format!("report store returned {status}"),
            }),
            Err(e) => Err(ReportError::Format {
                message: e.to_string(),
            }),
        }
    }
}

fn interpret(response: StoreResponse) -> Result<ReportId, ReportError> {
    if !response.success {
        return Err(ReportError::Rejected {
            message: response
                .message
                .or(response.error_message)
                .unwrap_or_else(|| "report store refused the report".to_string()),
        });
    }
    match response.report_id {
        Some(serde_json::Value::String(id)) if !id.is_empty() => Ok(ReportId(id)),
        Some(serde_json::Value::Number(id)) => Ok(ReportId(id.to_string())),
        _ => Err(ReportError::Format {
            message: "success response without report_id".to_string(),
        }),
    }
}
