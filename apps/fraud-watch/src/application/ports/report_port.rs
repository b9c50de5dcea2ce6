//! Report Sink Port (Driven Port)
//!
//! Interface for persisting a generated dashboard report. Storage, listing
//! and authorization belong to the collaborator behind this port.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::reconciliation::{Account, Alert, DashboardView, Kpis, RiskDistribution};

/// Longest accepted report type.
pub const MAX_REPORT_TYPE_LEN: usize = 255;

/// Identifier assigned by the report store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(pub String);

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Report submission error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReportError {
    /// Report type empty or too long.
    #[error("Invalid report type: {reason}")]
    InvalidType {
        /// Why the type was refused.
        reason: String,
    },

    /// Network failure or non-success HTTP status.
    #[error("Report transport error: {message}")]
    Transport {
        /// Error details.
        message: String,
    },

    /// The store answered with `success: false`.
    #[error("Report rejected: {message}")]
    Rejected {
        /// Message returned by the store.
        message: String,
    },

    /// The store's answer could not be decoded.
    #[error("Report response format error: {message}")]
    Format {
        /// Error details.
        message: String,
    },
}

/// Point-in-time export of the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    /// KPI counters.
    pub stats: Kpis,
    /// Risk band histogram.
    pub risk_distribution: RiskDistribution,
    /// Account registry.
    pub accounts: Vec<Account>,
    /// Retained alerts, newest first.
    pub alerts: Vec<Alert>,
    /// Projection revision the report was taken from.
    pub revision: u64,
    /// Generation time.
    #[serde(rename = "generatedAt")]
    pub generated_at: DateTime<Utc>,
}

impl DashboardReport {
    /// Build a report from a view.
    #[must_use]
    pub fn from_view(view: DashboardView, generated_at: DateTime<Utc>) -> Self {
        Self {
            stats: view.kpis,
            risk_distribution: view.risk_distribution,
            accounts: view.accounts,
            alerts: view.alerts,
            revision: view.revision,
            generated_at,
        }
    }
}

/// Body sent to the report store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRequest {
    /// Report payload.
    pub data: DashboardReport,
    /// Report type label.
    #[serde(rename = "type")]
    pub report_type: String,
}

impl ReportRequest {
    /// Create a request, validating the report type.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::InvalidType`] when the type is blank or longer
    /// than [`MAX_REPORT_TYPE_LEN`] characters.
    pub fn new(report_type: impl Into<String>, data: DashboardReport) -> Result<Self, ReportError> {
        let report_type = report_type.into();
        if report_type.trim().is_empty() {
            return Err(ReportError::InvalidType {
                reason: "type is required".to_string(),
            });
        }
        if report_type.chars().count() > MAX_REPORT_TYPE_LEN {
            return Err(ReportError::InvalidType {
                reason: format!("type exceeds {MAX_REPORT_TYPE_LEN} characters"),
            });
        }
        Ok(Self { data, report_type })
    }
}

/// Port for storing reports.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Submit a report and return the identifier the store assigned.
    async fn submit(&self, request: &ReportRequest) -> Result<ReportId, ReportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> DashboardReport {
        DashboardReport::from_view(DashboardView::default(), Utc::now())
    }

    #[test]
    fn blank_type_is_rejected() {
        let err = ReportRequest::new("  ", report()).unwrap_err();
        assert!(matches!(err, ReportError::InvalidType { .. }));
    }

    #[test]
    fn long_type_is_rejected() {
        let too_long = "x".repeat(MAX_REPORT_TYPE_LEN + 1);
        assert!(ReportRequest::new(too_long, report()).is_err());
        assert!(ReportRequest::new("x".repeat(MAX_REPORT_TYPE_LEN), report()).is_ok());
    }

    #[test]
    fn request_wire_shape() {
        let request = ReportRequest::new("fraud_summary", report()).unwrap();
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["type"], "fraud_summary");
        assert!(json["data"]["stats"].is_object());
        assert!(json["data"]["accounts"].is_array());
        assert!(json["data"]["generatedAt"].is_string());
    }
}
