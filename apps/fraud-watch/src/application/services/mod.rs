//! Application Services
//!
//! - `DashboardService`: owns the reconciliation engine, serializes writers,
//!   hands consistent views to readers and announces every change

mod dashboard;

pub use dashboard::{DashboardService, ReportOutcome};
