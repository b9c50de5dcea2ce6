//! Port Interfaces
//!
//! Contracts the infrastructure adapters implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `SnapshotSource`: one-shot batch of historical transactions
//! - `ReportSink`: persistence of generated dashboard reports

mod report_port;
mod snapshot_port;

pub use report_port::{
    DashboardReport, MAX_REPORT_TYPE_LEN, ReportError, ReportId, ReportRequest, ReportSink,
};
pub use snapshot_port::{FeedError, SnapshotSource, TimeWindow};

#[cfg(test)]
pub use report_port::MockReportSink;
#[cfg(test)]
pub use snapshot_port::MockSnapshotSource;
