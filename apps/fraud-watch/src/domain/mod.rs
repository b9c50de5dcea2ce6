//! Domain Layer - Transaction records and the reconciliation projection.
//!
//! Pure types and fold logic with no I/O. Everything here is synchronous
//! and deterministic for a given input order.

/// Scored transaction records and fraud signal normalization.
pub mod transaction;

/// Projection of accounts, connections, alerts and KPIs.
pub mod reconciliation;
