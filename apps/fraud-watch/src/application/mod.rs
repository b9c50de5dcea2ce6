//! Application Layer - Ports and services.
//!
//! Ports describe the external collaborators (transaction feed, report
//! store); services own the engine and coordinate readers and writers.

/// Port interfaces for the transaction feed and the report store.
pub mod ports;

/// Services sharing the reconciliation engine between writers and readers.
pub mod services;
