//! Logging and metrics setup shared by silver binaries and tests.

pub mod metrics;
pub mod tracing;
