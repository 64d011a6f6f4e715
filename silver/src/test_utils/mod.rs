//! Utilities for testing silver pipelines.
//!
//! - [`airline`] builds the raw records and the configuration of the airline pipeline, with
//!   in-memory sources that tests can feed while the pipeline runs.
//! - [`wait`] polls a condition with a timeout, since workers apply batches asynchronously.

pub mod airline;
pub mod wait;
