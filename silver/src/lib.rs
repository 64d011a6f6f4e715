//! Silver layer of the airline data pipeline.
//!
//! Raw entity records are read from replayable [`source`]s, normalized by a
//! [`transform::TransformStage`], gated by a [`validation::RowValidator`] and landed either in an
//! [`append::AppendOnlyTable`] or merged into a [`merge::CurrentStateTable`]. Business
//! [`view`]s join those tables on demand. A [`pipeline::Pipeline`] drives one worker per table.

pub mod append;
pub mod concurrency;
pub mod conversions;
pub mod error;
pub mod log;
mod macros;
pub mod merge;
pub mod metrics;
pub mod operator;
pub mod pipeline;
pub mod source;
pub mod store;
pub mod table;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod transform;
pub mod types;
pub mod validation;
pub mod view;
pub mod workers;
