//! Replayable sources of raw records.

mod base;
pub mod jsonl;
pub mod memory;

pub use base::{Source, SourceRecord};
