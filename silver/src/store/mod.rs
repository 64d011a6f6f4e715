//! Durable bookkeeping of table workers.

mod base;
mod checkpoint;
pub mod file;
pub mod memory;

pub use base::StateStore;
pub use checkpoint::TableCheckpoint;
