//! Long-lived workers feeding output tables.

pub mod pool;
pub mod table;
