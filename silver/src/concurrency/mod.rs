//! Concurrency utilities shared by pipeline workers.
//!
//! The [`shutdown`] module implements a broadcast shutdown signal observed by every table worker,
//! and [`stream`] batches source records by size and time while watching that signal, so a
//! worker always stops on a batch boundary.

pub mod shutdown;
pub mod stream;
