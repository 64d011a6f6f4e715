//! Value types flowing through a pipeline.

mod cell;
mod change;
mod record;

pub use cell::Cell;
pub use change::{ChangeKind, RowChange};
pub use record::Record;
