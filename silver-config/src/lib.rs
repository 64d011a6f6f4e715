//! Configuration types and loading for silver pipelines.
//!
//! Entity definitions are plain data: every table the pipeline maintains is declared by an
//! [`shared::EntityConfig`] and every denormalized view by a [`shared::ViewConfig`]. The
//! [`load_config`] function resolves a configuration from files and environment overrides.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from};
