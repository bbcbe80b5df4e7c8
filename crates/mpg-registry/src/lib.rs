//! mpg-registry
//!
//! Registry boundary for the promotion gate: the [`ModelRegistry`] and
//! [`MetricsSource`] traits plus three adapters.
//!
//! - [`InMemoryRegistry`]: tests and fault injection.
//! - [`FileRegistry`]: JSON document on disk (offline runs, CLI scenarios).
//! - [`MlflowClient`]: MLflow tracking server over blocking HTTP.
//!
//! The promotion logic only ever talks to the traits.

pub mod file;
pub mod memory;
pub mod mlflow;
mod types;

pub use file::FileRegistry;
pub use memory::{InMemoryRegistry, ModelEntry, RegistryState, RegistryWrite};
pub use mlflow::MlflowClient;
pub use types::{Metrics, MetricsSource, ModelRegistry, ModelVersion, RegistryError};
