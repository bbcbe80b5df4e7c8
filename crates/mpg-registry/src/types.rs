use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Metric name -> value, as logged by the training run.
pub type Metrics = BTreeMap<String, f64>;

// ---------------------------------------------------------------------------
// Model version
// ---------------------------------------------------------------------------

/// One registered version of a model.
///
/// `version` is opaque to the registry but monotonically increasing per model
/// name; [`ModelVersion::version_number`] parses it for ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    pub name: String,
    pub version: String,
    /// Tracking run that produced this version (MLflow `run_id`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    /// Metrics attached directly to the version. Adapters backed by a separate
    /// tracking store leave this empty and answer [`MetricsSource::get_metrics`].
    #[serde(default)]
    pub metrics: Metrics,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl ModelVersion {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            run_id: None,
            metrics: Metrics::new(),
            tags: BTreeMap::new(),
        }
    }

    pub fn with_metric(mut self, key: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(key.into(), value);
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Numeric version, or `None` if the identifier is not an unsigned integer.
    pub fn version_number(&self) -> Option<u64> {
        self.version.trim().parse().ok()
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by registry and metrics adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The requested model, version, alias, or run does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Transport failure, timeout, or a non-success response from the registry.
    #[error("registry unavailable: {0}")]
    Unavailable(String),
    /// The registry answered but the payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

impl RegistryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound(_))
    }
}

// ---------------------------------------------------------------------------
// Adapter traits
// ---------------------------------------------------------------------------

/// Model registry contract: version listing plus alias and tag commands.
///
/// The registry owns alias storage and its consistency; callers issue one
/// unconditional `set_alias` per promotion and never compare-and-swap locally.
pub trait ModelRegistry: Send + Sync {
    /// Short backend name for logs (e.g. `"mlflow"`).
    fn backend(&self) -> &'static str;

    /// All registered versions of `model_name`, in registry order.
    fn list_versions(&self, model_name: &str) -> Result<Vec<ModelVersion>, RegistryError>;

    /// The version `alias` currently points to. `NotFound` when the alias was
    /// never set or its target no longer exists.
    fn resolve_alias(&self, model_name: &str, alias: &str) -> Result<ModelVersion, RegistryError>;

    /// Repoint `alias` to `version`. Must never leave the alias dangling.
    fn set_alias(&self, model_name: &str, alias: &str, version: &str) -> Result<(), RegistryError>;

    /// Write one metadata tag on a version.
    fn set_tag(
        &self,
        model_name: &str,
        version: &str,
        key: &str,
        value: &str,
    ) -> Result<(), RegistryError>;
}

/// Tracking-store contract: metrics keyed by model version.
pub trait MetricsSource: Send + Sync {
    fn get_metrics(&self, version: &ModelVersion) -> Result<Metrics, RegistryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_number_parses_integers_only() {
        assert_eq!(ModelVersion::new("m", "12").version_number(), Some(12));
        assert_eq!(ModelVersion::new("m", " 7 ").version_number(), Some(7));
        assert_eq!(ModelVersion::new("m", "v3").version_number(), None);
        assert_eq!(ModelVersion::new("m", "-1").version_number(), None);
    }

    #[test]
    fn registry_error_display() {
        let err = RegistryError::Unavailable("connection refused".to_string());
        assert_eq!(err.to_string(), "registry unavailable: connection refused");
        assert!(RegistryError::NotFound("alias".to_string()).is_not_found());
    }
}
