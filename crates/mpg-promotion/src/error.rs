use mpg_registry::RegistryError;
use thiserror::Error;

/// Fatal outcomes of one promotion invocation.
///
/// A rejected candidate is not an error, and neither is a failed reload
/// signal (see [`mpg_notify::NotifyOutcome::Failed`]).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PromotionError {
    #[error("INVALID_MODEL_NAME model name must be non-empty")]
    InvalidModelName,

    #[error("INVALID_GATE_SET {0}")]
    InvalidGateSet(String),

    #[error("NO_CANDIDATE_FOUND model={model}")]
    NoCandidateFound { model: String },

    #[error("MISSING_METRIC version={version} metric={metric}")]
    MissingMetric { version: String, metric: String },

    #[error("REGISTRY_UNAVAILABLE {0}")]
    RegistryUnavailable(String),
}

impl PromotionError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            PromotionError::InvalidModelName | PromotionError::InvalidGateSet(_) => 2,
            PromotionError::NoCandidateFound { .. } => 3,
            PromotionError::MissingMetric { .. } => 4,
            PromotionError::RegistryUnavailable(_) => 5,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PromotionError::InvalidModelName => "invalid_model_name",
            PromotionError::InvalidGateSet(_) => "invalid_gate_set",
            PromotionError::NoCandidateFound { .. } => "no_candidate_found",
            PromotionError::MissingMetric { .. } => "missing_metric",
            PromotionError::RegistryUnavailable(_) => "registry_unavailable",
        }
    }

    pub(crate) fn registry(op: &str, err: RegistryError) -> Self {
        PromotionError::RegistryUnavailable(format!("{op}: {err}"))
    }
}
