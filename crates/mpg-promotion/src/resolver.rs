use mpg_registry::{ModelRegistry, ModelVersion};
use tracing::{debug, warn};

use crate::error::PromotionError;

/// Newest registered version of `model_name`, by numeric version id.
///
/// Identifiers that are not unsigned integers are skipped with a warning.
pub fn resolve_candidate(
    registry: &dyn ModelRegistry,
    model_name: &str,
) -> Result<ModelVersion, PromotionError> {
    let model_name = model_name.trim();
    if model_name.is_empty() {
        return Err(PromotionError::InvalidModelName);
    }

    let versions = registry
        .list_versions(model_name)
        .map_err(|e| PromotionError::registry("list_versions", e))?;
    debug!(model = model_name, count = versions.len(), "registered versions listed");

    let mut best: Option<(u64, ModelVersion)> = None;
    for v in versions {
        let Some(n) = v.version_number() else {
            warn!(model = model_name, version = %v.version, "skipping non-numeric version id");
            continue;
        };
        if best.as_ref().map_or(true, |(b, _)| n > *b) {
            best = Some((n, v));
        }
    }

    best.map(|(_, v)| v)
        .ok_or_else(|| PromotionError::NoCandidateFound {
            model: model_name.to_string(),
        })
}
