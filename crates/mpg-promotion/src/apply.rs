use mpg_registry::ModelRegistry;
use tracing::{info, warn};

use crate::error::PromotionError;
use crate::types::Decision;

pub const TAG_DECISION: &str = "decision";
pub const TAG_DECISION_REASONS: &str = "decision_reasons";
pub const TAG_REJECTED_REASON: &str = "rejected_reason";

/// Issues the registry writes for a decision: the alias repoint and the
/// candidate's decision tags. Never touches any other version.
pub struct AliasManager<'a> {
    registry: &'a dyn ModelRegistry,
    model: &'a str,
    alias: &'a str,
}

impl<'a> AliasManager<'a> {
    pub fn new(registry: &'a dyn ModelRegistry, model: &'a str, alias: &'a str) -> Self {
        Self {
            registry,
            model,
            alias,
        }
    }

    /// Repoint the alias to the candidate, then tag it.
    ///
    /// A failed repoint is fatal and nothing is tagged. Once the alias has
    /// moved, tag failures are returned as warnings.
    pub fn promote(&self, decision: &Decision) -> Result<Vec<String>, PromotionError> {
        let version = decision.candidate_version.as_str();
        self.registry
            .set_alias(self.model, self.alias, version)
            .map_err(|e| PromotionError::registry("set_alias", e))?;
        info!(
            model = self.model,
            alias = self.alias,
            version,
            previous = decision.champion_version.as_deref().unwrap_or("-"),
            "alias repointed"
        );

        let mut warnings = Vec::new();
        for (key, value) in [
            (TAG_DECISION, "promoted".to_string()),
            (TAG_DECISION_REASONS, decision.reasons_joined()),
        ] {
            if let Err(e) = self.registry.set_tag(self.model, version, key, &value) {
                warn!(model = self.model, version, key, error = %e, "tag write failed after repoint");
                warnings.push(format!("set_tag {key} failed: {e}"));
            }
        }
        Ok(warnings)
    }

    /// Tag the candidate as rejected. The alias is left alone.
    pub fn record_rejection(&self, decision: &Decision) -> Result<(), PromotionError> {
        let version = decision.candidate_version.as_str();
        let codes = decision.reason_codes_joined();
        let codes = if codes.is_empty() {
            "unspecified".to_string()
        } else {
            codes
        };

        for (key, value) in [
            (TAG_DECISION, "rejected".to_string()),
            (TAG_DECISION_REASONS, decision.reasons_joined()),
            (TAG_REJECTED_REASON, codes),
        ] {
            self.registry
                .set_tag(self.model, version, key, &value)
                .map_err(|e| PromotionError::registry("set_tag", e))?;
        }
        info!(model = self.model, version, "candidate rejected; alias unchanged");
        Ok(())
    }
}
