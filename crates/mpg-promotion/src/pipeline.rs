use mpg_config::{PromotionSettings, RelativePolicy};
use mpg_notify::ReloadNotifier;
use mpg_registry::{MetricsSource, ModelRegistry, ModelVersion};
use tracing::{info, warn};

use crate::apply::AliasManager;
use crate::error::PromotionError;
use crate::evaluator::{candidate_metrics, champion_with_metrics, evaluate, resolve_champion};
use crate::resolver::resolve_candidate;
use crate::types::{GateSet, Outcome, PromotionReport, RunStatus, VersionMetrics};

/// One promotion invocation, wired to its collaborators.
///
/// `resolve candidate -> load metrics -> decide -> promote | reject -> notify`.
/// Nothing is kept between runs.
pub struct PromotionGate<'a> {
    model: String,
    alias: String,
    gates: GateSet,
    policy: RelativePolicy,
    registry: &'a dyn ModelRegistry,
    metrics: &'a dyn MetricsSource,
    notifier: &'a dyn ReloadNotifier,
}

impl<'a> PromotionGate<'a> {
    pub fn new(
        settings: &PromotionSettings,
        registry: &'a dyn ModelRegistry,
        metrics: &'a dyn MetricsSource,
        notifier: &'a dyn ReloadNotifier,
    ) -> Result<Self, PromotionError> {
        let model = settings.model.name.trim();
        if model.is_empty() {
            return Err(PromotionError::InvalidModelName);
        }
        Ok(Self {
            model: model.to_string(),
            alias: settings.model.alias.clone(),
            gates: GateSet::from_settings(&settings.gates)?,
            policy: settings.relative_policy,
            registry,
            metrics,
            notifier,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn run(&self) -> Result<PromotionReport, PromotionError> {
        let candidate = resolve_candidate(self.registry, &self.model)?;
        info!(model = %self.model, version = %candidate.version, "candidate resolved");

        let champion_version = resolve_champion(self.registry, &self.model, &self.alias)?;
        if let Some(champ) = champion_version.as_ref() {
            if same_version(champ, &candidate) {
                info!(
                    model = %self.model,
                    alias = %self.alias,
                    version = %candidate.version,
                    "candidate already holds the alias; nothing to do"
                );
                // Same source as a normal run; the listing may carry stale or no metrics.
                let (metrics, warning) = match self.metrics.get_metrics(&candidate) {
                    Ok(m) => (m, None),
                    Err(e) => {
                        warn!(model = %self.model, version = %candidate.version, error = %e, "champion metrics unavailable; using listing values");
                        (candidate.metrics.clone(), Some(format!("champion metrics unavailable: {e}")))
                    }
                };
                let mut report = self.report(RunStatus::AlreadyChampion, &candidate, metrics.clone());
                report.champion = Some(VersionMetrics {
                    version: champ.version.clone(),
                    metrics,
                });
                report.warnings.extend(warning);
                return Ok(report);
            }
        }

        let cand_metrics = candidate_metrics(self.metrics, &candidate)?;
        let champion = match champion_version {
            Some(v) => champion_with_metrics(self.metrics, v)?,
            None => None,
        };

        let decision = evaluate(
            &candidate.version,
            &cand_metrics,
            champion
                .as_ref()
                .map(|c| (c.version.version.as_str(), &c.metrics)),
            &self.gates,
            self.policy,
        )?;
        info!(
            model = %self.model,
            candidate = %decision.candidate_version,
            champion = decision.champion_version.as_deref().unwrap_or("-"),
            outcome = decision.outcome.as_str(),
            reasons = %decision.reasons_joined(),
            "promotion decision"
        );
        for note in &decision.notes {
            info!(model = %self.model, %note, "decision note");
        }

        let manager = AliasManager::new(self.registry, &self.model, &self.alias);
        let status = match decision.outcome {
            Outcome::Promote => RunStatus::Promoted,
            Outcome::Reject => RunStatus::Rejected,
        };
        let mut report = self.report(status, &candidate, cand_metrics);
        report.champion = champion.map(|c| VersionMetrics {
            version: c.version.version,
            metrics: c.metrics,
        });

        match decision.outcome {
            Outcome::Promote => {
                report.warnings = manager.promote(&decision)?;
                let outcome = self.notifier.notify();
                if let mpg_notify::NotifyOutcome::Failed { reason, attempts } = &outcome {
                    warn!(model = %self.model, attempts, %reason, "reload notification failed; alias stays repointed");
                    report
                        .warnings
                        .push(format!("reload notification failed after {attempts} attempt(s): {reason}"));
                }
                report.notify = Some(outcome);
            }
            Outcome::Reject => manager.record_rejection(&decision)?,
        }

        report.decision = Some(decision);
        Ok(report)
    }

    fn report(
        &self,
        status: RunStatus,
        candidate: &ModelVersion,
        metrics: mpg_registry::Metrics,
    ) -> PromotionReport {
        PromotionReport {
            model: self.model.clone(),
            alias: self.alias.clone(),
            registry_backend: self.registry.backend().to_string(),
            status,
            candidate: VersionMetrics {
                version: candidate.version.clone(),
                metrics,
            },
            champion: None,
            decision: None,
            notify: None,
            warnings: Vec::new(),
            config_hash: None,
        }
    }
}

fn same_version(a: &ModelVersion, b: &ModelVersion) -> bool {
    match (a.version_number(), b.version_number()) {
        (Some(x), Some(y)) => x == y,
        _ => a.version == b.version,
    }
}
