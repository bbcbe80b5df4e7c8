use mpg_config::RelativePolicy;
use mpg_registry::{Metrics, MetricsSource, ModelRegistry, ModelVersion};
use tracing::{info, warn};

use crate::error::PromotionError;
use crate::types::{Decision, GateCheck, GateSet, Outcome, ReasonCode};

// ============================================================================
// Champion lookup
// ============================================================================

/// Current alias holder together with its metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct Champion {
    pub version: ModelVersion,
    pub metrics: Metrics,
}

/// Version currently behind `alias`.
///
/// An alias that was never set and an alias whose version was deleted both
/// come back as `None`. Only transport failures are errors.
pub fn resolve_champion(
    registry: &dyn ModelRegistry,
    model_name: &str,
    alias: &str,
) -> Result<Option<ModelVersion>, PromotionError> {
    match registry.resolve_alias(model_name, alias) {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_not_found() => {
            info!(model = model_name, alias, "no current champion");
            Ok(None)
        }
        Err(e) => Err(PromotionError::registry("resolve_alias", e)),
    }
}

/// Champion version plus metrics. A champion whose metrics can no longer be
/// found is treated as no champion.
pub fn load_champion(
    registry: &dyn ModelRegistry,
    source: &dyn MetricsSource,
    model_name: &str,
    alias: &str,
) -> Result<Option<Champion>, PromotionError> {
    let Some(version) = resolve_champion(registry, model_name, alias)? else {
        return Ok(None);
    };
    champion_with_metrics(source, version)
}

pub(crate) fn champion_with_metrics(
    source: &dyn MetricsSource,
    version: ModelVersion,
) -> Result<Option<Champion>, PromotionError> {
    match source.get_metrics(&version) {
        Ok(metrics) => Ok(Some(Champion { version, metrics })),
        Err(e) if e.is_not_found() => {
            warn!(version = %version.version, error = %e, "champion metrics not found; treating as no champion");
            Ok(None)
        }
        Err(e) => Err(PromotionError::registry("get_metrics(champion)", e)),
    }
}

/// Candidate metrics. Unlike the champion, a candidate without metrics
/// cannot be judged, so any failure is fatal.
pub fn candidate_metrics(
    source: &dyn MetricsSource,
    candidate: &ModelVersion,
) -> Result<Metrics, PromotionError> {
    source
        .get_metrics(candidate)
        .map_err(|e| PromotionError::registry("get_metrics(candidate)", e))
}

// ============================================================================
// Decision
// ============================================================================

/// Decide PROMOTE or REJECT. Pure: the same inputs always give the same
/// [`Decision`].
///
/// Absolute gates run first, in gate order; every failing gate is named.
/// A non-finite candidate value fails its gate. The relative check compares
/// the primary metric against the champion (ties pass); under
/// [`RelativePolicy::AllGated`] every gated metric present on both sides must
/// also not regress, otherwise non-primary regressions are only noted.
pub fn evaluate(
    candidate_version: &str,
    candidate: &Metrics,
    champion: Option<(&str, &Metrics)>,
    gates: &GateSet,
    policy: RelativePolicy,
) -> Result<Decision, PromotionError> {
    let mut gate_checks = Vec::with_capacity(gates.len());
    let mut gate_failures = Vec::new();

    for gate in gates.iter() {
        let value = *candidate
            .get(&gate.metric)
            .ok_or_else(|| PromotionError::MissingMetric {
                version: candidate_version.to_string(),
                metric: gate.metric.clone(),
            })?;

        let passed = value.is_finite() && value >= gate.min;
        if !value.is_finite() {
            gate_failures.push(format!(
                "{} {} is not finite (min {})",
                gate.metric, value, gate.min
            ));
        } else if !passed {
            gate_failures.push(format!(
                "{} {} < min {} (short by {})",
                gate.metric,
                value,
                gate.min,
                tidy(gate.min - value)
            ));
        }
        gate_checks.push(GateCheck {
            metric: gate.metric.clone(),
            min: gate.min,
            value,
            passed,
        });
    }

    let mut regressions = Vec::new();
    let mut notes = Vec::new();
    let mut relative_summary = None;

    match champion {
        None => relative_summary = Some("no champion; first promotion".to_string()),
        Some((champ_version, champ_metrics)) => {
            let primary = &gates.primary().metric;
            for gate in gates.iter() {
                let is_primary = &gate.metric == primary;
                let cand_value = candidate[&gate.metric];
                let champ_value = match champ_metrics.get(&gate.metric) {
                    Some(v) if v.is_finite() => *v,
                    _ => {
                        if is_primary {
                            notes.push(format!(
                                "champion v{champ_version} has no usable {primary}; relative check skipped"
                            ));
                        }
                        continue;
                    }
                };
                if !cand_value.is_finite() {
                    continue;
                }

                if cand_value >= champ_value {
                    if is_primary {
                        relative_summary = Some(format!(
                            "{} {} >= champion v{} {}",
                            gate.metric, cand_value, champ_version, champ_value
                        ));
                    }
                    continue;
                }

                let text = format!(
                    "{} {} < champion v{} {}",
                    gate.metric, cand_value, champ_version, champ_value
                );
                if is_primary || policy == RelativePolicy::AllGated {
                    regressions.push(format!("regression: {text}"));
                } else {
                    notes.push(format!("advisory regression: {text}"));
                }
            }
        }
    }

    let mut reason_codes = Vec::new();
    if !gate_failures.is_empty() {
        reason_codes.push(ReasonCode::FailedGates);
    }
    if !regressions.is_empty() {
        reason_codes.push(ReasonCode::NotBetterThanChampion);
    }

    let (outcome, reasons) = if reason_codes.is_empty() {
        let mut reasons = vec![format!("all {} gates passed", gates.len())];
        reasons.extend(relative_summary);
        (Outcome::Promote, reasons)
    } else {
        let mut reasons = gate_failures;
        reasons.extend(regressions);
        (Outcome::Reject, reasons)
    };

    Ok(Decision {
        outcome,
        reasons,
        notes,
        reason_codes,
        gate_checks,
        candidate_version: candidate_version.to_string(),
        champion_version: champion.map(|(v, _)| v.to_string()),
    })
}

/// Drop subtraction noise (`0.92 - 0.9` is `0.020000000000000018`).
fn tidy(delta: f64) -> f64 {
    (delta * 1e12).round() / 1e12
}
