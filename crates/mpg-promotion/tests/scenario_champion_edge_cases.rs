//! Champion resolution and relative-comparison policy.
//!
//! GREEN when:
//! - The newest version already on the alias short-circuits with no writes.
//! - Its report carries metrics from the metrics source, not the listing.
//! - A dangling alias (version deleted) counts as no champion.
//! - A champion without the primary metric does not block promotion.
//! - `all_gated` rejects a non-primary regression that `primary` only notes.
//! - A NaN candidate metric fails its gate.
//! - Evaluating the same inputs twice gives identical decisions.

mod common;

use common::*;
use mpg_config::RelativePolicy;
use mpg_promotion::{
    evaluate, load_champion, Gate, GateSet, Outcome, PromotionGate, ReasonCode, RunStatus,
};
use mpg_registry::{InMemoryRegistry, Metrics, MetricsSource, ModelVersion, RegistryError};

fn metrics(pairs: &[(&str, f64)]) -> Metrics {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

#[test]
fn candidate_already_champion_is_a_no_op() {
    let registry = registry_with_champion(0.95, 0.93);
    registry.seed_alias(MODEL, ALIAS, "2");
    let notifier = CountingNotifier::delivering();
    let settings = settings();

    let report = PromotionGate::new(&settings, &registry, &registry, &notifier)
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(report.status, RunStatus::AlreadyChampion);
    assert!(report.decision.is_none());
    assert!(registry.writes().is_empty());
    assert_eq!(notifier.calls(), 0);
}

/// Metrics source that answers from its own table, apart from the listing.
struct RunMetrics(Option<Metrics>);

impl MetricsSource for RunMetrics {
    fn get_metrics(&self, _version: &ModelVersion) -> Result<Metrics, RegistryError> {
        self.0
            .clone()
            .ok_or_else(|| RegistryError::Unavailable("runs/get timed out".to_string()))
    }
}

#[test]
fn already_champion_report_uses_source_metrics() {
    let registry = registry_with_champion(0.95, 0.93);
    registry.seed_alias(MODEL, ALIAS, "2");
    let source = RunMetrics(Some(metrics(&[("accuracy", 0.97), ("f1", 0.96)])));
    let notifier = CountingNotifier::delivering();
    let settings = settings();

    let report = PromotionGate::new(&settings, &registry, &source, &notifier)
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(report.status, RunStatus::AlreadyChampion);
    assert_eq!(report.candidate.metrics["accuracy"], 0.97);
    let champion = report.champion.unwrap();
    assert_eq!(champion.version, "2");
    assert_eq!(champion.metrics["f1"], 0.96);
    assert!(report.warnings.is_empty());
}

#[test]
fn already_champion_survives_metrics_outage() {
    let registry = registry_with_champion(0.95, 0.93);
    registry.seed_alias(MODEL, ALIAS, "2");
    let source = RunMetrics(None);
    let notifier = CountingNotifier::delivering();
    let settings = settings();

    let report = PromotionGate::new(&settings, &registry, &source, &notifier)
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(report.status, RunStatus::AlreadyChampion);
    assert_eq!(report.candidate.metrics["accuracy"], 0.95);
    assert!(report.warnings[0].starts_with("champion metrics unavailable"), "{:?}", report.warnings);
    assert!(registry.writes().is_empty());
}

#[test]
fn dangling_alias_counts_as_no_champion() {
    let registry = InMemoryRegistry::new();
    registry.register(version("1", 0.99, 0.99));
    registry.register(version("2", 0.95, 0.93));
    registry.seed_alias(MODEL, ALIAS, "1");
    registry.delete_version(MODEL, "1");

    assert_eq!(load_champion(&registry, &registry, MODEL, ALIAS).unwrap(), None);

    let notifier = CountingNotifier::delivering();
    let settings = settings();
    let report = PromotionGate::new(&settings, &registry, &registry, &notifier)
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(report.status, RunStatus::Promoted);
    assert!(report.champion.is_none());
    assert_eq!(registry.alias_target(MODEL, ALIAS).as_deref(), Some("2"));
}

#[test]
fn champion_without_primary_metric_does_not_block() {
    let registry = InMemoryRegistry::new();
    registry.register(ModelVersion::new(MODEL, "1").with_metric("f1", 0.99));
    registry.register(version("2", 0.95, 0.93));
    registry.seed_alias(MODEL, ALIAS, "1");
    let notifier = CountingNotifier::delivering();
    let settings = settings();

    let report = PromotionGate::new(&settings, &registry, &registry, &notifier)
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(report.status, RunStatus::Promoted);
    let notes = report.decision.unwrap().notes;
    assert!(notes.iter().any(|n| n.contains("relative check skipped")), "{notes:?}");
}

#[test]
fn all_gated_policy_rejects_secondary_regression() {
    let gates = GateSet::new(vec![Gate::new("accuracy", 0.92), Gate::new("f1", 0.90)]).unwrap();
    let cand = metrics(&[("accuracy", 0.95), ("f1", 0.91)]);
    let champ = metrics(&[("accuracy", 0.94), ("f1", 0.93)]);

    let lenient = evaluate("2", &cand, Some(("1", &champ)), &gates, RelativePolicy::Primary).unwrap();
    assert_eq!(lenient.outcome, Outcome::Promote);
    assert_eq!(lenient.notes.len(), 1);

    let strict = evaluate("2", &cand, Some(("1", &champ)), &gates, RelativePolicy::AllGated).unwrap();
    assert_eq!(strict.outcome, Outcome::Reject);
    assert_eq!(strict.reason_codes, vec![ReasonCode::NotBetterThanChampion]);
    assert!(strict.reasons[0].starts_with("regression: f1"));
}

#[test]
fn all_gated_policy_through_settings() {
    let registry = InMemoryRegistry::new();
    registry.register(version("1", 0.90, 0.96));
    registry.register(version("2", 0.95, 0.93));
    registry.seed_alias(MODEL, ALIAS, "1");
    let notifier = CountingNotifier::delivering();
    let settings = settings_with_policy("all_gated");

    let report = PromotionGate::new(&settings, &registry, &registry, &notifier)
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(report.status, RunStatus::Rejected);
    assert_eq!(registry.alias_target(MODEL, ALIAS).as_deref(), Some("1"));
    assert_eq!(notifier.calls(), 0);
}

#[test]
fn nan_candidate_metric_fails_gate() {
    let gates = GateSet::new(vec![Gate::new("accuracy", 0.92)]).unwrap();
    let d = evaluate(
        "5",
        &metrics(&[("accuracy", f64::NAN)]),
        None,
        &gates,
        RelativePolicy::Primary,
    )
    .unwrap();
    assert_eq!(d.outcome, Outcome::Reject);
    assert_eq!(d.reason_codes, vec![ReasonCode::FailedGates]);
    assert!(!d.gate_checks[0].passed);
}

#[test]
fn evaluation_is_deterministic() {
    let gates = GateSet::new(vec![Gate::new("accuracy", 0.92), Gate::new("f1", 0.90)]).unwrap();
    let cand = metrics(&[("accuracy", 0.95), ("f1", 0.93)]);
    let champ = metrics(&[("accuracy", 0.90), ("f1", 0.88)]);

    let a = evaluate("2", &cand, Some(("1", &champ)), &gates, RelativePolicy::Primary).unwrap();
    let b = evaluate("2", &cand, Some(("1", &champ)), &gates, RelativePolicy::Primary).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.outcome, Outcome::Promote);
}
