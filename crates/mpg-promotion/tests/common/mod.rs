#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use mpg_config::PromotionSettings;
use mpg_notify::{NotifyOutcome, ReloadNotifier};
use mpg_registry::{InMemoryRegistry, ModelVersion};
use serde_json::json;

pub const MODEL: &str = "iris-classifier";
pub const ALIAS: &str = "production";

/// Records how often it was asked to signal and answers with a fixed outcome.
pub struct CountingNotifier {
    calls: AtomicUsize,
    outcome: NotifyOutcome,
}

impl CountingNotifier {
    pub fn delivering() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            outcome: NotifyOutcome::Delivered {
                http_status: 200,
                attempts: 1,
            },
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            outcome: NotifyOutcome::Failed {
                reason: "http status=502".to_string(),
                attempts: 2,
            },
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ReloadNotifier for CountingNotifier {
    fn notify(&self) -> NotifyOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

/// Gates `accuracy >= 0.92` (primary) and `f1 >= 0.90`.
pub fn settings() -> PromotionSettings {
    settings_with_policy("primary")
}

pub fn settings_with_policy(policy: &str) -> PromotionSettings {
    PromotionSettings::from_config_json(&json!({
        "registry": { "kind": "file", "path": "unused.json" },
        "model": { "name": MODEL, "alias": ALIAS },
        "gates": [
            { "metric": "accuracy", "min": 0.92 },
            { "metric": "f1", "min": 0.90 }
        ],
        "relative_policy": policy
    }))
    .unwrap()
}

pub fn version(v: &str, accuracy: f64, f1: f64) -> ModelVersion {
    ModelVersion::new(MODEL, v)
        .with_metric("accuracy", accuracy)
        .with_metric("f1", f1)
}

/// Registry with champion v1 `{0.90, 0.88}` on the alias and candidate v2.
pub fn registry_with_champion(candidate_accuracy: f64, candidate_f1: f64) -> InMemoryRegistry {
    let r = InMemoryRegistry::new();
    r.register(version("1", 0.90, 0.88));
    r.register(version("2", candidate_accuracy, candidate_f1));
    r.seed_alias(MODEL, ALIAS, "1");
    r
}
