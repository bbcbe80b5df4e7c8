//! `mpg promote` against a file-backed registry.
//!
//! GREEN when:
//! - PROMOTE and REJECT both exit 0 and print `status=...`.
//! - The alias in the registry file moves only on PROMOTE.
//! - Config, no-candidate, missing-metric and registry failures exit 2/3/4/5.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};

struct Fixture {
    dir: tempfile::TempDir,
}

impl Fixture {
    fn new(registry: Value) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("registry.json"),
            serde_json::to_string_pretty(&registry).unwrap(),
        )
        .unwrap();
        let f = Self { dir };
        f.write_config("");
        f
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Base config plus extra YAML appended at top level.
    fn write_config(&self, extra: &str) {
        let yaml = format!(
            "registry:\n  kind: file\n  path: {}\nmodel:\n  name: iris\n  alias: production\ngates:\n  - {{ metric: accuracy, min: 0.92 }}\n  - {{ metric: f1, min: 0.90 }}\n{extra}",
            self.path("registry.json").display()
        );
        std::fs::write(self.path("config.yaml"), yaml).unwrap();
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("mpg").unwrap();
        cmd.current_dir(self.dir.path())
            .env_remove("MPG_MODEL_NAME")
            .env_remove("MPG_ALIAS")
            .env_remove("MPG_RELOAD_URL")
            .env_remove("MPG_TRACKING_URI")
            .env_remove("MPG_GATE_ACCURACY")
            .env_remove("MPG_GATE_F1");
        cmd
    }

    fn promote(&self) -> Command {
        let mut cmd = self.cmd();
        cmd.arg("promote")
            .arg("--config")
            .arg(self.path("config.yaml"));
        cmd
    }

    fn registry(&self) -> Value {
        serde_json::from_str(&std::fs::read_to_string(self.path("registry.json")).unwrap()).unwrap()
    }
}

fn version(v: &str, accuracy: f64, f1: f64) -> Value {
    json!({ "name": "iris", "version": v, "metrics": { "accuracy": accuracy, "f1": f1 }, "tags": {} })
}

fn registry_doc(versions: Vec<Value>, alias: Option<&str>) -> Value {
    let aliases = match alias {
        Some(v) => json!({ "production": v }),
        None => json!({}),
    };
    json!({ "models": { "iris": { "versions": versions, "aliases": aliases } } })
}

fn alias_of(doc: &Value) -> Option<&str> {
    doc["models"]["iris"]["aliases"]["production"].as_str()
}

#[test]
fn better_candidate_is_promoted() {
    let f = Fixture::new(registry_doc(
        vec![version("1", 0.90, 0.88), version("2", 0.95, 0.93)],
        Some("1"),
    ));

    f.promote()
        .assert()
        .success()
        .stdout(predicate::str::contains("status=promoted"))
        .stdout(predicate::str::contains("candidate_version=2"))
        .stdout(predicate::str::contains("champion_version=1"))
        .stdout(predicate::str::contains("notify=not_configured"))
        .stdout(predicate::str::contains("config_hash="));

    let doc = f.registry();
    assert_eq!(alias_of(&doc), Some("2"));
    assert_eq!(doc["models"]["iris"]["versions"][1]["tags"]["decision"], "promoted");
}

#[test]
fn failing_candidate_is_rejected_with_success_exit() {
    let f = Fixture::new(registry_doc(
        vec![version("1", 0.85, 0.80), version("2", 0.90, 0.95)],
        Some("1"),
    ));

    f.promote()
        .assert()
        .code(0)
        .stdout(predicate::str::contains("status=rejected"))
        .stdout(predicate::str::contains("rejected_reason=failed_gates"));

    let doc = f.registry();
    assert_eq!(alias_of(&doc), Some("1"));
    let tags = &doc["models"]["iris"]["versions"][1]["tags"];
    assert_eq!(tags["decision"], "rejected");
    assert_eq!(tags["rejected_reason"], "failed_gates");
}

#[test]
fn already_champion_exits_zero() {
    let f = Fixture::new(registry_doc(vec![version("3", 0.95, 0.93)], Some("3")));
    f.promote()
        .assert()
        .success()
        .stdout(predicate::str::contains("status=already_champion"));
}

#[test]
fn empty_registry_exits_three() {
    let f = Fixture::new(json!({ "models": {} }));
    f.promote()
        .assert()
        .code(3)
        .stderr(predicate::str::contains("NO_CANDIDATE_FOUND"));
}

#[test]
fn missing_metric_exits_four() {
    let f = Fixture::new(registry_doc(
        vec![json!({ "name": "iris", "version": "1", "metrics": { "accuracy": 0.99 } })],
        None,
    ));
    f.promote()
        .assert()
        .code(4)
        .stderr(predicate::str::contains("metric=f1"));
}

#[test]
fn unreadable_registry_exits_five() {
    let f = Fixture::new(json!({ "models": {} }));
    std::fs::remove_file(f.path("registry.json")).unwrap();
    f.promote().assert().code(5);
}

#[test]
fn missing_config_file_exits_two() {
    let f = Fixture::new(json!({ "models": {} }));
    f.cmd()
        .args(["promote", "--config", "does-not-exist.yaml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("CONFIG_ERROR"));
}

#[test]
fn empty_gate_list_exits_two() {
    let f = Fixture::new(json!({ "models": {} }));
    std::fs::write(f.path("override.yaml"), "gates: []\n").unwrap();
    f.promote()
        .arg("--config")
        .arg(f.path("override.yaml"))
        .assert()
        .code(2);
}

#[test]
fn strict_config_rejects_unknown_keys() {
    let f = Fixture::new(registry_doc(vec![version("1", 0.95, 0.93)], None));
    f.write_config("extras:\n  owner: ml-team\n");

    f.promote().assert().success();
    f.promote().arg("--strict-config").assert().code(2);
}

#[test]
fn gate_override_from_environment_applies() {
    let f = Fixture::new(registry_doc(vec![version("1", 0.95, 0.93)], None));
    f.promote()
        .env("MPG_GATE_ACCURACY", "0.99")
        .assert()
        .success()
        .stdout(predicate::str::contains("status=rejected"));
    assert_eq!(alias_of(&f.registry()), None);
}

fn assert_file_exists(p: &Path) {
    assert!(p.exists(), "{} missing", p.display());
}

#[test]
fn report_and_audit_are_written_and_verifiable() {
    let f = Fixture::new(registry_doc(
        vec![version("1", 0.90, 0.88), version("2", 0.95, 0.93)],
        Some("1"),
    ));
    let audit = f.path("audit/promotion_audit.jsonl");
    f.write_config(&format!("audit:\n  path: {}\n", audit.display()));

    f.promote()
        .arg("--report-out")
        .arg(f.path("out"))
        .assert()
        .success()
        .stdout(predicate::str::contains("report_path="));

    let report_path = f.path("out/promotion_report.json");
    assert_file_exists(&report_path);
    let report: Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report["status"], "promoted");
    assert_eq!(report["registry_backend"], "file");

    // Second run: candidate now holds the alias.
    f.promote()
        .assert()
        .success()
        .stdout(predicate::str::contains("status=already_champion"));

    f.cmd()
        .args(["audit", "verify", "--path"])
        .arg(&audit)
        .assert()
        .success()
        .stdout(predicate::str::contains("audit_valid=true lines=2"));
}

#[test]
fn unwritable_report_dir_keeps_promotion_exit_zero() {
    let f = Fixture::new(registry_doc(
        vec![version("1", 0.90, 0.88), version("2", 0.95, 0.93)],
        Some("1"),
    ));
    // A regular file where the report directory should go.
    let blocker = f.path("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();

    f.promote()
        .arg("--report-out")
        .arg(&blocker)
        .assert()
        .success()
        .stdout(predicate::str::contains("status=promoted"))
        .stdout(predicate::str::contains("warning=report write failed"))
        .stdout(predicate::str::contains("report_path=").not());

    assert_eq!(alias_of(&f.registry()), Some("2"));
}
