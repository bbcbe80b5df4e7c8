use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use mpg_config::GateSetting;
use mpg_notify::NotifyOutcome;
use mpg_registry::Metrics;
use serde::{Deserialize, Serialize};

use crate::error::PromotionError;

// ---------------------------------------------------------------------------
// Gates
// ---------------------------------------------------------------------------

/// Absolute lower bound on one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gate {
    pub metric: String,
    pub min: f64,
}

impl Gate {
    pub fn new(metric: impl Into<String>, min: f64) -> Self {
        Self {
            metric: metric.into(),
            min,
        }
    }
}

/// Ordered, non-empty gate list. The first gate's metric is the primary
/// metric used for the champion comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateSet {
    gates: Vec<Gate>,
}

impl GateSet {
    pub fn new(gates: Vec<Gate>) -> Result<Self, PromotionError> {
        if gates.is_empty() {
            return Err(PromotionError::InvalidGateSet("at least one gate is required".into()));
        }
        let mut seen = BTreeSet::new();
        for g in &gates {
            if g.metric.trim().is_empty() {
                return Err(PromotionError::InvalidGateSet("empty metric name".into()));
            }
            if !g.min.is_finite() {
                return Err(PromotionError::InvalidGateSet(format!(
                    "threshold for '{}' is not finite",
                    g.metric
                )));
            }
            if !seen.insert(g.metric.as_str()) {
                return Err(PromotionError::InvalidGateSet(format!(
                    "duplicate gate '{}'",
                    g.metric
                )));
            }
        }
        Ok(Self { gates })
    }

    pub fn from_settings(gates: &[GateSetting]) -> Result<Self, PromotionError> {
        Self::new(gates.iter().map(|g| Gate::new(g.metric.clone(), g.min)).collect())
    }

    pub fn primary(&self) -> &Gate {
        &self.gates[0]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Gate> {
        self.gates.iter()
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Promote,
    Reject,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Promote => "promote",
            Outcome::Reject => "reject",
        }
    }
}

/// Machine-readable rejection cause, written to the `rejected_reason` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    FailedGates,
    NotBetterThanChampion,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::FailedGates => "failed_gates",
            ReasonCode::NotBetterThanChampion => "not_better_than_champion",
        }
    }
}

/// Result of one absolute gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateCheck {
    pub metric: String,
    pub min: f64,
    pub value: f64,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub outcome: Outcome,
    /// Human-readable reasons, gate order first, then relative comparison.
    pub reasons: Vec<String>,
    /// Advisory observations that did not affect the outcome.
    #[serde(default)]
    pub notes: Vec<String>,
    /// Empty when promoting.
    #[serde(default)]
    pub reason_codes: Vec<ReasonCode>,
    pub gate_checks: Vec<GateCheck>,
    pub candidate_version: String,
    pub champion_version: Option<String>,
}

impl Decision {
    pub fn is_promote(&self) -> bool {
        self.outcome == Outcome::Promote
    }

    pub fn reasons_joined(&self) -> String {
        self.reasons.join("; ")
    }

    pub fn reason_codes_joined(&self) -> String {
        self.reason_codes
            .iter()
            .map(ReasonCode::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Promoted,
    Rejected,
    /// The newest version already holds the alias; nothing was written.
    AlreadyChampion,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Promoted => "promoted",
            RunStatus::Rejected => "rejected",
            RunStatus::AlreadyChampion => "already_champion",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionMetrics {
    pub version: String,
    pub metrics: Metrics,
}

/// Everything one invocation decided and did. Serialized to
/// `promotion_report.json` and into the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionReport {
    pub model: String,
    pub alias: String,
    pub registry_backend: String,
    pub status: RunStatus,
    pub candidate: VersionMetrics,
    pub champion: Option<VersionMetrics>,
    /// `None` when the run short-circuited before deciding.
    pub decision: Option<Decision>,
    /// `None` unless the candidate was promoted.
    pub notify: Option<NotifyOutcome>,
    /// Non-fatal problems (tag writes after a repoint, reload failures).
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
}

/// Write the report as pretty-printed JSON to `out_dir/promotion_report.json`.
pub fn write_promotion_report_json(out_dir: &Path, report: &PromotionReport) -> io::Result<PathBuf> {
    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join("promotion_report.json");
    let json = serde_json::to_string_pretty(report).map_err(io::Error::other)?;
    std::fs::write(&path, json)?;
    Ok(path)
}
