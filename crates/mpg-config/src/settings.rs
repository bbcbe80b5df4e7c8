//! Typed promotion settings.
//!
//! Built once at startup from the merged config JSON and passed by reference
//! into the registry adapter, the decision engine, and the alias manager.
//! Nothing downstream reads the environment or the raw JSON again.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const DEFAULT_ALIAS: &str = "production";
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("CONFIG_MALFORMED: {0}")]
    Malformed(String),
    #[error("CONFIG_INVALID: model.name must be non-empty")]
    EmptyModelName,
    #[error("CONFIG_INVALID: model.alias must be non-empty")]
    EmptyAlias,
    #[error("CONFIG_INVALID: at least one gate is required (the first gate names the primary metric)")]
    NoGates,
    #[error("CONFIG_INVALID: gate #{index} has an empty metric name")]
    EmptyGateMetric { index: usize },
    #[error("CONFIG_INVALID: gate metric '{0}' is declared more than once")]
    DuplicateGate(String),
    #[error("CONFIG_INVALID: gate '{metric}' threshold {value} is not finite")]
    NonFiniteThreshold { metric: String, value: f64 },
    #[error("CONFIG_INVALID: registry.tracking_uri is required for registry.kind=mlflow")]
    MissingTrackingUri,
    #[error("CONFIG_INVALID: registry.path is required for registry.kind=file")]
    MissingRegistryPath,
    #[error("CONFIG_INVALID: {field} is not a valid http(s) url: {reason}")]
    InvalidUrl { field: &'static str, reason: String },
    #[error("CONFIG_INVALID: {field} must be greater than zero")]
    ZeroTimeout { field: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryKind {
    Mlflow,
    File,
}

impl RegistryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryKind::Mlflow => "mlflow",
            RegistryKind::File => "file",
        }
    }
}

/// How the candidate is compared against the current champion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelativePolicy {
    /// Only the primary (first gate's) metric decides; other regressions are noted.
    #[default]
    Primary,
    /// Every gated metric present on both versions must not regress.
    AllGated,
}

impl RelativePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelativePolicy::Primary => "primary",
            RelativePolicy::AllGated => "all_gated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistrySettings {
    pub kind: RegistryKind,
    #[serde(default)]
    pub tracking_uri: Option<String>,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Name of the env var holding the registry bearer token.
    #[serde(default)]
    pub token_env: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelSettings {
    pub name: String,
    #[serde(default = "default_alias")]
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateSetting {
    pub metric: String,
    pub min: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiSettings {
    #[serde(default)]
    pub reload_url: Option<String>,
    /// Name of the env var holding the reload bearer token.
    #[serde(default)]
    pub reload_token_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_true")]
    pub retry: bool,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            reload_url: None,
            reload_token_env: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry: true,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditSettings {
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub hash_chain: bool,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            path: None,
            hash_chain: true,
        }
    }
}

/// Immutable settings for one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionSettings {
    pub registry: RegistrySettings,
    pub model: ModelSettings,
    pub gates: Vec<GateSetting>,
    #[serde(default)]
    pub relative_policy: RelativePolicy,
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub audit: AuditSettings,
}

impl PromotionSettings {
    /// Deserialize and validate settings from a merged config document.
    pub fn from_config_json(config_json: &Value) -> Result<Self, SettingsError> {
        let settings: PromotionSettings = serde_json::from_value(config_json.clone())
            .map_err(|e| SettingsError::Malformed(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.model.name.trim().is_empty() {
            return Err(SettingsError::EmptyModelName);
        }
        if self.model.alias.trim().is_empty() {
            return Err(SettingsError::EmptyAlias);
        }

        if self.gates.is_empty() {
            return Err(SettingsError::NoGates);
        }
        let mut seen = BTreeSet::new();
        for (index, gate) in self.gates.iter().enumerate() {
            if gate.metric.trim().is_empty() {
                return Err(SettingsError::EmptyGateMetric { index });
            }
            if !gate.min.is_finite() {
                return Err(SettingsError::NonFiniteThreshold {
                    metric: gate.metric.clone(),
                    value: gate.min,
                });
            }
            if !seen.insert(gate.metric.as_str()) {
                return Err(SettingsError::DuplicateGate(gate.metric.clone()));
            }
        }

        match self.registry.kind {
            RegistryKind::Mlflow => {
                let uri = self
                    .registry
                    .tracking_uri
                    .as_deref()
                    .filter(|s| !s.trim().is_empty())
                    .ok_or(SettingsError::MissingTrackingUri)?;
                check_http_url("registry.tracking_uri", uri)?;
            }
            RegistryKind::File => {
                if self.registry.path.is_none() {
                    return Err(SettingsError::MissingRegistryPath);
                }
            }
        }
        if self.registry.timeout_secs == 0 {
            return Err(SettingsError::ZeroTimeout {
                field: "registry.timeout_secs",
            });
        }

        if let Some(url) = self.api.reload_url.as_deref() {
            check_http_url("api.reload_url", url)?;
        }
        if self.api.timeout_secs == 0 {
            return Err(SettingsError::ZeroTimeout {
                field: "api.timeout_secs",
            });
        }

        Ok(())
    }

    /// The metric named by the first gate.
    pub fn primary_metric(&self) -> &str {
        // validate() guarantees at least one gate.
        self.gates.first().map(|g| g.metric.as_str()).unwrap_or("")
    }
}

fn check_http_url(field: &'static str, raw: &str) -> Result<(), SettingsError> {
    let url = reqwest::Url::parse(raw.trim()).map_err(|e| SettingsError::InvalidUrl {
        field,
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(SettingsError::InvalidUrl {
            field,
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

fn default_alias() -> String {
    DEFAULT_ALIAS.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

fn default_true() -> bool {
    true
}
