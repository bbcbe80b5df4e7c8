//! mpg-config
//!
//! Layered YAML configuration for the promotion gate.
//!
//! - Documents merge in order: earlier docs are base, later docs override.
//! - The merged document is hashed (SHA-256 over canonical JSON) so every
//!   decision can be attributed to an exact configuration.
//! - Secret-looking literals are rejected; YAML stores env var NAMES only
//!   (see [`secrets`]).
//! - Typed, validated settings are produced by [`settings::PromotionSettings`].

pub mod overrides;
pub mod secrets;
pub mod settings;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;

pub use overrides::{apply_env_overrides, apply_overrides_with};
pub use secrets::{resolve_secrets, ResolvedSecrets};
pub use settings::{
    ApiSettings, AuditSettings, GateSetting, ModelSettings, PromotionSettings, RegistryKind,
    RegistrySettings, RelativePolicy, SettingsError,
};

/// Known secret-like prefixes. If any leaf string value in the effective
/// config starts with one of these, loading aborts with CONFIG_SECRET_DETECTED.
const SECRET_PREFIXES: &[&str] = &[
    "sk-",        // OpenAI style
    "AKIA",       // AWS access key ID
    "-----BEGIN", // PEM private keys
    "ghp_",       // GitHub PAT
    "gho_",       // GitHub OAuth
    "glpat-",     // GitLab PAT
    "xoxb-",      // Slack bot token
    "Bearer ",    // pasted auth header
];

/// What to do when the config carries keys nothing reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    pub registry_kind: String,
    pub consumed_prefixes: Vec<String>,
    /// JSON pointers of leaves outside every consumed prefix, sorted.
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

const COMMON_POINTERS: &[&str] = &[
    "/registry/kind",
    "/registry/timeout_secs",
    "/model",
    "/gates",
    "/relative_policy",
    "/api",
    "/audit",
];

/// JSON-pointer prefixes read by [`PromotionSettings::from_config_json`] and
/// [`resolve_secrets`] for a registry backend.
pub fn consumed_pointers_for_registry(kind: RegistryKind) -> Vec<&'static str> {
    let mut out = COMMON_POINTERS.to_vec();
    match kind {
        RegistryKind::Mlflow => out.extend(["/registry/tracking_uri", "/registry/token_env"]),
        RegistryKind::File => out.push("/registry/path"),
    }
    out.sort_unstable();
    out
}

/// List config leaves the given backend never reads. Under
/// [`UnusedKeyPolicy::Fail`] any such leaf is an error.
pub fn report_unused_keys(
    kind: RegistryKind,
    config_json: &Value,
    policy: UnusedKeyPolicy,
) -> Result<UnusedKeyReport> {
    let consumed = consumed_pointers_for_registry(kind);
    let consumed_segments: Vec<Vec<&str>> = consumed.iter().map(|p| pointer_segments(p)).collect();

    let mut unused: BTreeSet<String> = BTreeSet::new();
    for (ptr, _) in leaves(config_json) {
        let segs = pointer_segments(&ptr);
        let covered = consumed_segments
            .iter()
            .any(|prefix| segs.len() >= prefix.len() && segs[..prefix.len()] == prefix[..]);
        if !covered {
            unused.insert(ptr);
        }
    }

    let report = UnusedKeyReport {
        registry_kind: kind.as_str().to_string(),
        consumed_prefixes: consumed.iter().map(|p| p.to_string()).collect(),
        unused_leaf_pointers: unused.into_iter().collect(),
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        let preview: Vec<&str> = report
            .unused_leaf_pointers
            .iter()
            .take(12)
            .map(String::as_str)
            .collect();
        bail!(
            "CONFIG_UNUSED_KEYS (registry={}): {} key(s) not read by the promotion gate: {}",
            report.registry_kind,
            report.unused_leaf_pointers.len(),
            preview.join(", ")
        );
    }

    Ok(report)
}

/// `"/a/b"` -> `["a", "b"]`; the root pointer has no segments.
fn pointer_segments(ptr: &str) -> Vec<&str> {
    ptr.split('/').filter(|s| !s.is_empty()).collect()
}

/// Every scalar leaf as (JSON pointer, value). Empty objects and arrays
/// contribute nothing.
fn leaves(root: &Value) -> Vec<(String, &Value)> {
    let mut out = Vec::new();
    let mut stack: Vec<(String, &Value)> = vec![(String::new(), root)];
    while let Some((ptr, v)) = stack.pop() {
        match v {
            Value::Object(map) => {
                for (k, child) in map {
                    let token = k.replace('~', "~0").replace('/', "~1");
                    stack.push((format!("{ptr}/{token}"), child));
                }
            }
            Value::Array(items) => {
                for (i, child) in items.iter().enumerate() {
                    stack.push((format!("{ptr}/{i}"), child));
                }
            }
            scalar => {
                let ptr = if ptr.is_empty() { "/".to_string() } else { ptr };
                out.push((ptr, scalar));
            }
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        // An empty document parses as null; treat it as an empty layer.
        if v_yaml.is_null() {
            continue;
        }
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    finalize(merged)
}

/// Re-hash a config document after it was modified in memory (env overrides).
pub fn rehash(config_json: Value) -> Result<LoadedConfig> {
    finalize(config_json)
}

fn finalize(merged: Value) -> Result<LoadedConfig> {
    enforce_no_secret_literals(&merged)?;

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        // Arrays (e.g. `gates`) are replaced wholesale by the overriding layer.
        (_, b_other) => b_other,
    }
}

/// `serde_json::Map` is BTreeMap-backed here (no `preserve_order`), so
/// compact serialization is already key-sorted.
fn canonicalize_json(v: &Value) -> Result<String> {
    serde_json::to_string(v).context("canonical json serialize failed")
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let hit = leaves(v)
        .into_iter()
        .filter_map(|(ptr, leaf)| leaf.as_str().map(|s| (ptr, s)))
        .find(|(_, s)| looks_like_secret(s));
    if let Some((ptr, _)) = hit {
        bail!("CONFIG_SECRET_DETECTED leaf={ptr} value=REDACTED");
    }
    Ok(())
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim_start();
    (t.len() >= 8 && SECRET_PREFIXES.iter().any(|p| t.starts_with(p)))
        || looks_like_databricks_token(t)
}

/// Databricks PAT (managed MLflow): `dapi` followed by 32+ hex digits.
/// The bare prefix is too common in names (`dapipeline-clf`) to match alone.
fn looks_like_databricks_token(t: &str) -> bool {
    let Some(rest) = t.trim_end().strip_prefix("dapi") else {
        return false;
    };
    let hex_run = rest.chars().take_while(|c| c.is_ascii_hexdigit()).count();
    hex_run >= 32 && rest[hex_run..].chars().all(|c| c == '-' || c.is_ascii_digit())
}
