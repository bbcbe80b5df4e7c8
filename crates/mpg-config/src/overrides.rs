//! Environment overrides applied on top of the merged YAML layers.
//!
//! CI jobs point the same config files at different tracking servers and
//! thresholds by exporting a handful of variables:
//!
//! | Variable             | Pointer                  |
//! |----------------------|--------------------------|
//! | `MPG_TRACKING_URI`   | `/registry/tracking_uri` |
//! | `MPG_MODEL_NAME`     | `/model/name`            |
//! | `MPG_ALIAS`          | `/model/alias`           |
//! | `MPG_RELOAD_URL`     | `/api/reload_url`        |
//! | `MPG_GATE_<METRIC>`  | `/gates/<i>/min` for the gate whose metric matches |
//!
//! `<METRIC>` is the gate metric uppercased with every non-alphanumeric
//! character replaced by `_` (`f1_macro` -> `MPG_GATE_F1_MACRO`). Overrides
//! only adjust gates that already exist; they never add one.

use anyhow::{anyhow, bail, Result};
use serde_json::{Map, Value};

const STRING_OVERRIDES: &[(&str, &str, &str)] = &[
    ("MPG_TRACKING_URI", "registry", "tracking_uri"),
    ("MPG_MODEL_NAME", "model", "name"),
    ("MPG_ALIAS", "model", "alias"),
    ("MPG_RELOAD_URL", "api", "reload_url"),
];

pub const GATE_OVERRIDE_PREFIX: &str = "MPG_GATE_";

/// Apply overrides from the process environment. Returns the names of the
/// variables that were applied (values are not returned; they may be URLs
/// carrying credentials).
pub fn apply_env_overrides(config_json: &mut Value) -> Result<Vec<String>> {
    apply_overrides_with(config_json, |k| std::env::var(k).ok())
}

/// Same as [`apply_env_overrides`] with an injectable lookup.
pub fn apply_overrides_with<F>(config_json: &mut Value, lookup: F) -> Result<Vec<String>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut applied = Vec::new();
    let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    for &(var, section, key) in STRING_OVERRIDES {
        if let Some(value) = get(var) {
            let root = config_json
                .as_object_mut()
                .ok_or_else(|| anyhow!("config root must be a mapping"))?;
            let section_obj = root
                .entry(section.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            match section_obj {
                Value::Object(map) => {
                    map.insert(key.to_string(), Value::String(value));
                }
                _ => bail!("cannot apply {var}: /{section} is not a mapping"),
            }
            applied.push(var.to_string());
        }
    }

    if let Some(Value::Array(gates)) = config_json.get_mut("gates") {
        for gate in gates.iter_mut() {
            let Some(metric) = gate.get("metric").and_then(Value::as_str) else {
                continue;
            };
            let var = gate_override_var(metric);
            if let Some(raw) = get(var.as_str()) {
                let min: f64 = raw
                    .parse()
                    .map_err(|_| anyhow!("{var} must be a number, got '{raw}'"))?;
                if !min.is_finite() {
                    bail!("{var} must be finite, got '{raw}'");
                }
                gate["min"] = serde_json::json!(min);
                applied.push(var);
            }
        }
    }

    Ok(applied)
}

/// Env var name overriding the threshold of the gate on `metric`.
pub fn gate_override_var(metric: &str) -> String {
    let suffix: String = metric
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{GATE_OVERRIDE_PREFIX}{suffix}")
}
