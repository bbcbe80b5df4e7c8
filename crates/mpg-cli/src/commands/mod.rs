//! Command handlers for the `mpg` binary.
//!
//! Shared plumbing (tracing, config loading, exit codes) lives here; the
//! promote flow lives in [`promote`].

pub mod promote;

use anyhow::Result;
use mpg_config::{LoadedConfig, PromotionSettings, UnusedKeyPolicy};
use mpg_promotion::PromotionError;
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Logs go to stderr; stdout carries only `key=value` results.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

// ---------------------------------------------------------------------------
// Exit codes
// ---------------------------------------------------------------------------

/// Marks an error raised while loading or validating configuration.
#[derive(Debug, Error)]
#[error("CONFIG_ERROR {0:#}")]
pub struct ConfigError(anyhow::Error);

impl ConfigError {
    pub fn wrap(err: anyhow::Error) -> anyhow::Error {
        anyhow::Error::new(ConfigError(err))
    }
}

/// 2 config, 3 no candidate, 4 missing metric, 5 registry unavailable,
/// 1 anything else.
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<ConfigError>().is_some() {
        return 2;
    }
    match err.downcast_ref::<PromotionError>() {
        Some(p) => u8::try_from(p.exit_code()).unwrap_or(1),
        None => 1,
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Merge the YAML layers and apply `MPG_*` environment overrides.
pub fn load_config(paths: &[String]) -> Result<LoadedConfig> {
    let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let mut loaded = mpg_config::load_layered_yaml(&refs)?;

    let applied = mpg_config::apply_env_overrides(&mut loaded.config_json)?;
    if !applied.is_empty() {
        info!(overrides = ?applied, "environment overrides applied");
        loaded = mpg_config::rehash(loaded.config_json)?;
    }
    Ok(loaded)
}

/// Load, validate, and check for unused keys.
pub fn load_settings(
    paths: &[String],
    policy: UnusedKeyPolicy,
) -> Result<(PromotionSettings, LoadedConfig)> {
    let loaded = load_config(paths)?;
    let settings = PromotionSettings::from_config_json(&loaded.config_json)?;

    let report = mpg_config::report_unused_keys(settings.registry.kind, &loaded.config_json, policy)?;
    if !report.is_clean() {
        warn!(
            registry = %report.registry_kind,
            unused = ?report.unused_leaf_pointers,
            "config contains keys the promotion gate does not read"
        );
    }

    info!(config_hash = %loaded.config_hash, model = %settings.model.name, "config loaded");
    Ok((settings, loaded))
}
