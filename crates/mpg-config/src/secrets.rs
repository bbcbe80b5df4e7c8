//! Runtime secret resolution.
//!
//! # Contract
//! - Config YAML stores only **env var NAMES** (e.g. `api.reload_token_env: "RELOAD_TOKEN"`).
//! - At startup the CLI calls [`resolve_secrets`] once and passes the result
//!   into constructors; no other module reads `std::env` for secrets.
//! - `Debug` output redacts values; errors name the variable, never the value.
//!
//! Both secrets are optional: an unset or blank variable resolves to `None`
//! and the corresponding request goes out without an `Authorization` header.

use tracing::warn;

use crate::settings::PromotionSettings;

/// Secrets resolved for one invocation. **Values are redacted in `Debug` output.**
#[derive(Clone, Default)]
pub struct ResolvedSecrets {
    /// Bearer token for the model registry / tracking server.
    pub registry_token: Option<String>,
    /// Bearer token for the serving process reload hook.
    pub reload_token: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field(
                "registry_token",
                &self.registry_token.as_ref().map(|_| "<REDACTED>"),
            )
            .field(
                "reload_token",
                &self.reload_token.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

/// Resolve a named environment variable. `None` if unset or blank.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

/// Resolve all secrets named by `settings` from the process environment.
pub fn resolve_secrets(settings: &PromotionSettings) -> ResolvedSecrets {
    resolve_secrets_with(settings, resolve_env)
}

/// Same as [`resolve_secrets`] with an injectable lookup (tests pass a map).
pub fn resolve_secrets_with<F>(settings: &PromotionSettings, lookup: F) -> ResolvedSecrets
where
    F: Fn(&str) -> Option<String>,
{
    let resolve_named = |field: &str, var: Option<&str>| -> Option<String> {
        let var = var.map(str::trim).filter(|v| !v.is_empty())?;
        let value = lookup(var).filter(|v| !v.trim().is_empty());
        if value.is_none() {
            warn!(field, env_var = var, "secret env var is not set or empty; continuing without it");
        }
        value
    };

    ResolvedSecrets {
        registry_token: resolve_named("registry.token_env", settings.registry.token_env.as_deref()),
        reload_token: resolve_named("api.reload_token_env", settings.api.reload_token_env.as_deref()),
    }
}
