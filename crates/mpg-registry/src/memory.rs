//! In-process registry backed by a [`RegistryState`] document.
//!
//! Used by tests and as the storage engine of [`crate::file::FileRegistry`].
//! Failure injection (`fail_set_alias`, `fail_set_tag`, `fail_reads`) lets
//! scenario tests drive the `RegistryUnavailable` paths deterministically.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::types::{Metrics, MetricsSource, ModelRegistry, ModelVersion, RegistryError};

// ---------------------------------------------------------------------------
// State document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    #[serde(default)]
    pub versions: Vec<ModelVersion>,
    /// alias -> version identifier
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

/// Serializable registry contents: `{ "models": { "<name>": { versions, aliases } } }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryState {
    #[serde(default)]
    pub models: BTreeMap<String, ModelEntry>,
}

impl RegistryState {
    pub fn list_versions(&self, model_name: &str) -> Vec<ModelVersion> {
        self.models
            .get(model_name)
            .map(|m| m.versions.clone())
            .unwrap_or_default()
    }

    pub fn resolve_alias(&self, model_name: &str, alias: &str) -> Result<ModelVersion, RegistryError> {
        let entry = self
            .models
            .get(model_name)
            .ok_or_else(|| RegistryError::NotFound(format!("model '{model_name}'")))?;
        let target = entry
            .aliases
            .get(alias)
            .ok_or_else(|| RegistryError::NotFound(format!("alias '{alias}' on '{model_name}'")))?;
        entry
            .versions
            .iter()
            .find(|v| &v.version == target)
            .cloned()
            .ok_or_else(|| {
                RegistryError::NotFound(format!(
                    "alias '{alias}' on '{model_name}' points to missing version {target}"
                ))
            })
    }

    pub fn set_alias(&mut self, model_name: &str, alias: &str, version: &str) -> Result<(), RegistryError> {
        let entry = self
            .models
            .get_mut(model_name)
            .ok_or_else(|| RegistryError::NotFound(format!("model '{model_name}'")))?;
        if !entry.versions.iter().any(|v| v.version == version) {
            return Err(RegistryError::NotFound(format!(
                "version {version} of '{model_name}'"
            )));
        }
        entry.aliases.insert(alias.to_string(), version.to_string());
        Ok(())
    }

    pub fn set_tag(
        &mut self,
        model_name: &str,
        version: &str,
        key: &str,
        value: &str,
    ) -> Result<(), RegistryError> {
        let mv = self
            .models
            .get_mut(model_name)
            .and_then(|m| m.versions.iter_mut().find(|v| v.version == version))
            .ok_or_else(|| RegistryError::NotFound(format!("version {version} of '{model_name}'")))?;
        mv.tags.insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn get_metrics(&self, version: &ModelVersion) -> Result<Metrics, RegistryError> {
        self.models
            .get(&version.name)
            .and_then(|m| m.versions.iter().find(|v| v.version == version.version))
            .map(|v| v.metrics.clone())
            .ok_or_else(|| {
                RegistryError::NotFound(format!("version {} of '{}'", version.version, version.name))
            })
    }

    /// Register a version (replacing an existing one with the same identifier).
    pub fn register(&mut self, mv: ModelVersion) {
        let entry = self.models.entry(mv.name.clone()).or_default();
        entry.versions.retain(|v| v.version != mv.version);
        entry.versions.push(mv);
    }

    /// Delete a version out-of-band. Aliases pointing at it are left dangling,
    /// mirroring a registry whose alias cleanup lags the delete.
    pub fn delete_version(&mut self, model_name: &str, version: &str) {
        if let Some(entry) = self.models.get_mut(model_name) {
            entry.versions.retain(|v| v.version != version);
        }
    }
}

// ---------------------------------------------------------------------------
// Write log
// ---------------------------------------------------------------------------

/// A write command accepted by the in-memory registry, in issue order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryWrite {
    SetAlias {
        model: String,
        alias: String,
        version: String,
    },
    SetTag {
        model: String,
        version: String,
        key: String,
        value: String,
    },
}

// ---------------------------------------------------------------------------
// InMemoryRegistry
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Faults {
    set_alias: bool,
    set_tag: bool,
    reads: bool,
}

#[derive(Default)]
struct Inner {
    state: RegistryState,
    writes: Vec<RegistryWrite>,
    faults: Faults,
}

/// Thread-safe in-memory registry. Also implements [`MetricsSource`] from
/// the metrics stored on each version.
#[derive(Default)]
pub struct InMemoryRegistry {
    inner: Mutex<Inner>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: RegistryState) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state,
                ..Inner::default()
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means a test thread panicked mid-write; the
        // state document is still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn register(&self, mv: ModelVersion) {
        self.lock().state.register(mv);
    }

    /// Point an alias directly (test setup; not recorded in the write log).
    pub fn seed_alias(&self, model_name: &str, alias: &str, version: &str) {
        let mut inner = self.lock();
        inner
            .state
            .models
            .entry(model_name.to_string())
            .or_default()
            .aliases
            .insert(alias.to_string(), version.to_string());
    }

    pub fn delete_version(&self, model_name: &str, version: &str) {
        self.lock().state.delete_version(model_name, version);
    }

    pub fn fail_set_alias(&self, fail: bool) {
        self.lock().faults.set_alias = fail;
    }

    pub fn fail_set_tag(&self, fail: bool) {
        self.lock().faults.set_tag = fail;
    }

    pub fn fail_reads(&self, fail: bool) {
        self.lock().faults.reads = fail;
    }

    /// Accepted write commands, in issue order.
    pub fn writes(&self) -> Vec<RegistryWrite> {
        self.lock().writes.clone()
    }

    pub fn snapshot(&self) -> RegistryState {
        self.lock().state.clone()
    }

    /// Version lookup bypassing fault injection (test assertions).
    pub fn version(&self, model_name: &str, version: &str) -> Option<ModelVersion> {
        self.lock()
            .state
            .list_versions(model_name)
            .into_iter()
            .find(|v| v.version == version)
    }

    /// Alias target bypassing fault injection (test assertions).
    pub fn alias_target(&self, model_name: &str, alias: &str) -> Option<String> {
        self.lock()
            .state
            .models
            .get(model_name)
            .and_then(|m| m.aliases.get(alias).cloned())
    }
}

impl ModelRegistry for InMemoryRegistry {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn list_versions(&self, model_name: &str) -> Result<Vec<ModelVersion>, RegistryError> {
        let inner = self.lock();
        if inner.faults.reads {
            return Err(RegistryError::Unavailable("injected read fault".to_string()));
        }
        Ok(inner.state.list_versions(model_name))
    }

    fn resolve_alias(&self, model_name: &str, alias: &str) -> Result<ModelVersion, RegistryError> {
        let inner = self.lock();
        if inner.faults.reads {
            return Err(RegistryError::Unavailable("injected read fault".to_string()));
        }
        inner.state.resolve_alias(model_name, alias)
    }

    fn set_alias(&self, model_name: &str, alias: &str, version: &str) -> Result<(), RegistryError> {
        let mut inner = self.lock();
        if inner.faults.set_alias {
            return Err(RegistryError::Unavailable("injected set_alias fault".to_string()));
        }
        inner.state.set_alias(model_name, alias, version)?;
        inner.writes.push(RegistryWrite::SetAlias {
            model: model_name.to_string(),
            alias: alias.to_string(),
            version: version.to_string(),
        });
        Ok(())
    }

    fn set_tag(
        &self,
        model_name: &str,
        version: &str,
        key: &str,
        value: &str,
    ) -> Result<(), RegistryError> {
        let mut inner = self.lock();
        if inner.faults.set_tag {
            return Err(RegistryError::Unavailable("injected set_tag fault".to_string()));
        }
        inner.state.set_tag(model_name, version, key, value)?;
        inner.writes.push(RegistryWrite::SetTag {
            model: model_name.to_string(),
            version: version.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }
}

impl MetricsSource for InMemoryRegistry {
    fn get_metrics(&self, version: &ModelVersion) -> Result<Metrics, RegistryError> {
        let inner = self.lock();
        if inner.faults.reads {
            return Err(RegistryError::Unavailable("injected read fault".to_string()));
        }
        inner.state.get_metrics(version)
    }
}
