//! JSON-file registry for offline use and CLI scenarios.
//!
//! Every call re-reads the file so concurrent edits by other tools are seen;
//! every mutation rewrites it atomically (temp file + rename), so a reader
//! never observes a half-written alias map.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::memory::RegistryState;
use crate::types::{Metrics, MetricsSource, ModelRegistry, ModelVersion, RegistryError};

#[derive(Debug, Clone)]
pub struct FileRegistry {
    path: PathBuf,
}

impl FileRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<RegistryState, RegistryError> {
        let raw = fs::read_to_string(&self.path).map_err(|e| {
            RegistryError::Unavailable(format!("read {}: {e}", self.path.display()))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| RegistryError::Decode(format!("{}: {e}", self.path.display())))
    }

    pub fn save(&self, state: &RegistryState) -> Result<(), RegistryError> {
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| RegistryError::Decode(e.to_string()))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, format!("{json}\n")).map_err(|e| {
            RegistryError::Unavailable(format!("write {}: {e}", tmp.display()))
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            RegistryError::Unavailable(format!("rename into {}: {e}", self.path.display()))
        })?;
        debug!(path = %self.path.display(), "registry file rewritten");
        Ok(())
    }

    fn mutate<F>(&self, f: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut RegistryState) -> Result<(), RegistryError>,
    {
        let mut state = self.load()?;
        f(&mut state)?;
        self.save(&state)
    }
}

impl ModelRegistry for FileRegistry {
    fn backend(&self) -> &'static str {
        "file"
    }

    fn list_versions(&self, model_name: &str) -> Result<Vec<ModelVersion>, RegistryError> {
        Ok(self.load()?.list_versions(model_name))
    }

    fn resolve_alias(&self, model_name: &str, alias: &str) -> Result<ModelVersion, RegistryError> {
        self.load()?.resolve_alias(model_name, alias)
    }

    fn set_alias(&self, model_name: &str, alias: &str, version: &str) -> Result<(), RegistryError> {
        self.mutate(|s| s.set_alias(model_name, alias, version))
    }

    fn set_tag(
        &self,
        model_name: &str,
        version: &str,
        key: &str,
        value: &str,
    ) -> Result<(), RegistryError> {
        self.mutate(|s| s.set_tag(model_name, version, key, value))
    }
}

impl MetricsSource for FileRegistry {
    fn get_metrics(&self, version: &ModelVersion) -> Result<Metrics, RegistryError> {
        self.load()?.get_metrics(version)
    }
}
