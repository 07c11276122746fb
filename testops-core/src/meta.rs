//! Run metadata persisted between migration runs.
//!
//! `steps.json` holds the Shared-Step Registry and `projects.json` the
//! projects that completed, so an interrupted migration can be resumed.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{MigrationError, Result};
use crate::promotion::SharedStepRegistry;

pub const META_PROJECTS: &str = "projects.json";
pub const META_STEPS: &str = "steps.json";

#[derive(Debug, Clone)]
pub struct MetaStore {
    dir: PathBuf,
}

impl MetaStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| MigrationError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T> {
        let path = self.dir.join(name);
        if !path.exists() {
            return Ok(T::default());
        }
        let content = fs::read(&path).map_err(|e| MigrationError::io(&path, e))?;
        Ok(serde_json::from_slice(&content)?)
    }

    fn write<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.dir.join(name);
        let tmp = self.dir.join(format!("{}.tmp", name));
        let content = serde_json::to_vec_pretty(value)?;
        fs::write(&tmp, content).map_err(|e| MigrationError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| MigrationError::io(&path, e))
    }

    /// Project id -> migrated flag.
    pub fn load_projects(&self) -> Result<BTreeMap<i64, bool>> {
        self.read(META_PROJECTS)
    }

    pub fn save_projects(&self, projects: &BTreeMap<i64, bool>) -> Result<()> {
        self.write(META_PROJECTS, projects)
    }

    pub fn load_registry(&self) -> Result<SharedStepRegistry> {
        let entries: BTreeMap<i64, i64> = self.read(META_STEPS)?;
        Ok(SharedStepRegistry::from_map(entries))
    }

    pub fn save_registry(&self, registry: &SharedStepRegistry) -> Result<()> {
        self.write(META_STEPS, &registry.snapshot())
    }
}
