use anyhow::{Context, Result};
use dual_core::{canonical_project_id, registry_path, Config, Registry, RegistryStore, CONFIG_FILE};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

const DEFAULT_CONFIG: &str = "\
version: 1
services:
  api:
    path: apps/api
  web:
    path: apps/web
    envFile: .env.local
  worker:
    path: apps/worker
";

/// Isolated project root with a config file
pub struct TestProject {
    dir: TempDir,
    id: String,
}

impl TestProject {
    /// Create a project with the default three-service config
    pub fn new() -> Result<Self> {
        Self::with_config(DEFAULT_CONFIG)
    }

    /// Create a project with a custom config document
    pub fn with_config(yaml: &str) -> Result<Self> {
        let dir = TempDir::new().context("Failed to create temp directory")?;
        fs::write(dir.path().join(CONFIG_FILE), yaml).context("Failed to write config")?;
        let id = canonical_project_id(dir.path())?;
        Ok(Self { dir, id })
    }

    /// Project root path
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Registry key of this project
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Parsed config
    pub fn config(&self) -> Result<Config> {
        Ok(Config::load(self.root())?)
    }

    /// Create a directory standing in for a worktree
    pub fn worktree(&self, name: &str) -> Result<PathBuf> {
        let path = self.root().join("worktrees").join(name);
        fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Open the registry with a short lock timeout
    pub fn open(&self, timeout: Duration) -> dual_core::Result<RegistryStore> {
        RegistryStore::load_with_timeout(self.root(), timeout)
    }

    /// Parse the registry file straight from disk, bypassing the lock
    pub fn read_raw(&self) -> Result<Registry> {
        let content = fs::read_to_string(registry_path(self.root()))?;
        Ok(serde_json::from_str(&content)?)
    }
}
