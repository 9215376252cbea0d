//! CLI commands.

use anyhow::{bail, Context as _, Result};
use dual_core::{canonical_project_id, find_project_root, Config, Registry, CONFIG_FILE};
use std::path::{Path, PathBuf};
use tracing::debug;

pub mod create;
pub mod delete;
pub mod doctor;
pub mod list;
pub mod ports;

/// Where the project lives and what it runs.
pub struct ProjectEnv {
    /// Directory holding dual.config.yml and .dual/.
    pub root: PathBuf,
    /// Registry key of the project.
    pub id: String,
    /// Parsed config.
    pub config: Config,
}

impl ProjectEnv {
    /// Uses `explicit` or searches upward from the current directory.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        let root = match explicit {
            Some(dir) => dir.to_path_buf(),
            None => find_project_root(&cwd).with_context(|| {
                format!("No {} found in {} or any parent", CONFIG_FILE, cwd.display())
            })?,
        };

        let id = canonical_project_id(&root)
            .with_context(|| format!("Failed to resolve project root {}", root.display()))?;
        let config = Config::load(&root)?;
        debug!(root = %root.display(), project = %id, services = config.num_services(), "resolved project");

        Ok(Self { root, id, config })
    }
}

/// Picks the named context, or the one whose working tree holds the cwd.
pub fn resolve_context(registry: &Registry, project: &ProjectEnv, name: Option<&str>) -> Result<String> {
    if let Some(name) = name {
        return Ok(name.to_string());
    }

    let cwd = std::env::current_dir()?.canonicalize()?;
    match registry.find_context_by_path(&project.id, &cwd) {
        Some((name, _)) => Ok(name.to_string()),
        None => bail!(
            "The current directory is not inside a registered context. Pass the context name explicitly."
        ),
    }
}
