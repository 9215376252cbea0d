//! Locked, atomically persisted access to the registry file.

use crate::error::{DualError, Result};
use crate::lock::{RegistryLock, LOCK_TIMEOUT, REGISTRY_FILE, STATE_DIR};
use crate::types::{Context, Registry};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Returns `<project_root>/.dual/registry.json`.
pub fn registry_path(project_root: impl AsRef<Path>) -> PathBuf {
    project_root.as_ref().join(STATE_DIR).join(REGISTRY_FILE)
}

/// Canonicalizes a repository root into its registry key.
pub fn canonical_project_id(path: impl AsRef<Path>) -> Result<String> {
    let canonical = fs::canonicalize(path.as_ref())?;
    Ok(canonical.to_string_lossy().into_owned())
}

/// Handle on a project's registry.
///
/// Holds the registry lock from [`RegistryStore::load`] until
/// [`RegistryStore::close`] (or drop). Mutations stay in memory until
/// [`RegistryStore::save`]; closing never saves implicitly.
///
/// # Examples
///
/// ```no_run
/// use dual_core::RegistryStore;
///
/// let mut store = RegistryStore::load(".").unwrap();
/// store.set_context("/work/app", "main", 4100, "/work/app");
/// store.save().unwrap();
/// store.close().unwrap();
/// ```
#[derive(Debug)]
pub struct RegistryStore {
    path: PathBuf,
    registry: Registry,
    lock: RegistryLock,
}

impl RegistryStore {
    /// Locks and loads the registry of `project_root`, waiting up to
    /// [`LOCK_TIMEOUT`] for the lock.
    ///
    /// A missing registry file loads as an empty registry.
    pub fn load(project_root: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_timeout(project_root, LOCK_TIMEOUT)
    }

    /// Like [`RegistryStore::load`] with an explicit lock timeout.
    ///
    /// # Errors
    ///
    /// Returns `LockTimeout` if the lock is still held elsewhere after
    /// `timeout`, `CorruptedRegistry` if the file cannot be parsed, and `Io`
    /// for read failures. The lock is released on every error path.
    pub fn load_with_timeout(project_root: impl AsRef<Path>, timeout: Duration) -> Result<Self> {
        let root = project_root.as_ref();
        let lock = RegistryLock::acquire(root, timeout)?;
        let path = registry_path(root);
        let registry = read_registry(&path)?;

        debug!(
            path = %path.display(),
            projects = registry.projects.len(),
            "loaded registry"
        );

        Ok(Self {
            path,
            registry,
            lock,
        })
    }

    /// Writes the in-memory registry to disk atomically.
    ///
    /// Uses temp file + fsync + rename, so readers see either the previous
    /// or the new document, never a partial one.
    pub fn save(&self) -> Result<()> {
        if !self.lock.is_held() {
            return Err(DualError::RegistryClosed);
        }

        let data = serde_json::to_vec_pretty(&self.registry)
            .map_err(|e| DualError::Serialization(e.to_string()))?;
        write_atomic(&self.path, &data)?;

        debug!(path = %self.path.display(), bytes = data.len(), "saved registry");
        Ok(())
    }

    /// Releases the lock. Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        self.lock.release()
    }

    /// Returns true once the handle has been closed.
    pub fn is_closed(&self) -> bool {
        !self.lock.is_held()
    }

    /// Path of the registry file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read-only snapshot for the allocator and conflict detector.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mutable access to the in-memory registry.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// See [`Registry::get_context`].
    pub fn get_context(&self, project: &str, name: &str) -> Result<&Context> {
        self.registry.get_context(project, name)
    }

    /// See [`Registry::set_context`].
    pub fn set_context(
        &mut self,
        project: &str,
        name: &str,
        base_port: u16,
        path: impl Into<String>,
    ) -> Context {
        self.registry.set_context(project, name, base_port, path)
    }

    /// See [`Registry::list_contexts`].
    pub fn list_contexts(&self, project: &str) -> Result<&BTreeMap<String, Context>> {
        self.registry.list_contexts(project)
    }

    /// See [`Registry::delete_context`].
    pub fn delete_context(&mut self, project: &str, name: &str) -> Result<Context> {
        self.registry.delete_context(project, name)
    }
}

/// Reads and parses the registry file, treating absence as empty.
fn read_registry(path: &Path) -> Result<Registry> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Registry::new()),
        Err(e) => return Err(DualError::Io(e)),
    };

    if content.trim().is_empty() {
        return Ok(Registry::new());
    }

    serde_json::from_str(&content).map_err(|e| DualError::CorruptedRegistry {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Writes `data` to `path` via a sibling temp file and rename.
fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp_path = tmp_path_for(path);

    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(data)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
    }

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(DualError::Io(e));
    }

    #[cfg(unix)]
    {
        if let Some(parent) = path.parent() {
            if let Ok(dir_file) = File::open(parent) {
                let _ = dir_file.sync_all();
            }
        }
    }

    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
