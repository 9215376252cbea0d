//! Project configuration (`dual.config.yml`).
//!
//! Only the parts the port engine needs are modeled here: the schema version
//! and the service table.

use crate::error::{DualError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Config file name at the project root.
pub const CONFIG_FILE: &str = "dual.config.yml";

/// Supported schema version.
pub const CONFIG_VERSION: u32 = 1;

/// Parsed project configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Schema version.
    pub version: u32,

    /// Services keyed by name.
    #[serde(default)]
    pub services: BTreeMap<String, Service>,
}

/// A service living inside the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// Directory of the service, relative to the project root.
    pub path: String,

    /// Env file the service reads its port from.
    #[serde(default)]
    pub env_file: Option<String>,
}

impl Config {
    /// Loads `dual.config.yml` from `project_root`.
    pub fn load(project_root: &Path) -> Result<Self> {
        let path = project_root.join(CONFIG_FILE);
        let content = fs::read_to_string(&path).map_err(|e| {
            DualError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Parses and checks a YAML config document.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)
            .map_err(|e| DualError::Config(format!("failed to parse config: {}", e)))?;

        if config.version != CONFIG_VERSION {
            return Err(DualError::Config(format!(
                "unsupported config version {} (expected {})",
                config.version, CONFIG_VERSION
            )));
        }
        if config.services.is_empty() {
            return Err(DualError::Config("no services defined".to_string()));
        }

        Ok(config)
    }

    /// Builds a config from service names alone.
    pub fn with_services<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let services = names
            .into_iter()
            .map(|name| {
                let name = name.into();
                let service = Service {
                    path: name.clone(),
                    env_file: None,
                };
                (name, service)
            })
            .collect();

        Self {
            version: CONFIG_VERSION,
            services,
        }
    }

    /// Service names in byte-wise sorted order.
    pub fn service_names(&self) -> Vec<&str> {
        self.services.keys().map(String::as_str).collect()
    }

    /// Number of configured services.
    pub fn num_services(&self) -> usize {
        self.services.len()
    }
}

/// Walks up from `start` to the first directory containing the config file.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(CONFIG_FILE).is_file())
        .map(Path::to_path_buf)
}
