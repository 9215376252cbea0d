//! Persisted registry model.
//!
//! The on-disk shape is `projects -> <project path> -> contexts -> <name> ->
//! { basePort, created, path }`. Maps are `BTreeMap` so saved files diff
//! cleanly; key order carries no meaning.

use crate::error::{DualError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Root registry document shared by every context of every project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    /// Projects keyed by canonical repository root path.
    #[serde(default)]
    pub projects: BTreeMap<String, Project>,
}

/// A repository root and its registered contexts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Contexts keyed by name (usually a branch name, may contain `/`).
    #[serde(default)]
    pub contexts: BTreeMap<String, Context>,
}

/// One isolated working copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    /// Anchor port; services get `base_port + index + 1`.
    pub base_port: u16,
    /// Creation time, never changed after the first insert.
    pub created: DateTime<Utc>,
    /// Working tree location.
    pub path: String,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a project.
    pub fn project(&self, project: &str) -> Result<&Project> {
        self.projects
            .get(project)
            .ok_or_else(|| DualError::ProjectNotFound(project.to_string()))
    }

    /// Looks up a context.
    ///
    /// # Errors
    ///
    /// Returns `ProjectNotFound` or `ContextNotFound`.
    pub fn get_context(&self, project: &str, name: &str) -> Result<&Context> {
        self.project(project)?
            .contexts
            .get(name)
            .ok_or_else(|| DualError::ContextNotFound {
                project: project.to_string(),
                context: name.to_string(),
            })
    }

    /// Creates or updates a context, creating the project entry if needed.
    ///
    /// An existing context keeps its `created` timestamp. Callers are expected
    /// to have run the port conflict checks before changing a base port.
    pub fn set_context(
        &mut self,
        project: &str,
        name: &str,
        base_port: u16,
        path: impl Into<String>,
    ) -> Context {
        let path = path.into();
        let contexts = &mut self.projects.entry(project.to_string()).or_default().contexts;

        let context = match contexts.get(name) {
            Some(existing) => Context {
                base_port,
                created: existing.created,
                path,
            },
            None => Context {
                base_port,
                created: Utc::now(),
                path,
            },
        };
        contexts.insert(name.to_string(), context.clone());
        context
    }

    /// Returns every context of a project.
    pub fn list_contexts(&self, project: &str) -> Result<&BTreeMap<String, Context>> {
        Ok(&self.project(project)?.contexts)
    }

    /// Removes a context. The project entry stays even when it becomes empty.
    ///
    /// # Errors
    ///
    /// Returns `ProjectNotFound` or `ContextNotFound`.
    pub fn delete_context(&mut self, project: &str, name: &str) -> Result<Context> {
        let entry = self
            .projects
            .get_mut(project)
            .ok_or_else(|| DualError::ProjectNotFound(project.to_string()))?;

        entry
            .contexts
            .remove(name)
            .ok_or_else(|| DualError::ContextNotFound {
                project: project.to_string(),
                context: name.to_string(),
            })
    }

    /// Iterates `(project, context name, context)` across all projects.
    pub fn contexts(&self) -> impl Iterator<Item = (&str, &str, &Context)> {
        self.projects.iter().flat_map(|(project, entry)| {
            entry
                .contexts
                .iter()
                .map(move |(name, ctx)| (project.as_str(), name.as_str(), ctx))
        })
    }

    /// Finds the context whose working tree contains `path`.
    ///
    /// When context paths nest, the deepest one wins.
    pub fn find_context_by_path(&self, project: &str, path: &Path) -> Option<(&str, &Context)> {
        self.projects
            .get(project)?
            .contexts
            .iter()
            .filter(|(_, ctx)| path.starts_with(&ctx.path))
            .max_by_key(|(_, ctx)| Path::new(&ctx.path).components().count())
            .map(|(name, ctx)| (name.as_str(), ctx))
    }
}
