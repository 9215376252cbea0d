//! Registry health checks.
//!
//! Detects problems without fixing them: orphaned contexts (working tree
//! gone), shared base ports, and overlapping ranges.

use crate::config::Config;
use crate::conflict::{
    check_port_range_overlap, find_duplicate_base_ports, BasePortConflict, ContextInfo,
    PortRangeOverlap,
};
use crate::types::Registry;
use std::path::Path;

/// A context whose recorded path no longer exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanedContext {
    /// The context.
    pub context: ContextInfo,
    /// The missing working tree path.
    pub path: String,
}

/// Report from [`check_health`].
#[derive(Debug, Default)]
pub struct HealthReport {
    /// Number of contexts examined in the project.
    pub contexts_checked: usize,

    /// Contexts whose working tree is gone.
    pub orphaned_contexts: Vec<OrphanedContext>,

    /// Base ports shared anywhere in the registry that involve this project.
    pub duplicate_base_ports: Vec<BasePortConflict>,

    /// Overlapping ranges within the project.
    pub range_overlaps: Vec<PortRangeOverlap>,
}

impl HealthReport {
    /// Returns true if any issues were found.
    pub fn has_issues(&self) -> bool {
        !self.orphaned_contexts.is_empty()
            || !self.duplicate_base_ports.is_empty()
            || !self.range_overlaps.is_empty()
    }

    /// Returns a summary message.
    pub fn summary(&self) -> String {
        if !self.has_issues() {
            return format!("{} contexts checked. No issues found.", self.contexts_checked);
        }

        let mut issues = Vec::new();
        if !self.orphaned_contexts.is_empty() {
            issues.push(format!("{} orphaned contexts", self.orphaned_contexts.len()));
        }
        if !self.duplicate_base_ports.is_empty() {
            issues.push(format!(
                "{} duplicate base ports",
                self.duplicate_base_ports.len()
            ));
        }
        if !self.range_overlaps.is_empty() {
            issues.push(format!("{} overlapping port ranges", self.range_overlaps.len()));
        }
        format!("Found: {}", issues.join(", "))
    }
}

/// Checks the contexts of `project`.
///
/// Duplicate base ports are reported when at least one of the sharing
/// contexts belongs to `project`.
pub fn check_health(registry: &Registry, config: &Config, project: &str) -> HealthReport {
    let mut report = HealthReport::default();

    if let Some(entry) = registry.projects.get(project) {
        report.contexts_checked = entry.contexts.len();

        for (name, ctx) in &entry.contexts {
            if !Path::new(&ctx.path).exists() {
                report.orphaned_contexts.push(OrphanedContext {
                    context: ContextInfo {
                        project_path: project.to_string(),
                        context_name: name.clone(),
                        base_port: ctx.base_port,
                    },
                    path: ctx.path.clone(),
                });
            }
        }
    }

    report.duplicate_base_ports = find_duplicate_base_ports(registry)
        .into_iter()
        .filter(|conflict| conflict.contexts.iter().any(|c| c.project_path == project))
        .collect();
    report.range_overlaps = check_port_range_overlap(registry, config, project);

    report
}
