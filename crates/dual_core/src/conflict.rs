//! Read-only conflict analysis over a registry snapshot.
//!
//! Base-port identity is checked across every project on the machine, while
//! range overlaps are checked within one project using the current service
//! count for every context.

use crate::config::Config;
use crate::error::{DualError, Result};
use crate::ports::{port_for_service, port_range, range_overlap, MAX_PORT};
use crate::process::{get_process_using_port, ProcessInfo};
use crate::types::Registry;
use std::collections::BTreeMap;
use std::net::{Ipv4Addr, TcpListener};
use tracing::debug;

/// Identifies one context in a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextInfo {
    /// Project identifier.
    pub project_path: String,
    /// Context name.
    pub context_name: String,
    /// Context base port.
    pub base_port: u16,
}

/// A base port shared by two or more contexts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasePortConflict {
    /// The shared base port.
    pub base_port: u16,
    /// Every context using it (at least two, in no particular order).
    pub contexts: Vec<ContextInfo>,
}

/// Two contexts of one project whose port ranges intersect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortRangeOverlap {
    /// First context of the pair.
    pub context1: ContextInfo,
    /// Second context of the pair.
    pub context2: ContextInfo,
    /// Range of the first context.
    pub start_port1: u32,
    /// Range of the first context.
    pub end_port1: u32,
    /// Range of the second context.
    pub start_port2: u32,
    /// Range of the second context.
    pub end_port2: u32,
    /// First port in both ranges.
    pub overlap_port: u32,
}

/// Live status of one service port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePortStatus {
    /// Service name.
    pub service: String,
    /// Computed port.
    pub port: u16,
    /// Whether something is bound to the port.
    pub in_use: bool,
    /// Listener, when it could be identified.
    pub process: Option<ProcessInfo>,
}

/// Groups contexts of all projects by base port and reports shared ones.
///
/// Conflicts come back ordered by base port.
pub fn find_duplicate_base_ports(registry: &Registry) -> Vec<BasePortConflict> {
    let mut by_port: BTreeMap<u16, Vec<ContextInfo>> = BTreeMap::new();

    for (project, name, ctx) in registry.contexts() {
        by_port.entry(ctx.base_port).or_default().push(ContextInfo {
            project_path: project.to_string(),
            context_name: name.to_string(),
            base_port: ctx.base_port,
        });
    }

    by_port
        .into_iter()
        .filter(|(_, contexts)| contexts.len() > 1)
        .map(|(base_port, contexts)| BasePortConflict {
            base_port,
            contexts,
        })
        .collect()
}

/// Reports every pair of contexts in `project` whose ranges intersect.
///
/// An unknown project yields no overlaps.
pub fn check_port_range_overlap(
    registry: &Registry,
    config: &Config,
    project: &str,
) -> Vec<PortRangeOverlap> {
    let Some(entry) = registry.projects.get(project) else {
        return Vec::new();
    };
    let num_services = config.num_services();

    let contexts: Vec<ContextInfo> = entry
        .contexts
        .iter()
        .map(|(name, ctx)| ContextInfo {
            project_path: project.to_string(),
            context_name: name.clone(),
            base_port: ctx.base_port,
        })
        .collect();

    let mut overlaps = Vec::new();
    for (i, first) in contexts.iter().enumerate() {
        for second in &contexts[i + 1..] {
            let range1 = port_range(first.base_port, num_services);
            let range2 = port_range(second.base_port, num_services);

            if let Some(overlap_port) = range_overlap(range1, range2) {
                overlaps.push(PortRangeOverlap {
                    context1: first.clone(),
                    context2: second.clone(),
                    start_port1: range1.0,
                    end_port1: range1.1,
                    start_port2: range2.0,
                    end_port2: range2.1,
                    overlap_port,
                });
            }
        }
    }

    overlaps
}

/// Rejects a prospective base port for a new context in `project`.
///
/// # Errors
///
/// Returns `BasePortInUse` if any context of any project owns
/// `candidate` exactly, or `PortRangeOverlap` if its range intersects a
/// range in the same project. Returns `PortOverflow` if the candidate's
/// range would run past 65535.
pub fn check_context_port_conflict(
    registry: &Registry,
    config: &Config,
    project: &str,
    candidate: u16,
) -> Result<()> {
    let num_services = config.num_services();
    if num_services > 0 && port_range(candidate, num_services).1 > u32::from(MAX_PORT) {
        return Err(DualError::PortOverflow {
            base_port: candidate,
            service_index: num_services - 1,
        });
    }

    if let Some((owner, name, _)) = registry
        .contexts()
        .find(|(_, _, ctx)| ctx.base_port == candidate)
    {
        return Err(DualError::BasePortInUse {
            port: candidate,
            project: owner.to_string(),
            context: name.to_string(),
        });
    }

    let Some(entry) = registry.projects.get(project) else {
        return Ok(());
    };

    let wanted = port_range(candidate, num_services);
    for (name, ctx) in &entry.contexts {
        let existing = port_range(ctx.base_port, num_services);
        if let Some(port) = range_overlap(wanted, existing) {
            return Err(DualError::PortRangeOverlap {
                context: name.clone(),
                start: existing.0,
                end: existing.1,
                port,
            });
        }
    }

    Ok(())
}

/// Returns true unless a TCP listener can be bound to `port`.
///
/// Any bind failure, permission errors included, counts as in use.
pub fn is_port_in_use(port: u16) -> bool {
    match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)) {
        Ok(listener) => {
            drop(listener);
            false
        }
        Err(e) => {
            debug!(port, error = %e, "port bind failed");
            true
        }
    }
}

/// Computes a service's port and checks whether it is taken.
///
/// Errors only when the port cannot be computed (unknown project, context or
/// service). A failed process lookup leaves `process` as `None`.
pub fn check_service_port_in_use(
    config: &Config,
    registry: &Registry,
    project: &str,
    context: &str,
    service: &str,
) -> Result<ServicePortStatus> {
    let port = port_for_service(config, registry, project, context, service)?;
    let in_use = is_port_in_use(port);

    let process = if in_use {
        match get_process_using_port(port) {
            Ok(info) => Some(info),
            Err(e) => {
                debug!(port, error = %e, "could not attribute port");
                None
            }
        }
    } else {
        None
    };

    Ok(ServicePortStatus {
        service: service.to_string(),
        port,
        in_use,
        process,
    })
}
