//! Deterministic port arithmetic.
//!
//! A context with base port `B` and `N` services owns ports `B+1 ..= B+N`.
//! Service `i` (0-based rank of its name in byte-wise sorted order) gets
//! `B + i + 1`. Everything here is pure; the same inputs produce the same
//! ports in every process.

use crate::config::Config;
use crate::error::{DualError, Result};
use crate::types::Registry;
use std::collections::{BTreeMap, HashSet};

/// First base port handed out by the allocator.
pub const DEFAULT_BASE_PORT: u16 = 4100;

/// Step between candidate base ports.
pub const PORT_INCREMENT: u16 = 100;

/// Lowest acceptable base port.
pub const MIN_PORT: u16 = 1024;

/// Highest acceptable base port.
pub const MAX_PORT: u16 = 65535;

/// Checks a caller-supplied base port.
///
/// # Errors
///
/// Returns `InvalidBasePort` outside `1024..=65535`.
pub fn validate_base_port(port: u32) -> Result<u16> {
    if port < u32::from(MIN_PORT) || port > u32::from(MAX_PORT) {
        return Err(DualError::InvalidBasePort(port));
    }
    Ok(port as u16)
}

/// Ranks service names in byte-wise lexicographic order.
///
/// Duplicate names collapse to one entry.
pub fn service_index<I, S>(names: I) -> BTreeMap<String, usize>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut sorted: Vec<String> = names.into_iter().map(|n| n.as_ref().to_string()).collect();
    sorted.sort();
    sorted.dedup();

    sorted
        .into_iter()
        .enumerate()
        .map(|(i, name)| (name, i))
        .collect()
}

/// Returns `base_port + service_index + 1`.
///
/// # Errors
///
/// Returns `PortOverflow` if the result would exceed 65535.
pub fn calculate_port(base_port: u16, service_index: usize) -> Result<u16> {
    let port = u64::from(base_port) + service_index as u64 + 1;
    u16::try_from(port).map_err(|_| DualError::PortOverflow {
        base_port,
        service_index,
    })
}

/// Computes the port of every service for one base port.
pub fn calculate_all_ports<I, S>(base_port: u16, names: I) -> Result<BTreeMap<String, u16>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    service_index(names)
        .into_iter()
        .map(|(name, index)| calculate_port(base_port, index).map(|port| (name, port)))
        .collect()
}

/// Inclusive port range `[base+1, base+num_services]`.
///
/// Empty (start > end) when `num_services` is zero.
pub(crate) fn port_range(base_port: u16, num_services: usize) -> (u32, u32) {
    let base = u32::from(base_port);
    (base + 1, base.saturating_add(num_services as u32))
}

/// First overlapping port of two inclusive ranges, if they intersect.
pub(crate) fn range_overlap(a: (u32, u32), b: (u32, u32)) -> Option<u32> {
    if a.0 <= b.1 && b.0 <= a.1 {
        Some(a.0.max(b.0))
    } else {
        None
    }
}

/// Finds the first free base port from [`DEFAULT_BASE_PORT`] in steps of
/// [`PORT_INCREMENT`].
pub fn find_next_available_base_port(registry: &Registry, num_services: usize) -> Result<u16> {
    find_next_available_base_port_from(registry, num_services, DEFAULT_BASE_PORT, PORT_INCREMENT)
}

/// Scans `start, start+increment, ...` for a base port that no context in
/// any project uses and whose range overlaps no existing range.
///
/// Existing contexts are assumed to have `num_services` services too, since
/// other projects' service counts are unknown here.
///
/// # Errors
///
/// Returns `NoAvailablePort` when the scan runs past 65535.
pub fn find_next_available_base_port_from(
    registry: &Registry,
    num_services: usize,
    start: u16,
    increment: u16,
) -> Result<u16> {
    let used: HashSet<u16> = registry.contexts().map(|(_, _, ctx)| ctx.base_port).collect();
    let existing: Vec<(u32, u32)> = used
        .iter()
        .map(|&base| port_range(base, num_services))
        .collect();

    let mut candidate = u32::from(start);
    while candidate + num_services as u32 <= u32::from(MAX_PORT) {
        let base = candidate as u16;
        let range = port_range(base, num_services);

        let taken = used.contains(&base)
            || existing
                .iter()
                .any(|&other| range_overlap(range, other).is_some());
        if !taken {
            return Ok(base);
        }

        if increment == 0 {
            break;
        }
        candidate += u32::from(increment);
    }

    Err(DualError::NoAvailablePort { start, increment })
}

/// Resolves one service's port for a registered context.
///
/// # Errors
///
/// Returns `ProjectNotFound`, `ContextNotFound` or `ServiceNotFound`.
pub fn port_for_service(
    config: &Config,
    registry: &Registry,
    project: &str,
    context: &str,
    service: &str,
) -> Result<u16> {
    let ctx = registry.get_context(project, context)?;
    let index = service_index(config.services.keys());
    let position = index
        .get(service)
        .ok_or_else(|| DualError::ServiceNotFound(service.to_string()))?;
    calculate_port(ctx.base_port, *position)
}

/// Resolves every service port for a registered context.
pub fn ports_for_context(
    config: &Config,
    registry: &Registry,
    project: &str,
    context: &str,
) -> Result<BTreeMap<String, u16>> {
    let ctx = registry.get_context(project, context)?;
    calculate_all_ports(ctx.base_port, config.services.keys())
}
