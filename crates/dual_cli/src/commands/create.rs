//! Register a new context.

use super::ProjectEnv;
use anyhow::{bail, Context as _, Result};
use console::style;
use dual_core::{
    calculate_all_ports, check_context_port_conflict, find_next_available_base_port,
    validate_base_port, RegistryStore,
};
use std::path::Path;

/// Create a context, allocating a base port unless one is given.
pub fn run(project: &ProjectEnv, context: &str, base_port: Option<u32>, path: Option<&Path>) -> Result<()> {
    // Reject bad input before touching the registry.
    let requested = base_port.map(validate_base_port).transpose()?;

    let worktree = match path {
        Some(p) => p.to_path_buf(),
        None => std::env::current_dir()?,
    };
    let worktree = worktree
        .canonicalize()
        .with_context(|| format!("Context path does not exist: {}", worktree.display()))?;

    let mut store = RegistryStore::load(&project.root).context("Failed to open registry")?;

    if store.get_context(&project.id, context).is_ok() {
        bail!("Context '{}' already exists", context);
    }

    let base = match requested {
        Some(port) => {
            check_context_port_conflict(store.registry(), &project.config, &project.id, port)?;
            port
        }
        None => find_next_available_base_port(store.registry(), project.config.num_services())?,
    };

    // Nothing is written unless every service port is computable.
    let ports = calculate_all_ports(base, project.config.services.keys())?;

    store.set_context(&project.id, context, base, worktree.to_string_lossy());
    store.save()?;
    store.close()?;

    println!(
        "{} Created context {} with base port {}",
        style("✓").green(),
        style(context).cyan(),
        style(base).cyan()
    );
    for (service, port) in ports {
        println!("  {:<20} {}", service, port);
    }

    Ok(())
}
