//! Port lookup commands.

use super::{resolve_context, ProjectEnv};
use anyhow::Result;
use console::style;
use dual_core::{check_service_port_in_use, ports_for_context, RegistryStore};

/// Print every service port of a context.
pub fn all(project: &ProjectEnv, context: Option<&str>) -> Result<()> {
    let mut store = RegistryStore::load(&project.root)?;
    let context = resolve_context(store.registry(), project, context)?;
    let ports = ports_for_context(&project.config, store.registry(), &project.id, &context)?;
    store.close()?;

    println!("{}", style(format!("Ports for {}:", context)).bold());
    for (service, port) in ports {
        println!("  {:<20} {}", service, style(port).cyan());
    }
    Ok(())
}

/// Print one service port and whether it is bound.
pub fn single(project: &ProjectEnv, service: &str, context: Option<&str>) -> Result<()> {
    let mut store = RegistryStore::load(&project.root)?;
    let context = resolve_context(store.registry(), project, context)?;
    let registry = store.registry().clone();
    store.close()?;

    let status = check_service_port_in_use(&project.config, &registry, &project.id, &context, service)?;

    println!("{}", status.port);
    if status.in_use {
        match &status.process {
            Some(p) => eprintln!(
                "{} port {} is in use by {} (PID {})",
                style("⚠").yellow(),
                status.port,
                p.name,
                p.pid
            ),
            None => eprintln!("{} port {} is in use", style("⚠").yellow(), status.port),
        }
    }
    Ok(())
}
