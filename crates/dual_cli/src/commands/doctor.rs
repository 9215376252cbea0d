//! Registry health command.

use super::ProjectEnv;
use anyhow::Result;
use console::style;
use dual_core::{check_health, check_service_port_in_use, DualError, RegistryStore};
use indicatif::{ProgressBar, ProgressStyle};

/// Report orphaned contexts, port conflicts and ports already taken.
pub fn run(project: &ProjectEnv) -> Result<()> {
    let mut store = RegistryStore::load(&project.root)?;
    let registry = store.registry().clone();
    store.close()?;

    let report = check_health(&registry, &project.config, &project.id);

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message("Checking service ports...");
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let mut busy = Vec::new();
    let mut overflowing = Vec::new();
    if let Some(entry) = registry.projects.get(&project.id) {
        for name in entry.contexts.keys() {
            for service in project.config.services.keys() {
                match check_service_port_in_use(&project.config, &registry, &project.id, name, service) {
                    Ok(status) if status.in_use => busy.push((name.clone(), status)),
                    Ok(_) => {}
                    Err(DualError::PortOverflow { base_port, .. }) => {
                        overflowing.push((name.clone(), service.clone(), base_port));
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }

    pb.finish_and_clear();

    println!();
    println!("{}", style("Health Report:").bold());
    println!(
        "  Contexts checked:   {}",
        style(report.contexts_checked).cyan()
    );

    if !report.orphaned_contexts.is_empty() {
        println!(
            "  Orphaned contexts:  {}",
            style(report.orphaned_contexts.len()).yellow()
        );
        for orphan in &report.orphaned_contexts {
            println!(
                "    {} {} ({} is gone)",
                style("⚠").yellow(),
                orphan.context.context_name,
                orphan.path
            );
        }
    }

    for conflict in &report.duplicate_base_ports {
        let names: Vec<String> = conflict
            .contexts
            .iter()
            .map(|c| format!("{} [{}]", c.context_name, c.project_path))
            .collect();
        println!(
            "    {} base port {} shared by {}",
            style("×").red(),
            conflict.base_port,
            names.join(", ")
        );
    }

    for overlap in &report.range_overlaps {
        println!(
            "    {} {} ({}-{}) overlaps {} ({}-{}) at port {}",
            style("×").red(),
            overlap.context1.context_name,
            overlap.start_port1,
            overlap.end_port1,
            overlap.context2.context_name,
            overlap.start_port2,
            overlap.end_port2,
            overlap.overlap_port
        );
    }

    for (context, service, base_port) in &overflowing {
        println!(
            "    {} {}/{} has no valid port (base port {} runs past 65535)",
            style("×").red(),
            context,
            service,
            base_port
        );
    }

    if !busy.is_empty() {
        println!("  Ports in use:       {}", style(busy.len()).yellow());
        for (context, status) in &busy {
            let owner = status
                .process
                .as_ref()
                .map(|p| format!("{} (PID {}, {})", p.name, p.pid, p.user))
                .unwrap_or_else(|| "unknown process".to_string());
            println!(
                "    {} {}/{} port {} held by {}",
                style("•").cyan(),
                context,
                status.service,
                status.port,
                owner
            );
        }
    }

    println!();
    if report.has_issues() {
        println!("{}", style(&report.summary()).yellow().bold());
        if !report.orphaned_contexts.is_empty() {
            println!(
                "  {} Remove orphaned contexts with {}",
                style("→").cyan(),
                style("dual delete <context>").cyan()
            );
        }
    } else {
        println!(
            "{} {}",
            style("✓").green(),
            style(&report.summary()).green()
        );
    }

    Ok(())
}
