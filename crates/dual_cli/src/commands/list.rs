//! List contexts of the project.

use super::ProjectEnv;
use anyhow::Result;
use console::style;
use dual_core::{DualError, RegistryStore};
use std::path::Path;

pub fn run(project: &ProjectEnv) -> Result<()> {
    let mut store = RegistryStore::load(&project.root)?;

    let contexts = match store.list_contexts(&project.id) {
        Ok(contexts) => contexts.clone(),
        Err(DualError::ProjectNotFound(_)) => Default::default(),
        Err(e) => return Err(e.into()),
    };
    store.close()?;

    if contexts.is_empty() {
        println!("No contexts registered for {}", project.id);
        return Ok(());
    }

    println!("{}", style(format!("Contexts of {}:", project.id)).bold());
    for (name, ctx) in &contexts {
        let marker = if Path::new(&ctx.path).exists() {
            style("●").green()
        } else {
            style("○").red()
        };
        println!(
            "  {} {:<24} {:>5}  {}  (created {})",
            marker,
            name,
            ctx.base_port,
            ctx.path,
            ctx.created.format("%Y-%m-%d %H:%M")
        );
    }

    Ok(())
}
