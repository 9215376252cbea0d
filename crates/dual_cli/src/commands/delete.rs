//! Remove a context.

use super::ProjectEnv;
use anyhow::Result;
use console::style;
use dual_core::RegistryStore;

pub fn run(project: &ProjectEnv, context: &str) -> Result<()> {
    let mut store = RegistryStore::load(&project.root)?;
    let removed = store.delete_context(&project.id, context)?;
    store.save()?;
    store.close()?;

    println!(
        "{} Deleted context {} (base port {})",
        style("✓").green(),
        style(context).cyan(),
        removed.base_port
    );
    Ok(())
}
