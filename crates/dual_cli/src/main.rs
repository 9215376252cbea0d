//! Dual CLI - run many worktrees of one repository without port collisions.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "dual")]
#[command(about = "Per-worktree port allocation for multi-service repositories", long_about = None)]
#[command(version)]
struct Cli {
    /// Project root (defaults to the nearest directory with dual.config.yml)
    #[arg(long, global = true)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new context
    Create {
        /// Context name (usually the branch name)
        context: String,
        /// Base port; allocated automatically when omitted
        #[arg(long)]
        base_port: Option<u32>,
        /// Working tree of the context (defaults to the current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Remove a context from the registry
    Delete {
        /// Context name
        context: String,
    },
    /// List contexts of the project
    List,
    /// Show every service port of a context
    Ports {
        /// Context name (inferred from the current directory when omitted)
        context: Option<String>,
    },
    /// Show one service's port and whether it is taken
    Port {
        /// Service name
        service: String,
        /// Context name (inferred from the current directory when omitted)
        #[arg(short, long)]
        context: Option<String>,
    },
    /// Check the registry for orphaned contexts and port conflicts
    Doctor,
}

fn main() -> Result<()> {
    // Initialize tracing subscriber
    // Respects RUST_LOG environment variable (e.g., RUST_LOG=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = run(cli);
    if let Err(err) = &result {
        if let Some(hint) = err
            .downcast_ref::<dual_core::DualError>()
            .and_then(|e| e.recovery_suggestion())
        {
            eprintln!("hint: {}", hint);
        }
    }
    result
}

fn run(cli: Cli) -> Result<()> {
    let project = commands::ProjectEnv::resolve(cli.project.as_deref())?;

    match cli.command {
        Commands::Create {
            context,
            base_port,
            path,
        } => commands::create::run(&project, &context, base_port, path.as_deref()),
        Commands::Delete { context } => commands::delete::run(&project, &context),
        Commands::List => commands::list::run(&project),
        Commands::Ports { context } => commands::ports::all(&project, context.as_deref()),
        Commands::Port { service, context } => {
            commands::ports::single(&project, &service, context.as_deref())
        }
        Commands::Doctor => commands::doctor::run(&project),
    }
}
