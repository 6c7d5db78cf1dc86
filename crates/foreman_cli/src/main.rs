//! Foreman CLI - synchronize configured projects with the workspace.

mod commands;
mod config;
mod progress;
mod project;
mod shutdown;

use clap::{Parser, Subcommand};
use console::Term;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "foreman")]
#[command(version)]
#[command(about = "A coalescing workspace synchronizer for build projects")]
#[command(
    long_about = "Foreman synchronizes external project state with the local workspace by \
running each configured project's build command. Redundant synchronization \
requests are coalesced, progress reporting is rate limited, and background \
dependency refreshes defer to synchronizations already in flight."
)]
#[command(after_long_help = r#"EXAMPLES
    Synchronize every configured project:
        $ foreman sync

    Synchronize two projects and import newly discovered ones:
        $ foreman sync core app --import-new

    Refresh one project's dependency view (cache-first):
        $ foreman refresh core

    Generate shell completions:
        $ foreman completions bash > ~/.local/share/bash-completion/completions/foreman

CONFIGURATION
    Foreman reads configuration from:
      1. ~/.config/foreman/config.toml (or $XDG_CONFIG_HOME/foreman/config.toml)
      2. ./foreman.toml
      3. Environment variables (FOREMAN_* prefix)
      4. .env file in the current directory

    Example config file:
        [[projects]]
        name = "core"
        dir = "core"
        command = "cargo build"

        [sync]
        throttle_ms = 500
        import_new = false
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize configured projects with the workspace
    Sync {
        #[command(flatten)]
        opts: SyncOptions,
    },
    /// Refresh one project's dependency view, serving from the durable
    /// cache when possible
    Refresh {
        /// Project name as configured
        project: String,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

/// Options for the sync command.
#[derive(Debug, Clone, clap::Args)]
struct SyncOptions {
    /// Project names to synchronize (all configured projects if omitted)
    projects: Vec<String>,

    /// Import newly discovered projects into the workspace
    #[arg(short = 'i', long)]
    import_new: bool,

    /// Minimum milliseconds between forwarded progress updates
    /// (default from config or 500)
    #[arg(short = 't', long)]
    throttle_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Structured logging for non-TTY mode (CI, pipes); progress bars own the
    // terminal otherwise.
    if !Term::stdout().is_term() {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("foreman=info,foreman_cli=info"));

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    let config = config::Config::load();

    let cli = Cli::parse();
    match cli.command {
        Commands::Sync { opts } => {
            commands::sync::handle_sync(opts, &config).await?;
        }
        Commands::Refresh { project } => {
            commands::refresh::handle_refresh(&project, &config).await?;
        }
        Commands::Completions { shell } => {
            commands::meta::handle_completions(shell);
        }
    }

    Ok(())
}
