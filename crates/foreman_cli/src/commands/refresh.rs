//! The refresh command: satisfy one project's dependency-view request from
//! the durable cache, or fall back to a silent refresh job.

use std::sync::Arc;

use console::{Term, style};

use foreman::{
    DependencyCache, DependencyKind, DependencyRefresher, JobStatus, ProjectId, RefreshOutcome,
    Scheduler, SyncTarget, Workspace,
};

use crate::config::Config;
use crate::project::CommandProject;
use crate::shutdown;

/// Handle `foreman refresh <project>`.
pub async fn handle_refresh(
    project: &str,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let cache_dir = config
        .cache_dir()
        .ok_or("Could not determine a cache directory")?;
    let cache = DependencyCache::new(cache_dir)?;

    let workspace = Workspace::new();
    for entry in &config.projects {
        workspace.register(Arc::new(CommandProject::from_config(entry)) as Arc<dyn SyncTarget>);
    }

    let refresher = DependencyRefresher::new(Scheduler::new(), workspace, cache);
    let is_tty = Term::stdout().is_term();

    match refresher.request(&ProjectId::new(project))? {
        RefreshOutcome::FromCache(resolved) => {
            if is_tty {
                println!(
                    "{} dependency state for '{}' (resolved {})",
                    style("✓").green(),
                    project,
                    resolved.resolved_at.format("%Y-%m-%d %H:%M:%S")
                );
                for entry in &resolved.entries {
                    println!(
                        "  {:8} {} ({})",
                        kind_name(entry.kind),
                        entry.name,
                        entry.location.display()
                    );
                }
            } else {
                tracing::info!(
                    project,
                    entries = resolved.entries.len(),
                    "dependency state served from cache"
                );
            }
        }
        RefreshOutcome::Cleared => {
            if is_tty {
                println!(
                    "{} '{}' has no configured target; dependency view cleared",
                    style("⚠").yellow(),
                    project
                );
            } else {
                tracing::warn!(project, "no target known, dependency view cleared");
            }
        }
        RefreshOutcome::Scheduled(mut handle) => {
            shutdown::spawn_shutdown_handler(handle.cancel_token());
            match handle.wait().await {
                JobStatus::Completed => {
                    if is_tty {
                        println!("{} '{}' refreshed", style("✓").green(), project);
                    } else {
                        tracing::info!(project, "dependency refresh complete");
                    }
                }
                JobStatus::Cancelled => {
                    if is_tty {
                        println!("{} refresh canceled", style("⚠").yellow());
                    }
                }
                _ => {
                    // Refresh jobs are non-interactive; the failure details
                    // are already in the log.
                    return Err(format!("Refresh of '{project}' failed; see the log.").into());
                }
            }
        }
    }

    Ok(())
}

fn kind_name(kind: DependencyKind) -> &'static str {
    match kind {
        DependencyKind::Library => "library",
        DependencyKind::Project => "project",
    }
}
