//! The sync command: submit one coalescable synchronization job for the
//! selected projects and wait for its terminal state.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use console::{Term, style};

use foreman::{
    DependencyCache, DependencyEntry, DependencyKind, JobStatus, NewProjectPolicy, ProgressSink,
    ProjectId, ResolvedDependencies, Scheduler, Submission, SyncFailure, SyncJob, SyncTarget,
    Workspace,
};

use crate::SyncOptions;
use crate::config::{Config, ProjectConfig};
use crate::progress::ProgressReporter;
use crate::project::CommandProject;
use crate::shutdown;

/// Handle `foreman sync`.
pub async fn handle_sync(
    opts: SyncOptions,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let selected = config.select_projects(&opts.projects)?;
    if selected.is_empty() {
        return Err(
            "No projects configured. Add [[projects]] entries to foreman.toml first.".into(),
        );
    }

    let workspace = Workspace::new();
    for project in &selected {
        workspace.register(Arc::new(CommandProject::from_config(project)) as Arc<dyn SyncTarget>);
    }

    let throttle = Duration::from_millis(opts.throttle_ms.unwrap_or(config.sync.throttle_ms));
    let scheduler = Scheduler::with_throttle(throttle);

    let policy = if opts.import_new || config.sync.import_new {
        NewProjectPolicy::Import
    } else {
        NewProjectPolicy::NoOp
    };

    let reporter = Arc::new(ProgressReporter::new());
    let is_tty = Term::stdout().is_term();

    let on_status = Arc::new(move |failure: SyncFailure| {
        if is_tty {
            eprintln!("{} {}", style("✗").red(), failure);
        } else {
            tracing::error!(operation = %failure.operation, error = %failure.cause, "synchronization failed");
        }
    });

    let job = SyncJob::builder()
        .label(format!(
            "Synchronize {} project(s) with workspace",
            selected.len()
        ))
        .targets(workspace.targets())
        .policy(policy)
        .progress(Arc::clone(&reporter) as Arc<dyn ProgressSink>)
        .on_status(on_status)
        .build()?;

    let mut handle = match scheduler.submit(job) {
        Submission::Scheduled(handle) => handle,
        Submission::Coalesced => {
            println!("An equivalent synchronization is already queued or running.");
            return Ok(());
        }
    };

    shutdown::spawn_shutdown_handler(handle.cancel_token());

    let status = handle.wait().await;
    reporter.finish();

    match status {
        JobStatus::Completed => {
            record_resolved_state(config, &selected)?;
            if is_tty {
                println!(
                    "{} {} project(s) synchronized",
                    style("✓").green(),
                    selected.len()
                );
            } else {
                tracing::info!(projects = selected.len(), "synchronization complete");
            }
            Ok(())
        }
        JobStatus::Cancelled => {
            if is_tty {
                println!("{} synchronization canceled", style("⚠").yellow());
            } else {
                tracing::warn!("synchronization canceled");
            }
            Ok(())
        }
        _ => Err("Synchronization failed; see the messages above.".into()),
    }
}

/// Record each project's resolved state so later dependency refreshes can be
/// served from the cache.
fn record_resolved_state(
    config: &Config,
    projects: &[ProjectConfig],
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(dir) = config.cache_dir() else {
        tracing::warn!("could not determine a cache directory, skipping state recording");
        return Ok(());
    };

    let cache = DependencyCache::new(dir)?;
    for project in projects {
        cache.store(&ResolvedDependencies {
            project: ProjectId::new(project.name.clone()),
            entries: vec![DependencyEntry {
                name: project.name.clone(),
                kind: DependencyKind::Project,
                location: project.dir.clone(),
            }],
            resolved_at: Utc::now(),
        })?;
    }
    Ok(())
}
