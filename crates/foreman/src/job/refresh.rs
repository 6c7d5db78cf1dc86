//! Background per-project dependency refresh.
//!
//! Reacting to a dependency-view request is much narrower than a full
//! synchronization, so the refresher tries progressively cheaper paths:
//! first the durable cache of previously resolved state, then - only when
//! the cache misses and the project has a known target - a silent refresh
//! job that defers to any synchronization already in flight.

use std::sync::Arc;

use crate::cache::{CacheError, DependencyCache, ResolvedDependencies};
use crate::cancel::CancelToken;
use crate::job::scheduler::{JobHandle, Scheduler};
use crate::job::status::JobStatus;
use crate::policy::{Initializer, NewProjectPolicy};
use crate::progress::throttle::{DEFAULT_THROTTLE, ThrottledReporter};
use crate::progress::{DiscardSink, ProgressSlice};
use crate::target::{ProjectId, SyncError, SyncTarget};
use crate::workspace::Workspace;

/// How a refresh request was satisfied.
#[derive(Debug)]
pub enum RefreshOutcome {
    /// Served from the durable cache; no job was scheduled.
    FromCache(ResolvedDependencies),
    /// The project has no known target; the caller should reset its
    /// dependency view.
    Cleared,
    /// A silent refresh job was scheduled; the handle observes it.
    Scheduled(JobHandle),
}

/// Entry point for dependency-view refresh requests.
pub struct DependencyRefresher {
    scheduler: Scheduler,
    workspace: Workspace,
    cache: DependencyCache,
}

impl DependencyRefresher {
    /// Wire the refresher to a scheduler, a workspace, and a cache.
    pub fn new(scheduler: Scheduler, workspace: Workspace, cache: DependencyCache) -> Self {
        Self {
            scheduler,
            workspace,
            cache,
        }
    }

    /// Satisfy a refresh request for one project.
    ///
    /// Tries the cache first, then falls back to scheduling a refresh job if
    /// the project has a known target. Scheduling requires a tokio runtime
    /// context.
    pub fn request(&self, project: &ProjectId) -> Result<RefreshOutcome, CacheError> {
        if let Some(resolved) = self.cache.load(project)? {
            tracing::debug!(project = %project, "dependency state served from cache");
            return Ok(RefreshOutcome::FromCache(resolved));
        }

        match self.workspace.target_for(project) {
            None => {
                tracing::debug!(project = %project, "no target known, clearing dependency view");
                Ok(RefreshOutcome::Cleared)
            }
            Some(target) => Ok(RefreshOutcome::Scheduled(
                self.scheduler.submit_refresh(target),
            )),
        }
    }

    /// The cache backing this refresher.
    pub fn cache(&self) -> &DependencyCache {
        &self.cache
    }
}

/// Body of a scheduled refresh job.
///
/// Performs no work when the target reports a synchronization already in
/// flight - the full synchronization subsumes the narrower refresh. This is
/// a best-effort check-then-act read, not a lock. Failures are logged, never
/// surfaced: this job class is non-interactive.
pub(crate) async fn run_silent(target: Arc<dyn SyncTarget>, token: &CancelToken) -> JobStatus {
    if target.is_sync_in_progress() {
        tracing::debug!(project = %target.id(), "synchronization in flight, skipping refresh");
        return JobStatus::Completed;
    }

    let reporter = Arc::new(ThrottledReporter::new(
        Arc::new(DiscardSink::default()),
        1,
        DEFAULT_THROTTLE,
    ));
    let progress = ProgressSlice::new(reporter, 1);

    match target
        .synchronize(&NewProjectPolicy::NoOp, &Initializer::NoOp, token, progress)
        .await
    {
        Ok(()) => JobStatus::Completed,
        Err(SyncError::Canceled) => JobStatus::Cancelled,
        Err(error) => {
            tracing::error!(project = %target.id(), %error, "background dependency refresh failed");
            JobStatus::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use chrono::Utc;
    use tempfile::TempDir;

    use crate::cache::{DependencyEntry, DependencyKind};
    use crate::job::sync::tests::TestTarget;

    const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    fn refresher_with(
        dir: &TempDir,
        targets: &[Arc<TestTarget>],
    ) -> DependencyRefresher {
        let workspace = Workspace::new();
        for target in targets {
            workspace.register(Arc::clone(target) as Arc<dyn SyncTarget>);
        }
        let cache = DependencyCache::new(dir.path()).expect("cache dir");
        DependencyRefresher::new(
            Scheduler::with_throttle(Duration::from_millis(1)),
            workspace,
            cache,
        )
    }

    #[tokio::test]
    async fn cache_hit_short_circuits_scheduling() {
        let dir = TempDir::new().expect("tempdir");
        let target = Arc::new(TestTarget::new("core"));
        let refresher = refresher_with(&dir, &[Arc::clone(&target)]);

        refresher
            .cache()
            .store(&ResolvedDependencies {
                project: ProjectId::new("core"),
                entries: vec![DependencyEntry {
                    name: "serde".to_string(),
                    kind: DependencyKind::Library,
                    location: "/deps/serde".into(),
                }],
                resolved_at: Utc::now(),
            })
            .expect("store");

        let outcome = refresher.request(&ProjectId::new("core")).expect("request");

        match outcome {
            RefreshOutcome::FromCache(resolved) => {
                assert_eq!(resolved.entries.len(), 1);
                assert_eq!(resolved.entries[0].name, "serde");
            }
            other => panic!("expected cache hit, got {other:?}"),
        }
        assert_eq!(target.call_count(), 0);
    }

    #[tokio::test]
    async fn unknown_project_clears_instead_of_scheduling() {
        let dir = TempDir::new().expect("tempdir");
        let refresher = refresher_with(&dir, &[]);

        let outcome = refresher
            .request(&ProjectId::new("ghost"))
            .expect("request");

        assert!(matches!(outcome, RefreshOutcome::Cleared));
    }

    #[tokio::test]
    async fn cache_miss_schedules_a_refresh_that_synchronizes() {
        let dir = TempDir::new().expect("tempdir");
        let target = Arc::new(TestTarget::new("core"));
        let refresher = refresher_with(&dir, &[Arc::clone(&target)]);

        let outcome = refresher.request(&ProjectId::new("core")).expect("request");

        let mut handle = match outcome {
            RefreshOutcome::Scheduled(handle) => handle,
            other => panic!("expected a scheduled refresh, got {other:?}"),
        };

        let status = tokio::time::timeout(TEST_TIMEOUT, handle.wait())
            .await
            .expect("refresh should finish");
        assert_eq!(status, JobStatus::Completed);
        assert_eq!(target.call_count(), 1);
    }

    #[tokio::test]
    async fn refresh_defers_to_a_sync_in_flight() {
        let target = Arc::new(TestTarget::new("core"));
        target.in_progress.store(true, Ordering::SeqCst);

        let status = run_silent(
            Arc::clone(&target) as Arc<dyn SyncTarget>,
            &CancelToken::new(),
        )
        .await;

        assert_eq!(status, JobStatus::Completed);
        assert_eq!(target.call_count(), 0);
    }

    #[tokio::test]
    async fn refresh_failure_is_silent() {
        let target = Arc::new(TestTarget::failing(
            "core",
            SyncError::Build("exit status 1".to_string()),
        ));

        let status = run_silent(
            Arc::clone(&target) as Arc<dyn SyncTarget>,
            &CancelToken::new(),
        )
        .await;

        // Logged, not surfaced: the only observable effect is the status.
        assert_eq!(status, JobStatus::Failed);
    }
}
