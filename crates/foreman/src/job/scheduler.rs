//! The scheduler: an owned registry of queued and running jobs plus the
//! admission-control gate.
//!
//! The registry is the only shared mutable state in this crate. One mutex
//! guards it, held across the scan-and-decide step of every submission and
//! never across job execution; admitted jobs run on the tokio worker pool
//! while the submitting thread returns immediately.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use uuid::Uuid;

use crate::cancel::CancelToken;
use crate::job::refresh;
use crate::job::status::JobStatus;
use crate::job::sync::{CoverageKey, SyncJob};
use crate::progress::throttle::DEFAULT_THROTTLE;
use crate::target::SyncTarget;

/// Identity of a scheduled job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(Uuid);

impl JobId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Which class of work a registry entry belongs to. Coverage is only ever
/// evaluated within the `Synchronize` family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobFamily {
    /// Full workspace synchronization, subject to coalescing.
    Synchronize,
    /// Background per-project dependency refresh; never coalesced against
    /// synchronizations.
    Refresh,
}

/// A live registry entry for a queued or running job.
struct LiveJob {
    id: JobId,
    family: JobFamily,
    coverage: Option<CoverageKey>,
}

/// Outcome of a submission.
#[must_use = "a coalesced submission means the job never runs"]
pub enum Submission {
    /// The job was admitted and is queued or running; the handle observes it.
    Scheduled(JobHandle),
    /// An already queued or running job fully covers this one; it was
    /// dropped without running anything.
    Coalesced,
}

impl Submission {
    /// The handle, if the job was admitted.
    pub fn handle(self) -> Option<JobHandle> {
        match self {
            Self::Scheduled(handle) => Some(handle),
            Self::Coalesced => None,
        }
    }

    /// Whether the job was dropped as redundant.
    pub fn is_coalesced(&self) -> bool {
        matches!(self, Self::Coalesced)
    }
}

/// Handle to an admitted job: observe its status, wait for a terminal state,
/// or request cancellation.
#[derive(Clone)]
pub struct JobHandle {
    id: JobId,
    cancel: CancelToken,
    status: watch::Receiver<JobStatus>,
}

impl JobHandle {
    /// The job's id.
    pub fn id(&self) -> JobId {
        self.id
    }

    /// The current status.
    pub fn status(&self) -> JobStatus {
        *self.status.borrow()
    }

    /// The job's cancellation token, for wiring into signal handlers.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Request cancellation. The job aborts before its next target; targets
    /// already completed are not rolled back.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait until the job reaches a terminal state and return it.
    pub async fn wait(&mut self) -> JobStatus {
        loop {
            let status = *self.status.borrow_and_update();
            if status.is_terminal() {
                return status;
            }
            if self.status.changed().await.is_err() {
                // Sender gone; the last observed value is final.
                return *self.status.borrow();
            }
        }
    }
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.id)
            .field("status", &self.status())
            .finish()
    }
}

/// Removes a registry entry when the job reaches a terminal transition,
/// including the unwind path.
struct RegistryGuard {
    inner: Arc<SchedulerInner>,
    id: JobId,
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        self.inner.lock_jobs().retain(|job| job.id != self.id);
    }
}

struct SchedulerInner {
    jobs: Mutex<Vec<LiveJob>>,
    throttle: Duration,
}

impl SchedulerInner {
    fn lock_jobs(&self) -> MutexGuard<'_, Vec<LiveJob>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The process-wide job scheduler, explicitly owned and cheap to clone.
///
/// Jobs execute on the tokio runtime the scheduler is used from; `submit`
/// must therefore be called within a runtime context.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    /// Create a scheduler with the default progress throttle interval.
    pub fn new() -> Self {
        Self::with_throttle(DEFAULT_THROTTLE)
    }

    /// Create a scheduler that forwards progress at most once per
    /// `throttle`.
    pub fn with_throttle(throttle: Duration) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                jobs: Mutex::new(Vec::new()),
                throttle,
            }),
        }
    }

    /// Submit a synchronization job.
    ///
    /// The admission scan, the decision, and the registry insertion happen
    /// atomically under the registry lock: if any queued or running
    /// synchronization job fully covers this one, the submission is dropped
    /// and nothing runs; otherwise the job is registered and spawned onto
    /// the worker pool.
    pub fn submit(&self, job: SyncJob) -> Submission {
        let key = job.coverage_key();

        let id = {
            let mut jobs = self.inner.lock_jobs();
            let covered = jobs.iter().any(|live| {
                live.family == JobFamily::Synchronize
                    && live
                        .coverage
                        .as_ref()
                        .is_some_and(|existing| key.is_covered_by(existing))
            });
            if covered {
                tracing::debug!(label = %job.label(), "already covered by a queued or running job, dropping");
                return Submission::Coalesced;
            }

            let id = JobId::new();
            jobs.push(LiveJob {
                id,
                family: JobFamily::Synchronize,
                coverage: Some(key),
            });
            id
        };

        tracing::debug!(job = %id, label = %job.label(), "synchronization admitted");

        let throttle = self.inner.throttle;
        let handle = self.spawn(id, move |token| async move { job.run(&token, throttle).await });
        Submission::Scheduled(handle)
    }

    /// Schedule a background dependency refresh for one target.
    ///
    /// Refresh jobs belong to their own family: they are registered but
    /// never participate in coverage, and their failures are logged rather
    /// than surfaced. The job performs no work at all if the target reports
    /// a synchronization already in progress.
    pub fn submit_refresh(&self, target: Arc<dyn SyncTarget>) -> JobHandle {
        let id = JobId::new();
        self.inner.lock_jobs().push(LiveJob {
            id,
            family: JobFamily::Refresh,
            coverage: None,
        });

        tracing::debug!(job = %id, project = %target.id(), "dependency refresh scheduled");

        self.spawn(id, move |token| async move {
            refresh::run_silent(target, &token).await
        })
    }

    /// Number of queued or running jobs in `family`.
    pub fn active(&self, family: JobFamily) -> usize {
        self.inner
            .lock_jobs()
            .iter()
            .filter(|job| job.family == family)
            .count()
    }

    fn spawn<F, Fut>(&self, id: JobId, body: F) -> JobHandle
    where
        F: FnOnce(CancelToken) -> Fut + Send + 'static,
        Fut: Future<Output = JobStatus> + Send + 'static,
    {
        let (status_tx, status_rx) = watch::channel(JobStatus::Queued);
        let token = CancelToken::new();
        let guard = RegistryGuard {
            inner: Arc::clone(&self.inner),
            id,
        };

        let run_token = token.clone();
        tokio::spawn(async move {
            // Held for the job's lifetime; dropping it - normally or during
            // unwind - is the terminal transition that prunes the registry.
            let _guard = guard;
            status_tx.send_replace(JobStatus::Running);
            let status = body(run_token).await;
            status_tx.send_replace(status);
        });

        JobHandle {
            id,
            cancel: token,
            status: status_rx,
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
