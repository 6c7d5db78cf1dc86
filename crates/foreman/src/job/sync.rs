//! The synchronization job and its admission-control predicate.
//!
//! A job is frozen at construction: a deduplicated, order-preserving target
//! set, a new-project policy, an initializer, a progress sink, and a status
//! handler. The scheduler drops a submission when a queued or running job
//! already *covers* it: same target set, and the new job either has no
//! preference on the policy/initializer dimensions or matches them exactly.

use std::sync::Arc;
use std::time::Duration;

use indexmap::{IndexMap, IndexSet};
use thiserror::Error;

use crate::cancel::CancelToken;
use crate::job::status::{JobStatus, StatusHandler, SyncFailure};
use crate::policy::{Initializer, NewProjectPolicy};
use crate::progress::throttle::ThrottledReporter;
use crate::progress::{DiscardSink, ProgressSink, ProgressSlice};
use crate::target::{ProjectId, SyncError, SyncTarget};

/// Default operation label for synchronization jobs.
pub const DEFAULT_LABEL: &str = "Synchronize projects with workspace";

/// Error building a [`SyncJob`].
#[derive(Debug, Error)]
pub enum SyncJobError {
    /// The builder was finalized without any target.
    #[error("a synchronization job needs at least one target")]
    NoTargets,
}

/// The initializer component of a coverage key. Identity-tagged tasks
/// compare by id; the no-op sentinel compares equal only to itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum InitializerRef {
    NoOp,
    Task(u64),
}

impl InitializerRef {
    fn of(initializer: &Initializer) -> Self {
        match initializer {
            Initializer::NoOp => Self::NoOp,
            Initializer::Task(task) => Self::Task(task.id()),
        }
    }
}

/// The part of a job the admission scan compares: target-id set, policy, and
/// initializer identity. Kept in the registry for the job's lifetime.
#[derive(Debug, Clone)]
pub(crate) struct CoverageKey {
    targets: IndexSet<ProjectId>,
    policy: NewProjectPolicy,
    initializer: InitializerRef,
}

impl CoverageKey {
    /// Whether `other` (an already queued or running job) fully covers this
    /// key. True iff:
    ///
    /// 1. both jobs name the same target set, and
    /// 2. this job's policy is the no-op sentinel or equals the other's, and
    /// 3. this job's initializer is the no-op sentinel or is the same
    ///    instance as the other's.
    ///
    /// A no-op on a dimension declares "no preference", so any existing job
    /// satisfies it; a job that does care is only redundant against an
    /// identical-intent job.
    pub(crate) fn is_covered_by(&self, other: &CoverageKey) -> bool {
        self.targets == other.targets
            && (self.policy.is_noop() || self.policy == other.policy)
            && (self.initializer == InitializerRef::NoOp || self.initializer == other.initializer)
    }
}

/// One scheduled request to synchronize a set of targets.
///
/// Build with [`SyncJob::builder`], then hand to
/// [`Scheduler::submit`](crate::job::scheduler::Scheduler::submit).
pub struct SyncJob {
    label: String,
    targets: IndexMap<ProjectId, Arc<dyn SyncTarget>>,
    policy: NewProjectPolicy,
    initializer: Initializer,
    sink: Arc<dyn ProgressSink>,
    on_status: StatusHandler,
}

impl SyncJob {
    /// Start building a job.
    pub fn builder() -> SyncJobBuilder {
        SyncJobBuilder::default()
    }

    /// The job's operation label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The deduplicated target ids, in insertion order.
    pub fn target_ids(&self) -> impl Iterator<Item = &ProjectId> {
        self.targets.keys()
    }

    pub(crate) fn coverage_key(&self) -> CoverageKey {
        CoverageKey {
            targets: self.targets.keys().cloned().collect(),
            policy: self.policy.clone(),
            initializer: InitializerRef::of(&self.initializer),
        }
    }

    /// Execute the job: one progress unit for the initializer, one per
    /// target, targets in insertion order. The first error aborts the
    /// remaining loop and is routed through the status handler; cancellation
    /// is polled once per iteration and yields the distinct `Cancelled`
    /// state.
    pub(crate) async fn run(self, token: &CancelToken, throttle: Duration) -> JobStatus {
        let total = self.targets.len() as u64 + 1;
        let reporter = Arc::new(ThrottledReporter::new(
            Arc::clone(&self.sink),
            total,
            throttle,
        ));

        let slice = ProgressSlice::new(Arc::clone(&reporter), 1);
        if let Err(cause) = self.initializer.run(slice, token).await {
            return self.conclude(cause);
        }

        for target in self.targets.values() {
            if token.is_canceled() || reporter.is_canceled() {
                tracing::debug!(label = %self.label, "cancellation requested, aborting remaining targets");
                return JobStatus::Cancelled;
            }

            let slice = ProgressSlice::new(Arc::clone(&reporter), 1);
            slice.message(target.label());
            if let Err(cause) = target
                .synchronize(&self.policy, &self.initializer, token, slice)
                .await
            {
                return self.conclude(cause);
            }
        }

        reporter.finish(Some(&self.label));
        JobStatus::Completed
    }

    /// Map an error from the initializer or a target to the job's terminal
    /// state, routing real failures through the status handler.
    fn conclude(&self, cause: SyncError) -> JobStatus {
        if matches!(cause, SyncError::Canceled) {
            return JobStatus::Cancelled;
        }

        (self.on_status)(SyncFailure {
            operation: self.label.clone(),
            cause,
        });
        JobStatus::Failed
    }
}

/// Builder for [`SyncJob`].
pub struct SyncJobBuilder {
    label: String,
    targets: IndexMap<ProjectId, Arc<dyn SyncTarget>>,
    policy: NewProjectPolicy,
    initializer: Initializer,
    sink: Arc<dyn ProgressSink>,
    on_status: Option<StatusHandler>,
}

impl Default for SyncJobBuilder {
    fn default() -> Self {
        Self {
            label: DEFAULT_LABEL.to_string(),
            targets: IndexMap::new(),
            policy: NewProjectPolicy::NoOp,
            initializer: Initializer::NoOp,
            sink: Arc::new(DiscardSink::default()),
            on_status: None,
        }
    }
}

impl SyncJobBuilder {
    /// Set the operation label used in progress and failure messages.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Add one target. Duplicate ids keep the first registration.
    pub fn target(mut self, target: Arc<dyn SyncTarget>) -> Self {
        self.targets.entry(target.id().clone()).or_insert(target);
        self
    }

    /// Add many targets.
    pub fn targets(mut self, targets: impl IntoIterator<Item = Arc<dyn SyncTarget>>) -> Self {
        for target in targets {
            self = self.target(target);
        }
        self
    }

    /// Set the new-project policy. Defaults to the no-op sentinel.
    pub fn policy(mut self, policy: NewProjectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the initializer. Defaults to the no-op sentinel.
    pub fn initializer(mut self, initializer: Initializer) -> Self {
        self.initializer = initializer;
        self
    }

    /// Set the progress sink. Defaults to a discard sink.
    pub fn progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Set the failure handler. Defaults to logging via `tracing`.
    pub fn on_status(mut self, handler: StatusHandler) -> Self {
        self.on_status = Some(handler);
        self
    }

    /// Finalize the job.
    ///
    /// # Errors
    ///
    /// Returns [`SyncJobError::NoTargets`] if no target was added.
    pub fn build(self) -> Result<SyncJob, SyncJobError> {
        if self.targets.is_empty() {
            return Err(SyncJobError::NoTargets);
        }

        let on_status = self.on_status.unwrap_or_else(|| {
            Arc::new(|failure: SyncFailure| {
                tracing::error!(operation = %failure.operation, error = %failure.cause, "synchronization failed");
            })
        });

        Ok(SyncJob {
            label: self.label,
            targets: self.targets,
            policy: self.policy,
            initializer: self.initializer,
            sink: self.sink,
            on_status,
        })
    }
}
