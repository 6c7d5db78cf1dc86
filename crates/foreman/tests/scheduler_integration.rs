//! Integration tests for admission control under real concurrency.
//!
//! These scenarios hold a job mid-flight with gated targets to observe the
//! coalescing behavior the unit tests can only check statically: duplicate
//! submissions dropped while a covering job runs, re-admission after the
//! terminal transition, and refresh jobs deferring to an in-flight
//! synchronization.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use foreman::{
    CancelToken, Initializer, JobFamily, JobStatus, NewProjectPolicy, ProgressSlice, ProjectId,
    Scheduler, SyncError, SyncJob, SyncTarget,
};

/// Generous upper bound; reaching it means a hang, not slowness.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A target whose synchronize call blocks until the test releases it.
struct GatedTarget {
    id: ProjectId,
    label: String,
    calls: AtomicUsize,
    started: Semaphore,
    release: Semaphore,
    in_progress: AtomicBool,
}

impl GatedTarget {
    fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: ProjectId::new(id),
            label: format!("project {id}"),
            calls: AtomicUsize::new(0),
            started: Semaphore::new(0),
            release: Semaphore::new(0),
            in_progress: AtomicBool::new(false),
        })
    }

    /// Wait until a synchronize call has begun.
    async fn wait_started(&self) {
        let permit = tokio::time::timeout(TEST_TIMEOUT, self.started.acquire())
            .await
            .expect("target should start in time")
            .expect("semaphore open");
        permit.forget();
    }

    /// Allow one blocked synchronize call to proceed.
    fn release_one(&self) {
        self.release.add_permits(1);
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SyncTarget for GatedTarget {
    fn id(&self) -> &ProjectId {
        &self.id
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn is_sync_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    async fn synchronize(
        &self,
        _policy: &NewProjectPolicy,
        _initializer: &Initializer,
        _token: &CancelToken,
        progress: ProgressSlice,
    ) -> Result<(), SyncError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.in_progress.store(true, Ordering::SeqCst);
        self.started.add_permits(1);

        let permit = self.release.acquire().await.expect("semaphore open");
        permit.forget();

        self.in_progress.store(false, Ordering::SeqCst);
        progress.finish(Some(&self.label));
        Ok(())
    }
}

/// An immediate target that never blocks.
struct PlainTarget {
    id: ProjectId,
    label: String,
    calls: AtomicUsize,
}

impl PlainTarget {
    fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: ProjectId::new(id),
            label: format!("project {id}"),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SyncTarget for PlainTarget {
    fn id(&self) -> &ProjectId {
        &self.id
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn is_sync_in_progress(&self) -> bool {
        false
    }

    async fn synchronize(
        &self,
        _policy: &NewProjectPolicy,
        _initializer: &Initializer,
        _token: &CancelToken,
        progress: ProgressSlice,
    ) -> Result<(), SyncError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        progress.finish(Some(&self.label));
        Ok(())
    }
}

fn job_for(target: Arc<dyn SyncTarget>) -> SyncJob {
    SyncJob::builder()
        .target(target)
        .build()
        .expect("valid job")
}

async fn wait_terminal(mut handle: foreman::JobHandle) -> JobStatus {
    tokio::time::timeout(TEST_TIMEOUT, handle.wait())
        .await
        .expect("job should reach a terminal state before the timeout")
}

#[tokio::test]
async fn duplicate_submission_is_dropped_while_covering_job_runs() {
    let scheduler = Scheduler::with_throttle(Duration::from_millis(1));
    let target = GatedTarget::new("p1");

    // Job A: admitted, blocks inside p1's synchronize.
    let first = scheduler
        .submit(job_for(Arc::clone(&target) as Arc<dyn SyncTarget>))
        .handle()
        .expect("first submission admitted");
    target.wait_started().await;

    // Job B: identical intent, dropped without running anything.
    let second = scheduler.submit(job_for(Arc::clone(&target) as Arc<dyn SyncTarget>));
    assert!(second.is_coalesced());
    assert_eq!(scheduler.active(JobFamily::Synchronize), 1);

    target.release_one();
    assert_eq!(wait_terminal(first).await, JobStatus::Completed);

    // p1 synchronized exactly once in total.
    assert_eq!(target.call_count(), 1);
    assert_eq!(scheduler.active(JobFamily::Synchronize), 0);
}

#[tokio::test]
async fn completed_job_no_longer_covers_new_submissions() {
    let scheduler = Scheduler::with_throttle(Duration::from_millis(1));
    let target = PlainTarget::new("p1");

    let first = scheduler
        .submit(job_for(Arc::clone(&target) as Arc<dyn SyncTarget>))
        .handle()
        .expect("first submission admitted");
    assert_eq!(wait_terminal(first).await, JobStatus::Completed);

    // After the terminal transition the registry is empty, so an identical
    // submission is admitted and runs again.
    let second = scheduler
        .submit(job_for(Arc::clone(&target) as Arc<dyn SyncTarget>))
        .handle()
        .expect("second submission admitted");
    assert_eq!(wait_terminal(second).await, JobStatus::Completed);

    assert_eq!(target.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn jobs_that_differ_under_coverage_run_concurrently() {
    let scheduler = Scheduler::with_throttle(Duration::from_millis(1));
    let target = GatedTarget::new("p1");

    let noop = scheduler
        .submit(job_for(Arc::clone(&target) as Arc<dyn SyncTarget>))
        .handle()
        .expect("no-op job admitted");
    target.wait_started().await;

    // Same target set, but this job cares about its policy; the running
    // no-op job does not satisfy it.
    let importing = scheduler
        .submit(
            SyncJob::builder()
                .target(Arc::clone(&target) as Arc<dyn SyncTarget>)
                .policy(NewProjectPolicy::Import)
                .build()
                .expect("valid job"),
        )
        .handle()
        .expect("import job admitted despite the running no-op job");

    target.wait_started().await;
    assert_eq!(scheduler.active(JobFamily::Synchronize), 2);

    target.release_one();
    target.release_one();
    assert_eq!(wait_terminal(noop).await, JobStatus::Completed);
    assert_eq!(wait_terminal(importing).await, JobStatus::Completed);
    assert_eq!(target.call_count(), 2);
}

#[tokio::test]
async fn cancellation_mid_loop_skips_remaining_targets() {
    let scheduler = Scheduler::with_throttle(Duration::from_millis(1));
    let gate = GatedTarget::new("t1");
    let second = PlainTarget::new("t2");
    let third = PlainTarget::new("t3");

    let job = SyncJob::builder()
        .target(Arc::clone(&gate) as Arc<dyn SyncTarget>)
        .target(Arc::clone(&second) as Arc<dyn SyncTarget>)
        .target(Arc::clone(&third) as Arc<dyn SyncTarget>)
        .build()
        .expect("valid job");

    let handle = scheduler.submit(job).handle().expect("job admitted");
    gate.wait_started().await;

    // Cancellation lands after t1 started but before t2; the poll at the top
    // of the next iteration aborts the loop.
    handle.cancel();
    gate.release_one();

    assert_eq!(wait_terminal(handle).await, JobStatus::Cancelled);
    assert_eq!(gate.call_count(), 1);
    assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    assert_eq!(third.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn refresh_defers_to_an_in_flight_synchronization() {
    let scheduler = Scheduler::with_throttle(Duration::from_millis(1));
    let target = GatedTarget::new("p1");

    let sync = scheduler
        .submit(job_for(Arc::clone(&target) as Arc<dyn SyncTarget>))
        .handle()
        .expect("sync admitted");
    target.wait_started().await;

    // The refresh observes the in-progress flag and performs no work.
    let refresh = scheduler.submit_refresh(Arc::clone(&target) as Arc<dyn SyncTarget>);
    assert_eq!(wait_terminal(refresh).await, JobStatus::Completed);
    assert_eq!(target.call_count(), 1, "refresh must not re-enter the sync");

    target.release_one();
    assert_eq!(wait_terminal(sync).await, JobStatus::Completed);
}
