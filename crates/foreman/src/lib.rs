//! Foreman - a coalescing job scheduler for workspace synchronization.
//!
//! This library coordinates expensive, idempotent "synchronize a project with
//! the workspace" operations. Many triggers (user actions, file watchers,
//! lifecycle hooks) may request a synchronization concurrently or in rapid
//! succession; the scheduler drops submissions that are already covered by a
//! queued or running job, throttles progress reporting to a bounded rate, and
//! keeps narrower background refresh jobs from re-entering a synchronization
//! that is already underway.
//!
//! # Example
//!
//! ```ignore
//! use foreman::{Scheduler, Submission, SyncJob};
//!
//! let scheduler = Scheduler::new();
//! let job = SyncJob::builder()
//!     .target(project)
//!     .progress(reporter)
//!     .build()?;
//!
//! match scheduler.submit(job) {
//!     Submission::Scheduled(mut handle) => {
//!         let status = handle.wait().await;
//!         println!("finished: {status}");
//!     }
//!     Submission::Coalesced => {
//!         // an equivalent job is already queued or running
//!     }
//! }
//! ```

pub mod cache;
pub mod cancel;
pub mod events;
pub mod job;
pub mod policy;
pub mod progress;
pub mod target;
pub mod workspace;

pub use cache::{CacheError, DependencyCache, DependencyEntry, DependencyKind, ResolvedDependencies};
pub use cancel::CancelToken;
pub use events::{EventBus, FetchStrategy, ProjectView, WorkspaceEvent, spawn_view_refresh};
pub use job::refresh::{DependencyRefresher, RefreshOutcome};
pub use job::scheduler::{JobFamily, JobHandle, JobId, Scheduler, Submission};
pub use job::status::{JobStatus, StatusHandler, SyncFailure};
pub use job::sync::{SyncJob, SyncJobBuilder, SyncJobError};
pub use policy::{InitAction, Initializer, NewProjectPolicy};
pub use progress::throttle::ThrottledReporter;
pub use progress::{DiscardSink, ProgressSink, ProgressSlice};
pub use target::{ProjectId, SyncError, SyncTarget};
pub use workspace::Workspace;
