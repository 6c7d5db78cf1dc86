//! Job configuration dimensions: the new-project policy and the initializer.
//!
//! Both carry a distinguished no-op value meaning "the caller has no
//! preference on this dimension". A submission using the no-op value is
//! satisfied by any queued or running job, which is what makes coalescing
//! safe; see [`crate::job::sync::SyncJob`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::cancel::CancelToken;
use crate::progress::ProgressSlice;
use crate::target::SyncError;

/// How newly discovered projects are treated during a synchronization.
///
/// `NoOp` doubles as the "no preference" sentinel for coverage comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewProjectPolicy {
    /// Leave newly discovered projects alone. Also means "any policy
    /// satisfies me" when deciding whether an existing job covers a new one.
    NoOp,
    /// Import newly discovered projects into the workspace.
    Import,
    /// A named caller-defined policy; equal only to a policy with the same
    /// name.
    Custom(String),
}

impl NewProjectPolicy {
    /// Whether this is the distinguished no-op value.
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::NoOp)
    }
}

impl Default for NewProjectPolicy {
    fn default() -> Self {
        Self::NoOp
    }
}

/// A unit of work run once before a job's target loop, against the first
/// unit of the job's progress budget.
#[async_trait]
pub trait InitAction: Send + Sync {
    /// Run the pre-step. An error aborts the job before any target runs.
    async fn run(&self, progress: ProgressSlice, token: &CancelToken) -> Result<(), SyncError>;
}

static NEXT_INITIALIZER_ID: AtomicU64 = AtomicU64::new(1);

/// An initializer wrapped with a process-unique identity.
///
/// Two initializers are the same only if they are literally the same wrapped
/// instance (or clones of it); cloning preserves the identity.
#[derive(Clone)]
pub struct InitTask {
    id: u64,
    action: Arc<dyn InitAction>,
}

impl InitTask {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

impl PartialEq for InitTask {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for InitTask {}

impl fmt::Debug for InitTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitTask").field("id", &self.id).finish_non_exhaustive()
    }
}

/// The initializer dimension of a job: either the no-op sentinel or an
/// identity-tagged task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Initializer {
    /// Nothing to run before the target loop; also the "no preference"
    /// sentinel for coverage comparison.
    NoOp,
    /// A concrete pre-step with identity-based equality.
    Task(InitTask),
}

impl Initializer {
    /// Wrap an action, assigning it a fresh identity.
    pub fn new(action: impl InitAction + 'static) -> Self {
        Self::Task(InitTask {
            id: NEXT_INITIALIZER_ID.fetch_add(1, Ordering::Relaxed),
            action: Arc::new(action),
        })
    }

    /// Whether this is the distinguished no-op value.
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::NoOp)
    }

    /// Run the initializer against its progress unit. The no-op variant only
    /// consumes the unit.
    pub(crate) async fn run(
        &self,
        progress: ProgressSlice,
        token: &CancelToken,
    ) -> Result<(), SyncError> {
        match self {
            Self::NoOp => {
                progress.finish(None);
                Ok(())
            }
            Self::Task(task) => task.action.run(progress, token).await,
        }
    }
}

impl Default for Initializer {
    fn default() -> Self {
        Self::NoOp
    }
}
