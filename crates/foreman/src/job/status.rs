//! Job lifecycle states and the failure reporting channel.

use std::fmt;
use std::sync::Arc;

use crate::target::SyncError;

/// Lifecycle state of a scheduled job.
///
/// `Cancelled` is a distinct terminal state, not a failure: a cancelled job
/// is never routed through the failure handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Admitted, waiting for the worker pool.
    Queued,
    /// Currently executing.
    Running,
    /// Ran to the end without a reported failure.
    Completed,
    /// Aborted by a reported failure; remaining targets were skipped.
    Failed,
    /// Aborted by a cancellation request; already-completed targets are not
    /// rolled back.
    Cancelled,
}

impl JobStatus {
    /// Whether the job has reached a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// A failure wrapped with the job's human-readable operation label.
///
/// This is the only path by which failures reach the caller: errors are data
/// at the scheduler boundary, never control flow.
#[derive(Debug)]
pub struct SyncFailure {
    /// The job's operation label, e.g. "Synchronize projects with workspace".
    pub operation: String,
    /// The underlying cause from the initializer or a target.
    pub cause: SyncError,
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.operation, self.cause)
    }
}

/// Handler invoked with a job's failure status.
///
/// Supplied at job construction; interactive jobs typically surface the
/// failure to the user, background jobs log it.
pub type StatusHandler = Arc<dyn Fn(SyncFailure) + Send + Sync>;
