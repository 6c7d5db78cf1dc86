//! The synchronization target contract.
//!
//! A target is one buildable unit of the workspace. The scheduler treats its
//! `synchronize` entry point as an opaque, potentially long-running operation;
//! everything the build tool actually does lives behind this trait.

use std::fmt;
use std::io;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cancel::CancelToken;
use crate::policy::{Initializer, NewProjectPolicy};
use crate::progress::ProgressSlice;

/// Stable identity of a buildable project, used for set membership and
/// coverage comparison between jobs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    /// Create an id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Errors produced by a target's synchronize operation.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The operation observed a cancellation request and stopped early.
    /// This is a distinct terminal cause, never reported as a failure.
    #[error("synchronization canceled")]
    Canceled,

    /// The underlying build operation ran and failed.
    #[error("build operation failed: {0}")]
    Build(String),

    /// I/O failure while driving the build operation.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Any other target-specific failure.
    #[error("{0}")]
    Other(String),
}

/// One buildable unit subject to synchronization.
///
/// Implementations own their `is_sync_in_progress` flag exclusively; the
/// scheduler only ever reads it. The flag is advisory - a narrower refresh
/// job consults it to skip redundant work, but it is not a lock.
#[async_trait]
pub trait SyncTarget: Send + Sync {
    /// Stable identity of this target.
    fn id(&self) -> &ProjectId;

    /// Human-readable name used in progress and status messages.
    fn label(&self) -> &str;

    /// Lightweight, non-blocking query: is a synchronize call currently
    /// running against this target?
    fn is_sync_in_progress(&self) -> bool;

    /// Synchronize external project state with the workspace.
    ///
    /// Blocks until the underlying build operation finishes. Implementations
    /// should poll `token` if they want sub-target cancellation latency, and
    /// must be safe under concurrent calls or rely on callers not submitting
    /// overlapping target sets.
    async fn synchronize(
        &self,
        policy: &NewProjectPolicy,
        initializer: &Initializer,
        token: &CancelToken,
        progress: ProgressSlice,
    ) -> Result<(), SyncError>;
}
