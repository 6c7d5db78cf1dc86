//! Configured projects as synchronization targets.
//!
//! Each project synchronizes by running its configured build command as a
//! subprocess in the project directory. The command is the opaque "build
//! operation" from the scheduler's point of view.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use foreman::{
    CancelToken, Initializer, NewProjectPolicy, ProgressSlice, ProjectId, SyncError, SyncTarget,
};
use tokio::process::Command;

use crate::config::ProjectConfig;

/// How often the cancel token is polled while the build command runs.
const CANCEL_POLL: Duration = Duration::from_millis(200);

/// A workspace project backed by a shell command.
pub struct CommandProject {
    id: ProjectId,
    name: String,
    dir: PathBuf,
    command: String,
    syncing: AtomicBool,
}

impl CommandProject {
    /// Create a project from its parts.
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>, command: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: ProjectId::new(name.clone()),
            name,
            dir: dir.into(),
            command: command.into(),
            syncing: AtomicBool::new(false),
        }
    }

    /// Create a project from its config entry.
    pub fn from_config(config: &ProjectConfig) -> Self {
        Self::new(config.name.clone(), config.dir.clone(), config.command.clone())
    }

    async fn run_command(&self, token: &CancelToken) -> Result<(), SyncError> {
        tracing::debug!(project = %self.name, command = %self.command, "running build command");

        let child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .current_dir(&self.dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = child.wait_with_output();
        tokio::pin!(output);

        loop {
            tokio::select! {
                result = &mut output => {
                    let output = result?;
                    if output.status.success() {
                        return Ok(());
                    }
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    let detail = stderr.trim().lines().last().unwrap_or("").to_string();
                    let message = if detail.is_empty() {
                        format!("`{}` {}", self.command, output.status)
                    } else {
                        format!("`{}` {}: {}", self.command, output.status, detail)
                    };
                    return Err(SyncError::Build(message));
                }
                _ = tokio::time::sleep(CANCEL_POLL) => {
                    if token.is_canceled() {
                        // Returning drops the output future, which kills the
                        // child via kill_on_drop.
                        return Err(SyncError::Canceled);
                    }
                }
            }
        }
    }
}

/// Clears the in-progress flag however synchronize exits.
struct InProgressGuard<'a>(&'a AtomicBool);

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[async_trait]
impl SyncTarget for CommandProject {
    fn id(&self) -> &ProjectId {
        &self.id
    }

    fn label(&self) -> &str {
        &self.name
    }

    fn is_sync_in_progress(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    async fn synchronize(
        &self,
        _policy: &NewProjectPolicy,
        _initializer: &Initializer,
        token: &CancelToken,
        progress: ProgressSlice,
    ) -> Result<(), SyncError> {
        self.syncing.store(true, Ordering::Release);
        let _guard = InProgressGuard(&self.syncing);

        progress.message(&self.name);
        let result = self.run_command(token).await;
        if result.is_ok() {
            progress.finish(Some(&self.name));
        }
        result
    }
}
