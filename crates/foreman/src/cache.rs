//! Durable cache of previously resolved dependency state.
//!
//! One JSON document per project, stored under a cache directory. The cache
//! is the fast path for dependency-view refresh requests: a hit means no job
//! needs to be scheduled at all. Corrupt entries are treated as misses, not
//! errors - the fallback path re-resolves and overwrites them.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::target::ProjectId;

/// Errors from cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem failure reading or writing an entry.
    #[error("cache I/O error: {0}")]
    Io(#[from] io::Error),

    /// Failed to serialize an entry for storage.
    #[error("cache serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// What kind of dependency an entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// An external library artifact.
    Library,
    /// Another project in the workspace.
    Project,
}

/// One resolved dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEntry {
    /// Dependency name.
    pub name: String,
    /// Library or workspace project.
    pub kind: DependencyKind,
    /// Where the dependency lives on disk.
    pub location: PathBuf,
}

/// The resolved dependency state of one project, as recorded by the last
/// successful synchronization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedDependencies {
    /// The project this state belongs to.
    pub project: ProjectId,
    /// Resolved entries.
    pub entries: Vec<DependencyEntry>,
    /// When this state was resolved.
    pub resolved_at: DateTime<Utc>,
}

/// File-backed store of [`ResolvedDependencies`], one document per project.
#[derive(Debug, Clone)]
pub struct DependencyCache {
    dir: PathBuf,
}

impl DependencyCache {
    /// Open (and create if needed) a cache rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Load the entry for `project`, if present and readable.
    ///
    /// A corrupt document is logged and reported as a miss so callers fall
    /// back to re-resolving.
    pub fn load(&self, project: &ProjectId) -> Result<Option<ResolvedDependencies>, CacheError> {
        let path = self.entry_path(project);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_str(&raw) {
            Ok(resolved) => Ok(Some(resolved)),
            Err(error) => {
                tracing::warn!(project = %project, path = %path.display(), %error, "discarding corrupt cache entry");
                Ok(None)
            }
        }
    }

    /// Store (or overwrite) the entry for `resolved.project`.
    pub fn store(&self, resolved: &ResolvedDependencies) -> Result<(), CacheError> {
        let path = self.entry_path(&resolved.project);
        let raw = serde_json::to_vec_pretty(resolved)?;
        fs::write(&path, raw)?;
        Ok(())
    }

    /// Remove the entry for `project`. Returns whether an entry existed.
    pub fn remove(&self, project: &ProjectId) -> Result<bool, CacheError> {
        match fs::remove_file(self.entry_path(project)) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// The cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, project: &ProjectId) -> PathBuf {
        // Project ids are caller-defined; keep file names safe.
        let sanitized: String = project
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
            .collect();
        self.dir.join(format!("{sanitized}.json"))
    }
}
