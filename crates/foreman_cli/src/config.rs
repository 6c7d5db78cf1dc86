//! Configuration file support for foreman.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `FOREMAN_`)
//! 3. Config file (~/.config/foreman/config.toml or ./foreman.toml)
//! 4. Built-in defaults
//!
//! Example config file:
//! ```toml
//! [[projects]]
//! name = "core"
//! dir = "core"
//! command = "cargo build"
//!
//! [[projects]]
//! name = "app"
//! dir = "app"
//! command = "cargo build --bin app"
//!
//! [sync]
//! throttle_ms = 500
//! import_new = false
//!
//! [cache]
//! dir = "~/.local/state/foreman/deps"  # optional, this is the default
//! ```

use std::path::PathBuf;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Projects known to the workspace.
    pub projects: Vec<ProjectConfig>,
    /// Default sync options.
    pub sync: SyncConfig,
    /// Dependency cache settings.
    pub cache: CacheConfig,
}

/// One configured project.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Name used on the command line and in progress output.
    pub name: String,
    /// Project directory the build command runs in.
    pub dir: PathBuf,
    /// Build command executed to synchronize the project.
    pub command: String,
}

/// Default sync options.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Minimum milliseconds between forwarded progress updates.
    pub throttle_ms: u64,
    /// Whether to import newly discovered projects by default.
    pub import_new: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            throttle_ms: 500,
            import_new: false,
        }
    }
}

/// Dependency cache settings.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache directory. Defaults to the XDG state directory.
    pub dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/foreman/config.toml)
    /// 3. Local config file (./foreman.toml)
    /// 4. Environment variables with FOREMAN_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(proj_dirs) = ProjectDirs::from("", "", "foreman") {
            let xdg_config = proj_dirs.config_dir().join("config.toml");
            if xdg_config.exists() {
                tracing::debug!("Loading config from {:?}", xdg_config);
                builder = builder.add_source(
                    File::from(xdg_config)
                        .format(FileFormat::Toml)
                        .required(false),
                );
            }
        }

        let local_config = PathBuf::from("foreman.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./foreman.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix("FOREMAN")
                .separator("_")
                .try_parsing(true),
        );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// Resolve the dependency cache directory, falling back to the state
    /// directory (`~/.local/state/foreman/deps` on Linux).
    pub fn cache_dir(&self) -> Option<PathBuf> {
        self.cache
            .dir
            .clone()
            .or_else(|| Self::default_state_dir().map(|dir| dir.join("deps")))
    }

    /// Select projects by name; an empty selection means all configured
    /// projects.
    ///
    /// # Errors
    ///
    /// Returns the first unknown name.
    pub fn select_projects(&self, names: &[String]) -> Result<Vec<ProjectConfig>, String> {
        if names.is_empty() {
            return Ok(self.projects.clone());
        }

        names
            .iter()
            .map(|name| {
                self.projects
                    .iter()
                    .find(|p| p.name == *name)
                    .cloned()
                    .ok_or_else(|| {
                        format!("Project '{name}' is not configured. Add it to foreman.toml first.")
                    })
            })
            .collect()
    }

    /// The default state directory path.
    ///
    /// On Linux this is `$XDG_STATE_HOME/foreman` or `~/.local/state/foreman`;
    /// macOS/Windows fall back to the data directory.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "foreman").map(|dirs| {
            dirs.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| dirs.data_dir().to_path_buf())
        })
    }
}
