//! Progress reporting for synchronization runs.
//!
//! Two modes, auto-detected from the terminal:
//! - Interactive mode (TTY): an animated progress bar using indicatif
//! - Logging mode (non-TTY): structured logging using tracing
//!
//! Both implement the library's [`ProgressSink`], so they receive updates at
//! the scheduler's rate-limited cadence, never faster.

mod interactive;
mod logging;

use console::Term;
use foreman::ProgressSink;

pub use interactive::InteractiveSink;
pub use logging::LoggingSink;

/// Progress reporter that handles both interactive and logging modes.
pub enum ProgressReporter {
    /// Interactive progress bar for TTY.
    Interactive(InteractiveSink),
    /// Structured logging for non-TTY (CI, pipes).
    Logging(LoggingSink),
}

impl ProgressReporter {
    /// Create a new progress reporter, auto-detecting TTY mode.
    pub fn new() -> Self {
        if Term::stdout().is_term() {
            Self::Interactive(InteractiveSink::new())
        } else {
            Self::Logging(LoggingSink::new())
        }
    }

    /// Finish the progress display (interactive mode only).
    pub fn finish(&self) {
        if let Self::Interactive(sink) = self {
            sink.finish();
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ProgressReporter {
    fn update(&self, work_done: u64, total: u64, label: Option<&str>) {
        match self {
            Self::Interactive(sink) => sink.update(work_done, total, label),
            Self::Logging(sink) => sink.update(work_done, total, label),
        }
    }

    fn is_canceled(&self) -> bool {
        match self {
            Self::Interactive(sink) => sink.is_canceled(),
            Self::Logging(sink) => sink.is_canceled(),
        }
    }

    fn set_canceled(&self) {
        match self {
            Self::Interactive(sink) => sink.set_canceled(),
            Self::Logging(sink) => sink.set_canceled(),
        }
    }
}
