use std::sync::atomic::{AtomicBool, Ordering};

use foreman::ProgressSink;

/// Logging progress sink using tracing for structured output.
pub struct LoggingSink {
    canceled: AtomicBool,
}

impl LoggingSink {
    /// Create a new logging sink.
    pub fn new() -> Self {
        Self {
            canceled: AtomicBool::new(false),
        }
    }
}

impl Default for LoggingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for LoggingSink {
    fn update(&self, work_done: u64, total: u64, label: Option<&str>) {
        tracing::info!(work_done, total, label = label.unwrap_or(""), "synchronization progress");
    }

    fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }

    fn set_canceled(&self) {
        self.canceled.store(true, Ordering::Release);
        tracing::warn!("cancellation requested through the progress sink");
    }
}
