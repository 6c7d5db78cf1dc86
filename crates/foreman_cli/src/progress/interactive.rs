use std::sync::atomic::{AtomicBool, Ordering};

use foreman::ProgressSink;
use indicatif::{ProgressBar, ProgressStyle};

/// Interactive progress sink using a single indicatif bar.
///
/// Starts as a spinner; the first update carries the job's total and
/// converts it into a bar sized to the work budget.
pub struct InteractiveSink {
    bar: ProgressBar,
    canceled: AtomicBool,
}

impl InteractiveSink {
    /// Create the sink with a ticking spinner until the first update.
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(Self::spinner_style());
        bar.set_prefix(format!("{:12}", "Sync"));
        bar.set_message("Waiting for the scheduler...");
        bar.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            bar,
            canceled: AtomicBool::new(false),
        }
    }

    /// Finish the bar, keeping the final message on screen.
    pub fn finish(&self) {
        if !self.bar.is_finished() {
            self.bar.finish();
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.cyan} {spinner:.green} {msg}")
            .expect("Invalid template")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos:>3}/{len:3} {msg}")
            .expect("Invalid template")
            .progress_chars("█▓░")
    }
}

impl Default for InteractiveSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for InteractiveSink {
    fn update(&self, work_done: u64, total: u64, label: Option<&str>) {
        if self.bar.length() != Some(total) {
            self.bar.set_length(total);
            self.bar.set_style(Self::bar_style());
            self.bar.disable_steady_tick();
        }
        self.bar.set_position(work_done);
        if let Some(label) = label {
            self.bar.set_message(label.to_string());
        }
    }

    fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }

    fn set_canceled(&self) {
        self.canceled.store(true, Ordering::Release);
        self.bar.abandon_with_message("canceled");
    }
}
