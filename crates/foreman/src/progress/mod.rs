//! Progress reporting boundary.
//!
//! The scheduler talks to the outside world through [`ProgressSink`]: a raw
//! sink that accepts cumulative `(work_done, total, label)` updates and
//! answers cancellation queries. Jobs never call a sink directly; they go
//! through [`throttle::ThrottledReporter`], which bounds the forwarding rate,
//! and hand each sub-step a [`ProgressSlice`] of the overall budget.

pub mod throttle;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use self::throttle::ThrottledReporter;

/// The raw progress sink an embedder supplies (a progress bar, a log, a UI
/// task list).
///
/// Updates are cumulative: `work_done` out of `total` units, optionally with
/// a text label. Updates may arrive from a different thread than the one
/// that submitted the job. Cancellation state is part of the sink so a UI
/// can both observe and request cancellation through the same object.
pub trait ProgressSink: Send + Sync {
    /// Receive a progress update.
    fn update(&self, work_done: u64, total: u64, label: Option<&str>);

    /// Whether cancellation has been requested through this sink.
    fn is_canceled(&self) -> bool;

    /// Request cancellation through this sink.
    fn set_canceled(&self);
}

/// A sink that discards all updates and only tracks the canceled flag.
///
/// Used by non-interactive jobs, which run silently in the background.
#[derive(Debug, Default)]
pub struct DiscardSink {
    canceled: AtomicBool,
}

impl ProgressSink for DiscardSink {
    fn update(&self, _work_done: u64, _total: u64, _label: Option<&str>) {}

    fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }

    fn set_canceled(&self) {
        self.canceled.store(true, Ordering::Release);
    }
}

/// A bounded portion of a job's progress budget allocated to one sub-step
/// (the initializer or a single target).
///
/// The slice accounts for its units exactly once: either when the sub-step
/// calls [`finish`](Self::finish), or on drop if the sub-step forgot or
/// bailed early. That keeps the job's accumulated total truthful no matter
/// how a sub-step exits.
pub struct ProgressSlice {
    reporter: Arc<ThrottledReporter>,
    units: u64,
    consumed: AtomicBool,
}

impl ProgressSlice {
    /// Allocate `units` of `reporter`'s budget to one sub-step.
    pub fn new(reporter: Arc<ThrottledReporter>, units: u64) -> Self {
        Self {
            reporter,
            units,
            consumed: AtomicBool::new(false),
        }
    }

    /// Post a label-only update (no work is accounted). Subject to the same
    /// rate limiting as any other update.
    pub fn message(&self, label: &str) {
        self.reporter.message(label);
    }

    /// Mark this slice's units as done. Idempotent.
    pub fn finish(&self, label: Option<&str>) {
        if !self.consumed.swap(true, Ordering::AcqRel) {
            self.reporter.advance(self.units, label);
        }
    }

    /// Whether cancellation has been requested on the underlying sink.
    /// Always answered immediately, never rate limited.
    pub fn is_canceled(&self) -> bool {
        self.reporter.is_canceled()
    }
}

impl Drop for ProgressSlice {
    fn drop(&mut self) {
        self.finish(None);
    }
}
