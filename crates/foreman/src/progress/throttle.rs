//! Rate-limited progress forwarding.
//!
//! Sub-steps may report progress far more often than a UI can usefully
//! render. The reporter here accumulates every update immediately - no
//! progress is ever lost - but forwards to the wrapped sink at most once per
//! configured interval. The terminal update is always flushed, so the last
//! update a sink sees carries the true cumulative total. Dropping
//! intermediate updates is purely a data-rate decision, never a correctness
//! one.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

use super::ProgressSink;

/// Type alias for the governor rate limiter.
type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Default interval between forwarded updates.
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(500);

/// Wraps a [`ProgressSink`] and bounds how often updates reach it.
///
/// Forwarding rules:
/// - every `advance` accumulates into the internal counter immediately;
/// - the accumulated total is forwarded only when the configured interval
///   has elapsed since the last forwarded update, or the total has reached
///   100 %, or [`finish`](Self::finish) forces the terminal flush;
/// - cancellation queries always pass straight through - a delayed
///   cancellation check would make the whole system feel unresponsive.
pub struct ThrottledReporter {
    sink: Arc<dyn ProgressSink>,
    total: u64,
    done: AtomicU64,
    limiter: DirectRateLimiter,
}

impl ThrottledReporter {
    /// Wrap `sink` with a fixed work budget of `total` units, forwarding at
    /// most one update per `interval`.
    pub fn new(sink: Arc<dyn ProgressSink>, total: u64, interval: Duration) -> Self {
        let interval = interval.max(Duration::from_millis(1));
        let quota = Quota::with_period(interval).unwrap_or_else(|| {
            // Unreachable with a clamped non-zero interval; fall back to one
            // update per second rather than panicking.
            Quota::per_second(NonZeroU32::new(1).expect("1 is non-zero"))
        });

        Self {
            sink,
            total,
            done: AtomicU64::new(0),
            limiter: RateLimiter::direct(quota),
        }
    }

    /// Accumulate `delta` completed units and forward if the rate limiter
    /// allows it or the budget is now exhausted.
    pub fn advance(&self, delta: u64, label: Option<&str>) {
        let done = self
            .done
            .fetch_add(delta, Ordering::AcqRel)
            .saturating_add(delta)
            .min(self.total);

        if done >= self.total || self.limiter.check().is_ok() {
            self.sink.update(done, self.total, label);
        }
    }

    /// Post a label-only update, subject to rate limiting.
    pub fn message(&self, label: &str) {
        self.advance(0, Some(label));
    }

    /// Force-flush the accumulated total to the sink, bypassing the rate
    /// limiter. Called on job completion.
    pub fn finish(&self, label: Option<&str>) {
        let done = self.done.load(Ordering::Acquire).min(self.total);
        self.sink.update(done, self.total, label);
    }

    /// Units accumulated so far (clamped to the budget).
    pub fn work_done(&self) -> u64 {
        self.done.load(Ordering::Acquire).min(self.total)
    }

    /// The fixed work budget.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Cancellation query, passed through immediately.
    pub fn is_canceled(&self) -> bool {
        self.sink.is_canceled()
    }

    /// Request cancellation on the underlying sink, passed through
    /// immediately.
    pub fn set_canceled(&self) {
        self.sink.set_canceled();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicBool;

    /// Sink that records every forwarded update, for assertions.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub(crate) updates: Mutex<Vec<(u64, u64, Option<String>)>>,
        canceled: AtomicBool,
    }

    impl RecordingSink {
        pub(crate) fn forwarded(&self) -> Vec<(u64, u64, Option<String>)> {
            self.updates
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone()
        }
    }

    impl ProgressSink for RecordingSink {
        fn update(&self, work_done: u64, total: u64, label: Option<&str>) {
            self.updates
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push((work_done, total, label.map(str::to_owned)));
        }

        fn is_canceled(&self) -> bool {
            self.canceled.load(Ordering::Acquire)
        }

        fn set_canceled(&self) {
            self.canceled.store(true, Ordering::Release);
        }
    }

    #[test]
    fn first_update_is_forwarded_immediately() {
        let sink = Arc::new(RecordingSink::default());
        let reporter =
            ThrottledReporter::new(Arc::clone(&sink) as Arc<dyn ProgressSink>, 10, Duration::from_secs(60));

        reporter.advance(1, Some("starting"));

        let forwarded = sink.forwarded();
        assert_eq!(forwarded.len(), 1);
        assert_eq!(forwarded[0], (1, 10, Some("starting".to_string())));
    }

    #[test]
    fn rapid_updates_are_coalesced_but_total_is_never_lost() {
        let sink = Arc::new(RecordingSink::default());
        let reporter =
            ThrottledReporter::new(Arc::clone(&sink) as Arc<dyn ProgressSink>, 100, Duration::from_secs(60));

        for _ in 0..99 {
            reporter.advance(1, None);
        }
        // 99 of 100 units reported; far fewer than 99 forwards happened.
        let intermediate = sink.forwarded().len();
        assert!(intermediate < 99, "expected coalescing, saw {intermediate} forwards");

        // The final unit exhausts the budget and must be forwarded.
        reporter.advance(1, Some("done"));

        let forwarded = sink.forwarded();
        let last = forwarded.last().expect("at least one forward");
        assert_eq!((last.0, last.1), (100, 100));
    }

    #[test]
    fn finish_forces_a_flush() {
        let sink = Arc::new(RecordingSink::default());
        let reporter =
            ThrottledReporter::new(Arc::clone(&sink) as Arc<dyn ProgressSink>, 10, Duration::from_secs(60));

        reporter.advance(1, None); // consumes the rate-limit cell
        reporter.advance(2, None); // throttled
        reporter.finish(Some("flushed"));

        let forwarded = sink.forwarded();
        let last = forwarded.last().expect("flush must forward");
        assert_eq!((last.0, last.1), (3, 10));
        assert_eq!(last.2.as_deref(), Some("flushed"));
    }

    #[test]
    fn accumulation_is_clamped_to_the_budget() {
        let sink = Arc::new(RecordingSink::default());
        let reporter =
            ThrottledReporter::new(Arc::clone(&sink) as Arc<dyn ProgressSink>, 5, Duration::from_secs(60));

        reporter.advance(4, None);
        reporter.advance(4, None);

        assert_eq!(reporter.work_done(), 5);
        let last = sink.forwarded().pop().expect("budget exhaustion forwards");
        assert_eq!((last.0, last.1), (5, 5));
    }

    #[test]
    fn cancellation_passes_through_unthrottled() {
        let sink = Arc::new(RecordingSink::default());
        let reporter =
            ThrottledReporter::new(Arc::clone(&sink) as Arc<dyn ProgressSink>, 10, Duration::from_secs(60));

        assert!(!reporter.is_canceled());
        reporter.set_canceled();
        assert!(reporter.is_canceled());
        assert!(sink.is_canceled());
    }
}
