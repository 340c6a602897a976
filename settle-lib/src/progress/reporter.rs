use super::Sink;
use core::fmt::{Debug, Formatter};
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use std::sync::{Arc, Mutex, MutexGuard};

const LOG_TARGET: &str = "  progress";

/// Percentage shown as soon as an operation starts, so the indicator never sits at zero.
pub const START_PERCENT: f64 = 10.0;

/// Percentage of a finished operation.
pub const DONE_PERCENT: f64 = 100.0;

/// Snapshot of what the indicator currently shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressState {
    /// Filled fraction, in `0..=100`.
    pub percent: f64,

    /// Status text.
    pub label: String,

    /// Whether an operation is in flight (or in its finish grace period).
    pub busy: bool,
}

#[derive(Debug, Default)]
struct Inner {
    state: ProgressState,

    /// Set between `finish()` and the end of its grace period.
    finishing: bool,

    /// Bumped by every `start`, `finish` and `reset`, so a delayed reset can tell
    /// whether it still applies.
    generation: u64,
}

/// Owns a monotonic progress value and forwards it to a [`Sink`].
///
/// Cloning yields another handle to the same state. Within one session (from
/// [`start`](Self::start) to [`finish`](Self::finish)) the percentage forwarded to
/// the sink never decreases, no matter how many producers call [`set`](Self::set);
/// only [`reset`](Self::reset) or the end of a finish grace period lowers it.
///
/// Sink calls are made while the internal lock is held, which keeps the order seen
/// by the sink identical to the order of state changes. Sinks must therefore not
/// call back into the reporter.
#[derive(Clone)]
pub struct ProgressReporter {
    inner: Arc<Mutex<Inner>>,
    sink: Arc<dyn Sink>,
}

impl ProgressReporter {
    #[must_use]
    pub fn new(sink: Arc<dyn Sink>) -> Self {
        Self {
            inner: Arc::default(),
            sink,
        }
    }

    /// Begin an operation: show the indicator as busy with at least [`START_PERCENT`].
    ///
    /// Calling this during a finish grace period starts a fresh session and cancels
    /// the pending reset.
    pub fn start(&self, label: &str) {
        let mut inner = self.lock();
        let base = if inner.finishing { 0.0 } else { inner.state.percent };

        inner.finishing = false;
        inner.generation += 1;
        inner.state.busy = true;
        inner.state.percent = base.max(START_PERCENT);
        inner.state.label = label.to_string();

        self.sink.show_busy(label);
        self.sink.set_percent(inner.state.percent);
    }

    /// Raise the progress to `percent` and optionally replace the label.
    ///
    /// The value is clamped to `0..=100` (NaN counts as 0). Lower values than the
    /// current one are ignored. Calls made after [`finish`](Self::finish) and before
    /// the grace period ends are ignored entirely.
    pub fn set(&self, percent: f64, label: Option<&str>) {
        let mut inner = self.lock();
        self.raise(&mut inner, percent, label);
    }

    /// Like [`set`](Self::set), but does nothing once `cancelled` is raised.
    ///
    /// The flag is read under the reporter's lock. A producer that is cancelled while
    /// it computes a value therefore cannot touch a session started after the
    /// cancellation.
    pub fn set_unless(&self, cancelled: &AtomicBool, percent: f64, label: Option<&str>) {
        let mut inner = self.lock();
        if !cancelled.load(Ordering::SeqCst) {
            self.raise(&mut inner, percent, label);
        }
    }

    /// Show completion, then return to idle once `grace` has elapsed.
    ///
    /// The return to idle is a single transition: the sink sees one `hide()` call.
    /// A zero grace period, or the absence of a tokio runtime, resets immediately.
    pub fn finish(&self, label: &str, grace: Duration) {
        let generation = {
            let mut inner = self.lock();
            self.complete(&mut inner, label)
        };

        self.schedule_reset(generation, grace);
    }

    /// Like [`finish`](Self::finish), but does nothing once `cancelled` is raised.
    ///
    /// Returns whether the completion was shown.
    pub fn finish_unless(&self, cancelled: &AtomicBool, label: &str, grace: Duration) -> bool {
        let generation = {
            let mut inner = self.lock();
            if cancelled.load(Ordering::SeqCst) {
                return false;
            }

            self.complete(&mut inner, label)
        };

        self.schedule_reset(generation, grace);
        true
    }

    /// Return to idle immediately, abandoning any pending finish.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.generation += 1;
        self.go_idle(&mut inner);
    }

    /// A copy of the current state.
    #[must_use]
    pub fn state(&self) -> ProgressState {
        self.lock().state.clone()
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.lock().state.busy
    }

    fn raise(&self, inner: &mut Inner, percent: f64, label: Option<&str>) {
        if inner.finishing {
            return;
        }

        let percent = clamp_percent(percent);
        if percent > inner.state.percent {
            inner.state.percent = percent;
            self.sink.set_percent(percent);
        }

        if let Some(label) = label
            && label != inner.state.label
        {
            inner.state.label = label.to_string();
            self.sink.set_label(label);
        }
    }

    fn complete(&self, inner: &mut Inner, label: &str) -> u64 {
        inner.finishing = true;
        inner.generation += 1;
        inner.state.busy = true;
        inner.state.percent = DONE_PERCENT;
        inner.state.label = label.to_string();

        self.sink.set_percent(DONE_PERCENT);
        self.sink.set_label(label);
        inner.generation
    }

    fn schedule_reset(&self, generation: u64, grace: Duration) {
        if grace.is_zero() {
            self.reset_if_current(generation);
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let this = self.clone();
                drop(handle.spawn(async move {
                    tokio::time::sleep(grace).await;
                    this.reset_if_current(generation);
                }));
            }
            Err(_) => {
                log::debug!(target: LOG_TARGET, "No runtime available for the finish grace period, resetting now");
                self.reset_if_current(generation);
            }
        }
    }

    fn reset_if_current(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation == generation {
            self.go_idle(&mut inner);
        } else {
            log::trace!(target: LOG_TARGET, "Skipping stale reset for generation {generation}");
        }
    }

    fn go_idle(&self, inner: &mut Inner) {
        inner.finishing = false;
        inner.state = ProgressState::default();
        self.sink.hide();
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("lock poisoned")
    }
}

impl Debug for ProgressReporter {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("inner", &self.inner)
            .field("sink", &"<dyn Sink>")
            .finish()
    }
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, DONE_PERCENT) }
}
