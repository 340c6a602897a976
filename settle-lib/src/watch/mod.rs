//! Completion detection for externally driven operations
//!
//! Some operations cannot be observed directly: the caller fires them, and another
//! subsystem eventually reflects their effects as items appearing in a container
//! the caller does not own. This module decides when such an operation is "done
//! enough" to report.
//!
//! # Implementation Model
//!
//! - [`Sampler`] is the read-only view into the external container: a count and
//!   whether the triggering input has been consumed.
//! - [`WatchSession`] is a pure state machine fed one sample per tick. It tracks
//!   arrivals relative to a baseline and decides termination, first match wins:
//!   target reached, count settled with the input cleared, inactivity with the
//!   input cleared, hard timeout.
//! - [`CompletionWatcher`] drives a session from a tokio interval, runs a
//!   [`TimeEstimator`](crate::estimator::TimeEstimator) alongside, and finishes the
//!   shared [`ProgressReporter`](crate::progress::ProgressReporter) on the terminal
//!   tick. It accepts one watch at a time.
//!
//! There is no error outcome. A watch that never sees an arrival still ends
//! through one of the timeouts and reports a best-effort completion.

mod options;
mod sampler;
mod session;
mod watcher;

pub use options::{DEFAULT_GRACE_PERIOD, DEFAULT_HARD_TIMEOUT, Profile, WatchOptions};
pub use sampler::{FnSampler, Sampler};
pub use session::{Outcome, Termination, TickResult, WatchSession};
pub use watcher::{CancelHandle, CompletionWatcher};
