//! Monotonic progress reporting
//!
//! A [`ProgressReporter`] owns the percentage and status text shown to a user and
//! forwards changes to a [`Sink`]. Several producers may drive the same reporter
//! concurrently (a time-based estimate and a confirmed count, for instance); the
//! reporter alone enforces that the visible value never moves backwards within
//! a session.

mod bar_sink;
pub mod labels;
mod log_sink;
mod reporter;
mod sink;

pub use bar_sink::BarSink;
pub use log_sink::LogSink;
pub use reporter::{DONE_PERCENT, ProgressReporter, ProgressState, START_PERCENT};
pub use sink::Sink;

#[cfg(test)]
pub use sink::{RecordingSink, SinkEvent};
