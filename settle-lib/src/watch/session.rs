use super::WatchOptions;
use crate::estimator::ESTIMATE_CAP;
use crate::progress::START_PERCENT;
use core::time::Duration;
use strum::{Display, IntoStaticStr};
use tokio::time::Instant;

/// Why a watch ended.
///
/// None of these is an error: the timeouts are best-effort completions for an
/// operation whose real outcome cannot be observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Termination {
    /// The expected number of items arrived.
    ReachedTarget,

    /// The input was consumed and the count stopped changing.
    StableCleared,

    /// The input was consumed and nothing arrived for too long.
    InactiveTimeout,

    /// The watch ran for its maximum allowed duration.
    HardTimeout,
}

/// Summary of a finished watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub termination: Termination,

    /// Count announced to the user; never zero and never below the expected count.
    pub reported_count: u64,

    /// Items actually seen arriving.
    pub added: u64,

    /// Number of poll ticks taken.
    pub ticks: u64,

    /// Time from the start of the watch to its terminal tick.
    pub elapsed: Duration,
}

/// Result of feeding one sample to a [`WatchSession`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickResult {
    /// Progress to push, present when the arrival count changed.
    pub progress: Option<f64>,

    /// Terminal decision, if one was reached on this tick.
    pub termination: Option<Termination>,
}

/// State of one watch, advanced one sample at a time.
///
/// The session never reads a clock itself; callers pass the tick time in.
#[derive(Debug, Clone)]
pub struct WatchSession {
    baseline: u64,
    target: u64,
    start: Instant,
    last_added: u64,
    last_change: Instant,
    stable_ticks: u32,
    ticks: u64,

    stable_threshold: u32,
    inactivity_timeout: Duration,
    hard_timeout: Duration,
}

impl WatchSession {
    #[must_use]
    pub const fn new(baseline: u64, target: u64, start: Instant, opts: &WatchOptions) -> Self {
        Self {
            baseline,
            target,
            start,
            last_added: 0,
            last_change: start,
            stable_ticks: 0,
            ticks: 0,
            stable_threshold: opts.stable_ticks,
            inactivity_timeout: opts.inactivity_timeout,
            hard_timeout: opts.hard_timeout,
        }
    }

    #[must_use]
    pub const fn baseline(&self) -> u64 {
        self.baseline
    }

    #[must_use]
    pub const fn last_added(&self) -> u64 {
        self.last_added
    }

    #[must_use]
    pub const fn stable_ticks(&self) -> u32 {
        self.stable_ticks
    }

    /// Feed the sample taken at `now`.
    ///
    /// Terminal conditions are checked most-confident first: target reached, then
    /// settled with the input cleared, then inactivity with the input cleared, then
    /// the hard timeout.
    pub fn tick(&mut self, count: u64, input_cleared: bool, now: Instant) -> TickResult {
        self.ticks += 1;
        let added = count.saturating_sub(self.baseline);

        let progress = if added == self.last_added {
            self.stable_ticks = self.stable_ticks.saturating_add(1);
            None
        } else {
            self.last_added = added;
            self.last_change = now;
            self.stable_ticks = 0;
            Some(self.arrival_percent(added))
        };

        let termination = if added >= self.target {
            Some(Termination::ReachedTarget)
        } else if input_cleared && self.stable_ticks >= self.stable_threshold {
            Some(Termination::StableCleared)
        } else if input_cleared && now.saturating_duration_since(self.last_change) > self.inactivity_timeout {
            Some(Termination::InactiveTimeout)
        } else if now.saturating_duration_since(self.start) > self.hard_timeout {
            Some(Termination::HardTimeout)
        } else {
            None
        };

        TickResult { progress, termination }
    }

    /// Count to announce on completion.
    #[must_use]
    pub fn reported_count(&self) -> u64 {
        self.last_added.max(self.target).max(1)
    }

    #[must_use]
    pub fn outcome(&self, termination: Termination, now: Instant) -> Outcome {
        Outcome {
            termination,
            reported_count: self.reported_count(),
            added: self.last_added,
            ticks: self.ticks,
            elapsed: now.saturating_duration_since(self.start),
        }
    }

    /// Map arrivals into the band between the start signal and the estimate cap.
    #[expect(clippy::cast_precision_loss, reason = "item counts are far below 2^52")]
    fn arrival_percent(&self, added: u64) -> f64 {
        let target = self.target.max(1);
        let fraction = added.min(target) as f64 / target as f64;
        (ESTIMATE_CAP - START_PERCENT).mul_add(fraction, START_PERCENT)
    }
}
