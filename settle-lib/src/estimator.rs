//! Time-based progress projection
//!
//! A [`TimeEstimator`] predicts how far along an operation probably is from the
//! time elapsed since it started and a typical per-item cost. The prediction is
//! optimistic and never authoritative: it is capped at [`ESTIMATE_CAP`] so that
//! only a confirmed completion ever shows 100%.

use crate::progress::ProgressReporter;
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use std::sync::Arc;
use tokio::time::{Instant, MissedTickBehavior};

const LOG_TARGET: &str = " estimator";

/// Highest percentage a projection may claim.
pub const ESTIMATE_CAP: f64 = 95.0;

/// Typical processing cost of a single item.
pub const DEFAULT_PER_ITEM: Duration = Duration::from_millis(800);

/// How often a running estimator pushes its projection.
pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

/// Expected-duration model for a batch of items. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstimatorModel {
    per_item: Duration,
    item_count: u64,
    start: Instant,
}

impl EstimatorModel {
    #[must_use]
    pub const fn new(per_item: Duration, item_count: u64, start: Instant) -> Self {
        Self {
            per_item,
            item_count,
            start,
        }
    }

    #[must_use]
    pub const fn start(&self) -> Instant {
        self.start
    }

    /// Expected total duration, in seconds.
    #[expect(clippy::cast_precision_loss, reason = "item counts are far below 2^52")]
    fn total_secs(&self) -> f64 {
        self.per_item.as_secs_f64() * self.item_count as f64
    }
}

/// Projects a percentage from elapsed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeEstimator {
    model: EstimatorModel,
}

impl TimeEstimator {
    #[must_use]
    pub const fn new(model: EstimatorModel) -> Self {
        Self { model }
    }

    #[must_use]
    pub const fn model(&self) -> &EstimatorModel {
        &self.model
    }

    /// Projected percentage after `elapsed`, between 0 and [`ESTIMATE_CAP`].
    ///
    /// A model with no expected duration projects straight to the cap.
    #[must_use]
    pub fn project(&self, elapsed: Duration) -> f64 {
        let total = self.model.total_secs();
        if total <= 0.0 {
            return ESTIMATE_CAP;
        }

        (100.0 * elapsed.as_secs_f64() / total).min(ESTIMATE_CAP)
    }

    /// Projected percentage at `now`. A `now` earlier than the start counts as no time elapsed.
    #[must_use]
    pub fn project_at(&self, now: Instant) -> f64 {
        self.project(now.saturating_duration_since(self.model.start))
    }
}

/// Push projections to `reporter` every `tick` until the cap is reached or `cancelled` is raised.
///
/// The reporter discards anything lower than what it already shows, so this can run
/// alongside other producers.
pub async fn run_estimator(estimator: TimeEstimator, reporter: ProgressReporter, tick: Duration, cancelled: Arc<AtomicBool>) {
    let tick = tick.max(Duration::from_millis(1));
    let mut interval = tokio::time::interval_at(Instant::now() + tick, tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let now = interval.tick().await;
        if cancelled.load(Ordering::SeqCst) {
            break;
        }

        let projected = estimator.project_at(now);
        reporter.set_unless(&cancelled, projected, None);

        if projected >= ESTIMATE_CAP {
            log::debug!(target: LOG_TARGET, "Projection reached {ESTIMATE_CAP}%, estimator idle");
            break;
        }
    }
}
