use super::sampler::clamp_count;
use super::{FnSampler, Outcome, Sampler, WatchOptions, WatchSession};
use crate::estimator::{EstimatorModel, TimeEstimator, run_estimator};
use crate::progress::{ProgressReporter, labels};
use core::fmt::{Debug, Formatter};
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use core::time::Duration;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

const LOG_TARGET: &str = "   watcher";

/// Which session, if any, currently owns the watcher.
#[derive(Debug, Default)]
struct Slot {
    owner: Mutex<Option<u64>>,
    next_id: AtomicU64,
}

impl Slot {
    fn try_claim(&self) -> Option<u64> {
        let mut owner = self.owner.lock().expect("lock poisoned");
        if owner.is_some() {
            return None;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        *owner = Some(id);
        Some(id)
    }

    /// Release the slot if `id` still owns it.
    fn release(&self, id: u64) {
        let mut owner = self.owner.lock().expect("lock poisoned");
        if *owner == Some(id) {
            *owner = None;
        }
    }

    fn is_claimed(&self) -> bool {
        self.owner.lock().expect("lock poisoned").is_some()
    }
}

/// Releases a slot claim when the session's task ends or is dropped.
#[derive(Debug)]
struct SlotClaim {
    slot: Arc<Slot>,
    id: u64,
}

impl Drop for SlotClaim {
    fn drop(&mut self) {
        self.slot.release(self.id);
    }
}

/// Aborts the wrapped task when dropped.
#[derive(Debug)]
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Detects completion of an operation that is only observable through a count
/// some other subsystem maintains.
///
/// A watcher owns a single slot: while one watch is running, further requests are
/// rejected with an inert [`CancelHandle`] instead of being queued, so two timers
/// never drive the same [`ProgressReporter`].
///
/// Each watch polls a [`Sampler`] on a timer and, alongside, runs a
/// [`TimeEstimator`] feeding the same reporter. Both only ever raise the progress;
/// only the watcher's terminal decision calls [`ProgressReporter::finish`].
#[derive(Clone)]
pub struct CompletionWatcher {
    reporter: ProgressReporter,
    slot: Arc<Slot>,
}

impl CompletionWatcher {
    #[must_use]
    pub fn new(reporter: ProgressReporter) -> Self {
        Self {
            reporter,
            slot: Arc::default(),
        }
    }

    #[must_use]
    pub const fn reporter(&self) -> &ProgressReporter {
        &self.reporter
    }

    /// Whether a watch currently owns this watcher.
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.slot.is_claimed()
    }

    /// Watch for `expected` new items, sampling through a pair of closures.
    ///
    /// See [`watch_sampler`](Self::watch_sampler).
    pub fn watch<C, I>(&self, expected: u64, count: C, input_cleared: I, opts: WatchOptions) -> CancelHandle
    where
        C: Fn() -> i64 + Send + Sync + 'static,
        I: Fn() -> bool + Send + Sync + 'static,
    {
        self.watch_sampler(expected, FnSampler::new(count, input_cleared), opts)
    }

    /// Watch for `expected` new items to appear in the container behind `sampler`.
    ///
    /// Returns immediately. The current count becomes the baseline and the reporter
    /// is started; polling then continues on a background task until a terminal
    /// decision is reached or the returned handle is cancelled. Dropping the handle
    /// does not stop the watch.
    ///
    /// Outside a tokio runtime there is nothing to poll on, so the request is rejected
    /// and the reporter is left untouched.
    pub fn watch_sampler<S>(&self, expected: u64, sampler: S, opts: WatchOptions) -> CancelHandle
    where
        S: Sampler + 'static,
    {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::warn!(target: LOG_TARGET, "No runtime available, rejecting request for {expected} item(s)");
            return CancelHandle::rejected();
        };

        let Some(id) = self.slot.try_claim() else {
            log::debug!(target: LOG_TARGET, "A watch is already running, rejecting request for {expected} item(s)");
            return CancelHandle::rejected();
        };

        let claim = SlotClaim {
            slot: Arc::clone(&self.slot),
            id,
        };

        let start = Instant::now();
        let baseline = clamp_count(sampler.count());
        let session = WatchSession::new(baseline, expected, start, &opts);

        log::debug!(
            target: LOG_TARGET,
            "Watching for {expected} item(s) over a baseline of {baseline}, polling every {}ms",
            opts.poll_interval.as_millis()
        );

        self.reporter.start(&labels::busy(expected, &opts.item_noun));

        let cancelled = Arc::new(AtomicBool::new(false));
        let estimator = opts.estimator_tick.map(|tick| {
            let model = EstimatorModel::new(opts.per_item, expected, start);
            let estimate = run_estimator(TimeEstimator::new(model), self.reporter.clone(), tick, Arc::clone(&cancelled));
            AbortOnDrop(runtime.spawn(estimate))
        });

        let task = runtime.spawn(run_watch(
            session,
            sampler,
            self.reporter.clone(),
            opts,
            Arc::clone(&cancelled),
            claim,
            estimator,
        ));

        CancelHandle {
            active: Some(ActiveWatch {
                task,
                cancelled,
                slot: Arc::clone(&self.slot),
                id,
            }),
        }
    }
}

impl Debug for CompletionWatcher {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CompletionWatcher")
            .field("reporter", &self.reporter)
            .field("slot", &self.slot)
            .finish()
    }
}

/// Poll loop of one watch. Holding `_claim` keeps the slot owned until the loop ends.
///
/// Yields `None` when `cancelled` is raised, possibly in the middle of a tick; every
/// reporter update is checked against the flag so a cancelled loop never touches a
/// later session.
async fn run_watch<S: Sampler>(
    mut session: WatchSession,
    sampler: S,
    reporter: ProgressReporter,
    opts: WatchOptions,
    cancelled: Arc<AtomicBool>,
    _claim: SlotClaim,
    estimator: Option<AbortOnDrop>,
) -> Option<Outcome> {
    let period = opts.poll_interval.max(Duration::from_millis(1));
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let now = interval.tick().await;
        if cancelled.load(Ordering::SeqCst) {
            return None;
        }

        let count = clamp_count(sampler.count());
        let result = session.tick(count, sampler.input_cleared(), now);

        if let Some(percent) = result.progress {
            log::trace!(target: LOG_TARGET, "{} item(s) arrived, progress {percent:.1}%", session.last_added());
            reporter.set_unless(&cancelled, percent, None);
        }

        if let Some(termination) = result.termination {
            drop(estimator);

            let outcome = session.outcome(termination, now);
            if !reporter.finish_unless(&cancelled, &labels::done(outcome.reported_count, &opts.item_noun), opts.grace_period) {
                log::debug!(target: LOG_TARGET, "Watch was cancelled before its {termination} decision could be shown");
                return None;
            }

            log::info!(
                target: LOG_TARGET,
                "Watch ended ({termination}) after {} tick(s) in {:.3}s with {} item(s) seen",
                outcome.ticks,
                outcome.elapsed.as_secs_f64(),
                outcome.added
            );

            return Some(outcome);
        }
    }
}

#[derive(Debug)]
struct ActiveWatch {
    task: JoinHandle<Option<Outcome>>,
    cancelled: Arc<AtomicBool>,
    slot: Arc<Slot>,
    id: u64,
}

/// Handle to a watch started by [`CompletionWatcher::watch`].
///
/// A handle for a rejected request is inert: cancelling it does nothing and
/// waiting on it yields `None` right away.
#[derive(Debug)]
pub struct CancelHandle {
    active: Option<ActiveWatch>,
}

impl CancelHandle {
    const fn rejected() -> Self {
        Self { active: None }
    }

    /// Whether the request was turned away because another watch was running.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        self.active.is_none()
    }

    /// Whether the watch has stopped, for whatever reason. Rejected handles are always finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.active.as_ref().is_none_or(|a| a.task.is_finished())
    }

    /// Stop polling and estimating without finishing the reporter.
    ///
    /// The reporter keeps whatever it currently shows; resetting it is up to the
    /// caller. Once this returns, the cancelled watch no longer updates the reporter,
    /// even if its task is still finishing a tick on another thread, so a new watch
    /// may start right away. Cancelling twice, or after the watch ended, has no effect.
    pub fn cancel(&self) {
        if let Some(active) = &self.active {
            active.cancelled.store(true, Ordering::SeqCst);
            active.task.abort();
            active.slot.release(active.id);
            log::debug!(target: LOG_TARGET, "Watch cancelled");
        }
    }

    /// Wait for the watch to end.
    ///
    /// Yields the outcome of a terminal decision, or `None` if the request was
    /// rejected or the watch was cancelled.
    pub async fn wait(self) -> Option<Outcome> {
        let active = self.active?;
        match active.task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => None,
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Watch task failed: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{RecordingSink, START_PERCENT, Sink};
    use crate::watch::Termination;
    use core::sync::atomic::AtomicI64;
    use std::collections::VecDeque;
    use std::sync::Barrier;

    /// Returns scripted counts, repeating the last one once the script runs out.
    #[derive(Debug)]
    struct ScriptedSampler {
        counts: Mutex<VecDeque<i64>>,
        last: AtomicI64,
        cleared: bool,
    }

    impl ScriptedSampler {
        fn new(counts: &[i64], cleared: bool) -> Self {
            Self {
                counts: Mutex::new(counts.iter().copied().collect()),
                last: AtomicI64::new(0),
                cleared,
            }
        }
    }

    impl Sampler for ScriptedSampler {
        fn count(&self) -> i64 {
            if let Some(next) = self.counts.lock().unwrap().pop_front() {
                self.last.store(next, Ordering::SeqCst);
            }
            self.last.load(Ordering::SeqCst)
        }

        fn input_cleared(&self) -> bool {
            self.cleared
        }
    }

    /// Reports an empty baseline, then blocks inside the first polled `count()` until
    /// the gate has been passed twice, and reports one item.
    #[derive(Debug)]
    struct GatedSampler {
        calls: AtomicU64,
        gate: Arc<Barrier>,
    }

    impl Sampler for GatedSampler {
        fn count(&self) -> i64 {
            match self.calls.fetch_add(1, Ordering::SeqCst) {
                0 => 0,
                1 => {
                    let _ = self.gate.wait();
                    let _ = self.gate.wait();
                    1
                }
                _ => 1,
            }
        }

        fn input_cleared(&self) -> bool {
            false
        }
    }

    fn watcher() -> (CompletionWatcher, Arc<RecordingSink>) {
        let sink = RecordingSink::new();
        let reporter = ProgressReporter::new(Arc::clone(&sink) as Arc<dyn Sink>);
        (CompletionWatcher::new(reporter), sink)
    }

    fn no_estimator() -> WatchOptions {
        WatchOptions {
            estimator_tick: None,
            ..WatchOptions::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_scenario_reaches_target_on_fifth_tick() {
        let (watcher, sink) = watcher();
        let handle = watcher.watch_sampler(3, ScriptedSampler::new(&[0, 0, 1, 1, 2, 3], false), no_estimator());

        let outcome = handle.wait().await.unwrap();
        assert_eq!(outcome.termination, Termination::ReachedTarget);
        assert_eq!(outcome.ticks, 5);
        assert_eq!(outcome.elapsed, Duration::from_millis(250));
        assert_eq!(outcome.reported_count, 3);

        let rounded: Vec<f64> = sink.percents().into_iter().map(f64::round).collect();
        assert_eq!(rounded, vec![10.0, 38.0, 67.0, 95.0, 100.0]);
        assert_eq!(sink.last_label().as_deref(), Some("Done! 3 file(s) added"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminates_within_one_poll_of_reaching_target() {
        let (watcher, _sink) = watcher();
        let count = Arc::new(AtomicI64::new(4));
        let sampled = Arc::clone(&count);
        let handle = watcher.watch(2, move || sampled.load(Ordering::SeqCst), || false, WatchOptions::default());

        tokio::time::sleep(Duration::from_millis(1234)).await;
        count.store(6, Ordering::SeqCst);
        let reached_at = Instant::now();

        let outcome = handle.wait().await.unwrap();
        assert_eq!(outcome.termination, Termination::ReachedTarget);
        assert!(Instant::now() - reached_at <= Duration::from_millis(50));

        let state = watcher.reporter().state();
        assert!((state.percent - 100.0).abs() < f64::EPSILON);
        assert_eq!(state.label, "Done! 2 file(s) added");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stable_cleared_after_threshold_ticks() {
        let (watcher, _sink) = watcher();
        let handle = watcher.watch(5, || 0, || true, WatchOptions::default());

        let outcome = handle.wait().await.unwrap();
        assert_eq!(outcome.termination, Termination::StableCleared);
        assert_eq!(outcome.ticks, 20);
        assert_eq!(outcome.reported_count, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_profile_settles_after_forty_ticks() {
        let (watcher, _sink) = watcher();
        let opts = WatchOptions::for_profile(crate::watch::Profile::Fast);
        let outcome = watcher.watch(2, || 0, || true, opts).wait().await.unwrap();

        assert_eq!(outcome.termination, Termination::StableCleared);
        assert_eq!(outcome.ticks, 40);
        assert_eq!(outcome.elapsed, Duration::from_millis(800));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hard_timeout_when_input_never_clears() {
        let (watcher, _sink) = watcher();
        let outcome = watcher.watch(3, || 1, || false, WatchOptions::default()).wait().await.unwrap();

        assert_eq!(outcome.termination, Termination::HardTimeout);
        assert!(outcome.elapsed > Duration::from_secs(30));
        assert!(outcome.elapsed <= Duration::from_secs(30) + Duration::from_millis(50));
        assert_eq!(outcome.reported_count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inactive_timeout_after_last_arrival() {
        let (watcher, _sink) = watcher();
        let opts = WatchOptions {
            stable_ticks: 10_000,
            ..WatchOptions::default()
        };
        let sampler = ScriptedSampler::new(&[0, 0, 1], true);
        let outcome = watcher.watch_sampler(4, sampler, opts).wait().await.unwrap();

        assert_eq!(outcome.termination, Termination::InactiveTimeout);
        assert_eq!(outcome.added, 1);
        assert_eq!(outcome.elapsed, Duration::from_millis(100 + 2050));
        assert_eq!(outcome.reported_count, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_watch_is_rejected_while_active() {
        let (watcher, _sink) = watcher();
        let first = watcher.watch(1, || 0, || false, WatchOptions::default());
        let second = watcher.watch(1, || 1, || true, WatchOptions::default());

        assert!(!first.is_rejected());
        assert!(second.is_rejected());
        assert!(second.is_finished());

        second.cancel();
        assert!(watcher.is_watching());
        assert!(second.wait().await.is_none());

        let outcome = first.wait().await.unwrap();
        assert_eq!(outcome.termination, Termination::HardTimeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_requests_admit_one_watch() {
        let (watcher, _sink) = watcher();
        let attempts = (0..8).map(|_| {
            let watcher = watcher.clone();
            tokio::spawn(async move { watcher.watch(2, || 0, || false, no_estimator()) })
        });

        let handles: Vec<CancelHandle> = futures_util::future::join_all(attempts)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        assert_eq!(handles.iter().filter(|h| !h.is_rejected()).count(), 1);
        for handle in &handles {
            handle.cancel();
        }
        assert!(!watcher.is_watching());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slot_is_released_after_completion() {
        let (watcher, _sink) = watcher();
        let _ = watcher.watch_sampler(1, ScriptedSampler::new(&[0, 1], false), no_estimator()).wait().await;
        tokio::task::yield_now().await;
        assert!(!watcher.is_watching());

        let again = watcher.watch(1, || 0, || true, no_estimator());
        assert!(!again.is_rejected());
        again.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_leaves_reporter_untouched() {
        let (watcher, sink) = watcher();
        let count = Arc::new(AtomicI64::new(0));
        let sampled = Arc::clone(&count);
        let handle = watcher.watch(4, move || sampled.load(Ordering::SeqCst), || false, no_estimator());

        tokio::time::sleep(Duration::from_millis(60)).await;
        count.store(2, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;

        handle.cancel();
        handle.cancel();
        assert!(!watcher.is_watching());

        let before = watcher.reporter().state();
        assert!(before.busy);
        assert!((before.percent - 52.5).abs() < 1e-9);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(watcher.reporter().state(), before);
        assert!(!sink.percents().contains(&100.0));
        assert!(handle.wait().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_estimator() {
        let (watcher, _sink) = watcher();
        let handle = watcher.watch(2, || 0, || false, WatchOptions::default());

        tokio::time::sleep(Duration::from_millis(450)).await;
        handle.cancel();
        let frozen = watcher.reporter().state().percent;
        assert!(frozen > 10.0);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!((watcher.reporter().state().percent - frozen).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_watch_allowed_right_after_cancel() {
        let (watcher, _sink) = watcher();
        let first = watcher.watch(3, || 0, || false, no_estimator());
        first.cancel();

        let second = watcher.watch_sampler(1, ScriptedSampler::new(&[0, 1], false), no_estimator());
        assert!(!second.is_rejected());

        tokio::task::yield_now().await;
        assert!(watcher.is_watching(), "the aborted task must not release the new claim");

        let outcome = second.wait().await.unwrap();
        assert_eq!(outcome.termination, Termination::ReachedTarget);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_mid_tick_cannot_finish_next_watch() {
        let (watcher, sink) = watcher();
        let gate = Arc::new(Barrier::new(2));
        let opts = WatchOptions {
            poll_interval: Duration::from_millis(10),
            ..no_estimator()
        };
        let sampler = GatedSampler {
            calls: AtomicU64::new(0),
            gate: Arc::clone(&gate),
        };
        let first = watcher.watch_sampler(1, sampler, opts.clone());

        let entered = Arc::clone(&gate);
        tokio::task::spawn_blocking(move || {
            let _ = entered.wait();
        })
        .await
        .unwrap();

        first.cancel();
        let second = watcher.watch(5, || 0, || false, opts.clone());
        assert!(!second.is_rejected());

        let released = Arc::clone(&gate);
        tokio::task::spawn_blocking(move || {
            let _ = released.wait();
        })
        .await
        .unwrap();
        assert!(first.wait().await.is_none());

        let state = watcher.reporter().state();
        assert!(state.busy);
        assert_eq!(state.label, labels::busy(5, &opts.item_noun));
        assert!((state.percent - START_PERCENT).abs() < f64::EPSILON);
        assert!(!sink.percents().contains(&100.0));
        assert!(watcher.is_watching());

        second.cancel();
        assert!(!watcher.is_watching());
    }

    #[test]
    fn test_watch_outside_runtime_is_rejected() {
        let (watcher, sink) = watcher();
        let handle = watcher.watch(2, || 0, || false, no_estimator());

        assert!(handle.is_rejected());
        assert!(!watcher.is_watching());
        assert!(!watcher.reporter().is_busy());
        assert!(sink.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_is_monotonic_with_estimator_running() {
        let (watcher, sink) = watcher();
        let count = Arc::new(AtomicI64::new(0));
        let cleared = Arc::new(AtomicBool::new(false));
        let (c, i) = (Arc::clone(&count), Arc::clone(&cleared));
        let opts = WatchOptions {
            per_item: Duration::from_millis(200),
            ..WatchOptions::default()
        };
        let handle = watcher.watch(5, move || c.load(Ordering::SeqCst), move || i.load(Ordering::SeqCst), opts);

        for n in 1..=4 {
            tokio::time::sleep(Duration::from_millis(330)).await;
            count.store(n, Ordering::SeqCst);
        }
        cleared.store(true, Ordering::SeqCst);

        let outcome = handle.wait().await.unwrap();
        assert_eq!(outcome.termination, Termination::StableCleared);
        assert_eq!(outcome.reported_count, 5);

        let percents = sink.percents();
        assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");
        assert_eq!(percents.last(), Some(&100.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_negative_samples_are_clamped() {
        let (watcher, _sink) = watcher();
        let sampler = ScriptedSampler::new(&[-4, -1, 2], false);
        let outcome = watcher.watch_sampler(2, sampler, no_estimator()).wait().await.unwrap();

        assert_eq!(outcome.termination, Termination::ReachedTarget);
        assert_eq!(outcome.ticks, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_resets_after_grace_period() {
        let (watcher, _sink) = watcher();
        let _ = watcher.watch_sampler(1, ScriptedSampler::new(&[0, 1], false), no_estimator()).wait().await;
        assert!(watcher.reporter().is_busy());

        tokio::time::sleep(Duration::from_millis(601)).await;
        assert!(!watcher.reporter().is_busy());
    }
}
