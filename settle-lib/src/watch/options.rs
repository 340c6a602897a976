use crate::estimator::{DEFAULT_PER_ITEM, DEFAULT_TICK};
use core::time::Duration;
use strum::{Display, EnumString};

/// Upper bound on the duration of any watch.
pub const DEFAULT_HARD_TIMEOUT: Duration = Duration::from_secs(30);

/// How long a finished indicator stays visible before returning to idle.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(600);

/// Polling profile, chosen by whether the watched container starts out empty.
///
/// An empty container produces noisier early samples, so it is polled faster and
/// given longer to settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Profile {
    /// For containers known to start empty.
    Fast,

    /// For containers that already hold items.
    Normal,
}

impl Profile {
    /// Pick the profile for a container currently holding `count` items.
    #[must_use]
    pub const fn for_baseline(count: u64) -> Self {
        if count == 0 { Self::Fast } else { Self::Normal }
    }

    #[must_use]
    pub const fn poll_interval(self) -> Duration {
        match self {
            Self::Fast => Duration::from_millis(20),
            Self::Normal => Duration::from_millis(50),
        }
    }

    #[must_use]
    pub const fn inactivity_timeout(self) -> Duration {
        match self {
            Self::Fast => Duration::from_secs(4),
            Self::Normal => Duration::from_secs(2),
        }
    }

    #[must_use]
    pub const fn stable_ticks(self) -> u32 {
        match self {
            Self::Fast => 40,
            Self::Normal => 20,
        }
    }
}

/// Tunables for a single watch.
///
/// The profile constants were tuned empirically; treat them as starting points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchOptions {
    /// Time between two samples.
    pub poll_interval: Duration,

    /// With the input cleared, give up waiting once no arrival has been seen for this long.
    pub inactivity_timeout: Duration,

    /// Give up waiting once the watch has run this long, whatever the samples say.
    pub hard_timeout: Duration,

    /// Consecutive unchanged samples after which the count is considered settled.
    pub stable_ticks: u32,

    /// How long the finished indicator remains visible.
    pub grace_period: Duration,

    /// Cadence of the time-based estimator, or `None` to run without one.
    pub estimator_tick: Option<Duration>,

    /// Typical cost of one item, used by the estimator.
    pub per_item: Duration,

    /// What the watched items are called in status labels.
    pub item_noun: String,
}

impl WatchOptions {
    #[must_use]
    pub fn for_profile(profile: Profile) -> Self {
        Self {
            poll_interval: profile.poll_interval(),
            inactivity_timeout: profile.inactivity_timeout(),
            hard_timeout: DEFAULT_HARD_TIMEOUT,
            stable_ticks: profile.stable_ticks(),
            grace_period: DEFAULT_GRACE_PERIOD,
            estimator_tick: Some(DEFAULT_TICK),
            per_item: DEFAULT_PER_ITEM,
            item_noun: "file".to_string(),
        }
    }
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self::for_profile(Profile::Normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_for_baseline() {
        assert_eq!(Profile::for_baseline(0), Profile::Fast);
        assert_eq!(Profile::for_baseline(1), Profile::Normal);
        assert_eq!(Profile::for_baseline(250), Profile::Normal);
    }

    #[test]
    fn test_fast_profile_defaults() {
        let opts = WatchOptions::for_profile(Profile::Fast);
        assert_eq!(opts.poll_interval, Duration::from_millis(20));
        assert_eq!(opts.inactivity_timeout, Duration::from_millis(4000));
        assert_eq!(opts.stable_ticks, 40);
        assert_eq!(opts.hard_timeout, Duration::from_millis(30_000));
        assert_eq!(opts.grace_period, Duration::from_millis(600));
    }

    #[test]
    fn test_default_is_normal_profile() {
        let opts = WatchOptions::default();
        assert_eq!(opts.poll_interval, Duration::from_millis(50));
        assert_eq!(opts.inactivity_timeout, Duration::from_millis(2000));
        assert_eq!(opts.stable_ticks, 20);
    }

    #[test]
    fn test_profile_parses_lowercase() {
        assert_eq!("fast".parse::<Profile>().unwrap(), Profile::Fast);
        assert_eq!(Profile::Normal.to_string(), "normal");
    }
}
