use crate::Result;
use crate::watch::{Profile, WatchOptions};
use camino::{Utf8Path, Utf8PathBuf};
use core::time::Duration;
use ohno::{IntoAppError, app_err};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;

/// The default configuration TOML content, embedded from `default_config.toml`
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../default_config.toml");

/// Name of the configuration file looked up when none is given explicitly
pub const CONFIG_FILE_NAME: &str = "settle.toml";

/// Polling tunables for one [`Profile`]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    /// Time between two samples
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// With the input cleared, stop waiting after this long without an arrival
    #[serde(with = "humantime_serde")]
    pub inactivity_timeout: Duration,

    /// Consecutive unchanged samples after which the count is considered settled
    pub stable_ticks: u32,
}

impl ProfileConfig {
    const fn for_profile(profile: Profile) -> Self {
        Self {
            poll_interval: profile.poll_interval(),
            inactivity_timeout: profile.inactivity_timeout(),
            stable_ticks: profile.stable_ticks(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Tunables used when the watched container starts out empty
    #[serde(default = "default_fast")]
    pub fast: ProfileConfig,

    /// Tunables used when the watched container already holds items
    #[serde(default = "default_normal")]
    pub normal: ProfileConfig,

    /// Upper bound on the duration of a watch
    #[serde(default = "default_hard_timeout", with = "humantime_serde")]
    pub hard_timeout: Duration,

    /// How long the completion message stays visible
    #[serde(default = "default_grace_period", with = "humantime_serde")]
    pub grace_period: Duration,

    /// Refresh rate of the time-based estimate; zero disables it
    #[serde(default = "default_estimator_tick", with = "humantime_serde")]
    pub estimator_tick: Duration,

    /// Typical time for one item to arrive
    #[serde(default = "default_per_item_duration", with = "humantime_serde")]
    pub per_item_duration: Duration,

    /// What the watched items are called in status messages
    #[serde(default = "default_item_noun")]
    pub item_noun: String,
}

const fn default_fast() -> ProfileConfig {
    ProfileConfig::for_profile(Profile::Fast)
}

const fn default_normal() -> ProfileConfig {
    ProfileConfig::for_profile(Profile::Normal)
}

const fn default_hard_timeout() -> Duration {
    crate::watch::DEFAULT_HARD_TIMEOUT
}

const fn default_grace_period() -> Duration {
    crate::watch::DEFAULT_GRACE_PERIOD
}

const fn default_estimator_tick() -> Duration {
    crate::estimator::DEFAULT_TICK
}

const fn default_per_item_duration() -> Duration {
    crate::estimator::DEFAULT_PER_ITEM
}

fn default_item_noun() -> String {
    "file".to_string()
}

impl Config {
    /// Load configuration from a file or use defaults
    ///
    /// Without an explicit path, `settle.toml` in `base_dir` is used if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation
    pub fn load(base_dir: &Utf8Path, config_path: Option<&Utf8PathBuf>) -> Result<Self> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading settle configuration file '{path}'"))?;
            (path.clone(), text)
        } else {
            let path = base_dir.join(CONFIG_FILE_NAME);
            match fs::read_to_string(&path) {
                Ok(text) => (path, text),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Ok(Self::default());
                }
                Err(e) => return Err(e).into_app_err_with(|| format!("reading settle configuration file '{path}'")),
            }
        };

        let config: Self = toml::from_str(&text).into_app_err_with(|| format!("parsing configuration file '{final_path}'"))?;
        config.validate()?;

        Ok(config)
    }

    /// Save the default configuration to a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written
    pub fn save_default(output_path: &Utf8Path) -> Result<()> {
        fs::write(output_path, DEFAULT_CONFIG_TOML).into_app_err_with(|| format!("writing default configuration to {output_path}"))?;
        Ok(())
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error if an interval or threshold is zero, or if the hard timeout
    /// would expire before the first sample is taken
    pub fn validate(&self) -> Result<()> {
        for (name, profile) in [("fast", &self.fast), ("normal", &self.normal)] {
            if profile.poll_interval.is_zero() {
                return Err(app_err!("{name}.poll_interval must be greater than zero"));
            }

            if profile.stable_ticks == 0 {
                return Err(app_err!("{name}.stable_ticks must be greater than zero"));
            }

            if self.hard_timeout <= profile.poll_interval {
                return Err(app_err!(
                    "hard_timeout ({}) must be longer than {name}.poll_interval ({})",
                    humantime_serde::re::humantime::format_duration(self.hard_timeout),
                    humantime_serde::re::humantime::format_duration(profile.poll_interval)
                ));
            }
        }

        if self.item_noun.trim().is_empty() {
            return Err(app_err!("item_noun must not be empty"));
        }

        Ok(())
    }

    /// Build the options for a watch using the given profile
    #[must_use]
    pub fn watch_options(&self, profile: Profile) -> WatchOptions {
        let tunables = match profile {
            Profile::Fast => &self.fast,
            Profile::Normal => &self.normal,
        };

        WatchOptions {
            poll_interval: tunables.poll_interval,
            inactivity_timeout: tunables.inactivity_timeout,
            hard_timeout: self.hard_timeout,
            stable_ticks: tunables.stable_ticks,
            grace_period: self.grace_period,
            estimator_tick: (!self.estimator_tick.is_zero()).then_some(self.estimator_tick),
            per_item: self.per_item_duration,
            item_noun: self.item_noun.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG_TOML).expect("default_config.toml should be valid TOML that deserializes to Config")
    }
}
