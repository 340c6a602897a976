//! Processing shared between the watching commands.

use super::Host;
use super::config::Config;
use crate::Result;
use crate::progress::{BarSink, LogSink, ProgressReporter, Sink};
use crate::watch::{CompletionWatcher, Outcome, Profile, Sampler, Termination, WatchOptions};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, ValueEnum};
use ohno::app_err;
use owo_colors::OwoColorize;
use std::io::Write;
use std::sync::Arc;

const LOG_TARGET: &str = "    common";

/// Color mode configuration for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Always use colors
    Always,

    /// Never use colors
    Never,

    /// Use colors if the output is a terminal, otherwise don't use colors
    Auto,
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    None,

    /// Only error messages
    Error,

    /// Warning and error messages
    Warn,

    /// Info, warning, and error messages
    Info,

    /// Debug, info, warning, and error messages
    Debug,

    /// Trace, debug, info, warning, and error messages
    Trace,
}

/// Which polling profile to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProfileChoice {
    /// Fast when the container starts out empty, normal otherwise
    Auto,

    /// Fast polling with a long settle window
    Fast,

    /// Normal polling
    Normal,
}

impl ProfileChoice {
    pub const fn resolve(self, baseline: u64) -> Profile {
        match self {
            Self::Auto => Profile::for_baseline(baseline),
            Self::Fast => Profile::Fast,
            Self::Normal => Profile::Normal,
        }
    }
}

/// Arguments shared between the watching commands
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Path to configuration file (default is `settle.toml`)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Polling profile
    #[arg(long, value_name = "PROFILE", default_value = "auto")]
    pub profile: ProfileChoice,

    /// Control when to use colored output
    #[arg(long, value_name = "WHEN", default_value = "auto")]
    pub color: ColorMode,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "none", global = true)]
    pub log_level: LogLevel,
}

pub struct Common<'a, H: Host> {
    pub config: Config,
    watcher: CompletionWatcher,
    host: &'a mut H,
    profile: ProfileChoice,
    color: ColorMode,
}

impl<'a, H: Host> Common<'a, H> {
    /// Set up logging, load the configuration and build the progress display
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded
    pub fn new(host: &'a mut H, args: &CommonArgs) -> Result<Self> {
        Self::init_logging(args.log_level);

        let config = Config::load(Utf8Path::new("."), args.config.as_ref())?;

        let sink: Arc<dyn Sink> = if args.log_level == LogLevel::None {
            let use_colors = match args.color {
                ColorMode::Always => true,
                ColorMode::Never => false,
                ColorMode::Auto => {
                    use std::io::{IsTerminal, stderr};
                    stderr().is_terminal()
                }
            };
            Arc::new(BarSink::new("Settling", use_colors))
        } else {
            Arc::new(LogSink)
        };

        Ok(Self {
            config,
            watcher: CompletionWatcher::new(ProgressReporter::new(sink)),
            host,
            profile: args.profile,
            color: args.color,
        })
    }

    /// Initialize logger based on log level
    fn init_logging(log_level: LogLevel) {
        let level = match log_level {
            LogLevel::None => return,
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };

        let env = env_logger::Env::default().filter_or("RUST_LOG", level);

        // A logger may already be installed when commands run more than once in a process
        let _ = env_logger::Builder::from_env(env)
            .format_timestamp(None)
            .format_module_path(false)
            .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace))
            .try_init();
    }

    /// Options for a container whose current size is `baseline`
    pub fn watch_options(&self, baseline: u64) -> WatchOptions {
        let profile = self.profile.resolve(baseline);
        log::debug!(target: LOG_TARGET, "Using the {profile} polling profile");
        self.config.watch_options(profile)
    }

    /// Run a watch to its end and let the completion message linger for the grace period
    pub async fn watch<S: Sampler + 'static>(&self, expected: u64, sampler: S, opts: WatchOptions) -> Result<Outcome> {
        let grace = opts.grace_period;
        let outcome = self
            .watcher
            .watch_sampler(expected, sampler, opts)
            .wait()
            .await
            .ok_or_else(|| app_err!("the watch ended without reaching a decision"))?;

        tokio::time::sleep(grace).await;
        if self.watcher.reporter().is_busy() {
            self.watcher.reporter().reset();
        }

        Ok(outcome)
    }

    /// Print the one-line summary of a watch
    pub fn report(&mut self, outcome: &Outcome) {
        let use_colors = match self.color {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => {
                use std::io::{IsTerminal, stdout};
                stdout().is_terminal()
            }
        };

        let line = summary_line(outcome, &self.config.item_noun);
        let line = match (use_colors, outcome.termination) {
            (false, _) => line,
            (true, Termination::ReachedTarget) => format!("{}", line.green()),
            (true, _) => format!("{}", line.yellow()),
        };

        let _ = writeln!(self.host.output(), "{line}");
    }
}

fn summary_line(outcome: &Outcome, noun: &str) -> String {
    format!(
        "{} {noun}(s) settled: {} after {:.2}s ({} seen, {} tick(s))",
        outcome.reported_count,
        outcome.termination,
        outcome.elapsed.as_secs_f64(),
        outcome.added,
        outcome.ticks
    )
}
