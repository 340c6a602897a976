use super::Sink;

const LOG_TARGET: &str = "  progress";

/// A [`Sink`] that reports through the `log` facade instead of drawing anything.
///
/// Used when diagnostic logging is enabled, where a redrawn bar would interleave
/// badly with log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl Sink for LogSink {
    fn show_busy(&self, label: &str) {
        log::info!(target: LOG_TARGET, "{label}");
    }

    fn set_percent(&self, percent: f64) {
        log::debug!(target: LOG_TARGET, "{percent:.0}%");
    }

    fn set_label(&self, label: &str) {
        log::info!(target: LOG_TARGET, "{label}");
    }

    fn hide(&self) {
        log::debug!(target: LOG_TARGET, "Idle");
    }
}
