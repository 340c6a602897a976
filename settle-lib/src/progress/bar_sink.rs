use super::Sink;
use core::fmt::{Debug, Formatter};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Refresh rate for the terminal bar.
const REFRESH_HZ: u8 = 10;

const TEMPLATE: &str = "{prefix:>10.bold.cyan} [{bar:25}] {pos:>3}% {msg}";
const TEMPLATE_NO_COLOR: &str = "{prefix:>10} [{bar:25}] {pos:>3}% {msg}";

/// A [`Sink`] rendering a percentage bar on stderr.
///
/// The bar stays hidden until [`Sink::show_busy`] and is cleared again on [`Sink::hide`].
pub struct BarSink {
    bar: ProgressBar,
    use_colors: bool,
}

impl BarSink {
    /// Create a hidden bar. When `use_colors` is false the bar chrome is rendered without ANSI styling.
    #[must_use]
    pub fn new(prefix: &str, use_colors: bool) -> Self {
        let bar = ProgressBar::with_draw_target(Some(100), ProgressDrawTarget::hidden());
        let template = if use_colors { TEMPLATE } else { TEMPLATE_NO_COLOR };
        bar.set_style(
            ProgressStyle::default_bar()
                .template(template)
                .expect("could not create progress bar style")
                .progress_chars("=> "),
        );
        bar.set_prefix(prefix.to_string());

        Self { bar, use_colors }
    }
}

impl Sink for BarSink {
    fn show_busy(&self, label: &str) {
        self.bar.reset();
        self.bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(REFRESH_HZ));
        self.bar.set_message(label.to_string());
    }

    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "percent is clamped to 0..=100 by the reporter"
    )]
    fn set_percent(&self, percent: f64) {
        self.bar.set_position(percent.round() as u64);
    }

    fn set_label(&self, label: &str) {
        self.bar.set_message(label.to_string());
    }

    fn hide(&self) {
        self.bar.finish_and_clear();
        self.bar.set_draw_target(ProgressDrawTarget::hidden());
        self.bar.reset();
    }
}

impl Debug for BarSink {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BarSink")
            .field("bar", &self.bar)
            .field("use_colors", &self.use_colors)
            .finish()
    }
}
