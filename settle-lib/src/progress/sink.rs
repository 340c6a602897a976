/// A visual indicator driven by a [`ProgressReporter`](super::ProgressReporter).
///
/// Implementations render progress somewhere (a terminal bar, a log, a widget).
/// Only the reporter calls into a sink; it guarantees that percentages it forwards
/// are clamped to `0..=100` and never decrease within a session.
pub trait Sink: Send + Sync {
    /// Make the indicator visible in its busy state with an initial label.
    fn show_busy(&self, label: &str);

    /// Update the filled fraction of the indicator, in percent.
    fn set_percent(&self, percent: f64);

    /// Replace the status text.
    fn set_label(&self, label: &str);

    /// Hide the indicator and return it to its idle appearance.
    fn hide(&self);
}

/// A sink that records every call, for assertions in tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: std::sync::Mutex<Vec<SinkEvent>>,
}

#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    ShowBusy(String),
    Percent(f64),
    Label(String),
    Hide,
}

#[cfg(test)]
impl RecordingSink {
    pub fn new() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn percents(&self) -> Vec<f64> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Percent(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn last_label(&self) -> Option<String> {
        self.events().into_iter().rev().find_map(|e| match e {
            SinkEvent::Label(l) | SinkEvent::ShowBusy(l) => Some(l),
            _ => None,
        })
    }

    fn push(&self, event: SinkEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[cfg(test)]
impl Sink for RecordingSink {
    fn show_busy(&self, label: &str) {
        self.push(SinkEvent::ShowBusy(label.to_string()));
    }

    fn set_percent(&self, percent: f64) {
        self.push(SinkEvent::Percent(percent));
    }

    fn set_label(&self, label: &str) {
        self.push(SinkEvent::Label(label.to_string()));
    }

    fn hide(&self) {
        self.push(SinkEvent::Hide);
    }
}
