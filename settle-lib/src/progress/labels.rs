//! Status texts shown while waiting for items and once they have arrived.

/// Label shown when a watch starts, e.g. `Uploading 3 file(s)…`.
#[must_use]
pub fn busy(count: u64, noun: &str) -> String {
    format!("Uploading {count} {noun}(s)…")
}

/// Label shown on completion, e.g. `Done! 3 file(s) added`.
#[must_use]
pub fn done(count: u64, noun: &str) -> String {
    format!("Done! {count} {noun}(s) added")
}
