use std::time::Instant;

/// Returns a formatted elapsed-time string, e.g. `1min 34.852s`.
pub fn formatted_elapsed_time(instant: Instant) -> String {
    let dur = instant.elapsed();
    let minutes = dur.as_secs() / 60;
    let sub_sec = dur.as_secs() % 60;
    let sub_milli = dur.subsec_millis();
    if minutes > 0 {
        return format!("{minutes}min {sub_sec}.{sub_milli}s");
    }
    format!("{sub_sec}.{sub_milli}s")
}

/// Tracks whole-percent progress and logs only on change, the way the
/// teacher's tools print `"{step}: {progress}%"` without spamming every row.
pub struct ProgressTracker {
    label: &'static str,
    last: i64,
}

impl ProgressTracker {
    pub fn new(label: &'static str) -> Self {
        ProgressTracker { label, last: -1 }
    }

    pub fn update(&mut self, done: usize, total: usize) {
        if total == 0 {
            return;
        }
        let pct = (100.0 * done as f64 / total as f64) as i64;
        if pct != self.last {
            log::debug!("{}: {}%", self.label, pct);
            self.last = pct;
        }
    }
}
