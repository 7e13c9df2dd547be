//! Progress tracking with ETA estimation

use std::time::Instant;
use tracing::info;

/// Frame progress tracker with ETA estimation
pub struct ProgressTracker {
    /// Estimated frame count, zero when unknown
    total: u64,
    processed: u64,
    start_time: Instant,
    label: String,
}

impl ProgressTracker {
    /// Creates a new progress tracker
    pub fn new(total: u64, label: &str) -> Self {
        Self {
            total,
            processed: 0,
            start_time: Instant::now(),
            label: label.to_string(),
        }
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Increments the processed count by one and logs every `report_interval` frames
    pub fn increment_and_report(&mut self, report_interval: u64) {
        self.processed += 1;
        if report_interval > 0 && self.processed % report_interval == 0 {
            self.report();
        }
    }

    /// Logs the final count
    pub fn finish(&self) {
        info!(
            label = %self.label,
            frames = self.processed,
            elapsed = %format_duration(self.start_time.elapsed().as_secs_f64()),
            "Completed"
        );
    }

    fn report(&self) {
        let elapsed_secs = self.start_time.elapsed().as_secs_f64();
        let current = self.processed;

        if self.total > current && elapsed_secs > 0.0 {
            let rate = current as f64 / elapsed_secs;
            let remaining = (self.total - current) as f64 / rate;
            info!(
                label = %self.label,
                frames = current,
                total = self.total,
                percent = format!("{:.1}", current as f64 / self.total as f64 * 100.0),
                elapsed = %format_duration(elapsed_secs),
                eta = %format_duration(remaining),
                "Progress"
            );
        } else {
            info!(
                label = %self.label,
                frames = current,
                elapsed = %format_duration(elapsed_secs),
                "Progress"
            );
        }
    }
}

/// Formats seconds into a human-readable duration string
pub fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else if secs < 3600.0 {
        let mins = (secs / 60.0).floor() as u64;
        let remaining = secs - (mins as f64 * 60.0);
        format!("{}m {:.0}s", mins, remaining)
    } else {
        let hours = (secs / 3600.0).floor() as u64;
        let remaining = secs - (hours as f64 * 3600.0);
        let mins = (remaining / 60.0).floor() as u64;
        let remaining_secs = remaining - (mins as f64 * 60.0);
        format!("{}h {}m {:.0}s", hours, mins, remaining_secs)
    }
}
