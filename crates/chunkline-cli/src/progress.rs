//! Progress display and human-readable formatting.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Byte-level progress bar for a copy
pub struct TransferProgress {
    bar: ProgressBar,
}

impl TransferProgress {
    /// Create a new progress tracker
    #[must_use]
    pub fn new(total_bytes: u64, label: &str) -> Self {
        let bar = ProgressBar::new(total_bytes);

        if let Ok(style) = ProgressStyle::default_bar().template(
            "{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
        ) {
            bar.set_style(style.progress_chars("#>-"));
        }

        bar.set_message(format!("Copying: {label}"));

        Self { bar }
    }

    /// Cloneable handle for updating from another thread
    #[must_use]
    pub fn handle(&self) -> ProgressBar {
        self.bar.clone()
    }

    /// Finish with custom message
    pub fn finish_with_message(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }

    /// Abandon the progress bar (for errors)
    pub fn abandon(&self) {
        self.bar.abandon();
    }
}

/// Byte count scaled by powers of 1024, two decimals
///
/// Sizes past the terabyte range stay in `TB`.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let exp = bytes
        .checked_ilog2()
        .map_or(0, |log| (log / 10).min(UNITS.len() as u32 - 1));
    let scaled = bytes as f64 / (1u64 << (10 * exp)) as f64;
    format!("{scaled:.2} {}", UNITS[exp as usize])
}

/// Copy throughput, as reported by [`WriteReport::bytes_per_second`]
///
/// [`WriteReport::bytes_per_second`]: chunkline_files::WriteReport::bytes_per_second
#[must_use]
pub fn format_speed(bytes_per_sec: f64) -> String {
    format!("{}/s", format_bytes(bytes_per_sec as u64))
}

/// Elapsed time at the coarsest useful unit
///
/// Sub-second copies show milliseconds.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    match duration.as_secs() {
        0 => format!("{}ms", duration.as_millis()),
        secs @ 1..60 => format!("{secs}s"),
        secs @ 60..3600 => format!("{}m {}s", secs / 60, secs % 60),
        secs => format!("{}h {}m", secs / 3600, secs % 3600 / 60),
    }
}
