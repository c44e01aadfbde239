//! Spinner shown while the sweep runs.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// A progress reporter that wraps an indicatif spinner.
pub struct BenchProgress {
    bar: ProgressBar,
}

impl BenchProgress {
    /// Spinner counting up to `total` configurations.
    pub fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} [{pos}/{len}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    /// Spinner that draws nothing.
    #[cfg(test)]
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn update(&self, msg: &str) {
        self.bar.set_message(msg.to_string());
    }

    /// Count one finished configuration.
    pub fn tick(&self) {
        self.bar.inc(1);
    }

    #[cfg(test)]
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Finish and clear the progress spinner.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
