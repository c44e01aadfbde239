//! Wall-clock timing for the measured region of a run.

use std::time::{Duration, Instant};

/// Wall-clock timer started by the root rank just before scatter.
#[derive(Debug, Clone, Copy)]
pub struct BenchTimer {
    start: Instant,
}

impl BenchTimer {
    /// Start the timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Time elapsed since [`BenchTimer::start`].
    pub fn stop(&self) -> Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_measures_positive() {
        let timer = BenchTimer::start();
        std::thread::sleep(Duration::from_millis(10));
        let elapsed = timer.stop();
        assert!(
            elapsed >= Duration::from_millis(5),
            "Timer should measure at least ~10ms (got {elapsed:?})"
        );
    }
}
