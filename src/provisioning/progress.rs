use serde::Serialize;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};

/// Timing of the simulated progress shown for a pending step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressConfig {
    pub tick_interval: Duration,
    pub max_ticks: u32,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(5),
            max_ticks: 200,
        }
    }
}

impl ProgressConfig {
    /// Same interval, different ceiling
    pub fn with_max_ticks(self, max_ticks: u32) -> Self {
        Self { max_ticks, ..self }
    }
}

/// Visual progress snapshot; says nothing about whether the call resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Progress {
    pub ticks: u32,
    pub max: u32,
}

impl Progress {
    pub fn new(max: u32) -> Self {
        Self { ticks: 0, max }
    }

    pub fn is_full(&self) -> bool {
        self.ticks >= self.max
    }

    /// Completed fraction in `0.0..=1.0`
    pub fn fraction(&self) -> f64 {
        if self.max == 0 {
            1.0
        } else {
            f64::from(self.ticks.min(self.max)) / f64::from(self.max)
        }
    }

    pub fn percent(&self) -> u8 {
        (self.fraction() * 100.0).round() as u8
    }
}

/// Tick source decorating one pending step.
///
/// Runs next to the real call (`tokio::join!`); the step counts as done only
/// once both futures finished.
#[derive(Debug, Clone, Copy)]
pub struct ProgressSimulator {
    config: ProgressConfig,
}

impl ProgressSimulator {
    pub fn new(config: ProgressConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> ProgressConfig {
        self.config
    }

    /// Advance one tick per interval until the maximum, reporting each tick
    pub async fn run<F>(&self, mut on_tick: F) -> Progress
    where
        F: FnMut(Progress),
    {
        let mut progress = Progress::new(self.config.max_ticks);
        if progress.is_full() {
            return progress;
        }
        if self.config.tick_interval.is_zero() {
            progress.ticks = progress.max;
            on_tick(progress);
            return progress;
        }

        let mut interval = time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick resolves immediately
        interval.tick().await;

        while !progress.is_full() {
            interval.tick().await;
            progress.ticks += 1;
            on_tick(progress);
        }
        progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn test_fraction_bounds() {
        assert_eq!(Progress::new(0).fraction(), 1.0);
        assert_eq!(Progress { ticks: 50, max: 200 }.percent(), 25);
        assert_eq!(Progress { ticks: 300, max: 200 }.fraction(), 1.0);
        assert!(Progress::default().is_full());
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulator_takes_max_ticks_intervals() {
        let simulator = ProgressSimulator::new(ProgressConfig {
            tick_interval: Duration::from_millis(5),
            max_ticks: 200,
        });
        let start = Instant::now();
        let mut seen = 0;

        let progress = simulator.run(|_| seen += 1).await;

        assert!(progress.is_full());
        assert_eq!(seen, 200);
        assert_eq!(start.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_completes_at_once() {
        let simulator = ProgressSimulator::new(ProgressConfig {
            tick_interval: Duration::ZERO,
            max_ticks: 10,
        });
        let progress = simulator.run(|_| {}).await;
        assert_eq!(progress.ticks, 10);
    }
}
