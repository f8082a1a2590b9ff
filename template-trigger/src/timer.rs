//! Wall clock timing of the benchmark loop.
use serde::Serialize;
use std::{
    fmt,
    time::{Duration, Instant},
};

#[derive(Default)]
pub(crate) struct Timer {
    start: Option<Instant>,
    duration: Duration,
    cumulative_duration: Duration,
}

impl Timer {
    /// Starts the timer, returns [None] if it is already running.
    pub(crate) fn record(&mut self) -> Option<()> {
        if self.start.is_none() {
            self.start = Some(Instant::now());
            Some(())
        } else {
            None
        }
    }

    /// Stops the timer, returns [None] if it was not running.
    pub(crate) fn end(&mut self) -> Option<()> {
        self.duration = Instant::now().checked_duration_since(self.start?)?;
        self.start = None;
        Some(())
    }

    pub(crate) fn accumulate(&mut self) -> Option<()> {
        self.cumulative_duration = self.cumulative_duration.checked_add(self.duration)?;
        Some(())
    }
}

/// Times the whole run, and each iteration of it.
#[derive(Default)]
pub(crate) struct TimerSuite {
    pub(crate) full: Timer,
    pub(crate) iteration: Timer,
    num_iterations: u64,
    target_iterations: u64,
}

impl TimerSuite {
    pub(crate) fn new(target_iterations: u64) -> Self {
        Self {
            target_iterations,
            ..Default::default()
        }
    }

    pub(crate) fn has_finished(&self) -> bool {
        self.num_iterations >= self.target_iterations
    }

    pub(crate) fn next_iteration(&mut self) -> Option<()> {
        self.num_iterations += 1;
        self.iteration.accumulate()
    }

    pub(crate) fn report(&self) -> TimingReport {
        let per_iteration = |duration: Duration| {
            duration
                .as_micros()
                .checked_div(self.num_iterations.into())
                .unwrap_or_default()
        };
        TimingReport {
            iterations: self.num_iterations,
            total_us: self.full.cumulative_duration.as_micros(),
            loop_us: self.iteration.cumulative_duration.as_micros(),
            loop_per_iteration_us: per_iteration(self.iteration.cumulative_duration),
            total_per_iteration_us: per_iteration(self.full.cumulative_duration),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub(crate) struct TimingReport {
    pub(crate) iterations: u64,
    pub(crate) total_us: u128,
    pub(crate) total_per_iteration_us: u128,
    pub(crate) loop_us: u128,
    pub(crate) loop_per_iteration_us: u128,
}

impl fmt::Display for TimingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Timing for {} iterations.", self.iterations)?;
        writeln!(
            f,
            "Total time: {}us, Total Time/Iteration: {}us",
            self.total_us, self.total_per_iteration_us
        )?;
        write!(
            f,
            "Loop time: {}us, Loop Time/Iteration: {}us",
            self.loop_us, self.loop_per_iteration_us
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_must_be_started_before_ending() {
        let mut timer = Timer::default();
        assert_eq!(timer.end(), None);
        assert_eq!(timer.record(), Some(()));
        assert_eq!(timer.record(), None);
        assert_eq!(timer.end(), Some(()));
        assert_eq!(timer.end(), None);
    }

    #[test]
    fn suite_counts_iterations() {
        let mut suite = TimerSuite::new(3);
        while !suite.has_finished() {
            suite.iteration.record().unwrap();
            suite.iteration.end().unwrap();
            suite.next_iteration().unwrap();
        }
        let report = suite.report();
        assert_eq!(report.iterations, 3);
        assert!(report.loop_per_iteration_us <= report.loop_us);
    }

    #[test]
    fn empty_suite_reports_zero() {
        let report = TimerSuite::new(0).report();
        assert_eq!(report.iterations, 0);
        assert_eq!(report.total_per_iteration_us, 0);
    }
}
