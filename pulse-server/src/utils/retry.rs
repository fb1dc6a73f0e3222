use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;

/// Backoff multiplier (2.0 which is 100% increase per backoff).
const DEFAULT_MULTIPLIER: f64 = 2.0;
/// Randomization factor (0.25 which is ±25% jitter).
///
/// Together with the multiplier this keeps consecutive delays strictly increasing until the
/// maximum interval is reached.
const DEFAULT_RANDOMIZATION: f64 = 0.25;

/// Lower bound for the initial interval, so retries never run back to back.
const MIN_INITIAL_INTERVAL: Duration = Duration::from_millis(10);

/// A retry interval generator that increases timeouts with exponential backoff.
#[derive(Debug)]
pub struct RetryBackoff {
    backoff: ExponentialBackoff,
    attempt: usize,
}

impl RetryBackoff {
    /// Creates a new retry backoff based on configured thresholds.
    pub fn new(initial_interval: Duration, max_interval: Duration) -> Self {
        let initial_interval = initial_interval.max(MIN_INITIAL_INTERVAL);
        let backoff = ExponentialBackoff {
            current_interval: initial_interval,
            initial_interval,
            randomization_factor: DEFAULT_RANDOMIZATION,
            multiplier: DEFAULT_MULTIPLIER,
            max_interval: max_interval.max(initial_interval),
            max_elapsed_time: None,
            ..Default::default()
        };

        RetryBackoff {
            backoff,
            attempt: 0,
        }
    }

    /// Resets this backoff to its initial state.
    pub fn reset(&mut self) {
        self.backoff.reset();
        self.attempt = 0;
    }

    /// Indicates whether a backoff attempt has started.
    pub fn started(&self) -> bool {
        self.attempt > 0
    }

    /// Returns the number of the attempt started by the last call to `next_backoff`.
    pub fn attempt(&self) -> usize {
        self.attempt
    }

    /// Returns the next backoff duration.
    ///
    /// The first attempt runs without delay.
    pub fn next_backoff(&mut self) -> Duration {
        let duration = match self.attempt {
            0 => Duration::ZERO,
            _ => self
                .backoff
                .next_backoff()
                .unwrap_or(self.backoff.max_interval),
        };

        self.attempt += 1;
        duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INITIAL: Duration = Duration::from_millis(100);

    #[test]
    fn test_first_attempt_immediate() {
        let mut backoff = RetryBackoff::new(INITIAL, Duration::from_secs(60));
        assert!(!backoff.started());
        assert_eq!(backoff.next_backoff(), Duration::ZERO);
        assert!(backoff.started());
        assert_eq!(backoff.attempt(), 1);
    }

    #[test]
    fn test_delays_increase() {
        let mut backoff = RetryBackoff::new(INITIAL, Duration::from_secs(60));
        backoff.next_backoff();

        let mut previous = Duration::ZERO;
        for _ in 0..6 {
            let delay = backoff.next_backoff();
            assert!(delay > previous, "{delay:?} <= {previous:?}");
            previous = delay;
        }
    }

    #[test]
    fn test_jitter_bounds() {
        let mut backoff = RetryBackoff::new(INITIAL, Duration::from_secs(60));
        backoff.next_backoff();

        let first = backoff.next_backoff();
        assert!(first >= Duration::from_millis(75));
        assert!(first <= Duration::from_millis(125));
    }

    #[test]
    fn test_zero_initial_interval_floored() {
        let mut backoff = RetryBackoff::new(Duration::ZERO, Duration::ZERO);
        backoff.next_backoff();

        let first = backoff.next_backoff();
        assert!(first >= MIN_INITIAL_INTERVAL.mul_f64(0.75), "{first:?}");

        let second = backoff.next_backoff();
        assert!(second > Duration::ZERO, "{second:?}");
    }

    #[test]
    fn test_capped() {
        let max = Duration::from_millis(400);
        let mut backoff = RetryBackoff::new(INITIAL, max);
        for _ in 0..20 {
            assert!(backoff.next_backoff() <= max.mul_f64(1.0 + DEFAULT_RANDOMIZATION));
        }
    }

    #[test]
    fn test_reset() {
        let mut backoff = RetryBackoff::new(INITIAL, Duration::from_secs(60));
        for _ in 0..5 {
            backoff.next_backoff();
        }

        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_backoff(), Duration::ZERO);
        assert!(backoff.next_backoff() <= Duration::from_millis(125));
    }
}
