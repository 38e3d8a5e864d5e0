//! # Error history
//!
//! Bounded FIFO of the most recent signed heading errors, used for the derivative and integral
//! terms of the lateral controller.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::collections::VecDeque;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Maximum number of errors retained.
pub const ERROR_HISTORY_CAPACITY: usize = 10;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The most recent signed errors, oldest first.
#[derive(Debug, Clone)]
pub struct ErrorHistory {
    samples: VecDeque<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for ErrorHistory {
    fn default() -> Self {
        Self {
            samples: VecDeque::with_capacity(ERROR_HISTORY_CAPACITY),
        }
    }
}

impl ErrorHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an error, evicting the oldest one if the history is full.
    pub fn push(&mut self, error: f64) {
        if self.samples.len() == ERROR_HISTORY_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(error);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Iterate over the errors, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.samples.iter()
    }

    /// Difference of the last two errors over `dt_s`, or zero with fewer than two errors.
    pub fn derivative(&self, dt_s: f64) -> f64 {
        let n = self.samples.len();
        if n < 2 {
            return 0.0;
        }

        (self.samples[n - 1] - self.samples[n - 2]) / dt_s
    }

    /// Sum of all retained errors times `dt_s`, or zero with fewer than two errors.
    ///
    /// This is a plain rectangular sum over the window, not a trapezoidal integral.
    pub fn integral(&self, dt_s: f64) -> f64 {
        if self.samples.len() < 2 {
            return 0.0;
        }

        self.samples.iter().sum::<f64>() * dt_s
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_capacity_and_eviction() {
        let mut hist = ErrorHistory::new();
        for i in 0..11 {
            hist.push(i as f64);
            assert!(hist.len() <= ERROR_HISTORY_CAPACITY);
        }

        assert_eq!(hist.len(), 10);
        let v: Vec<f64> = hist.iter().copied().collect();
        assert_eq!(v, (1..11).map(|i| i as f64).collect::<Vec<_>>());
    }

    #[test]
    fn test_terms_zero_until_two_samples() {
        let mut hist = ErrorHistory::new();
        assert_eq!(hist.derivative(0.03), 0.0);
        assert_eq!(hist.integral(0.03), 0.0);

        hist.push(0.5);
        assert_eq!(hist.derivative(0.03), 0.0);
        assert_eq!(hist.integral(0.03), 0.0);

        hist.push(0.2);
        assert!((hist.derivative(0.1) - (-3.0)).abs() < 1e-12);
        assert!((hist.integral(0.1) - 0.07).abs() < 1e-12);
    }

    #[test]
    fn test_integral_is_window_sum() {
        let mut hist = ErrorHistory::new();
        for _ in 0..25 {
            hist.push(1.0);
        }
        // Only the last ten samples contribute
        assert!((hist.integral(0.5) - 5.0).abs() < 1e-12);
        assert_eq!(hist.derivative(0.5), 0.0);
    }
}
