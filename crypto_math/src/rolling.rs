//! Trailing-window statistics
//!
//! Contains:
//! - [`RollingWindow`], a streaming fixed-size window with mean and sample
//!   standard deviation
//! - slice helpers that produce values aligned with their input, where the
//!   first `window - 1` positions (and any window touching a missing value)
//!   are `None`

use crate::{MathError, Result};
use std::collections::VecDeque;

/// Streaming fixed-size trailing window
#[derive(Debug, Clone)]
pub struct RollingWindow {
    period: usize,
    values: VecDeque<f64>,
    sum: f64,
}

impl RollingWindow {
    /// Create a new window holding at most `period` values
    pub fn new(period: usize) -> Result<Self> {
        if period == 0 {
            return Err(MathError::InvalidInput(
                "Period must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            period,
            values: VecDeque::with_capacity(period),
            sum: 0.0,
        })
    }

    /// Push a value, evicting the oldest one once the window is full
    pub fn update(&mut self, value: f64) {
        self.values.push_back(value);
        self.sum += value;

        if self.values.len() > self.period {
            if let Some(old_value) = self.values.pop_front() {
                self.sum -= old_value;
            }
        }
    }

    /// Whether the window holds `period` values
    pub fn is_full(&self) -> bool {
        self.values.len() == self.period
    }

    /// Mean of the window
    pub fn mean(&self) -> Result<f64> {
        if !self.is_full() {
            return Err(MathError::InsufficientData(format!(
                "Not enough data for rolling mean. Need {} values, have {}.",
                self.period,
                self.values.len()
            )));
        }

        Ok(self.sum / self.period as f64)
    }

    /// Sample standard deviation (n - 1 denominator) of the window
    pub fn std_dev(&self) -> Result<f64> {
        if !self.is_full() {
            return Err(MathError::InsufficientData(format!(
                "Not enough data for rolling standard deviation. Need {} values, have {}.",
                self.period,
                self.values.len()
            )));
        }
        if self.period < 2 {
            return Err(MathError::InvalidInput(
                "Sample standard deviation needs a window of at least 2".to_string(),
            ));
        }

        let mean = self.values.iter().sum::<f64>() / self.period as f64;
        let variance = self
            .values
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / (self.period - 1) as f64;

        Ok(variance.sqrt())
    }

    /// Get the window size
    pub fn period(&self) -> usize {
        self.period
    }

    /// Clear all values
    pub fn reset(&mut self) {
        self.values.clear();
        self.sum = 0.0;
    }
}

fn rolling_apply<F>(values: &[Option<f64>], window: usize, stat: F) -> Result<Vec<Option<f64>>>
where
    F: Fn(&RollingWindow) -> Result<f64>,
{
    let mut state = RollingWindow::new(window)?;
    let mut out = Vec::with_capacity(values.len());

    for value in values {
        match value {
            Some(v) if v.is_finite() => state.update(*v),
            // A missing value restarts the window
            _ => state.reset(),
        }

        if state.is_full() {
            out.push(Some(stat(&state)?));
        } else {
            out.push(None);
        }
    }

    Ok(out)
}

/// Trailing mean over `window` values, aligned with the input
pub fn rolling_mean(values: &[f64], window: usize) -> Result<Vec<Option<f64>>> {
    let wrapped: Vec<Option<f64>> = values.iter().copied().map(Some).collect();
    rolling_mean_opt(&wrapped, window)
}

/// Trailing mean over a series that may contain missing values
pub fn rolling_mean_opt(values: &[Option<f64>], window: usize) -> Result<Vec<Option<f64>>> {
    rolling_apply(values, window, RollingWindow::mean)
}

/// Trailing sample standard deviation over `window` values
pub fn rolling_std(values: &[f64], window: usize) -> Result<Vec<Option<f64>>> {
    let wrapped: Vec<Option<f64>> = values.iter().copied().map(Some).collect();
    rolling_std_opt(&wrapped, window)
}

/// Trailing sample standard deviation over a series that may contain missing values
pub fn rolling_std_opt(values: &[Option<f64>], window: usize) -> Result<Vec<Option<f64>>> {
    rolling_apply(values, window, RollingWindow::std_dev)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_window_calculation() {
        let mut window = RollingWindow::new(3).unwrap();

        // Not enough data yet
        assert!(window.mean().is_err());

        window.update(2.0);
        window.update(4.0);
        assert!(window.std_dev().is_err());

        window.update(6.0);
        assert_eq!(window.mean().unwrap(), 4.0); // (2 + 4 + 6) / 3
        assert_abs_diff_eq!(window.std_dev().unwrap(), 2.0, epsilon = 1e-12);

        // The window slides, dropping the oldest value
        window.update(8.0);
        assert_eq!(window.mean().unwrap(), 6.0);
    }

    #[test]
    fn test_zero_period_rejected() {
        assert!(RollingWindow::new(0).is_err());
        assert!(rolling_mean(&[1.0], 0).is_err());
    }

    #[test]
    fn test_rolling_mean_alignment() {
        let means = rolling_mean(&[1.0, 2.0, 3.0, 4.0], 2).unwrap();
        assert_eq!(means, vec![None, Some(1.5), Some(2.5), Some(3.5)]);
    }

    #[test]
    fn test_rolling_std_skips_missing() {
        let values = [None, Some(1.0), Some(3.0), Some(5.0)];
        let stds = rolling_std_opt(&values, 2).unwrap();

        assert_eq!(stds[0], None);
        assert_eq!(stds[1], None);
        assert_abs_diff_eq!(stds[2].unwrap(), 2.0_f64.sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(stds[3].unwrap(), 2.0_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_gap_in_the_middle() {
        let values = [Some(1.0), Some(2.0), None, Some(4.0), Some(6.0)];
        let means = rolling_mean_opt(&values, 2).unwrap();
        assert_eq!(means, vec![None, Some(1.5), None, None, Some(5.0)]);
    }
}
