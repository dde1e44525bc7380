//! Min-max scaling

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Maps values linearly from their observed range onto `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    min: f64,
    max: f64,
}

impl MinMaxScaler {
    /// Learn the range of `values`
    pub fn fit(values: &[f64]) -> Result<Self> {
        let mut iter = values.iter().copied().filter(|v| v.is_finite());
        let first = iter.next().ok_or_else(|| {
            MathError::InsufficientData("Cannot fit a scaler on an empty sample".to_string())
        })?;

        let (min, max) = iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Scale a single value. A constant fitted range maps everything to 0.
    pub fn transform_one(&self, value: f64) -> f64 {
        let span = self.span();
        if span == 0.0 {
            0.0
        } else {
            (value - self.min) / span
        }
    }

    pub fn transform(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| self.transform_one(*v)).collect()
    }

    /// Undo [`transform_one`](Self::transform_one)
    pub fn inverse_one(&self, scaled: f64) -> f64 {
        scaled * self.span() + self.min
    }

    pub fn inverse(&self, scaled: &[f64]) -> Vec<f64> {
        scaled.iter().map(|v| self.inverse_one(*v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_fit_and_transform() {
        let scaler = MinMaxScaler::fit(&[10.0, 20.0, 15.0]).unwrap();

        assert_eq!(scaler.min(), 10.0);
        assert_eq!(scaler.max(), 20.0);
        assert_eq!(scaler.transform(&[10.0, 15.0, 20.0]), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_inverse_recovers_input() {
        let scaler = MinMaxScaler::fit(&[3.0, 9.0]).unwrap();
        let scaled = scaler.transform(&[4.5, 12.0]);
        let restored = scaler.inverse(&scaled);

        assert_abs_diff_eq!(restored[0], 4.5, epsilon = 1e-12);
        // Values outside the fitted range extrapolate linearly
        assert_abs_diff_eq!(restored[1], 12.0, epsilon = 1e-12);
    }

    #[test]
    fn test_constant_range() {
        let scaler = MinMaxScaler::fit(&[5.0, 5.0]).unwrap();
        assert_eq!(scaler.transform_one(5.0), 0.0);
        assert_eq!(scaler.inverse_one(0.0), 5.0);
    }

    #[test]
    fn test_empty_rejected() {
        assert!(MinMaxScaler::fit(&[]).is_err());
        assert!(MinMaxScaler::fit(&[f64::NAN]).is_err());
    }
}
