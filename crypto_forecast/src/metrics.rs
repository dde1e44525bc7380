//! Error metrics between predicted and actual values

use crate::error::{ForecastError, Result};
use serde::Serialize;

fn check_lengths(predicted: &[f64], actual: &[f64]) -> Result<()> {
    if predicted.len() != actual.len() || predicted.is_empty() {
        return Err(ForecastError::ValidationError(format!(
            "Predicted ({}) and actual ({}) values must have the same non-zero length",
            predicted.len(),
            actual.len()
        )));
    }
    Ok(())
}

/// Mean absolute error
pub fn mae(predicted: &[f64], actual: &[f64]) -> Result<f64> {
    check_lengths(predicted, actual)?;
    let sum: f64 = predicted
        .iter()
        .zip(actual)
        .map(|(p, a)| (p - a).abs())
        .sum();
    Ok(sum / predicted.len() as f64)
}

/// Mean squared error
pub fn mse(predicted: &[f64], actual: &[f64]) -> Result<f64> {
    check_lengths(predicted, actual)?;
    let sum: f64 = predicted
        .iter()
        .zip(actual)
        .map(|(p, a)| (p - a).powi(2))
        .sum();
    Ok(sum / predicted.len() as f64)
}

/// Root mean squared error
pub fn rmse(predicted: &[f64], actual: &[f64]) -> Result<f64> {
    mse(predicted, actual).map(f64::sqrt)
}

/// Mean absolute percentage error in percent, skipping zero actuals
pub fn mape(predicted: &[f64], actual: &[f64]) -> Result<f64> {
    check_lengths(predicted, actual)?;
    let (sum, count) = predicted
        .iter()
        .zip(actual)
        .filter(|(_, a)| **a != 0.0)
        .fold((0.0, 0usize), |(sum, count), (p, a)| {
            (sum + ((a - p) / a).abs(), count + 1)
        });

    if count == 0 {
        return Err(ForecastError::ValidationError(
            "MAPE is undefined when every actual value is zero".to_string(),
        ));
    }
    Ok(sum / count as f64 * 100.0)
}

/// Accuracy summary of one prediction run
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastAccuracy {
    pub mae: f64,
    pub mse: f64,
    pub rmse: f64,
    /// `None` when every actual value is zero
    pub mape: Option<f64>,
}

/// Compute every metric at once
pub fn forecast_accuracy(predicted: &[f64], actual: &[f64]) -> Result<ForecastAccuracy> {
    let mse = mse(predicted, actual)?;
    Ok(ForecastAccuracy {
        mae: mae(predicted, actual)?,
        mse,
        rmse: mse.sqrt(),
        mape: mape(predicted, actual).ok(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_basic_metrics() {
        let predicted = [1.0, 2.0, 3.0, 4.0];
        let actual = [1.5, 2.0, 2.0, 5.0];

        assert_relative_eq!(mae(&predicted, &actual).unwrap(), 0.625);
        assert_relative_eq!(mse(&predicted, &actual).unwrap(), 0.5625);
        assert_relative_eq!(rmse(&predicted, &actual).unwrap(), 0.75);
    }

    #[test]
    fn test_mape_skips_zero_actuals() {
        let value = mape(&[110.0, 5.0], &[100.0, 0.0]).unwrap();
        assert_relative_eq!(value, 10.0);
        assert!(mape(&[1.0], &[0.0]).is_err());
    }

    #[test]
    fn test_perfect_prediction() {
        let values = [3.0, 1.0, 4.0, 1.0, 5.0];
        let accuracy = forecast_accuracy(&values, &values).unwrap();

        assert_eq!(accuracy.mae, 0.0);
        assert_eq!(accuracy.rmse, 0.0);
        assert_eq!(accuracy.mape, Some(0.0));
    }

    #[rstest]
    #[case(&[], &[])]
    #[case(&[1.0, 2.0], &[1.0])]
    fn test_invalid_lengths(#[case] predicted: &[f64], #[case] actual: &[f64]) {
        assert!(matches!(
            mae(predicted, actual),
            Err(ForecastError::ValidationError(_))
        ));
        assert!(rmse(predicted, actual).is_err());
    }
}
