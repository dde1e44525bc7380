//! Descriptive statistics
//!
//! Thin layer over `statrs` producing the summaries used by the exploratory
//! views: five-number summaries, equal-width histograms and Pearson
//! correlation.

use crate::{MathError, Result};
use serde::Serialize;
use statrs::statistics::{Data, OrderStatistics, Statistics};

/// Count, moments and order statistics of a sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1); `NaN` for a single value
    pub std_dev: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

/// One equal-width histogram bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

fn finite_values(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}

/// Summarise the finite values of a sample
pub fn summarize(values: &[f64]) -> Result<Summary> {
    let clean = finite_values(values);
    if clean.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot summarise an empty sample".to_string(),
        ));
    }

    let mut ordered = Data::new(clean.clone());

    Ok(Summary {
        count: clean.len(),
        mean: clean.iter().mean(),
        std_dev: clean.iter().std_dev(),
        min: Statistics::min(clean.iter()),
        q25: ordered.quantile(0.25),
        median: ordered.quantile(0.5),
        q75: ordered.quantile(0.75),
        max: Statistics::max(clean.iter()),
    })
}

/// Equal-width histogram between the sample minimum and maximum.
///
/// The last bin is closed on the right so the maximum is counted.
pub fn histogram(values: &[f64], bins: usize) -> Result<Vec<HistogramBin>> {
    if bins == 0 {
        return Err(MathError::InvalidInput(
            "Number of bins must be greater than zero".to_string(),
        ));
    }
    let clean = finite_values(values);
    if clean.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot build a histogram from an empty sample".to_string(),
        ));
    }

    let lo = Statistics::min(clean.iter());
    let hi = Statistics::max(clean.iter());
    // Degenerate sample: widen to a unit range around the single value
    let (lo, hi) = if hi > lo { (lo, hi) } else { (lo - 0.5, hi + 0.5) };
    let width = (hi - lo) / bins as f64;

    let mut counts = vec![0usize; bins];
    for v in &clean {
        let idx = (((v - lo) / width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }

    Ok(counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            lower: lo + width * i as f64,
            upper: lo + width * (i + 1) as f64,
            count,
        })
        .collect())
}

/// Pearson correlation coefficient of two equally long samples
pub fn pearson(x: &[f64], y: &[f64]) -> Result<f64> {
    if x.len() != y.len() {
        return Err(MathError::InvalidInput(format!(
            "Samples must have the same length ({} vs {})",
            x.len(),
            y.len()
        )));
    }
    if x.len() < 2 {
        return Err(MathError::InsufficientData(
            "Correlation needs at least two observations".to_string(),
        ));
    }

    let sx = x.iter().std_dev();
    let sy = y.iter().std_dev();
    if sx == 0.0 || sy == 0.0 {
        return Err(MathError::CalculationError(
            "Correlation is undefined for a constant sample".to_string(),
        ));
    }

    Ok(x.iter().covariance(y.iter()) / (sx * sy))
}

/// Pairwise Pearson correlation of several equally long columns.
///
/// Undefined pairs (constant columns) are reported as `NaN`.
pub fn correlation_matrix(columns: &[&[f64]]) -> Result<Vec<Vec<f64>>> {
    let n = columns.len();
    let mut matrix = vec![vec![f64::NAN; n]; n];

    for i in 0..n {
        for j in i..n {
            let r = match pearson(columns[i], columns[j]) {
                Ok(r) => r,
                Err(MathError::CalculationError(_)) => f64::NAN,
                Err(e) => return Err(e),
            };
            matrix[i][j] = r;
            matrix[j][i] = r;
        }
    }

    Ok(matrix)
}
