//! Conditional-sum-of-squares estimation shared by the ARIMA and SARIMA adapters
//!
//! The model is written on the differenced series `w = (1-B)^d (1-B^s)^D y`:
//!
//! ```text
//! phi(B) PHI(B^s) (w_t - mu) = theta(B) THETA(B^s) e_t
//! ```
//!
//! with `mu = 0` whenever any differencing is applied. Residuals are computed
//! conditionally on the first observations (pre-sample errors are zero).
//! Pure autoregressions are estimated exactly by least squares; models with
//! moving-average or seasonal terms minimise the sum of squares with
//! Nelder-Mead starting from the autoregressive solution. Stationarity and
//! invertibility are not enforced.

use crate::error::{ForecastError, Result};
use crypto_math::linalg::least_squares;
use crypto_math::optimize::{nelder_mead, NelderMeadConfig};
use ndarray::{Array1, Array2};
use statrs::distribution::{ContinuousCDF, Normal};
use tracing::debug;

/// `(p,d,q) x (P,D,Q,s)`; seasonal parts are ignored when `s < 2`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ArmaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub seasonal_p: usize,
    pub seasonal_d: usize,
    pub seasonal_q: usize,
    pub period: usize,
}

impl ArmaOrder {
    pub fn non_seasonal(p: usize, d: usize, q: usize) -> Self {
        Self {
            p,
            d,
            q,
            seasonal_p: 0,
            seasonal_d: 0,
            seasonal_q: 0,
            period: 0,
        }
    }

    fn seasonal(&self) -> bool {
        self.period >= 2 && self.seasonal_p + self.seasonal_d + self.seasonal_q > 0
    }

    fn s(&self) -> usize {
        if self.seasonal() {
            self.period
        } else {
            0
        }
    }

    fn sd(&self) -> usize {
        if self.seasonal() {
            self.seasonal_d
        } else {
            0
        }
    }

    fn sp(&self) -> usize {
        if self.seasonal() {
            self.seasonal_p
        } else {
            0
        }
    }

    fn sq(&self) -> usize {
        if self.seasonal() {
            self.seasonal_q
        } else {
            0
        }
    }

    /// Observations consumed by differencing
    pub fn diff_len(&self) -> usize {
        self.d + self.sd() * self.s()
    }

    fn ar_len(&self) -> usize {
        self.p + self.sp() * self.s()
    }

    fn ma_len(&self) -> usize {
        self.q + self.sq() * self.s()
    }

    fn n_params(&self) -> usize {
        self.p + self.q + self.sp() + self.sq()
    }

    fn include_mean(&self) -> bool {
        self.diff_len() == 0
    }

    /// Fewest levels that leave enough differenced points to estimate
    pub fn min_observations(&self) -> usize {
        self.diff_len() + self.ar_len().max(self.ma_len()) + self.n_params() + 2
    }
}

/// Polynomial product, coefficients in ascending powers of `B`
fn poly_mul(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// `1 + sign * (c_1 B^step + c_2 B^{2 step} + ...)`
fn lag_poly(coefs: &[f64], step: usize, sign: f64) -> Vec<f64> {
    let mut poly = vec![0.0; coefs.len() * step + 1];
    poly[0] = 1.0;
    for (i, c) in coefs.iter().enumerate() {
        poly[(i + 1) * step] = sign * c;
    }
    poly
}

/// Apply `(1-B)^d (1-B^s)^D`
fn difference(values: &[f64], d: usize, seasonal_d: usize, s: usize) -> Vec<f64> {
    let mut out = values.to_vec();
    for _ in 0..d {
        out = out.windows(2).map(|w| w[1] - w[0]).collect();
    }
    for _ in 0..seasonal_d {
        out = (s..out.len()).map(|t| out[t] - out[t - s]).collect();
    }
    out
}

/// Unpacked parameter vector
#[derive(Debug, Clone, PartialEq)]
struct Coefficients {
    phi: Vec<f64>,
    theta: Vec<f64>,
    seasonal_phi: Vec<f64>,
    seasonal_theta: Vec<f64>,
}

impl Coefficients {
    fn unpack(order: &ArmaOrder, params: &[f64]) -> Self {
        let (phi, rest) = params.split_at(order.p);
        let (theta, rest) = rest.split_at(order.q);
        let (seasonal_phi, seasonal_theta) = rest.split_at(order.sp());
        Self {
            phi: phi.to_vec(),
            theta: theta.to_vec(),
            seasonal_phi: seasonal_phi.to_vec(),
            seasonal_theta: seasonal_theta.to_vec(),
        }
    }

    /// Expanded AR lag weights `a_k`: `w_t - mu = sum a_k (w_{t-k} - mu) + ...`
    fn ar_weights(&self, s: usize) -> Vec<f64> {
        let poly = poly_mul(
            &lag_poly(&self.phi, 1, -1.0),
            &lag_poly(&self.seasonal_phi, s.max(1), -1.0),
        );
        poly[1..].iter().map(|c| -c).collect()
    }

    /// Expanded MA lag weights `b_k`: `... + e_t + sum b_k e_{t-k}`
    fn ma_weights(&self, s: usize) -> Vec<f64> {
        let poly = poly_mul(
            &lag_poly(&self.theta, 1, 1.0),
            &lag_poly(&self.seasonal_theta, s.max(1), 1.0),
        );
        poly[1..].to_vec()
    }
}

/// Conditional residuals; entries before `start` are zero and not counted
fn css_residuals(w: &[f64], ar: &[f64], ma: &[f64], mu: f64, start: usize) -> Vec<f64> {
    let mut e = vec![0.0; w.len()];
    for t in start..w.len() {
        let mut pred = mu;
        for (k, a) in ar.iter().enumerate() {
            pred += a * (w[t - k - 1] - mu);
        }
        for (k, b) in ma.iter().enumerate() {
            if let Some(idx) = t.checked_sub(k + 1) {
                pred += b * e[idx];
            }
        }
        e[t] = w[t] - pred;
    }
    e
}

fn mean_square(e: &[f64]) -> f64 {
    if e.is_empty() {
        return f64::INFINITY;
    }
    e.iter().map(|v| v * v).sum::<f64>() / e.len() as f64
}

/// Least-squares autoregression of order `p` on (demeaned) `w`
fn ols_ar(w: &[f64], p: usize, mu: f64) -> Result<Vec<f64>> {
    if p == 0 {
        return Ok(Vec::new());
    }
    let rows = w.len().saturating_sub(p);
    if rows <= p {
        return Err(ForecastError::InsufficientData {
            required: 2 * p + 1,
            actual: w.len(),
        });
    }

    let mut x = Array2::<f64>::zeros((rows, p));
    let mut y = Array1::<f64>::zeros(rows);
    for r in 0..rows {
        let t = r + p;
        y[r] = w[t] - mu;
        for k in 0..p {
            x[[r, k]] = w[t - k - 1] - mu;
        }
    }

    let beta = least_squares(&x, &y).map_err(|e| {
        ForecastError::ModelError(format!("Autoregression could not be solved: {}", e))
    })?;
    Ok(beta.to_vec())
}

/// Estimated model together with the data it was fitted on
#[derive(Debug, Clone)]
pub(crate) struct FittedArma {
    order: ArmaOrder,
    levels: Vec<f64>,
    ar: Vec<f64>,
    ma: Vec<f64>,
    mu: f64,
    sigma2: f64,
    residuals: Vec<f64>,
    start: usize,
}

impl FittedArma {
    /// Estimate `order` on `levels` by conditional sum of squares
    pub fn fit(levels: &[f64], order: ArmaOrder, max_iter: usize) -> Result<Self> {
        let required = order.min_observations();
        if levels.len() < required {
            return Err(ForecastError::InsufficientData {
                required,
                actual: levels.len(),
            });
        }
        if levels.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::DataError(
                "Series contains non-finite values".to_string(),
            ));
        }

        let s = order.s();
        let w = difference(levels, order.d, order.sd(), s);
        let mu = if order.include_mean() {
            w.iter().sum::<f64>() / w.len() as f64
        } else {
            0.0
        };
        let start = order.ar_len();

        let phi0 = ols_ar(&w, order.p, mu)?;

        let pure_ar = order.q == 0 && order.sp() == 0 && order.sq() == 0;
        let params = if pure_ar {
            phi0
        } else {
            let mut initial = phi0;
            initial.resize(order.n_params(), 0.0);

            let objective = |params: &[f64]| {
                let c = Coefficients::unpack(&order, params);
                let e = css_residuals(&w, &c.ar_weights(s), &c.ma_weights(s), mu, start);
                mean_square(&e[start..])
            };
            let config = NelderMeadConfig {
                max_iter,
                tolerance: 1e-10,
                initial_step: 0.1,
            };
            let result = nelder_mead(objective, &initial, config)?;
            debug!(
                iterations = result.iterations,
                converged = result.converged,
                css = result.value,
                "css optimisation finished"
            );
            result.point
        };

        let coefs = Coefficients::unpack(&order, &params);
        let ar = coefs.ar_weights(s);
        let ma = coefs.ma_weights(s);
        let residuals = css_residuals(&w, &ar, &ma, mu, start);
        let sigma2 = mean_square(&residuals[start..]);

        if !sigma2.is_finite() {
            return Err(ForecastError::ModelError(
                "Residual variance is not finite".to_string(),
            ));
        }

        debug!(?params, sigma2, "fitted conditional least squares model");

        Ok(Self {
            order,
            levels: levels.to_vec(),
            ar,
            ma,
            mu,
            sigma2,
            residuals,
            start,
        })
    }

    /// Index of the first level with a one-step prediction
    pub fn first_fitted_index(&self) -> usize {
        self.order.diff_len() + self.start
    }

    /// One-step-ahead in-sample predictions on the level scale, starting at
    /// [`first_fitted_index`](Self::first_fitted_index)
    pub fn fitted_levels(&self) -> Vec<f64> {
        let offset = self.order.diff_len();
        (self.start..self.residuals.len())
            .map(|t| self.levels[t + offset] - self.residuals[t])
            .collect()
    }

    /// Level-scale recursion `y_t = c + sum f_k y_{t-k} + sum b_k e_{t-k} + e_t`
    fn level_ar(&self) -> Vec<f64> {
        let s = self.order.s();
        let mut integration = vec![1.0];
        for _ in 0..self.order.d {
            integration = poly_mul(&integration, &[1.0, -1.0]);
        }
        for _ in 0..self.order.sd() {
            integration = poly_mul(&integration, &lag_poly(&[1.0], s, -1.0));
        }

        let mut ar_poly = vec![1.0];
        ar_poly.extend(self.ar.iter().map(|a| -a));

        poly_mul(&ar_poly, &integration)[1..]
            .iter()
            .map(|c| -c)
            .collect()
    }

    /// Point forecasts with `level` two-sided normal prediction intervals
    pub fn forecast(&self, steps: usize, level: f64) -> Result<(Vec<f64>, Vec<(f64, f64)>)> {
        let f = self.level_ar();
        let b = &self.ma;
        let constant = self.mu * (1.0 - self.ar.iter().sum::<f64>());
        let n = self.levels.len();
        let offset = self.order.diff_len();

        let mut y = self.levels.clone();
        // Innovations on the level index; pre-sample and future ones are zero
        let mut e = vec![0.0; n];
        for (t, r) in self.residuals.iter().enumerate() {
            e[t + offset] = *r;
        }

        for _ in 0..steps {
            let t = y.len();
            let mut next = constant;
            for (k, fk) in f.iter().enumerate() {
                next += fk * y[t - k - 1];
            }
            for (k, bk) in b.iter().enumerate() {
                next += bk * e[t - k - 1];
            }
            y.push(next);
            e.push(0.0);
        }
        let points = y[n..].to_vec();

        // psi weights of the level process
        let mut psi = vec![1.0; steps.max(1)];
        for j in 1..psi.len() {
            let mut v = b.get(j - 1).copied().unwrap_or(0.0);
            for k in 1..=j.min(f.len()) {
                v += f[k - 1] * psi[j - k];
            }
            psi[j] = v;
        }

        let z = Normal::new(0.0, 1.0)
            .map_err(|e| ForecastError::ModelError(e.to_string()))?
            .inverse_cdf(0.5 + level / 2.0);

        let mut cumulative = 0.0;
        let intervals = points
            .iter()
            .enumerate()
            .map(|(h, p)| {
                cumulative += psi[h] * psi[h];
                let half = z * (self.sigma2 * cumulative).sqrt();
                (p - half, p + half)
            })
            .collect();

        Ok((points, intervals))
    }

    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    pub fn ar_weights(&self) -> &[f64] {
        &self.ar
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal as Gaussian};

    fn ar1_series(n: usize, phi: f64, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = Gaussian::new(0.0, 1.0).unwrap();
        let mut x = vec![0.0; n];
        for t in 1..n {
            x[t] = phi * x[t - 1] + noise.sample(&mut rng);
        }
        x
    }

    #[test]
    fn test_poly_helpers() {
        // (1 - 0.5B)(1 - 0.2B^2) = 1 - 0.5B - 0.2B^2 + 0.1B^3
        let p = poly_mul(&lag_poly(&[0.5], 1, -1.0), &lag_poly(&[0.2], 2, -1.0));
        assert_eq!(p, vec![1.0, -0.5, -0.2, 0.1]);

        assert_eq!(difference(&[1.0, 3.0, 6.0, 10.0], 1, 0, 0), vec![2.0, 3.0, 4.0]);
        assert_eq!(difference(&[1.0, 2.0, 5.0, 7.0], 0, 1, 2), vec![4.0, 5.0]);
    }

    #[test]
    fn test_recovers_ar1_coefficient() {
        let x = ar1_series(2000, 0.6, 3);
        let fitted = FittedArma::fit(&x, ArmaOrder::non_seasonal(1, 0, 0), 500).unwrap();

        assert_abs_diff_eq!(fitted.ar_weights()[0], 0.6, epsilon = 0.06);
        assert_abs_diff_eq!(fitted.sigma2(), 1.0, epsilon = 0.15);
    }

    #[test]
    fn test_forecast_intervals_widen() {
        let levels: Vec<f64> = (0..50).map(|i| 10.0 + 2.0 * i as f64).collect();
        let order = ArmaOrder::non_seasonal(1, 2, 0);
        let fitted = FittedArma::fit(&levels, order, 200);

        // Second differences are all zero, so the regression is singular
        assert!(fitted.is_err());

        let order = ArmaOrder::non_seasonal(1, 1, 0);
        let noisy: Vec<f64> = ar1_series(300, 0.3, 5)
            .iter()
            .scan(100.0, |acc, d| {
                *acc += d;
                Some(*acc)
            })
            .collect();
        let fitted = FittedArma::fit(&noisy, order, 200).unwrap();
        let (points, intervals) = fitted.forecast(10, 0.95).unwrap();

        assert_eq!(points.len(), 10);
        // Intervals widen with the horizon
        let widths: Vec<f64> = intervals.iter().map(|(lo, hi)| hi - lo).collect();
        assert!(widths.windows(2).all(|w| w[1] >= w[0]));
        assert!(intervals.iter().zip(&points).all(|((lo, hi), p)| lo < p && p < hi));
    }

    #[test]
    fn test_fitted_levels_alignment() {
        let levels: Vec<f64> = ar1_series(120, 0.5, 8).iter().map(|v| v + 50.0).collect();
        let order = ArmaOrder::non_seasonal(3, 1, 0);
        let fitted = FittedArma::fit(&levels, order, 200).unwrap();

        assert_eq!(fitted.first_fitted_index(), 4);
        assert_eq!(fitted.fitted_levels().len(), levels.len() - 4);
    }

    #[test]
    fn test_seasonal_moving_average_runs() {
        let levels: Vec<f64> = (0..200)
            .map(|i| 100.0 + (i as f64 * std::f64::consts::PI / 6.0).sin() * 5.0 + i as f64 * 0.1)
            .zip(ar1_series(200, 0.2, 1))
            .map(|(a, b)| a + b)
            .collect();
        let order = ArmaOrder {
            p: 1,
            d: 1,
            q: 1,
            seasonal_p: 1,
            seasonal_d: 1,
            seasonal_q: 1,
            period: 12,
        };

        let fitted = FittedArma::fit(&levels, order, 300).unwrap();
        assert_eq!(fitted.first_fitted_index(), 1 + 12 + 13);

        let (points, _) = fitted.forecast(24, 0.95).unwrap();
        assert!(points.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_too_short() {
        let order = ArmaOrder::non_seasonal(5, 1, 0);
        assert!(matches!(
            FittedArma::fit(&[1.0, 2.0, 3.0], order, 10),
            Err(ForecastError::InsufficientData { .. })
        ));
    }
}
