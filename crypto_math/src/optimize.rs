//! Derivative-free minimisation (Nelder-Mead simplex)

use crate::{MathError, Result};

/// Tuning knobs for [`nelder_mead`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NelderMeadConfig {
    pub max_iter: usize,
    /// Stop once the spread of objective values across the simplex falls below this
    pub tolerance: f64,
    /// Size of the initial simplex step along each axis
    pub initial_step: f64,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iter: 500,
            tolerance: 1e-8,
            initial_step: 0.1,
        }
    }
}

/// Outcome of a minimisation run
#[derive(Debug, Clone, PartialEq)]
pub struct NelderMeadResult {
    pub point: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Minimise `f` starting from `initial`.
///
/// Non-finite objective values are treated as `+inf`, so the objective may
/// signal an infeasible point by returning `NaN` or infinity.
pub fn nelder_mead<F>(f: F, initial: &[f64], config: NelderMeadConfig) -> Result<NelderMeadResult>
where
    F: Fn(&[f64]) -> f64,
{
    let n = initial.len();
    if n == 0 {
        return Err(MathError::InvalidInput(
            "Cannot optimise over zero parameters".to_string(),
        ));
    }
    if config.initial_step <= 0.0 {
        return Err(MathError::InvalidInput(
            "Initial step must be positive".to_string(),
        ));
    }

    let eval = |x: &[f64]| {
        let v = f(x);
        if v.is_finite() {
            v
        } else {
            f64::INFINITY
        }
    };

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    simplex.push(initial.to_vec());
    for i in 0..n {
        let mut vertex = initial.to_vec();
        vertex[i] += if vertex[i] != 0.0 {
            config.initial_step * vertex[i].abs().max(1.0)
        } else {
            config.initial_step
        };
        simplex.push(vertex);
    }
    let mut values: Vec<f64> = simplex.iter().map(|x| eval(x)).collect();

    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iter {
        // Order vertices best to worst
        let mut order: Vec<usize> = (0..=n).collect();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
        simplex = order.iter().map(|&i| simplex[i].clone()).collect();
        values = order.iter().map(|&i| values[i]).collect();

        let best = values[0];
        let worst = values[n];
        if worst.is_finite() && (worst - best).abs() <= config.tolerance * (1.0 + best.abs()) {
            converged = true;
            break;
        }
        iterations += 1;

        let centroid: Vec<f64> = (0..n)
            .map(|j| simplex[..n].iter().map(|v| v[j]).sum::<f64>() / n as f64)
            .collect();
        let towards = |coef: f64| -> Vec<f64> {
            centroid
                .iter()
                .zip(&simplex[n])
                .map(|(c, w)| c + coef * (c - w))
                .collect()
        };

        let reflected = towards(REFLECT);
        let f_reflected = eval(&reflected);

        if f_reflected < values[0] {
            let expanded = towards(EXPAND);
            let f_expanded = eval(&expanded);
            if f_expanded < f_reflected {
                simplex[n] = expanded;
                values[n] = f_expanded;
            } else {
                simplex[n] = reflected;
                values[n] = f_reflected;
            }
            continue;
        }

        if f_reflected < values[n - 1] {
            simplex[n] = reflected;
            values[n] = f_reflected;
            continue;
        }

        let contracted = if f_reflected < values[n] {
            towards(CONTRACT)
        } else {
            towards(-CONTRACT)
        };
        let f_contracted = eval(&contracted);
        if f_contracted < values[n].min(f_reflected) {
            simplex[n] = contracted;
            values[n] = f_contracted;
            continue;
        }

        // Shrink everything towards the best vertex
        let anchor = simplex[0].clone();
        for i in 1..=n {
            for j in 0..n {
                simplex[i][j] = anchor[j] + SHRINK * (simplex[i][j] - anchor[j]);
            }
            values[i] = eval(&simplex[i]);
        }
    }

    let (best_idx, _) = values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .ok_or_else(|| MathError::CalculationError("Empty simplex".to_string()))?;

    if !values[best_idx].is_finite() {
        return Err(MathError::CalculationError(
            "Objective was not finite anywhere on the simplex".to_string(),
        ));
    }

    Ok(NelderMeadResult {
        point: simplex[best_idx].clone(),
        value: values[best_idx],
        iterations,
        converged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_quadratic_bowl() {
        let f = |x: &[f64]| (x[0] - 1.0).powi(2) + (x[1] + 2.0).powi(2);
        let result = nelder_mead(f, &[0.0, 0.0], NelderMeadConfig::default()).unwrap();

        assert!(result.converged);
        assert_abs_diff_eq!(result.point[0], 1.0, epsilon = 1e-3);
        assert_abs_diff_eq!(result.point[1], -2.0, epsilon = 1e-3);
    }

    #[test]
    fn test_rosenbrock() {
        let f = |x: &[f64]| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2);
        let config = NelderMeadConfig {
            max_iter: 5000,
            tolerance: 1e-12,
            ..Default::default()
        };
        let result = nelder_mead(f, &[-1.2, 1.0], config).unwrap();

        assert_abs_diff_eq!(result.point[0], 1.0, epsilon = 1e-2);
        assert_abs_diff_eq!(result.point[1], 1.0, epsilon = 1e-2);
    }

    #[test]
    fn test_infeasible_region_avoided() {
        // Objective undefined for x < 0
        let f = |x: &[f64]| if x[0] < 0.0 { f64::NAN } else { (x[0] - 0.5).powi(2) };
        let result = nelder_mead(f, &[2.0], NelderMeadConfig::default()).unwrap();
        assert_abs_diff_eq!(result.point[0], 0.5, epsilon = 1e-3);
    }

    #[test]
    fn test_empty_parameters_rejected() {
        assert!(nelder_mead(|_| 0.0, &[], NelderMeadConfig::default()).is_err());
    }
}
