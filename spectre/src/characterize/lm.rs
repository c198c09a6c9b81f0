//! Levenberg-Marquardt optimizer for 1D profile fitting.
//!
//! Generic over the parameter count so the same machinery can serve other
//! line-shape models. Uses f64 throughout for numerical stability.

use crate::math::solve_linear_system;

/// Configuration for Levenberg-Marquardt optimization.
#[derive(Debug, Clone)]
pub struct LmConfig {
    /// Maximum iterations.
    pub max_iterations: usize,
    /// Convergence threshold for parameter changes.
    pub convergence_threshold: f64,
    /// Initial damping parameter.
    pub initial_lambda: f64,
    /// Factor to increase lambda on a failed step.
    pub lambda_up: f64,
    /// Factor to decrease lambda on a successful step.
    pub lambda_down: f64,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            convergence_threshold: 1e-8,
            initial_lambda: 0.001,
            lambda_up: 10.0,
            lambda_down: 0.1,
        }
    }
}

/// Result of L-M optimization.
#[derive(Debug, Clone, Copy)]
pub struct LmResult<const N: usize> {
    pub params: [f64; N],
    pub chi2: f64,
    pub converged: bool,
    pub iterations: usize,
}

/// Trait for 1D models that can be fit with L-M optimization.
pub trait LmModel<const N: usize> {
    /// Evaluate the model at a point.
    fn evaluate(&self, x: f64, params: &[f64; N]) -> f64;

    /// Compute partial derivatives at a point.
    fn jacobian_row(&self, x: f64, params: &[f64; N]) -> [f64; N];

    /// Apply parameter constraints after an update.
    fn constrain(&self, params: &mut [f64; N]);
}

/// Run L-M optimization for an N-parameter model.
pub fn optimize<const N: usize, M: LmModel<N>>(
    model: &M,
    data_x: &[f64],
    data_y: &[f64],
    initial_params: [f64; N],
    config: &LmConfig,
) -> LmResult<N> {
    let mut params = initial_params;
    let mut lambda = config.initial_lambda;
    let mut prev_chi2 = compute_chi2(model, data_x, data_y, &params);
    let mut converged = false;
    let mut iterations = 0;

    for iter in 0..config.max_iterations {
        iterations = iter + 1;

        let (hessian, gradient) = build_normal_equations(model, data_x, data_y, &params);

        let mut damped = hessian;
        for (i, row) in damped.iter_mut().enumerate() {
            row[i] *= 1.0 + lambda;
        }

        let a: Vec<Vec<f64>> = damped.iter().map(|row| row.to_vec()).collect();
        let Some(delta) = solve_linear_system(&a, &gradient) else {
            break;
        };

        let mut new_params = params;
        for (p, d) in new_params.iter_mut().zip(delta.iter()) {
            *p += d;
        }
        model.constrain(&mut new_params);

        let new_chi2 = compute_chi2(model, data_x, data_y, &new_params);

        // Non-strict comparison so a zero-residual fit can still register
        // the final, vanishing step as convergence.
        if new_chi2 <= prev_chi2 {
            params = new_params;
            lambda *= config.lambda_down;
            prev_chi2 = new_chi2;

            let max_delta = delta.iter().copied().fold(0.0f64, |a, d| a.max(d.abs()));
            if max_delta < config.convergence_threshold {
                converged = true;
                break;
            }
        } else {
            lambda *= config.lambda_up;
            if lambda > 1e10 {
                break;
            }
        }
    }

    LmResult {
        params,
        chi2: prev_chi2,
        converged,
        iterations,
    }
}

fn compute_chi2<const N: usize, M: LmModel<N>>(
    model: &M,
    data_x: &[f64],
    data_y: &[f64],
    params: &[f64; N],
) -> f64 {
    data_x
        .iter()
        .zip(data_y.iter())
        .map(|(&x, &y)| {
            let residual = y - model.evaluate(x, params);
            residual * residual
        })
        .sum()
}

/// Compute Hessian (J^T J) and gradient (J^T r) in one pass.
/// Exploits symmetry: only computes the upper triangle, then mirrors.
#[allow(clippy::needless_range_loop)]
fn build_normal_equations<const N: usize, M: LmModel<N>>(
    model: &M,
    data_x: &[f64],
    data_y: &[f64],
    params: &[f64; N],
) -> ([[f64; N]; N], [f64; N]) {
    let mut hessian = [[0.0f64; N]; N];
    let mut gradient = [0.0f64; N];

    for (&x, &y) in data_x.iter().zip(data_y.iter()) {
        let row = model.jacobian_row(x, params);
        let r = y - model.evaluate(x, params);
        for i in 0..N {
            gradient[i] += row[i] * r;
            for j in i..N {
                hessian[i][j] += row[i] * row[j];
            }
        }
    }

    for i in 1..N {
        for j in 0..i {
            hessian[i][j] = hessian[j][i];
        }
    }

    (hessian, gradient)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Simple line model y = a*x + b for exercising the optimizer.
    struct Line;

    impl LmModel<2> for Line {
        fn evaluate(&self, x: f64, params: &[f64; 2]) -> f64 {
            params[0] * x + params[1]
        }

        fn jacobian_row(&self, x: f64, _params: &[f64; 2]) -> [f64; 2] {
            [x, 1.0]
        }

        fn constrain(&self, _params: &mut [f64; 2]) {}
    }

    #[test]
    fn test_fits_exact_line() {
        let data_x: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let data_y: Vec<f64> = data_x.iter().map(|x| 2.5 * x - 1.0).collect();

        let result = optimize(&Line, &data_x, &data_y, [1.0, 0.0], &LmConfig::default());
        assert!(result.converged);
        assert!((result.params[0] - 2.5).abs() < 1e-6);
        assert!((result.params[1] + 1.0).abs() < 1e-6);
        assert!(result.chi2 < 1e-10);
    }

    #[test]
    fn test_constrain_is_applied() {
        struct ClampedLine;
        impl LmModel<2> for ClampedLine {
            fn evaluate(&self, x: f64, params: &[f64; 2]) -> f64 {
                params[0] * x + params[1]
            }
            fn jacobian_row(&self, x: f64, _params: &[f64; 2]) -> [f64; 2] {
                [x, 1.0]
            }
            fn constrain(&self, params: &mut [f64; 2]) {
                params[0] = params[0].clamp(0.0, 1.0);
            }
        }

        let data_x: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let data_y: Vec<f64> = data_x.iter().map(|x| 5.0 * x).collect();

        let result = optimize(&ClampedLine, &data_x, &data_y, [0.5, 0.0], &LmConfig::default());
        assert!(result.params[0] <= 1.0 + 1e-12);
    }
}
