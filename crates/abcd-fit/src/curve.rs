//! Nonlinear least squares (Levenberg-Marquardt).
//!
//! Uncertainties are treated as relative (`absolute_sigma = false`): the
//! returned covariance is scaled by `chi2 / ndf`.

use abcd_core::{Error, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// A model `y = f(x; p)` with an analytic parameter gradient.
pub trait CurveModel {
    /// Number of parameters.
    fn n_params(&self) -> usize;

    /// Model value at `x`.
    fn eval(&self, x: f64, params: &[f64]) -> f64;

    /// `df/dp_i` at `x`.
    fn gradient(&self, x: f64, params: &[f64]) -> Vec<f64>;
}

/// Falling exponential `a * exp(-b x) + c`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpFall;

impl ExpFall {
    /// Starting point `[sum(y) / 0.18, 0.18, min(y)]`.
    pub fn initial_guess(y: &[f64]) -> Vec<f64> {
        let sum: f64 = y.iter().sum();
        let min = y.iter().copied().fold(f64::INFINITY, f64::min);
        vec![sum / 0.18, 0.18, if min.is_finite() { min } else { 0.0 }]
    }
}

impl CurveModel for ExpFall {
    fn n_params(&self) -> usize {
        3
    }

    fn eval(&self, x: f64, p: &[f64]) -> f64 {
        p[0] * (-p[1] * x).exp() + p[2]
    }

    fn gradient(&self, x: f64, p: &[f64]) -> Vec<f64> {
        let e = (-p[1] * x).exp();
        vec![e, -p[0] * x * e, 1.0]
    }
}

/// Convergence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitOptions {
    /// Maximum number of accepted or rejected steps.
    pub max_iter: usize,
    /// Relative chi-square reduction below which the fit has converged.
    pub ftol: f64,
    /// Relative parameter step below which the fit has converged.
    pub xtol: f64,
    /// Initial damping.
    pub lambda_init: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self { max_iter: 400, ftol: 1.49e-8, xtol: 1.49e-8, lambda_init: 1e-3 }
    }
}

/// Result of a nonlinear fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveFit {
    /// Best-fit parameters.
    pub params: Vec<f64>,
    /// Covariance scaled by `chi2 / ndf` (infinite when `ndf == 0`).
    pub cov: Vec<Vec<f64>>,
    /// Chi-square at the minimum.
    pub chi2: f64,
    /// Points used minus parameters.
    pub ndf: usize,
    /// Iterations taken.
    pub n_iter: usize,
}

impl CurveFit {
    /// Square root of the diagonal covariance entry of parameter `i`.
    pub fn param_error(&self, i: usize) -> f64 {
        self.cov[i][i].max(0.0).sqrt()
    }
}

struct Points {
    x: Vec<f64>,
    y: Vec<f64>,
    sigma: Vec<f64>,
}

impl Points {
    fn chi2<M: CurveModel + ?Sized>(&self, model: &M, p: &[f64]) -> f64 {
        self.x
            .iter()
            .zip(&self.y)
            .zip(&self.sigma)
            .map(|((&x, &y), &s)| {
                let r = (y - model.eval(x, p)) / s;
                r * r
            })
            .sum()
    }

    /// Weighted Jacobian `J` and residual vector `r = (y - f) / sigma`.
    fn linearize<M: CurveModel + ?Sized>(&self, model: &M, p: &[f64]) -> (DMatrix<f64>, DVector<f64>) {
        let n = self.x.len();
        let k = p.len();
        let mut jac = DMatrix::<f64>::zeros(n, k);
        let mut res = DVector::<f64>::zeros(n);
        for i in 0..n {
            let s = self.sigma[i];
            for (j, g) in model.gradient(self.x[i], p).into_iter().enumerate() {
                jac[(i, j)] = g / s;
            }
            res[i] = (self.y[i] - model.eval(self.x[i], p)) / s;
        }
        (jac, res)
    }
}

/// Fit `model` to `(x, y)` with per-point uncertainties `sigma`.
///
/// Points with non-positive or non-finite `sigma` are skipped. Failure to
/// converge within `options.max_iter` steps is an error.
pub fn fit<M: CurveModel + ?Sized>(
    model: &M,
    x: &[f64],
    y: &[f64],
    sigma: &[f64],
    p0: &[f64],
    options: &FitOptions,
) -> Result<CurveFit> {
    let k = model.n_params();
    if p0.len() != k {
        return Err(Error::Validation(format!("expected {} starting values, got {}", k, p0.len())));
    }
    if x.len() != y.len() || x.len() != sigma.len() {
        return Err(Error::Validation(format!(
            "fit inputs differ in length: x={}, y={}, sigma={}",
            x.len(),
            y.len(),
            sigma.len()
        )));
    }
    let mut pts = Points { x: Vec::new(), y: Vec::new(), sigma: Vec::new() };
    for i in 0..x.len() {
        if sigma[i].is_finite() && sigma[i] > 0.0 && x[i].is_finite() && y[i].is_finite() {
            pts.x.push(x[i]);
            pts.y.push(y[i]);
            pts.sigma.push(sigma[i]);
        }
    }
    let n = pts.x.len();
    if n < k {
        return Err(Error::Computation(format!("{n} usable points for {k} parameters")));
    }

    let mut params = p0.to_vec();
    let mut chi2 = pts.chi2(model, &params);
    if !chi2.is_finite() {
        return Err(Error::Computation("chi-square is not finite at the starting point".into()));
    }
    let mut lambda = options.lambda_init;
    let mut converged = false;
    let mut n_iter = 0;

    while n_iter < options.max_iter {
        n_iter += 1;
        let (jac, res) = pts.linearize(model, &params);
        let jtj = jac.transpose() * &jac;
        let jtr = jac.transpose() * &res;

        let mut damped = jtj.clone();
        for d in 0..k {
            damped[(d, d)] += lambda * jtj[(d, d)].max(f64::MIN_POSITIVE);
        }
        let Some(step) = damped.lu().solve(&jtr) else {
            lambda *= 10.0;
            continue;
        };
        let trial: Vec<f64> = params.iter().zip(step.iter()).map(|(p, s)| p + s).collect();
        let trial_chi2 = pts.chi2(model, &trial);

        if trial_chi2.is_finite() && trial_chi2 < chi2 {
            // heavily damped steps are short by construction
            let gauss_newton = lambda <= 1.0;
            let p_norm = params.iter().map(|p| p * p).sum::<f64>().sqrt();
            let small_step =
                gauss_newton && step.norm() <= options.xtol * (p_norm + options.xtol);
            let small_gain = gauss_newton && chi2 - trial_chi2 <= options.ftol * chi2;
            params = trial;
            chi2 = trial_chi2;
            lambda = (lambda / 10.0).max(1e-12);
            if small_step || small_gain || chi2 <= f64::EPSILON {
                converged = true;
                break;
            }
        } else {
            lambda *= 10.0;
            if lambda > 1e16 {
                // no damped step helps: fine at a stationary point, a stall otherwise
                let predicted = jtj.lu().solve(&jtr).map(|s| s.dot(&jtr));
                match predicted {
                    Some(gain) if gain <= options.ftol * chi2.max(1.0) => {
                        converged = true;
                        break;
                    }
                    _ => {
                        return Err(Error::Computation(format!(
                            "Levenberg-Marquardt stalled after {n_iter} iterations (chi2 = {chi2:.4})"
                        )));
                    }
                }
            }
        }
    }

    if !converged {
        return Err(Error::Computation(format!(
            "curve fit did not converge after {} iterations (chi2 = {:.4})",
            options.max_iter, chi2
        )));
    }

    let (jac, _) = pts.linearize(model, &params);
    let jtj = jac.transpose() * &jac;
    let ndf = n - k;
    let cov = match jtj.lu().try_inverse() {
        Some(inv) if ndf > 0 => inv * (chi2 / ndf as f64),
        _ => DMatrix::from_element(k, k, f64::INFINITY),
    };
    tracing::trace!(n_iter, chi2, ndf, "curve fit converged");

    Ok(CurveFit {
        params,
        cov: (0..k).map(|r| cov.row(r).iter().copied().collect()).collect(),
        chi2,
        ndf,
        n_iter,
    })
}
