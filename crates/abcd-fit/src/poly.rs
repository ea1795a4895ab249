//! Weighted polynomial least squares.
//!
//! Fits `f(x, z) = sum_i p_i x^a_i z^b_i` for a fixed list of monomials
//! `(a_i, b_i)`, with weights `1 / variance`. The one-dimensional fit is the
//! special case where every `b_i = 0`.

use abcd_core::{Axis, Error, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::propagate::{Band, linear_error};

/// Result of a weighted linear least-squares fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolyFit {
    /// Coefficients, one per monomial in `powers`.
    pub params: Vec<f64>,
    /// Covariance matrix `(X^T W X)^-1`, row by row.
    pub cov: Vec<Vec<f64>>,
    /// Weighted sum of squared residuals.
    pub chi2: f64,
    /// Number of points used minus number of parameters.
    pub ndf: usize,
    /// `(x power, z power)` of each coefficient.
    pub powers: Vec<(u32, u32)>,
}

impl PolyFit {
    /// Number of fitted coefficients.
    pub fn n_params(&self) -> usize {
        self.params.len()
    }

    /// Monomials evaluated at `(x, z)`; also the gradient with respect to the parameters.
    pub fn basis(&self, x: f64, z: f64) -> Vec<f64> {
        monomials(&self.powers, x, z)
    }

    /// `f(x)` of a one-dimensional fit.
    pub fn eval(&self, x: f64) -> f64 {
        self.eval_2d(x, 0.0)
    }

    /// `f(x, z)`.
    pub fn eval_2d(&self, x: f64, z: f64) -> f64 {
        self.basis(x, z).iter().zip(&self.params).map(|(b, p)| b * p).sum()
    }

    /// `f(x, z)` and its 1-sigma uncertainty from the parameter covariance.
    pub fn eval_with_error(&self, x: f64, z: f64) -> (f64, f64) {
        let grad = self.basis(x, z);
        let value = grad.iter().zip(&self.params).map(|(b, p)| b * p).sum();
        (value, linear_error(&grad, &self.cov))
    }

    /// Central curve and error band along `xs` at fixed `z`.
    pub fn band(&self, xs: &[f64], z: f64) -> Band {
        let (central, error) = xs.iter().map(|&x| self.eval_with_error(x, z)).unzip();
        Band { x: xs.to_vec(), central, error }
    }

    /// Square root of the diagonal covariance entry of parameter `i`.
    pub fn param_error(&self, i: usize) -> f64 {
        self.cov[i][i].max(0.0).sqrt()
    }
}

/// Monomials `x^0 .. x^order`.
pub fn poly_powers(order: usize) -> Vec<(u32, u32)> {
    (0..=order as u32).map(|k| (k, 0)).collect()
}

/// Monomials `x^n z^m` with `m <= orders_z[n]`, ordered by `n` then `m`.
pub fn smoothing_powers(order_x: usize, orders_z: &[usize]) -> Result<Vec<(u32, u32)>> {
    if orders_z.len() <= order_x {
        return Err(Error::Validation(format!(
            "smoothing orders {:?} must list one order per x power up to {}",
            orders_z, order_x
        )));
    }
    Ok((0..=order_x)
        .flat_map(|n| (0..=orders_z[n]).map(move |m| (n as u32, m as u32)))
        .collect())
}

fn monomials(powers: &[(u32, u32)], x: f64, z: f64) -> Vec<f64> {
    powers.iter().map(|&(a, b)| x.powi(a as i32) * z.powi(b as i32)).collect()
}

/// Weighted polynomial fit `f(x) = sum_k p_k x^k` with `w = 1 / var`.
pub fn fit_weighted(x: &[f64], y: &[f64], var: &[f64], order: usize) -> Result<PolyFit> {
    let z = vec![0.0; x.len()];
    fit_monomials(&poly_powers(order), x, &z, y, var)
}

/// Weighted smoothing fit `f(x, z) = sum_n sum_{m <= orders_z[n]} p_nm x^n z^m`.
pub fn fit_weighted_2d(
    x: &[f64],
    z: &[f64],
    y: &[f64],
    var: &[f64],
    order_x: usize,
    orders_z: &[usize],
) -> Result<PolyFit> {
    fit_monomials(&smoothing_powers(order_x, orders_z)?, x, z, y, var)
}

/// Weighted linear least squares on an arbitrary monomial list.
pub fn fit_monomials(
    powers: &[(u32, u32)],
    x: &[f64],
    z: &[f64],
    y: &[f64],
    var: &[f64],
) -> Result<PolyFit> {
    let n = x.len();
    if z.len() != n || y.len() != n || var.len() != n {
        return Err(Error::Validation(format!(
            "fit inputs differ in length: x={}, z={}, y={}, var={}",
            n,
            z.len(),
            y.len(),
            var.len()
        )));
    }
    let k = powers.len();
    let used: Vec<usize> = (0..n)
        .filter(|&i| {
            var[i].is_finite() && var[i] > 0.0 && x[i].is_finite() && z[i].is_finite() && y[i].is_finite()
        })
        .collect();
    if used.len() < k {
        return Err(Error::Computation(format!(
            "{} usable points for {} parameters",
            used.len(),
            k
        )));
    }

    let mut xtwx = DMatrix::<f64>::zeros(k, k);
    let mut xtwy = DVector::<f64>::zeros(k);
    for &i in &used {
        let w = 1.0 / var[i];
        let b = DVector::from_vec(monomials(powers, x[i], z[i]));
        xtwx += &b * b.transpose() * w;
        xtwy += &b * (w * y[i]);
    }
    let cov = xtwx
        .lu()
        .try_inverse()
        .ok_or_else(|| Error::Computation("weighted least squares: singular normal matrix".into()))?;
    let beta = &cov * &xtwy;
    let params: Vec<f64> = beta.iter().copied().collect();

    let chi2 = used
        .iter()
        .map(|&i| {
            let f: f64 =
                monomials(powers, x[i], z[i]).iter().zip(&params).map(|(b, p)| b * p).sum();
            let r = y[i] - f;
            r * r / var[i]
        })
        .sum();

    Ok(PolyFit {
        params,
        cov: (0..k).map(|r| cov.row(r).iter().copied().collect()).collect(),
        chi2,
        ndf: used.len() - k,
        powers: powers.to_vec(),
    })
}

/// One fit per bin of a set of detector axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    /// Detector axes the fits are binned in (row-major, last fastest).
    pub axes: Vec<Axis>,
    /// One fit per regular bin of `axes`.
    pub fits: Vec<PolyFit>,
}

impl ParamGrid {
    /// Assemble a grid; `fits` must match the number of bins of `axes`.
    pub fn new(axes: Vec<Axis>, fits: Vec<PolyFit>) -> Result<Self> {
        let expected: usize = axes.iter().map(Axis::n_bins).product();
        if fits.len() != expected {
            return Err(Error::Validation(format!(
                "parameter grid expects {} fits, got {}",
                expected,
                fits.len()
            )));
        }
        Ok(Self { axes, fits })
    }

    /// Bins per axis.
    pub fn shape(&self) -> Vec<usize> {
        self.axes.iter().map(Axis::n_bins).collect()
    }

    /// Parameters per fit.
    pub fn n_params(&self) -> usize {
        self.fits.first().map(PolyFit::n_params).unwrap_or(0)
    }

    /// Position of a detector axis.
    pub fn axis_index(&self, name: &str) -> Result<usize> {
        self.axes
            .iter()
            .position(|a| a.name == name)
            .ok_or_else(|| Error::MissingAxis(name.to_string()))
    }

    /// Fit at a multi-index over `axes`.
    pub fn get(&self, bins: &[usize]) -> Result<&PolyFit> {
        let shape = self.shape();
        if bins.len() != shape.len() || bins.iter().zip(&shape).any(|(b, n)| b >= n) {
            return Err(Error::Validation(format!(
                "bin {bins:?} outside parameter grid of shape {shape:?}"
            )));
        }
        let flat = bins.iter().zip(&shape).fold(0, |acc, (b, n)| acc * n + b);
        Ok(&self.fits[flat])
    }

    /// Chi-square of every fit, flattened.
    pub fn chi2_values(&self) -> Vec<f64> {
        self.fits.iter().map(|f| f.chi2).collect()
    }

    /// Degrees of freedom of a fit using every point.
    pub fn ndf(&self) -> usize {
        self.fits.iter().map(|f| f.ndf).max().unwrap_or(0)
    }

    /// Parameter `ip` and its uncertainty for every fit, flattened.
    pub fn param(&self, ip: usize) -> (Vec<f64>, Vec<f64>) {
        self.fits.iter().map(|f| (f.params[ip], f.param_error(ip))).unzip()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    #[test]
    fn weighted_mean_closed_form() {
        let fit = fit_weighted(&[0.0, 1.0], &[1.0, 3.0], &[1.0, 1.0], 0).unwrap();
        assert_relative_eq!(fit.params[0], 2.0);
        assert_relative_eq!(fit.cov[0][0], 0.5);
        assert_relative_eq!(fit.chi2, 2.0);
        assert_eq!(fit.ndf, 1);
    }

    #[test]
    fn zero_variance_points_are_excluded() {
        let fit = fit_weighted(&[0.0, 1.0], &[1.0, 3.0], &[1.0, 0.0], 0).unwrap();
        assert_relative_eq!(fit.params[0], 1.0);
        assert_eq!(fit.ndf, 0);
    }

    #[test]
    fn too_few_points_is_an_error() {
        let err = fit_weighted(&[1.0, 2.0], &[1.0, 2.0], &[1.0, 1.0], 2).unwrap_err();
        assert!(matches!(err, Error::Computation(_)));
    }

    #[test]
    fn quadratic_is_recovered_exactly() {
        let x = [1.0, 3.5, 7.0, 11.5, 17.0, 23.5, 33.5];
        let y: Vec<f64> = x.iter().map(|&v| 1.0 + 0.5 * v - 0.02 * v * v).collect();
        let var = vec![0.01; x.len()];
        let fit = fit_weighted(&x, &y, &var, 2).unwrap();
        assert_relative_eq!(fit.params[0], 1.0, epsilon = 1e-8);
        assert_relative_eq!(fit.params[1], 0.5, epsilon = 1e-8);
        assert_relative_eq!(fit.params[2], -0.02, epsilon = 1e-10);
        assert!(fit.chi2 < 1e-12);
        assert_eq!(fit.ndf, 4);
        assert_relative_eq!(fit.eval(10.0), 1.0 + 5.0 - 2.0, epsilon = 1e-8);
    }

    #[test]
    fn straight_line_with_noise_is_within_errors() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let x: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let sigma = 0.2;
        let noise = Normal::new(0.0, sigma).unwrap();
        let y: Vec<f64> = x.iter().map(|&v| 0.8 - 0.01 * v + noise.sample(&mut rng)).collect();
        let fit = fit_weighted(&x, &y, &vec![sigma * sigma; x.len()], 1).unwrap();
        assert!((fit.params[0] - 0.8).abs() < 5.0 * fit.param_error(0));
        assert!((fit.params[1] + 0.01).abs() < 5.0 * fit.param_error(1));
        assert!(fit.chi2 / (fit.ndf as f64) < 2.0);
    }

    #[test]
    fn smoothing_fit_recovers_surface() {
        let mut x = Vec::new();
        let mut z = Vec::new();
        for &xi in &[1.0, 5.0, 12.0, 30.0] {
            for &zi in &[28.0, 33.0, 40.0, 50.0] {
                x.push(xi);
                z.push(zi);
            }
        }
        let y: Vec<f64> =
            x.iter().zip(&z).map(|(&a, &b)| 1.0 + 0.1 * a + 0.01 * b + 0.002 * a * b).collect();
        let var = vec![1.0; x.len()];
        let fit = fit_weighted_2d(&x, &z, &y, &var, 1, &[1, 1]).unwrap();
        assert_eq!(fit.powers, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
        for (p, t) in fit.params.iter().zip([1.0, 0.01, 0.1, 0.002]) {
            assert_relative_eq!(*p, t, epsilon = 1e-8);
        }
        assert_relative_eq!(fit.eval_2d(2.0, 45.0), 1.0 + 0.2 + 0.45 + 0.18, epsilon = 1e-8);
        assert!(smoothing_powers(2, &[1, 1]).is_err());
    }

    #[test]
    fn band_error_matches_covariance_at_origin() {
        let fit = fit_weighted(&[0.0, 1.0, 2.0], &[1.0, 2.0, 2.5], &[0.1, 0.2, 0.3], 1).unwrap();
        let b = fit.band(&[0.0], 0.0);
        assert_relative_eq!(b.error[0], fit.param_error(0), epsilon = 1e-12);
    }

    #[test]
    fn grid_indexing_is_row_major() {
        let fits: Vec<PolyFit> = (0..6)
            .map(|i| PolyFit {
                params: vec![i as f64],
                cov: vec![vec![1.0]],
                chi2: i as f64,
                ndf: 3,
                powers: poly_powers(0),
            })
            .collect();
        let grid = ParamGrid::new(
            vec![Axis::regular("eta", 2, 0.0, 2.4), Axis::regular("pt", 3, 26.0, 56.0)],
            fits,
        )
        .unwrap();
        assert_eq!(grid.get(&[1, 0]).unwrap().params[0], 3.0);
        assert_eq!(grid.chi2_values().len(), 6);
        assert!(grid.get(&[2, 0]).is_err());
    }
}
