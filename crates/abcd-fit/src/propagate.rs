//! Linear error propagation of fitted parameters.

use serde::{Deserialize, Serialize};

use crate::curve::CurveModel;

/// A fitted curve sampled on a grid with its 1-sigma band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Band {
    /// Sample points.
    pub x: Vec<f64>,
    /// Curve values.
    pub central: Vec<f64>,
    /// 1-sigma uncertainties.
    pub error: Vec<f64>,
}

impl Band {
    /// `central - error`, pointwise.
    pub fn lower(&self) -> Vec<f64> {
        self.central.iter().zip(&self.error).map(|(c, e)| c - e).collect()
    }

    /// `central + error`, pointwise.
    pub fn upper(&self) -> Vec<f64> {
        self.central.iter().zip(&self.error).map(|(c, e)| c + e).collect()
    }
}

/// `sqrt(g^T C g)` for a gradient `g` and covariance `C`.
pub fn linear_error(grad: &[f64], cov: &[Vec<f64>]) -> f64 {
    let mut var = 0.0;
    for (i, gi) in grad.iter().enumerate() {
        for (j, gj) in grad.iter().enumerate() {
            var += gi * cov[i][j] * gj;
        }
    }
    var.max(0.0).sqrt()
}

/// Sample `model` along `xs` and propagate `cov` (`var = J C J^T`).
pub fn band<M: CurveModel + ?Sized>(model: &M, params: &[f64], cov: &[Vec<f64>], xs: &[f64]) -> Band {
    let (central, error) = xs
        .iter()
        .map(|&x| (model.eval(x, params), linear_error(&model.gradient(x, params), cov)))
        .unzip();
    Band { x: xs.to_vec(), central, error }
}

/// `n` evenly spaced points from `lo` to `hi` inclusive.
pub fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![lo],
        _ => {
            let step = (hi - lo) / (n - 1) as f64;
            (0..n).map(|i| lo + step * i as f64).collect()
        }
    }
}

/// Points `lo, lo + step, ...` strictly below `hi`.
pub fn arange(lo: f64, hi: f64, step: f64) -> Vec<f64> {
    if !(step > 0.0) || !(hi > lo) {
        return Vec::new();
    }
    let n = ((hi - lo) / step).ceil() as usize;
    (0..n).map(|i| lo + step * i as f64).filter(|&v| v < hi).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::ExpFall;
    use approx::assert_relative_eq;

    #[test]
    fn band_of_constant_term_is_its_error() {
        // only c is uncertain: the band is flat at sigma_c
        let cov = vec![vec![0.0; 3], vec![0.0; 3], vec![0.0, 0.0, 4.0]];
        let b = band(&ExpFall, &[10.0, 0.1, 1.0], &cov, &[0.0, 5.0, 50.0]);
        for e in &b.error {
            assert_relative_eq!(*e, 2.0);
        }
        assert_relative_eq!(b.central[0], 11.0);
        assert_relative_eq!(b.upper()[0] - b.lower()[0], 4.0);
    }

    #[test]
    fn correlations_enter_the_error() {
        let anti = vec![vec![1.0, -1.0], vec![-1.0, 1.0]];
        assert_relative_eq!(linear_error(&[1.0, 1.0], &anti), 0.0);
        let full = vec![vec![1.0, 1.0], vec![1.0, 1.0]];
        assert_relative_eq!(linear_error(&[1.0, 1.0], &full), 2.0);
    }

    #[test]
    fn grids() {
        assert_eq!(linspace(0.0, 1.0, 3), vec![0.0, 0.5, 1.0]);
        assert_eq!(arange(0.0, 0.35, 0.1).len(), 4);
        assert!(arange(1.0, 0.0, 0.1).is_empty());
    }
}
