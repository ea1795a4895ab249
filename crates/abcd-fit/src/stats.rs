//! Chi-square density and robust averages for fit-quality plots.

use abcd_core::{Error, Result};
use statrs::distribution::{ChiSquared, Continuous};

/// Chi-square probability density with `ndf` degrees of freedom, sampled at `xs`.
pub fn chi2_pdf(xs: &[f64], ndf: usize) -> Result<Vec<f64>> {
    let dist = ChiSquared::new(ndf as f64)
        .map_err(|e| Error::Validation(format!("chi-square with ndf={ndf}: {e}")))?;
    Ok(xs.iter().map(|&x| dist.pdf(x)).collect())
}

/// Median; `NaN` for an empty slice.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut v = values.to_vec();
    v.sort_by(f64::total_cmp);
    let n = v.len();
    if n % 2 == 1 { v[n / 2] } else { 0.5 * (v[n / 2 - 1] + v[n / 2]) }
}

/// Arithmetic mean; `NaN` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    (values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64).sqrt()
}

/// Mean of the values within one standard deviation of the median.
///
/// Falls back to the plain mean when no value passes (e.g. all equal).
pub fn robust_mean(values: &[f64]) -> f64 {
    let med = median(values);
    let sd = std_dev(values);
    let kept: Vec<f64> = values.iter().copied().filter(|v| (v - med).abs() < sd).collect();
    if kept.is_empty() { mean(values) } else { mean(&kept) }
}

/// Default x-range `(0, 2 * robust_mean)` of a chi-square histogram.
pub fn chi2_xlim(values: &[f64]) -> (f64, f64) {
    let hi = 2.0 * robust_mean(values);
    if hi.is_finite() && hi > 0.0 { (0.0, hi) } else { (0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn pdf_of_two_dof_is_exponential() {
        let p = chi2_pdf(&[0.0, 2.0], 2).unwrap();
        assert_relative_eq!(p[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(p[1], 0.5 * (-1.0f64).exp(), epsilon = 1e-12);
        assert!(chi2_pdf(&[1.0], 0).is_err());
    }

    #[test]
    fn robust_mean_rejects_outliers() {
        let v = [1.0, 1.2, 0.8, 1.1, 0.9, 50.0];
        let m = robust_mean(&v);
        assert!(m < 1.2 && m > 0.8, "{m}");
        let (lo, hi) = chi2_xlim(&v);
        assert_eq!(lo, 0.0);
        assert_relative_eq!(hi, 2.0 * m);
    }

    #[test]
    fn constant_values_fall_back_to_mean() {
        assert_relative_eq!(robust_mean(&[3.0, 3.0, 3.0]), 3.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
    }
}
