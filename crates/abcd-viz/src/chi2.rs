//! Distribution of fit chi-square values against the expected density.

use abcd_core::{Error, Result};
use abcd_fit::propagate::linspace;
use abcd_fit::stats;
use serde::{Deserialize, Serialize};

/// Histogram bins of the chi-square distribution.
pub const CHI2_BINS: usize = 50;
/// Sampling points of the reference density.
pub const PDF_POINTS: usize = 1000;

/// Normalised chi-square histogram with the chi-square density overlaid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chi2Artifact {
    /// Process the fits belong to.
    pub title: String,
    /// Degrees of freedom of each fit.
    pub ndf: usize,
    /// Number of fits.
    pub n_fits: usize,
    /// Plotted range; values outside are clamped to its ends.
    pub xlim: [f64; 2],
    /// Histogram edges (`CHI2_BINS + 1`).
    pub bin_edges: Vec<f64>,
    /// Unit-area density per bin.
    pub density: Vec<f64>,
    /// Reference density sample points; empty when `ndf` is zero.
    pub pdf_x: Vec<f64>,
    /// Chi-square density at `pdf_x`.
    pub pdf_y: Vec<f64>,
}

impl Chi2Artifact {
    /// Histogram `values` over `xlim` (default `(0, 2 * robust mean)`).
    pub fn from_values(
        title: impl Into<String>,
        values: &[f64],
        ndf: usize,
        xlim: Option<(f64, f64)>,
    ) -> Result<Self> {
        let title = title.into();
        let (lo, hi) = xlim.unwrap_or_else(|| stats::chi2_xlim(values));
        if !(hi > lo) {
            return Err(Error::Validation(format!("chi-square range ({lo}, {hi}) is empty")));
        }
        let width = (hi - lo) / CHI2_BINS as f64;
        let bin_edges = linspace(lo, hi, CHI2_BINS + 1);
        let mut counts = vec![0.0; CHI2_BINS];
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        for v in &finite {
            let clamped = v.clamp(lo, hi);
            let i = (((clamped - lo) / width) as usize).min(CHI2_BINS - 1);
            counts[i] += 1.0;
        }
        let norm = finite.len() as f64 * width;
        let density = counts.iter().map(|c| if norm > 0.0 { c / norm } else { 0.0 }).collect();

        let (pdf_x, pdf_y) = if ndf == 0 {
            tracing::warn!(title = %title, "fits have no degrees of freedom, no chi-square density drawn");
            (Vec::new(), Vec::new())
        } else {
            let xs = linspace(lo, hi, PDF_POINTS);
            let ys = stats::chi2_pdf(&xs, ndf)?;
            (xs, ys)
        };
        tracing::debug!(n = finite.len(), ndf, lo, hi, "chi-square artifact");
        Ok(Self {
            title,
            ndf,
            n_fits: finite.len(),
            xlim: [lo, hi],
            bin_edges,
            density,
            pdf_x,
            pdf_y,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn density_has_unit_area_and_clamps() {
        let values = [0.5, 1.0, 1.5, 2.0, 50.0, -1.0];
        let a = Chi2Artifact::from_values("QCD", &values, 2, Some((0.0, 10.0))).unwrap();
        let width = a.bin_edges[1] - a.bin_edges[0];
        let area: f64 = a.density.iter().map(|d| d * width).sum();
        assert_relative_eq!(area, 1.0, epsilon = 1e-12);
        // overflow lands in the last bin, underflow in the first
        assert!(a.density[CHI2_BINS - 1] > 0.0);
        assert!(a.density[0] > 0.0);
        assert_eq!(a.pdf_x.len(), PDF_POINTS);
    }

    #[test]
    fn default_range() {
        let a = Chi2Artifact::from_values("Fake", &[1.0, 2.0, 3.0], 3, None).unwrap();
        assert_eq!(a.xlim[0], 0.0);
        assert_relative_eq!(a.xlim[1], 4.0);
        assert!(Chi2Artifact::from_values("Fake", &[1.0], 2, Some((1.0, 1.0))).is_err());
    }

    #[test]
    fn zero_ndf_keeps_histogram_without_density() {
        let a = Chi2Artifact::from_values("QCD", &[0.0, 1e-12], 0, Some((0.0, 5.0))).unwrap();
        assert_eq!(a.n_fits, 2);
        assert!(a.pdf_x.is_empty() && a.pdf_y.is_empty());
        assert!(a.density[0] > 0.0);
    }
}
