//! Exponential fits to the pT spectrum of a sideband region.

use abcd_core::{Histogram, Result};
use abcd_fit::{CurveModel, ExpFall, FitOptions, curve, propagate};
use serde::{Deserialize, Serialize};

use crate::common::{BandEnvelope, Binned1D, finite_range};

/// Fitted curve with its propagated uncertainty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidebandCurve {
    /// Legend entry with the functional form.
    pub label: String,
    /// Fit parameters `[a, b, c]`.
    pub params: Vec<f64>,
    /// Chi-square and degrees of freedom.
    pub chi2: f64,
    /// Degrees of freedom.
    pub ndf: usize,
    /// Points the curve is drawn at.
    pub x: Vec<f64>,
    /// Curve values.
    pub y: Vec<f64>,
    /// 1-sigma envelope.
    pub band: BandEnvelope,
}

/// Yields of one region along pT, with an optional fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidebandFitArtifact {
    /// Region name.
    pub region: String,
    /// Legend title naming the charge and eta bin.
    pub bin_label: String,
    /// x axis title.
    pub x_label: String,
    /// y axis title.
    pub y_label: String,
    /// Bin edges.
    pub edges: Vec<f64>,
    /// Yields.
    pub values: Vec<f64>,
    /// Yield errors.
    pub errors: Vec<f64>,
    /// Plotted x range.
    pub xlim: [f64; 2],
    /// Plotted y range.
    pub ylim: [f64; 2],
    /// Fit, absent when too few bins are populated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit: Option<SidebandCurve>,
}

/// Legend entry of the falling exponential.
pub const EXPFALL_LABEL: &str = "f(x): a\u{00B7}e\u{207B}\u{1D47}\u{02E3} + c";

const BAND_STEP: f64 = 0.1;

impl SidebandFitArtifact {
    /// Fit `a·exp(-b x) + c` to a one-dimensional region histogram.
    ///
    /// Bins with zero error do not enter the fit. A fit that does not
    /// converge is an error.
    pub fn fit(
        h: &Histogram,
        region: impl Into<String>,
        bin_label: impl Into<String>,
        x_label: impl Into<String>,
    ) -> Result<Self> {
        let region = region.into();
        let b = Binned1D::from_hist(h)?;
        let x = b.centers();
        let xlim = [b.edges[0], b.edges[b.edges.len() - 1]];

        let model = ExpFall;
        let used = b.errors.iter().filter(|e| **e > 0.0 && e.is_finite()).count();
        let fit = if used > model.n_params() {
            let p0 = ExpFall::initial_guess(&b.values);
            let res = curve::fit(&model, &x, &b.values, &b.errors, &p0, &FitOptions::default())?;
            let xs = propagate::arange(xlim[0], xlim[1], BAND_STEP);
            let band = propagate::band(&model, &res.params, &res.cov, &xs);
            tracing::debug!(region = %region, params = ?res.params, chi2 = res.chi2, ndf = res.ndf, "sideband fit");
            Some(SidebandCurve {
                label: EXPFALL_LABEL.to_string(),
                params: res.params,
                chi2: res.chi2,
                ndf: res.ndf,
                x: band.x.clone(),
                y: band.central.clone(),
                band: BandEnvelope::from_band(&band),
            })
        } else {
            tracing::warn!(region = %region, bins = used, "too few populated bins, skipping sideband fit");
            None
        };

        let hi = finite_range(b.values.iter().zip(&b.errors).map(|(v, e)| v + e))
            .map(|(_, hi)| hi)
            .unwrap_or(1.0);
        Ok(Self {
            region,
            bin_label: bin_label.into(),
            x_label: x_label.into(),
            y_label: "Events/bin".to_string(),
            edges: b.edges,
            values: b.values,
            errors: b.errors,
            xlim,
            ylim: [0.0, if hi > 0.0 { hi * 1.1 } else { 1.0 }],
            fit,
        })
    }
}

/// Legend title of one (charge, eta) bin.
pub fn charge_eta_label(charge: f64, eta: (f64, f64)) -> String {
    let sign = if charge < 0.0 { "-" } else { "+" };
    format!("charge {sign}, {:.1} < |\u{03B7}| < {:.1}", eta.0, eta.1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use abcd_core::Axis;
    use approx::assert_relative_eq;

    #[test]
    fn recovers_falling_spectrum() {
        let edges: Vec<f64> = (0..=15).map(|i| 26.0 + 2.0 * i as f64).collect();
        let mut h = Histogram::new(vec![Axis::variable("pt", edges.clone())]).unwrap();
        for i in 0..15 {
            let x = 27.0 + 2.0 * i as f64;
            let y = 5000.0 * (-0.1 * x).exp() + 20.0;
            h.set_bin(&[i], y, y).unwrap();
        }
        let a = SidebandFitArtifact::fit(&h, "A", charge_eta_label(-1.0, (0.0, 2.4)), "pT").unwrap();
        let fit = a.fit.unwrap();
        assert_relative_eq!(fit.params[1], 0.1, epsilon = 1e-3);
        assert_relative_eq!(fit.params[2], 20.0, epsilon = 0.5);
        assert_eq!(fit.x.len(), fit.band.lo.len());
        assert!(fit.band.lo.iter().zip(&fit.band.hi).all(|(l, h)| l <= h));
        assert_eq!(a.xlim, [26.0, 56.0]);
        assert_eq!(a.bin_label, "charge -, 0.0 < |η| < 2.4");
    }

    #[test]
    fn empty_region_has_no_fit() {
        let h = Histogram::new(vec![Axis::variable("pt", vec![26.0, 30.0, 40.0])]).unwrap();
        let a = SidebandFitArtifact::fit(&h, "Ax", "", "pT").unwrap();
        assert!(a.fit.is_none());
        assert_eq!(a.ylim, [0.0, 1.0]);
    }
}
