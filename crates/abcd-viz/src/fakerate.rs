//! Fake-rate factor versus the ABCD x axis with the fitted parameterisation.

use abcd_core::{Histogram, Result};
use abcd_fit::propagate::linspace;
use abcd_fit::{Band, PolyFit};
use serde::{Deserialize, Serialize};

use crate::common::{Binned1D, BinnedSeries, finite_range, round_to};

/// Scale of the x variable in printed coefficients.
pub const COEFF_SCALE: f64 = 50.0;
/// Ratios above this never drive the y range.
pub const YMAX_CAP: f64 = 5.0;
/// Points along the fitted curve.
pub const CURVE_POINTS: usize = 1000;

/// One fitted parameterisation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitCurve {
    /// Process label.
    pub label: String,
    /// Hex color.
    pub color: String,
    /// Human-readable form of the fitted function.
    pub formula: String,
    /// Scaled coefficients, one line each (smoothing fits only).
    pub coefficients: Vec<String>,
    /// Curve with its 1-sigma band.
    pub band: Band,
}

/// Fake-rate factor in one (charge, eta, pt) bin for one or more processes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FakerateCurveArtifact {
    /// Process title, e.g. `QCD⁺ → μ⁺ν`.
    pub title: String,
    /// Bin description, e.g. `26 < pT < 30 ; 0.0 < |η| < 0.4`.
    pub region: String,
    /// x axis title.
    pub x_label: String,
    /// y axis title.
    pub y_label: String,
    /// Upper edge of the fitted sideband.
    pub threshold: f64,
    /// x range.
    pub xlim: [f64; 2],
    /// y range.
    pub ylim: [f64; 2],
    /// Pass/fail ratio per process, binned in x.
    pub bin_edges: Vec<f64>,
    /// Measured ratios aligned with `curves`.
    pub points: Vec<BinnedSeries>,
    /// Fitted curves.
    pub curves: Vec<FitCurve>,
}

/// Inputs for one process.
#[derive(Debug, Clone)]
pub struct CurveInput<'a> {
    /// Legend label.
    pub label: &'a str,
    /// Hex color.
    pub color: &'a str,
    /// Pass/fail ratio along x, one axis.
    pub ratio: &'a Histogram,
    /// Fit in this bin.
    pub fit: &'a PolyFit,
    /// Smoothing coordinate at which to evaluate a two-dimensional fit.
    pub z: Option<f64>,
}

impl FakerateCurveArtifact {
    /// Assemble the artifact; all ratios must share their x binning.
    pub fn build(
        title: impl Into<String>,
        region: impl Into<String>,
        x_label: impl Into<String>,
        var: &str,
        threshold: f64,
        inputs: &[CurveInput<'_>],
    ) -> Result<Self> {
        let mut points = Vec::with_capacity(inputs.len());
        let mut curves = Vec::with_capacity(inputs.len());
        let mut bin_edges = Vec::new();
        for input in inputs {
            let binned = Binned1D::from_hist(input.ratio)?;
            let (lo, hi) = (binned.edges[0], binned.edges[binned.edges.len() - 1]);
            let xs = linspace(lo, hi, CURVE_POINTS);
            let band = input.fit.band(&xs, input.z.unwrap_or(0.0));
            let mut series = binned.series(input.label);
            series.color = Some(input.color.to_string());
            points.push(series);
            let (formula, coefficients) = describe(input.fit, var);
            curves.push(FitCurve {
                label: input.label.to_string(),
                color: input.color.to_string(),
                formula,
                coefficients,
                band,
            });
            bin_edges = binned.edges;
        }

        let fit_range = finite_range(curves.iter().flat_map(|c| c.band.lower().into_iter().chain(c.band.upper())));
        let point_range = finite_range(points.iter().flat_map(|p| {
            p.values.iter().zip(&p.errors).flat_map(|(v, e)| [v - e, v + e]).collect::<Vec<_>>()
        }));
        let (ymin, ymax) = match (fit_range, point_range) {
            (Some(a), Some(b)) => (a.0.min(b.0), a.1.max(b.1)),
            (Some(r), None) | (None, Some(r)) => r,
            (None, None) => (0.0, 1.0),
        };
        let ymin = ymin.max(0.0);
        let ymax = ymax.min(YMAX_CAP);
        let ymax = ymax + 0.2 * (ymax - ymin);
        let xlim = match (bin_edges.first(), bin_edges.last()) {
            (Some(&a), Some(&b)) => [a, b],
            _ => [0.0, 1.0],
        };

        Ok(Self {
            title: title.into(),
            region: region.into(),
            x_label: x_label.into(),
            y_label: "FRF".into(),
            threshold,
            xlim,
            ylim: [ymin, ymax],
            bin_edges,
            points,
            curves,
        })
    }
}

/// Formula text and per-coefficient lines of a fit.
///
/// Coefficients are quoted for the variable scaled by [`COEFF_SCALE`].
pub fn describe(fit: &PolyFit, var: &str) -> (String, Vec<String>) {
    let two_d = fit.powers.iter().any(|&(_, pz)| pz > 0);
    if !two_d {
        let mut terms: Vec<String> = Vec::new();
        for (i, &(px, _)) in fit.powers.iter().enumerate().rev() {
            let c = fit.params[i] * COEFF_SCALE.powi(px as i32);
            let mag = round_to(c.abs(), 2);
            let sign = if c < 0.0 { "-" } else { "+" };
            let term = match px {
                0 => format!("{mag}"),
                1 => format!("{mag}\u{00B7}({var}/{COEFF_SCALE})"),
                _ => format!("{mag}\u{00B7}({var}/{COEFF_SCALE})^{px}"),
            };
            if terms.is_empty() {
                terms.push(if c < 0.0 { format!("-{term}") } else { term });
            } else {
                terms.push(format!("{sign} {term}"));
            }
        }
        return (format!("f({var}) = {}", terms.join(" ")), Vec::new());
    }

    const NAMES: [char; 5] = ['a', 'b', 'c', 'd', 'e'];
    let max_x = fit.powers.iter().map(|&(px, _)| px).max().unwrap_or(0);
    let mut formula = format!("f({var}, z) = a(z)");
    for px in 1..=max_x {
        let name = NAMES.get(px as usize).copied().unwrap_or('?');
        formula.push_str(&format!(" + {name}(z)\u{00B7}{var}"));
        if px > 1 {
            formula.push_str(&format!("^{px}"));
        }
    }
    let lines = fit
        .powers
        .iter()
        .enumerate()
        .map(|(i, &(px, pz))| {
            let factor = COEFF_SCALE.powi((px + pz) as i32);
            let name = NAMES.get(px as usize).copied().unwrap_or('?');
            format!(
                "{name}_{pz} = {} \u{00B1} {}",
                round_to(fit.params[i] * factor, 2),
                round_to(fit.param_error(i) * factor, 2)
            )
        })
        .collect();
    (formula, lines)
}
