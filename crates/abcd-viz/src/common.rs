//! Series types shared by several artifacts.

use abcd_core::{Error, Histogram, Result};
use abcd_fit::Band;
use serde::{Deserialize, Serialize};

/// Lower and upper edge of a band, aligned with some x grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandEnvelope {
    /// Lower edge.
    pub lo: Vec<f64>,
    /// Upper edge.
    pub hi: Vec<f64>,
}

impl BandEnvelope {
    /// `central -/+ error`.
    pub fn symmetric(central: &[f64], error: &[f64]) -> Self {
        let lo = central.iter().zip(error).map(|(c, e)| c - e).collect();
        let hi = central.iter().zip(error).map(|(c, e)| c + e).collect();
        Self { lo, hi }
    }

    /// Envelope of a fitted curve band.
    pub fn from_band(band: &Band) -> Self {
        Self { lo: band.lower(), hi: band.upper() }
    }
}

/// A binned series with symmetric errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinnedSeries {
    /// Legend label.
    pub label: String,
    /// Hex color; the renderer picks one from the palette when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Line style: `-`, `--` or `:`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linestyle: Option<String>,
    /// Bin contents.
    pub values: Vec<f64>,
    /// 1-sigma errors.
    pub errors: Vec<f64>,
}

/// Edges, values and errors of a one-dimensional histogram (flow dropped).
#[derive(Debug, Clone, PartialEq)]
pub struct Binned1D {
    /// Axis name.
    pub axis: String,
    /// Bin edges.
    pub edges: Vec<f64>,
    /// Bin contents.
    pub values: Vec<f64>,
    /// `sqrt(variance)` per bin.
    pub errors: Vec<f64>,
}

impl Binned1D {
    /// Read a one-dimensional histogram.
    pub fn from_hist(h: &Histogram) -> Result<Self> {
        let [axis] = h.axes() else {
            return Err(Error::Validation(format!(
                "expected a one-dimensional histogram, got axes {:?}",
                h.axis_names()
            )));
        };
        Ok(Self {
            axis: axis.name.clone(),
            edges: axis.edges(),
            values: h.values(false),
            errors: h.variances(false).iter().map(|v| v.max(0.0).sqrt()).collect(),
        })
    }

    /// Bin centers.
    pub fn centers(&self) -> Vec<f64> {
        self.edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
    }

    /// Half bin widths.
    pub fn half_widths(&self) -> Vec<f64> {
        self.edges.windows(2).map(|w| 0.5 * (w[1] - w[0])).collect()
    }

    /// As a labelled series.
    pub fn series(&self, label: impl Into<String>) -> BinnedSeries {
        BinnedSeries {
            label: label.into(),
            color: None,
            linestyle: None,
            values: self.values.clone(),
            errors: self.errors.clone(),
        }
    }
}

/// Smallest and largest finite value; `None` when there is none.
pub fn finite_range(values: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Round to `digits` decimals for labels.
pub fn round_to(v: f64, digits: i32) -> f64 {
    let f = 10f64.powi(digits);
    (v * f).round() / f
}
