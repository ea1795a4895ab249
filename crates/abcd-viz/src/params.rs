//! Maps and slices of fitted fake-rate parameters.

use abcd_core::{Error, Result};
use abcd_fit::ParamGrid;
use serde::{Deserialize, Serialize};

use crate::common::{BinnedSeries, round_to};

/// Conventional names of the polynomial coefficients.
pub const PARAM_NAMES: [&str; 3] = ["offset", "slope", "quad"];

/// Default z range of each coefficient map (none for the offset).
pub fn param_zlim(ip: usize) -> Option<[f64; 2]> {
    match ip {
        1 => Some([-0.02, 0.02]),
        2 => Some([-0.0004, 0.0004]),
        _ => None,
    }
}

/// Multi-index into `grid` with `free` axes set and the rest taken from `fixed`.
fn grid_bins(grid: &ParamGrid, free: &[(&str, usize)], fixed: &[(&str, usize)]) -> Result<Vec<usize>> {
    grid.axes
        .iter()
        .map(|ax| {
            free.iter()
                .chain(fixed)
                .find(|(n, _)| *n == ax.name)
                .map(|&(_, i)| i)
                .ok_or_else(|| {
                    Error::Validation(format!("no bin given for parameter axis '{}'", ax.name))
                })
        })
        .collect()
}

/// One coefficient (or its uncertainty) over two detector axes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamMapArtifact {
    /// Plot title, e.g. `slope+`.
    pub title: String,
    /// x axis title.
    pub x_label: String,
    /// y axis title.
    pub y_label: String,
    /// x bin edges.
    pub x_edges: Vec<f64>,
    /// y bin edges.
    pub y_edges: Vec<f64>,
    /// `values[iy][ix]`.
    pub values: Vec<Vec<f64>>,
    /// Color scale range; automatic when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zlim: Option<[f64; 2]>,
}

impl ParamMapArtifact {
    /// Coefficient `ip` over `(x_axis, y_axis)` with other grid axes fixed.
    ///
    /// With `uncertainty`, the map shows the parameter error instead.
    #[allow(clippy::too_many_arguments)]
    pub fn from_grid(
        grid: &ParamGrid,
        ip: usize,
        x_axis: &str,
        y_axis: &str,
        fixed: &[(&str, usize)],
        uncertainty: bool,
        title: impl Into<String>,
        labels: (&str, &str),
    ) -> Result<Self> {
        if ip >= grid.n_params() {
            return Err(Error::Validation(format!(
                "parameter {ip} requested, fits have {}",
                grid.n_params()
            )));
        }
        let ax = &grid.axes[grid.axis_index(x_axis)?];
        let ay = &grid.axes[grid.axis_index(y_axis)?];
        let mut values = Vec::with_capacity(ay.n_bins());
        for iy in 0..ay.n_bins() {
            let mut row = Vec::with_capacity(ax.n_bins());
            for ix in 0..ax.n_bins() {
                let bins = grid_bins(grid, &[(x_axis, ix), (y_axis, iy)], fixed)?;
                let fit = grid.get(&bins)?;
                row.push(if uncertainty { fit.param_error(ip) } else { fit.params[ip] });
            }
            values.push(row);
        }
        Ok(Self {
            title: title.into(),
            x_label: labels.0.to_string(),
            y_label: labels.1.to_string(),
            x_edges: ax.edges(),
            y_edges: ay.edges(),
            values,
            zlim: None,
        })
    }

    /// Fix the color scale.
    pub fn with_zlim(mut self, zlim: Option<[f64; 2]>) -> Self {
        self.zlim = zlim;
        self
    }
}

/// One coefficient along a detector axis in a fixed bin of the others.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamScanArtifact {
    /// Coefficient name (y axis title).
    pub param: String,
    /// x axis title.
    pub x_label: String,
    /// Legend entry of the points, e.g. `0.0 < |η| < 0.4` or `Inclusive`.
    pub bin_label: String,
    /// Bin edges along x.
    pub edges: Vec<f64>,
    /// Coefficient values and errors per bin.
    pub series: BinnedSeries,
    /// Reference line (usually 0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<f64>,
    /// Same coefficient from fits with the fixed axis integrated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average: Option<BinnedSeries>,
}

impl ParamScanArtifact {
    /// Coefficient `ip` along `along`, other grid axes taken from `fixed`.
    pub fn from_grid(
        grid: &ParamGrid,
        ip: usize,
        along: &str,
        fixed: &[(&str, usize)],
        param: impl Into<String>,
        x_label: impl Into<String>,
        bin_label: impl Into<String>,
    ) -> Result<Self> {
        let ax = &grid.axes[grid.axis_index(along)?];
        let mut values = Vec::with_capacity(ax.n_bins());
        let mut errors = Vec::with_capacity(ax.n_bins());
        for i in 0..ax.n_bins() {
            let fit = grid.get(&grid_bins(grid, &[(along, i)], fixed)?)?;
            let p = fit.params.get(ip).copied().ok_or_else(|| {
                Error::Validation(format!("parameter {ip} requested, fits have {}", fit.n_params()))
            })?;
            values.push(p);
            errors.push(fit.param_error(ip));
        }
        Ok(Self {
            param: param.into(),
            x_label: x_label.into(),
            bin_label: bin_label.into(),
            edges: ax.edges(),
            series: BinnedSeries { label: String::new(), color: None, linestyle: None, values, errors },
            line: Some(0.0),
            average: None,
        })
    }

    /// Overlay the coefficient from `grid`, read along the same axis.
    ///
    /// `fixed` entries for axes `grid` does not have are ignored.
    pub fn with_average(
        mut self,
        grid: &ParamGrid,
        ip: usize,
        along: &str,
        fixed: &[(&str, usize)],
        label: impl Into<String>,
    ) -> Result<Self> {
        let present: Vec<(&str, usize)> =
            fixed.iter().copied().filter(|(n, _)| grid.axis_index(n).is_ok()).collect();
        let avg = Self::from_grid(grid, ip, along, &present, "", "", "")?;
        if avg.edges.len() != self.edges.len() {
            return Err(Error::Validation(format!(
                "average has {} bins along '{along}', scan has {}",
                avg.edges.len() - 1,
                self.edges.len() - 1
            )));
        }
        let mut series = avg.series;
        series.label = label.into();
        series.color = Some("#0000FF".into());
        self.average = Some(series);
        Ok(self)
    }
}

/// `lo < var < hi` with one decimal, as used in legends.
pub fn range_label(var: &str, lo: f64, hi: f64) -> String {
    format!("{} < {var} < {}", round_to(lo, 1), round_to(hi, 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use abcd_core::Axis;
    use abcd_fit::PolyFit;
    use approx::assert_relative_eq;

    fn grid() -> ParamGrid {
        let axes = vec![
            Axis::variable("eta", vec![0.0, 1.0, 2.4]),
            Axis::variable("pt", vec![26.0, 30.0, 40.0, 56.0]),
            Axis::variable("charge", vec![-2.0, 0.0, 2.0]),
        ];
        let fits = (0..12)
            .map(|i| PolyFit {
                params: vec![i as f64, 0.1 * i as f64],
                cov: vec![vec![0.04, 0.0], vec![0.0, 0.01]],
                chi2: 1.0,
                ndf: 3,
                powers: vec![(0, 0), (1, 0)],
            })
            .collect();
        ParamGrid::new(axes, fits).unwrap()
    }

    #[test]
    fn map_indexes_eta_pt_at_fixed_charge() {
        let g = grid();
        let m = ParamMapArtifact::from_grid(&g, 0, "eta", "pt", &[("charge", 1)], false, "offset+", ("|η|", "pT"))
            .unwrap();
        assert_eq!(m.values.len(), 3);
        assert_eq!(m.values[0].len(), 2);
        // flat index = (ieta * 3 + ipt) * 2 + icharge
        assert_eq!(m.values[2][1], ((3 + 2) * 2 + 1) as f64);
        let u = ParamMapArtifact::from_grid(&g, 1, "eta", "pt", &[("charge", 0)], true, "Δ slope", ("", ""))
            .unwrap();
        assert_relative_eq!(u.values[0][0], 0.1, epsilon = 1e-12);
        assert!(ParamMapArtifact::from_grid(&g, 0, "eta", "pt", &[], false, "", ("", "")).is_err());
    }

    #[test]
    fn scan_and_average() {
        let g = grid();
        let s = ParamScanArtifact::from_grid(&g, 0, "pt", &[("eta", 1), ("charge", 0)], "offset", "pT", "1 < |η| < 2.4")
            .unwrap();
        assert_eq!(s.series.values, vec![6.0, 8.0, 10.0]);
        for e in &s.series.errors {
            assert_relative_eq!(*e, 0.2, epsilon = 1e-12);
        }

        let avg = ParamGrid::new(
            vec![Axis::variable("pt", vec![26.0, 30.0, 40.0, 56.0]), Axis::variable("charge", vec![-2.0, 0.0, 2.0])],
            g.fits[..6].to_vec(),
        )
        .unwrap();
        let s = s.with_average(&avg, 0, "pt", &[("eta", 1), ("charge", 0)], "|η| integrated").unwrap();
        assert_eq!(s.average.unwrap().values, vec![0.0, 2.0, 4.0]);
    }

    #[test]
    fn labels() {
        assert_eq!(range_label("|η|", 0.0, 0.4), "0 < |η| < 0.4");
        assert_eq!(param_zlim(1), Some([-0.02, 0.02]));
    }
}
