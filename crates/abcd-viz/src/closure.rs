//! Closure comparison between ABCD variants.

use abcd_core::{Error, Histogram, Result};
use serde::{Deserialize, Serialize};

use crate::common::{Binned1D, BinnedSeries, finite_range};

const LINESTYLES: [&str; 3] = ["-", "-", "--"];

/// One prediction entering the comparison.
#[derive(Debug, Clone)]
pub struct ClosureInput {
    /// Legend label.
    pub label: String,
    /// Hex color.
    pub color: String,
    /// Prediction, any rank.
    pub hist: Histogram,
}

/// Predictions overlaid as step lines with their ratio to the first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosureArtifact {
    /// Process title.
    pub title: String,
    /// x axis title.
    pub x_label: String,
    /// y axis title.
    pub y_label: String,
    /// Ratio axis title.
    pub rlabel: String,
    /// Ratio range.
    pub rrange: [f64; 2],
    /// y range.
    pub ylim: [f64; 2],
    /// Bin edges (bin numbers for unrolled inputs).
    pub edges: Vec<f64>,
    /// Predictions.
    pub series: Vec<BinnedSeries>,
    /// Ratio of every prediction to the first.
    pub ratios: Vec<BinnedSeries>,
}

/// Reduce a prediction to one axis.
///
/// A single-bin `charge` axis is summed away; what remains is unrolled
/// with the last axis running slowest.
pub fn flatten(h: &Histogram) -> Result<Histogram> {
    let h = match h.axis("charge") {
        Ok(ax) if ax.n_bins() == 1 => h.sum_axis("charge")?,
        _ => h.clone(),
    };
    if h.rank() <= 1 {
        return Ok(h);
    }
    let names: Vec<String> = h.axis_names().iter().rev().map(|s| s.to_string()).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    h.unrolled(&names, None)
}

impl ClosureArtifact {
    /// Compare `inputs`; the first one is the reference.
    pub fn build(
        title: impl Into<String>,
        x_label: impl Into<String>,
        rrange: [f64; 2],
        inputs: &[ClosureInput],
    ) -> Result<Self> {
        let Some(first) = inputs.first() else {
            return Err(Error::Validation("closure comparison needs at least one prediction".into()));
        };
        let reference = flatten(&first.hist)?;
        let edges = Binned1D::from_hist(&reference)?.edges;
        let mut series = Vec::with_capacity(inputs.len());
        let mut ratios = Vec::with_capacity(inputs.len());
        for (i, input) in inputs.iter().enumerate() {
            let h = flatten(&input.hist)?;
            let b = Binned1D::from_hist(&h)?;
            if b.edges.len() != edges.len() {
                return Err(Error::Validation(format!(
                    "closure input '{}' has {} bins, reference has {}",
                    input.label,
                    b.values.len(),
                    edges.len() - 1
                )));
            }
            let linestyle = Some(LINESTYLES[i % LINESTYLES.len()].to_string());
            let r = Binned1D::from_hist(&h.divide(&reference)?)?;
            ratios.push(BinnedSeries {
                color: Some(input.color.clone()),
                linestyle: linestyle.clone(),
                ..r.series(input.label.clone())
            });
            series.push(BinnedSeries {
                color: Some(input.color.clone()),
                linestyle,
                ..b.series(input.label.clone())
            });
        }
        let ymax = finite_range(series.iter().flat_map(|s| s.values.iter().copied()))
            .map(|(_, hi)| hi)
            .filter(|hi| *hi > 0.0)
            .unwrap_or(1.0);
        tracing::debug!(inputs = inputs.len(), bins = edges.len() - 1, "closure comparison");
        Ok(Self {
            title: title.into(),
            x_label: x_label.into(),
            y_label: "Events/bin".to_string(),
            rlabel: format!("1/{}", first.label),
            rrange,
            ylim: [0.0, ymax * 1.3],
            edges,
            series,
            ratios,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abcd_core::Axis;
    use approx::assert_relative_eq;

    fn pred(scale: f64) -> Histogram {
        let mut h = Histogram::new(vec![
            Axis::variable("eta", vec![0.0, 1.2, 2.4]),
            Axis::variable("pt", vec![26.0, 40.0, 56.0]),
            Axis::variable("charge", vec![-2.0, 2.0]),
        ])
        .unwrap();
        for (i, (eta, pt)) in [(0.5, 30.0), (0.5, 50.0), (1.5, 30.0), (1.5, 50.0)].iter().enumerate() {
            h.fill(&[*eta, *pt, 1.0], scale * (i + 1) as f64).unwrap();
        }
        h
    }

    #[test]
    fn flatten_sums_charge_and_unrolls() {
        let f = flatten(&pred(1.0)).unwrap();
        assert_eq!(f.rank(), 1);
        assert_eq!(f.values(false).len(), 4);
        assert_relative_eq!(f.total(false).0, 10.0);
    }

    #[test]
    fn ratios_are_relative_to_first() {
        let inputs = vec![
            ClosureInput { label: "D".into(), color: "#000000".into(), hist: pred(1.0) },
            ClosureInput { label: "simple".into(), color: "#FF0000".into(), hist: pred(2.0) },
            ClosureInput { label: "extended".into(), color: "#0000FF".into(), hist: pred(0.5) },
        ];
        let a = ClosureArtifact::build("QCD", "(pT, η) bin", [0.25, 1.75], &inputs).unwrap();
        assert_eq!(a.rlabel, "1/D");
        assert_eq!(a.series.len(), 3);
        for v in &a.ratios[1].values {
            assert_relative_eq!(*v, 2.0, epsilon = 1e-12);
        }
        assert_eq!(a.series[2].linestyle.as_deref(), Some("--"));
        assert_relative_eq!(a.ylim[1], 8.0 * 1.3, epsilon = 1e-9);
    }

    #[test]
    fn no_inputs_is_an_error() {
        assert!(ClosureArtifact::build("", "", [0.0, 2.0], &[]).is_err());
    }
}
