//! Histogram axes.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Relative tolerance used when matching bin edges.
const EDGE_TOL: f64 = 1e-9;

fn default_flow() -> bool {
    true
}

/// Binning of a single axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AxisKind {
    /// Continuous axis with explicit, strictly increasing edges.
    Variable {
        /// Bin edges (length = n_bins + 1).
        edges: Vec<f64>,
        /// Whether underflow/overflow bins are stored.
        #[serde(default = "default_flow")]
        flow: bool,
    },
    /// Two bins: index 0 is `false`, index 1 is `true`.
    Boolean,
    /// String categories (e.g. systematic variations).
    Category {
        /// Category labels, one per bin.
        labels: Vec<String>,
    },
}

/// A named histogram axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    /// Axis name (e.g. `pt`, `eta`, `mt`).
    pub name: String,
    /// Binning.
    #[serde(flatten)]
    pub kind: AxisKind,
}

impl Axis {
    /// Continuous axis with flow bins.
    pub fn variable(name: impl Into<String>, edges: Vec<f64>) -> Self {
        Self { name: name.into(), kind: AxisKind::Variable { edges, flow: true } }
    }

    /// Continuous axis without flow bins.
    pub fn variable_noflow(name: impl Into<String>, edges: Vec<f64>) -> Self {
        Self { name: name.into(), kind: AxisKind::Variable { edges, flow: false } }
    }

    /// `n` uniform bins between `lo` and `hi`, with flow bins.
    pub fn regular(name: impl Into<String>, n: usize, lo: f64, hi: f64) -> Self {
        let step = (hi - lo) / n as f64;
        let edges = (0..=n).map(|i| lo + step * i as f64).collect();
        Self::variable(name, edges)
    }

    /// Boolean axis.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: AxisKind::Boolean }
    }

    /// Category axis.
    pub fn category(name: impl Into<String>, labels: Vec<String>) -> Self {
        Self { name: name.into(), kind: AxisKind::Category { labels } }
    }

    /// Check edges are strictly increasing and categories non-empty.
    pub fn validate(&self) -> Result<()> {
        match &self.kind {
            AxisKind::Variable { edges, .. } => {
                if edges.len() < 2 {
                    return Err(Error::Validation(format!(
                        "axis '{}' needs at least 2 edges, got {}",
                        self.name,
                        edges.len()
                    )));
                }
                if edges.windows(2).any(|w| !(w[1] > w[0])) {
                    return Err(Error::Validation(format!(
                        "axis '{}' edges must be strictly increasing",
                        self.name
                    )));
                }
            }
            AxisKind::Boolean => {}
            AxisKind::Category { labels } => {
                if labels.is_empty() {
                    return Err(Error::Validation(format!(
                        "category axis '{}' has no labels",
                        self.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Number of regular (non-flow) bins.
    pub fn n_bins(&self) -> usize {
        match &self.kind {
            AxisKind::Variable { edges, .. } => edges.len() - 1,
            AxisKind::Boolean => 2,
            AxisKind::Category { labels } => labels.len(),
        }
    }

    /// Whether underflow/overflow bins are stored.
    pub fn has_flow(&self) -> bool {
        matches!(self.kind, AxisKind::Variable { flow: true, .. })
    }

    /// Storage offset of the first regular bin (1 with flow, 0 without).
    pub fn offset(&self) -> usize {
        usize::from(self.has_flow())
    }

    /// Number of stored bins including flow.
    pub fn extent(&self) -> usize {
        self.n_bins() + 2 * self.offset()
    }

    /// Edges of a continuous axis; booleans and categories get unit-width
    /// pseudo-edges `0, 1, ..., n`.
    pub fn edges(&self) -> Vec<f64> {
        match &self.kind {
            AxisKind::Variable { edges, .. } => edges.clone(),
            _ => (0..=self.n_bins()).map(|i| i as f64).collect(),
        }
    }

    /// Bin centers of the regular bins.
    pub fn centers(&self) -> Vec<f64> {
        self.edges().windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
    }

    /// Bin widths of the regular bins.
    pub fn widths(&self) -> Vec<f64> {
        self.edges().windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// `(lo, hi)` edges of regular bin `i`.
    pub fn bin_bounds(&self, i: usize) -> (f64, f64) {
        let e = self.edges();
        (e[i], e[i + 1])
    }

    /// True for axes that can be located by coordinate.
    pub fn is_continuous(&self) -> bool {
        matches!(self.kind, AxisKind::Variable { .. })
    }

    /// Regular-bin index containing `value`.
    ///
    /// Returns `-1` below the first edge and `n_bins` at or above the last
    /// edge. A value on an edge belongs to the bin starting at that edge.
    pub fn locate(&self, value: f64) -> isize {
        let edges = self.edges();
        let n = edges.len() - 1;
        let scale = (edges[n] - edges[0]).abs().max(1.0);
        if value < edges[0] - EDGE_TOL * scale {
            return -1;
        }
        for i in 0..n {
            if value < edges[i + 1] - EDGE_TOL * scale {
                return i as isize;
            }
        }
        n as isize
    }

    /// Storage index for a located regular-bin index (may point at a flow bin).
    pub fn storage_index(&self, located: isize) -> Option<usize> {
        let n = self.n_bins() as isize;
        if (0..n).contains(&located) {
            return Some(located as usize + self.offset());
        }
        if !self.has_flow() {
            return None;
        }
        if located < 0 { Some(0) } else { Some(self.extent() - 1) }
    }

    /// Index of an existing edge matching `value`, if any.
    pub fn edge_index(&self, value: f64) -> Option<usize> {
        let edges = self.edges();
        let scale = (edges[edges.len() - 1] - edges[0]).abs().max(1.0);
        edges.iter().position(|&e| (e - value).abs() <= EDGE_TOL * scale)
    }

    /// Index of a category label.
    pub fn label_index(&self, label: &str) -> Option<usize> {
        match &self.kind {
            AxisKind::Category { labels } => labels.iter().position(|l| l == label),
            _ => None,
        }
    }

    /// Structural equality ignoring float noise on edges.
    pub fn same_binning(&self, other: &Axis) -> bool {
        if self.name != other.name {
            return false;
        }
        match (&self.kind, &other.kind) {
            (AxisKind::Variable { edges: a, flow: fa }, AxisKind::Variable { edges: b, flow: fb }) => {
                fa == fb
                    && a.len() == b.len()
                    && a.iter().zip(b).all(|(x, y)| (x - y).abs() <= EDGE_TOL * x.abs().max(1.0))
            }
            (AxisKind::Boolean, AxisKind::Boolean) => true,
            (AxisKind::Category { labels: a }, AxisKind::Category { labels: b }) => a == b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_on_edges() {
        let ax = Axis::variable("mt", vec![0.0, 20.0, 40.0, 60.0]);
        assert_eq!(ax.locate(-1.0), -1);
        assert_eq!(ax.locate(0.0), 0);
        assert_eq!(ax.locate(20.0), 1);
        assert_eq!(ax.locate(59.9), 2);
        assert_eq!(ax.locate(60.0), 3);
        assert_eq!(ax.locate(1e6), 3);
    }

    #[test]
    fn storage_with_and_without_flow() {
        let with = Axis::variable("x", vec![0.0, 1.0, 2.0]);
        assert_eq!(with.extent(), 4);
        assert_eq!(with.storage_index(-1), Some(0));
        assert_eq!(with.storage_index(0), Some(1));
        assert_eq!(with.storage_index(2), Some(3));

        let without = Axis::variable_noflow("x", vec![0.0, 1.0, 2.0]);
        assert_eq!(without.extent(), 2);
        assert_eq!(without.storage_index(-1), None);
        assert_eq!(without.storage_index(1), Some(1));
    }

    #[test]
    fn regular_edges_and_centers() {
        let ax = Axis::regular("eta", 4, -2.4, 2.4);
        assert_eq!(ax.n_bins(), 4);
        let c = ax.centers();
        assert!((c[0] + 1.8).abs() < 1e-12);
        assert!((c[3] - 1.8).abs() < 1e-12);
    }

    #[test]
    fn validate_rejects_unsorted_edges() {
        let ax = Axis::variable("pt", vec![0.0, 2.0, 1.0]);
        assert!(ax.validate().is_err());
    }
}
