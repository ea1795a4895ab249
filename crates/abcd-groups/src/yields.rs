//! Yield tables written to the plot logs.

use std::fmt;

use abcd_core::{Histogram, Result};
use serde::{Deserialize, Serialize};

use crate::datagroups::Group;

/// One row of a yield table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldRow {
    /// Process name.
    pub process: String,
    /// Sum of weights, including flow bins.
    #[serde(rename = "yield")]
    pub value: f64,
    /// Statistical uncertainty.
    pub uncertainty: f64,
    /// Yield relative to the normalising process (usually data).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraction: Option<f64>,
}

impl YieldRow {
    /// Row from the total of a histogram.
    pub fn from_hist(process: impl Into<String>, h: &Histogram) -> Self {
        let (value, var) = h.total(true);
        Self { process: process.into(), value, uncertainty: var.max(0.0).sqrt(), fraction: None }
    }
}

/// A titled list of yields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YieldTable {
    /// Table title, e.g. `Stacked processes`.
    pub title: String,
    /// Rows in display order.
    pub rows: Vec<YieldRow>,
}

impl YieldTable {
    /// Empty table.
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), rows: Vec::new() }
    }

    /// One row per group holding `hist_name`; groups without it are skipped.
    pub fn from_groups<'a>(
        title: impl Into<String>,
        groups: impl IntoIterator<Item = &'a Group>,
        hist_name: &str,
    ) -> Self {
        let rows = groups
            .into_iter()
            .filter_map(|g| g.hists.get(hist_name).map(|h| YieldRow::from_hist(&g.name, h)))
            .collect();
        Self { title: title.into(), rows }
    }

    /// Append a row.
    pub fn push(&mut self, row: YieldRow) {
        self.rows.push(row);
    }

    /// Append the sum of all rows, uncertainties added in quadrature.
    pub fn with_total(mut self, name: &str) -> Self {
        let value = self.rows.iter().map(|r| r.value).sum();
        let uncertainty = self.rows.iter().map(|r| r.uncertainty * r.uncertainty).sum::<f64>().sqrt();
        self.rows.push(YieldRow { process: name.to_string(), value, uncertainty, fraction: None });
        self
    }

    /// Fill `fraction` relative to `norm`; a vanishing norm leaves it unset.
    pub fn with_fractions(mut self, norm: f64) -> Self {
        if norm != 0.0 && norm.is_finite() {
            for r in &mut self.rows {
                r.fraction = Some(r.value / norm);
            }
        }
        self
    }

    /// Row by process name.
    pub fn row(&self, process: &str) -> Option<&YieldRow> {
        self.rows.iter().find(|r| r.process == process)
    }

    /// Rows as JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for YieldTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.rows.iter().map(|r| r.process.chars().count()).max().unwrap_or(0).max(7);
        writeln!(f, "{}", self.title)?;
        writeln!(f, "{:<width$}  {:>14}  {:>14}  {:>9}", "Process", "Yield", "Uncertainty", "Fraction")?;
        for r in &self.rows {
            let frac = r.fraction.map(|v| format!("{v:.4}")).unwrap_or_else(|| "-".into());
            writeln!(
                f,
                "{:<width$}  {:>14.3}  {:>14.3}  {:>9}",
                r.process, r.value, r.uncertainty, frac
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abcd_core::Axis;
    use approx::assert_relative_eq;

    fn h(w: f64) -> Histogram {
        let mut h = Histogram::new(vec![Axis::variable("pt", vec![0.0, 1.0, 2.0])]).unwrap();
        h.fill(&[0.5], w).unwrap();
        h.fill(&[5.0], w).unwrap();
        h
    }

    #[test]
    fn yields_include_flow_and_total() {
        let mut t = YieldTable::new("Stacked processes");
        t.push(YieldRow::from_hist("Wmunu", &h(3.0)));
        t.push(YieldRow::from_hist("Fake", &h(4.0)));
        let t = t.with_total("Total").with_fractions(28.0);
        assert_relative_eq!(t.row("Total").unwrap().fraction.unwrap(), 0.5);
        assert_relative_eq!(t.row("Wmunu").unwrap().value, 6.0);
        let total = t.row("Total").unwrap();
        assert_relative_eq!(total.value, 14.0);
        assert_relative_eq!(total.uncertainty, (18.0f64 + 32.0).sqrt(), epsilon = 1e-12);
        let text = t.to_string();
        assert!(text.starts_with("Stacked processes\n"));
        assert!(text.contains("Uncertainty"));
        assert!(t.to_json().unwrap().contains("\"yield\": 6.0"));
    }
}
