//! N-dimensional histograms with named axes.
//!
//! Storage is row-major over all axes (last axis fastest) and includes
//! underflow/overflow bins for continuous axes that carry them. Every
//! operation returns a new histogram; loaded histograms are never mutated
//! in place by the analysis code.

mod axis;
mod ops;

pub use axis::{Axis, AxisKind};
pub use ops::DIVIDE_CUTOFF;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Histogram of weighted counts with per-bin variances (sum of weights squared).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    axes: Vec<Axis>,
    values: Vec<f64>,
    variances: Vec<f64>,
}

impl Histogram {
    /// Empty histogram over the given axes.
    pub fn new(axes: Vec<Axis>) -> Result<Self> {
        validate_axes(&axes)?;
        let size = axes.iter().map(Axis::extent).product();
        Ok(Self { axes, values: vec![0.0; size], variances: vec![0.0; size] })
    }

    /// Histogram from flat storage arrays (flow bins included).
    pub fn from_parts(axes: Vec<Axis>, values: Vec<f64>, variances: Vec<f64>) -> Result<Self> {
        let h = Self { axes, values, variances };
        h.validate()?;
        Ok(h)
    }

    /// Zero-dimensional histogram holding a single yield.
    pub fn scalar(value: f64, variance: f64) -> Self {
        Self { axes: Vec::new(), values: vec![value], variances: vec![variance] }
    }

    /// Check axis definitions and storage sizes.
    pub fn validate(&self) -> Result<()> {
        validate_axes(&self.axes)?;
        let size: usize = self.axes.iter().map(Axis::extent).product();
        if self.values.len() != size || self.variances.len() != size {
            return Err(Error::Validation(format!(
                "histogram storage mismatch: axes imply {} bins, got {} values and {} variances",
                size,
                self.values.len(),
                self.variances.len()
            )));
        }
        Ok(())
    }

    /// All axes, in storage order.
    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    /// Axis names, in storage order.
    pub fn axis_names(&self) -> Vec<&str> {
        self.axes.iter().map(|a| a.name.as_str()).collect()
    }

    /// Number of axes.
    pub fn rank(&self) -> usize {
        self.axes.len()
    }

    /// Position of an axis by name.
    pub fn axis_index(&self, name: &str) -> Result<usize> {
        self.axes
            .iter()
            .position(|a| a.name == name)
            .ok_or_else(|| Error::MissingAxis(name.to_string()))
    }

    /// Axis by name.
    pub fn axis(&self, name: &str) -> Result<&Axis> {
        Ok(&self.axes[self.axis_index(name)?])
    }

    /// Whether an axis with this name exists.
    pub fn has_axis(&self, name: &str) -> bool {
        self.axes.iter().any(|a| a.name == name)
    }

    /// Flat storage, flow bins included.
    pub fn raw_values(&self) -> &[f64] {
        &self.values
    }

    /// Flat variance storage, flow bins included.
    pub fn raw_variances(&self) -> &[f64] {
        &self.variances
    }

    /// Shape of the regular bins (`flow = false`) or of the full storage.
    pub fn shape(&self, flow: bool) -> Vec<usize> {
        self.axes.iter().map(|a| if flow { a.extent() } else { a.n_bins() }).collect()
    }

    /// Row-major strides of the full storage.
    pub fn strides(&self) -> Vec<usize> {
        let mut strides = vec![1; self.axes.len()];
        for i in (0..self.axes.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * self.axes[i + 1].extent();
        }
        strides
    }

    /// Storage index of a regular-bin multi-index.
    pub fn flat_index(&self, bins: &[usize]) -> Result<usize> {
        if bins.len() != self.axes.len() {
            return Err(Error::Validation(format!(
                "expected {} bin indices, got {}",
                self.axes.len(),
                bins.len()
            )));
        }
        let strides = self.strides();
        let mut flat = 0;
        for ((ax, &b), s) in self.axes.iter().zip(bins).zip(strides) {
            if b >= ax.n_bins() {
                return Err(Error::Validation(format!(
                    "bin {} out of range for axis '{}' with {} bins",
                    b,
                    ax.name,
                    ax.n_bins()
                )));
            }
            flat += (b + ax.offset()) * s;
        }
        Ok(flat)
    }

    /// `(value, variance)` of a regular bin.
    pub fn bin(&self, bins: &[usize]) -> Result<(f64, f64)> {
        let i = self.flat_index(bins)?;
        Ok((self.values[i], self.variances[i]))
    }

    /// Overwrite a regular bin.
    pub fn set_bin(&mut self, bins: &[usize], value: f64, variance: f64) -> Result<()> {
        let i = self.flat_index(bins)?;
        self.values[i] = value;
        self.variances[i] = variance;
        Ok(())
    }

    /// Fill one weighted entry at the given coordinates (one per axis).
    ///
    /// Boolean axes take `0`/`1`, category axes take the label index.
    /// Entries outside an axis without flow bins are dropped.
    pub fn fill(&mut self, coords: &[f64], weight: f64) -> Result<()> {
        if coords.len() != self.axes.len() {
            return Err(Error::Validation(format!(
                "fill expects {} coordinates, got {}",
                self.axes.len(),
                coords.len()
            )));
        }
        let strides = self.strides();
        let mut flat = 0;
        for ((ax, &c), s) in self.axes.iter().zip(coords).zip(strides) {
            let idx = match ax.kind {
                AxisKind::Variable { .. } => ax.storage_index(ax.locate(c)),
                AxisKind::Boolean => Some(usize::from(c != 0.0)),
                AxisKind::Category { .. } => {
                    let i = c.round();
                    (i >= 0.0 && (i as usize) < ax.n_bins()).then_some(i as usize)
                }
            };
            match idx {
                Some(i) => flat += i * s,
                None => return Ok(()),
            }
        }
        self.values[flat] += weight;
        self.variances[flat] += weight * weight;
        Ok(())
    }

    /// Regular-bin values, flattened row-major; `flow = true` returns storage.
    pub fn values(&self, flow: bool) -> Vec<f64> {
        self.collect(&self.values, flow)
    }

    /// Regular-bin variances, flattened row-major; `flow = true` returns storage.
    pub fn variances(&self, flow: bool) -> Vec<f64> {
        self.collect(&self.variances, flow)
    }

    fn collect(&self, data: &[f64], flow: bool) -> Vec<f64> {
        if flow || self.axes.iter().all(|a| !a.has_flow()) {
            return data.to_vec();
        }
        let shape = self.shape(false);
        let n: usize = shape.iter().product();
        let strides = self.strides();
        let mut out = Vec::with_capacity(n);
        let mut idx = vec![0usize; shape.len()];
        for _ in 0..n {
            let flat: usize = idx
                .iter()
                .zip(&self.axes)
                .zip(&strides)
                .map(|((&i, ax), s)| (i + ax.offset()) * s)
                .sum();
            out.push(data[flat]);
            increment(&mut idx, &shape);
        }
        out
    }

    /// Sum of values and variances over all bins.
    pub fn total(&self, flow: bool) -> (f64, f64) {
        let v = self.values(flow).iter().sum();
        let var = self.variances(flow).iter().sum();
        (v, var)
    }

    /// Value of a zero-dimensional histogram (or the flow-inclusive total).
    pub fn scalar_value(&self) -> (f64, f64) {
        self.total(true)
    }
}

fn validate_axes(axes: &[Axis]) -> Result<()> {
    for (i, ax) in axes.iter().enumerate() {
        ax.validate()?;
        if axes[..i].iter().any(|other| other.name == ax.name) {
            return Err(Error::Validation(format!("duplicate axis name '{}'", ax.name)));
        }
    }
    Ok(())
}

/// Advance a row-major multi-index; returns false after the last element.
pub fn increment(idx: &mut [usize], shape: &[usize]) -> bool {
    for d in (0..idx.len()).rev() {
        idx[d] += 1;
        if idx[d] < shape[d] {
            return true;
        }
        idx[d] = 0;
    }
    false
}
