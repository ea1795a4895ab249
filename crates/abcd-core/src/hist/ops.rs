//! Slicing, projection, rebinning and arithmetic.

use super::{Axis, AxisKind, Histogram, increment};
use crate::{Error, Result};

/// Denominators below this magnitude give the cutoff ratio.
pub const DIVIDE_CUTOFF: f64 = 1e-5;

impl Histogram {
    /// Re-bin one axis through a storage-index mapping.
    ///
    /// `mapping[old]` is the new storage index on that axis or `None` to drop
    /// the content. With `new_axis = None` the axis is removed and all mapped
    /// content lands in index 0.
    fn remap_axis(&self, ax: usize, mapping: &[Option<usize>], new_axis: Option<Axis>) -> Self {
        let old_extent = self.axes[ax].extent();
        debug_assert_eq!(mapping.len(), old_extent);
        let new_extent = new_axis.as_ref().map(Axis::extent).unwrap_or(1);
        let inner: usize = self.axes[ax + 1..].iter().map(Axis::extent).product();
        let outer: usize = self.axes[..ax].iter().map(Axis::extent).product();

        let mut axes = self.axes.clone();
        match new_axis {
            Some(a) => axes[ax] = a,
            None => {
                axes.remove(ax);
            }
        }
        let size = outer * new_extent * inner;
        let mut values = vec![0.0; size];
        let mut variances = vec![0.0; size];
        for o in 0..outer {
            for (a, target) in mapping.iter().enumerate() {
                let Some(t) = *target else { continue };
                let src = (o * old_extent + a) * inner;
                let dst = (o * new_extent + t) * inner;
                for i in 0..inner {
                    values[dst + i] += self.values[src + i];
                    variances[dst + i] += self.variances[src + i];
                }
            }
        }
        Self { axes, values, variances }
    }

    /// Take regular bin `index` of an axis and remove the axis.
    pub fn select(&self, name: &str, index: usize) -> Result<Self> {
        let ax = self.axis_index(name)?;
        let axis = &self.axes[ax];
        if index >= axis.n_bins() {
            return Err(Error::Validation(format!(
                "bin {} out of range for axis '{}' with {} bins",
                index,
                name,
                axis.n_bins()
            )));
        }
        let mut mapping = vec![None; axis.extent()];
        mapping[index + axis.offset()] = Some(0);
        Ok(self.remap_axis(ax, &mapping, None))
    }

    /// Take the bin containing coordinate `value` and remove the axis.
    pub fn select_value(&self, name: &str, value: f64) -> Result<Self> {
        let axis = self.axis(name)?;
        match axis.kind {
            AxisKind::Boolean => self.select(name, usize::from(value != 0.0)),
            _ => {
                let loc = axis.locate(value);
                if loc < 0 || loc as usize >= axis.n_bins() {
                    return Err(Error::Validation(format!(
                        "value {value} outside the range of axis '{name}'"
                    )));
                }
                self.select(name, loc as usize)
            }
        }
    }

    /// Take a category by label and remove the axis.
    pub fn select_label(&self, name: &str, label: &str) -> Result<Self> {
        let axis = self.axis(name)?;
        let idx = axis.label_index(label).ok_or_else(|| {
            Error::Validation(format!("axis '{name}' has no category '{label}'"))
        })?;
        self.select(name, idx)
    }

    /// Sum the coordinate range `[lo, hi)` and remove the axis.
    ///
    /// `lo = None` starts at the underflow bin, `hi = None` runs through the
    /// overflow bin. Boolean and category axes are summed over bin indices.
    pub fn integrate(&self, name: &str, lo: Option<f64>, hi: Option<f64>) -> Result<Self> {
        let ax = self.axis_index(name)?;
        let axis = &self.axes[ax];
        let extent = axis.extent() as isize;
        let offset = axis.offset() as isize;
        let start = match lo {
            None => 0,
            Some(v) => (axis.locate(v) + offset).clamp(0, extent),
        };
        let stop = match hi {
            None => extent,
            Some(v) => (axis.locate(v) + offset).clamp(0, extent),
        };
        let mapping: Vec<Option<usize>> =
            (0..extent).map(|i| (i >= start && i < stop).then_some(0)).collect();
        Ok(self.remap_axis(ax, &mapping, None))
    }

    /// Sum an axis completely (flow included) and remove it.
    pub fn sum_axis(&self, name: &str) -> Result<Self> {
        let ax = self.axis_index(name)?;
        let mapping = vec![Some(0); self.axes[ax].extent()];
        Ok(self.remap_axis(ax, &mapping, None))
    }

    /// Sum several axes; names not present are an error.
    pub fn sum_axes(&self, names: &[&str]) -> Result<Self> {
        names.iter().try_fold(self.clone(), |h, n| h.sum_axis(n))
    }

    /// Keep the regular bins inside `[lo, hi)`; everything else is dropped.
    pub fn restrict(&self, name: &str, lo: f64, hi: f64) -> Result<Self> {
        let ax = self.axis_index(name)?;
        let axis = &self.axes[ax];
        let AxisKind::Variable { edges, .. } = &axis.kind else {
            return Err(Error::Validation(format!("cannot restrict non-continuous axis '{name}'")));
        };
        let n = axis.n_bins() as isize;
        let start = axis.locate(lo).clamp(0, n) as usize;
        let stop = axis.locate(hi).clamp(0, n) as usize;
        if stop <= start {
            return Err(Error::Validation(format!(
                "range [{lo}, {hi}) selects no bins of axis '{name}'"
            )));
        }
        let new_axis = Axis::variable_noflow(name, edges[start..=stop].to_vec());
        let mapping: Vec<Option<usize>> = (0..axis.extent())
            .map(|s| {
                let b = s as isize - axis.offset() as isize;
                (b >= start as isize && b < stop as isize).then(|| b as usize - start)
            })
            .collect();
        Ok(self.remap_axis(ax, &mapping, Some(new_axis)))
    }

    /// Merge bins onto a subset of the existing edges.
    ///
    /// Content outside the new range moves to the flow bins.
    pub fn rebin_edges(&self, name: &str, new_edges: &[f64]) -> Result<Self> {
        let ax = self.axis_index(name)?;
        let axis = &self.axes[ax];
        if !axis.is_continuous() {
            return Err(Error::Validation(format!("cannot rebin non-continuous axis '{name}'")));
        }
        let mut positions = Vec::with_capacity(new_edges.len());
        for &e in new_edges {
            let p = axis.edge_index(e).ok_or_else(|| {
                Error::Validation(format!(
                    "edge {e} is not an edge of axis '{name}', cannot rebin to {new_edges:?}"
                ))
            })?;
            positions.push(p);
        }
        if positions.len() < 2 || positions.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::Validation(format!(
                "new edges for axis '{name}' must be increasing, got {new_edges:?}"
            )));
        }
        let old_edges = axis.edges();
        let new_axis =
            Axis::variable(name, positions.iter().map(|&p| old_edges[p]).collect::<Vec<_>>());
        let n_new = positions.len() - 1;
        let first = positions[0];
        let last = positions[n_new];

        let mut mapping = vec![None; axis.extent()];
        if axis.has_flow() {
            mapping[0] = Some(0);
            mapping[axis.extent() - 1] = Some(n_new + 1);
        }
        for b in 0..axis.n_bins() {
            let target = if b < first {
                0
            } else if b >= last {
                n_new + 1
            } else {
                1 + positions.windows(2).position(|w| b >= w[0] && b < w[1]).unwrap_or(0)
            };
            mapping[b + axis.offset()] = Some(target);
        }
        Ok(self.remap_axis(ax, &mapping, Some(new_axis)))
    }

    /// Merge every `factor` consecutive bins; a trailing remainder goes to overflow.
    pub fn rebin_factor(&self, name: &str, factor: usize) -> Result<Self> {
        if factor == 0 {
            return Err(Error::Validation("rebin factor must be >= 1".into()));
        }
        if factor == 1 {
            return Ok(self.clone());
        }
        let edges = self.axis(name)?.edges();
        let new_edges: Vec<f64> = edges.iter().step_by(factor).copied().collect();
        self.rebin_edges(name, &new_edges)
    }

    /// Fold a symmetric axis onto its non-negative half (`|x|`).
    pub fn abs_axis(&self, name: &str) -> Result<Self> {
        let ax = self.axis_index(name)?;
        let axis = &self.axes[ax];
        let AxisKind::Variable { edges, flow } = &axis.kind else {
            return Err(Error::Validation(format!("cannot take |x| of axis '{name}'")));
        };
        let zero = axis.edge_index(0.0).ok_or_else(|| {
            Error::Validation(format!("axis '{name}' has no edge at 0, cannot take |x|"))
        })?;
        let positive: Vec<f64> = edges[zero..].to_vec();
        let negative: Vec<f64> = edges[..=zero].iter().rev().map(|e| -e).collect();
        let symmetric = positive.len() == negative.len()
            && positive.iter().zip(&negative).all(|(a, b)| (a - b).abs() <= 1e-9 * a.abs().max(1.0));
        if !symmetric {
            return Err(Error::Validation(format!("axis '{name}' is not symmetric around 0")));
        }
        let n_half = positive.len() - 1;
        let new_axis = Axis {
            name: name.to_string(),
            kind: AxisKind::Variable { edges: positive, flow: *flow },
        };
        let off = axis.offset();
        let mut mapping = vec![None; axis.extent()];
        if *flow {
            mapping[0] = Some(n_half + 1);
            mapping[axis.extent() - 1] = Some(n_half + 1);
        }
        for b in 0..axis.n_bins() {
            let folded = if b >= zero { b - zero } else { zero - 1 - b };
            mapping[b + off] = Some(folded + off);
        }
        Ok(self.remap_axis(ax, &mapping, Some(new_axis)))
    }

    /// Reorder axes by position.
    pub fn transpose(&self, order: &[usize]) -> Result<Self> {
        let n = self.axes.len();
        let mut seen = vec![false; n];
        if order.len() != n || order.iter().any(|&o| o >= n || std::mem::replace(&mut seen[o], true))
        {
            return Err(Error::Validation(format!("invalid axis permutation {order:?}")));
        }
        if order.iter().enumerate().all(|(i, &o)| i == o) {
            return Ok(self.clone());
        }
        let axes: Vec<Axis> = order.iter().map(|&o| self.axes[o].clone()).collect();
        let old_strides = self.strides();
        let shape: Vec<usize> = axes.iter().map(Axis::extent).collect();
        let size = self.values.len();
        let mut values = Vec::with_capacity(size);
        let mut variances = Vec::with_capacity(size);
        let mut idx = vec![0usize; n];
        for _ in 0..size {
            let src: usize = idx.iter().zip(order).map(|(&i, &o)| i * old_strides[o]).sum();
            values.push(self.values[src]);
            variances.push(self.variances[src]);
            increment(&mut idx, &shape);
        }
        Ok(Self { axes, values, variances })
    }

    /// Sum every axis not listed and order the rest as listed.
    pub fn project(&self, names: &[&str]) -> Result<Self> {
        for n in names {
            self.axis_index(n)?;
        }
        let drop: Vec<String> = self
            .axes
            .iter()
            .filter(|a| !names.contains(&a.name.as_str()))
            .map(|a| a.name.clone())
            .collect();
        let mut h = self.clone();
        for d in &drop {
            h = h.sum_axis(d)?;
        }
        let order: Vec<usize> =
            names.iter().map(|n| h.axis_index(n)).collect::<Result<Vec<_>>>()?;
        h.transpose(&order)
    }

    /// Flatten the listed axes into one axis of bin indices (flow dropped).
    ///
    /// The last listed axis runs fastest. With `binwnorm`, each bin is
    /// divided by its N-dimensional volume and multiplied by `binwnorm`.
    pub fn unrolled(&self, obs: &[&str], binwnorm: Option<f64>) -> Result<Self> {
        let p = self.project(obs)?;
        let mut values = p.values(false);
        let mut variances = p.variances(false);
        if let Some(norm) = binwnorm {
            let widths: Vec<Vec<f64>> = p.axes.iter().map(Axis::widths).collect();
            let shape = p.shape(false);
            let mut idx = vec![0usize; shape.len()];
            for i in 0..values.len() {
                let vol: f64 = idx.iter().zip(&widths).map(|(&b, w)| w[b]).product();
                let f = norm / vol;
                values[i] *= f;
                variances[i] *= f * f;
                increment(&mut idx, &shape);
            }
        }
        let n = values.len();
        let name = obs.join("-");
        let axis = Axis::variable_noflow(name, (0..=n).map(|i| i as f64).collect());
        Histogram::from_parts(vec![axis], values, variances)
    }

    /// Multiply all bins by a constant.
    pub fn scale(&self, factor: f64) -> Self {
        Self {
            axes: self.axes.clone(),
            values: self.values.iter().map(|v| v * factor).collect(),
            variances: self.variances.iter().map(|v| v * factor * factor).collect(),
        }
    }

    /// Bin-by-bin sum; variances add.
    pub fn add(&self, other: &Histogram) -> Result<Self> {
        self.check_same_axes(other)?;
        Ok(Self {
            axes: self.axes.clone(),
            values: self.values.iter().zip(&other.values).map(|(a, b)| a + b).collect(),
            variances: self.variances.iter().zip(&other.variances).map(|(a, b)| a + b).collect(),
        })
    }

    /// Bin-by-bin difference; variances add.
    pub fn sub(&self, other: &Histogram) -> Result<Self> {
        self.check_same_axes(other)?;
        Ok(Self {
            axes: self.axes.clone(),
            values: self.values.iter().zip(&other.values).map(|(a, b)| a - b).collect(),
            variances: self.variances.iter().zip(&other.variances).map(|(a, b)| a + b).collect(),
        })
    }

    /// Bin-by-bin ratio, broadcasting `other` over axes it does not have.
    ///
    /// Variances are propagated as uncorrelated. Where the denominator is
    /// below [`DIVIDE_CUTOFF`] in magnitude the ratio is set to 1 with zero
    /// variance.
    pub fn divide(&self, other: &Histogram) -> Result<Self> {
        let map = self.broadcast_map(other)?;
        let mut values = Vec::with_capacity(self.values.len());
        let mut variances = Vec::with_capacity(self.values.len());
        for (i, &j) in map.iter().enumerate() {
            let (n, vn) = (self.values[i], self.variances[i]);
            let (d, vd) = (other.values[j], other.variances[j]);
            if d.abs() < DIVIDE_CUTOFF {
                values.push(1.0);
                variances.push(0.0);
            } else {
                let r = n / d;
                values.push(r);
                variances.push(vn / (d * d) + r * r * vd / (d * d));
            }
        }
        Ok(Self { axes: self.axes.clone(), values, variances })
    }

    /// Bin-by-bin product, broadcasting `other` over axes it does not have.
    pub fn multiply(&self, other: &Histogram) -> Result<Self> {
        let map = self.broadcast_map(other)?;
        let mut values = Vec::with_capacity(self.values.len());
        let mut variances = Vec::with_capacity(self.values.len());
        for (i, &j) in map.iter().enumerate() {
            let (a, va) = (self.values[i], self.variances[i]);
            let (b, vb) = (other.values[j], other.variances[j]);
            values.push(a * b);
            variances.push(a * a * vb + b * b * va);
        }
        Ok(Self { axes: self.axes.clone(), values, variances })
    }

    /// Apply a function to every `(value, variance)` pair.
    pub fn map_bins(&self, f: impl Fn(f64, f64) -> (f64, f64)) -> Self {
        let (values, variances) =
            self.values.iter().zip(&self.variances).map(|(&v, &var)| f(v, var)).unzip();
        Self { axes: self.axes.clone(), values, variances }
    }

    fn check_same_axes(&self, other: &Histogram) -> Result<()> {
        let same = self.axes.len() == other.axes.len()
            && self.axes.iter().zip(&other.axes).all(|(a, b)| a.same_binning(b));
        if same {
            Ok(())
        } else {
            Err(Error::Validation(format!(
                "histogram axes differ: {:?} vs {:?}",
                self.axis_names(),
                other.axis_names()
            )))
        }
    }

    /// For each storage index of `self`, the storage index of `other`.
    ///
    /// `other` must carry a subset of `self`'s axes with identical binning.
    fn broadcast_map(&self, other: &Histogram) -> Result<Vec<usize>> {
        let mut positions = Vec::with_capacity(other.axes.len());
        for oa in &other.axes {
            let i = self.axis_index(&oa.name)?;
            if !self.axes[i].same_binning(oa) {
                return Err(Error::Validation(format!(
                    "axis '{}' has different binning in the two histograms",
                    oa.name
                )));
            }
            positions.push(i);
        }
        let other_strides = other.strides();
        let shape = self.shape(true);
        let mut map = Vec::with_capacity(self.values.len());
        let mut idx = vec![0usize; shape.len()];
        for _ in 0..self.values.len() {
            let j: usize = positions.iter().zip(&other_strides).map(|(&p, s)| idx[p] * s).sum();
            map.push(j);
            increment(&mut idx, &shape);
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn mt_iso() -> Histogram {
        let mut h = Histogram::new(vec![
            Axis::variable("mt", vec![0.0, 20.0, 40.0, 60.0]),
            Axis::variable("iso", vec![0.0, 0.15, 0.3]),
        ])
        .unwrap();
        for (mt, iso, w) in [
            (10.0, 0.1, 1.0),
            (30.0, 0.1, 2.0),
            (50.0, 0.1, 3.0),
            (70.0, 0.1, 4.0),
            (10.0, 0.2, 5.0),
            (30.0, 0.25, 6.0),
            (50.0, 0.5, 7.0),
        ] {
            h.fill(&[mt, iso], w).unwrap();
        }
        h
    }

    #[test]
    fn integrate_ranges_and_flow() {
        let h = mt_iso();
        let high_mt = h.integrate("mt", Some(40.0), None).unwrap();
        assert_eq!(high_mt.axis_names(), vec!["iso"]);
        // mt >= 40 including overflow, iso regular bins + overflow
        assert_relative_eq!(high_mt.total(true).0, 3.0 + 4.0 + 7.0);
        assert_relative_eq!(high_mt.total(false).0, 3.0 + 4.0);

        let window = h.integrate("mt", Some(20.0), Some(40.0)).unwrap();
        assert_relative_eq!(window.total(true).0, 2.0 + 6.0);
    }

    #[test]
    fn select_value_removes_axis() {
        let h = mt_iso();
        let s = h.select_value("iso", 0.2).unwrap();
        assert_eq!(s.axis_names(), vec!["mt"]);
        assert_eq!(s.values(false), vec![5.0, 6.0, 0.0]);
    }

    #[test]
    fn rebin_moves_outside_content_to_flow() {
        let h = mt_iso().project(&["mt"]).unwrap();
        let r = h.rebin_edges("mt", &[20.0, 60.0]).unwrap();
        assert_eq!(r.values(false), vec![2.0 + 6.0 + 3.0 + 7.0]);
        assert_relative_eq!(r.total(true).0, h.total(true).0);
        assert!(h.rebin_edges("mt", &[0.0, 25.0]).is_err());
    }

    #[test]
    fn rebin_factor_merges_pairs() {
        let h = Histogram::new(vec![Axis::regular("pt", 4, 0.0, 4.0)]).unwrap();
        let mut h = h;
        for (x, w) in [(0.5, 1.0), (1.5, 2.0), (2.5, 3.0), (3.5, 4.0)] {
            h.fill(&[x], w).unwrap();
        }
        let r = h.rebin_factor("pt", 2).unwrap();
        assert_eq!(r.values(false), vec![3.0, 7.0]);
        assert_eq!(r.axis("pt").unwrap().edges(), vec![0.0, 2.0, 4.0]);
    }

    #[test]
    fn abs_folds_symmetric_axis() {
        let mut h = Histogram::new(vec![Axis::variable("eta", vec![-2.0, -1.0, 0.0, 1.0, 2.0])])
            .unwrap();
        for (x, w) in [(-1.5, 1.0), (-0.5, 2.0), (0.5, 3.0), (1.5, 4.0)] {
            h.fill(&[x], w).unwrap();
        }
        let a = h.abs_axis("eta").unwrap();
        assert_eq!(a.axis("eta").unwrap().edges(), vec![0.0, 1.0, 2.0]);
        assert_eq!(a.values(false), vec![5.0, 5.0]);
    }

    #[test]
    fn project_reorders_axes() {
        let h = mt_iso();
        let p = h.project(&["iso", "mt"]).unwrap();
        assert_eq!(p.axis_names(), vec!["iso", "mt"]);
        assert_eq!(p.bin(&[0, 1]).unwrap().0, 2.0);
        assert_eq!(p.bin(&[1, 1]).unwrap().0, 6.0);
    }

    #[test]
    fn divide_broadcasts_and_applies_cutoff() {
        let h = mt_iso();
        let denom = h.project(&["mt"]).unwrap();
        let r = h.divide(&denom).unwrap();
        // mt bin 0: iso bin 0 has 1 of 6 total
        assert_relative_eq!(r.bin(&[0, 0]).unwrap().0, 1.0 / 6.0);

        let zero = Histogram::new(vec![Axis::variable("mt", vec![0.0, 20.0, 40.0, 60.0])]).unwrap();
        let r = h.divide(&zero).unwrap();
        assert!(r.values(false).iter().all(|&v| v == 1.0));
        assert!(r.variances(false).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn unrolled_orders_last_axis_fastest() {
        let h = mt_iso();
        let u = h.unrolled(&["mt", "iso"], None).unwrap();
        assert_eq!(u.axis_names(), vec!["mt-iso"]);
        assert_eq!(u.values(false), vec![1.0, 5.0, 2.0, 6.0, 3.0, 0.0]);

        let w = h.unrolled(&["mt"], Some(1.0)).unwrap();
        assert_relative_eq!(w.values(false)[0], 6.0 / 20.0);
    }

    #[test]
    fn restrict_drops_outside_bins() {
        let h = mt_iso().project(&["mt"]).unwrap();
        let r = h.restrict("mt", 20.0, 60.0).unwrap();
        assert_eq!(r.values(true), vec![8.0, 10.0]);
    }

    proptest! {
        #[test]
        fn rebin_and_transpose_preserve_totals(
            weights in proptest::collection::vec(0.0f64..100.0, 24),
        ) {
            let mut h = Histogram::new(vec![
                Axis::regular("a", 4, 0.0, 4.0),
                Axis::regular("b", 6, 0.0, 6.0),
            ]).unwrap();
            for (i, w) in weights.iter().enumerate() {
                let a = (i / 6) as f64 + 0.5;
                let b = (i % 6) as f64 + 0.5;
                h.fill(&[a, b], *w).unwrap();
            }
            let total = h.total(true).0;
            let r = h.rebin_edges("b", &[1.0, 3.0, 5.0]).unwrap();
            prop_assert!((r.total(true).0 - total).abs() < 1e-9 * total.max(1.0));
            let t = h.transpose(&[1, 0]).unwrap();
            prop_assert!((t.total(true).0 - total).abs() < 1e-9 * total.max(1.0));
            let u = h.unrolled(&["b", "a"], None).unwrap();
            prop_assert!((u.total(true).0 - h.total(false).0).abs() < 1e-9 * total.max(1.0));
        }
    }
}
