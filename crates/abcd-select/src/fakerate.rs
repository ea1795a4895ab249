//! Fake-rate factors as a function of the ABCD x axis.

use abcd_core::{Axis, AxisKind, Error, Histogram, Result, hist::increment};
use abcd_fit::poly::{self, ParamGrid};

use crate::abcd::Smoothing;
use crate::regions::{Window, Y_AXES, select_window};

/// Pass and fail yields with the y axis removed.
///
/// A boolean `passIso` axis is used directly; otherwise the first
/// continuous y axis found is split into signal (pass) and sideband (fail).
pub fn pass_fail(h: &Histogram) -> Result<(Histogram, Histogram)> {
    let name = Y_AXES.iter().find(|n| h.has_axis(n)).ok_or_else(|| {
        Error::Validation(format!(
            "no pass/fail axis among {:?}, histogram has {:?}",
            Y_AXES,
            h.axis_names()
        ))
    })?;
    let pass = select_window(h, name, Window::Signal)?;
    let fail = select_window(h, name, Window::Sideband)?;
    Ok((pass, fail))
}

/// Pass/fail ratio per bin, the x axis kept.
pub fn fakerate_hist(h: &Histogram) -> Result<Histogram> {
    let (pass, fail) = pass_fail(h)?;
    pass.divide(&fail)
}

/// Fit the pass/fail ratio along `x_axis` in every bin of the other axes.
///
/// All regular x bins are used. With `smoothing`, that axis is fitted
/// jointly with x and does not appear in the returned grid. Flow bins of
/// the detector axes are not fitted.
pub fn compute_fakerate(
    h: &Histogram,
    x_axis: &str,
    order: usize,
    smoothing: Option<&Smoothing>,
) -> Result<ParamGrid> {
    let ratio = fakerate_hist(h)?;
    let x = ratio.axis(x_axis)?.clone();
    if !matches!(x.kind, AxisKind::Variable { .. }) {
        return Err(Error::Validation(format!("fake-rate axis '{x_axis}' must be continuous")));
    }
    let z = smoothing.map(|s| ratio.axis(&s.axis)).transpose()?.cloned();

    let detector: Vec<Axis> = ratio
        .axes()
        .iter()
        .filter(|a| a.name != x_axis && smoothing.is_none_or(|s| a.name != s.axis))
        .cloned()
        .collect();
    let shape: Vec<usize> = detector.iter().map(Axis::n_bins).collect();
    let n_fits: usize = shape.iter().product();

    let x_centers = x.centers();
    let z_centers = z.as_ref().map(Axis::centers).unwrap_or_else(|| vec![0.0]);
    let mut fits = Vec::with_capacity(n_fits);
    let mut idx = vec![0usize; shape.len()];
    for _ in 0..n_fits {
        let mut xs = Vec::new();
        let mut zs = Vec::new();
        let mut ys = Vec::new();
        let mut vs = Vec::new();
        let mut bins = vec![0usize; ratio.rank()];
        for (d, ax) in detector.iter().enumerate() {
            bins[ratio.axis_index(&ax.name)?] = idx[d];
        }
        for (iz, &zc) in z_centers.iter().enumerate() {
            if let (Some(s), Some(_)) = (smoothing, &z) {
                bins[ratio.axis_index(&s.axis)?] = iz;
            }
            for (ix, &xc) in x_centers.iter().enumerate() {
                bins[ratio.axis_index(x_axis)?] = ix;
                let (v, var) = ratio.bin(&bins)?;
                xs.push(xc);
                zs.push(zc);
                ys.push(v);
                vs.push(var);
            }
        }
        let fit = match smoothing {
            Some(s) => poly::fit_weighted_2d(&xs, &zs, &ys, &vs, order, &s.orders),
            None => poly::fit_weighted(&xs, &ys, &vs, order),
        }
        .map_err(|e| Error::Computation(format!("fake-rate fit in bin {idx:?}: {e}")))?;
        fits.push(fit);
        increment(&mut idx, &shape);
    }

    let grid = ParamGrid::new(detector, fits)?;
    tracing::info!(
        fits = grid.fits.len(),
        params = grid.n_params(),
        ndf = grid.ndf(),
        "computed fake-rate parameters"
    );
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// eta x mt x passIso with a linear fake rate `0.5 + 0.01 * mt` (eta bin 0)
    /// and `0.3 + 0.02 * mt` (eta bin 1).
    fn linear_rate() -> Histogram {
        let mut h = Histogram::new(vec![
            Axis::regular("eta", 2, 0.0, 2.4),
            Axis::variable("mt", vec![0.0, 10.0, 20.0, 30.0, 40.0]),
            Axis::boolean("passIso"),
        ])
        .unwrap();
        for (ie, eta) in [0.5, 1.5].iter().enumerate() {
            let (a, b) = if ie == 0 { (0.5, 0.01) } else { (0.3, 0.02) };
            for mt in [5.0, 15.0, 25.0, 35.0] {
                let fail = 1000.0;
                h.fill(&[*eta, mt, 0.0], fail).unwrap();
                h.fill(&[*eta, mt, 1.0], fail * (a + b * mt)).unwrap();
            }
        }
        h
    }

    #[test]
    fn linear_rate_is_recovered_per_bin() {
        let grid = compute_fakerate(&linear_rate(), "mt", 1, None).unwrap();
        assert_eq!(grid.shape(), vec![2]);
        let f0 = grid.get(&[0]).unwrap();
        assert_relative_eq!(f0.params[0], 0.5, epsilon = 1e-9);
        assert_relative_eq!(f0.params[1], 0.01, epsilon = 1e-11);
        let f1 = grid.get(&[1]).unwrap();
        assert_relative_eq!(f1.eval(30.0), 0.9, epsilon = 1e-9);
        assert_eq!(grid.ndf(), 2);
    }

    #[test]
    fn smoothing_axis_leaves_the_grid() {
        let s = Smoothing { axis: "eta".into(), orders: vec![1, 1] };
        let grid = compute_fakerate(&linear_rate(), "mt", 1, Some(&s)).unwrap();
        assert!(grid.axes.is_empty());
        assert_eq!(grid.fits.len(), 1);
        assert_eq!(grid.n_params(), 4);
    }

    #[test]
    fn fakerate_hist_keeps_x() {
        let r = fakerate_hist(&linear_rate()).unwrap();
        assert_eq!(r.axis_names(), vec!["eta", "mt"]);
        assert_relative_eq!(r.bin(&[0, 0]).unwrap().0, 0.55, epsilon = 1e-12);
    }

    #[test]
    fn missing_pass_axis_is_an_error() {
        let h = Histogram::new(vec![Axis::variable("mt", vec![0.0, 1.0])]).unwrap();
        assert!(compute_fakerate(&h, "mt", 1, None).is_err());
    }
}
