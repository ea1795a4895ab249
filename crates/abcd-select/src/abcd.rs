//! Signal-region estimates from the ABCD control regions.

use abcd_core::{Axis, DIVIDE_CUTOFF, Error, Histogram, Result, hist::increment};
use abcd_fit::poly::{self, PolyFit};
use abcd_fit::propagate::linear_error;

use crate::regions::{AbcdAxes, Region, Window, region_hist, select_window, window_range};

/// Joint fit in a second detector axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Smoothing {
    /// Axis the fake-rate factor is smoothed in (e.g. `pt`).
    pub axis: String,
    /// Polynomial order in that axis for each power of x.
    pub orders: Vec<usize>,
}

/// Direct selection of the signal region.
pub fn signal_hist(h: &Histogram, axes: &AbcdAxes) -> Result<Histogram> {
    region_hist(h, axes, Region::D)
}

fn present<'a>(h: &Histogram, names: &[&'a str]) -> Vec<&'a str> {
    names.iter().copied().filter(|n| h.has_axis(n)).collect()
}

/// Simple ABCD: `D = C * B / A`.
///
/// The factor `B / A` is formed after summing `integration_axes` and is then
/// applied to every bin of `C` along those axes.
pub fn fake_hist_simple(
    h: &Histogram,
    axes: &AbcdAxes,
    integration_axes: &[&str],
) -> Result<Histogram> {
    let a = region_hist(h, axes, Region::A)?;
    let b = region_hist(h, axes, Region::B)?;
    let c = region_hist(h, axes, Region::C)?;
    let summed = present(&a, integration_axes);
    let factor = b.sum_axes(&summed)?.divide(&a.sum_axes(&summed)?)?;
    tracing::debug!(integrated = ?summed, "simple ABCD fake-rate factor");
    c.multiply(&factor)
}

/// Full extended ABCD from all eight control regions.
///
/// `D = B^2 C^2 Ax^2 Ay^2 / (A^4 Axy Bx Cy)`, exact when the yields factorize
/// in x and y. Bins with a vanishing denominator region are set to zero.
pub fn fake_hist_full(h: &Histogram, axes: &AbcdAxes) -> Result<Histogram> {
    const POWERS: [(Region, i32); 8] = [
        (Region::B, 2),
        (Region::C, 2),
        (Region::Ax, 2),
        (Region::Ay, 2),
        (Region::A, -4),
        (Region::Axy, -1),
        (Region::Bx, -1),
        (Region::Cy, -1),
    ];
    let regions: Vec<(Histogram, i32)> = POWERS
        .iter()
        .map(|&(r, n)| region_hist(h, axes, r).map(|hr| (hr, n)))
        .collect::<Result<_>>()?;
    let template = &regions[0].0;
    let size = template.raw_values().len();
    let mut values = vec![0.0; size];
    let mut variances = vec![0.0; size];
    for i in 0..size {
        let singular = regions
            .iter()
            .any(|(hr, n)| *n < 0 && hr.raw_values()[i].abs() < DIVIDE_CUTOFF);
        if singular {
            continue;
        }
        let d: f64 = regions.iter().map(|(hr, n)| hr.raw_values()[i].powi(*n)).product();
        let mut rel = 0.0;
        for (hr, n) in &regions {
            let v = hr.raw_values()[i];
            if v != 0.0 {
                rel += (*n as f64).powi(2) * hr.raw_variances()[i] / (v * v);
            }
        }
        values[i] = d;
        variances[i] = d * d * rel;
    }
    Histogram::from_parts(template.axes().to_vec(), values, variances)
}

/// Extended ABCD: the fake-rate factor is fitted as a polynomial in x.
///
/// For every bin of the remaining axes (after summing `integration_axes`),
/// the pass/fail ratio over the x bins below the signal window is fitted
/// with the given order (jointly with `smoothing` when set). The fit is
/// evaluated at each signal x bin center and applied to that bin's fail
/// yield; the signal x bins are then summed. The overflow bin uses the fit
/// at the last edge.
pub fn fake_hist_extended(
    h: &Histogram,
    axes: &AbcdAxes,
    order: usize,
    integration_axes: &[&str],
    smoothing: Option<&Smoothing>,
) -> Result<Histogram> {
    let x_axis = h.axis(&axes.x)?.clone();
    if !x_axis.is_continuous() {
        return Err(Error::Validation(format!(
            "extended ABCD needs a continuous x axis, '{}' is not",
            axes.x
        )));
    }
    let (Some(threshold), _) = window_range(&x_axis, Window::Signal)? else {
        return Err(Error::Validation("signal window has no lower edge".into()));
    };
    if let Some(s) = smoothing
        && integration_axes.contains(&s.axis.as_str())
    {
        return Err(Error::Validation(format!(
            "smoothing axis '{}' cannot also be integrated",
            s.axis
        )));
    }

    let pass = select_window(h, &axes.y, Window::Signal)?;
    let fail = select_window(h, &axes.y, Window::Sideband)?;
    let summed = present(&fail, integration_axes);
    let ratio = pass.sum_axes(&summed)?.divide(&fail.sum_axes(&summed)?)?;

    // fit axes last: [outer..., smoothing?, x]
    let mut fit_names: Vec<&str> = Vec::new();
    if let Some(s) = smoothing {
        ratio.axis_index(&s.axis)?;
        fit_names.push(&s.axis);
    }
    fit_names.push(&axes.x);
    let ratio = move_last(&ratio, &fit_names)?;
    let fail = move_last(&fail, &fit_names)?;

    let edges = x_axis.edges();
    let n_x = x_axis.n_bins();
    let x_off = x_axis.offset();
    let sideband: Vec<usize> = (0..n_x).filter(|&b| edges[b + 1] <= threshold + 1e-9).collect();
    // (storage index, evaluation point) of every x bin in the signal window
    let mut signal: Vec<(usize, f64)> = (0..n_x)
        .filter(|&b| edges[b] >= threshold - 1e-9)
        .map(|b| (b + x_off, 0.5 * (edges[b] + edges[b + 1])))
        .collect();
    if x_axis.has_flow() {
        signal.push((x_axis.extent() - 1, edges[n_x]));
    }

    let z_axis = smoothing.map(|s| ratio.axis(&s.axis)).transpose()?.cloned();
    let fits = fit_lanes(&ratio, &x_axis, z_axis.as_ref(), &sideband, order, smoothing)?;

    // output: fail with x removed (smoothing axis kept)
    let n_fail_axes = fail.rank();
    let out_axes: Vec<Axis> = fail.axes()[..n_fail_axes - 1].to_vec();
    let out_shape: Vec<usize> = out_axes.iter().map(Axis::extent).collect();
    let x_extent = x_axis.extent();
    let size: usize = out_shape.iter().product();

    // outer axes of the fits inside the output axes
    let n_fit_outer = ratio.rank() - 1 - usize::from(smoothing.is_some());
    let fit_outer: Vec<usize> = ratio.axes()[..n_fit_outer]
        .iter()
        .map(|a| {
            out_axes
                .iter()
                .position(|o| o.name == a.name)
                .ok_or_else(|| Error::MissingAxis(a.name.clone()))
        })
        .collect::<Result<_>>()?;
    let fit_shape: Vec<usize> = ratio.axes()[..n_fit_outer].iter().map(Axis::extent).collect();
    let z_pos = smoothing.map(|_| out_axes.len() - 1);

    let mut values = vec![0.0; size];
    let mut variances = vec![0.0; size];
    let mut idx = vec![0usize; out_shape.len()];
    for o in 0..size {
        let cur = idx.clone();
        increment(&mut idx, &out_shape);
        let fit_flat = fit_outer.iter().zip(&fit_shape).fold(0, |acc, (&p, n)| acc * n + cur[p]);
        let Some(fit) = &fits[fit_flat] else { continue };
        let z = match (z_pos, &z_axis) {
            (Some(p), Some(za)) => storage_center(za, cur[p]),
            _ => 0.0,
        };
        let lane = o * x_extent;
        let mut total = 0.0;
        let mut stat_var = 0.0;
        let mut grad = vec![0.0; fit.n_params()];
        for &(s, xc) in &signal {
            let c = fail.raw_values()[lane + s];
            let vc = fail.raw_variances()[lane + s];
            let f = fit.eval_2d(xc, z);
            total += c * f;
            stat_var += f * f * vc;
            for (g, b) in grad.iter_mut().zip(fit.basis(xc, z)) {
                *g += c * b;
            }
        }
        values[o] = total;
        variances[o] = stat_var + linear_error(&grad, &fit.cov).powi(2);
    }
    Histogram::from_parts(out_axes, values, variances)
}

/// Reorder so that `names` are the last axes, in the given order.
fn move_last(h: &Histogram, names: &[&str]) -> Result<Histogram> {
    let mut order: Vec<usize> =
        (0..h.rank()).filter(|&i| !names.contains(&h.axes()[i].name.as_str())).collect();
    for n in names {
        order.push(h.axis_index(n)?);
    }
    h.transpose(&order)
}

/// Bin center for a storage index; flow bins map to the nearest edge.
fn storage_center(axis: &Axis, storage: usize) -> f64 {
    let edges = axis.edges();
    let n = axis.n_bins();
    let off = axis.offset();
    if storage < off {
        edges[0]
    } else if storage - off >= n {
        edges[n]
    } else {
        let b = storage - off;
        0.5 * (edges[b] + edges[b + 1])
    }
}

/// One fit per storage bin of the outer axes of `ratio` (axes `[outer..., z?, x]`).
///
/// Lanes in a flow bin of an outer axis that cannot be fitted yield `None`.
fn fit_lanes(
    ratio: &Histogram,
    x_axis: &Axis,
    z_axis: Option<&Axis>,
    sideband: &[usize],
    order: usize,
    smoothing: Option<&Smoothing>,
) -> Result<Vec<Option<PolyFit>>> {
    let x_centers = x_axis.centers();
    let x_off = x_axis.offset();
    let x_extent = x_axis.extent();
    let z_bins: Vec<(usize, f64)> = match z_axis {
        Some(za) => za.centers().into_iter().enumerate().map(|(b, c)| (b + za.offset(), c)).collect(),
        None => vec![(0, 0.0)],
    };
    let z_extent = z_axis.map(Axis::extent).unwrap_or(1);
    let lane_len = z_extent * x_extent;
    let outer = &ratio.axes()[..ratio.rank() - 1 - usize::from(z_axis.is_some())];
    let outer_shape: Vec<usize> = outer.iter().map(Axis::extent).collect();
    let n_lanes: usize = outer_shape.iter().product();

    let mut fits = Vec::with_capacity(n_lanes);
    let mut idx = vec![0usize; outer_shape.len()];
    for lane in 0..n_lanes {
        let in_flow = outer
            .iter()
            .zip(&idx)
            .any(|(a, &i)| a.has_flow() && (i == 0 || i == a.extent() - 1));
        increment(&mut idx, &outer_shape);

        let mut xs = Vec::new();
        let mut zs = Vec::new();
        let mut ys = Vec::new();
        let mut vs = Vec::new();
        for &(zs_idx, zc) in &z_bins {
            for &b in sideband {
                let i = lane * lane_len + zs_idx * x_extent + b + x_off;
                xs.push(x_centers[b]);
                zs.push(zc);
                ys.push(ratio.raw_values()[i]);
                vs.push(ratio.raw_variances()[i]);
            }
        }
        let fit = match smoothing {
            Some(s) => poly::fit_weighted_2d(&xs, &zs, &ys, &vs, order, &s.orders),
            None => poly::fit_weighted(&xs, &ys, &vs, order),
        };
        match fit {
            Ok(f) => fits.push(Some(f)),
            Err(e) if in_flow => {
                tracing::debug!(lane, error = %e, "no fake-rate fit in flow bin");
                fits.push(None);
            }
            Err(e) => {
                return Err(Error::Computation(format!("fake-rate fit in lane {lane}: {e}")));
            }
        }
    }
    Ok(fits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regions::abcd_axes;
    use approx::assert_relative_eq;

    /// mt x iso x eta with yields `f(mt) * g(iso) * k(eta)`.
    fn factorizing(f: [f64; 4], g: [f64; 4], k: [f64; 2]) -> Histogram {
        let mut h = Histogram::new(vec![
            Axis::regular("eta", 2, -2.4, 2.4),
            Axis::variable("mt", vec![0.0, 20.0, 40.0, 60.0]),
            Axis::variable("iso", vec![0.0, 0.15, 0.3, 0.5]),
        ])
        .unwrap();
        for (ie, eta) in [-1.0, 1.0].iter().enumerate() {
            for (i, mt) in [10.0, 30.0, 50.0, 80.0].iter().enumerate() {
                for (j, iso) in [0.1, 0.2, 0.4, 0.9].iter().enumerate() {
                    h.fill(&[*eta, *mt, *iso], f[i] * g[j] * k[ie]).unwrap();
                }
            }
        }
        h
    }

    #[test]
    fn simple_abcd_on_two_by_two() {
        let mut h = Histogram::new(vec![Axis::boolean("passMT"), Axis::boolean("passIso")]).unwrap();
        h.fill(&[0.0, 0.0], 40.0).unwrap(); // A
        h.fill(&[0.0, 1.0], 10.0).unwrap(); // B
        h.fill(&[1.0, 0.0], 8.0).unwrap(); // C
        h.fill(&[1.0, 1.0], 3.0).unwrap(); // D
        let ax = abcd_axes(&h).unwrap();
        let d = fake_hist_simple(&h, &ax, &[]).unwrap();
        assert_relative_eq!(d.scalar_value().0, 8.0 * 10.0 / 40.0);
        // single entries: relative variance 1 per region, three regions
        assert_relative_eq!(d.scalar_value().1, 3.0 * 2.0 * 2.0, epsilon = 1e-9);
        assert_relative_eq!(signal_hist(&h, &ax).unwrap().scalar_value().0, 3.0);
    }

    #[test]
    fn simple_abcd_broadcasts_integrated_factor() {
        let h = factorizing([2.0, 4.0, 8.0, 1.0], [5.0, 3.0, 2.0, 1.0], [1.0, 3.0]);
        let ax = abcd_axes(&h).unwrap();
        let d = fake_hist_simple(&h, &ax, &["eta"]).unwrap();
        let truth = signal_hist(&h, &ax).unwrap();
        assert_eq!(d.axis_names(), vec!["eta"]);
        for (p, t) in d.values(false).iter().zip(truth.values(false)) {
            assert_relative_eq!(*p, t, epsilon = 1e-9);
        }
    }

    #[test]
    fn full_abcd_closes_for_factorizing_yields() {
        let h = factorizing([2.0, 4.0, 8.0, 1.0], [5.0, 3.0, 2.0, 1.0], [1.0, 3.0]);
        let ax = abcd_axes(&h).unwrap();
        let d = fake_hist_full(&h, &ax).unwrap();
        let truth = signal_hist(&h, &ax).unwrap();
        for (p, t) in d.values(false).iter().zip(truth.values(false)) {
            assert_relative_eq!(*p, t, max_relative = 1e-9);
        }
        assert!(d.variances(false).iter().all(|v| *v > 0.0));
    }

    #[test]
    fn full_abcd_zero_denominator_gives_zero() {
        let h = factorizing([0.0, 4.0, 8.0, 1.0], [5.0, 3.0, 2.0, 1.0], [1.0, 1.0]);
        let ax = abcd_axes(&h).unwrap();
        let d = fake_hist_full(&h, &ax).unwrap();
        assert!(d.values(true).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn extended_abcd_with_flat_rate_matches_simple() {
        // iso shape identical in every mt bin: the pass/fail ratio is flat in mt
        let h = factorizing([2.0, 4.0, 8.0, 1.0], [5.0, 3.0, 2.0, 1.0], [1.0, 3.0]);
        let ax = abcd_axes(&h).unwrap();
        let ext = fake_hist_extended(&h, &ax, 0, &[], None).unwrap();
        let truth = signal_hist(&h, &ax).unwrap();
        for (p, t) in ext.values(false).iter().zip(truth.values(false)) {
            assert_relative_eq!(*p, t, max_relative = 1e-9);
        }
        assert!(fake_hist_extended(&h, &ax, 0, &["eta"], Some(&Smoothing {
            axis: "eta".into(),
            orders: vec![0],
        }))
        .is_err());
    }

    #[test]
    fn extended_abcd_with_smoothing_runs_per_bin() {
        let h = factorizing([2.0, 4.0, 8.0, 1.0], [5.0, 3.0, 2.0, 1.0], [1.0, 3.0]);
        let ax = abcd_axes(&h).unwrap();
        let s = Smoothing { axis: "eta".into(), orders: vec![1] };
        let ext = fake_hist_extended(&h, &ax, 0, &[], Some(&s)).unwrap();
        assert_eq!(ext.axis_names(), vec!["eta"]);
        let truth = signal_hist(&h, &ax).unwrap();
        for (p, t) in ext.values(false).iter().zip(truth.values(false)) {
            assert_relative_eq!(*p, t, max_relative = 1e-9);
        }
    }
}
