//! Stacked data/prediction comparison with a ratio panel.

use std::collections::BTreeMap;

use abcd_core::{DIVIDE_CUTOFF, Error, Histogram, Result};
use abcd_groups::{Datagroups, Group, YieldRow, YieldTable};
use serde::{Deserialize, Serialize};

use crate::common::{BandEnvelope, Binned1D, BinnedSeries, finite_range};

/// Predicted yields of one fit stage, binned like the plotted observable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FitSnapshot {
    /// Yields per process.
    #[serde(default)]
    pub processes: BTreeMap<String, Vec<f64>>,
    /// Summed prediction.
    pub total: Vec<f64>,
    /// Variance of the summed prediction.
    pub total_variance: Vec<f64>,
}

/// Prefit and postfit predictions of an external fit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    /// Before the fit.
    pub prefit: FitSnapshot,
    /// After the fit.
    pub postfit: FitSnapshot,
}

impl FitResult {
    /// Parse the JSON form.
    pub fn from_json(text: &str) -> Result<Self> {
        let fr: Self = serde_json::from_str(text)?;
        for (stage, s) in [("prefit", &fr.prefit), ("postfit", &fr.postfit)] {
            if s.total.len() != s.total_variance.len() {
                return Err(Error::Validation(format!(
                    "{stage}: total has {} bins, total_variance has {}",
                    s.total.len(),
                    s.total_variance.len()
                )));
            }
        }
        Ok(fr)
    }

    /// The requested stage.
    pub fn snapshot(&self, prefit: bool) -> &FitSnapshot {
        if prefit { &self.prefit } else { &self.postfit }
    }
}

/// Plot options.
#[derive(Debug, Clone)]
pub struct StackOptions {
    /// Name of the loaded histogram to plot.
    pub hist_name: String,
    /// x axis title.
    pub x_label: String,
    /// Ratio range.
    pub rrange: [f64; 2],
    /// Divide yields by bin width times this.
    pub binwnorm: Option<f64>,
    /// Plot prediction over data instead of data over prediction.
    pub ratio_to_data: bool,
    /// Omit data.
    pub no_data: bool,
    /// Draw stacked processes as lines.
    pub no_fill: bool,
    /// Logarithmic y axis.
    pub logy: bool,
    /// Fixed y range.
    pub ylim: Option<[f64; 2]>,
    /// Headroom factor above the highest point.
    pub yscale: Option<f64>,
    /// Fixed x range.
    pub xlim: Option<[f64; 2]>,
    /// Draw errors on the ratio points.
    pub ratio_error: bool,
    /// Scale the prediction to the data yield.
    pub normalize_to_data: bool,
    /// Line styles of the unstacked curves, cycled.
    pub unstacked_linestyles: Vec<String>,
    /// Shade the envelope of the first this-many unstacked curves.
    pub fill_between: usize,
}

impl Default for StackOptions {
    fn default() -> Self {
        Self {
            hist_name: "nominal".into(),
            x_label: String::new(),
            rrange: [0.9, 1.1],
            binwnorm: Some(1.0),
            ratio_to_data: false,
            no_data: false,
            no_fill: false,
            logy: false,
            ylim: None,
            yscale: None,
            xlim: None,
            ratio_error: true,
            normalize_to_data: false,
            unstacked_linestyles: Vec::new(),
            fill_between: 0,
        }
    }
}

/// Everything needed to draw a stack plot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackArtifact {
    /// x axis title.
    pub x_label: String,
    /// y axis title.
    pub y_label: String,
    /// Ratio axis title.
    pub rlabel: String,
    /// Ratio range.
    pub rrange: [f64; 2],
    /// Bin edges.
    pub edges: Vec<f64>,
    /// Logarithmic y axis.
    pub logy: bool,
    /// y range.
    pub ylim: [f64; 2],
    /// x range, defaults to the edges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xlim: Option<[f64; 2]>,
    /// Integrated luminosity in fb⁻¹.
    pub lumi: f64,
    /// Draw stacked processes as lines.
    pub no_fill: bool,
    /// Stacked processes, bottom to top.
    pub stacked: Vec<BinnedSeries>,
    /// Curves drawn on top of the stack.
    pub unstacked: Vec<BinnedSeries>,
    /// Data points.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<BinnedSeries>,
    /// Prediction uncertainty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub band: Option<BandEnvelope>,
    /// Ratio points (data, or prediction with `ratio_to_data`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio: Option<BinnedSeries>,
    /// Unstacked curves in the ratio panel.
    pub ratio_unstacked: Vec<BinnedSeries>,
    /// Prediction uncertainty in the ratio panel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio_band: Option<BandEnvelope>,
    /// Shaded envelope of the leading unstacked curves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_between: Option<BandEnvelope>,
    /// Same envelope in the ratio panel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio_fill_between: Option<BandEnvelope>,
    /// Yields of stacked and unstacked processes.
    pub yields: Vec<YieldTable>,
}

struct Reduced {
    series: BinnedSeries,
    hist: Histogram,
}

fn reduce(
    g: &Group,
    name: &str,
    action: &dyn Fn(&Histogram) -> Result<Histogram>,
) -> Result<(Binned1D, Reduced)> {
    let h = action(g.hist(name)?)?;
    let b = Binned1D::from_hist(&h)?;
    let mut series = b.series(g.label.clone());
    series.color = Some(g.color.clone());
    Ok((b, Reduced { series, hist: h }))
}

fn safe_div(n: f64, d: f64) -> f64 {
    if d.abs() < DIVIDE_CUTOFF { 1.0 } else { n / d }
}

fn ratio_series(num: &BinnedSeries, den: &[f64], with_errors: bool) -> BinnedSeries {
    let values = num.values.iter().zip(den).map(|(n, d)| safe_div(*n, *d)).collect();
    let errors = num
        .errors
        .iter()
        .zip(den)
        .map(|(e, d)| if with_errors && d.abs() >= DIVIDE_CUTOFF { e / d.abs() } else { 0.0 })
        .collect();
    BinnedSeries { values, errors, ..num.clone() }
}

fn envelope(curves: &[BinnedSeries]) -> Option<BandEnvelope> {
    let first = curves.first()?;
    let mut lo = first.values.clone();
    let mut hi = first.values.clone();
    for c in &curves[1..] {
        for (i, v) in c.values.iter().enumerate() {
            lo[i] = lo[i].min(*v);
            hi[i] = hi[i].max(*v);
        }
    }
    Some(BandEnvelope { lo, hi })
}

fn check_bins(what: &str, got: usize, want: usize) -> Result<()> {
    if got == want {
        Ok(())
    } else {
        Err(Error::Validation(format!("{what} has {got} bins, plot has {want}")))
    }
}

impl StackArtifact {
    /// Build from loaded groups.
    ///
    /// `action` reduces every histogram to one axis. `stacked` lists group
    /// names bottom to top. With `fit`, stacked yields and the prediction
    /// band come from the snapshot instead of the histograms.
    pub fn build(
        groups: &Datagroups,
        stacked: &[String],
        unstacked: &[String],
        action: &dyn Fn(&Histogram) -> Result<Histogram>,
        fit: Option<&FitSnapshot>,
        opts: &StackOptions,
    ) -> Result<Self> {
        if opts.fill_between > unstacked.len() {
            return Err(Error::Validation(format!(
                "fill between {} curves requested, {} unstacked",
                opts.fill_between,
                unstacked.len()
            )));
        }
        let name = opts.hist_name.as_str();
        let mut edges: Option<Vec<f64>> = None;
        let mut take = |b: &Binned1D, what: &str| -> Result<()> {
            match &edges {
                None => edges = Some(b.edges.clone()),
                Some(e) => check_bins(what, b.values.len(), e.len() - 1)?,
            }
            Ok(())
        };

        let data = match groups.groups().iter().find(|g| g.is_data) {
            Some(g) if !opts.no_data => {
                let (b, r) = reduce(g, name, action)?;
                take(&b, &g.name)?;
                Some(r)
            }
            _ => None,
        };

        let mut stack = Vec::with_capacity(stacked.len());
        for n in stacked {
            let g = groups.group(n)?;
            let (b, mut r) = reduce(g, name, action)?;
            take(&b, n)?;
            if let Some(snap) = fit {
                match snap.processes.get(n) {
                    Some(y) => {
                        check_bins(&format!("fit yields of '{n}'"), y.len(), b.values.len())?;
                        r.series.values = y.clone();
                        r.series.errors = vec![0.0; y.len()];
                    }
                    None => tracing::warn!(process = %n, "no fitted yields, using the histogram"),
                }
            }
            stack.push(r);
        }

        let mut unstack = Vec::with_capacity(unstacked.len());
        for (i, n) in unstacked.iter().enumerate() {
            let g = groups.group(n)?;
            let (b, mut r) = reduce(g, name, action)?;
            take(&b, n)?;
            if !opts.unstacked_linestyles.is_empty() {
                let ls = &opts.unstacked_linestyles[i % opts.unstacked_linestyles.len()];
                r.series.linestyle = Some(ls.clone());
            }
            unstack.push(r);
        }

        let edges = edges.ok_or_else(|| Error::Validation("nothing to plot".into()))?;
        let n_bins = edges.len() - 1;

        let (mut total, mut total_var) = match fit {
            Some(snap) => {
                check_bins("fit total", snap.total.len(), n_bins)?;
                (snap.total.clone(), snap.total_variance.clone())
            }
            None => {
                let mut t = vec![0.0; n_bins];
                let mut v = vec![0.0; n_bins];
                for r in &stack {
                    for i in 0..n_bins {
                        t[i] += r.series.values[i];
                        v[i] += r.series.errors[i] * r.series.errors[i];
                    }
                }
                (t, v)
            }
        };

        if opts.normalize_to_data {
            match &data {
                Some(d) => {
                    let pred: f64 = total.iter().sum();
                    let obs: f64 = d.series.values.iter().sum();
                    if pred.abs() >= DIVIDE_CUTOFF {
                        let k = obs / pred;
                        tracing::info!(scale = k, "normalizing prediction to data");
                        for r in &mut stack {
                            r.series.values.iter_mut().for_each(|v| *v *= k);
                            r.series.errors.iter_mut().for_each(|e| *e *= k);
                        }
                        total.iter_mut().for_each(|v| *v *= k);
                        total_var.iter_mut().for_each(|v| *v *= k * k);
                    }
                }
                None => tracing::warn!("no data to normalize to"),
            }
        }

        let total_err: Vec<f64> = total_var.iter().map(|v| v.max(0.0).sqrt()).collect();
        let has_pred = !stack.is_empty() || fit.is_some();
        let pred = BinnedSeries {
            label: "Pred.".into(),
            color: None,
            linestyle: None,
            values: total.clone(),
            errors: total_err.clone(),
        };

        let unstacked_series: Vec<BinnedSeries> = unstack.iter().map(|r| r.series.clone()).collect();
        let (ratio, ratio_unstacked, ratio_band, rlabel) = if opts.ratio_to_data {
            let d = data.as_ref().ok_or_else(|| {
                Error::Validation("ratio to data requested without data".into())
            })?;
            let den = &d.series.values;
            let ratio = has_pred.then(|| ratio_series(&pred, den, opts.ratio_error));
            let ru: Vec<BinnedSeries> =
                unstacked_series.iter().map(|u| ratio_series(u, den, false)).collect();
            let band = has_pred.then(|| {
                let r = ratio_series(&pred, den, true);
                BandEnvelope::symmetric(&r.values, &r.errors)
            });
            (ratio, ru, band, "Pred./Data".to_string())
        } else {
            let ratio = data.as_ref().map(|d| ratio_series(&d.series, &total, opts.ratio_error));
            let ru: Vec<BinnedSeries> =
                unstacked_series.iter().map(|u| ratio_series(u, &total, false)).collect();
            let band = has_pred.then(|| {
                let r = ratio_series(&pred, &total, true);
                BandEnvelope::symmetric(&vec![1.0; n_bins], &r.errors)
            });
            (ratio, ru, band, "Data/Pred.".to_string())
        };

        let fill_between = envelope(&unstacked_series[..opts.fill_between]);
        let ratio_fill_between = envelope(&ratio_unstacked[..opts.fill_between]);

        let mut yields = Vec::new();
        let norm = data.as_ref().map(|d| YieldRow::from_hist(&d.series.label, &d.hist));
        let mut st = YieldTable::new("Stacked processes");
        for (n, r) in stacked.iter().zip(&stack) {
            st.push(YieldRow::from_hist(n, &r.hist));
        }
        let mut st = st.with_total("Total");
        if let Some(d) = &norm {
            st.push(YieldRow { process: "Data".into(), ..d.clone() });
            st = st.with_fractions(d.value);
        }
        yields.push(st);
        let mut ut = YieldTable::new("Unstacked processes");
        for (n, r) in unstacked.iter().zip(&unstack) {
            ut.push(YieldRow::from_hist(n, &r.hist));
        }
        if let Some(d) = &norm {
            ut = ut.with_fractions(d.value);
        }
        yields.push(ut);

        // everything below is drawn per unit bin width
        let scale: Vec<f64> = match opts.binwnorm {
            Some(w) => edges.windows(2).map(|e| w / (e[1] - e[0])).collect(),
            None => vec![1.0; n_bins],
        };
        let per_width = |v: &mut Vec<f64>| v.iter_mut().zip(&scale).for_each(|(x, s)| *x *= s);
        let per_width_series = |s: &mut BinnedSeries| {
            per_width(&mut s.values);
            per_width(&mut s.errors);
        };
        let mut stacked_series: Vec<BinnedSeries> = stack.into_iter().map(|r| r.series).collect();
        stacked_series.iter_mut().for_each(per_width_series);
        let mut unstacked_series = unstacked_series;
        unstacked_series.iter_mut().for_each(per_width_series);
        let mut data_series = data.map(|d| d.series);
        if let Some(d) = &mut data_series {
            per_width_series(d);
        }
        let band = has_pred.then(|| {
            let mut b = BandEnvelope::symmetric(&total, &total_err);
            per_width(&mut b.lo);
            per_width(&mut b.hi);
            b
        });
        let fill_between = fill_between.map(|mut b| {
            per_width(&mut b.lo);
            per_width(&mut b.hi);
            b
        });

        let ylim = match opts.ylim {
            Some(l) => l,
            None => {
                let tops = band
                    .iter()
                    .flat_map(|b| b.hi.iter().copied())
                    .chain(data_series.iter().flat_map(|d| d.values.iter().zip(&d.errors).map(|(v, e)| v + e)))
                    .chain(unstacked_series.iter().flat_map(|u| u.values.iter().copied()));
                let (lo, hi) = finite_range(tops).unwrap_or((0.0, 1.0));
                if opts.logy {
                    let min_pos = stacked_series
                        .iter()
                        .flat_map(|s| s.values.iter().copied())
                        .filter(|v| *v > 0.0)
                        .fold(f64::INFINITY, f64::min);
                    let lo = if min_pos.is_finite() { min_pos * 0.5 } else { lo.max(1e-3) };
                    [lo, hi.max(lo * 10.0) * opts.yscale.unwrap_or(100.0)]
                } else {
                    [0.0, hi.max(f64::MIN_POSITIVE) * opts.yscale.unwrap_or(1.3)]
                }
            }
        };

        tracing::debug!(
            bins = n_bins,
            stacked = stacked_series.len(),
            unstacked = unstacked_series.len(),
            data = data_series.is_some(),
            "stack plot assembled"
        );
        Ok(Self {
            x_label: opts.x_label.clone(),
            y_label: if opts.binwnorm.is_some() { "Events/bin".into() } else { "Events".into() },
            rlabel,
            rrange: opts.rrange,
            edges,
            logy: opts.logy,
            ylim,
            xlim: opts.xlim,
            lumi: groups.lumi(),
            no_fill: opts.no_fill,
            stacked: stacked_series,
            unstacked: unstacked_series,
            data: data_series,
            band,
            ratio,
            ratio_unstacked,
            ratio_band,
            fill_between,
            ratio_fill_between,
            yields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abcd_core::{Axis, DatasetEntry, HistContainer, Meta};
    use abcd_groups::{Selection, Styles, Variation};
    use approx::assert_relative_eq;

    fn hist(values: &[f64]) -> Histogram {
        let mut h = Histogram::new(vec![Axis::variable("pt", vec![26.0, 36.0, 56.0])]).unwrap();
        for (i, v) in values.iter().enumerate() {
            h.set_bin(&[i], *v, *v).unwrap();
        }
        h
    }

    fn groups() -> Datagroups {
        let mut c = HistContainer {
            meta: Meta { mode: Some("wmass".into()), lumi: Some(16.8), ..Meta::default() },
            datasets: BTreeMap::new(),
        };
        let mut add = |name: &str, group: &str, is_data: bool, nominal: &[f64], up: Option<&[f64]>| {
            let mut hists = BTreeMap::new();
            hists.insert("nominal".to_string(), hist(nominal));
            if let Some(up) = up {
                hists.insert("syst".to_string(), hist(up));
            }
            c.datasets.insert(name.into(), DatasetEntry { is_data, group: group.into(), scale: 1.0, hists });
        };
        add("SingleMuon", "Data", true, &[120.0, 60.0], None);
        add("WplusmunuPostVFP", "Wmunu", false, &[80.0, 40.0], Some(&[88.0, 44.0]));
        add("ZmumuPostVFP", "Zmumu", false, &[20.0, 10.0], Some(&[20.0, 10.0]));
        let mut dg = Datagroups::new(c, Styles::default(), None, &["Fake"]).unwrap();
        dg.set_selection(Selection::None);
        dg.load_hists("nominal", "nominal").unwrap();
        dg
    }

    fn identity(h: &Histogram) -> Result<Histogram> {
        Ok(h.clone())
    }

    #[test]
    fn data_over_prediction() {
        let dg = groups();
        let stacked = vec!["Zmumu".to_string(), "Wmunu".to_string()];
        let opts = StackOptions { binwnorm: None, ..StackOptions::default() };
        let a = StackArtifact::build(&dg, &stacked, &[], &identity, None, &opts).unwrap();
        assert_eq!(a.rlabel, "Data/Pred.");
        assert_eq!(a.stacked[1].label, dg.styles().label("Wmunu"));
        let r = a.ratio.unwrap();
        assert_relative_eq!(r.values[0], 1.2, epsilon = 1e-12);
        assert_relative_eq!(r.errors[0], 120f64.sqrt() / 100.0, epsilon = 1e-12);
        assert_relative_eq!(a.ratio_band.unwrap().hi[0], 1.0 + 10.0 / 100.0, epsilon = 1e-12);
        assert_relative_eq!(a.lumi, 16.8);
        let st = &a.yields[0];
        assert_relative_eq!(st.row("Total").unwrap().value, 150.0);
        assert_relative_eq!(st.row("Wmunu").unwrap().fraction.unwrap(), 120.0 / 180.0, epsilon = 1e-12);
    }

    #[test]
    fn bin_width_normalisation_and_data_scaling() {
        let dg = groups();
        let stacked = vec!["Zmumu".to_string(), "Wmunu".to_string()];
        let opts = StackOptions { normalize_to_data: true, ..StackOptions::default() };
        let a = StackArtifact::build(&dg, &stacked, &[], &identity, None, &opts).unwrap();
        // scaled by 180 / 150, divided by the 10 GeV width
        assert_relative_eq!(a.stacked[1].values[0], 80.0 * 1.2 / 10.0, epsilon = 1e-12);
        assert_relative_eq!(a.data.as_ref().unwrap().values[1], 60.0 / 20.0, epsilon = 1e-12);
        assert_relative_eq!(a.ratio.unwrap().values[0], 1.0, epsilon = 1e-12);
        assert!(a.ylim[1] > 12.0);
    }

    #[test]
    fn variations_and_fill_between() {
        let mut dg = groups();
        let var = Variation {
            hist_name: "syst".into(),
            name: "systUp".into(),
            label: "syst. up".into(),
            color: "#FF0000".into(),
            select: None,
        };
        dg.add_summed_variation(&var, "nominal", "nominal", &[]).unwrap();
        let stacked = vec!["Zmumu".to_string(), "Wmunu".to_string()];
        let unstacked = vec!["systUp".to_string()];
        let opts = StackOptions {
            binwnorm: None,
            fill_between: 1,
            unstacked_linestyles: vec!["--".into()],
            ..StackOptions::default()
        };
        let a = StackArtifact::build(&dg, &stacked, &unstacked, &identity, None, &opts).unwrap();
        assert_eq!(a.unstacked[0].linestyle.as_deref(), Some("--"));
        assert_relative_eq!(a.ratio_unstacked[0].values[0], 108.0 / 100.0, epsilon = 1e-12);
        assert_eq!(a.fill_between.unwrap().hi, vec![108.0, 54.0]);
        assert_eq!(a.yields[1].rows.len(), 1);

        let too_many = StackOptions { fill_between: 2, ..opts };
        assert!(StackArtifact::build(&dg, &stacked, &unstacked, &identity, None, &too_many).is_err());
    }

    #[test]
    fn fit_snapshot_replaces_prediction() {
        let dg = groups();
        let fr = FitResult::from_json(
            r#"{
                "prefit": {"processes": {}, "total": [100.0, 50.0], "total_variance": [4.0, 1.0]},
                "postfit": {"processes": {"Wmunu": [95.0, 47.0]}, "total": [118.0, 59.0], "total_variance": [9.0, 4.0]}
            }"#,
        )
        .unwrap();
        let stacked = vec!["Zmumu".to_string(), "Wmunu".to_string()];
        let opts = StackOptions { binwnorm: None, ratio_to_data: true, ..StackOptions::default() };
        let a = StackArtifact::build(&dg, &stacked, &[], &identity, Some(fr.snapshot(false)), &opts).unwrap();
        assert_eq!(a.stacked[1].values, vec![95.0, 47.0]);
        assert_eq!(a.rlabel, "Pred./Data");
        let band = a.band.unwrap();
        assert_relative_eq!(band.hi[0], 121.0);
        assert_relative_eq!(a.ratio.unwrap().values[1], 59.0 / 60.0, epsilon = 1e-12);

        let bad = FitResult::from_json(r#"{"prefit": {"total": [1.0], "total_variance": []}, "postfit": {"total": [], "total_variance": []}}"#);
        assert!(bad.is_err());
    }
}
