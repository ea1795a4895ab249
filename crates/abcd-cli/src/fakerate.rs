//! `abcd fakerate`: fake-rate fits in the ABCD sideband and their validation plots.
//!
//! For every requested group the command writes
//! - `{proc}_closureABCD`: signal selection against the simple and full ABCD estimates,
//! - `distributions_sideband/plot_sideband_{region}_charge{c}_eta{e}`: pT spectra of the
//!   eight control regions with exponential fits,
//! - `{proc}_chi2`: chi-square of all fake-rate fits,
//! - `plots_2D_{proc}/` and `plots_1D_{proc}/`: fitted coefficients per detector bin,
//! - `plots_{x}_{proc}/fit_charge{c}_eta{e}_pt{p}`: pass/fail ratio with the fitted curve.

use anyhow::{Context, Result, bail};
use clap::Args;
use serde::Serialize;
use std::path::{Path, PathBuf};

use abcd_core::{HistContainer, Histogram};
use abcd_fit::ParamGrid;
use abcd_groups::{Datagroups, RebinAction, Selection};
use abcd_select::regions::{AbcdAxes, X_AXES, Y_AXES};
use abcd_select::{
    Region, Smoothing, compute_fakerate, fake_hist_full, fake_hist_simple, fakerate_hist,
    region_hist, signal_hist,
};
use abcd_viz::common::round_to;
use abcd_viz::params::{PARAM_NAMES, param_zlim, range_label};
use abcd_viz::sideband::charge_eta_label;
use abcd_viz::{
    Chi2Artifact, ClosureArtifact, ClosureInput, CurveInput, FakerateCurveArtifact,
    ParamMapArtifact, ParamScanArtifact, SidebandFitArtifact,
};
use abcd_viz_render::color::palette_colors;

use crate::output::{PlotContext, save_pdf_and_png, write_index, write_index_and_log};

/// Axes every fake-rate histogram must carry besides the ABCD axes.
const DETECTOR_AXES: [&str; 3] = ["eta", "pt", "charge"];

/// The only axis the joint fit can smooth along; the plots evaluate it at pt bin centers.
const SMOOTHING_AXIS: &str = "pt";

/// Chi-square range of the fit-quality plot.
const CHI2_XLIM: (f64, f64) = (0.0, 10.0);

/// Colors of the processes in the summary plot.
const SUMMARY_COLORS: [&str; 4] = ["#000000", "#FF0000", "#0000FF", "#008000"];

#[derive(Args, Debug, Clone, Serialize)]
pub struct FakerateArgs {
    /// Histogram container (.json or .json.gz)
    pub infile: PathBuf,

    /// Histogram name in the file
    #[arg(short = 'n', long, default_value = "nominal")]
    pub base_name: String,

    /// Groups to process
    #[arg(long, num_args = 1.., default_values = ["Fake", "QCD"])]
    pub proc_filters: Vec<String>,

    /// Variables the rebinning options refer to
    #[arg(long, num_args = 0.., default_values = ["eta", "pt", "charge"])]
    pub vars: Vec<String>,

    /// Merge this many bins, per variable
    #[arg(long, num_args = 0..)]
    pub rebin: Vec<usize>,

    /// Fold to |x| if 1, per variable
    #[arg(long, num_args = 0..)]
    pub absval: Vec<u8>,

    /// Restrict to [lo, hi), pairs per variable
    #[arg(long, num_args = 0.., allow_negative_numbers = true)]
    pub axlim: Vec<f64>,

    /// Ratio panel range
    #[arg(long, num_args = 2, default_values_t = [0.25, 1.75])]
    pub rrange: Vec<f64>,

    /// x axis of the ABCD plane
    #[arg(long, default_value = "mt")]
    pub x_axis_name: String,

    /// x edges of the fitted sideband
    #[arg(long, num_args = 1.., default_values_t = [0.0, 2.0, 5.0, 9.0, 14.0, 20.0, 27.0, 40.0])]
    pub x_bins_sideband: Vec<f64>,

    /// x edges of the signal region
    #[arg(long, num_args = 1.., default_values_t = [50.0, 70.0, 120.0])]
    pub x_bins_signal: Vec<f64>,

    /// Polynomial order of the fake-rate factor in x
    #[arg(long, default_value_t = 2)]
    pub x_order: usize,

    /// y axis of the ABCD plane
    #[arg(long, default_value = "iso")]
    pub y_axis_name: String,

    /// y edges of the sideband
    #[arg(long, num_args = 1.., default_values_t = [0.15, 0.2, 0.25, 0.3])]
    pub y_bins_sideband: Vec<f64>,

    /// y edges of the signal region
    #[arg(long, num_args = 1.., default_values_t = [0.0, 0.15])]
    pub y_bins_signal: Vec<f64>,

    /// Polynomial order in y (recorded in the logs, y is not extrapolated)
    #[arg(long, default_value_t = 2)]
    pub y_order: usize,

    /// Fit the fake-rate factor jointly in this axis (only pt)
    #[arg(long)]
    pub smoothing_axis_name: Option<String>,

    /// Order in the smoothing axis, one per power of x
    #[arg(long, num_args = 1.., default_values_t = [2, 1, 0])]
    pub smoothing_order: Vec<usize>,
}

impl FakerateArgs {
    fn smoothing(&self) -> Option<Smoothing> {
        self.smoothing_axis_name
            .as_ref()
            .map(|axis| Smoothing { axis: axis.clone(), orders: self.smoothing_order.clone() })
    }

    fn abseta(&self) -> bool {
        self.vars
            .iter()
            .position(|v| v == "eta")
            .and_then(|i| self.absval.get(i))
            .is_some_and(|&a| a != 0)
    }

    /// x edges of the far sideband, sideband and signal windows.
    ///
    /// The far sideband ends at the sideband edge closest to the middle of
    /// the fitted range; the signal window starts where the fit stops.
    fn x_region_edges(&self) -> [f64; 3] {
        let sb = &self.x_bins_sideband;
        let (lo, hi) = (sb[0], sb[sb.len() - 1]);
        let mid = 0.5 * (lo + hi);
        let split = sb[1..sb.len() - 1]
            .iter()
            .copied()
            .min_by(|a, b| (a - mid).abs().total_cmp(&(b - mid).abs()))
            .unwrap_or(mid);
        [lo, split, hi]
    }

    /// y edges of the signal, sideband and far sideband windows.
    fn y_region_edges(&self) -> [f64; 3] {
        let sig = &self.y_bins_signal;
        let sb = &self.y_bins_sideband;
        [sig[0], sig[sig.len() - 1], sb[sb.len() - 1]]
    }

    fn x_bins_all(&self) -> Vec<f64> {
        self.x_bins_sideband.iter().chain(&self.x_bins_signal).copied().collect()
    }
}

fn increasing(v: &[f64]) -> bool {
    v.windows(2).all(|w| w[1] > w[0])
}

fn validate(args: &FakerateArgs) -> Result<()> {
    if !X_AXES.contains(&args.x_axis_name.as_str()) {
        bail!("--x-axis-name must be one of {:?}, got '{}'", X_AXES, args.x_axis_name);
    }
    if !Y_AXES.contains(&args.y_axis_name.as_str()) {
        bail!("--y-axis-name must be one of {:?}, got '{}'", Y_AXES, args.y_axis_name);
    }
    if args.x_bins_sideband.len() < 3 || !increasing(&args.x_bins_sideband) {
        bail!("--x-bins-sideband needs at least 3 increasing edges, got {:?}", args.x_bins_sideband);
    }
    if !increasing(&args.x_bins_all()) {
        bail!(
            "--x-bins-signal {:?} must continue --x-bins-sideband {:?} in increasing order",
            args.x_bins_signal,
            args.x_bins_sideband
        );
    }
    if args.y_bins_signal.len() < 2 || args.y_bins_sideband.is_empty() || !increasing(&args.y_region_edges()) {
        bail!(
            "--y-bins-signal {:?} and --y-bins-sideband {:?} must give increasing region edges",
            args.y_bins_signal,
            args.y_bins_sideband
        );
    }
    if args.axlim.len() % 2 != 0 {
        bail!("--axlim needs pairs of values, got {}", args.axlim.len());
    }
    if args.x_order >= args.x_bins_sideband.len() - 1 {
        bail!(
            "x order {} needs more than {} sideband bins",
            args.x_order,
            args.x_bins_sideband.len() - 1
        );
    }
    if let Some(axis) = &args.smoothing_axis_name
        && axis.as_str() != SMOOTHING_AXIS
    {
        bail!("--smoothing-axis-name only supports '{SMOOTHING_AXIS}', got '{axis}'");
    }
    if args.smoothing_axis_name.is_some() && args.smoothing_order.len() <= args.x_order {
        bail!(
            "--smoothing-order needs one order per power of x up to {}, got {:?}",
            args.x_order,
            args.smoothing_order
        );
    }
    Ok(())
}

/// Sum axes outside the ABCD plane and the detector bins, merge y onto its region edges.
fn prepare(h: &Histogram, args: &FakerateArgs) -> Result<Histogram> {
    let mut needed = vec![args.x_axis_name.as_str(), args.y_axis_name.as_str()];
    needed.extend(DETECTOR_AXES);
    if let Some(missing) = needed.iter().find(|n| !h.has_axis(n)) {
        bail!("histogram needs axes {:?}, '{}' is missing (has {:?})", needed, missing, h.axis_names());
    }
    let extra: Vec<String> = h
        .axis_names()
        .into_iter()
        .filter(|n| !needed.contains(n))
        .map(str::to_string)
        .collect();
    let mut h = h.clone();
    if !extra.is_empty() {
        tracing::info!(axes = ?extra, "summing axes not used for the fake rate");
        let names: Vec<&str> = extra.iter().map(String::as_str).collect();
        h = h.sum_axes(&names)?;
    }
    if h.axis(&args.y_axis_name)?.is_continuous() {
        h = h.rebin_edges(&args.y_axis_name, &args.y_region_edges())?;
    }
    Ok(h)
}

/// Fit-grid multi-index from named bins.
fn grid_bins(grid: &ParamGrid, bins: &[(&str, usize)]) -> Result<Vec<usize>> {
    grid.axes
        .iter()
        .map(|a| {
            bins.iter()
                .find(|(n, _)| *n == a.name)
                .map(|&(_, i)| i)
                .with_context(|| format!("no bin given for fit axis '{}'", a.name))
        })
        .collect()
}

fn superscript_sign(n_charges: usize, idx: usize) -> &'static str {
    if n_charges == 1 {
        "\u{00B1}"
    } else if idx == 0 {
        "\u{207B}"
    } else {
        "\u{207A}"
    }
}

fn plain_sign(n_charges: usize, idx: usize) -> &'static str {
    if n_charges == 1 {
        ""
    } else if idx == 0 {
        "-"
    } else {
        "+"
    }
}

/// `QCD⁺ → μ⁺ν`
fn process_title(proc: &str, sign: &str) -> String {
    format!("{proc}{sign} \u{2192} \u{03BC}{sign}\u{03BD}")
}

fn eta_symbol(abseta: bool) -> &'static str {
    if abseta { "|\u{03B7}|" } else { "\u{03B7}" }
}

/// `26 < pT < 30 ; 0.0 < |η| < 0.4`
fn region_label(pt: (f64, f64), eta: (f64, f64), abseta: bool) -> String {
    format!(
        "{} < p\u{1D1B} < {} ; {} < {} < {}",
        pt.0.round(),
        pt.1.round(),
        round_to(eta.0, 1),
        eta_symbol(abseta),
        round_to(eta.1, 2)
    )
}

struct ProcFit {
    name: String,
    /// Histogram in the sideband and signal x binning.
    hist: Histogram,
    grid: ParamGrid,
}

pub fn run(ctx: &PlotContext, args: &FakerateArgs) -> Result<()> {
    validate(args)?;
    let container = HistContainer::load(&args.infile)
        .with_context(|| format!("loading {}", args.infile.display()))?;
    let mut groups = Datagroups::new(container, ctx.styles.clone(), Some(args.proc_filters.as_slice()), &[])?;
    groups.set_selection(Selection::None);
    let rebin = RebinAction {
        vars: args.vars.clone(),
        axlim: args.axlim.clone(),
        rebin: args.rebin.clone(),
        absval: args.absval.iter().map(|&a| a != 0).collect(),
    };
    groups.set_rebin_action(rebin, false)?;
    tracing::info!("load fakes");
    groups.load_hists(&args.base_name, &args.base_name)?;

    let outdir = ctx.plot_dir("")?;
    let smoothing = args.smoothing();
    let axes = AbcdAxes { x: args.x_axis_name.clone(), y: args.y_axis_name.clone() };
    tracing::debug!(y_order = args.y_order, "fake-rate options");

    let mut fits = Vec::new();
    for proc in &args.proc_filters {
        let group = groups.group(proc).with_context(|| format!("--proc-filters asks for '{proc}'"))?;
        let h = prepare(group.hist(&args.base_name)?, args)?;
        let h_regions = h.rebin_edges(&args.x_axis_name, &args.x_region_edges())?;

        plot_closure(ctx, args, &outdir, proc, &h_regions, &axes)?;
        write_index_and_log(
            ctx,
            &outdir,
            &ctx.outfile(&format!("{proc}_closureABCD")),
            &args.infile,
            groups.meta(),
            &[],
        )?;

        let dir = ctx.plot_dir("distributions_sideband")?;
        plot_sidebands(ctx, &dir, &h_regions, &axes)?;

        let h_low = h.rebin_edges(&args.x_axis_name, &args.x_bins_sideband)?;
        let grid = compute_fakerate(&h_low, &args.x_axis_name, args.x_order, smoothing.as_ref())?;

        let chi2 = Chi2Artifact::from_values(
            ctx.styles.label(proc),
            &grid.chi2_values(),
            grid.ndf(),
            Some(CHI2_XLIM),
        )?;
        let name = ctx.outfile(&format!("{proc}_chi2"));
        save_pdf_and_png(ctx, &outdir, &name, "chi2", &chi2)?;
        write_index_and_log(ctx, &outdir, &name, &args.infile, groups.meta(), &[])?;

        if smoothing.is_some() {
            plot_smoothed_params(ctx, args, proc, &grid)?;
        } else {
            plot_params(ctx, args, proc, &h_low, &grid)?;
        }

        let h_x = h.rebin_edges(&args.x_axis_name, &args.x_bins_all())?;
        let dir = ctx.plot_dir(&format!("plots_{}_{}", args.x_axis_name, proc))?;
        let fit = ProcFit { name: proc.clone(), hist: h_x, grid };
        plot_x_axis(ctx, args, &dir, &[&fit], &[SUMMARY_COLORS[0]], proc)?;
        fits.push(fit);
    }

    if fits.len() > 1 {
        let names: Vec<&str> = fits.iter().map(|f| f.name.as_str()).collect();
        let dir = ctx.plot_dir(&format!("plots_{}_{}", args.x_axis_name, names.join("_")))?;
        let refs: Vec<&ProcFit> = fits.iter().collect();
        let colors: Vec<&str> =
            (0..fits.len()).map(|i| SUMMARY_COLORS[i % SUMMARY_COLORS.len()]).collect();
        plot_x_axis(ctx, args, &dir, &refs, &colors, &names.join(", "))?;
    }
    tracing::info!(processes = fits.len(), "fake-rate plots done");
    Ok(())
}

fn plot_closure(
    ctx: &PlotContext,
    args: &FakerateArgs,
    outdir: &Path,
    proc: &str,
    h: &Histogram,
    axes: &AbcdAxes,
) -> Result<()> {
    let int_axes: Vec<&str> =
        DETECTOR_AXES.into_iter().filter(|a| !args.vars.iter().any(|v| v == a)).collect();
    let colors = palette_colors("tab10");
    let color = |i: usize| colors[i % colors.len()].to_hex();

    let signal = signal_hist(h, axes)?;
    let mut inputs = vec![
        ClosureInput { label: "D".into(), color: color(0), hist: signal.clone() },
        ClosureInput {
            label: "simple".into(),
            color: color(1),
            hist: fake_hist_simple(h, axes, &int_axes)?,
        },
    ];
    if h.axis(&axes.x)?.is_continuous() && h.axis(&axes.y)?.is_continuous() {
        inputs.push(ClosureInput { label: "full".into(), color: color(2), hist: fake_hist_full(h, axes)? });
    } else {
        tracing::warn!(process = %proc, "boolean ABCD axis, no full ABCD estimate");
    }

    let mut names: Vec<&str> = signal.axis_names();
    if let Ok(ch) = signal.axis("charge")
        && ch.n_bins() == 1
    {
        names.retain(|n| *n != "charge");
    }
    let x_label = match names.as_slice() {
        [one] => ctx.styles.xlabel(one).to_string(),
        many => format!("{} bin", many.join("-")),
    };
    let mut artifact = ClosureArtifact::build(
        ctx.styles.label(proc),
        x_label,
        [args.rrange[0], args.rrange[1]],
        &inputs,
    )?;
    artifact.y_label = "a.u.".into();
    save_pdf_and_png(ctx, outdir, &ctx.outfile(&format!("{proc}_closureABCD")), "closure", &artifact)
}

fn plot_sidebands(
    ctx: &PlotContext,
    dir: &Path,
    h: &Histogram,
    axes: &AbcdAxes,
) -> Result<()> {
    if !h.axis(&axes.x)?.is_continuous() || !h.axis(&axes.y)?.is_continuous() {
        tracing::warn!("boolean ABCD axis, no far sidebands to plot");
        return Ok(());
    }
    let charge = h.axis("charge")?.clone();
    let eta = h.axis("eta")?.clone();
    let pt_label = ctx.styles.xlabel("pt");
    for c in 0..charge.n_bins() {
        let (clo, chi) = charge.bin_bounds(c);
        for e in 0..eta.n_bins() {
            let hb = h.select("charge", c)?.select("eta", e)?;
            let label = charge_eta_label(0.5 * (clo + chi), eta.bin_bounds(e));
            for region in Region::SIDEBANDS {
                let hr = region_hist(&hb, axes, region)?.project(&["pt"])?;
                let artifact = SidebandFitArtifact::fit(&hr, region.to_string(), label.clone(), pt_label)
                    .with_context(|| format!("sideband fit in region {region}, charge bin {c}, eta bin {e}"))?;
                let name = ctx.outfile(&format!("plot_sideband_{}_charge{c}_eta{e}", region.tag()));
                save_pdf_and_png(ctx, dir, &name, "sideband_fit", &artifact)?;
            }
        }
    }
    write_index(dir)
}

fn plot_params(
    ctx: &PlotContext,
    args: &FakerateArgs,
    proc: &str,
    h_low: &Histogram,
    grid: &ParamGrid,
) -> Result<()> {
    let dir_2d = ctx.plot_dir(&format!("plots_2D_{proc}"))?;
    let dir_1d = ctx.plot_dir(&format!("plots_1D_{proc}"))?;
    let abseta = args.abseta();
    let eta_name = if abseta { "abseta" } else { "eta" };
    let eta_label = ctx.styles.xlabel(eta_name);
    let pt_label = ctx.styles.xlabel("pt");

    // same fits with one detector axis summed, for the averages
    let grid_pt = compute_fakerate(&h_low.sum_axis("eta")?, &args.x_axis_name, args.x_order, None)?;
    let grid_eta = compute_fakerate(&h_low.sum_axis("pt")?, &args.x_axis_name, args.x_order, None)?;

    let charge = grid.axes[grid.axis_index("charge")?].clone();
    let eta = grid.axes[grid.axis_index("eta")?].clone();
    let pt = grid.axes[grid.axis_index("pt")?].clone();
    let n_params = grid.n_params().min(PARAM_NAMES.len());

    for c in 0..charge.n_bins() {
        tracing::info!(charge = c, "parameter validation plots");
        let sign = plain_sign(charge.n_bins(), c);
        for (ip, p_name) in PARAM_NAMES.iter().enumerate().take(n_params) {
            let fixed = [("charge", c)];
            let map = ParamMapArtifact::from_grid(
                grid,
                ip,
                "eta",
                "pt",
                &fixed,
                false,
                format!("{p_name}{sign}"),
                (eta_label, pt_label),
            )?
            .with_zlim(param_zlim(ip));
            save_pdf_and_png(ctx, &dir_2d, &ctx.outfile(&format!("{p_name}_{c}")), "param_map", &map)?;
            let unc = ParamMapArtifact::from_grid(
                grid,
                ip,
                "eta",
                "pt",
                &fixed,
                true,
                format!("\u{0394} {p_name}{sign}"),
                (eta_label, pt_label),
            )?;
            save_pdf_and_png(ctx, &dir_2d, &ctx.outfile(&format!("unc_{p_name}_{c}")), "param_map", &unc)?;

            let dir_eta = ctx.plot_dir(&format!("plots_1D_{proc}/{p_name}_eta"))?;
            for e in 0..eta.n_bins() {
                let (lo, hi) = eta.bin_bounds(e);
                let fixed = [("eta", e), ("charge", c)];
                let scan = ParamScanArtifact::from_grid(
                    grid,
                    ip,
                    "pt",
                    &fixed,
                    *p_name,
                    pt_label,
                    range_label(eta_symbol(abseta), lo, hi),
                )?
                .with_average(&grid_pt, ip, "pt", &fixed, format!("{} integrated", eta_symbol(abseta)))?;
                let name = ctx.outfile(&format!("{p_name}_charge{c}_eta{e}"));
                save_pdf_and_png(ctx, &dir_eta, &name, "param_scan", &scan)?;
            }
            write_index(&dir_eta)?;

            let dir_pt = ctx.plot_dir(&format!("plots_1D_{proc}/{p_name}_pt"))?;
            for p in 0..pt.n_bins() {
                let (lo, hi) = pt.bin_bounds(p);
                let fixed = [("pt", p), ("charge", c)];
                let scan = ParamScanArtifact::from_grid(
                    grid,
                    ip,
                    "eta",
                    &fixed,
                    *p_name,
                    eta_label,
                    range_label("p\u{1D1B}", lo, hi),
                )?
                .with_average(&grid_eta, ip, "eta", &fixed, "p\u{1D1B} integrated")?;
                let name = ctx.outfile(&format!("{p_name}_charge{c}_pt{p}"));
                save_pdf_and_png(ctx, &dir_pt, &name, "param_scan", &scan)?;
            }
            write_index(&dir_pt)?;
        }
    }
    write_index(&dir_2d)?;
    write_index(&dir_1d)
}

/// Coefficients of the joint fit along eta, one plot per monomial.
fn plot_smoothed_params(
    ctx: &PlotContext,
    args: &FakerateArgs,
    proc: &str,
    grid: &ParamGrid,
) -> Result<()> {
    let dir = ctx.plot_dir(&format!("plots_1D_{proc}/params"))?;
    let eta_label = ctx.styles.xlabel(if args.abseta() { "abseta" } else { "eta" });
    let charge = grid.axes[grid.axis_index("charge")?].clone();
    let name_of = |i: usize| PARAM_NAMES.get(i).map(|s| s.to_string()).unwrap_or_else(|| format!("p{i}"));

    for c in 0..charge.n_bins() {
        let mut idx = 0;
        for ix in 0..=args.x_order {
            for iz in 0..=args.smoothing_order[ix] {
                let label = format!("{}-{}", name_of(ix), name_of(iz));
                let scan = ParamScanArtifact::from_grid(
                    grid,
                    idx,
                    "eta",
                    &[("charge", c)],
                    label,
                    eta_label,
                    "Inclusive",
                )?;
                let name = ctx.outfile(&format!("{}_{}_charge{c}", name_of(ix), name_of(iz)));
                save_pdf_and_png(ctx, &dir, &name, "param_scan", &scan)?;
                idx += 1;
            }
        }
    }
    write_index(&dir)
}

/// Pass/fail ratio along x with the fitted factor, per (charge, eta, pt) bin.
fn plot_x_axis(
    ctx: &PlotContext,
    args: &FakerateArgs,
    dir: &Path,
    fits: &[&ProcFit],
    colors: &[&str],
    title_proc: &str,
) -> Result<()> {
    let Some(first) = fits.first() else { return Ok(()) };
    let ratios: Vec<Histogram> = fits.iter().map(|f| fakerate_hist(&f.hist)).collect::<abcd_core::Result<_>>()?;
    let charge = first.hist.axis("charge")?.clone();
    let eta = first.hist.axis("eta")?.clone();
    let pt = first.hist.axis("pt")?.clone();
    let threshold = args.x_bins_sideband[args.x_bins_sideband.len() - 1];
    let x_label = ctx.styles.xlabel(&args.x_axis_name);
    let smoothed = args.smoothing_axis_name.is_some();
    let abseta = args.abseta();

    for c in 0..charge.n_bins() {
        tracing::info!(charge = c, "fake-rate validation plots");
        let title = process_title(title_proc, superscript_sign(charge.n_bins(), c));
        for e in 0..eta.n_bins() {
            for p in 0..pt.n_bins() {
                let bins = [("charge", c), ("eta", e), ("pt", p)];
                let pt_bounds = pt.bin_bounds(p);
                let lanes: Vec<Histogram> = ratios
                    .iter()
                    .map(|r| r.select("charge", c)?.select("eta", e)?.select("pt", p))
                    .collect::<abcd_core::Result<_>>()?;
                let mut inputs = Vec::with_capacity(fits.len());
                for ((f, lane), color) in fits.iter().zip(&lanes).zip(colors) {
                    let fit = f.grid.get(&grid_bins(&f.grid, &bins)?)?;
                    inputs.push(CurveInput {
                        label: &f.name,
                        color,
                        ratio: lane,
                        fit,
                        z: smoothed.then(|| 0.5 * (pt_bounds.0 + pt_bounds.1)),
                    });
                }
                let artifact = FakerateCurveArtifact::build(
                    title.clone(),
                    region_label(pt_bounds, eta.bin_bounds(e), abseta),
                    x_label,
                    &args.x_axis_name,
                    threshold,
                    &inputs,
                )?;
                let name = ctx.outfile(&format!("fit_charge{c}_eta{e}_pt{p}"));
                save_pdf_and_png(ctx, dir, &name, "fakerate_curve", &artifact)?;
            }
        }
    }
    write_index(dir)
}
