//! `abcd stack`: data against the stacked prediction, one plot per histogram.

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;

use abcd_core::{AxisKind, HistContainer, Histogram};
use abcd_groups::{DATA, Datagroups, Presel, RebinAction, Selection, Variation};
use abcd_viz::{FitResult, StackArtifact, StackOptions};
use abcd_viz_render::color::variation_colors;

use crate::output::{PlotContext, save_pdf_and_png, write_index_and_log};

/// Axes of systematic variations; the nominal entry is plotted.
const SYST_AXES: [&str; 4] = ["systIdx", "tensor_axis_0", "vars", "pdfVar"];

/// Axes kept as plot observables by default.
const DETECTOR_AXES: [&str; 3] = ["pt", "eta", "charge"];

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Plus,
    Minus,
    All,
}

impl Channel {
    fn charge(self) -> Option<f64> {
        match self {
            Channel::Plus => Some(1.0),
            Channel::Minus => Some(-1.0),
            Channel::All => None,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Channel::Plus => "plus",
            Channel::Minus => "minus",
            Channel::All => "",
        }
    }
}

#[derive(Args, Debug, Clone, Serialize)]
pub struct StackArgs {
    /// Histogram container (.json or .json.gz)
    pub infile: PathBuf,

    /// Ratio of prediction to data instead of data to prediction
    #[arg(long)]
    pub ratio_to_data: bool,

    /// Histogram name in the file
    #[arg(short = 'n', long, default_value = "nominal")]
    pub base_name: String,

    /// Nominal histogram for variations (default: base name up to the last '_')
    #[arg(long)]
    pub nominal_ref: Option<String>,

    /// Observables to plot; `a-b` unrolls a and b into one axis
    #[arg(long, required = true, num_args = 1..)]
    pub hists: Vec<String>,

    /// Charge selection
    #[arg(short = 'c', long, value_enum, default_value_t = Channel::All)]
    pub channel: Channel,

    /// Ratio panel range
    #[arg(short = 'r', long, num_args = 2, default_values_t = [0.9, 1.1])]
    pub rrange: Vec<f64>,

    /// Merge this many bins, per variable of the first histogram
    #[arg(long, num_args = 0..)]
    pub rebin: Vec<usize>,

    /// Fold to |x| if 1, per variable
    #[arg(long, num_args = 0..)]
    pub absval: Vec<u8>,

    /// Restrict to [lo, hi), pairs per variable
    #[arg(long, num_args = 0.., allow_negative_numbers = true)]
    pub axlim: Vec<f64>,

    /// Rebin before the region selection instead of after it
    #[arg(long)]
    pub rebin_before_selection: bool,

    /// Logarithmic y axis
    #[arg(long)]
    pub logy: bool,

    /// y range
    #[arg(long, num_args = 2, allow_negative_numbers = true)]
    pub ylim: Option<Vec<f64>>,

    /// Headroom factor above the highest point
    #[arg(long)]
    pub yscale: Option<f64>,

    /// x range
    #[arg(long, num_args = 2, allow_negative_numbers = true)]
    pub xlim: Option<Vec<f64>>,

    /// Only plot these groups
    #[arg(long, num_args = 1..)]
    pub proc_filters: Option<Vec<String>>,

    /// Do not plot data
    #[arg(long)]
    pub no_data: bool,

    /// Draw stacked processes as lines
    #[arg(long)]
    pub no_fill: bool,

    /// Fit result JSON with prefit and postfit yields
    #[arg(long)]
    pub fitresult: Option<PathBuf>,

    /// Use the prefit yields of the fit result
    #[arg(long)]
    pub prefit: bool,

    /// No error bars on the ratio points
    #[arg(long)]
    pub no_ratio_err: bool,

    /// `none`, or fixed bins as `axis=index,...` (default: ABCD signal region)
    #[arg(long)]
    pub selection: Option<String>,

    /// Preselection, `axis=lo,hi` or a bare axis to integrate
    #[arg(long, num_args = 0..)]
    pub presel: Vec<String>,

    /// Scale the prediction to the data yield
    #[arg(long)]
    pub norm_to_data: bool,

    /// Plot groups without merging them into supergroups
    #[arg(long)]
    pub fine_groups: bool,

    #[command(subcommand)]
    pub variation: Option<StackSub>,
}

#[derive(Subcommand, Debug, Clone, Serialize)]
pub enum StackSub {
    /// Overlay summed predictions of systematic variations
    Variation(VariationArgs),
}

#[derive(Args, Debug, Clone, Serialize)]
pub struct VariationArgs {
    /// Histogram names of the variations
    #[arg(long, required = true, num_args = 1..)]
    pub var_name: Vec<String>,

    /// Legend labels, one or one per entry
    #[arg(long, required = true, num_args = 1..)]
    pub var_label: Vec<String>,

    /// Axes to select the variation from
    #[arg(long, num_args = 0..)]
    pub select_axis: Vec<String>,

    /// Label or index selected along each axis
    #[arg(long, num_args = 0..)]
    pub select_entries: Vec<String>,

    /// Curve colors
    #[arg(long, num_args = 0..)]
    pub colors: Vec<String>,

    /// Line styles, cycled
    #[arg(long, num_args = 0..)]
    pub linestyle: Vec<String>,

    /// Up/down pairs share a color
    #[arg(long)]
    pub double_colors: bool,

    /// Shade the envelope of the first N variations
    #[arg(long)]
    pub fill_between: Option<usize>,
}

/// Repeat the last element until `v` has `n` entries.
fn pad_to(v: &[String], n: usize) -> Vec<String> {
    let mut out = v.to_vec();
    if let Some(last) = v.last() {
        while out.len() < n {
            out.push(last.clone());
        }
    }
    out
}

fn validate(args: &StackArgs) -> Result<()> {
    if args.fitresult.is_some() && args.hists.len() > 1 {
        bail!("a fit result can only be plotted for one histogram, got {:?}", args.hists);
    }
    if args.prefit && args.fitresult.is_none() {
        bail!("--prefit needs --fitresult");
    }
    if args.axlim.len() % 2 != 0 {
        bail!("--axlim needs pairs of values, got {}", args.axlim.len());
    }
    if let Some(StackSub::Variation(v)) = &args.variation {
        if v.select_axis.is_empty() != v.select_entries.is_empty() {
            bail!("--select-axis and --select-entries must be given together");
        }
        let n = v.select_entries.len().max(v.var_name.len());
        if v.var_label.len() != 1 && v.var_label.len() != n {
            bail!("--var-label needs one label or one per variation, got {} for {n}", v.var_label.len());
        }
        if let Some(k) = v.fill_between
            && k > n
        {
            bail!("--fill-between {k} exceeds the {n} variations");
        }
    }
    Ok(())
}

/// Legend and file tag of the variation, `var_name[0]` or the first selected entry.
/// Bin indices are tagged with the variation name, named entries stand alone.
fn variation_tag(v: &VariationArgs) -> String {
    let is_index = |e: &str| !e.is_empty() && e.chars().all(|c| c.is_ascii_digit());
    match v.select_entries.first() {
        Some(e) if !is_index(e) => e.clone(),
        Some(e) => format!("{}{e}", v.var_name[0]),
        None => v.var_name[0].clone(),
    }
}

fn outfile_name(args: &StackArgs, ctx: &PlotContext, hist: &str) -> String {
    let var_tag = match &args.variation {
        Some(StackSub::Variation(v)) => variation_tag(v),
        None => String::new(),
    };
    let fit_tag = match (&args.fitresult, args.prefit) {
        (Some(_), true) => "prefit",
        (Some(_), false) => "postfit",
        (None, _) => "",
    };
    let hist_tag = hist.replace('-', "_");
    let postfix = ctx.args.postfix.clone().unwrap_or_default();
    [hist_tag.as_str(), var_tag.as_str(), fit_tag, postfix.as_str(), args.channel.tag()]
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

/// Axis title of an unrolled `a-b` observable: `a-b bin` without units.
fn unrolled_label(ctx: &PlotContext, parts: &[&str]) -> String {
    let labels: Vec<String> = parts
        .iter()
        .map(|p| ctx.styles.xlabel(p).replace("(GeV)", "").trim().to_string())
        .collect();
    format!("{} bin", labels.join("-"))
}

/// Reduce a loaded histogram to the plotted observable.
fn reduce_to(h: &Histogram, obs: &[&str], channel: Channel) -> abcd_core::Result<Histogram> {
    let mut h = h.clone();
    if let Some(q) = channel.charge()
        && h.has_axis("charge")
        && !obs.contains(&"charge")
    {
        h = h.select_value("charge", q)?;
    }
    for name in SYST_AXES {
        if h.has_axis(name) && !obs.contains(&name) {
            h = h.select(name, 0)?;
        }
    }
    if let Some(last) = h.axes().last()
        && matches!(last.kind, AxisKind::Category { .. })
        && !obs.contains(&last.name.as_str())
    {
        let name = last.name.clone();
        h = h.select(&name, 0)?;
    }
    if obs.len() > 1 { h.unrolled(obs, Some(1.0)) } else { h.project(obs) }
}

pub fn run(ctx: &PlotContext, args: &StackArgs) -> Result<()> {
    validate(args)?;
    let container = HistContainer::load(&args.infile)
        .with_context(|| format!("loading {}", args.infile.display()))?;
    let exclude_default: &[&str] = if args.proc_filters.is_some() { &[] } else { &["QCD"] };
    let mut groups = Datagroups::new(
        container,
        ctx.styles.clone(),
        args.proc_filters.as_deref(),
        exclude_default,
    )?;
    if !args.fine_groups {
        groups.apply_supergroups();
    }
    let presel = args.presel.iter().map(|p| Presel::parse(p)).collect::<abcd_core::Result<Vec<_>>>()?;
    groups.set_presel(presel);

    let vars: Vec<String> = args.hists[0].split('-').map(str::to_string).collect();
    let rebin = RebinAction {
        vars,
        axlim: args.axlim.clone(),
        rebin: args.rebin.clone(),
        absval: args.absval.iter().map(|&a| a != 0).collect(),
    };
    groups.set_rebin_action(rebin, args.rebin_before_selection)?;
    let selection = match &args.selection {
        Some(s) => Selection::parse(s)?,
        None => Selection::Abcd,
    };
    groups.set_selection(selection);

    let fake_int_axes: Vec<String> = DETECTOR_AXES
        .iter()
        .filter(|a| !args.hists.iter().any(|h| h.split('-').any(|p| p == **a)))
        .map(|a| a.to_string())
        .collect();
    groups.set_fake_integration_axes(fake_int_axes);

    let nominal = match &args.nominal_ref {
        Some(n) => n.clone(),
        None => args
            .base_name
            .rsplit_once('_')
            .map(|(head, _)| head.to_string())
            .unwrap_or_else(|| args.base_name.clone()),
    };
    groups.load_hists(&args.base_name, &args.base_name)?;

    let mut exclude: Vec<String> = vec![DATA.to_string()];
    let mut linestyles = Vec::new();
    let mut fill_between = 0;
    if let Some(StackSub::Variation(v)) = &args.variation {
        let n = v.select_entries.len().max(v.var_name.len());
        let names = pad_to(&v.var_name, n);
        let entries = pad_to(&v.select_entries, n);
        let axes = pad_to(&v.select_axis, n);
        let labels = pad_to(&v.var_label, n);
        let colors =
            if v.colors.is_empty() { variation_colors(n, v.double_colors) } else { pad_to(&v.colors, n) };
        for i in 0..n {
            let name = if names[i].is_empty() { nominal.clone() } else { names[i].clone() };
            let select = axes.get(i).zip(entries.get(i)).map(|(a, e)| (a.clone(), e.clone()));
            let varname = match &select {
                Some((_, e)) => format!("{name}{e}"),
                None => name.clone(),
            };
            let variation = Variation {
                hist_name: name,
                name: varname.clone(),
                label: labels[i].clone(),
                color: colors[i].clone(),
                select,
            };
            groups.add_summed_variation(&variation, &nominal, &args.base_name, &exclude)?;
            exclude.push(varname);
        }
        linestyles = v.linestyle.clone();
        fill_between = v.fill_between.unwrap_or(0);
    }
    // data is drawn on its own, never as a curve
    let unstacked: Vec<String> = exclude.iter().filter(|n| *n != DATA).cloned().collect();

    groups.sort_by_yields(&args.base_name);
    let stacked: Vec<String> =
        groups.names().into_iter().filter(|n| !exclude.contains(n)).rev().collect();
    tracing::info!(stacked = ?stacked, unstacked = ?unstacked, "groups to plot");

    let fit = match &args.fitresult {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading fit result {}", path.display()))?;
            Some(FitResult::from_json(&text)?)
        }
        None => None,
    };
    let snapshot = fit.as_ref().map(|f| f.snapshot(args.prefit));

    let outdir = ctx.plot_dir("")?;
    for hist in &args.hists {
        let obs: Vec<&str> = hist.split('-').collect();
        let unrolled = obs.len() > 1;
        let x_label =
            if unrolled { unrolled_label(ctx, &obs) } else { ctx.styles.xlabel(hist).to_string() };
        let channel = args.channel;
        let action = |h: &Histogram| reduce_to(h, &obs, channel);
        let opts = StackOptions {
            hist_name: args.base_name.clone(),
            x_label,
            rrange: [args.rrange[0], args.rrange[1]],
            binwnorm: if unrolled { None } else { Some(1.0) },
            ratio_to_data: args.ratio_to_data,
            no_data: args.no_data,
            no_fill: args.no_fill,
            logy: args.logy,
            ylim: args.ylim.as_ref().map(|v| [v[0], v[1]]),
            yscale: args.yscale,
            xlim: args.xlim.as_ref().map(|v| [v[0], v[1]]),
            ratio_error: !args.no_ratio_err,
            normalize_to_data: args.norm_to_data,
            unstacked_linestyles: linestyles.clone(),
            fill_between,
        };
        let mut artifact = StackArtifact::build(&groups, &stacked, &unstacked, &action, snapshot, &opts)
            .with_context(|| format!("building stack plot of '{hist}'"))?;
        if let Some(lumi) = ctx.args.lumi {
            artifact.lumi = lumi;
        }
        let name = outfile_name(args, ctx, hist);
        save_pdf_and_png(ctx, &outdir, &name, "stack", &artifact)?;
        write_index_and_log(ctx, &outdir, &name, &args.infile, groups.meta(), &artifact.yields)?;
    }
    Ok(())
}
