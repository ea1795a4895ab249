//! abcd CLI

mod fakerate;
mod output;
mod stack;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use abcd_groups::Styles;
use abcd_viz_render::config::resolve_config;

use crate::output::PlotContext;

#[derive(Parser, Serialize)]
#[command(name = "abcd")]
#[command(about = "abcd - fake-rate estimation and validation plots")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    plot: PlotArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Arguments shared by every plotting command.
#[derive(Args, Debug, Clone, Serialize)]
pub struct PlotArgs {
    /// Base path for output
    #[arg(short = 'o', long, default_value = ".", global = true)]
    pub outpath: PathBuf,

    /// Subfolder of the output path
    #[arg(short = 'f', long, default_value = "./test", global = true)]
    pub outfolder: String,

    /// Appended to every output file name
    #[arg(short = 'p', long, global = true)]
    pub postfix: Option<String>,

    /// Status text next to the experiment label
    #[arg(long, default_value = "Preliminary", global = true)]
    pub cms_decor: String,

    /// Integrated luminosity in fb⁻¹, overriding the input metadata
    #[arg(long, global = true)]
    pub lumi: Option<f64>,

    /// Scale the legend text size
    #[arg(long, default_value_t = 1.0, global = true)]
    pub scaleleg: f64,

    /// 0-1 error, 2 warn, 3 info, 4 debug, 5 trace
    #[arg(short = 'v', long, default_value_t = 3, global = true)]
    pub verbose: u8,

    /// Disable colored log output
    #[arg(long, global = true)]
    pub no_color_logger: bool,

    /// Plot config YAML (theme, overrides and a `styles:` section)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Also write the plot artifacts as JSON next to the images
    #[arg(long, global = true)]
    pub save_artifacts: bool,
}

#[derive(Subcommand, Serialize)]
enum Commands {
    /// Fake-rate fits, sideband fits and ABCD closure plots
    Fakerate(fakerate::FakerateArgs),

    /// Stacked data/prediction plots with a ratio panel
    Stack(stack::StackArgs),
}

fn log_level(verbose: u8) -> tracing::Level {
    match verbose {
        0 | 1 => tracing::Level::ERROR,
        2 => tracing::Level::WARN,
        3 => tracing::Level::INFO,
        4 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    }
}

fn plot_context(cli: &Cli) -> Result<PlotContext> {
    let yaml = match &cli.plot.config {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("reading plot config {}", path.display()))?,
        ),
        None => None,
    };
    let mut config = resolve_config(yaml.as_deref())?;
    let styles = match &yaml {
        Some(y) => Styles::from_config_yaml(y)?,
        None => Styles::default(),
    };
    config.experiment.status = cli.plot.cms_decor.clone();
    config.legend.scale *= cli.plot.scaleleg;
    if let Some(lumi) = cli.plot.lumi {
        config.experiment.lumi_fb_inv = lumi;
    }
    let command = match &cli.command {
        Commands::Fakerate(_) => "fakerate",
        Commands::Stack(_) => "stack",
    };
    Ok(PlotContext {
        args: cli.plot.clone(),
        config,
        styles,
        command: command.to_string(),
        invocation: serde_json::to_value(cli)?,
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(log_level(cli.plot.verbose))
        .with_target(false)
        .with_ansi(!cli.plot.no_color_logger)
        .with_writer(std::io::stderr)
        .init();

    let ctx = plot_context(&cli)?;
    match &cli.command {
        Commands::Fakerate(args) => fakerate::run(&ctx, args),
        Commands::Stack(args) => stack::run(&ctx, args),
    }
}
