//! # abcd-viz-render
//!
//! Turns `abcd-viz` artifacts into SVG, and SVG into PNG or PDF.

pub mod canvas;
pub mod color;
pub mod config;
pub mod header;
pub mod layout;
pub mod output;
pub mod plots;
pub mod primitives;
pub mod text;
pub mod theme;

use config::VizConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("unknown artifact kind: {0}")]
    UnknownKind(String),
    #[error("deserialization error: {0}")]
    Deserialize(#[from] serde_json::Error),
    #[error("config error: {0}")]
    Config(String),
    #[error("layout error: {0}")]
    Layout(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "png")]
    #[error("PNG encoding error: {0}")]
    Png(String),
    #[cfg(feature = "pdf")]
    #[error("PDF conversion error: {0}")]
    Pdf(String),
}

pub type Result<T> = std::result::Result<T, RenderError>;

/// Artifact kinds understood by [`render_svg`].
pub const KINDS: [&str; 7] =
    ["chi2", "fakerate_curve", "param_map", "param_scan", "sideband_fit", "closure", "stack"];

/// Render an artifact JSON to an SVG string.
pub fn render_svg(artifact_json: &str, kind: &str, config: &VizConfig) -> Result<String> {
    let svg = match kind {
        "chi2" => {
            let art: abcd_viz::Chi2Artifact = serde_json::from_str(artifact_json)?;
            plots::chi2::render(&art, config)?
        }
        "fakerate_curve" => {
            let art: abcd_viz::FakerateCurveArtifact = serde_json::from_str(artifact_json)?;
            plots::fakerate::render(&art, config)?
        }
        "param_map" => {
            let art: abcd_viz::ParamMapArtifact = serde_json::from_str(artifact_json)?;
            plots::params::render_map(&art, config)?
        }
        "param_scan" => {
            let art: abcd_viz::ParamScanArtifact = serde_json::from_str(artifact_json)?;
            plots::params::render_scan(&art, config)?
        }
        "sideband_fit" => {
            let art: abcd_viz::SidebandFitArtifact = serde_json::from_str(artifact_json)?;
            plots::sideband::render(&art, config)?
        }
        "closure" => {
            let art: abcd_viz::ClosureArtifact = serde_json::from_str(artifact_json)?;
            plots::closure::render(&art, config)?
        }
        "stack" => {
            let art: abcd_viz::StackArtifact = serde_json::from_str(artifact_json)?;
            plots::stack::render(&art, config)?
        }
        other => return Err(RenderError::UnknownKind(other.to_string())),
    };
    Ok(svg)
}

/// Render an artifact JSON to bytes in the given format (`svg`, `png`, `pdf`).
pub fn render_to_bytes(
    artifact_json: &str,
    kind: &str,
    format: &str,
    config: &VizConfig,
) -> Result<Vec<u8>> {
    let svg = render_svg(artifact_json, kind, config)?;
    match format {
        "svg" => Ok(svg.into_bytes()),
        #[cfg(feature = "png")]
        "png" => output::png::svg_to_png(&svg, config.output.dpi),
        #[cfg(feature = "pdf")]
        "pdf" => output::pdf::svg_to_pdf(&svg),
        other => Err(RenderError::UnknownKind(format!("format: {other}"))),
    }
}

/// Render an artifact JSON to a file, format taken from the extension.
pub fn render_to_file(
    artifact_json: &str,
    kind: &str,
    path: &std::path::Path,
    config: &VizConfig,
) -> Result<()> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("svg");
    if ext == "svg" {
        output::svg::save_svg(&render_svg(artifact_json, kind, config)?, path)?;
    } else {
        std::fs::write(path, render_to_bytes(artifact_json, kind, ext, config)?)?;
    }
    tracing::debug!(path = %path.display(), kind, "wrote plot");
    Ok(())
}
