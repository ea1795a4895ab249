//! # abcd-viz
//!
//! Plot artifacts for the fake-rate and stack plots.
//!
//! Every artifact is a plain serde structure holding the numbers a renderer
//! needs (edges, values, errors, bands) and nothing about appearance.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Chi-square distributions of many fits.
pub mod chi2;

/// ABCD closure comparisons.
pub mod closure;

/// Series types shared by the artifacts.
pub mod common;

/// Fake-rate factor versus the ABCD x axis.
pub mod fakerate;

/// Fitted parameter maps and slices.
pub mod params;

/// Sideband pT spectra with exponential fits.
pub mod sideband;

/// Stacked data/prediction comparisons.
pub mod stack;

pub use chi2::Chi2Artifact;
pub use closure::{ClosureArtifact, ClosureInput};
pub use common::{BandEnvelope, Binned1D, BinnedSeries};
pub use fakerate::{CurveInput, FakerateCurveArtifact, FitCurve};
pub use params::{ParamMapArtifact, ParamScanArtifact};
pub use sideband::{SidebandCurve, SidebandFitArtifact};
pub use stack::{FitResult, FitSnapshot, StackArtifact, StackOptions};
