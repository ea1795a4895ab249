//! # abcd-fit
//!
//! Fitting routines used by the fake-rate estimate:
//! - [`poly`]: weighted polynomial least squares in one or two variables
//! - [`curve`]: Levenberg-Marquardt fits of nonlinear models (e.g. [`curve::ExpFall`])
//! - [`propagate`]: linear error propagation of fitted parameters onto curves
//! - [`stats`]: chi-square density and robust averages

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod curve;
pub mod poly;
pub mod propagate;
pub mod stats;

pub use curve::{CurveFit, CurveModel, ExpFall, FitOptions};
pub use poly::{ParamGrid, PolyFit, fit_weighted, fit_weighted_2d};
pub use propagate::Band;
