//! # abcd-select
//!
//! The ABCD method on N-dimensional histograms: region definitions on the
//! x/y plane, signal-region estimates (simple, extended and full extended
//! ABCD) and the per-bin fake-rate parameterisation.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod abcd;
pub mod fakerate;
pub mod regions;

pub use abcd::{Smoothing, fake_hist_extended, fake_hist_full, fake_hist_simple, signal_hist};
pub use fakerate::{compute_fakerate, fakerate_hist, pass_fail};
pub use regions::{AbcdAxes, Region, Window, abcd_axes, region_hist};
