//! # abcd-core
//!
//! Core types and error handling for the abcd fake-rate toolkit.
//!
//! This crate provides:
//! - The common error type
//! - An N-dimensional histogram with named axes and flow bins
//! - The JSON histogram container read by the command-line tools

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod hist;
pub mod io;

pub use error::{Error, Result};
pub use hist::{Axis, AxisKind, DIVIDE_CUTOFF, Histogram};
pub use io::{DatasetEntry, HistContainer, Meta};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
