//! Streaming core for das2/das3 heliophysics telemetry.
//!
//! This crate implements the pieces a family of filter executables
//! (binning reducers, spectral estimators, format converters) link
//! against: a chunked wire codec with two coexisting header grammars, a
//! units algebra with epoch/time-system support, a descriptor tree, an
//! FFT plan cache with strict creation/execution concurrency discipline,
//! a dataset model and builder, and two concrete stream filters (a
//! time-binning reducer and a PSD transformer) built on top of all of
//! the above.
//!
//! ```
//! use dasflow::units::Unit;
//!
//! let v = Unit::from_str("V").unwrap();
//! let hz = Unit::from_str("Hz").unwrap();
//! let v2_per_hz = v.power(2, 1).unwrap().divide(hz).unwrap();
//! assert!(v2_per_hz.to_str().contains("V"));
//! ```
//!
//! Modules are layered leaves-first: [`error`] and [`units`] have no
//! intra-crate dependencies; [`time`] depends on [`units`] for epoch
//! unit names; [`descriptor`] and [`frame`] depend on [`units`] for
//! property typing; [`fft`] is self-contained; [`dataset`] depends on
//! [`units`], [`descriptor`] and [`frame`]; [`codec`] depends on
//! [`transport`] and [`dataset`]; [`builder`], [`reducer`] and
//! [`psd_transform`] sit on top as [`codec::Handler`] implementations.

pub mod descriptor;
pub mod error;
pub mod fft;
pub mod frame;
pub mod time;
pub mod transport;
pub mod units;

pub mod codec;
pub mod dataset;

pub mod builder;
pub mod psd_transform;
pub mod reducer;

pub use error::{DasError, Result};

#[cfg(test)]
pub(crate) mod test_support {
    //! Shared test helpers: float/complex comparators used across this
    //! crate's `#[cfg(test)]` modules.

    pub fn assert_close(a: f64, b: f64, eps: f64) {
        assert!(
            (a - b).abs() <= eps,
            "expected {a} and {b} to be within {eps}, difference is {}",
            (a - b).abs()
        );
    }
}
