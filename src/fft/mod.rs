//! Thread-safe FFT plan cache and Parseval-normalized PSD estimation.
//!
//! Grounded in `original_source/das2/dft.c`: a global plan table keyed
//! by transform length, with two overlapping concurrency invariants
//! that `rustfft`'s plain `FftPlanner` doesn't give you for free:
//!
//! 1. A plan must not be dropped while any thread is executing *any*
//!    transform (fftw's planner is not safe to mutate concurrently
//!    with `fftw_execute` on another plan created from the same
//!    planner state).
//! 2. A specific plan must not be dropped while its own transform is
//!    mid-execution.
//!
//! [`plan::PlanCache`] enforces both with a global exec counter plus a
//! per-plan borrow counter, each paired with a condvar, mirroring
//! `dft.c`'s `g_nExecCount`/`g_mtxExecCount`/`g_cndExecCountDec` and
//! per-plan `mtxCount`/`cndCountDec`.

pub mod plan;
pub mod psd;

pub use plan::PlanCache;
pub use psd::{PsdEstimator, PsdOptions, Window};
