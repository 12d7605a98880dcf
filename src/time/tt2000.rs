//! Leap-second table and TAI-UTC offset lookup.
//!
//! A compiled-in table of `(year, month, day, delta-AT)` steps is used
//! unless `CDF_LEAPSECONDSTABLE` names a readable table file. Pre-1972
//! entries used a piecewise linear drift formula rather than an
//! integer step; post-1972 entries are exact integer steps — kept as
//! two lookup paths so the difference stays visible.

use crate::error::{DasError, Result};
use std::sync::OnceLock;

/// `TT - TAI`, a fixed offset independent of leap seconds.
pub const TT_MINUS_TAI_SECONDS: f64 = 32.184;

/// A single post-1972 leap second step: `delta-AT` (TAI-UTC, whole
/// seconds) effective at 00:00:00 UTC on `(year, month, day)`.
#[derive(Clone, Copy, Debug)]
struct LeapStep {
    year: i32,
    month: u32,
    day: u32,
    delta_at: f64,
}

/// A pre-1972 piecewise-linear drift segment:
/// `delta_at(mjd) = base + (mjd - mjd_epoch) * rate_per_day`.
#[derive(Clone, Copy, Debug)]
struct DriftSegment {
    year: i32,
    month: u32,
    day: u32,
    base: f64,
    mjd_epoch: f64,
    rate_per_day: f64,
}

/// Integer-step leap seconds, 1972 onward. Matches the public IERS
/// bulletin history compiled into `tt2000.c`'s `LTS` table.
const STEPS: &[LeapStep] = &[
    LeapStep { year: 1972, month: 1, day: 1, delta_at: 10.0 },
    LeapStep { year: 1972, month: 7, day: 1, delta_at: 11.0 },
    LeapStep { year: 1973, month: 1, day: 1, delta_at: 12.0 },
    LeapStep { year: 1974, month: 1, day: 1, delta_at: 13.0 },
    LeapStep { year: 1975, month: 1, day: 1, delta_at: 14.0 },
    LeapStep { year: 1976, month: 1, day: 1, delta_at: 15.0 },
    LeapStep { year: 1977, month: 1, day: 1, delta_at: 16.0 },
    LeapStep { year: 1978, month: 1, day: 1, delta_at: 17.0 },
    LeapStep { year: 1979, month: 1, day: 1, delta_at: 18.0 },
    LeapStep { year: 1980, month: 1, day: 1, delta_at: 19.0 },
    LeapStep { year: 1981, month: 7, day: 1, delta_at: 20.0 },
    LeapStep { year: 1982, month: 7, day: 1, delta_at: 21.0 },
    LeapStep { year: 1983, month: 7, day: 1, delta_at: 22.0 },
    LeapStep { year: 1985, month: 7, day: 1, delta_at: 23.0 },
    LeapStep { year: 1988, month: 1, day: 1, delta_at: 24.0 },
    LeapStep { year: 1990, month: 1, day: 1, delta_at: 25.0 },
    LeapStep { year: 1991, month: 1, day: 1, delta_at: 26.0 },
    LeapStep { year: 1992, month: 7, day: 1, delta_at: 27.0 },
    LeapStep { year: 1993, month: 7, day: 1, delta_at: 28.0 },
    LeapStep { year: 1994, month: 7, day: 1, delta_at: 29.0 },
    LeapStep { year: 1996, month: 1, day: 1, delta_at: 30.0 },
    LeapStep { year: 1997, month: 7, day: 1, delta_at: 31.0 },
    LeapStep { year: 1999, month: 1, day: 1, delta_at: 32.0 },
    LeapStep { year: 2006, month: 1, day: 1, delta_at: 33.0 },
    LeapStep { year: 2009, month: 1, day: 1, delta_at: 34.0 },
    LeapStep { year: 2012, month: 7, day: 1, delta_at: 35.0 },
    LeapStep { year: 2015, month: 7, day: 1, delta_at: 36.0 },
    LeapStep { year: 2017, month: 1, day: 1, delta_at: 37.0 },
];

/// Drift-based delta-AT, 1960-1972, per the historical BIH formulas.
const DRIFT: &[DriftSegment] = &[
    DriftSegment { year: 1960, month: 1, day: 1, base: 1.417818, mjd_epoch: 37300.0, rate_per_day: 0.001296 },
    DriftSegment { year: 1961, month: 1, day: 1, base: 1.422818, mjd_epoch: 37300.0, rate_per_day: 0.001296 },
    DriftSegment { year: 1961, month: 8, day: 1, base: 1.372818, mjd_epoch: 37300.0, rate_per_day: 0.001296 },
    DriftSegment { year: 1962, month: 1, day: 1, base: 1.845858, mjd_epoch: 37665.0, rate_per_day: 0.0011232 },
    DriftSegment { year: 1963, month: 11, day: 1, base: 1.945858, mjd_epoch: 37665.0, rate_per_day: 0.0011232 },
    DriftSegment { year: 1964, month: 1, day: 1, base: 3.240130, mjd_epoch: 38761.0, rate_per_day: 0.001296 },
    DriftSegment { year: 1964, month: 4, day: 1, base: 3.340130, mjd_epoch: 38761.0, rate_per_day: 0.001296 },
    DriftSegment { year: 1964, month: 9, day: 1, base: 3.440130, mjd_epoch: 38761.0, rate_per_day: 0.001296 },
    DriftSegment { year: 1965, month: 1, day: 1, base: 3.540130, mjd_epoch: 38761.0, rate_per_day: 0.001296 },
    DriftSegment { year: 1965, month: 3, day: 1, base: 3.640130, mjd_epoch: 38761.0, rate_per_day: 0.001296 },
    DriftSegment { year: 1965, month: 7, day: 1, base: 3.740130, mjd_epoch: 38761.0, rate_per_day: 0.001296 },
    DriftSegment { year: 1965, month: 9, day: 1, base: 3.840130, mjd_epoch: 38761.0, rate_per_day: 0.001296 },
    DriftSegment { year: 1966, month: 1, day: 1, base: 4.313170, mjd_epoch: 39126.0, rate_per_day: 0.002592 },
    DriftSegment { year: 1968, month: 2, day: 1, base: 4.213170, mjd_epoch: 39126.0, rate_per_day: 0.002592 },
];

/// A leap-second provider, pluggable so callers can replace the
/// built-in table with one sourced elsewhere (e.g. downloaded from a
/// network cache) without forking this crate.
pub trait LeapSecondProvider: Send + Sync {
    /// TAI-UTC, in whole (or, pre-1972, fractional) seconds, in effect
    /// at the given UTC calendar date.
    fn delta_at(&self, year: i32, month: u32, day: u32, mjd: f64) -> f64;
}

struct BuiltinTable;

impl LeapSecondProvider for BuiltinTable {
    fn delta_at(&self, year: i32, month: u32, day: u32, mjd: f64) -> f64 {
        let key = (year, month, day);
        if key >= (1972, 1, 1) {
            let mut best = STEPS[0].delta_at;
            for step in STEPS {
                if (step.year, step.month, step.day) <= key {
                    best = step.delta_at;
                } else {
                    break;
                }
            }
            best
        } else if key >= (1960, 1, 1) {
            let mut seg = &DRIFT[0];
            for d in DRIFT {
                if (d.year, d.month, d.day) <= key {
                    seg = d;
                } else {
                    break;
                }
            }
            seg.base + (mjd - seg.mjd_epoch) * seg.rate_per_day
        } else {
            0.0
        }
    }
}

static PROVIDER: OnceLock<Box<dyn LeapSecondProvider>> = OnceLock::new();

fn provider() -> &'static dyn LeapSecondProvider {
    PROVIDER
        .get_or_init(|| load_from_env().unwrap_or_else(|| Box::new(BuiltinTable)))
        .as_ref()
}

/// Attempt to load a leap-second table from the path named by
/// `CDF_LEAPSECONDSTABLE`. Expects one `year month day delta_at` record
/// per non-comment line (`#` starts a comment), sorted ascending. Falls
/// back to `None` (built-in table) on any I/O or parse error, matching
/// the original's "table missing is not fatal" behavior.
fn load_from_env() -> Option<Box<dyn LeapSecondProvider>> {
    let path = std::env::var("CDF_LEAPSECONDSTABLE").ok()?;
    let text = std::fs::read_to_string(path).ok()?;
    let mut rows = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            continue;
        }
        let (y, m, d, dat) = (
            parts[0].parse().ok()?,
            parts[1].parse().ok()?,
            parts[2].parse().ok()?,
            parts[3].parse().ok()?,
        );
        rows.push(LeapStep { year: y, month: m, day: d, delta_at: dat });
    }
    if rows.is_empty() {
        return None;
    }
    Some(Box::new(ExternalTable(rows)))
}

struct ExternalTable(Vec<LeapStep>);

impl LeapSecondProvider for ExternalTable {
    fn delta_at(&self, year: i32, month: u32, day: u32, _mjd: f64) -> f64 {
        let key = (year, month, day);
        let mut best = self.0.first().map(|s| s.delta_at).unwrap_or(0.0);
        for step in &self.0 {
            if (step.year, step.month, step.day) <= key {
                best = step.delta_at;
            } else {
                break;
            }
        }
        best
    }
}

/// `TAI - UTC`, in seconds, in effect at the given UTC calendar date.
pub fn delta_at(year: i32, month: u32, day: u32, mjd: f64) -> Result<f64> {
    if year < 1960 {
        return Err(DasError::InvalidOp(format!(
            "no leap second data before 1960 (got year {year})"
        )));
    }
    Ok(provider().delta_at(year, month, day, mjd))
}
