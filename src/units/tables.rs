//! Constant tables: the ad-hoc synonym list, the SI prefix table, and
//! the set of recognized SI base/derived symbols used by
//! [`super::reduce_component`].

/// A non-SI name that reduces directly to an SI unit with a fixed
/// scale factor, e.g. `"hour"` reduces to `3600 s`.
pub(super) struct AdHoc {
    pub name: &'static str,
    pub canonical: &'static str,
    pub factor: f64,
    pub sort_pref: i32,
}

pub(super) const AD_HOC_SYNONYMS: &[AdHoc] = &[
    AdHoc { name: "day", canonical: "s", factor: 86400.0, sort_pref: 50 },
    AdHoc { name: "days", canonical: "s", factor: 86400.0, sort_pref: 50 },
    AdHoc { name: "hour", canonical: "s", factor: 3600.0, sort_pref: 50 },
    AdHoc { name: "hours", canonical: "s", factor: 3600.0, sort_pref: 50 },
    AdHoc { name: "hr", canonical: "s", factor: 3600.0, sort_pref: 50 },
    AdHoc { name: "minute", canonical: "s", factor: 60.0, sort_pref: 50 },
    AdHoc { name: "minutes", canonical: "s", factor: 60.0, sort_pref: 50 },
    AdHoc { name: "min", canonical: "s", factor: 60.0, sort_pref: 50 },
];

pub(super) struct SiPrefix {
    pub symbol: &'static str,
    pub power: i32,
}

/// SI prefixes, symbol form. Order doesn't matter here; callers sort by
/// symbol length (longest first) before matching so `"da"` isn't
/// swallowed by a hypothetical single-letter `"d"` match on the wrong
/// base.
pub(super) const SI_PREFIXES: &[SiPrefix] = &[
    SiPrefix { symbol: "Y", power: 24 },
    SiPrefix { symbol: "Z", power: 21 },
    SiPrefix { symbol: "E", power: 18 },
    SiPrefix { symbol: "P", power: 15 },
    SiPrefix { symbol: "T", power: 12 },
    SiPrefix { symbol: "G", power: 9 },
    SiPrefix { symbol: "M", power: 6 },
    SiPrefix { symbol: "k", power: 3 },
    SiPrefix { symbol: "h", power: 2 },
    SiPrefix { symbol: "da", power: 1 },
    SiPrefix { symbol: "d", power: -1 },
    SiPrefix { symbol: "c", power: -2 },
    SiPrefix { symbol: "m", power: -3 },
    SiPrefix { symbol: "u", power: -6 },
    SiPrefix { symbol: "\u{3bc}", power: -6 },
    SiPrefix { symbol: "n", power: -9 },
    SiPrefix { symbol: "p", power: -12 },
    SiPrefix { symbol: "f", power: -15 },
    SiPrefix { symbol: "a", power: -18 },
    SiPrefix { symbol: "z", power: -21 },
    SiPrefix { symbol: "y", power: -24 },
];

/// Derived SI units: get a higher sort preference so canonical forms
/// read "quantity-first" (`"V**2 s"` rather than `"s V**2"`).
const SI_DERIVED_SYMBOLS: &[&str] = &[
    "Hz", "N", "Pa", "J", "W", "C", "V", "F", "\u{3a9}", "S", "Wb", "T", "H", "lm", "lx", "Bq",
    "Gy", "Sv", "kat", "eV",
];

/// Base SI symbols (gram rather than kilogram: prefixes attach to the
/// gram, `kg` included separately as the conventional unprefixed form).
const SI_BASE_SYMBOLS_LIST: &[&str] =
    &["m", "g", "kg", "s", "A", "K", "mol", "cd", "rad", "sr", "%"];

pub(super) const SI_BASE_SYMBOLS: SymbolSet = SymbolSet;

pub(super) struct SymbolSet;

impl SymbolSet {
    pub fn contains(&self, s: &&str) -> bool {
        SI_DERIVED_SYMBOLS.contains(s) || SI_BASE_SYMBOLS_LIST.contains(s)
    }
}

pub(super) fn sort_pref_for_symbol(sym: &str) -> i32 {
    if SI_DERIVED_SYMBOLS.contains(&sym) {
        100
    } else if SI_BASE_SYMBOLS_LIST.contains(&sym) {
        50
    } else {
        10
    }
}
