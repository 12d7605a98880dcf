//! Canonical physical-unit expressions.
//!
//! A `Unit` is a cheap, `Copy` handle into a process-global interner
//! keyed by the *exact string* a caller parsed,
//! not by canonical form — `"km"` and `"1000 m"` intern to different
//! handles even though [`Unit::reduce`] maps both to the same canonical
//! sequence. Equality on `Unit` is handle equality (fast, `==`);
//! dimensional equivalence is `a.reduce() == b.reduce()`.
//!
//! Seven names are not unit expressions at all but epoch markers
//! (`us2000`, `mj1958`, `t2000`, `t1970`, `ns1970`, `UTC`, `TT2000`):
//! they denote a point in time, not a measurable quantity, so they
//! can't be inverted, multiplied, or combined with anything else. Use
//! [`Unit::interval`] to get the associated duration unit.

mod tables;

use crate::error::{DasError, Result};
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

/// An interned unit expression. Cheap to copy and compare; see the
/// module docs for what equality does and doesn't mean.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Unit(u32);

impl std::fmt::Debug for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unit({:?})", self.to_str())
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

struct Interner {
    strings: Vec<String>,
    index: HashMap<String, u32>,
}

static INTERNER: OnceLock<RwLock<Interner>> = OnceLock::new();

fn interner() -> &'static RwLock<Interner> {
    INTERNER.get_or_init(|| {
        RwLock::new(Interner {
            strings: Vec::new(),
            index: HashMap::new(),
        })
    })
}

fn intern(s: &str) -> Unit {
    // Lock-free(ish) pre-check: a shared read lock, the common case once
    // warmed up by repeated parsing of the same handful of unit strings
    // on a stream.
    if let Some(&id) = interner().read().unwrap().index.get(s) {
        return Unit(id);
    }
    let mut w = interner().write().unwrap();
    if let Some(&id) = w.index.get(s) {
        return Unit(id);
    }
    let id = w.strings.len() as u32;
    w.strings.push(s.to_string());
    w.index.insert(s.to_string(), id);
    Unit(id)
}

fn lookup(u: Unit) -> String {
    interner().read().unwrap().strings[u.0 as usize].clone()
}

/// The dimensionless unit, i.e. `Unit::from_str("").unwrap()`.
pub fn dimensionless() -> Unit {
    intern("")
}

/// One factor of a unit expression, e.g. `m` in `m**2`.
#[derive(Clone, Debug, PartialEq)]
struct Component {
    name: String,
    exp_num: i32,
    exp_denom: i32,
    /// Higher sorts first among components of equal sign, per the
    /// ad-hoc/SI preference tables.
    sort_pref: i32,
}

impl Component {
    fn exponent(&self) -> f64 {
        self.exp_num as f64 / self.exp_denom as f64
    }
}

fn gcd(a: i32, b: i32) -> i32 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.max(1)
}

fn parse_exponent(s: &str) -> Result<(i32, i32)> {
    if s.is_empty() {
        return Err(DasError::InvalidOp("empty exponent".into()));
    }
    if let Some(slash) = s.find('/') {
        let num: i32 = s[..slash]
            .parse()
            .map_err(|_| DasError::InvalidOp(format!("bad exponent numerator in '{s}'")))?;
        let den: i32 = s[slash + 1..]
            .parse()
            .map_err(|_| DasError::InvalidOp(format!("bad exponent denominator in '{s}'")))?;
        if den == 0 {
            return Err(DasError::InvalidOp(format!("zero exponent denominator in '{s}'")));
        }
        Ok((num, den))
    } else {
        let num: i32 = s
            .parse()
            .map_err(|_| DasError::InvalidOp(format!("bad exponent in '{s}'")))?;
        Ok((num, 1))
    }
}

/// Split a unit string into its component factors. Delimiters are
/// whitespace (between already-exponentiated factors, e.g.
/// `"V**2 Hz**-1"`) and a bare `/` within a space-delimited chunk
/// (`"km/s"`), which flips the sign of everything after it.
fn parse_components(s: &str) -> Result<Vec<Component>> {
    let cleaned: String = s.chars().filter(|&c| c != '(' && c != ')').collect();
    let mut comps = Vec::new();
    for chunk in cleaned.split_whitespace() {
        let op = chunk.find("**").map(|p| (p, 2)).or_else(|| chunk.find('^').map(|p| (p, 1)));
        if let Some((pos, op_len)) = op {
            let name = &chunk[..pos];
            if name.is_empty() {
                return Err(DasError::InvalidOp(format!("missing unit name in '{chunk}'")));
            }
            let exp_str = &chunk[pos + op_len..];
            let (num, den) = parse_exponent(exp_str)?;
            comps.push(Component {
                name: name.to_string(),
                exp_num: num,
                exp_denom: den,
                sort_pref: 0,
            });
        } else if chunk.contains('/') {
            let mut sign = 1i32;
            for (i, part) in chunk.split('/').enumerate() {
                if part.is_empty() {
                    continue;
                }
                if i > 0 {
                    sign = -sign;
                }
                comps.push(Component {
                    name: part.to_string(),
                    exp_num: sign,
                    exp_denom: 1,
                    sort_pref: 0,
                });
            }
        } else {
            comps.push(Component {
                name: chunk.to_string(),
                exp_num: 1,
                exp_denom: 1,
                sort_pref: 0,
            });
        }
    }
    Ok(comps)
}

fn components_to_string(comps: &[Component]) -> String {
    comps
        .iter()
        .map(|c| {
            if c.exp_num == 1 && c.exp_denom == 1 {
                c.name.clone()
            } else if c.exp_denom == 1 {
                format!("{}**{}", c.name, c.exp_num)
            } else {
                format!("{}**{}/{}", c.name, c.exp_num, c.exp_denom)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Combine components with identical names by adding their exponents
/// (as fractions), dropping any that cancel to zero. Unlike
/// [`reduce_components`] this does *no* SI-prefix or ad-hoc rewriting —
/// it only merges factors that are already textually identical, which
/// is what multiplication does on the wire without an explicit reduce.
fn merge_components(mut comps: Vec<Component>) -> Vec<Component> {
    let mut out: Vec<Component> = Vec::new();
    for c in comps.drain(..) {
        if let Some(existing) = out.iter_mut().find(|e: &&mut Component| e.name == c.name) {
            let common_den = existing.exp_denom * c.exp_denom / gcd(existing.exp_denom, c.exp_denom);
            let a = existing.exp_num * (common_den / existing.exp_denom);
            let b = c.exp_num * (common_den / c.exp_denom);
            let sum = a + b;
            let g = gcd(sum, common_den);
            existing.exp_num = sum / g.max(1);
            existing.exp_denom = (common_den / g.max(1)).max(1);
            if existing.exp_num == 0 {
                existing.exp_denom = 1;
            }
        } else {
            out.push(c);
        }
    }
    out.retain(|c| c.exp_num != 0);
    out
}

fn invert_components(comps: &[Component]) -> Vec<Component> {
    comps
        .iter()
        .map(|c| Component {
            name: c.name.clone(),
            exp_num: -c.exp_num,
            exp_denom: c.exp_denom,
            sort_pref: c.sort_pref,
        })
        .collect()
}

/// Apply the ad-hoc synonym table and SI-prefix stripping to a single
/// component, returning the scalar factor introduced (e.g. `1000.0` for
/// `km -> m`). `comp.name` and `comp.sort_pref` are rewritten in place;
/// `comp.exp_num`/`exp_denom` may also change (`Hz -> s**-1`).
fn reduce_component(comp: &mut Component) -> f64 {
    for entry in tables::AD_HOC_SYNONYMS {
        if comp.name.eq_ignore_ascii_case(entry.name) {
            comp.name = entry.canonical.to_string();
            comp.sort_pref = entry.sort_pref;
            return entry.factor.powf(comp.exponent());
        }
    }
    // SI prefix + base symbol, longest prefix first so "da" isn't
    // swallowed by "d".
    let mut prefixes: Vec<&tables::SiPrefix> = tables::SI_PREFIXES.iter().collect();
    prefixes.sort_by_key(|p| std::cmp::Reverse(p.symbol.len()));
    for prefix in prefixes {
        if let Some(rest) = comp.name.strip_prefix(prefix.symbol) {
            if !rest.is_empty() && tables::SI_BASE_SYMBOLS.contains(&rest) {
                let factor = 10f64.powi(prefix.power).powf(comp.exponent());
                comp.name = rest.to_string();
                comp.sort_pref = tables::sort_pref_for_symbol(rest);
                // Hz demotes to s**-1 even after a prefix strip (kHz -> (s**-1)**-? )
                if comp.name == "Hz" {
                    comp.name = "s".to_string();
                    comp.exp_num = -comp.exp_num;
                }
                return factor;
            }
        }
    }
    if comp.name == "Hz" {
        comp.name = "s".to_string();
        comp.exp_num = -comp.exp_num;
        comp.sort_pref = tables::sort_pref_for_symbol("s");
        return 1.0;
    }
    comp.sort_pref = tables::sort_pref_for_symbol(&comp.name);
    1.0
}

/// Sort components per the canonical ordering: positive exponents
/// before negative, then by descending sort preference, then by
/// descending exponent magnitude, then lexicographically by name.
fn canonical_sort(comps: &mut [Component]) {
    comps.sort_by(|a, b| {
        let a_pos = a.exp_num > 0;
        let b_pos = b.exp_num > 0;
        b_pos
            .cmp(&a_pos)
            .then(b.sort_pref.cmp(&a.sort_pref))
            .then(b.exponent().abs().partial_cmp(&a.exponent().abs()).unwrap())
            .then(a.name.cmp(&b.name))
    });
}

const EPOCH_NAMES: &[&str] = &["us2000", "mj1958", "t2000", "t1970", "ns1970", "UTC", "TT2000"];

/// The associated invertible interval unit for each epoch unit, e.g.
/// `us2000` (microseconds since 2000) has interval unit `"us"`.
fn epoch_interval(name: &str) -> Option<&'static str> {
    match name {
        "us2000" => Some("us"),
        "mj1958" => Some("days"),
        "t2000" => Some("s"),
        "t1970" => Some("s"),
        "ns1970" => Some("ns"),
        "UTC" => Some("s"),
        "TT2000" => Some("ns"),
        _ => None,
    }
}

impl Unit {
    /// Parse a unit expression, interning it verbatim. Parsing only
    /// validates grammar (balanced-enough exponent syntax); it does not
    /// reduce or canonicalize — call [`Unit::reduce`] for that.
    pub fn from_str(s: &str) -> Result<Unit> {
        if !EPOCH_NAMES.contains(&s) {
            parse_components(s)?;
        }
        Ok(intern(s))
    }

    /// The exact string this handle was interned from.
    pub fn to_str(&self) -> String {
        lookup(*self)
    }

    /// A human-typeset label using das2's `!b`/`!n`/`!a` escape markup
    /// for subscripts/superscripts, e.g. `V**2` becomes `V!a2!n`.
    pub fn to_label(&self) -> String {
        let raw = self.to_str();
        if EPOCH_NAMES.contains(&raw.as_str()) {
            return raw;
        }
        match parse_components(&raw) {
            Ok(comps) => comps
                .iter()
                .map(|c| {
                    if c.exp_num == 1 && c.exp_denom == 1 {
                        c.name.clone()
                    } else if c.exp_denom == 1 {
                        format!("{}!a{}!n", c.name, c.exp_num)
                    } else {
                        format!("{}!a{}/{}!n", c.name, c.exp_num, c.exp_denom)
                    }
                })
                .collect::<Vec<_>>()
                .join(" "),
            Err(_) => raw,
        }
    }

    /// `true` for the seven epoch/time-system names, which denote a
    /// point in time rather than a measurable, invertible quantity.
    pub fn is_epoch(&self) -> bool {
        EPOCH_NAMES.contains(&self.to_str().as_str())
    }

    /// The invertible duration unit associated with an epoch unit.
    /// Returns `InvalidOp` for non-epoch units.
    pub fn interval(&self) -> Result<Unit> {
        let raw = self.to_str();
        match epoch_interval(&raw) {
            Some(u) => Unit::from_str(u),
            None => Err(DasError::InvalidOp(format!("{raw} is not an epoch unit"))),
        }
    }

    /// Canonicalize: apply ad-hoc synonyms and SI-prefix reduction to
    /// every component, merge like terms, and sort into the canonical
    /// order. Returns `(unit, scale)` where `scale` is the multiplicative
    /// factor to apply to a *value* expressed in `self` to get the
    /// equivalent value in the returned unit (e.g. reducing `km` to `m`
    /// gives scale `1000.0`).
    pub fn reduce(&self) -> Result<(Unit, f64)> {
        let raw = self.to_str();
        if self.is_epoch() {
            return Ok((*self, 1.0));
        }
        let mut comps = parse_components(&raw)?;
        let mut scale = 1.0;
        for c in comps.iter_mut() {
            scale *= reduce_component(c);
        }
        let merged = merge_components(comps);
        let mut merged = merged;
        canonical_sort(&mut merged);
        let s = components_to_string(&merged);
        Ok((intern(&s), scale))
    }

    /// `true` if `self` and `other` reduce to the same canonical
    /// sequence (ignoring the scale factor), i.e. values are
    /// convertible between them.
    pub fn can_convert(&self, other: Unit) -> bool {
        if self.is_epoch() || other.is_epoch() {
            return epoch_can_convert(&self.to_str(), &other.to_str());
        }
        match (self.reduce(), other.reduce()) {
            (Ok((a, _)), Ok((b, _))) => a == b,
            _ => false,
        }
    }

    /// Multiply two non-epoch units, combining identical-named
    /// components directly (no SI reduction — `"km" * "m**-1"` stays
    /// `"km m**-1"`, it only cancels once [`Unit::reduce`] is called).
    pub fn multiply(&self, other: Unit) -> Result<Unit> {
        if self.is_epoch() || other.is_epoch() {
            return Err(DasError::InvalidOp("cannot multiply an epoch unit".into()));
        }
        let mut comps = parse_components(&self.to_str())?;
        comps.extend(parse_components(&other.to_str())?);
        let mut merged = merge_components(comps);
        canonical_sort(&mut merged);
        Ok(intern(&components_to_string(&merged)))
    }

    /// Divide `self` by `other`.
    pub fn divide(&self, other: Unit) -> Result<Unit> {
        self.multiply(other.invert()?)
    }

    /// Invert (reciprocal). Epoch units can't be inverted — use
    /// [`Unit::interval`] to get an invertible duration unit first.
    pub fn invert(&self) -> Result<Unit> {
        if self.is_epoch() {
            return Err(DasError::InvalidOp(format!(
                "{} is an epoch unit and cannot be inverted, use interval() first",
                self.to_str()
            )));
        }
        let comps = invert_components(&parse_components(&self.to_str())?);
        Ok(intern(&components_to_string(&comps)))
    }

    /// Raise to an integer power `num/denom` (denom = 1 for ordinary
    /// integer powers; use other values to express roots, e.g.
    /// `power(1, 2)` is a square root).
    pub fn power(&self, num: i32, denom: i32) -> Result<Unit> {
        if self.is_epoch() {
            return Err(DasError::InvalidOp(format!("{} is an epoch unit", self.to_str())));
        }
        if denom == 0 {
            return Err(DasError::InvalidOp("power denominator cannot be zero".into()));
        }
        let comps: Vec<Component> = parse_components(&self.to_str())?
            .into_iter()
            .map(|c| {
                let n = c.exp_num * num;
                let d = c.exp_denom * denom;
                let g = gcd(n, d);
                Component {
                    name: c.name,
                    exp_num: n / g,
                    exp_denom: (d / g).max(1),
                    sort_pref: c.sort_pref,
                }
            })
            .collect();
        Ok(intern(&components_to_string(&comps)))
    }

    /// `self.power(1, n)`, an n-th root.
    pub fn root(&self, n: i32) -> Result<Unit> {
        self.power(1, n)
    }

    /// Convert a value expressed in `self` to the equivalent value in
    /// `other`. Handles both ordinary unit conversion (via
    /// [`Unit::reduce`]) and epoch conversion (via [`crate::time`]).
    pub fn convert_to(&self, value: f64, other: Unit) -> Result<f64> {
        if self.is_epoch() || other.is_epoch() {
            return crate::time::convert_epoch(value, self.to_str().as_str(), other.to_str().as_str());
        }
        if !self.can_convert(other) {
            return Err(DasError::UnitConvert {
                from: self.to_str(),
                to: other.to_str(),
            });
        }
        let (_, scale_self) = self.reduce()?;
        let (_, scale_other) = other.reduce()?;
        Ok(value * scale_self / scale_other)
    }
}

fn epoch_can_convert(a: &str, b: &str) -> bool {
    EPOCH_NAMES.contains(&a) && EPOCH_NAMES.contains(&b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_verbatim_and_stable() {
        let a = Unit::from_str("km/s").unwrap();
        let b = Unit::from_str("km/s").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_str(), "km/s");
    }

    #[test]
    fn different_strings_same_dimension_are_distinct_handles() {
        let km = Unit::from_str("km").unwrap();
        let m = Unit::from_str("m").unwrap();
        assert_ne!(km, m);
        assert!(km.can_convert(m));
    }

    #[test]
    fn reduce_applies_ad_hoc_and_si_tables() {
        let hour = Unit::from_str("hour").unwrap();
        let (reduced, scale) = hour.reduce().unwrap();
        assert_eq!(reduced.to_str(), "s");
        assert_eq!(scale, 3600.0);

        let khz = Unit::from_str("kHz").unwrap();
        let (reduced, scale) = khz.reduce().unwrap();
        assert_eq!(reduced.to_str(), "s**-1");
        assert_eq!(scale, 1000.0);
    }

    #[test]
    fn multiply_by_inverse_reduces_to_dimensionless() {
        let v = Unit::from_str("V").unwrap();
        let inv = v.invert().unwrap();
        let product = v.multiply(inv).unwrap();
        let (reduced, _) = product.reduce().unwrap();
        assert_eq!(reduced, dimensionless());
    }

    #[test]
    fn power_and_divide_build_psd_units() {
        let v = Unit::from_str("V").unwrap();
        let hz = Unit::from_str("Hz").unwrap();
        let psd = v.power(2, 1).unwrap().divide(hz).unwrap();
        assert_eq!(psd.to_str(), "V**2 Hz**-1");
        let (reduced, _) = psd.reduce().unwrap();
        assert_eq!(reduced.to_str(), "V**2 s");
    }

    #[test]
    fn epoch_units_reject_algebra() {
        let t = Unit::from_str("us2000").unwrap();
        assert!(t.invert().is_err());
        assert!(t.multiply(Unit::from_str("V").unwrap()).is_err());
        assert_eq!(t.interval().unwrap().to_str(), "us");
    }

    #[test]
    fn convert_to_scales_correctly() {
        let km = Unit::from_str("km").unwrap();
        let m = Unit::from_str("m").unwrap();
        let out = km.convert_to(2.5, m).unwrap();
        assert!((out - 2500.0).abs() < 1e-9);
    }

    #[test]
    fn label_escapes_exponents() {
        let psd = Unit::from_str("V**2 Hz**-1").unwrap();
        assert_eq!(psd.to_label(), "V!a2!n Hz!a-1!n");
    }
}
