//! Rank-bounded typed arrays and the binary codecs that (de)serialize
//! their elements to and from wire bytes.

use crate::error::{DasError, Result};

/// das2 datasets never exceed 8 indices; fixing this bound lets
/// [`Array`] store its shape inline instead of behind another
/// allocation.
pub const MAX_RANK: usize = 8;

/// How one scalar element is packed on the wire. Mirrors the handful
/// of codecs `original_source/das2/serial3.h`'s encode/decode pair
/// supports: fixed-width binary in either byte order, and fixed-width
/// ASCII.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Codec {
    BeReal4,
    BeReal8,
    LeReal4,
    LeReal8,
    AsciiFloat { width: usize },
    /// Fixed-width ISO/ordinal calendar string (`type="ascii24"` etc.
    /// when the plane's unit is an epoch unit). Decodes via
    /// [`crate::time::BrokenDownTime::parse`] and
    /// [`crate::time::datum_from_dt`], converting the calendar time to
    /// a numeric value in `unit`.
    TimeString { width: usize, unit: crate::units::Unit },
}

impl Codec {
    pub fn width(&self) -> usize {
        match self {
            Codec::BeReal4 | Codec::LeReal4 => 4,
            Codec::BeReal8 | Codec::LeReal8 => 8,
            Codec::AsciiFloat { width } => *width,
            Codec::TimeString { width, .. } => *width,
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<f64> {
        if bytes.len() < self.width() {
            return Err(DasError::PartialPacket(format!(
                "codec needs {} bytes, got {}",
                self.width(),
                bytes.len()
            )));
        }
        let b = &bytes[..self.width()];
        Ok(match self {
            Codec::BeReal4 => f32::from_be_bytes(b.try_into().unwrap()) as f64,
            Codec::LeReal4 => f32::from_le_bytes(b.try_into().unwrap()) as f64,
            Codec::BeReal8 => f64::from_be_bytes(b.try_into().unwrap()),
            Codec::LeReal8 => f64::from_le_bytes(b.try_into().unwrap()),
            Codec::AsciiFloat { .. } => std::str::from_utf8(b)
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .ok_or_else(|| DasError::Protocol { offset: 0, msg: format!("bad ascii float field {b:?}") })?,
            Codec::TimeString { unit, .. } => {
                let s = std::str::from_utf8(b)
                    .map_err(|_| DasError::Protocol { offset: 0, msg: format!("bad time string field {b:?}") })?
                    .trim();
                let bdt = crate::time::BrokenDownTime::parse(s)?;
                crate::time::datum_from_dt(unit.to_str().as_str(), &bdt)?
            }
        })
    }

    pub fn encode(&self, value: f64, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Codec::BeReal4 => out.extend_from_slice(&(value as f32).to_be_bytes()),
            Codec::LeReal4 => out.extend_from_slice(&(value as f32).to_le_bytes()),
            Codec::BeReal8 => out.extend_from_slice(&value.to_be_bytes()),
            Codec::LeReal8 => out.extend_from_slice(&value.to_le_bytes()),
            Codec::AsciiFloat { width } => {
                let text = format!("{value:width$.6e}", width = width - 1);
                let text = if text.len() > *width { text[..*width].to_string() } else { text };
                let padded = format!("{text:>width$}", width = width);
                out.extend_from_slice(padded.as_bytes());
            }
            Codec::TimeString { width, unit } => {
                let bdt = crate::time::dt_from_datum(unit.to_str().as_str(), value)?;
                let text = bdt.to_ascii24();
                let text = if text.len() > *width { text[..*width].to_string() } else { text };
                let padded = format!("{text:<width$}", width = width);
                out.extend_from_slice(padded.as_bytes());
            }
        }
        Ok(())
    }
}

/// A dense, row-major, rank ≤ [`MAX_RANK`] array of `f64` values with
/// an attached [`crate::units::Unit`].
#[derive(Clone, Debug)]
pub struct Array {
    shape: Vec<usize>,
    values: Vec<f64>,
    unit: crate::units::Unit,
}

impl Array {
    pub fn new(shape: Vec<usize>, unit: crate::units::Unit) -> Result<Array> {
        if shape.len() > MAX_RANK {
            return Err(DasError::ShapeMismatch(format!(
                "rank {} exceeds maximum of {MAX_RANK}",
                shape.len()
            )));
        }
        let total: usize = shape.iter().product();
        Ok(Array { shape, values: vec![f64::NAN; total], unit })
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn unit(&self) -> crate::units::Unit {
        self.unit
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn flat_index(&self, idx: &[usize]) -> Result<usize> {
        if idx.len() != self.shape.len() {
            return Err(DasError::ShapeMismatch(format!(
                "index rank {} doesn't match array rank {}",
                idx.len(),
                self.shape.len()
            )));
        }
        let mut flat = 0usize;
        for (i, &dim) in idx.iter().enumerate() {
            if dim >= self.shape[i] {
                return Err(DasError::ShapeMismatch(format!(
                    "index {dim} out of bounds for axis {i} of size {}",
                    self.shape[i]
                )));
            }
            flat = flat * self.shape[i] + dim;
        }
        Ok(flat)
    }

    pub fn get(&self, idx: &[usize]) -> Result<f64> {
        Ok(self.values[self.flat_index(idx)?])
    }

    pub fn set(&mut self, idx: &[usize], value: f64) -> Result<()> {
        let flat = self.flat_index(idx)?;
        self.values[flat] = value;
        Ok(())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// Grows index 0 by `n_items` rows of `NaN`, doubling the backing
    /// allocation rather than reallocating per call — index 0 is the
    /// ragged "record count" axis that a reader like
    /// `original_source/das2/dataset.c`'s `DasAry_append` extends one
    /// record at a time as packets arrive.
    pub fn append(&mut self, n_items: usize) -> Result<()> {
        let Some(&first) = self.shape.first() else {
            return Err(DasError::ShapeMismatch("cannot append to a rank-0 array".into()));
        };
        let _ = first;
        let row_len: usize = self.shape[1..].iter().product();
        let additional = n_items * row_len;
        let needed = self.values.len() + additional;
        if needed > self.values.capacity() {
            let new_cap = needed.max(self.values.capacity() * 2);
            self.values.reserve(new_cap - self.values.len());
        }
        self.values.resize(needed, f64::NAN);
        self.shape[0] += n_items;
        Ok(())
    }

    /// Truncates index 0 back to zero rows, keeping the allocation so a
    /// reused builder doesn't pay for reallocation on the next stream.
    pub fn clear(&mut self) -> Result<()> {
        if self.shape.is_empty() {
            return Err(DasError::ShapeMismatch("cannot clear a rank-0 array".into()));
        }
        self.values.truncate(0);
        self.shape[0] = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::Unit;

    #[test]
    fn codec_roundtrips_be_real8() {
        let codec = Codec::BeReal8;
        let mut buf = Vec::new();
        codec.encode(3.5, &mut buf).unwrap();
        assert_eq!(buf.len(), 8);
        assert_eq!(codec.decode(&buf).unwrap(), 3.5);
    }

    #[test]
    fn array_indexes_2d_row_major() {
        let unit = Unit::from_str("V").unwrap();
        let mut a = Array::new(vec![2, 3], unit).unwrap();
        a.set(&[1, 2], 9.0).unwrap();
        assert_eq!(a.get(&[1, 2]).unwrap(), 9.0);
        assert_eq!(a.len(), 6);
    }

    #[test]
    fn array_rejects_rank_over_max() {
        let unit = Unit::from_str("V").unwrap();
        assert!(Array::new(vec![1; MAX_RANK + 1], unit).is_err());
    }

    #[test]
    fn array_rejects_out_of_bounds_index() {
        let unit = Unit::from_str("V").unwrap();
        let a = Array::new(vec![2, 2], unit).unwrap();
        assert!(a.get(&[5, 0]).is_err());
    }

    #[test]
    fn append_grows_ragged_index_zero() {
        let unit = Unit::from_str("V").unwrap();
        let mut a = Array::new(vec![0, 3], unit).unwrap();
        a.append(2).unwrap();
        assert_eq!(a.shape(), &[2, 3]);
        assert_eq!(a.len(), 6);
        a.set(&[1, 2], 7.0).unwrap();
        assert_eq!(a.get(&[1, 2]).unwrap(), 7.0);

        a.append(1).unwrap();
        assert_eq!(a.shape(), &[3, 3]);
        assert_eq!(a.get(&[1, 2]).unwrap(), 7.0);
    }

    #[test]
    fn clear_truncates_index_zero_to_zero() {
        let unit = Unit::from_str("V").unwrap();
        let mut a = Array::new(vec![0], unit).unwrap();
        a.append(5).unwrap();
        assert_eq!(a.len(), 5);
        a.clear().unwrap();
        assert_eq!(a.shape(), &[0]);
        assert_eq!(a.len(), 0);
        a.append(2).unwrap();
        assert_eq!(a.len(), 2);
    }
}
