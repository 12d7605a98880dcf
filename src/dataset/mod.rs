//! The in-memory dataset model: typed arrays, coordinate/data
//! variables (array-backed or computed), and the dataset that groups
//! them under one index space.

pub mod array;
pub mod packet;

pub use array::{Array, Codec, MAX_RANK};
pub use packet::{PacketDescriptor, Plane, PlaneKind};

use crate::error::{DasError, Result};
use crate::frame::VectorFrame;
use crate::units::Unit;

/// Whether a variable supplies an independent axis (coordinate) or a
/// measured quantity (data) along that axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarRole {
    Coordinate,
    Data,
}

/// How a [`Variable`]'s values are produced.
#[derive(Clone, Debug)]
pub enum VariableBacking {
    /// Values come straight from a decoded [`Array`].
    Array(Array),
    /// Values are computed from a start value and a fixed step — the
    /// common case for a degenerate (stored-once) time axis, which
    /// das2 headers encode as `<sequence>` rather than writing out
    /// every sample.
    Sequence { start: f64, step: f64, unit: Unit, len: usize },
}

/// One named quantity within a [`Dataset`]: a time axis, a frequency
/// axis, a measured amplitude, and so on.
#[derive(Clone, Debug)]
pub struct Variable {
    pub name: String,
    pub role: VarRole,
    pub backing: VariableBacking,
}

impl Variable {
    pub fn from_array(name: impl Into<String>, role: VarRole, array: Array) -> Self {
        Variable { name: name.into(), role, backing: VariableBacking::Array(array) }
    }

    pub fn sequence(name: impl Into<String>, role: VarRole, start: f64, step: f64, unit: Unit, len: usize) -> Self {
        Variable { name: name.into(), role, backing: VariableBacking::Sequence { start, step, unit, len } }
    }

    pub fn unit(&self) -> Unit {
        match &self.backing {
            VariableBacking::Array(a) => a.unit(),
            VariableBacking::Sequence { unit, .. } => *unit,
        }
    }

    pub fn len(&self) -> usize {
        match &self.backing {
            VariableBacking::Array(a) => a.shape().first().copied().unwrap_or(a.len()),
            VariableBacking::Sequence { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The scalar value at major index `i`. For a rank>1 array-backed
    /// variable this is only meaningful combined with further indices
    /// via [`Variable::value_at_index`].
    pub fn value_at(&self, i: usize) -> Result<f64> {
        match &self.backing {
            VariableBacking::Array(a) if a.rank() == 1 => a.get(&[i]),
            VariableBacking::Array(_) => Err(DasError::ShapeMismatch(
                "value_at needs a full index for rank>1 arrays, use value_at_index".into(),
            )),
            VariableBacking::Sequence { start, step, len, .. } => {
                if i >= *len {
                    return Err(DasError::ShapeMismatch(format!("index {i} out of bounds for length {len}")));
                }
                Ok(start + step * i as f64)
            }
        }
    }

    pub fn value_at_index(&self, idx: &[usize]) -> Result<f64> {
        match &self.backing {
            VariableBacking::Array(a) => a.get(idx),
            VariableBacking::Sequence { .. } => {
                if idx.len() != 1 {
                    return Err(DasError::ShapeMismatch("sequence variables are rank 1".into()));
                }
                self.value_at(idx[0])
            }
        }
    }
}

/// A group of variables sharing one major index space, optionally
/// pointing into a declared [`VectorFrame`].
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    pub group_id: String,
    pub variables: Vec<Variable>,
    pub frame: Option<VectorFrame>,
}

impl Dataset {
    pub fn new(group_id: impl Into<String>) -> Self {
        Dataset { group_id: group_id.into(), variables: Vec::new(), frame: None }
    }

    pub fn add_variable(&mut self, v: Variable) {
        self.variables.push(v);
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn coordinate_variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter().filter(|v| v.role == VarRole::Coordinate)
    }

    pub fn data_variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter().filter(|v| v.role == VarRole::Data)
    }

    /// The shared major-index length, i.e. the length of the first
    /// coordinate variable. Errors if variables disagree, since every
    /// variable in a dataset must walk the same major index.
    pub fn major_len(&self) -> Result<usize> {
        let mut lens = self.variables.iter().map(Variable::len);
        let first = lens.next().unwrap_or(0);
        if lens.all(|l| l == first) {
            Ok(first)
        } else {
            Err(DasError::ShapeMismatch(format!(
                "dataset '{}' has variables with disagreeing major-index lengths",
                self.group_id
            )))
        }
    }
}
