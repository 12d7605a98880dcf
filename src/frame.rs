//! Coordinate-frame metadata for vector-valued variables.
//!
//! das2/das3 streams can declare named reference frames (`GSE`, `GSM`,
//! despun-spacecraft frames, ...) that vector-valued datasets point
//! into; a [`VectorFrame`] is the descriptor-level record of one such
//! frame, independent of any particular dataset.

/// A named vector reference frame, as declared at the stream level.
#[derive(Clone, Debug, PartialEq)]
pub struct VectorFrame {
    pub id: u32,
    pub name: String,
    pub frame_type: String,
    /// Per-axis labels, e.g. `["X", "Y", "Z"]` or `["R", "T", "N"]`.
    pub direction_labels: Vec<String>,
    /// `true` if the frame's axes are fixed relative to the stars
    /// rather than spinning with the spacecraft body.
    pub inertial: bool,
}

impl VectorFrame {
    pub fn new(id: u32, name: impl Into<String>, frame_type: impl Into<String>) -> Self {
        VectorFrame {
            id,
            name: name.into(),
            frame_type: frame_type.into(),
            direction_labels: Vec::new(),
            inertial: false,
        }
    }

    pub fn with_directions(mut self, labels: Vec<String>) -> Self {
        self.direction_labels = labels;
        self
    }

    pub fn with_inertial(mut self, inertial: bool) -> Self {
        self.inertial = inertial;
        self
    }

    pub fn rank(&self) -> usize {
        self.direction_labels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_methods_set_fields() {
        let f = VectorFrame::new(1, "GSE", "cartesian")
            .with_directions(vec!["X".into(), "Y".into(), "Z".into()])
            .with_inertial(false);
        assert_eq!(f.rank(), 3);
        assert_eq!(f.name, "GSE");
        assert!(!f.inertial);
    }
}
