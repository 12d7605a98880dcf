//! Legacy (v2) packet descriptors: a fixed-record-length list of
//! planes, each a named, unit-tagged, codec-decoded field or
//! fixed-width vector field ("YScan").

use super::array::Codec;
use crate::units::Unit;

/// The four plane roles a legacy packet descriptor can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaneKind {
    X,
    Y,
    YScan,
    Z,
}

/// One field within a legacy packet's fixed binary record.
#[derive(Clone, Debug, PartialEq)]
pub struct Plane {
    pub kind: PlaneKind,
    pub name: String,
    pub unit: Unit,
    pub codec: Codec,
    /// Number of values per record; 1 for scalar planes (`X`/`Y`/`Z`),
    /// the scan length for `YScan`.
    pub items: usize,
    /// Declared fill value (`fill=` attribute); values equal to this are
    /// excluded from downstream statistics (see
    /// [`crate::reducer::Accumulator::add`]).
    pub fill: Option<f64>,
}

impl Plane {
    pub fn byte_len(&self) -> usize {
        self.codec.width() * self.items
    }
}

/// A legacy packet descriptor: an ordered list of [`Plane`]s whose
/// combined byte length is the fixed record size for this packet id.
#[derive(Clone, Debug)]
pub struct PacketDescriptor {
    pub pkt_id: u32,
    pub planes: Vec<Plane>,
}

impl PacketDescriptor {
    pub fn new(pkt_id: u32) -> Self {
        PacketDescriptor { pkt_id, planes: Vec::new() }
    }

    pub fn record_len(&self) -> usize {
        self.planes.iter().map(Plane::byte_len).sum()
    }

    /// `true` if `self` and `other` have the same plane kinds, codecs,
    /// item counts and units in the same order — i.e. produce
    /// byte-identical record layouts. This is the narrower of the two
    /// comparisons `original_source/das2/builder.c` makes: format
    /// equivalence, used to decide whether two packet ids can share one
    /// dataset's `<packet>` encoder.
    pub fn is_format_equivalent(&self, other: &PacketDescriptor) -> bool {
        if self.planes.len() != other.planes.len() {
            return false;
        }
        self.planes.iter().zip(&other.planes).all(|(a, b)| {
            a.kind == b.kind && a.codec == b.codec && a.items == b.items && a.unit == b.unit
        })
    }

    /// `true` if `self` and `other` are similar enough to belong to
    /// the same dataset *group* — same plane kinds, units and names,
    /// ignoring `YScan` y-tag lists (and therefore ignoring `items`,
    /// since a differing y-tag list commonly means a differing scan
    /// length too). This is the broader of the two comparisons
    /// `builder.c` makes (`_DasDsBldr_getExistingGroup`): two packets
    /// can share a group even if their `YScan` axis values — and
    /// channel counts — differ, as long as the plane kinds, units and
    /// names agree.
    pub fn is_group_similar(&self, other: &PacketDescriptor) -> bool {
        if self.planes.len() != other.planes.len() {
            return false;
        }
        self.planes
            .iter()
            .zip(&other.planes)
            .all(|(a, b)| a.kind == b.kind && a.name == b.name && a.unit == b.unit)
    }
}
