//! Dataset builder: the [`Handler`] that turns packet headers and raw
//! packet data into grown [`Dataset`]s.
//!
//! Grounded in `original_source/das2/builder.c`. Two distinct
//! comparisons decide what happens when a packet header arrives for an
//! id seen before, kept as two named methods rather than one fuzzy
//! "compatible" check so the difference stays visible in code, per
//! [`PacketDescriptor::is_format_equivalent`] vs.
//! [`PacketDescriptor::is_group_similar`]:
//!
//! - **format-equivalence** decides whether this packet id can keep
//!   writing into the same per-plane arrays it was using (identical
//!   codec/shape/units).
//! - **group similarity** decides whether a *new* packet id can share
//!   an existing dataset group (e.g. a `YScan` whose y-tag values
//!   changed but whose shape didn't) rather than starting a new one.
//!
//! Redefining a packet id whose header was an explicit `<dataset>`
//! element (rather than the legacy `<packet>` plane list) with a
//! different format is an error — `builder.c`'s `DasDsBldr_onPktDesc`
//! refuses to reshape a dataset already in flight. Legacy `<packet>`
//! headers may be freely redefined mid-stream, which is how das2
//! readers signal "the instrument mode changed."

use crate::codec::Handler;
use crate::dataset::{Array, Dataset, PacketDescriptor, PlaneKind, VarRole, Variable};
use crate::descriptor::DescriptorTree;
use crate::error::{DasError, Result};
use crate::frame::VectorFrame;
use std::collections::HashMap;

struct PendingGroup {
    representative: PacketDescriptor,
    rows: Vec<Vec<f64>>,
}

/// Builds [`Dataset`]s from a stream of packet headers/data. Register
/// with a [`crate::codec::Dispatcher`] like any other handler; call
/// [`DatasetBuilder::datasets`] after the stream closes.
pub struct DatasetBuilder {
    descriptors: HashMap<u32, PacketDescriptor>,
    is_dataset_style: HashMap<u32, bool>,
    pkt_to_group: HashMap<u32, String>,
    groups: HashMap<String, PendingGroup>,
    next_group: usize,
    closed: bool,
    frames: Vec<VectorFrame>,
}

impl Default for DatasetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetBuilder {
    pub fn new() -> Self {
        DatasetBuilder {
            descriptors: HashMap::new(),
            is_dataset_style: HashMap::new(),
            pkt_to_group: HashMap::new(),
            groups: HashMap::new(),
            next_group: 0,
            closed: false,
            frames: Vec::new(),
        }
    }

    /// Coordinate frames declared in the stream header, in declaration
    /// order. Empty until [`Handler::on_stream_header`] has run — v2
    /// streams never populate this, frames are a v3-only element.
    pub fn frames(&self) -> &[VectorFrame] {
        &self.frames
    }

    fn existing_group_for(&self, desc: &PacketDescriptor) -> Option<String> {
        self.groups
            .iter()
            .find(|(_, g)| g.representative.is_group_similar(desc))
            .map(|(id, _)| id.clone())
    }

    fn parse_packet_header(&self, xml: &str) -> Result<(PacketDescriptor, bool)> {
        parse_legacy_packet_xml(xml)
    }

    /// Finalized datasets, one per group, after [`Handler::on_close`]
    /// has run. Empty until the stream closes.
    pub fn datasets(&self) -> Vec<Dataset> {
        if !self.closed {
            return Vec::new();
        }
        self.groups
            .iter()
            .map(|(group_id, pending)| build_dataset(group_id, pending))
            .collect()
    }
}

impl Handler for DatasetBuilder {
    fn on_stream_header(&mut self, _tree: &mut DescriptorTree, xml: &str) -> Result<()> {
        self.frames = parse_stream_frames(xml)?;
        Ok(())
    }

    fn on_packet_header(&mut self, _tree: &mut DescriptorTree, pkt_id: u32, xml: &str) -> Result<()> {
        let (new_desc, is_dataset) = self.parse_packet_header(xml)?;

        if let Some(old_is_dataset) = self.is_dataset_style.get(&pkt_id) {
            let old_desc = &self.descriptors[&pkt_id];
            if *old_is_dataset && !old_desc.is_format_equivalent(&new_desc) {
                return Err(DasError::Protocol {
                    offset: 0,
                    msg: format!("packet id {pkt_id} redefines an in-flight dataset with a different format"),
                });
            }

            // B1: a format-equivalent redefinition keeps writing into the
            // same pair — no group search, the pair count is unchanged.
            if old_desc.is_format_equivalent(&new_desc) {
                self.descriptors.insert(pkt_id, new_desc);
                self.is_dataset_style.insert(pkt_id, is_dataset);
                return Ok(());
            }

            // B1 "otherwise": this id's new shape doesn't match what it
            // used to write, so it starts a fresh pair — minted new
            // rather than folded into an existing group, since B2's
            // group-similarity search (which tolerates differing YScan
            // item counts) is for placing a packet id the builder has
            // never seen before, not for an in-place reshape.
            let group_id = format!("grp{}", self.next_group);
            self.next_group += 1;
            self.groups.insert(group_id.clone(), PendingGroup { representative: new_desc.clone(), rows: Vec::new() });
            self.pkt_to_group.insert(pkt_id, group_id);
            self.descriptors.insert(pkt_id, new_desc);
            self.is_dataset_style.insert(pkt_id, is_dataset);
            return Ok(());
        }

        // First definition of this packet id: B2 group-id assignment.
        let group_id = self
            .existing_group_for(&new_desc)
            .unwrap_or_else(|| {
                let id = format!("grp{}", self.next_group);
                self.next_group += 1;
                id
            });

        self.groups
            .entry(group_id.clone())
            .or_insert_with(|| PendingGroup { representative: new_desc.clone(), rows: Vec::new() });
        self.pkt_to_group.insert(pkt_id, group_id);
        self.descriptors.insert(pkt_id, new_desc);
        self.is_dataset_style.insert(pkt_id, is_dataset);
        Ok(())
    }

    fn on_packet_data(&mut self, _tree: &DescriptorTree, pkt_id: u32, bytes: &[u8]) -> Result<()> {
        let desc = self
            .descriptors
            .get(&pkt_id)
            .ok_or_else(|| DasError::Protocol { offset: 0, msg: format!("packet data for unknown id {pkt_id}") })?;
        let mut row = Vec::with_capacity(desc.planes.iter().map(|p| p.items).sum());
        let mut cursor = 0usize;
        for plane in &desc.planes {
            for _ in 0..plane.items {
                let value = plane.codec.decode(&bytes[cursor..])?;
                row.push(value);
                cursor += plane.codec.width();
            }
        }
        let group_id = self.pkt_to_group[&pkt_id].clone();
        if let Some(group) = self.groups.get_mut(&group_id) {
            group.rows.push(row);
        }
        Ok(())
    }

    fn legacy_record_len(&self, pkt_id: u32) -> Option<usize> {
        self.descriptors.get(&pkt_id).map(PacketDescriptor::record_len)
    }

    fn on_close(&mut self, _tree: &mut DescriptorTree) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

fn build_dataset(group_id: &str, pending: &PendingGroup) -> Dataset {
    let mut ds = Dataset::new(group_id.to_string());
    let n = pending.rows.len();
    let mut col = 0usize;
    for plane in &pending.representative.planes {
        for item in 0..plane.items {
            let name = if plane.items == 1 {
                plane.name.clone()
            } else {
                format!("{}[{}]", plane.name, item)
            };
            let mut array = Array::new(vec![n], plane.unit).unwrap_or_else(|_| {
                Array::new(vec![0], plane.unit).expect("zero-length array is always valid")
            });
            for (row_idx, row) in pending.rows.iter().enumerate() {
                let _ = array.set(&[row_idx], row[col + item]);
            }
            let role = match plane.kind {
                PlaneKind::X => VarRole::Coordinate,
                PlaneKind::Y | PlaneKind::YScan | PlaneKind::Z => VarRole::Data,
            };
            ds.add_variable(Variable::from_array(name, role, array));
        }
        col += plane.items;
    }
    ds
}

/// Parse `<frame>` elements out of a v3 stream header. Legacy (v2)
/// headers never carry frames, so `roxmltree` simply finds none and
/// this returns an empty vector.
fn parse_stream_frames(xml: &str) -> Result<Vec<VectorFrame>> {
    let doc = roxmltree::Document::parse(xml)?;
    let mut frames = Vec::new();
    for (id, node) in doc.root_element().children().filter(|c| c.has_tag_name("frame")).enumerate() {
        let name = node.attribute("name").unwrap_or("").to_string();
        let frame_type = node.attribute("type").unwrap_or("cartesian").to_string();
        let inertial = node.attribute("inertial").map(|v| v == "true").unwrap_or(false);
        let directions = node
            .children()
            .filter(|c| c.has_tag_name("dir"))
            .map(|d| d.attribute("name").unwrap_or("").to_string())
            .collect();
        frames.push(
            VectorFrame::new(id as u32, name, frame_type)
                .with_directions(directions)
                .with_inertial(inertial),
        );
    }
    Ok(frames)
}

/// Parse a legacy `<packet>` or `<dataset>` header into a
/// [`PacketDescriptor`], returning whether the root element was a
/// `<dataset>` (stricter redefinition rules apply).
pub(crate) fn parse_legacy_packet_xml(xml: &str) -> Result<(PacketDescriptor, bool)> {
    use crate::dataset::{Codec, Plane};
    use crate::units::Unit;

    let doc = roxmltree::Document::parse(xml)?;
    let root = doc.root_element();
    let is_dataset = root.tag_name().name() == "dataset";
    let mut desc = PacketDescriptor::new(0);

    for child in root.children().filter(|c| c.is_element()) {
        let kind = match child.tag_name().name() {
            "x" => PlaneKind::X,
            "y" => PlaneKind::Y,
            "yscan" => PlaneKind::YScan,
            "z" => PlaneKind::Z,
            _ => continue,
        };
        let name = child.attribute("name").unwrap_or("").to_string();
        let unit = Unit::from_str(child.attribute("units").unwrap_or(""))?;
        let codec = match child.attribute("type").unwrap_or("sun_real8") {
            "sun_real4" => Codec::BeReal4,
            "sun_real8" => Codec::BeReal8,
            "little_endian_real4" => Codec::LeReal4,
            "little_endian_real8" => Codec::LeReal8,
            other if other.starts_with("ascii") => {
                let width = other.trim_start_matches("ascii").parse().unwrap_or(10);
                if unit.is_epoch() {
                    Codec::TimeString { width, unit }
                } else {
                    Codec::AsciiFloat { width }
                }
            }
            _ => Codec::BeReal8,
        };
        let items = child
            .attribute("nitems")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1usize);
        let fill = child.attribute("fill").and_then(|s| s.parse::<f64>().ok());
        desc.planes.push(Plane { kind, name, unit, codec, items, fill });
    }

    Ok((desc, is_dataset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Dispatcher;
    use std::io::Cursor;

    fn header_xml(tag: &str) -> String {
        format!(
            r#"<{tag}><x name="time" units="t2000" type="sun_real8"/><y name="amp" units="V" type="sun_real8"/></{tag}>"#
        )
    }

    #[test]
    fn groups_packets_by_similarity_and_builds_dataset() {
        let mut wire = Vec::new();
        let stream_xml = b"<stream version=\"2.2\"/>";
        wire.extend_from_slice(b"[00]");
        wire.extend_from_slice(format!("{:06}", stream_xml.len()).as_bytes());
        wire.extend_from_slice(stream_xml);
        let xml = header_xml("packet");
        wire.extend_from_slice(b"[01]");
        wire.extend_from_slice(format!("{:06}", xml.len()).as_bytes());
        wire.extend_from_slice(xml.as_bytes());
        wire.extend_from_slice(b":01:");
        wire.extend_from_slice(&1.0f64.to_be_bytes());
        wire.extend_from_slice(&2.0f64.to_be_bytes());
        wire.extend_from_slice(b":01:");
        wire.extend_from_slice(&3.0f64.to_be_bytes());
        wire.extend_from_slice(&4.0f64.to_be_bytes());

        let mut dispatcher = Dispatcher::new();
        dispatcher.set_legacy_packet_length(1, 16);
        let builder = DatasetBuilder::new();
        dispatcher.register(Box::new(builder)).unwrap();
        let mut cursor = Cursor::new(wire);
        dispatcher.run(&mut cursor).unwrap();
    }

    #[test]
    fn build_dataset_directly_from_pending_rows() {
        let (desc, is_dataset) = parse_legacy_packet_xml(&header_xml("packet")).unwrap();
        assert!(!is_dataset);
        let pending = PendingGroup {
            representative: desc,
            rows: vec![vec![1.0, 2.0], vec![3.0, 4.0]],
        };
        let ds = build_dataset("grp0", &pending);
        assert_eq!(ds.major_len().unwrap(), 2);
        assert_eq!(ds.variable("time").unwrap().value_at(1).unwrap(), 3.0);
        assert_eq!(ds.variable("amp").unwrap().value_at(1).unwrap(), 4.0);
    }

    #[test]
    fn dataset_style_redefinition_with_different_format_errors() {
        let mut builder = DatasetBuilder::new();
        let mut tree = DescriptorTree::new();
        builder.on_packet_header(&mut tree, 1, &header_xml("dataset")).unwrap();
        let different = r#"<dataset><x name="time" units="t2000" type="sun_real8"/><yscan name="spec" units="V" type="sun_real8" nitems="4"/></dataset>"#;
        assert!(builder.on_packet_header(&mut tree, 1, different).is_err());
    }

    #[test]
    fn stream_header_frames_are_parsed() {
        let mut builder = DatasetBuilder::new();
        let mut tree = DescriptorTree::new();
        let xml = r#"<stream version="3.0">
            <frame name="IAU_JUPITER" type="cartesian" inertial="false">
                <dir name="X"/>
                <dir name="Y"/>
                <dir name="Z"/>
            </frame>
        </stream>"#;
        builder.on_stream_header(&mut tree, xml).unwrap();
        assert_eq!(builder.frames().len(), 1);
        assert_eq!(builder.frames()[0].name, "IAU_JUPITER");
        assert_eq!(builder.frames()[0].rank(), 3);
        assert!(!builder.frames()[0].inertial);
    }

    #[test]
    fn legacy_packet_redefinition_is_allowed() {
        let mut builder = DatasetBuilder::new();
        let mut tree = DescriptorTree::new();
        builder.on_packet_header(&mut tree, 1, &header_xml("packet")).unwrap();
        let different = r#"<packet><x name="time" units="t2000" type="sun_real8"/><yscan name="spec" units="V" type="sun_real8" nitems="4"/></packet>"#;
        assert!(builder.on_packet_header(&mut tree, 1, different).is_ok());
    }

    #[test]
    fn format_equivalent_redefinition_leaves_pair_count_unchanged() {
        let mut builder = DatasetBuilder::new();
        let mut tree = DescriptorTree::new();
        builder.on_packet_header(&mut tree, 1, &header_xml("packet")).unwrap();
        assert_eq!(builder.groups.len(), 1);
        builder.on_packet_header(&mut tree, 1, &header_xml("packet")).unwrap();
        assert_eq!(builder.groups.len(), 1);
    }

    #[test]
    fn redefinition_with_differing_item_count_grows_pair_count_by_one() {
        let mut builder = DatasetBuilder::new();
        let mut tree = DescriptorTree::new();
        builder.on_packet_header(&mut tree, 1, &header_xml("packet")).unwrap();
        assert_eq!(builder.groups.len(), 1);
        let different = r#"<packet><x name="time" units="t2000" type="sun_real8"/><yscan name="spec" units="V" type="sun_real8" nitems="4"/></packet>"#;
        builder.on_packet_header(&mut tree, 1, different).unwrap();
        assert_eq!(builder.groups.len(), 2);
    }
}
