//! Time-binning reducer: a streaming per-bin accumulator that
//! decimates along the X axis while preserving stream morphology.
//!
//! Grounded in `original_source/utilities/das2_bin_avgsec.c`. Each
//! incoming record's X value selects a bin; Y/Z/YScan planes accumulate
//! count/sum/sum-of-squares/min/max until the bin changes, at which
//! point the prior bin flushes as one or more output planes
//! (`<name>`, `<name>.min`, `<name>.max`, `<name>.stddev`) tagged with
//! an `operation` property (`BIN_AVG`/`BIN_MIN`/`BIN_MAX`/
//! `BIN_STDDEV`), mirroring the original's derived-plane naming
//! convention.
//!
//! `YScan` planes get one more decision: [`should_collapse`]. A true
//! waveform capture — many samples much finer than the output bin
//! width — collapses to one set of scalar statistics per bin, the way
//! a burst capture's time-domain samples all describe "what happened
//! in this bin." A spectral scan's items are independent frequency
//! channels and must keep per-channel statistics instead.

use crate::codec::Handler;
use crate::descriptor::{DescriptorId, DescriptorKind, DescriptorTree, PropValue};
use crate::dataset::{PacketDescriptor, PlaneKind};
use crate::error::{DasError, Result};
use crate::units::Unit;
use std::collections::HashMap;

/// Running count/sum/sum-of-squares/min/max for one scalar quantity.
#[derive(Clone, Copy, Debug, Default)]
pub struct Accumulator {
    count: u64,
    sum: f64,
    sum_sq: f64,
    min: f64,
    max: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Accumulator { count: 0, sum: 0.0, sum_sq: 0.0, min: f64::INFINITY, max: f64::NEG_INFINITY }
    }

    /// Accumulate `value`, unless it's `NaN`. Callers holding a plane's
    /// declared fill value must check it themselves before calling —
    /// see `on_packet_data`'s fill-skip, per §4.9 Fill handling.
    pub fn add(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        self.count += 1;
        self.sum += value;
        self.sum_sq += value * value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            f64::NAN
        } else {
            self.sum / self.count as f64
        }
    }

    pub fn min(&self) -> f64 {
        if self.count == 0 { f64::NAN } else { self.min }
    }

    pub fn max(&self) -> f64 {
        if self.count == 0 { f64::NAN } else { self.max }
    }

    /// Population standard deviation; `NaN` with fewer than 2 samples.
    pub fn stddev(&self) -> f64 {
        if self.count < 2 {
            return f64::NAN;
        }
        let n = self.count as f64;
        let variance = (self.sum_sq - self.sum * self.sum / n) / (n - 1.0);
        variance.max(0.0).sqrt()
    }
}

/// Whether the X coordinate emitted for a bin is its left edge or its
/// midpoint.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinCenterPolicy {
    BinStart,
    BinCenter,
}

/// True if a `YScan` plane with `items` values, each separated by
/// `native_cadence` (seconds), fits entirely within one output bin of
/// width `bin_width` (seconds) — in which case its items describe a
/// single waveform burst and should collapse to scalar per-bin
/// statistics rather than keeping one accumulator per item.
pub fn should_collapse(items: usize, native_cadence: f64, bin_width: f64) -> bool {
    items as f64 * native_cadence <= bin_width
}

/// Which statistic a [`BinOutput`] carries. Each maps to one derived
/// plane name suffix and `operation` property, per §4.9 Emission:
/// the average keeps the source plane's bare name, the rest append
/// `.min`/`.max`/`.stddev`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinStat {
    Avg,
    Min,
    Max,
    StdDev,
}

impl BinStat {
    fn name_suffix(&self) -> &'static str {
        match self {
            BinStat::Avg => "",
            BinStat::Min => ".min",
            BinStat::Max => ".max",
            BinStat::StdDev => ".stddev",
        }
    }

    fn operation(&self) -> &'static str {
        match self {
            BinStat::Avg => "BIN_AVG",
            BinStat::Min => "BIN_MIN",
            BinStat::Max => "BIN_MAX",
            BinStat::StdDev => "BIN_STDDEV",
        }
    }
}

/// One statistic flushed for one bin of one source plane.
#[derive(Clone, Debug)]
pub struct BinOutput {
    pub plane_name: String,
    pub stat: BinStat,
    pub x_value: f64,
    pub value: f64,
    pub count: u64,
}

struct PlaneState {
    kind: PlaneKind,
    name: String,
    items: usize,
    collapse: bool,
    fill: Option<f64>,
    scalar: Accumulator,
    per_item: Vec<Accumulator>,
    /// Raw-sample accumulators feeding `stddev()` only. Per
    /// `das2_bin_avgsec.c`'s accumulate-buffer push (around line 568):
    /// whenever at least one item in a record is non-fill, *every* item
    /// of that record — fill values included — is pushed here, so the
    /// std-dev statistic sees fill values that `scalar`/`per_item` never
    /// do.
    scalar_stddev: Accumulator,
    per_item_stddev: Vec<Accumulator>,
}

struct PacketState {
    descriptor: PacketDescriptor,
    planes: Vec<PlaneState>,
    current_bin: Option<i64>,
    bin_x: f64,
    x_unit: Unit,
}

/// Bins incoming legacy packet data along its `X` plane. Register with
/// a [`crate::codec::Dispatcher`] alongside (or instead of) a
/// [`crate::builder::DatasetBuilder`]; drain flushed bins with
/// [`BinningReducer::take_emitted`].
pub struct BinningReducer {
    bin_width: f64,
    native_cadence: f64,
    center_policy: BinCenterPolicy,
    /// Bin 0's origin: the user-supplied `BEGIN` if given at
    /// construction, otherwise the first X value observed on the wire
    /// (§4.9 Bin boundary policy).
    origin: Option<f64>,
    packets: HashMap<u32, PacketState>,
    emitted: Vec<BinOutput>,
    stream_id: Option<DescriptorId>,
}

impl BinningReducer {
    pub fn new(
        bin_width: f64,
        native_cadence: f64,
        center_policy: BinCenterPolicy,
        begin: Option<f64>,
    ) -> Result<Self> {
        if bin_width <= 0.0 {
            return Err(DasError::InvalidOp("bin width must be positive".into()));
        }
        Ok(BinningReducer {
            bin_width,
            native_cadence,
            center_policy,
            origin: begin,
            packets: HashMap::new(),
            emitted: Vec::new(),
            stream_id: None,
        })
    }

    pub fn take_emitted(&mut self) -> Vec<BinOutput> {
        std::mem::take(&mut self.emitted)
    }

    fn bin_index(&self, x: f64) -> i64 {
        let origin = self.origin.unwrap_or(0.0);
        ((x - origin) / self.bin_width).floor() as i64
    }

    fn bin_x_value(&self, bin: i64) -> f64 {
        let origin = self.origin.unwrap_or(0.0);
        match self.center_policy {
            BinCenterPolicy::BinStart => origin + bin as f64 * self.bin_width,
            BinCenterPolicy::BinCenter => origin + (bin as f64 + 0.5) * self.bin_width,
        }
    }

    fn flush(&mut self, state: &mut PacketState) {
        let Some(bin) = state.current_bin else { return };
        let raw_x = self.bin_x_value(bin);
        let x_value = Unit::from_str("us2000")
            .and_then(|us2000| state.x_unit.convert_to(raw_x, us2000))
            .unwrap_or(raw_x);
        for plane in &mut state.planes {
            if plane.kind == PlaneKind::X {
                continue;
            }
            if plane.collapse {
                emit(&mut self.emitted, &plane.name, x_value, &plane.scalar, &plane.scalar_stddev);
                plane.scalar = Accumulator::new();
                plane.scalar_stddev = Accumulator::new();
            } else {
                for (item, (acc, sd_acc)) in
                    plane.per_item.iter_mut().zip(plane.per_item_stddev.iter_mut()).enumerate()
                {
                    emit(&mut self.emitted, &format!("{}[{item}]", plane.name), x_value, acc, sd_acc);
                    *acc = Accumulator::new();
                    *sd_acc = Accumulator::new();
                }
            }
        }
        state.current_bin = None;
    }
}

fn emit(out: &mut Vec<BinOutput>, base_name: &str, x_value: f64, acc: &Accumulator, stddev_acc: &Accumulator) {
    if acc.count() == 0 {
        return;
    }
    for (stat, value) in [
        (BinStat::Avg, acc.mean()),
        (BinStat::Min, acc.min()),
        (BinStat::Max, acc.max()),
        (BinStat::StdDev, stddev_acc.stddev()),
    ] {
        out.push(BinOutput {
            plane_name: format!("{base_name}{}", stat.name_suffix()),
            stat,
            x_value,
            value,
            count: acc.count(),
        });
    }
}

/// Tiered, human-readable resolution string for `xCacheResInfo`, e.g.
/// `" (4.0 minute Averages)"`. Mirrors
/// `original_source/utilities/das2_bin_avgsec.c`'s `onStreamHdr` tiers.
fn cache_res_info(seconds: f64) -> String {
    if seconds < 1.0 {
        format!(" ({:.0} ms Averages)", seconds * 1000.0)
    } else if seconds < 60.0 {
        format!(" ({seconds:.1} s Averages)")
    } else if seconds < 3600.0 {
        format!(" ({:.1} minute Averages)", seconds / 60.0)
    } else if seconds < 86_400.0 {
        format!(" ({:.1} hour Averages)", seconds / 3600.0)
    } else {
        format!(" ({:.3} day Averages)", seconds / 86_400.0)
    }
}

/// Parse a stream header's own properties (either v3 `<p>` elements or
/// a legacy `<properties Type:name="value".../>` element) into a
/// lookup, inverting [`DescriptorTree::serialize_v3`]/
/// [`DescriptorTree::serialize_legacy`].
fn parse_stream_properties(xml: &str) -> Result<HashMap<String, PropValue>> {
    let mut props = HashMap::new();
    let doc = roxmltree::Document::parse(xml)?;
    for node in doc.root_element().descendants() {
        if node.has_tag_name("properties") {
            for attr in node.attributes() {
                let (type_name, name) = attr.name().split_once(':').unwrap_or(("String", attr.name()));
                if let Some(value) = parse_prop_value(type_name, attr.value()) {
                    props.insert(name.to_string(), value);
                }
            }
        } else if node.has_tag_name("p") {
            let name = node.attribute("name").unwrap_or("").to_string();
            let type_name = node.attribute("type").unwrap_or("string");
            if let Some(value) = parse_prop_value(type_name, node.text().unwrap_or("")) {
                props.insert(name, value);
            }
        }
    }
    Ok(props)
}

fn parse_prop_value(type_name: &str, text: &str) -> Option<PropValue> {
    match type_name.to_lowercase().as_str() {
        "int" => text.parse().ok().map(PropValue::Int),
        "real" | "float" | "double" | "datum" | "unitvalue" => text.parse().ok().map(PropValue::Float),
        "boolean" | "bool" => text.parse().ok().map(PropValue::Bool),
        "stringarray" => Some(PropValue::StrList(text.split(',').map(String::from).collect())),
        _ => Some(PropValue::Str(text.to_string())),
    }
}

impl Handler for BinningReducer {
    fn on_stream_header(&mut self, tree: &mut DescriptorTree, xml: &str) -> Result<()> {
        let props = parse_stream_properties(xml)?;
        let id = self.stream_id.unwrap_or_else(|| tree.insert(DescriptorKind::Stream, None));
        self.stream_id = Some(id);
        for (name, value) in &props {
            tree.set_property(id, name.clone(), value.clone());
        }

        // §4.9 Derived stream metadata: widen xTagWidth/xCacheResolution
        // to at least the output bin width, never narrow an inherited
        // value that was already coarser.
        let inherited = props.get("xTagWidth").and_then(PropValue::as_float);
        let effective = inherited.map_or(self.bin_width, |w| w.max(self.bin_width));
        tree.set_property(id, "xTagWidth", PropValue::Float(effective));
        tree.set_property(id, "xCacheResolution", PropValue::Float(effective));
        tree.set_property(id, "xCacheResInfo", PropValue::Str(cache_res_info(effective)));

        if props.contains_key("Data_type") {
            tree.set_property(id, "Data_type", PropValue::Str("K0>Key Parameter".into()));
        }
        Ok(())
    }

    fn on_packet_header(&mut self, tree: &mut DescriptorTree, pkt_id: u32, xml: &str) -> Result<()> {
        let (descriptor, _is_dataset) = crate::builder::parse_legacy_packet_xml(xml)?;
        let x_unit = descriptor
            .planes
            .iter()
            .find(|p| p.kind == PlaneKind::X)
            .map(|p| p.unit)
            .ok_or_else(|| DasError::ShapeMismatch("packet header has no X plane".into()))?;
        let planes = descriptor
            .planes
            .iter()
            .map(|p| {
                let collapse = p.kind == PlaneKind::YScan && should_collapse(p.items, self.native_cadence, self.bin_width);
                if p.kind != PlaneKind::X {
                    for stat in [BinStat::Avg, BinStat::Min, BinStat::Max, BinStat::StdDev] {
                        let id = tree.insert(DescriptorKind::Dimension, self.stream_id);
                        tree.set_property(id, "name", PropValue::Str(format!("{}{}", p.name, stat.name_suffix())));
                        tree.set_property(id, "operation", PropValue::Str(stat.operation().into()));
                    }
                }
                PlaneState {
                    kind: p.kind,
                    name: p.name.clone(),
                    items: p.items,
                    collapse,
                    fill: p.fill,
                    scalar: Accumulator::new(),
                    per_item: vec![Accumulator::new(); p.items],
                    scalar_stddev: Accumulator::new(),
                    per_item_stddev: vec![Accumulator::new(); p.items],
                }
            })
            .collect();
        self.packets.insert(pkt_id, PacketState { descriptor, planes, current_bin: None, bin_x: 0.0, x_unit });
        Ok(())
    }

    fn on_packet_data(&mut self, _tree: &DescriptorTree, pkt_id: u32, bytes: &[u8]) -> Result<()> {
        let state = self
            .packets
            .get_mut(&pkt_id)
            .ok_or_else(|| DasError::Protocol { offset: 0, msg: format!("data for unknown packet id {pkt_id}") })?;

        let mut cursor = 0usize;
        let mut x_value = None;
        let mut values_by_plane = Vec::with_capacity(state.descriptor.planes.len());
        for plane in &state.descriptor.planes {
            let mut vals = Vec::with_capacity(plane.items);
            for _ in 0..plane.items {
                let v = plane.codec.decode(&bytes[cursor..])?;
                vals.push(v);
                cursor += plane.codec.width();
            }
            if plane.kind == PlaneKind::X {
                x_value = Some(vals[0]);
            }
            values_by_plane.push(vals);
        }
        let x = x_value.ok_or_else(|| DasError::ShapeMismatch("packet has no X plane".into()))?;
        if self.origin.is_none() {
            self.origin = Some(x);
        }
        let bin = self.bin_index(x);

        if state.current_bin != Some(bin) {
            let mut tmp = PacketState {
                descriptor: state.descriptor.clone(),
                planes: std::mem::take(&mut state.planes),
                current_bin: state.current_bin,
                bin_x: state.bin_x,
                x_unit: state.x_unit,
            };
            self.flush(&mut tmp);
            let state = self.packets.get_mut(&pkt_id).unwrap();
            state.planes = tmp.planes;
            state.current_bin = Some(bin);
            state.bin_x = x;
        }

        let state = self.packets.get_mut(&pkt_id).unwrap();
        for (plane, vals) in state.planes.iter_mut().zip(values_by_plane.iter()) {
            if plane.kind == PlaneKind::X {
                continue;
            }
            let any_non_fill = vals.iter().any(|v| !plane.fill.is_some_and(|f| *v == f));
            if plane.collapse {
                for v in vals {
                    if !plane.fill.is_some_and(|f| *v == f) {
                        plane.scalar.add(*v);
                    }
                }
                if any_non_fill {
                    for v in vals {
                        plane.scalar_stddev.add(*v);
                    }
                }
            } else {
                for (acc, v) in plane.per_item.iter_mut().zip(vals) {
                    if !plane.fill.is_some_and(|f| *v == f) {
                        acc.add(*v);
                    }
                }
                if any_non_fill {
                    for (acc, v) in plane.per_item_stddev.iter_mut().zip(vals) {
                        acc.add(*v);
                    }
                }
            }
        }
        Ok(())
    }

    fn legacy_record_len(&self, pkt_id: u32) -> Option<usize> {
        self.packets.get(&pkt_id).map(|s| s.descriptor.record_len())
    }

    fn on_close(&mut self, _tree: &mut DescriptorTree) -> Result<()> {
        let pkt_ids: Vec<u32> = self.packets.keys().copied().collect();
        for pkt_id in pkt_ids {
            let mut state = self.packets.remove(&pkt_id).unwrap();
            self.flush(&mut state);
            self.packets.insert(pkt_id, state);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DescriptorTree;
    use crate::test_support;

    fn header_xml() -> &'static str {
        r#"<packet><x name="time" units="t2000" type="sun_real8"/><y name="amp" units="V" type="sun_real8"/></packet>"#
    }

    fn data_bytes(t: f64, y: f64) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&t.to_be_bytes());
        out.extend_from_slice(&y.to_be_bytes());
        out
    }

    #[test]
    fn accumulator_tracks_basic_stats() {
        let mut acc = Accumulator::new();
        for v in [1.0, 2.0, 3.0, 4.0] {
            acc.add(v);
        }
        assert_eq!(acc.count(), 4);
        assert_eq!(acc.mean(), 2.5);
        assert_eq!(acc.min(), 1.0);
        assert_eq!(acc.max(), 4.0);
        assert!(acc.stddev() > 1.0 && acc.stddev() < 1.5);
    }

    #[test]
    fn should_collapse_rule() {
        assert!(should_collapse(64, 0.001, 10.0));
        assert!(!should_collapse(64, 1.0, 10.0));
    }

    #[test]
    fn bins_across_packets_and_flushes_on_boundary() {
        let mut reducer = BinningReducer::new(10.0, 0.0, BinCenterPolicy::BinCenter, None).unwrap();
        let mut tree = DescriptorTree::new();
        reducer.on_packet_header(&mut tree, 1, header_xml()).unwrap();
        reducer.on_packet_data(&tree, 1, &data_bytes(1.0, 10.0)).unwrap();
        reducer.on_packet_data(&tree, 1, &data_bytes(2.0, 20.0)).unwrap();
        reducer.on_packet_data(&tree, 1, &data_bytes(11.0, 30.0)).unwrap();
        let emitted = reducer.take_emitted();
        // avg/min/max/stddev, one flush of the first bin (x=1,2).
        assert_eq!(emitted.len(), 4);
        let avg = emitted.iter().find(|o| o.stat == BinStat::Avg).unwrap();
        assert_eq!(avg.plane_name, "amp");
        assert_eq!(avg.value, 15.0);
        let min = emitted.iter().find(|o| o.stat == BinStat::Min).unwrap();
        assert_eq!(min.plane_name, "amp.min");
        assert_eq!(min.value, 10.0);
        let max = emitted.iter().find(|o| o.stat == BinStat::Max).unwrap();
        assert_eq!(max.plane_name, "amp.max");
        assert_eq!(max.value, 20.0);

        reducer.on_close(&mut tree).unwrap();
        let rest = reducer.take_emitted();
        assert_eq!(rest.len(), 4);
        let avg = rest.iter().find(|o| o.stat == BinStat::Avg).unwrap();
        assert_eq!(avg.value, 30.0);
    }

    #[test]
    fn fill_values_are_excluded_from_accumulation() {
        let xml = r#"<packet><x name="time" units="t2000" type="sun_real8"/><y name="amp" units="V" type="sun_real8" fill="-1e31"/></packet>"#;
        let mut reducer = BinningReducer::new(10.0, 0.0, BinCenterPolicy::BinCenter, Some(0.0)).unwrap();
        let mut tree = DescriptorTree::new();
        reducer.on_packet_header(&mut tree, 1, xml).unwrap();
        reducer.on_packet_data(&tree, 1, &data_bytes(1.0, 10.0)).unwrap();
        reducer.on_packet_data(&tree, 1, &data_bytes(2.0, -1e31)).unwrap();
        reducer.on_close(&mut tree).unwrap();
        let emitted = reducer.take_emitted();
        let avg = emitted.iter().find(|o| o.stat == BinStat::Avg).unwrap();
        assert_eq!(avg.value, 10.0);
        assert_eq!(avg.count, 1);
    }

    #[test]
    fn stddev_admits_fill_when_a_sibling_item_is_non_fill() {
        // YScan plane, 2 items/record, native cadence large enough that
        // `should_collapse` is false so per-item accumulators apply.
        let xml = r#"<packet><x name="time" units="t2000" type="sun_real8"/><yscan name="spec" units="V" type="sun_real8" nitems="2" fill="-1e31"/></packet>"#;
        let mut reducer = BinningReducer::new(10.0, 100.0, BinCenterPolicy::BinCenter, Some(0.0)).unwrap();
        let mut tree = DescriptorTree::new();
        reducer.on_packet_header(&mut tree, 1, xml).unwrap();

        let rec = |t: f64, a: f64, b: f64| {
            let mut out = Vec::new();
            out.extend_from_slice(&t.to_be_bytes());
            out.extend_from_slice(&a.to_be_bytes());
            out.extend_from_slice(&b.to_be_bytes());
            out
        };
        // record 1: item0 non-fill, item1 fill -> whole record still pushed
        // to stddev (item1's stddev accumulator gets the fill value too).
        reducer.on_packet_data(&tree, 1, &rec(1.0, 10.0, -1e31)).unwrap();
        // record 2: both non-fill.
        reducer.on_packet_data(&tree, 1, &rec(2.0, 20.0, 30.0)).unwrap();
        reducer.on_close(&mut tree).unwrap();
        let emitted = reducer.take_emitted();

        let item0_avg = emitted.iter().find(|o| o.plane_name == "spec[0]").unwrap();
        assert_eq!(item0_avg.value, 15.0); // mean(10, 20), fill excluded (none here)
        let item0_sd = emitted.iter().find(|o| o.plane_name == "spec[0].stddev").unwrap();
        test_support::assert_close(item0_sd.value, 50f64.sqrt(), 1e-9);

        // item1's mean/min/max drop the fill, averaging only 30 — but its
        // count is 1, so the declared fill -1e31 never reached sum/count.
        let item1_avg = emitted.iter().find(|o| o.plane_name == "spec[1]").unwrap();
        assert_eq!(item1_avg.value, 30.0);
        assert_eq!(item1_avg.count, 1);
        // its stddev accumulator, however, received both record 1's raw
        // fill and record 2's 30.0, since record 1 had a non-fill sibling.
        let item1_sd = emitted.iter().find(|o| o.plane_name == "spec[1].stddev").unwrap();
        assert!(item1_sd.value > 1e15, "stddev should reflect fill pollution, got {}", item1_sd.value);
    }

    #[test]
    fn user_supplied_begin_anchors_bin_origin() {
        let mut reducer = BinningReducer::new(10.0, 0.0, BinCenterPolicy::BinStart, Some(5.0)).unwrap();
        let mut tree = DescriptorTree::new();
        reducer.on_packet_header(&mut tree, 1, header_xml()).unwrap();
        reducer.on_packet_data(&tree, 1, &data_bytes(5.0, 1.0)).unwrap();
        reducer.on_packet_data(&tree, 1, &data_bytes(14.9, 2.0)).unwrap();
        reducer.on_close(&mut tree).unwrap();
        let emitted = reducer.take_emitted();
        let avg = emitted.iter().find(|o| o.stat == BinStat::Avg).unwrap();
        assert_eq!(avg.count, 2);
    }

    #[test]
    fn stream_header_widens_tag_width_to_bin_size() {
        let mut reducer = BinningReducer::new(10.0, 0.0, BinCenterPolicy::BinCenter, None).unwrap();
        let mut tree = DescriptorTree::new();
        let xml = r#"<stream version="2.2"><properties Real:xTagWidth="2.0" String:Data_type="H0>High Resolution"/></stream>"#;
        reducer.on_stream_header(&mut tree, xml).unwrap();
        let id = reducer.stream_id.unwrap();
        assert_eq!(tree.get_property(id, "xTagWidth").and_then(PropValue::as_float), Some(10.0));
        assert_eq!(tree.get_property(id, "xCacheResolution").and_then(PropValue::as_float), Some(10.0));
        assert_eq!(
            tree.get_property(id, "Data_type").and_then(PropValue::as_str),
            Some("K0>Key Parameter")
        );
    }
}
