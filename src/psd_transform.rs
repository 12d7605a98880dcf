//! PSD transformer: replaces time-domain planes with spectral-density
//! planes.
//!
//! Grounded in `original_source/das2/dft.c` (the estimator itself,
//! reused here via [`crate::fft::PsdEstimator`]) and the windowing
//! contract `original_source/utilities/das2_psd.c`'s main loop follows:
//! collect `length` consecutive samples of a scalar `Y` plane, window
//! and transform them, slide the window by `length / slide_denom`
//! samples, and discard whatever is buffered the moment the cadence
//! between two samples stops matching the cadence the window started
//! with. A `YScan` plane needs no buffering — each record already
//! holds one full waveform along its offset axis, so it transforms
//! record-by-record.
//!
//! Either way the unit algebra is the same: the time axis unit inverts
//! to a frequency unit, and the amplitude unit squares and divides by
//! that frequency unit, the same shape [`crate::units::Unit::power`]
//! and [`crate::units::Unit::divide`] build in their own doc examples.

use crate::codec::Handler;
use crate::descriptor::DescriptorTree;
use crate::error::{DasError, Result};
use crate::fft::PsdEstimator;
use crate::units::Unit;
use std::collections::{HashMap, VecDeque};

/// One emitted spectrum: the window's start time, its frequency axis,
/// and the PSD values at each frequency.
#[derive(Clone, Debug)]
pub struct PsdOutput {
    pub pkt_id: u32,
    pub plane_name: String,
    pub start_x: f64,
    pub freq_unit: Unit,
    pub value_unit: Unit,
    pub freq_bins: Vec<f64>,
    pub values: Vec<f64>,
}

struct WaveformState {
    plane_name: String,
    x_unit: Unit,
    y_unit: Unit,
    xs: VecDeque<f64>,
    ys: VecDeque<f64>,
}

struct ScanState {
    plane_name: String,
    offset_unit: Unit,
    y_unit: Unit,
    native_cadence: f64,
}

enum TargetPlane {
    Waveform(WaveformState),
    Scan(ScanState),
}

struct PacketState {
    target: TargetPlane,
    output_id: u32,
    record_len: usize,
}

/// Windows and slide parameters for the time-domain (waveform) path.
/// Has no effect on packets whose target plane is already a `YScan`.
#[derive(Clone, Copy, Debug)]
pub struct WindowSpec {
    pub length: usize,
    pub slide_denom: usize,
    /// Cadence override; `None` derives cadence from the first two
    /// buffered X values and holds the stream to it thereafter.
    pub user_cadence: Option<f64>,
}

/// Transforms time-domain or offset-domain planes into PSD planes.
/// Register with a [`crate::codec::Dispatcher`]; drain results with
/// [`PsdTransform::take_emitted`].
pub struct PsdTransform {
    estimator: PsdEstimator,
    window: WindowSpec,
    packets: HashMap<u32, PacketState>,
    shape_to_id: HashMap<(String, usize), u32>,
    next_output_id: u32,
    emitted: Vec<PsdOutput>,
}

impl PsdTransform {
    pub fn new(estimator: PsdEstimator, window: WindowSpec) -> Result<Self> {
        if window.length < 2 {
            return Err(DasError::InvalidOp("PSD window length must be at least 2".into()));
        }
        if window.slide_denom == 0 {
            return Err(DasError::InvalidOp("PSD slide denominator must be nonzero".into()));
        }
        Ok(PsdTransform {
            estimator,
            window,
            packets: HashMap::new(),
            shape_to_id: HashMap::new(),
            next_output_id: 1,
            emitted: Vec::new(),
        })
    }

    pub fn take_emitted(&mut self) -> Vec<PsdOutput> {
        std::mem::take(&mut self.emitted)
    }

    /// Assign (or reuse) an output packet id for a spectrum shape,
    /// collapsing morphology when two target planes produce
    /// identically-shaped output, per the `1..99` lazily-assigned
    /// id space.
    fn output_id_for(&mut self, plane_name: &str, n_bins: usize) -> Result<u32> {
        let key = (plane_name.to_string(), n_bins);
        if let Some(&id) = self.shape_to_id.get(&key) {
            return Ok(id);
        }
        if self.next_output_id > 99 {
            return Err(DasError::InvalidOp("exhausted the 1..99 PSD output packet id space".into()));
        }
        let id = self.next_output_id;
        self.next_output_id += 1;
        self.shape_to_id.insert(key, id);
        Ok(id)
    }

    fn slide_stride(&self) -> usize {
        (self.window.length / self.window.slide_denom).max(1)
    }

    fn flush_waveform(&mut self, pkt_id: u32, output_id: u32, state: &mut WaveformState) -> Result<()> {
        let length = self.window.length;
        if state.xs.len() < length {
            return Ok(());
        }
        let cadence = self.window.user_cadence.unwrap_or(state.xs[1] - state.xs[0]);
        if cadence <= 0.0 {
            return Err(DasError::InvalidOp("PSD cadence must be positive".into()));
        }
        for w in state.xs.iter().take(length).collect::<Vec<_>>().windows(2) {
            if (w[1] - w[0] - cadence).abs() > cadence * 1e-6 {
                // Cadence broke inside this window: discard it and
                // resynchronize on the sample after the break instead
                // of silently mixing two sample rates into one FFT.
                state.xs.pop_front();
                state.ys.pop_front();
                return Ok(());
            }
        }
        let samples: Vec<f64> = state.ys.iter().take(length).copied().collect();
        let start_x = state.xs[0];
        let sample_rate = 1.0 / cadence;
        let psd = self.estimator.compute_real(&samples, sample_rate)?;

        let freq_unit = state.x_unit.interval().or_else(|_| Ok::<_, DasError>(state.x_unit)).and_then(|u| u.invert())?;
        let value_unit = state.y_unit.power(2, 1)?.divide(freq_unit)?;
        let df = sample_rate / length as f64;
        let freq_bins: Vec<f64> = (0..psd.len()).map(|k| k as f64 * df).collect();

        self.emitted.push(PsdOutput {
            pkt_id: output_id,
            plane_name: state.plane_name.clone(),
            start_x,
            freq_unit,
            value_unit,
            freq_bins,
            values: psd,
        });

        let stride = self.slide_stride();
        for _ in 0..stride.min(state.xs.len()) {
            state.xs.pop_front();
            state.ys.pop_front();
        }
        let _ = pkt_id;
        Ok(())
    }

    /// Slide a `LENGTH`-sample window across a `YScan` record's offset
    /// axis with stride `LENGTH / SLIDE_DENOM`, emitting one spectrum
    /// per window position — the scan-plane analogue of
    /// [`PsdTransform::flush_waveform`]'s buffered sliding window,
    /// minus the buffering since a whole record is already in hand.
    fn transform_scan(
        &self,
        output_id: u32,
        state: &ScanState,
        x_value: f64,
        values: &[f64],
    ) -> Result<Vec<PsdOutput>> {
        let length = self.window.length;
        let stride = self.slide_stride();
        let sample_rate = 1.0 / state.native_cadence;
        let freq_unit = state.offset_unit.invert()?;
        let value_unit = state.y_unit.power(2, 1)?.divide(freq_unit)?;

        let mut outputs = Vec::new();
        let mut start = 0usize;
        while start + length <= values.len() {
            let window = &values[start..start + length];
            let psd = self.estimator.compute_real(window, sample_rate)?;
            let df = sample_rate / length as f64;
            let freq_bins: Vec<f64> = (0..psd.len()).map(|k| k as f64 * df).collect();
            outputs.push(PsdOutput {
                pkt_id: output_id,
                plane_name: state.plane_name.clone(),
                start_x: x_value + start as f64 * state.native_cadence,
                freq_unit,
                value_unit,
                freq_bins,
                values: psd,
            });
            start += stride;
        }
        Ok(outputs)
    }
}

impl Handler for PsdTransform {
    fn legacy_record_len(&self, pkt_id: u32) -> Option<usize> {
        self.packets.get(&pkt_id).map(|s| s.record_len)
    }

    fn on_packet_header(&mut self, _tree: &mut DescriptorTree, pkt_id: u32, xml: &str) -> Result<()> {
        let (descriptor, _is_dataset) = crate::builder::parse_legacy_packet_xml(xml)?;
        use crate::dataset::PlaneKind;

        let x_index = descriptor
            .planes
            .iter()
            .position(|p| p.kind == PlaneKind::X)
            .ok_or_else(|| DasError::ShapeMismatch(format!("packet {pkt_id} has no X plane to transform against")))?;
        let x_unit = descriptor.planes[x_index].unit;

        let _ = x_index;
        let (target, output_id) = match descriptor.planes.iter().position(|p| p.kind == PlaneKind::YScan) {
            Some(idx) => {
                let plane = &descriptor.planes[idx];
                let native_cadence = self.window.user_cadence.unwrap_or(1.0);
                // The shape key must match what transform_scan actually
                // emits per window (LENGTH/2+1 bins), not the scan
                // plane's raw item count.
                let output_id = self.output_id_for(&plane.name, self.window.length / 2 + 1)?;
                let state = TargetPlane::Scan(ScanState {
                    plane_name: plane.name.clone(),
                    offset_unit: plane.unit,
                    y_unit: plane.unit,
                    native_cadence,
                });
                (state, output_id)
            }
            None => {
                let idx = descriptor
                    .planes
                    .iter()
                    .position(|p| p.kind == PlaneKind::Y)
                    .ok_or_else(|| DasError::ShapeMismatch(format!("packet {pkt_id} has no Y or YScan plane to transform")))?;
                let plane = &descriptor.planes[idx];
                let output_id = self.output_id_for(&plane.name, self.window.length / 2 + 1)?;
                let state = TargetPlane::Waveform(WaveformState {
                    plane_name: plane.name.clone(),
                    x_unit,
                    y_unit: plane.unit,
                    xs: VecDeque::new(),
                    ys: VecDeque::new(),
                });
                (state, output_id)
            }
        };
        let record_len = descriptor.record_len();
        self.packets.insert(pkt_id, PacketState { target, output_id, record_len });
        Ok(())
    }

    fn on_packet_data(&mut self, _tree: &DescriptorTree, pkt_id: u32, bytes: &[u8]) -> Result<()> {
        let is_waveform = {
            let state = self
                .packets
                .get_mut(&pkt_id)
                .ok_or_else(|| DasError::Protocol { offset: 0, msg: format!("PSD data for unregistered packet {pkt_id}") })?;
            match &mut state.target {
                TargetPlane::Waveform(w) => {
                    // Waveform packets are X (scalar) followed immediately by Y
                    // (scalar): this is the common legacy time-series layout.
                    if bytes.len() < 16 {
                        return Err(DasError::PartialPacket("waveform PSD record shorter than x+y scalars".into()));
                    }
                    let x = f64::from_be_bytes(bytes[0..8].try_into().unwrap());
                    let y = f64::from_be_bytes(bytes[8..16].try_into().unwrap());
                    w.xs.push_back(x);
                    w.ys.push_back(y);
                    true
                }
                TargetPlane::Scan(_) => false,
            }
        };

        if is_waveform {
            let output_id = self.packets[&pkt_id].output_id;
            // Borrow the buffer back out from under the map just long enough
            // to flush it, since flush_waveform also needs `&mut self` for
            // the shared FFT estimator and the emitted-output buffer.
            let mut w = match self.packets.get_mut(&pkt_id).map(|s| std::mem::replace(
                &mut s.target,
                TargetPlane::Waveform(WaveformState {
                    plane_name: String::new(),
                    x_unit: crate::units::dimensionless(),
                    y_unit: crate::units::dimensionless(),
                    xs: VecDeque::new(),
                    ys: VecDeque::new(),
                }),
            )) {
                Some(TargetPlane::Waveform(w)) => w,
                _ => unreachable!("is_waveform implies a Waveform target"),
            };
            let result = self.flush_waveform(pkt_id, output_id, &mut w);
            if let Some(state) = self.packets.get_mut(&pkt_id) {
                state.target = TargetPlane::Waveform(w);
            }
            result?;
            return Ok(());
        }

        let state = &self.packets[&pkt_id];
        let TargetPlane::Scan(s) = &state.target else { unreachable!("non-waveform branch implies Scan") };
        let width = 8;
        if bytes.len() < width {
            return Err(DasError::PartialPacket("scan PSD record shorter than x scalar".into()));
        }
        let x = f64::from_be_bytes(bytes[0..width].try_into().unwrap());
        let items: Vec<f64> = bytes[width..]
            .chunks_exact(8)
            .map(|c| f64::from_be_bytes(c.try_into().unwrap()))
            .collect();
        if items.len() < 2 {
            return Err(DasError::ShapeMismatch("scan PSD record has fewer than 2 offset samples".into()));
        }
        let output_id = state.output_id;
        let out = self.transform_scan(output_id, s, x, &items)?;
        self.emitted.extend(out);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fft::PlanCache;
    use std::sync::Arc;

    fn waveform_header() -> String {
        r#"<packet><x name="time" units="t2000" type="sun_real8"/><y name="amp" units="V" type="sun_real8"/></packet>"#.to_string()
    }

    fn scan_header() -> String {
        r#"<packet><x name="time" units="t2000" type="sun_real8"/><yscan name="wave" units="V" type="sun_real8" nitems="8"/></packet>"#.to_string()
    }

    fn estimator() -> PsdEstimator {
        PsdEstimator::new(Arc::new(PlanCache::new()))
    }

    #[test]
    fn waveform_slides_and_emits_once_length_reached() {
        let window = WindowSpec { length: 8, slide_denom: 2, user_cadence: Some(1.0) };
        let mut xform = PsdTransform::new(estimator(), window).unwrap();
        let mut tree = DescriptorTree::new();
        xform.on_packet_header(&mut tree, 1, &waveform_header()).unwrap();
        for i in 0..8 {
            let mut bytes = Vec::new();
            bytes.extend_from_slice(&(i as f64).to_be_bytes());
            bytes.extend_from_slice(&((i as f64 * 0.3).sin()).to_be_bytes());
            xform.on_packet_data(&tree, 1, &bytes).unwrap();
        }
        let out = xform.take_emitted();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].freq_bins.len(), 5);
        assert_eq!(out[0].values.len(), 5);
    }

    #[test]
    fn cadence_break_discards_partial_window() {
        let window = WindowSpec { length: 4, slide_denom: 1, user_cadence: None };
        let mut xform = PsdTransform::new(estimator(), window).unwrap();
        let mut tree = DescriptorTree::new();
        xform.on_packet_header(&mut tree, 1, &waveform_header()).unwrap();
        for (x, y) in [(0.0, 1.0), (1.0, 2.0), (3.0, 3.0), (4.0, 4.0)] {
            let mut bytes = Vec::new();
            bytes.extend_from_slice(&x.to_be_bytes());
            bytes.extend_from_slice(&y.to_be_bytes());
            xform.on_packet_data(&tree, 1, &bytes).unwrap();
        }
        assert!(xform.take_emitted().is_empty());
    }

    #[test]
    fn scan_plane_transforms_record_by_record() {
        let window = WindowSpec { length: 8, slide_denom: 2, user_cadence: Some(1.0) };
        let mut xform = PsdTransform::new(estimator(), window).unwrap();
        let mut tree = DescriptorTree::new();
        xform.on_packet_header(&mut tree, 1, &scan_header()).unwrap();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0.0f64.to_be_bytes());
        for i in 0..8 {
            bytes.extend_from_slice(&((i as f64 * 0.5).cos()).to_be_bytes());
        }
        xform.on_packet_data(&tree, 1, &bytes).unwrap();
        let out = xform.take_emitted();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].freq_bins.len(), 5);
    }

    #[test]
    fn scan_plane_slides_across_long_offset_axis() {
        let window = WindowSpec { length: 1024, slide_denom: 2, user_cadence: Some(1.0) };
        let mut xform = PsdTransform::new(estimator(), window).unwrap();
        let mut tree = DescriptorTree::new();
        let header = r#"<packet><x name="time" units="t2000" type="sun_real8"/><yscan name="wave" units="V" type="sun_real8" nitems="4096"/></packet>"#;
        xform.on_packet_header(&mut tree, 1, header).unwrap();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0.0f64.to_be_bytes());
        for i in 0..4096 {
            bytes.extend_from_slice(&((i as f64 * 0.1).sin()).to_be_bytes());
        }
        xform.on_packet_data(&tree, 1, &bytes).unwrap();
        let out = xform.take_emitted();
        assert_eq!(out.len(), 7);
        for o in &out {
            assert_eq!(o.freq_bins.len(), 513);
            assert_eq!(o.values.len(), 513);
        }
        assert_eq!(out[1].start_x, 512.0);
    }

    #[test]
    fn shape_collapse_reuses_output_id() {
        let window = WindowSpec { length: 8, slide_denom: 2, user_cadence: Some(1.0) };
        let mut xform = PsdTransform::new(estimator(), window).unwrap();
        let mut tree = DescriptorTree::new();
        xform.on_packet_header(&mut tree, 1, &waveform_header()).unwrap();
        xform.on_packet_header(&mut tree, 2, &waveform_header()).unwrap();
        let id1 = xform.packets[&1].output_id;
        let id2 = xform.packets[&2].output_id;
        assert_eq!(id1, id2);
    }
}
