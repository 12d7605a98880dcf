//! Stream codec: chunk tag detection, framing, and handler dispatch.
//!
//! Two incompatible tag grammars share the wire. Legacy (v2) framing
//! uses `[NN]NNNNNN<xml>` for headers (`NN` a two-digit packet id,
//! `NNNNNN` a six-digit ASCII length) and `:NN:` for data packets, whose
//! length is *not* on the wire — it comes from the most recently parsed
//! descriptor for that packet id, per `original_source/das2/io.c`'s
//! `_DasIO_dataTypeOrErr`/`_DasIO_sizeOrErr`. The newer (v3) framing is
//! self-describing: `|Tc|id|len|<payload>`, a two-character tag naming
//! the chunk kind (`S`/`H`/`P`/`C`/`E`/`X`) and payload encoding
//! (`x`/`j`/`d`).
//!
//! [`Dispatcher`] detects which grammar a stream is using from its
//! first tag and drives a chain of up to [`MAX_HANDLERS`] registered
//! [`Handler`]s, in the order registered — the same "registered
//! callback chain, codec inverts control" shape as a block graph's
//! `work()` chain, just pull- instead of push-scheduled from the wire.

use crate::descriptor::DescriptorTree;
use crate::error::{DasError, Result};
use std::io::Read;

/// Handler registration is capped, mirroring the practical ceiling
/// `original_source`'s stream processors observe (one builder, one or
/// two transforming filters, one writer).
pub const MAX_HANDLERS: usize = 10;

/// Default cap on a single chunk's declared payload length (§4.6 step
/// 4): a malformed or adversarial length field can't make the
/// dispatcher allocate more than this per chunk.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 256 * 1024;

/// One framed unit off the wire.
#[derive(Clone, Debug, PartialEq)]
pub enum Chunk {
    StreamHeader { xml: String },
    PacketHeader { pkt_id: u32, xml: String },
    PacketData { pkt_id: u32, bytes: Vec<u8> },
    Comment { xml: String },
    Exception { kind: String, msg: String },
    /// A v3 `X` extension chunk: unrecognized content this dispatcher
    /// relays to handlers unchanged rather than trying to interpret.
    Extension { pkt_id: u32, bytes: Vec<u8> },
}

/// A registered callback chain link. Every method has a no-op default
/// so a handler only overrides the chunk kinds it cares about — the
/// same shape `original_source/das2/builder.c`'s `onComment`/
/// `onException` no-ops show for a builder that only cares about
/// headers and data.
pub trait Handler: Send {
    fn on_stream_header(&mut self, tree: &mut DescriptorTree, xml: &str) -> Result<()> {
        let _ = (tree, xml);
        Ok(())
    }

    fn on_packet_header(&mut self, tree: &mut DescriptorTree, pkt_id: u32, xml: &str) -> Result<()> {
        let _ = (tree, pkt_id, xml);
        Ok(())
    }

    fn on_packet_data(&mut self, tree: &DescriptorTree, pkt_id: u32, bytes: &[u8]) -> Result<()> {
        let _ = (tree, pkt_id, bytes);
        Ok(())
    }

    fn on_comment(&mut self, xml: &str) -> Result<()> {
        let _ = xml;
        Ok(())
    }

    fn on_exception(&mut self, kind: &str, msg: &str) -> Result<()> {
        let _ = (kind, msg);
        Ok(())
    }

    /// A v3 `X` extension chunk, passed through unchanged. Most
    /// handlers have nothing to say about these; a writer-side relay
    /// handler is the one real consumer.
    fn on_extension(&mut self, pkt_id: u32, bytes: &[u8]) -> Result<()> {
        let _ = (pkt_id, bytes);
        Ok(())
    }

    /// A handler that just parsed a packet/dataset header for `pkt_id`
    /// reports the legacy (v2) on-wire record length here so the
    /// dispatcher can frame the `:NN:` data chunk that follows — v2
    /// carries no length on that tag, per spec's dispatch algorithm
    /// step 3. Handlers that don't own packet descriptors return
    /// `None`, the default.
    fn legacy_record_len(&self, pkt_id: u32) -> Option<usize> {
        let _ = pkt_id;
        None
    }

    fn on_close(&mut self, tree: &mut DescriptorTree) -> Result<()> {
        let _ = tree;
        Ok(())
    }

    /// Called instead of (immediately before) [`Handler::on_packet_header`]
    /// when `pkt_id` already has a descriptor in flight — i.e. the
    /// stream is redefining it rather than defining it for the first
    /// time. Most handlers don't distinguish the two and can rely on
    /// the default no-op; a writer relaying a stream verbatim needs to
    /// know so it can re-emit the header chunk.
    fn on_packet_redefine(&mut self, tree: &mut DescriptorTree, pkt_id: u32, xml: &str) -> Result<()> {
        let _ = (tree, pkt_id, xml);
        Ok(())
    }
}

/// Drives [`Handler`]s from a byte stream. Owns the [`DescriptorTree`]
/// shared by every handler in the chain (the builder grows it, a
/// reducer or PSD transform reads from it).
pub struct Dispatcher {
    handlers: Vec<Box<dyn Handler>>,
    tree: DescriptorTree,
    packet_lengths: std::collections::HashMap<u32, usize>,
    offset: u64,
    /// `true` once the first chunk has been read, so later chunks can
    /// be checked against the grammar the stream opened with.
    saw_first_chunk: bool,
    /// Packet ids that have already had a header dispatched, so a
    /// second header for the same id is recognized as a redefinition.
    defined_packet_ids: std::collections::HashSet<u32>,
    /// Reused across chunks to avoid a fresh allocation per payload;
    /// only ever grows.
    scratch: Vec<u8>,
    max_payload: usize,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Dispatcher {
            handlers: Vec::new(),
            tree: DescriptorTree::new(),
            packet_lengths: std::collections::HashMap::new(),
            offset: 0,
            saw_first_chunk: false,
            defined_packet_ids: std::collections::HashSet::new(),
            scratch: Vec::new(),
            max_payload: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }

    /// Like [`Dispatcher::new`], but with a non-default cap on a single
    /// chunk's declared payload length.
    pub fn with_max_payload_bytes(max_payload: usize) -> Self {
        Dispatcher { max_payload, ..Self::new() }
    }

    pub fn register(&mut self, handler: Box<dyn Handler>) -> Result<()> {
        if self.handlers.len() >= MAX_HANDLERS {
            return Err(DasError::InvalidOp(format!(
                "cannot register more than {MAX_HANDLERS} handlers"
            )));
        }
        self.handlers.push(handler);
        Ok(())
    }

    /// Record the on-wire length of a legacy (v2) data packet for
    /// `pkt_id`, as computed by a builder from the packet's descriptor.
    /// Required before a `:NN:` data tag for that id can be framed.
    pub fn set_legacy_packet_length(&mut self, pkt_id: u32, len: usize) {
        self.packet_lengths.insert(pkt_id, len);
    }

    pub fn tree(&self) -> &DescriptorTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut DescriptorTree {
        &mut self.tree
    }

    /// Run the dispatch loop to completion (EOF), feeding every framed
    /// [`Chunk`] to every registered handler in order.
    pub fn run(&mut self, source: &mut dyn Read) -> Result<()> {
        while let Some(chunk) = self.read_chunk(source)? {
            self.dispatch(chunk)?;
        }
        for h in self.handlers.iter_mut() {
            h.on_close(&mut self.tree)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, chunk: Chunk) -> Result<()> {
        match chunk {
            Chunk::StreamHeader { xml } => {
                for h in self.handlers.iter_mut() {
                    h.on_stream_header(&mut self.tree, &xml)?;
                }
            }
            Chunk::PacketHeader { pkt_id, xml } => {
                if !self.defined_packet_ids.insert(pkt_id) {
                    for h in self.handlers.iter_mut() {
                        h.on_packet_redefine(&mut self.tree, pkt_id, &xml)?;
                    }
                }
                for h in self.handlers.iter_mut() {
                    h.on_packet_header(&mut self.tree, pkt_id, &xml)?;
                }
                // Legacy `:NN:` data chunks carry no length of their own;
                // whichever handler just parsed this header (normally
                // the dataset builder or a filter reusing its parser)
                // tells us the fixed record length to expect.
                for h in self.handlers.iter() {
                    if let Some(len) = h.legacy_record_len(pkt_id) {
                        self.packet_lengths.insert(pkt_id, len);
                        break;
                    }
                }
            }
            Chunk::PacketData { pkt_id, bytes } => {
                for h in self.handlers.iter_mut() {
                    h.on_packet_data(&self.tree, pkt_id, &bytes)?;
                }
            }
            Chunk::Comment { xml } => {
                for h in self.handlers.iter_mut() {
                    h.on_comment(&xml)?;
                }
            }
            Chunk::Exception { kind, msg } => {
                for h in self.handlers.iter_mut() {
                    h.on_exception(&kind, &msg)?;
                }
                return Err(DasError::OutOfBand { kind, msg });
            }
            Chunk::Extension { pkt_id, bytes } => {
                for h in self.handlers.iter_mut() {
                    h.on_extension(pkt_id, &bytes)?;
                }
            }
        }
        Ok(())
    }

    fn read_exact_or_none(&mut self, source: &mut dyn Read, buf: &mut [u8]) -> Result<bool> {
        let mut read = 0;
        while read < buf.len() {
            let n = source.read(&mut buf[read..])?;
            if n == 0 {
                if read == 0 {
                    return Ok(false);
                }
                return Err(DasError::PartialPacket(format!(
                    "expected {} bytes at offset {}, got {read}",
                    buf.len(),
                    self.offset
                )));
            }
            read += n;
            self.offset += n as u64;
        }
        Ok(true)
    }

    fn read_exact(&mut self, source: &mut dyn Read, buf: &mut [u8]) -> Result<()> {
        if !self.read_exact_or_none(source, buf)? {
            return Err(DasError::PartialPacket(format!(
                "unexpected end of stream at offset {}",
                self.offset
            )));
        }
        Ok(())
    }

    /// Read a `len`-byte chunk payload, rejecting `len` over
    /// [`Dispatcher::max_payload`]. Reuses `self.scratch`'s allocation
    /// across calls rather than allocating a fresh buffer per chunk.
    fn read_payload(&mut self, source: &mut dyn Read, len: usize) -> Result<Vec<u8>> {
        if len > self.max_payload {
            return Err(DasError::Protocol {
                offset: self.offset,
                msg: format!(
                    "chunk declares {len} bytes, exceeding the {}-byte payload cap",
                    self.max_payload
                ),
            });
        }
        if self.scratch.len() < len {
            self.scratch.resize(len, 0);
        }
        let mut read = 0;
        while read < len {
            let n = source.read(&mut self.scratch[read..len])?;
            if n == 0 {
                return Err(DasError::PartialPacket(format!(
                    "expected {len} bytes at offset {}, got {read}",
                    self.offset
                )));
            }
            read += n;
            self.offset += n as u64;
        }
        Ok(self.scratch[..len].to_vec())
    }

    fn read_chunk(&mut self, source: &mut dyn Read) -> Result<Option<Chunk>> {
        let mut tag_byte = [0u8; 1];
        if !self.read_exact_or_none(source, &mut tag_byte)? {
            return Ok(None);
        }
        let is_first = !self.saw_first_chunk;
        if is_first && tag_byte[0] != b'[' && tag_byte[0] != b'|' {
            return Err(DasError::Protocol {
                offset: self.offset - 1,
                msg: "stream must open with a v2 [00] or v3 |Sx| stream header".into(),
            });
        }
        let chunk = match tag_byte[0] {
            b'[' => self.read_legacy_header(source, is_first).map(Some),
            b':' => self.read_legacy_data(source).map(Some),
            b'|' => self.read_v3_tag(source, is_first).map(Some),
            other => Err(DasError::Protocol {
                offset: self.offset - 1,
                msg: format!("unrecognized tag byte {other:#04x}"),
            }),
        }?;
        self.saw_first_chunk = true;
        Ok(chunk)
    }

    fn read_until(&mut self, source: &mut dyn Read, terminator: u8) -> Result<String> {
        let mut out = Vec::new();
        loop {
            let mut b = [0u8; 1];
            self.read_exact(source, &mut b)?;
            if b[0] == terminator {
                break;
            }
            out.push(b[0]);
            if out.len() > 64 {
                return Err(DasError::Protocol {
                    offset: self.offset,
                    msg: "tag field too long".into(),
                });
            }
        }
        String::from_utf8(out)
            .map_err(|e| DasError::Protocol { offset: self.offset, msg: e.to_string() })
    }

    /// Read a legacy `[NN]NNNNNN<xml>` or `[xx]NNNNNN<xml>` header,
    /// where the length field is always exactly six ASCII digits.
    fn read_legacy_header(&mut self, source: &mut dyn Read, is_first: bool) -> Result<Chunk> {
        let id_field = self.read_until(source, b']')?;
        let mut len_bytes = [0u8; 6];
        self.read_exact(source, &mut len_bytes)?;
        let len: usize = std::str::from_utf8(&len_bytes)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| DasError::Protocol {
                offset: self.offset,
                msg: "malformed 6-digit legacy header length".into(),
            })?;
        let xml_bytes = self.read_payload(source, len)?;
        let xml = String::from_utf8(xml_bytes)
            .map_err(|e| DasError::Xml { line: 0, msg: e.to_string() })?;

        if id_field == "xx" {
            return Ok(if xml.trim_start().starts_with("<exception") {
                let (kind, msg) = parse_exception_xml(&xml);
                Chunk::Exception { kind, msg }
            } else {
                Chunk::Comment { xml }
            });
        }
        let pkt_id: u32 = id_field
            .parse()
            .map_err(|_| DasError::Protocol { offset: self.offset, msg: format!("bad packet id '{id_field}'") })?;
        if is_first && pkt_id != 0 {
            return Err(DasError::Protocol {
                offset: self.offset,
                msg: "first v2 chunk must be [00], the stream header".into(),
            });
        }
        if pkt_id == 0 {
            Ok(Chunk::StreamHeader { xml })
        } else {
            Ok(Chunk::PacketHeader { pkt_id, xml })
        }
    }

    fn read_legacy_data(&mut self, source: &mut dyn Read) -> Result<Chunk> {
        let id_field = self.read_until(source, b':')?;
        let pkt_id: u32 = id_field
            .parse()
            .map_err(|_| DasError::Protocol { offset: self.offset, msg: format!("bad packet id '{id_field}'") })?;
        let len = *self.packet_lengths.get(&pkt_id).ok_or_else(|| DasError::Protocol {
            offset: self.offset,
            msg: format!(
                "legacy data packet {pkt_id} has no stored length; its descriptor must be a fixed-size packet, not a variable-length dataset"
            ),
        })?;
        let bytes = self.read_payload(source, len)?;
        Ok(Chunk::PacketData { pkt_id, bytes })
    }

    /// Read a `|Tc|id|len|payload` v3 tag. `T` names the chunk type
    /// (`S`tream, `H`eader, `P`acket data, `C`omment, `E`xception,
    /// e`X`tension); `c` names the payload encoding (`x`ml, `j`son,
    /// `d`-binary) and is otherwise unused here — callers parse XML or
    /// JSON from the same field, the codec just frames bytes.
    fn read_v3_tag(&mut self, source: &mut dyn Read, is_first: bool) -> Result<Chunk> {
        let kind_field = self.read_until(source, b'|')?;
        let mut chars = kind_field.chars();
        let tag_type = chars
            .next()
            .ok_or_else(|| DasError::Protocol { offset: self.offset, msg: "empty v3 tag kind".into() })?;
        let id_field = self.read_until(source, b'|')?;
        let pkt_id: u32 = if id_field.is_empty() {
            0
        } else {
            id_field.parse().map_err(|_| DasError::Protocol {
                offset: self.offset,
                msg: format!("bad v3 packet id '{id_field}'"),
            })?
        };
        let len_field = self.read_until(source, b'|')?;
        let len: usize = len_field
            .parse()
            .map_err(|_| DasError::Protocol { offset: self.offset, msg: format!("bad v3 length '{len_field}'") })?;
        let payload = self.read_payload(source, len)?;

        if is_first && !(tag_type == 'S' && pkt_id == 0) {
            return Err(DasError::Protocol {
                offset: self.offset,
                msg: "first v3 chunk must be |Sx| id 0, the stream header".into(),
            });
        }

        let as_text = |bytes: Vec<u8>| {
            String::from_utf8(bytes).map_err(|e| DasError::Xml { line: 0, msg: e.to_string() })
        };
        match tag_type {
            'S' => {
                if pkt_id != 0 {
                    return Err(DasError::Protocol {
                        offset: self.offset,
                        msg: "|Sx| stream header must use reserved id 0".into(),
                    });
                }
                Ok(Chunk::StreamHeader { xml: as_text(payload)? })
            }
            'H' => Ok(Chunk::PacketHeader { pkt_id, xml: as_text(payload)? }),
            'P' => Ok(Chunk::PacketData { pkt_id, bytes: payload }),
            'C' => Ok(Chunk::Comment { xml: as_text(payload)? }),
            'E' => {
                let text = as_text(payload)?;
                let (kind, msg) = parse_exception_xml(&text);
                Ok(Chunk::Exception { kind, msg })
            }
            'X' => Ok(Chunk::Extension { pkt_id, bytes: payload }),
            other => Err(DasError::Protocol {
                offset: self.offset,
                msg: format!("unrecognized v3 tag type '{other}'"),
            }),
        }
    }
}

/// Pull `type="..."`/`message="..."` out of an `<exception .../>` XML
/// fragment, or treat the whole text as the message with a generic
/// kind if it isn't well-formed XML at all.
fn parse_exception_xml(text: &str) -> (String, String) {
    fn attr(text: &str, name: &str) -> Option<String> {
        let needle = format!("{name}=\"");
        let start = text.find(&needle)? + needle.len();
        let end = text[start..].find('"')? + start;
        Some(text[start..end].to_string())
    }
    match roxmltree::Document::parse(text) {
        Ok(doc) => {
            let root = doc.root_element();
            let kind = root.attribute("type").unwrap_or("ServerError").to_string();
            let msg = root.attribute("message").unwrap_or("").to_string();
            (kind, msg)
        }
        Err(_) => {
            let kind = attr(text, "type").unwrap_or_else(|| "ServerError".to_string());
            let msg = attr(text, "message").unwrap_or_else(|| text.to_string());
            (kind, msg)
        }
    }
}

pub mod writer;
pub use writer::Writer;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct Recorder {
        headers: Vec<String>,
        data: Vec<(u32, Vec<u8>)>,
    }

    impl Handler for Recorder {
        fn on_stream_header(&mut self, _tree: &mut DescriptorTree, xml: &str) -> Result<()> {
            self.headers.push(xml.to_string());
            Ok(())
        }
        fn on_packet_data(&mut self, _tree: &DescriptorTree, pkt_id: u32, bytes: &[u8]) -> Result<()> {
            self.data.push((pkt_id, bytes.to_vec()));
            Ok(())
        }
    }

    #[test]
    fn frames_legacy_header_and_data() {
        let mut wire = Vec::new();
        let xml = b"<stream/>";
        wire.extend_from_slice(b"[00]");
        wire.extend_from_slice(format!("{:06}", xml.len()).as_bytes());
        wire.extend_from_slice(xml);
        wire.extend_from_slice(b":01:");
        wire.extend_from_slice(&[1, 2, 3, 4]);

        let mut dispatcher = Dispatcher::new();
        dispatcher.set_legacy_packet_length(1, 4);
        let recorder = Recorder { headers: Vec::new(), data: Vec::new() };
        dispatcher.register(Box::new(recorder)).unwrap();

        let mut cursor = Cursor::new(wire);
        dispatcher.run(&mut cursor).unwrap();
    }

    #[test]
    fn legacy_data_without_known_length_errors() {
        let mut wire = Vec::new();
        wire.extend_from_slice(b":07:");
        wire.extend_from_slice(&[0, 0]);
        let mut dispatcher = Dispatcher::new();
        let mut cursor = Cursor::new(wire);
        assert!(dispatcher.run(&mut cursor).is_err());
    }

    #[test]
    fn frames_v3_tags() {
        let mut wire = Vec::new();
        let xml = b"<stream/>";
        wire.extend_from_slice(format!("|Sx||{}|", xml.len()).as_bytes());
        wire.extend_from_slice(xml);
        wire.extend_from_slice(b"|Pd|3|4|");
        wire.extend_from_slice(&[9, 9, 9, 9]);

        let mut dispatcher = Dispatcher::new();
        let recorder = Recorder { headers: Vec::new(), data: Vec::new() };
        dispatcher.register(Box::new(recorder)).unwrap();
        let mut cursor = Cursor::new(wire);
        dispatcher.run(&mut cursor).unwrap();
    }

    #[test]
    fn handler_registration_is_capped() {
        let mut dispatcher = Dispatcher::new();
        for _ in 0..MAX_HANDLERS {
            dispatcher
                .register(Box::new(Recorder { headers: Vec::new(), data: Vec::new() }))
                .unwrap();
        }
        assert!(dispatcher
            .register(Box::new(Recorder { headers: Vec::new(), data: Vec::new() }))
            .is_err());
    }

    #[test]
    fn unrecognized_tag_byte_is_a_protocol_error() {
        let mut dispatcher = Dispatcher::new();
        let mut cursor = Cursor::new(vec![b'?']);
        match dispatcher.run(&mut cursor) {
            Err(DasError::Protocol { .. }) => {}
            other => panic!("expected Protocol error, got {other:?}"),
        }
    }

    #[test]
    fn oversized_chunk_length_is_rejected() {
        let mut wire = Vec::new();
        wire.extend_from_slice(format!("|Sx||{}|", DEFAULT_MAX_PAYLOAD_BYTES + 1).as_bytes());
        let mut dispatcher = Dispatcher::new();
        let mut cursor = Cursor::new(wire);
        match dispatcher.run(&mut cursor) {
            Err(DasError::Protocol { .. }) => {}
            other => panic!("expected Protocol error, got {other:?}"),
        }
    }

    #[test]
    fn custom_payload_cap_is_honored() {
        let mut wire = Vec::new();
        let xml = b"<stream/>";
        wire.extend_from_slice(format!("|Sx||{}|", xml.len()).as_bytes());
        wire.extend_from_slice(xml);
        let mut dispatcher = Dispatcher::with_max_payload_bytes(4);
        let recorder = Recorder { headers: Vec::new(), data: Vec::new() };
        dispatcher.register(Box::new(recorder)).unwrap();
        let mut cursor = Cursor::new(wire);
        assert!(dispatcher.run(&mut cursor).is_err());
    }

    struct RedefineRecorder {
        redefines: std::sync::Arc<std::sync::Mutex<Vec<u32>>>,
    }

    impl Handler for RedefineRecorder {
        fn on_packet_redefine(&mut self, _tree: &mut DescriptorTree, pkt_id: u32, _xml: &str) -> Result<()> {
            self.redefines.lock().unwrap().push(pkt_id);
            Ok(())
        }
    }

    #[test]
    fn redefined_packet_header_invokes_callback() {
        let mut wire = Vec::new();
        let stream_xml = b"<stream/>";
        wire.extend_from_slice(b"[00]");
        wire.extend_from_slice(format!("{:06}", stream_xml.len()).as_bytes());
        wire.extend_from_slice(stream_xml);
        for _ in 0..2 {
            let hdr = b"<packet/>";
            wire.extend_from_slice(b"[01]");
            wire.extend_from_slice(format!("{:06}", hdr.len()).as_bytes());
            wire.extend_from_slice(hdr);
        }

        let redefines = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(Box::new(RedefineRecorder { redefines: redefines.clone() })).unwrap();
        let mut cursor = Cursor::new(wire);
        dispatcher.run(&mut cursor).unwrap();
        assert_eq!(*redefines.lock().unwrap(), vec![1]);
    }

    struct OrderRecorder {
        tag: &'static str,
        events: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
    }

    impl Handler for OrderRecorder {
        fn on_packet_header(&mut self, _tree: &mut DescriptorTree, _pkt_id: u32, _xml: &str) -> Result<()> {
            self.events.lock().unwrap().push(format!("{}.pkt_desc", self.tag));
            Ok(())
        }
        fn on_packet_data(&mut self, _tree: &DescriptorTree, _pkt_id: u32, _bytes: &[u8]) -> Result<()> {
            self.events.lock().unwrap().push(format!("{}.pkt_data", self.tag));
            Ok(())
        }
    }

    #[test]
    fn handlers_are_invoked_in_registration_order_per_chunk() {
        // One pkt-desc then two pkt-data chunks for id 01; per spec §8
        // "Dispatch ordering", H1 and H2 (registered in that order)
        // must each see every chunk before the dispatcher moves on to
        // the next chunk — never all of H1's chunks then all of H2's.
        let mut wire = Vec::new();
        let stream_xml = b"<stream/>";
        wire.extend_from_slice(format!("|Sx||{}|", stream_xml.len()).as_bytes());
        wire.extend_from_slice(stream_xml);
        let hdr = b"<packet/>";
        wire.extend_from_slice(format!("|Hx|1|{}|", hdr.len()).as_bytes());
        wire.extend_from_slice(hdr);
        for _ in 0..2 {
            wire.extend_from_slice(b"|Pd|1|4|");
            wire.extend_from_slice(&[1, 2, 3, 4]);
        }

        let events = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(Box::new(OrderRecorder { tag: "H1", events: events.clone() })).unwrap();
        dispatcher.register(Box::new(OrderRecorder { tag: "H2", events: events.clone() })).unwrap();
        let mut cursor = Cursor::new(wire);
        dispatcher.run(&mut cursor).unwrap();

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                "H1.pkt_desc", "H2.pkt_desc",
                "H1.pkt_data", "H2.pkt_data",
                "H1.pkt_data", "H2.pkt_data",
            ]
        );
    }
}
