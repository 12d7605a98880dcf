//! Typed property tree shared by stream, packet, dataset and dimension
//! descriptors.
//!
//! Rather than a `Box<dyn Any>` parent-pointer tree (the natural
//! translation of a `DasDesc`/`pParent` chain), nodes live in a flat
//! arena and are addressed by a `Copy` integer handle, the same trick
//! a block graph uses for its block/stream handles. It sidesteps the
//! borrow-checker fight a pointer tree picks with shared mutable parents, at the cost
//! of handles that outlive the node they named if misused — callers
//! that hold a `DescriptorId` across a `DescriptorTree::remove` get a
//! stale handle back as `None`, never a dangling reference.

use crate::units::Unit;
use std::collections::HashMap;

/// A handle into a [`DescriptorTree`]'s arena. Cheap to copy; meaningless
/// outside the tree that produced it.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct DescriptorId(u32);

/// What kind of thing a descriptor node represents. Determines which
/// properties are meaningful and where inheritance stops.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum DescriptorKind {
    Stream,
    Packet,
    Dataset,
    Dimension,
    Variable,
    Frame,
}

/// A property value. das2 headers carry properties as typed XML
/// attributes (`String`, `Int`, `Real`/`Float`, `Boolean`,
/// `StringArray`) plus the less common unit-valued and datum
/// properties; this enum is the typed side-table the original
/// represents with a tagged union and a `void*`.
#[derive(Clone, Debug, PartialEq)]
pub enum PropValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    StrList(Vec<String>),
    UnitValue(f64, Unit),
}

impl PropValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            PropValue::Float(f) => Some(*f),
            PropValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

struct Node {
    kind: DescriptorKind,
    parent: Option<DescriptorId>,
    children: Vec<DescriptorId>,
    properties: HashMap<String, PropValue>,
    live: bool,
}

/// An arena of descriptor nodes forming a stream/packet/dataset
/// hierarchy. One tree is shared by a whole stream: the [`crate::codec`]
/// dispatch loop owns it and hands out [`DescriptorId`]s to handlers.
#[derive(Default)]
pub struct DescriptorTree {
    arena: Vec<Node>,
}

impl DescriptorTree {
    pub fn new() -> Self {
        DescriptorTree { arena: Vec::new() }
    }

    /// Add a new node, optionally parented under an existing one.
    pub fn insert(&mut self, kind: DescriptorKind, parent: Option<DescriptorId>) -> DescriptorId {
        let id = DescriptorId(self.arena.len() as u32);
        self.arena.push(Node {
            kind,
            parent,
            children: Vec::new(),
            properties: HashMap::new(),
            live: true,
        });
        if let Some(p) = parent {
            if let Some(pn) = self.arena.get_mut(p.0 as usize) {
                pn.children.push(id);
            }
        }
        id
    }

    /// Tombstone a node. Its id remains allocated (so other handles to
    /// siblings stay valid) but all accessors return `None` for it.
    pub fn remove(&mut self, id: DescriptorId) {
        if let Some(n) = self.arena.get_mut(id.0 as usize) {
            n.live = false;
            n.properties.clear();
        }
    }

    fn node(&self, id: DescriptorId) -> Option<&Node> {
        self.arena.get(id.0 as usize).filter(|n| n.live)
    }

    pub fn kind(&self, id: DescriptorId) -> Option<DescriptorKind> {
        self.node(id).map(|n| n.kind)
    }

    pub fn parent(&self, id: DescriptorId) -> Option<DescriptorId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: DescriptorId) -> &[DescriptorId] {
        self.arena
            .get(id.0 as usize)
            .filter(|n| n.live)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn set_property(&mut self, id: DescriptorId, name: impl Into<String>, value: PropValue) {
        if let Some(n) = self.arena.get_mut(id.0 as usize) {
            n.properties.insert(name.into(), value);
        }
    }

    /// Property lookup on this node only, no inheritance.
    pub fn get_property(&self, id: DescriptorId, name: &str) -> Option<&PropValue> {
        self.node(id).and_then(|n| n.properties.get(name))
    }

    /// Property lookup walking up the parent chain: a packet inherits
    /// unset properties from its stream descriptor, a dimension from
    /// its packet, and so on. Returns the first match found nearest
    /// `id`.
    pub fn get_property_inherited(&self, id: DescriptorId, name: &str) -> Option<&PropValue> {
        let mut cur = Some(id);
        while let Some(c) = cur {
            if let Some(v) = self.get_property(c, name) {
                return Some(v);
            }
            cur = self.parent(c);
        }
        None
    }

    /// This node's own properties, no inheritance, sorted by name so
    /// serialization is deterministic.
    pub fn own_properties(&self, id: DescriptorId) -> Vec<(&str, &PropValue)> {
        let mut props: Vec<_> = self
            .node(id)
            .map(|n| n.properties.iter().map(|(k, v)| (k.as_str(), v)).collect())
            .unwrap_or_default();
        props.sort_by(|a, b| a.0.cmp(b.0));
        props
    }

    /// v3 serialization: one `<p name=... type=... units=...>value</p>`
    /// per property.
    pub fn serialize_v3(&self, id: DescriptorId) -> String {
        let mut out = String::new();
        for (name, value) in self.own_properties(id) {
            let (type_name, text, units) = prop_type_and_text(value);
            out.push_str(&format!(r#"<p name="{}" type="{type_name}""#, xml_escape(name)));
            if let Some(u) = units {
                out.push_str(&format!(r#" units="{}""#, xml_escape(&u)));
            }
            out.push('>');
            out.push_str(&xml_escape(&text));
            out.push_str("</p>");
        }
        out
    }

    /// Legacy (v2) serialization: one `<properties .../>` element with
    /// `Type:name="value"` attributes, matching
    /// `original_source/das2/descr.c`'s `DasDesc_encode` output.
    pub fn serialize_legacy(&self, id: DescriptorId) -> String {
        let props = self.own_properties(id);
        if props.is_empty() {
            return String::new();
        }
        let mut out = String::from("<properties");
        for (name, value) in props {
            let (type_name, text, _units) = prop_type_and_text(value);
            out.push_str(&format!(
                r#" {}:{}="{}""#,
                capitalize(type_name),
                xml_escape(name),
                xml_escape(&text)
            ));
        }
        out.push_str("/>");
        out
    }
}

fn prop_type_and_text(value: &PropValue) -> (&'static str, String, Option<String>) {
    match value {
        PropValue::Str(s) => ("string", s.clone(), None),
        PropValue::Int(i) => ("int", i.to_string(), None),
        PropValue::Float(f) => ("real", f.to_string(), None),
        PropValue::Bool(b) => ("boolean", b.to_string(), None),
        PropValue::StrList(items) => ("stringArray", items.join(","), None),
        PropValue::UnitValue(v, u) => ("unitValue", v.to_string(), Some(u.to_str())),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
