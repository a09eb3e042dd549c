//! Cached, immutable type-graph nodes.
//!
//! A [`TypeNode`] describes one position in a record shape: its kind, its
//! effective attribute set, its ordered children, and any subtype dispatch
//! table. Type roots are memoized per [`Schema`](crate::schema::Schema) and
//! shared (`Arc`) wherever the same type appears, so the type graph is a DAG;
//! member positions are thin wrappers that carry the member name and
//! attributes while sharing the type's children.

use crate::checksum::ComputedKind;
use crate::codec::{Encoding, Endian, Prim};
use crate::desc::{
    Bind, BindDirection, BindPath, ComputedSpec, EndianSpec, EnumSpec, ItemUntilSpec, PathSpec,
    Scale, SerializeAsSpec, WhenSpec,
};
use crate::desc::AlignMode;
use crate::value::{Record, TypeId, Value};
use std::sync::Arc;

/// Structural classification of a node.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// A record position; children are its members in total order.
    Object {
        /// Declared type of the record.
        type_id: TypeId,
    },
    /// Fixed-width primitive.
    Value {
        /// Wire primitive.
        prim: Prim,
    },
    /// Enumeration with literal mappings.
    Enum {
        /// Underlying representation and literals.
        spec: EnumSpec,
    },
    /// Text.
    Str,
    /// Raw octet buffer.
    Bytes,
    /// Array of fixed-width primitives; bulk-transfer fast path.
    PrimArray {
        /// Element primitive.
        prim: Prim,
    },
    /// List/array of arbitrary items.
    Collection {
        /// Shared item shape.
        item: Arc<TypeNode>,
    },
    /// Optional primitive; absent when the enclosing bound is exhausted.
    NullablePrim {
        /// Element primitive.
        prim: Prim,
    },
    /// User codec registered under this name.
    Custom {
        /// Registry key.
        codec: String,
    },
    /// Raw stream passthrough region.
    Stream,
}

/// The effective attribute set of a node, after descriptor normalization.
#[derive(Debug, Clone, Default)]
pub struct AttrSet {
    /// Excluded from (de)serialization.
    pub ignore: bool,
    /// Explicit field-order, if declared.
    pub order: Option<i32>,
    /// Serialized length in octets.
    pub length: Option<Bind>,
    /// Item count for collections.
    pub count: Option<Bind>,
    /// Absolute stream offset.
    pub offset: Option<Bind>,
    /// Alignment multiple and side.
    pub align: Option<(u32, AlignMode)>,
    /// Rational numeric scaling.
    pub scale: Option<Scale>,
    /// Byte order, constant or bound.
    pub endian: Option<EndianSpec>,
    /// Character encoding.
    pub encoding: Option<Encoding>,
    /// Explicit wire re-representation.
    pub serialize_as: Option<SerializeAsSpec>,
    /// Conditional inclusion gates; all must pass.
    pub when: Vec<WhenSpec>,
    /// Value-terminated collection sentinel.
    pub until: Option<Value>,
    /// Per-item length (scalar or jagged sequence).
    pub item_length: Option<Bind>,
    /// Item-terminated collection spec.
    pub item_until: Option<ItemUntilSpec>,
    /// Computed-value attributes covering this node.
    pub computed: Vec<ComputedSpec>,
}

/// Which attribute a binding feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// `FieldLength`.
    Length,
    /// `FieldCount`.
    Count,
    /// `FieldOffset`.
    Offset,
    /// `FieldEndianness`.
    Endian,
    /// Subtype key source.
    SubtypeKey,
    /// `SerializeWhen(Not)` gate.
    When,
    /// `ItemLength`.
    ItemLength,
    /// Computed-value target.
    Computed,
}

/// A declarative dependency from this node's attribute to another field.
#[derive(Debug, Clone)]
pub struct Binding {
    /// The attribute being derived.
    pub kind: BindingKind,
    /// Where the source lives and how to reach it.
    pub path: PathSpec,
    /// Directional participation.
    pub direction: BindDirection,
}

/// One entry of a subtype dispatch table.
#[derive(Debug, Clone)]
pub struct SubtypeEntry {
    /// Key matched against the bound key field.
    pub key: Value,
    /// Concrete type id.
    pub type_id: TypeId,
    /// Cached graph of the concrete type.
    pub node: Arc<TypeNode>,
    /// Which walks consider this entry.
    pub direction: BindDirection,
}

/// Per-polymorphic-field dispatch table: static entries, then a factory,
/// then a default.
#[derive(Debug, Clone)]
pub struct SubtypeTable {
    /// Where the key value lives.
    pub key: BindPath,
    /// Static key→type mappings.
    pub entries: Vec<SubtypeEntry>,
    /// Registered factory name, consulted on static misses.
    pub factory: Option<String>,
    /// Fallback type when nothing matches.
    pub default: Option<Arc<TypeNode>>,
}

/// A compiled constructor thunk: parameter names matched against collected
/// field values.
#[derive(Debug, Clone, Default)]
pub struct Ctor {
    /// Ordered parameter names; empty means the default constructor.
    pub params: Vec<String>,
}

impl Ctor {
    /// Materializes a record from collected field values.
    ///
    /// Constructor parameters are installed first (in declaration order),
    /// remaining fields are assigned directly afterwards.
    pub fn construct(&self, type_id: TypeId, mut fields: Vec<(String, Value)>) -> Record {
        let mut rec = Record::new(type_id);
        for param in &self.params {
            if let Some(idx) = fields.iter().position(|(name, _)| name == param) {
                let (name, value) = fields.remove(idx);
                rec.set(name, value);
            }
        }
        for (name, value) in fields {
            rec.set(name, value);
        }
        rec
    }
}

/// An immutable, cached description of one position in a record shape.
#[derive(Debug, Clone)]
pub struct TypeNode {
    /// Member name, or the type name for a type root.
    pub name: Arc<str>,
    /// Structural classification.
    pub kind: NodeKind,
    /// Effective attributes.
    pub attrs: AttrSet,
    /// All path bindings this node declares, for introspection.
    pub bindings: Vec<Binding>,
    /// Ordered children (record members).
    pub children: Vec<Arc<TypeNode>>,
    /// Subtype dispatch table, when the member is polymorphic.
    pub subtypes: Option<SubtypeTable>,
    /// Compiled constructor, for object nodes.
    pub ctor: Option<Ctor>,
}

impl TypeNode {
    /// Finds a direct child by member name.
    pub fn child(&self, name: &str) -> Option<&Arc<TypeNode>> {
        self.children.iter().find(|c| &*c.name == name)
    }

    /// The wire primitive this node encodes as, when it is a scalar.
    ///
    /// `SerializeAs` overrides the declared primitive; enums fall back to
    /// their underlying representation unless they are in string mode.
    pub fn wire_prim(&self) -> Option<Prim> {
        if let Some(sa) = &self.attrs.serialize_as {
            return Some(sa.prim);
        }
        match &self.kind {
            NodeKind::Value { prim } | NodeKind::NullablePrim { prim } => Some(*prim),
            NodeKind::Enum { spec } if !spec.is_string_mode() => Some(spec.underlying),
            _ => None,
        }
    }

    /// Statically known serialized width, for deferred-evaluation eligibility.
    pub fn fixed_wire_width(&self) -> Option<usize> {
        match &self.kind {
            NodeKind::NullablePrim { .. } => None,
            _ => self.wire_prim().map(|p| p.width()),
        }
    }

    /// The endianness override this member's attributes declare, constant
    /// form only.
    pub fn const_endian(&self) -> Option<Endian> {
        if let Some(sa) = &self.attrs.serialize_as {
            if let Some(e) = sa.endian {
                return Some(e);
            }
        }
        match &self.attrs.endian {
            Some(EndianSpec::Const(e)) => Some(*e),
            _ => None,
        }
    }

    /// True when the node carries any computed-value attribute.
    pub fn is_computed_cover(&self) -> bool {
        !self.attrs.computed.is_empty()
    }

    /// The computed-value attributes, paired with their accumulator kinds.
    pub fn computed_kinds(&self) -> impl Iterator<Item = (&ComputedSpec, ComputedKind)> {
        self.attrs.computed.iter().map(|spec| (spec, spec.kind))
    }
}
