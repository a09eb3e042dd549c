//! The normalized type-descriptor contract.
//!
//! This is the engine's input: whatever discovery mechanism a consumer uses
//! (hand-written builders, code generation, a schema file) must bottom out in
//! [`TypeDesc`] values. A descriptor names a record type, its optional base
//! type, and its members; each member carries a declared type and a set of
//! [`Attr`] annotations specifying ordering, lengths, counts, alignment,
//! endianness, encoding, offsets, conditions, subtyping, and computed values.
//!
//! Descriptors are plain data (and `serde`-serializable, so format definitions
//! can be stored and loaded); behavioral extension points — value converters,
//! subtype factories, custom codecs — are registered on the
//! [`Schema`](crate::schema::Schema) by name and referenced from descriptors
//! as strings.

use crate::checksum::ComputedKind;
use crate::codec::{Encoding, Endian, Prim};
use crate::error::Result;
use crate::graph::BindContext;
use crate::stream::{InputStream, OutputFrame};
use crate::value::{TypeId, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a binding participates in each walk direction.
///
/// - `Both`: resolved on both walks, written back on serialize.
/// - `ReadOnly`: resolved on both walks, never written back; for subtype
///   entries, considered only during deserialize.
/// - `WriteOnly`: written back on serialize; for subtype entries, considered
///   only during serialize; ignored as a source during deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindDirection {
    /// Active in both directions.
    Both,
    /// Source of truth; never overwritten by the engine.
    ReadOnly,
    /// Only drives serialization.
    WriteOnly,
}

impl Default for BindDirection {
    fn default() -> Self {
        Self::Both
    }
}

/// Where a path starts walking upward from its holding node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Anchor {
    /// Nearest ancestor that has a child matching the first segment.
    Auto,
    /// Go up exactly this many parents before descending.
    Level(u32),
    /// Go up until a node of (or dispatched to) this type.
    Type(TypeId),
}

/// A navigation expression: ancestor lookup, then descent by child name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSpec {
    /// Upward phase.
    pub anchor: Anchor,
    /// Downward phase, one child name per step.
    pub segments: Vec<String>,
}

impl PathSpec {
    /// Path resolved from the nearest ancestor owning the first segment.
    pub fn to(path: &str) -> Self {
        Self {
            anchor: Anchor::Auto,
            segments: path.split('.').map(str::to_owned).collect(),
        }
    }

    /// Path anchored a fixed number of levels up.
    pub fn up(levels: u32, path: &str) -> Self {
        Self {
            anchor: Anchor::Level(levels),
            segments: path.split('.').map(str::to_owned).collect(),
        }
    }

    /// Path anchored at the nearest ancestor of the given type.
    pub fn ancestor(type_id: impl Into<TypeId>, path: &str) -> Self {
        Self {
            anchor: Anchor::Type(type_id.into()),
            segments: path.split('.').map(str::to_owned).collect(),
        }
    }
}

impl fmt::Display for PathSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.anchor {
            Anchor::Auto => {}
            Anchor::Level(n) => write!(f, "^{n}:")?,
            Anchor::Type(t) => write!(f, "^{t}:")?,
        }
        write!(f, "{}", self.segments.join("."))
    }
}

/// A path-bound attribute source, with optional converter and direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindPath {
    /// Where the source value lives.
    pub path: PathSpec,
    /// Registered converter name, if any.
    pub converter: Option<String>,
    /// Converter parameter passed through on every call.
    pub converter_arg: Option<Value>,
    /// Directional participation.
    pub direction: BindDirection,
}

impl BindPath {
    /// A plain two-way binding to `path`.
    pub fn to(path: &str) -> Self {
        Self {
            path: PathSpec::to(path),
            converter: None,
            converter_arg: None,
            direction: BindDirection::Both,
        }
    }

    /// Attaches a registered converter.
    pub fn via(mut self, converter: impl Into<String>) -> Self {
        self.converter = Some(converter.into());
        self
    }

    /// Attaches a converter parameter.
    pub fn with_arg(mut self, arg: Value) -> Self {
        self.converter_arg = Some(arg);
        self
    }

    /// Overrides the direction.
    pub fn direction(mut self, direction: BindDirection) -> Self {
        self.direction = direction;
        self
    }
}

/// Either a constant literal or a path binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Bind {
    /// A literal constant; never written back.
    Const(Value),
    /// Derived from another field.
    Path(BindPath),
}

impl Bind {
    /// Constant unsigned literal, the common case for lengths and counts.
    pub fn constant(v: u64) -> Self {
        Self::Const(Value::UInt(v))
    }

    /// Two-way path binding.
    pub fn to(path: &str) -> Self {
        Self::Path(BindPath::to(path))
    }
}

/// Alignment side selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlignMode {
    /// Pad/skip before the member.
    Left,
    /// Pad/skip after the member.
    Right,
    /// Both sides.
    Both,
}

/// Endianness: constant or derived through a binding (magic markers).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EndianSpec {
    /// Fixed byte order.
    Const(Endian),
    /// Derived from another field, usually via a converter that maps a
    /// magic value to a byte order.
    Bound(BindPath),
}

/// Rational scaling factor applied to numeric members on the wire.
///
/// Serialized value = in-memory value × `num` / `den`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scale {
    /// Numerator.
    pub num: i64,
    /// Denominator; must be non-zero.
    pub den: i64,
}

/// Explicit wire re-representation of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializeAsSpec {
    /// The primitive carried on the wire.
    pub prim: Prim,
    /// Endianness override for just this member.
    pub endian: Option<Endian>,
}

/// A `SerializeWhen`/`SerializeWhenNot` gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhenSpec {
    /// The gating field.
    pub source: BindPath,
    /// Literal compared against the source (loose numeric equality).
    pub value: Value,
    /// True for `SerializeWhenNot`.
    pub negate: bool,
}

/// What to do with the sentinel item of an `ItemSerializeUntil` collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LastItemMode {
    /// Keep the sentinel item in the collection.
    Include,
    /// Consume the sentinel's octets but drop the item.
    Exclude,
    /// Rewind past the sentinel so the enclosing context consumes it.
    Defer,
}

/// Item-terminated collection specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemUntilSpec {
    /// Path evaluated against each deserialized item.
    pub path: PathSpec,
    /// Terminating literal.
    pub value: Value,
    /// Sentinel handling.
    pub mode: LastItemMode,
}

/// A computed-value attribute: which accumulator, and where the result goes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedSpec {
    /// Checksum/CRC/hash flavor.
    pub kind: ComputedKind,
    /// Path to the field receiving the finalized value.
    pub target: PathSpec,
}

/// One static subtype mapping entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtypeEntryDesc {
    /// Key value matched against the bound key field.
    pub key: Value,
    /// Concrete type dispatched to.
    pub type_id: TypeId,
    /// Which walk directions consider this entry.
    pub direction: BindDirection,
}

/// An alternate spelling for one enum literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumLiteral {
    /// In-memory name of the literal.
    pub name: String,
    /// Numeric wire value.
    pub value: i64,
    /// When present, the literal serializes as this string instead of the
    /// numeric value (`SerializeAsEnum`).
    pub serialize_as: Option<String>,
}

/// Enum shape: underlying numeric representation plus literal mappings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumSpec {
    /// Numeric wire representation when no alternate spellings are used.
    pub underlying: Prim,
    /// Known literals.
    pub literals: Vec<EnumLiteral>,
}

impl EnumSpec {
    /// True when every literal carries an alternate string spelling, which
    /// switches the whole member to string representation.
    pub fn is_string_mode(&self) -> bool {
        !self.literals.is_empty() && self.literals.iter().all(|l| l.serialize_as.is_some())
    }
}

/// Declared type of a member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldType {
    /// Fixed-width primitive.
    Prim(Prim),
    /// Text.
    Str,
    /// Enumeration.
    Enum(EnumSpec),
    /// Raw octet buffer.
    Bytes,
    /// Nested record by type id.
    Record(TypeId),
    /// Homogeneous list/array of the item type.
    List(Box<FieldType>),
    /// Optional primitive; absence inferred from the enclosing bound length.
    Nullable(Box<FieldType>),
    /// User codec registered under this name.
    Custom(String),
    /// Raw stream passthrough region.
    Stream,
}

/// One attribute annotation on a member.
///
/// This mirrors the attribute kinds of the descriptor contract; the type-graph
/// builder folds them into an effective attribute set per node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Attr {
    /// Exclude the member from (de)serialization entirely.
    Ignore,
    /// Relative ordering among the type's own members.
    FieldOrder(i32),
    /// Serialized length in octets.
    FieldLength(Bind),
    /// Item count for collections.
    FieldCount(Bind),
    /// Alignment constraint.
    FieldAlignment {
        /// Alignment multiple in octets.
        multiple: u32,
        /// Which side(s) to align.
        mode: AlignMode,
    },
    /// Rational scaling of numeric values.
    FieldScale(Scale),
    /// Byte order, constant or bound.
    FieldEndianness(EndianSpec),
    /// Character encoding by name (see [`Encoding::from_name`]).
    FieldEncoding(Encoding),
    /// Absolute stream offset.
    FieldOffset(Bind),
    /// Computed value (checksum/CRC/hash) covering this member.
    FieldValue(ComputedSpec),
    /// Declares the key source for subtype dispatch.
    SubtypeKey(BindPath),
    /// One static subtype table entry.
    Subtype(SubtypeEntryDesc),
    /// Fallback type when no entry or factory matches.
    SubtypeDefault(TypeId),
    /// Registered factory consulted between table and default.
    SubtypeFactory(String),
    /// Explicit wire re-representation.
    SerializeAs(SerializeAsSpec),
    /// Conditional inclusion gate.
    SerializeWhen(WhenSpec),
    /// Value-terminated collection sentinel.
    SerializeUntil(Value),
    /// Per-item length: scalar (uniform) or sequence (jagged).
    ItemLength(Bind),
    /// Item-terminated collection.
    ItemSerializeUntil(ItemUntilSpec),
    /// Declares the key source for per-item subtype dispatch.
    ItemSubtypeKey(BindPath),
    /// One per-item subtype table entry.
    ItemSubtype(SubtypeEntryDesc),
    /// Per-item fallback type.
    ItemSubtypeDefault(TypeId),
    /// Per-item factory.
    ItemSubtypeFactory(String),
}

/// One member of a record descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberDesc {
    /// Field name; also the navigation segment used by paths.
    pub name: String,
    /// Declared type.
    pub field_type: FieldType,
    /// Attribute annotations.
    pub attrs: Vec<Attr>,
}

impl MemberDesc {
    /// Creates a member with no attributes.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            attrs: Vec::new(),
        }
    }

    /// Builder-style attribute addition.
    pub fn attr(mut self, attr: Attr) -> Self {
        self.attrs.push(attr);
        self
    }

    /// Shorthand for the ubiquitous `FieldOrder` annotation.
    pub fn order(self, order: i32) -> Self {
        self.attr(Attr::FieldOrder(order))
    }
}

/// Constructor specification: ordered parameter names matched against
/// field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CtorDesc {
    /// Parameter names, in declaration order.
    pub params: Vec<String>,
}

/// A normalized record type descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDesc {
    /// Identity of the described type.
    pub type_id: TypeId,
    /// Base type whose members precede this type's own.
    pub base: Option<TypeId>,
    /// Members declared directly on this type.
    pub members: Vec<MemberDesc>,
    /// Declared constructors; empty means a default constructor.
    pub ctors: Vec<CtorDesc>,
}

impl TypeDesc {
    /// Creates an empty descriptor.
    pub fn new(type_id: impl Into<TypeId>) -> Self {
        Self {
            type_id: type_id.into(),
            base: None,
            members: Vec::new(),
            ctors: Vec::new(),
        }
    }

    /// Sets the base type.
    pub fn extends(mut self, base: impl Into<TypeId>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Builder-style member addition.
    pub fn member(mut self, member: MemberDesc) -> Self {
        self.members.push(member);
        self
    }

    /// Builder-style constructor declaration.
    pub fn ctor(mut self, params: &[&str]) -> Self {
        self.ctors.push(CtorDesc {
            params: params.iter().map(|p| (*p).to_owned()).collect(),
        });
        self
    }
}

/// User-supplied bidirectional value transformation attached to bindings.
///
/// `convert` maps a source field value into the attribute domain (both
/// walks); `convert_back` maps a measured attribute value back into the
/// source domain during serialize write-back. Either direction may return
/// [`BinformError::ConverterRejected`](crate::BinformError::ConverterRejected)
/// to gate direction-limited bindings.
pub trait ValueConverter: Send + Sync {
    /// Source value → attribute value.
    fn convert(&self, value: &Value, arg: Option<&Value>, ctx: &BindContext<'_>) -> Result<Value>;

    /// Attribute value → source value (write-back).
    fn convert_back(
        &self,
        value: &Value,
        arg: Option<&Value>,
        ctx: &BindContext<'_>,
    ) -> Result<Value>;
}

/// Runtime fallback for subtype dispatch, consulted after the static table.
pub trait SubtypeFactory: Send + Sync {
    /// Maps a key read from the stream to a concrete type.
    fn type_for_key(&self, key: &Value) -> Option<TypeId>;

    /// Maps a runtime type back to its key during serialization.
    fn key_for_type(&self, type_id: &TypeId) -> Option<Value>;
}

/// User-provided codec for members the engine should not interpret.
///
/// When the enclosing declaration supplies a length, the stream handed in is
/// the bounded overlay; the codec cannot read or write past it.
pub trait CustomCodec: Send + Sync {
    /// Emits the value's octets.
    fn serialize(
        &self,
        value: &Value,
        out: &mut OutputFrame,
        endian: Endian,
        ctx: &BindContext<'_>,
    ) -> Result<()>;

    /// Reconstructs a value from the octets.
    fn deserialize(
        &self,
        input: &mut InputStream<'_>,
        endian: Endian,
        ctx: &BindContext<'_>,
    ) -> Result<Value>;
}
