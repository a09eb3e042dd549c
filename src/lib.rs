//! # binform
//!
//! A declarative, byte-level binary serialization engine. A format is
//! described by registering record-type descriptors whose members carry
//! attributes — ordering, length, count, alignment, endianness, encoding,
//! subtyping, offsets, conditions, and computed values — and the engine
//! serializes instances to an octet stream and back, faithfully honoring the
//! declared layout, including cross-field bindings (a `Length` field whose
//! value drives the length of a later `Data` field).
//!
//! ## Overview
//!
//! The engine is built around two graphs:
//!
//! *   **Type graph** — a cached, immutable description of a record shape:
//!     typed nodes, effective attribute sets, binding lists, subtype tables,
//!     and a compiled constructor. Built once per type, shared via `Arc`.
//! *   **Value graph** — a per-operation mirror of the type graph bound to
//!     concrete instance data. The serialize/deserialize walks traverse it in
//!     declared order, consulting the binding resolver for every attribute
//!     that references another field.
//!
//! Around the graphs sit the stream framer (bounded overlays, padding,
//! alignment, offsets over seekable and plain streams), the subtype
//! dispatcher (static tables, factories, defaults — direction aware), the
//! computed-value engine (checksums/CRCs/hashes accumulated during the write
//! walk and patched into the bound target), and the collection engine
//! (count, byte-length, item-length, until-value, and until-item
//! termination).
//!
//! ## Example
//!
//! The classic length-bound string: the `NameLength` field is written back
//! from the measured length of `Name`, whatever the instance said.
//!
//! ```rust
//! use binform::{
//!     Attr, Bind, Binform, FieldType, MemberDesc, Prim, Record, Schema, TypeDesc, Value,
//! };
//!
//! let mut schema = Schema::new();
//! schema.register(
//!     TypeDesc::new("Person")
//!         .member(MemberDesc::new("NameLength", FieldType::Prim(Prim::U8)).order(1))
//!         .member(
//!             MemberDesc::new("Name", FieldType::Str)
//!                 .order(2)
//!                 .attr(Attr::FieldLength(Bind::to("NameLength"))),
//!         ),
//! );
//!
//! let engine = Binform::new(schema);
//! let person = Record::new("Person").with("Name", Value::Str("Alice".into()));
//!
//! let bytes = engine.serialize(&person)?;
//! assert_eq!(bytes, b"\x05Alice");
//!
//! let back = engine.deserialize("Person", &bytes)?;
//! assert_eq!(back.get("Name"), Some(&Value::Str("Alice".into())));
//! assert_eq!(back.get("NameLength"), Some(&Value::UInt(5)));
//! # Ok::<(), binform::BinformError>(())
//! ```
//!
//! ## Concurrency
//!
//! The type-graph cache is single-writer/many-reader with double-checked
//! publication; nodes are immutable after publication. Each operation owns
//! its value graph, stream context, and accumulators — there is no shared
//! mutable state between calls, and the walk itself is single-threaded and
//! deterministic.
//!
//! ### Safety and error handling
//!
//! * **No panics:** no `unwrap()` or `panic!()` in the library (enforced by
//!   clippy lints).
//! * **Comprehensive errors:** every failure maps to a [`BinformError`], and
//!   walk failures carry a breadcrumb trail of `(node path, byte offset)`.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

// --- PUBLIC API MODULES ---
pub mod api;
pub mod checksum;
pub mod codec;
pub mod collection;
pub mod desc;
pub mod error;
pub mod event;
pub mod inspect;
pub mod schema;
pub mod stream;
pub mod subtype;
pub mod value;

// --- INTERNAL IMPLEMENTATION MODULES (Hidden from Docs) ---
#[doc(hidden)]
pub mod graph;

// Private walk engines.
mod de;
mod ser;

// --- RE-EXPORTS ---

pub use api::Binform;
pub use checksum::{ChecksumMode, ComputedKind, Crc16Algo, ValueAccumulator};
pub use codec::{Encoding, Endian, Prim};
pub use desc::{
    AlignMode, Anchor, Attr, Bind, BindDirection, BindPath, ComputedSpec, CtorDesc, CustomCodec,
    EndianSpec, EnumLiteral, EnumSpec, FieldType, ItemUntilSpec, LastItemMode, MemberDesc,
    PathSpec, Scale, SerializeAsSpec, SubtypeEntryDesc, SubtypeFactory, TypeDesc, ValueConverter,
    WhenSpec,
};
pub use error::{BinformError, Breadcrumb, Result, WalkDirection};
pub use event::{MemberEvent, WalkObserver};
pub use graph::BindContext;
pub use inspect::{GraphInspector, GraphReport};
pub use schema::Schema;
pub use stream::{InputStream, OutputFrame};
pub use value::{Record, TypeId, Value};

/// Constants used throughout the library.
pub mod constants {
    /// The default buffer size for I/O staging.
    pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;
}
