//! Centralized error handling for binform.
//!
//! All failure conditions are represented as `Result` values; the crate
//! enforces this through `#![deny(clippy::panic)]` and
//! `#![deny(clippy::unwrap_used)]`.
//!
//! ## Error Categories
//!
//! Errors are split by the phase that produces them:
//!
//! - **Build-time** (type-graph construction): [`BinformError::DuplicateOrder`],
//!   [`BinformError::MissingOrder`], [`BinformError::UnresolvedConstructor`],
//!   [`BinformError::CyclicType`], [`BinformError::SubtypeKeyAmbiguous`],
//!   [`BinformError::BindingPathInvalid`], [`BinformError::UnknownType`]
//! - **Bind-time** (path resolution): [`BinformError::BindingNotFound`],
//!   [`BinformError::NonDeferrableForwardReference`],
//!   [`BinformError::ConverterRejected`]
//! - **Walk-time** (serialize/deserialize): [`BinformError::Overflow`],
//!   [`BinformError::Underflow`], [`BinformError::UnknownSubtype`],
//!   [`BinformError::UnmappedSubtype`], [`BinformError::ItemLengthMismatch`],
//!   [`BinformError::NotSeekable`], [`BinformError::StreamClosed`], and the
//!   value-level conversion failures
//!
//! ## Breadcrumbs
//!
//! Errors raised inside a walk are wrapped with a breadcrumb trail: the node
//! path, the byte offset at the failure point, and the walk direction. Each
//! ancestor appends its own context as the walk unwinds, so the outermost
//! caller receives the full cause chain.
//!
//! ```rust
//! use binform::{BinformError, Breadcrumb, WalkDirection};
//!
//! let inner = BinformError::Underflow { needed: 4, available: 1 };
//! let err = inner.with_crumb(Breadcrumb {
//!     path: "Packet.Header.Length".into(),
//!     offset: 12,
//!     direction: WalkDirection::Deserialize,
//! });
//! assert!(err.to_string().contains("Packet.Header.Length"));
//! ```

use std::fmt;
use std::io;
use std::sync::Arc;

/// A specialized `Result` type for binform operations.
pub type Result<T> = std::result::Result<T, BinformError>;

/// Direction of the walk that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkDirection {
    /// An object was being emitted to the octet stream.
    Serialize,
    /// An object was being reconstructed from the octet stream.
    Deserialize,
}

impl fmt::Display for WalkDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serialize => write!(f, "serialize"),
            Self::Deserialize => write!(f, "deserialize"),
        }
    }
}

/// One entry of the path+offset trail attached to walk errors.
#[derive(Debug, Clone)]
pub struct Breadcrumb {
    /// Dotted node path from the root, e.g. `Packet.Header.Length`.
    pub path: String,
    /// Logical absolute byte offset at the failure point.
    pub offset: u64,
    /// Which walk was running.
    pub direction: WalkDirection,
}

impl fmt::Display for Breadcrumb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at `{}` (offset {})",
            self.direction, self.path, self.offset
        )
    }
}

/// The master error enum covering all failure domains in binform.
///
/// I/O errors are wrapped in `Arc` so the type stays `Clone`; everything else
/// carries owned diagnostic data.
#[derive(Debug, Clone)]
pub enum BinformError {
    /// Low-level I/O failure from the underlying stream.
    Io(Arc<io::Error>),

    /// Two siblings in the same declaration group share a field-order value.
    DuplicateOrder {
        /// The record type being built.
        type_id: String,
        /// The colliding order value.
        order: i32,
    },

    /// More than one sibling in a group has no explicit field-order.
    MissingOrder {
        /// The record type being built.
        type_id: String,
    },

    /// No declared constructor accepts the type's readable fields.
    UnresolvedConstructor {
        /// The record type being built.
        type_id: String,
    },

    /// A type appears as an ancestor of itself via composition.
    CyclicType {
        /// The type closing the cycle.
        type_id: String,
    },

    /// Two subtype entries share a key and more than one of them is
    /// readable (direction `Both` or `ReadOnly`).
    SubtypeKeyAmbiguous {
        /// The polymorphic member's declared type.
        type_id: String,
        /// The colliding key, rendered for diagnostics.
        key: String,
    },

    /// A binding path is malformed at build time (empty, or names an
    /// unknown member of a known type).
    BindingPathInvalid {
        /// The offending path, rendered.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A referenced type id has no registered descriptor.
    UnknownType {
        /// The missing type id.
        type_id: String,
    },

    /// A binding's source path did not resolve to a reachable node.
    BindingNotFound {
        /// The path that escaped the graph.
        path: String,
    },

    /// A forward-referenced binding could not be deferred because the
    /// holding field's byte width is not statically known.
    NonDeferrableForwardReference {
        /// The unresolved source path.
        path: String,
    },

    /// A value converter signalled "not supported" for the requested
    /// direction.
    ConverterRejected {
        /// The registered converter name.
        name: String,
    },

    /// A value was wider than its bound length/count window.
    Overflow {
        /// Naturally measured length/count.
        natural: u64,
        /// The bound it exceeded.
        bound: u64,
    },

    /// The stream or the enclosing bounded overlay ran out of octets.
    Underflow {
        /// Octets required by the read.
        needed: u64,
        /// Octets actually available.
        available: u64,
    },

    /// No subtype mapping, factory hit, or default matched the key read
    /// from the stream.
    UnknownSubtype {
        /// The key value, rendered.
        key: String,
    },

    /// A runtime type had no key mapping during serialization.
    UnmappedSubtype {
        /// The unmapped type id.
        type_id: String,
    },

    /// A jagged item-length sequence disagreed with the collection.
    ItemLengthMismatch {
        /// Lengths provided by the bound sequence.
        expected: usize,
        /// Items actually present.
        actual: usize,
    },

    /// The operation requires a seekable stream.
    NotSeekable {
        /// The operation that needed seeking.
        operation: &'static str,
    },

    /// The underlying stream was closed mid-operation.
    StreamClosed,

    /// A numeric value does not fit the wire representation.
    ValueOutOfRange {
        /// The target primitive name.
        prim: &'static str,
        /// The offending value, rendered.
        value: String,
    },

    /// A value slot does not match the member's declared type.
    TypeMismatch {
        /// What the schema expected.
        expected: &'static str,
        /// What the slot actually held.
        found: &'static str,
    },

    /// An enum literal (numeric or spelled) had no mapping.
    UnknownEnumLiteral {
        /// The unmapped wire value, rendered.
        value: String,
    },

    /// A string could not be represented in the effective encoding.
    Unencodable {
        /// The encoding name.
        encoding: &'static str,
        /// Detail from the codec.
        detail: String,
    },

    /// A lower-level error wrapped with the walk's breadcrumb trail.
    Walk {
        /// Innermost crumb first.
        crumbs: Vec<Breadcrumb>,
        /// The original failure.
        source: Box<BinformError>,
    },
}

impl BinformError {
    /// Wraps `self` with one more level of walk context.
    ///
    /// If `self` is already a [`BinformError::Walk`], the crumb is appended to
    /// the existing trail instead of nesting another wrapper.
    pub fn with_crumb(self, crumb: Breadcrumb) -> Self {
        match self {
            Self::Walk { mut crumbs, source } => {
                crumbs.push(crumb);
                Self::Walk { crumbs, source }
            }
            other => Self::Walk {
                crumbs: vec![crumb],
                source: Box::new(other),
            },
        }
    }

    /// Returns the innermost error, unwrapping any breadcrumb layers.
    pub fn root_cause(&self) -> &BinformError {
        match self {
            Self::Walk { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl fmt::Display for BinformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::DuplicateOrder { type_id, order } => {
                write!(f, "duplicate field-order {order} in `{type_id}`")
            }
            Self::MissingOrder { type_id } => {
                write!(f, "more than one member of `{type_id}` lacks a field-order")
            }
            Self::UnresolvedConstructor { type_id } => {
                write!(f, "no constructor of `{type_id}` accepts its readable fields")
            }
            Self::CyclicType { type_id } => {
                write!(f, "type `{type_id}` is an ancestor of itself via composition")
            }
            Self::SubtypeKeyAmbiguous { type_id, key } => {
                write!(
                    f,
                    "subtype key {key} of `{type_id}` has more than one readable mapping"
                )
            }
            Self::BindingPathInvalid { path, reason } => {
                write!(f, "binding path `{path}` is invalid: {reason}")
            }
            Self::UnknownType { type_id } => {
                write!(f, "no descriptor registered for type `{type_id}`")
            }
            Self::BindingNotFound { path } => {
                write!(f, "binding path `{path}` did not resolve to a node")
            }
            Self::NonDeferrableForwardReference { path } => {
                write!(f, "forward reference `{path}` cannot be deferred")
            }
            Self::ConverterRejected { name } => {
                write!(f, "converter `{name}` rejected the conversion")
            }
            Self::Overflow { natural, bound } => {
                write!(f, "value occupies {natural} octets but is bound to {bound}")
            }
            Self::Underflow { needed, available } => {
                write!(f, "needed {needed} octets, {available} available")
            }
            Self::UnknownSubtype { key } => write!(f, "no subtype mapped to key {key}"),
            Self::UnmappedSubtype { type_id } => {
                write!(f, "runtime type `{type_id}` has no subtype key")
            }
            Self::ItemLengthMismatch { expected, actual } => {
                write!(
                    f,
                    "item-length sequence has {expected} entries for {actual} items"
                )
            }
            Self::NotSeekable { operation } => {
                write!(f, "{operation} requires a seekable stream")
            }
            Self::StreamClosed => write!(f, "stream closed"),
            Self::ValueOutOfRange { prim, value } => {
                write!(f, "value {value} does not fit in {prim}")
            }
            Self::TypeMismatch { expected, found } => {
                write!(f, "expected a {expected} value, found {found}")
            }
            Self::UnknownEnumLiteral { value } => {
                write!(f, "no enum literal maps to {value}")
            }
            Self::Unencodable { encoding, detail } => {
                write!(f, "cannot encode as {encoding}: {detail}")
            }
            Self::Walk { crumbs, source } => {
                write!(f, "{source}")?;
                for crumb in crumbs {
                    write!(f, "\n  while {crumb}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for BinformError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e.as_ref()),
            Self::Walk { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for BinformError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Self::Underflow {
                needed: 0,
                available: 0,
            },
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected => Self::StreamClosed,
            _ => Self::Io(Arc::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;

    #[test]
    fn crumbs_accumulate_instead_of_nesting() {
        let err = BinformError::StreamClosed
            .with_crumb(Breadcrumb {
                path: "A.B".into(),
                offset: 4,
                direction: WalkDirection::Serialize,
            })
            .with_crumb(Breadcrumb {
                path: "A".into(),
                offset: 0,
                direction: WalkDirection::Serialize,
            });

        match &err {
            BinformError::Walk { crumbs, source } => {
                assert_eq!(crumbs.len(), 2);
                assert!(matches!(**source, BinformError::StreamClosed));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
        assert!(matches!(err.root_cause(), BinformError::StreamClosed));
    }

    #[test]
    fn eof_maps_to_underflow() {
        let io_err = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        assert!(matches!(
            BinformError::from(io_err),
            BinformError::Underflow { .. }
        ));
    }
}
