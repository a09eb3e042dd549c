//! Subtype dispatch: resolving polymorphic field contents.
//!
//! Dispatch consults, in order: the static key→type table, the registered
//! factory, and the default type. Entries are direction-aware: a `ReadOnly`
//! mapping only participates in deserialization, a `WriteOnly` mapping only
//! in serialization. Ambiguity (two readable entries sharing a key) is
//! rejected when the type graph is built.

use crate::desc::BindDirection;
use crate::error::{BinformError, Result};
use crate::schema::{Schema, SubtypeTable, TypeNode};
use crate::value::{TypeId, Value};
use std::sync::Arc;

/// Outcome of deserialize-side dispatch.
#[derive(Debug)]
pub enum ReadDispatch {
    /// A concrete type matched the key.
    Matched(Arc<TypeNode>),
    /// Nothing matched; the default type absorbs the payload.
    Defaulted(Arc<TypeNode>),
}

impl ReadDispatch {
    /// The dispatched shape, however it was found.
    pub fn node(&self) -> &Arc<TypeNode> {
        match self {
            Self::Matched(n) | Self::Defaulted(n) => n,
        }
    }
}

/// Resolves the concrete type for a key read from the stream.
///
/// Lookup order: static entries with direction `Both`/`ReadOnly`, then the
/// factory, then the default. With no hit anywhere the key is unknown.
pub fn dispatch_read(table: &SubtypeTable, schema: &Schema, key: &Value) -> Result<ReadDispatch> {
    for entry in &table.entries {
        if entry.direction != BindDirection::WriteOnly && entry.key.loosely_eq(key) {
            return Ok(ReadDispatch::Matched(Arc::clone(&entry.node)));
        }
    }
    if let Some(name) = &table.factory {
        if let Some(factory) = schema.factory_by_name(name) {
            if let Some(tid) = factory.type_for_key(key) {
                return Ok(ReadDispatch::Matched(schema.graph(&tid)?));
            }
        }
    }
    if let Some(default) = &table.default {
        return Ok(ReadDispatch::Defaulted(Arc::clone(default)));
    }
    Err(BinformError::UnknownSubtype {
        key: format!("{key:?}"),
    })
}

/// Outcome of serialize-side dispatch.
#[derive(Debug)]
pub enum WriteDispatch {
    /// A key was found; write it back to the bound source and recurse with
    /// the mapped shape.
    Keyed {
        /// The key to write into the bound source.
        key: Value,
        /// The concrete shape to serialize with.
        node: Arc<TypeNode>,
    },
    /// The runtime type is the default; no key is written (a caller-set key
    /// is honored) and the declared shape applies.
    Default(Arc<TypeNode>),
}

/// Resolves the key for a runtime type during serialization.
///
/// Lookup order: static entries with direction `Both`/`WriteOnly` matched by
/// type, then the factory, then the default-type identity check.
pub fn dispatch_write(
    table: &SubtypeTable,
    schema: &Schema,
    runtime: &TypeId,
) -> Result<WriteDispatch> {
    for entry in &table.entries {
        if entry.direction != BindDirection::ReadOnly && &entry.type_id == runtime {
            return Ok(WriteDispatch::Keyed {
                key: entry.key.clone(),
                node: Arc::clone(&entry.node),
            });
        }
    }
    if let Some(name) = &table.factory {
        if let Some(factory) = schema.factory_by_name(name) {
            if let Some(key) = factory.key_for_type(runtime) {
                return Ok(WriteDispatch::Keyed {
                    key,
                    node: schema.graph(runtime)?,
                });
            }
        }
    }
    if let Some(default) = &table.default {
        if matches!(&default.kind, crate::schema::NodeKind::Object { type_id } if type_id == runtime)
        {
            return Ok(WriteDispatch::Default(Arc::clone(default)));
        }
    }
    Err(BinformError::UnmappedSubtype {
        type_id: runtime.to_string(),
    })
}
