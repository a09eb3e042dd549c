//! The binding resolver: a small dataflow engine evaluating binding
//! expressions against value-graph positions.
//!
//! Resolution has two phases: walk *upward* from the holding node (to a fixed
//! level, to an ancestor of a given type, or to the nearest ancestor owning
//! the path's first segment), then *descend* by child name. The resolved
//! node's slot is read through the optional converter; during serialization
//! the measured value flows the other way (write-back), patching octets that
//! were already emitted.

use super::core::{ValueGraph, WireFmt};
use super::id::NodeId;
use crate::codec::{encode_prim, PrimBytes};
use crate::desc::{Anchor, Bind, BindDirection, BindPath, PathSpec, Scale};
use crate::error::{BinformError, Result};
use crate::schema::{NodeKind, Schema, TypeNode};
use crate::stream::OutputFrame;
use crate::value::{TypeId, Value};

/// Resolution context handed to value converters and custom codecs.
///
/// Exposes ancestor-by-type lookup over the live value graph, rooted at the
/// node that holds the binding being evaluated.
pub struct BindContext<'g> {
    pub(crate) graph: &'g ValueGraph,
    pub(crate) schema: &'g Schema,
    pub(crate) at: NodeId,
}

impl<'g> BindContext<'g> {
    pub(crate) fn new(graph: &'g ValueGraph, schema: &'g Schema, at: NodeId) -> Self {
        Self { graph, schema, at }
    }

    /// The breadcrumb path of the holding node.
    pub fn path(&self) -> String {
        self.graph.path_of(self.at)
    }

    /// Finds the nearest strict ancestor whose (dispatched) type is
    /// `type_id` or derives from it, returning its current value.
    pub fn ancestor_of_type(&self, type_id: &TypeId) -> Option<&Value> {
        for nid in self.graph.self_and_ancestors(self.at).skip(1) {
            let node = self.graph.node(nid);
            if let NodeKind::Object { type_id: tid } = &node.effective_ty().kind {
                if self.schema.is_same_or_derived(tid, type_id) {
                    return node.slot.as_ref();
                }
            }
        }
        None
    }
}

/// Outcome of reading a binding source.
#[derive(Debug)]
pub enum Resolved {
    /// The source value, converter already applied.
    Value(Value),
    /// The source node exists but has no resolved value yet (forward
    /// reference during deserialization).
    Unresolved {
        /// The node that must resolve first.
        source: NodeId,
    },
}

fn not_found(path: &PathSpec) -> BinformError {
    BinformError::BindingNotFound {
        path: path.to_string(),
    }
}

/// Resolves a path spec relative to `from`, returning the target node.
pub fn resolve_path(
    graph: &ValueGraph,
    schema: &Schema,
    from: NodeId,
    path: &PathSpec,
) -> Result<NodeId> {
    let first = path.segments.first().ok_or_else(|| not_found(path))?;

    let base = match &path.anchor {
        Anchor::Auto => graph
            .self_and_ancestors(from)
            .find(|&nid| graph.child_by_name(nid, first).is_some())
            .ok_or_else(|| not_found(path))?,
        Anchor::Level(levels) => {
            let mut cursor = from;
            for _ in 0..*levels {
                cursor = graph.node(cursor).parent.ok_or_else(|| not_found(path))?;
            }
            cursor
        }
        Anchor::Type(tid) => graph
            .self_and_ancestors(from)
            .skip(1)
            .find(|&nid| {
                let node = graph.node(nid);
                match &node.effective_ty().kind {
                    NodeKind::Object { type_id } => schema.is_same_or_derived(type_id, tid),
                    _ => false,
                }
            })
            .ok_or_else(|| not_found(path))?,
    };

    let mut cursor = base;
    for segment in &path.segments {
        cursor = graph
            .child_by_name(cursor, segment)
            .ok_or_else(|| not_found(path))?;
    }
    Ok(cursor)
}

/// Reads a path-bound source relative to `holder`, applying the attached
/// converter in the source→attribute direction.
pub fn read_source(
    graph: &ValueGraph,
    schema: &Schema,
    holder: NodeId,
    bp: &BindPath,
) -> Result<Resolved> {
    let source = resolve_path(graph, schema, holder, &bp.path)?;
    let Some(value) = graph.node(source).slot.clone() else {
        return Ok(Resolved::Unresolved { source });
    };
    let value = match &bp.converter {
        Some(name) => {
            let converter = schema.converter_by_name(name)?;
            let ctx = BindContext::new(graph, schema, holder);
            converter.convert(&value, bp.converter_arg.as_ref(), &ctx)?
        }
        None => value,
    };
    Ok(Resolved::Value(value))
}

/// Reads a constant-or-path bind; constants never defer.
pub fn read_bind(
    graph: &ValueGraph,
    schema: &Schema,
    holder: NodeId,
    bind: &Bind,
) -> Result<Resolved> {
    match bind {
        Bind::Const(value) => Ok(Resolved::Value(value.clone())),
        Bind::Path(bp) => read_source(graph, schema, holder, bp),
    }
}

/// Applies a rational scale on the way to the wire.
pub(crate) fn apply_scale(scale: Scale, value: &Value) -> Value {
    let factor = scale.num as f64 / scale.den as f64;
    match value {
        Value::Int(v) => Value::Int((*v as f64 * factor).round() as i64),
        Value::UInt(v) => Value::UInt((*v as f64 * factor).round() as u64),
        Value::Float(v) => Value::Float(v * factor),
        other => other.clone(),
    }
}

/// Inverts [`apply_scale`] on the way back from the wire.
pub(crate) fn unapply_scale(scale: Scale, value: &Value) -> Value {
    let factor = scale.den as f64 / scale.num as f64;
    match value {
        Value::Int(v) => Value::Int((*v as f64 * factor).round() as i64),
        Value::UInt(v) => Value::UInt((*v as f64 * factor).round() as u64),
        Value::Float(v) => Value::Float(v * factor),
        other => other.clone(),
    }
}

/// Maps an in-memory enum value (literal name or number) to its numeric wire
/// value.
pub(crate) fn enum_to_wire(ty: &TypeNode, value: &Value) -> Result<Value> {
    let NodeKind::Enum { spec } = &ty.kind else {
        return Ok(value.clone());
    };
    match value {
        Value::Str(name) => spec
            .literals
            .iter()
            .find(|l| &l.name == name)
            .map(|l| Value::Int(l.value))
            .ok_or_else(|| BinformError::UnknownEnumLiteral {
                value: format!("{name:?}"),
            }),
        other => Ok(other.clone()),
    }
}

/// Parses a string slot into the numeric domain of a wire primitive, for
/// `SerializeAs` re-representations of textual members.
fn coerce_for_prim(prim: crate::codec::Prim, value: Value) -> Result<Value> {
    let Value::Str(s) = &value else {
        return Ok(value);
    };
    if prim.is_float() {
        s.trim().parse::<f64>().map(Value::Float).map_err(|_| ())
    } else if prim.is_signed() {
        s.trim().parse::<i64>().map(Value::Int).map_err(|_| ())
    } else {
        s.trim().parse::<u64>().map(Value::UInt).map_err(|_| ())
    }
    .map_err(|_| BinformError::ValueOutOfRange {
        prim: prim.name(),
        value: format!("{s:?}"),
    })
}

/// Rounds a float into the integer domain of an integral wire primitive, so
/// scaled or re-represented floats can land on integer wires.
pub(crate) fn fit_integral(prim: crate::codec::Prim, value: Value) -> Value {
    if prim.is_float() {
        return value;
    }
    match value {
        Value::Float(f) if prim.is_signed() => Value::Int(f.round() as i64),
        Value::Float(f) => Value::UInt(f.round() as u64),
        other => other,
    }
}

/// Encodes a scalar node's logical value exactly as the emit path would:
/// enum mapping, then scaling, then the recorded wire primitive.
pub(crate) fn scalar_wire_bytes(ty: &TypeNode, value: &Value, wire: WireFmt) -> Result<PrimBytes> {
    let value = enum_to_wire(ty, value)?;
    let value = coerce_for_prim(wire.prim, value)?;
    let value = match ty.attrs.scale {
        Some(scale) => apply_scale(scale, &value),
        None => value,
    };
    let value = fit_integral(wire.prim, value);
    encode_prim(wire.prim, &value, wire.endian)
}

/// Writes a measured value back into its bound source: the slot is updated
/// (through `convert_back` when a converter is attached) and, when the source
/// scalar was already emitted, its octets are patched in place.
///
/// Constant binds and `ReadOnly` directions never write back.
pub fn write_back(
    graph: &mut ValueGraph,
    schema: &Schema,
    frame: &mut OutputFrame,
    holder: NodeId,
    bind: &Bind,
    measured: Value,
) -> Result<()> {
    let Bind::Path(bp) = bind else {
        return Ok(());
    };
    if bp.direction == BindDirection::ReadOnly {
        return Ok(());
    }
    let source = resolve_path(graph, schema, holder, &bp.path)?;

    let value = match &bp.converter {
        Some(name) => {
            let converter = schema.converter_by_name(name)?;
            let ctx = BindContext::new(graph, schema, holder);
            converter.convert_back(&measured, bp.converter_arg.as_ref(), &ctx)?
        }
        None => measured,
    };

    let node = graph.node_mut(source);
    node.slot = Some(value.clone());

    // Patch octets the source already emitted: scalars re-encode through
    // their recorded wire layout, strings re-encode into their original
    // window (subtype keys are commonly string-typed).
    let patch = match (node.offset, node.wire) {
        (Some(offset), Some(wire)) => {
            let ty = node.effective_ty().clone();
            Some((offset, scalar_wire_bytes(&ty, &value, wire)?.as_slice().to_vec()))
        }
        (Some(offset), None) if matches!(node.ty.kind, NodeKind::Str) => {
            let encoding = node.encoding.unwrap_or_default();
            let window = node.length.unwrap_or(0) as usize;
            let text = value.as_str().ok_or(BinformError::TypeMismatch {
                expected: "string",
                found: value.kind_name(),
            })?;
            let mut bytes = crate::codec::encode_str(text, encoding)?;
            if bytes.len() > window {
                return Err(BinformError::Overflow {
                    natural: bytes.len() as u64,
                    bound: window as u64,
                });
            }
            bytes.resize(window, 0);
            Some((offset, bytes))
        }
        _ => None,
    };
    if let Some((offset, bytes)) = patch {
        frame.write_at(offset, &bytes)?;
    }
    Ok(())
}
