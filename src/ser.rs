//! The serialize walk.
//!
//! Serialization is two passes over one value graph. The *mirror* pass
//! recursively builds value nodes for the whole instance (dispatching
//! subtypes by runtime type), so every binding source is reachable before a
//! single octet is produced. The *emit* pass then visits children in declared
//! order, resolving attributes through the binding resolver, framing bounded
//! subtrees, routing covered octets through computed-value taps, and writing
//! measured lengths/counts/keys back into their bound sources — patching
//! octets that were already emitted.

use crate::checksum::accumulator_for;
use crate::codec::{encode_prim, encode_str, endian_from_value, Encoding, Endian, Prim};
use crate::collection::{self, Termination};
use crate::desc::{Bind, BindPath, ComputedSpec, EndianSpec, WhenSpec};
use crate::error::{BinformError, Breadcrumb, Result, WalkDirection};
use crate::event::{MemberEvent, WalkObserver};
use crate::graph::resolve::{
    self, apply_scale, read_bind, read_source, scalar_wire_bytes, Resolved,
};
use crate::graph::{NodeId, ValueGraph, WireFmt};
use crate::schema::{NodeKind, Schema, TypeNode};
use crate::stream::{OutputFrame, TapId};
use crate::subtype::{self, WriteDispatch};
use crate::value::{Record, Value};
use std::sync::Arc;
use tracing::trace;

/// Attributes inherited top-down through the walk.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Inherit {
    pub endian: Endian,
    pub encoding: Encoding,
}

impl Default for Inherit {
    fn default() -> Self {
        Self {
            endian: Endian::Little,
            encoding: Encoding::Utf8,
        }
    }
}

/// Per-item context threaded from a collection into its items.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ItemCtx {
    /// True when the collection wrapped the item in a bounded overlay.
    pub bounded: bool,
}

/// Serializes one record against its registered type graph, returning the
/// finished octets.
pub(crate) fn serialize_record(
    schema: &Schema,
    observers: &[Arc<dyn WalkObserver>],
    record: &Record,
) -> Result<Vec<u8>> {
    let root_ty = schema.graph(&record.type_id)?;
    trace!(type_id = %record.type_id, "serialize walk starting");

    let mut walk = SerWalk {
        schema,
        observers,
        graph: ValueGraph::new(),
        frame: OutputFrame::new(),
    };
    let root_name = Arc::clone(&root_ty.name);
    let root = walk.mirror(root_ty, root_name, None, None, Some(Value::Record(record.clone())))?;
    walk.emit(root, Inherit::default(), None)?;
    Ok(walk.frame.into_bytes())
}

struct SerWalk<'s> {
    schema: &'s Schema,
    observers: &'s [Arc<dyn WalkObserver>],
    graph: ValueGraph,
    frame: OutputFrame,
}

impl<'s> SerWalk<'s> {
    /// Builds the full value mirror for `value` under `parent`.
    fn mirror(
        &mut self,
        ty: Arc<TypeNode>,
        name: Arc<str>,
        parent: Option<NodeId>,
        index: Option<usize>,
        value: Option<Value>,
    ) -> Result<NodeId> {
        let id = self.graph.add_node(Arc::clone(&ty), name, parent, index);
        self.graph.node_mut(id).slot = value.clone();

        match &ty.kind {
            NodeKind::Object { .. } => {
                if let Some(Value::Record(rec)) = &value {
                    let mut effective = Arc::clone(&ty);
                    if let Some(table) = &ty.subtypes {
                        // Dispatch by runtime type; a miss is only fatal if the
                        // member actually gets emitted, so it is left for the
                        // emit pass to rediscover.
                        if let Ok(dispatch) =
                            subtype::dispatch_write(table, self.schema, &rec.type_id)
                        {
                            let node = match dispatch {
                                WriteDispatch::Keyed { node, .. } => node,
                                WriteDispatch::Default(node) => node,
                            };
                            self.graph.node_mut(id).actual = Some(Arc::clone(&node));
                            effective = node;
                        }
                    }
                    for child_ty in effective.children.clone() {
                        let child_name = Arc::clone(&child_ty.name);
                        let child_value = rec.get(&child_name).cloned();
                        self.mirror(child_ty, child_name, Some(id), None, child_value)?;
                    }
                }
            }
            NodeKind::Collection { item } => {
                if let Some(Value::List(items)) = &value {
                    let item_ty = Arc::clone(item);
                    for (i, item_value) in items.clone().into_iter().enumerate() {
                        let item_name = Arc::clone(&item_ty.name);
                        self.mirror(
                            Arc::clone(&item_ty),
                            item_name,
                            Some(id),
                            Some(i),
                            Some(item_value),
                        )?;
                    }
                }
            }
            _ => {}
        }
        Ok(id)
    }

    fn emit(&mut self, id: NodeId, inherited: Inherit, item_ctx: Option<ItemCtx>) -> Result<()> {
        self.emit_inner(id, inherited, item_ctx).map_err(|e| {
            e.with_crumb(Breadcrumb {
                path: self.graph.path_of(id),
                offset: self.frame.position(),
                direction: WalkDirection::Serialize,
            })
        })
    }

    fn emit_inner(
        &mut self,
        id: NodeId,
        inherited: Inherit,
        item_ctx: Option<ItemCtx>,
    ) -> Result<()> {
        let ty = Arc::clone(&self.graph.node(id).ty);

        if !self.passes_conditions(id, &ty.attrs.when)? {
            return Ok(());
        }

        self.publish(id, true, |obs, ev| obs.member_serializing(ev));

        // Field offset jumps the cursor; siblings continue from wherever the
        // subtree ends.
        if let Some(bind) = &ty.attrs.offset {
            let offset = self
                .demand(id, bind)?
                .to_count()
                .ok_or(BinformError::TypeMismatch {
                    expected: "offset",
                    found: "non-integer",
                })?;
            self.frame.seek_to(offset);
            resolve::write_back(
                &mut self.graph,
                self.schema,
                &mut self.frame,
                id,
                bind,
                Value::UInt(offset),
            )?;
        }

        if let Some((multiple, mode)) = ty.attrs.align {
            if matches!(mode, crate::desc::AlignMode::Left | crate::desc::AlignMode::Both) {
                self.frame.align(multiple)?;
            }
        }

        let taps = self.start_taps(&ty);

        let endian = self.resolve_endian(id, &ty, inherited)?;
        let encoding = ty.attrs.encoding.unwrap_or(inherited.encoding);
        {
            let node = self.graph.node_mut(id);
            node.endian = Some(endian);
            node.encoding = Some(encoding);
        }
        let child_inherit = Inherit { endian, encoding };

        // A constant (or read-only-bound) length becomes a bounded overlay:
        // the subtree is padded to it and may not exceed it. A writable
        // length binding instead measures the subtree and writes back.
        let (bounded, writeback_length) = self.length_window(id, &ty)?;

        let start = self.frame.position();
        self.graph.node_mut(id).offset = Some(start);

        let slot = self.graph.node(id).slot.clone();
        match &ty.kind {
            NodeKind::Str if ty.attrs.serialize_as.is_none() => {
                self.emit_string(&ty, &slot, encoding, item_ctx)?;
            }
            NodeKind::Value { .. }
            | NodeKind::NullablePrim { .. }
            | NodeKind::Enum { .. }
            | NodeKind::Str => {
                self.emit_scalar(id, &ty, &slot, endian, encoding, item_ctx)?;
            }
            NodeKind::Bytes | NodeKind::Stream => {
                match &slot {
                    Some(Value::Bytes(bytes)) => self.frame.write_all(bytes)?,
                    Some(Value::Null) | None => {}
                    Some(other) => {
                        return Err(BinformError::TypeMismatch {
                            expected: "bytes",
                            found: other.kind_name(),
                        })
                    }
                }
            }
            NodeKind::PrimArray { prim } => {
                self.emit_prim_array(id, &ty, &slot, *prim, endian)?;
            }
            NodeKind::Collection { item } => {
                let item_ty = Arc::clone(item);
                self.emit_collection(id, &ty, &item_ty, child_inherit)?;
            }
            NodeKind::Object { .. } => {
                self.emit_object(id, &ty, &slot, child_inherit)?;
            }
            NodeKind::Custom { codec } => {
                let codec = Arc::clone(self.schema.codec_by_name(codec)?);
                let value = slot.clone().unwrap_or(Value::Null);
                let ctx = crate::graph::BindContext::new(&self.graph, self.schema, id);
                codec.serialize(&value, &mut self.frame, endian, &ctx)?;
            }
        }

        if bounded {
            self.frame.pop_bound()?;
        }

        let measured = self.frame.position().saturating_sub(start);
        self.graph.node_mut(id).length = Some(measured);

        if let Some(bind) = writeback_length {
            resolve::write_back(
                &mut self.graph,
                self.schema,
                &mut self.frame,
                id,
                &bind,
                Value::UInt(measured),
            )?;
        }

        self.finish_taps(id, taps)?;

        if let Some((multiple, mode)) = ty.attrs.align {
            if matches!(mode, crate::desc::AlignMode::Right | crate::desc::AlignMode::Both) {
                self.frame.align(multiple)?;
            }
        }

        self.publish(id, false, |obs, ev| obs.member_serialized(ev));
        Ok(())
    }

    /// Evaluates the `SerializeWhen(Not)` gates; all must pass.
    fn passes_conditions(&self, id: NodeId, gates: &[WhenSpec]) -> Result<bool> {
        for gate in gates {
            match read_source(&self.graph, self.schema, id, &gate.source)? {
                Resolved::Value(v) => {
                    if v.loosely_eq(&gate.value) == gate.negate {
                        return Ok(false);
                    }
                }
                Resolved::Unresolved { .. } => {
                    return Err(BinformError::NonDeferrableForwardReference {
                        path: gate.source.path.to_string(),
                    })
                }
            }
        }
        Ok(true)
    }

    /// Resolves a bind that must yield a value during serialization; the
    /// mirror pass makes every source reachable, so unresolved here means
    /// the path points into a skipped subtree.
    fn demand(&self, id: NodeId, bind: &Bind) -> Result<Value> {
        match read_bind(&self.graph, self.schema, id, bind)? {
            Resolved::Value(v) => Ok(v),
            Resolved::Unresolved { source } => Err(BinformError::NonDeferrableForwardReference {
                path: self.graph.path_of(source),
            }),
        }
    }

    fn resolve_endian(&self, id: NodeId, ty: &TypeNode, inherited: Inherit) -> Result<Endian> {
        if let Some(e) = ty.const_endian() {
            return Ok(e);
        }
        match &ty.attrs.endian {
            Some(EndianSpec::Bound(bp)) => match read_source(&self.graph, self.schema, id, bp)? {
                Resolved::Value(v) => endian_from_value(&v),
                Resolved::Unresolved { source } => {
                    Err(BinformError::NonDeferrableForwardReference {
                        path: self.graph.path_of(source),
                    })
                }
            },
            _ => Ok(inherited.endian),
        }
    }

    /// Opens the bounded overlay for a constant/read-only length, or hands
    /// back the bind for measure-and-write-back.
    fn length_window(&mut self, id: NodeId, ty: &TypeNode) -> Result<(bool, Option<Bind>)> {
        let Some(bind) = ty.attrs.length.clone() else {
            return Ok((false, None));
        };
        let writable = matches!(
            &bind,
            Bind::Path(BindPath {
                direction: crate::desc::BindDirection::Both
                    | crate::desc::BindDirection::WriteOnly,
                ..
            })
        );
        if writable {
            return Ok((false, Some(bind)));
        }
        let limit = self
            .demand(id, &bind)?
            .to_count()
            .ok_or(BinformError::TypeMismatch {
                expected: "length",
                found: "non-integer",
            })?;
        self.frame.push_bound(limit)?;
        Ok((true, None))
    }

    fn start_taps(&mut self, ty: &TypeNode) -> Vec<(TapId, ComputedSpec)> {
        ty.computed_kinds()
            .map(|(spec, kind)| {
                let mut acc = accumulator_for(kind);
                acc.reset();
                (self.frame.push_tap(acc), spec.clone())
            })
            .collect()
    }

    fn finish_taps(&mut self, id: NodeId, taps: Vec<(TapId, ComputedSpec)>) -> Result<()> {
        for (tap, spec) in taps.into_iter().rev() {
            let Some(mut acc) = self.frame.pop_tap(tap) else {
                continue;
            };
            let value = acc.finalize();
            resolve::write_back(
                &mut self.graph,
                self.schema,
                &mut self.frame,
                id,
                &Bind::Path(BindPath {
                    path: spec.target.clone(),
                    converter: None,
                    converter_arg: None,
                    direction: crate::desc::BindDirection::Both,
                }),
                value,
            )?;
        }
        Ok(())
    }

    fn emit_scalar(
        &mut self,
        id: NodeId,
        ty: &TypeNode,
        slot: &Option<Value>,
        endian: Endian,
        encoding: Encoding,
        item_ctx: Option<ItemCtx>,
    ) -> Result<()> {
        // String-mode enums travel as spelled literals, not numbers.
        if let NodeKind::Enum { spec } = &ty.kind {
            if spec.is_string_mode() {
                let name = match slot {
                    Some(Value::Str(name)) => name.clone(),
                    other => {
                        return Err(BinformError::TypeMismatch {
                            expected: "enum literal name",
                            found: other.as_ref().map_or("null", Value::kind_name),
                        })
                    }
                };
                let spelled = spec
                    .literals
                    .iter()
                    .find(|l| l.name == name)
                    .and_then(|l| l.serialize_as.clone())
                    .ok_or_else(|| BinformError::UnknownEnumLiteral {
                        value: format!("{name:?}"),
                    })?;
                return self.emit_string(ty, &Some(Value::Str(spelled)), encoding, item_ctx);
            }
        }

        let value = match slot {
            Some(Value::Null) | None => {
                if matches!(ty.kind, NodeKind::NullablePrim { .. }) {
                    return Ok(());
                }
                // Write-back sources often arrive unset; emit a placeholder
                // that the measured value patches later.
                Value::UInt(0)
            }
            Some(v) => v.clone(),
        };

        let prim = ty.wire_prim().ok_or(BinformError::TypeMismatch {
            expected: "scalar",
            found: "unsized",
        })?;
        let wire = WireFmt { prim, endian };
        let bytes = scalar_wire_bytes(ty, &value, wire)?;
        self.graph.node_mut(id).wire = Some(wire);
        self.frame.write_all(bytes.as_slice())
    }

    fn emit_string(
        &mut self,
        ty: &TypeNode,
        slot: &Option<Value>,
        encoding: Encoding,
        item_ctx: Option<ItemCtx>,
    ) -> Result<()> {
        let text = match slot {
            Some(Value::Str(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => {
                return Err(BinformError::TypeMismatch {
                    expected: "string",
                    found: other.kind_name(),
                })
            }
        };
        let bytes = encode_str(&text, encoding)?;
        self.frame.write_all(&bytes)?;

        // Null termination is implied when nothing sizes the string for the
        // reader: no parse-governing length binding, no item bound, no
        // enclosing bounded window. (A write-only length records the measure
        // but cannot size the decode, so the terminator is still needed.)
        let governed = match &ty.attrs.length {
            None => false,
            Some(Bind::Path(bp)) if bp.direction == crate::desc::BindDirection::WriteOnly => false,
            Some(_) => true,
        };
        let needs_term = !governed
            && match item_ctx {
                Some(ic) => !ic.bounded,
                None => self.frame.remaining().is_none(),
            };
        if needs_term {
            self.frame.write_zeros(encoding.terminator_width())?;
        }
        Ok(())
    }

    fn emit_prim_array(
        &mut self,
        id: NodeId,
        ty: &TypeNode,
        slot: &Option<Value>,
        prim: Prim,
        endian: Endian,
    ) -> Result<()> {
        let items: Vec<Value> = match slot {
            Some(Value::List(items)) => items.clone(),
            Some(Value::Bytes(bytes)) if prim == Prim::U8 => {
                bytes.iter().map(|b| Value::UInt(u64::from(*b))).collect()
            }
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(BinformError::TypeMismatch {
                    expected: "list",
                    found: other.kind_name(),
                })
            }
        };

        let termination = collection::select(&ty.attrs);
        if let Termination::Count(bind) = &termination {
            self.enforce_or_mark_count(id, bind, items.len())?;
        }

        // Bulk path: one contiguous buffer, single write.
        let mut buf = Vec::with_capacity(items.len() * prim.width());
        for item in &items {
            let scaled = match ty.attrs.scale {
                Some(scale) => apply_scale(scale, item),
                None => item.clone(),
            };
            buf.extend_from_slice(encode_prim(prim, &scaled, endian)?.as_slice());
        }
        self.frame.write_all(&buf)?;

        if let Termination::Until(sentinel) = &termination {
            let bytes = encode_prim(prim, sentinel, endian)?;
            self.frame.write_all(bytes.as_slice())?;
        }

        if let Termination::Count(bind) = &termination {
            resolve::write_back(
                &mut self.graph,
                self.schema,
                &mut self.frame,
                id,
                bind,
                Value::UInt(items.len() as u64),
            )?;
        }
        Ok(())
    }

    /// Constant counts must match the item count exactly; bound counts are
    /// written back after emission.
    fn enforce_or_mark_count(&self, id: NodeId, bind: &Bind, actual: usize) -> Result<()> {
        let constant = match bind {
            Bind::Const(v) => v.to_count(),
            Bind::Path(bp) if bp.direction == crate::desc::BindDirection::ReadOnly => {
                self.demand(id, bind)?.to_count()
            }
            _ => None,
        };
        if let Some(expected) = constant {
            if actual as u64 != expected {
                return Err(BinformError::Overflow {
                    natural: actual as u64,
                    bound: expected,
                });
            }
        }
        Ok(())
    }

    fn emit_collection(
        &mut self,
        id: NodeId,
        ty: &TypeNode,
        item_ty: &Arc<TypeNode>,
        inherit: Inherit,
    ) -> Result<()> {
        let items = self.graph.node(id).children.clone();

        let termination = collection::select(&ty.attrs);
        if let Termination::Count(bind) = &termination {
            self.enforce_or_mark_count(id, bind, items.len())?;
        }

        let item_window = self.item_window(id, ty, items.len())?;
        let mut measured_items = Vec::with_capacity(items.len());

        for (i, item_id) in items.iter().copied().enumerate() {
            let before = self.frame.position();
            match &item_window {
                ItemWindow::None => {
                    self.emit(item_id, inherit, Some(ItemCtx { bounded: false }))?;
                }
                ItemWindow::Uniform(limit) => {
                    self.frame.push_bound(*limit)?;
                    self.emit(item_id, inherit, Some(ItemCtx { bounded: true }))?;
                    self.frame.pop_bound()?;
                }
                ItemWindow::Jagged(limits) => {
                    let limit =
                        *limits
                            .get(i)
                            .ok_or(BinformError::ItemLengthMismatch {
                                expected: limits.len(),
                                actual: items.len(),
                            })?;
                    self.frame.push_bound(limit)?;
                    self.emit(item_id, inherit, Some(ItemCtx { bounded: true }))?;
                    self.frame.pop_bound()?;
                }
                ItemWindow::Measure => {
                    self.emit(item_id, inherit, Some(ItemCtx { bounded: false }))?;
                }
            }
            measured_items.push(self.frame.position().saturating_sub(before));
        }

        if let ItemWindow::Measure = item_window {
            self.write_back_item_lengths(id, ty, &measured_items)?;
        }

        if let Termination::Until(sentinel) = &termination {
            let prim = item_ty.wire_prim().unwrap_or(Prim::U8);
            let endian = self.graph.node(id).endian.unwrap_or(inherit.endian);
            let bytes = encode_prim(prim, sentinel, endian)?;
            self.frame.write_all(bytes.as_slice())?;
        }

        if let Termination::Count(bind) = &termination {
            resolve::write_back(
                &mut self.graph,
                self.schema,
                &mut self.frame,
                id,
                bind,
                Value::UInt(items.len() as u64),
            )?;
        }
        Ok(())
    }

    fn item_window(&self, id: NodeId, ty: &TypeNode, items: usize) -> Result<ItemWindow> {
        let Some(bind) = &ty.attrs.item_length else {
            return Ok(ItemWindow::None);
        };
        let writable = matches!(
            bind,
            Bind::Path(BindPath {
                direction: crate::desc::BindDirection::Both
                    | crate::desc::BindDirection::WriteOnly,
                ..
            })
        );
        if writable {
            return Ok(ItemWindow::Measure);
        }
        match self.demand(id, bind)? {
            Value::List(lengths) => {
                let mut limits = Vec::with_capacity(lengths.len());
                for len in &lengths {
                    limits.push(len.to_count().ok_or(BinformError::TypeMismatch {
                        expected: "item length",
                        found: "non-integer",
                    })?);
                }
                if limits.len() < items {
                    return Err(BinformError::ItemLengthMismatch {
                        expected: limits.len(),
                        actual: items,
                    });
                }
                Ok(ItemWindow::Jagged(limits))
            }
            scalar => {
                let limit = scalar.to_count().ok_or(BinformError::TypeMismatch {
                    expected: "item length",
                    found: "non-integer",
                })?;
                Ok(ItemWindow::Uniform(limit))
            }
        }
    }

    /// Writes measured per-item lengths back: a sequence source receives the
    /// whole jagged list; a scalar source requires uniform items.
    fn write_back_item_lengths(
        &mut self,
        id: NodeId,
        ty: &TypeNode,
        measured: &[u64],
    ) -> Result<()> {
        let Some(bind) = ty.attrs.item_length.clone() else {
            return Ok(());
        };
        let Bind::Path(bp) = &bind else {
            return Ok(());
        };
        let source = resolve::resolve_path(&self.graph, self.schema, id, &bp.path)?;
        let is_sequence = matches!(self.graph.node(source).slot, Some(Value::List(_)));
        let value = if is_sequence {
            Value::List(measured.iter().map(|m| Value::UInt(*m)).collect())
        } else {
            let Some(first) = measured.first() else {
                return Ok(());
            };
            if measured.iter().any(|m| m != first) {
                return Err(BinformError::ItemLengthMismatch {
                    expected: 1,
                    actual: measured.len(),
                });
            }
            Value::UInt(*first)
        };
        resolve::write_back(&mut self.graph, self.schema, &mut self.frame, id, &bind, value)
    }

    fn emit_object(
        &mut self,
        id: NodeId,
        ty: &TypeNode,
        slot: &Option<Value>,
        inherit: Inherit,
    ) -> Result<()> {
        let rec_type = match slot {
            Some(Value::Record(rec)) => rec.type_id.clone(),
            Some(Value::Null) | None => return Ok(()),
            Some(other) => {
                return Err(BinformError::TypeMismatch {
                    expected: "record",
                    found: other.kind_name(),
                })
            }
        };

        if let Some(table) = &ty.subtypes {
            match subtype::dispatch_write(table, self.schema, &rec_type)? {
                WriteDispatch::Keyed { key, .. } => {
                    resolve::write_back(
                        &mut self.graph,
                        self.schema,
                        &mut self.frame,
                        id,
                        &Bind::Path(table.key.clone()),
                        key,
                    )?;
                }
                WriteDispatch::Default(_) => {
                    // No key is written; a caller-set key field is honored.
                }
            }
        }

        for child in self.graph.node(id).children.clone() {
            self.emit(child, inherit, None)?;
        }
        Ok(())
    }

    fn publish(&self, id: NodeId, before: bool, f: impl Fn(&dyn WalkObserver, &MemberEvent)) {
        if self.observers.is_empty() || self.graph.node(id).parent.is_none() {
            return;
        }
        let node = self.graph.node(id);
        let event = MemberEvent {
            name: node.name.to_string(),
            offset: self.frame.position(),
            depth: self.graph.self_and_ancestors(id).count() - 1,
            value: if before { None } else { node.slot.clone() },
        };
        for obs in self.observers {
            f(obs.as_ref(), &event);
        }
    }
}

enum ItemWindow {
    None,
    Uniform(u64),
    Jagged(Vec<u64>),
    Measure,
}
