//! The deserialize walk.
//!
//! Deserialization grows the value graph as it reads: entering an object
//! creates value nodes for every member up front (so binding paths resolve
//! structurally), then visits them in declared order. Bindings normally point
//! backward and resolve immediately; a forward-referenced endianness binding
//! defers instead — the field's raw octets are retained and re-interpreted
//! once the source resolves, cascading through any bindings that were waiting
//! on it. Records are materialized through the type's compiled constructor
//! when their last member has been read.

use crate::codec::{decode_prim, decode_str, decode_str_trimmed, endian_from_value, Encoding, Endian, Prim};
use crate::collection::{self, Termination};
use crate::desc::{Bind, BindDirection, BindPath, EndianSpec, LastItemMode, WhenSpec};
use crate::error::{BinformError, Breadcrumb, Result, WalkDirection};
use crate::event::{MemberEvent, WalkObserver};
use crate::graph::resolve::{self, read_source, unapply_scale, Resolved};
use crate::graph::{BindContext, NodeId, ValueGraph};
use crate::schema::{NodeKind, Schema, TypeNode};
use crate::ser::{Inherit, ItemCtx};
use crate::stream::InputStream;
use crate::subtype;
use crate::value::{TypeId, Value};
use std::sync::Arc;
use tracing::trace;

/// Deserializes one record of the given type from the framed input.
pub(crate) fn deserialize_record(
    schema: &Schema,
    observers: &[Arc<dyn WalkObserver>],
    type_id: &TypeId,
    input: InputStream<'_>,
) -> Result<Value> {
    let root_ty = schema.graph(type_id)?;
    trace!(type_id = %type_id, "deserialize walk starting");

    let mut walk = DeWalk {
        schema,
        observers,
        graph: ValueGraph::new(),
        input,
        pending: Vec::new(),
    };
    let root_name = Arc::clone(&root_ty.name);
    let root = walk.graph.add_node(root_ty, root_name, None, None);
    walk.read(root, Inherit::default(), None)?;

    walk.try_resolve_pending()?;
    if let Some(&stuck) = walk.pending.first() {
        return Err(BinformError::NonDeferrableForwardReference {
            path: walk.graph.path_of(stuck),
        });
    }

    Ok(walk.graph.node_mut(root).slot.take().unwrap_or(Value::Null))
}

struct DeWalk<'s, 'r> {
    schema: &'s Schema,
    observers: &'s [Arc<dyn WalkObserver>],
    graph: ValueGraph,
    input: InputStream<'r>,
    pending: Vec<NodeId>,
}

impl<'s, 'r> DeWalk<'s, 'r> {
    fn read(&mut self, id: NodeId, inherited: Inherit, item_ctx: Option<ItemCtx>) -> Result<()> {
        self.read_inner(id, inherited, item_ctx).map_err(|e| {
            e.with_crumb(Breadcrumb {
                path: self.graph.path_of(id),
                offset: self.input.position(),
                direction: WalkDirection::Deserialize,
            })
        })
    }

    fn read_inner(
        &mut self,
        id: NodeId,
        inherited: Inherit,
        item_ctx: Option<ItemCtx>,
    ) -> Result<()> {
        let ty = Arc::clone(&self.graph.node(id).ty);

        if !self.passes_conditions(id, &ty.attrs.when)? {
            self.graph.node_mut(id).slot = Some(Value::Null);
            return Ok(());
        }

        self.publish(id, true, |obs, ev| obs.member_deserializing(ev));

        if let Some(bind) = &ty.attrs.offset {
            if let Some(value) = self.demand_bind(id, bind)? {
                if !self.input.is_seekable() {
                    return Err(BinformError::NotSeekable {
                        operation: "field offset",
                    });
                }
                let offset = value.to_count().ok_or(BinformError::TypeMismatch {
                    expected: "offset",
                    found: "non-integer",
                })?;
                self.input.seek_to(offset)?;
            }
        }

        if let Some((multiple, mode)) = ty.attrs.align {
            if matches!(mode, crate::desc::AlignMode::Left | crate::desc::AlignMode::Both) {
                self.input.align(multiple)?;
            }
        }

        // Endianness may be forward-referenced; a fixed-width field defers by
        // retaining its raw octets for later re-interpretation.
        let endian = match self.resolve_endian(id, &ty, inherited)? {
            EndianOutcome::Known(e) => e,
            EndianOutcome::Deferred => {
                let width =
                    ty.fixed_wire_width()
                        .ok_or(BinformError::NonDeferrableForwardReference {
                            path: self.graph.path_of(id),
                        })?;
                let start = self.input.position();
                let raw = self.input.read_exact(width)?;
                let node = self.graph.node_mut(id);
                node.deferred = Some(raw);
                node.offset = Some(start);
                node.length = Some(width as u64);
                self.pending.push(id);
                self.publish(id, false, |obs, ev| obs.member_deserialized(ev));
                return Ok(());
            }
        };
        let encoding = ty.attrs.encoding.unwrap_or(inherited.encoding);
        {
            let node = self.graph.node_mut(id);
            node.endian = Some(endian);
            node.encoding = Some(encoding);
        }
        let child_inherit = Inherit { endian, encoding };

        let bounded = self.length_window(id, &ty)?;
        let start = self.input.position();
        self.graph.node_mut(id).offset = Some(start);

        match &ty.kind {
            NodeKind::Str if ty.attrs.serialize_as.is_none() => {
                let bytes = self.read_string_bytes(encoding, bounded, item_ctx)?;
                let sized = bounded || item_ctx.map_or(false, |ic| ic.bounded);
                let text = if sized {
                    decode_str_trimmed(&bytes, encoding)?
                } else {
                    decode_str(&bytes, encoding)?
                };
                self.graph.node_mut(id).slot = Some(Value::Str(text));
            }
            NodeKind::Value { .. }
            | NodeKind::NullablePrim { .. }
            | NodeKind::Enum { .. }
            | NodeKind::Str => {
                self.read_scalar(id, &ty, endian, encoding, bounded, item_ctx)?;
            }
            NodeKind::Bytes | NodeKind::Stream => {
                let bytes = self.input.read_to_limit()?;
                self.graph.node_mut(id).slot = Some(Value::Bytes(bytes));
            }
            NodeKind::PrimArray { prim } => {
                self.read_prim_array(id, &ty, *prim, endian)?;
            }
            NodeKind::Collection { item } => {
                let item_ty = Arc::clone(item);
                self.read_collection(id, &ty, &item_ty, child_inherit)?;
            }
            NodeKind::Object { .. } => {
                self.read_object(id, &ty, child_inherit)?;
            }
            NodeKind::Custom { codec } => {
                let codec = Arc::clone(self.schema.codec_by_name(codec)?);
                let ctx = BindContext::new(&self.graph, self.schema, id);
                let value = codec.deserialize(&mut self.input, endian, &ctx)?;
                self.graph.node_mut(id).slot = Some(value);
            }
        }

        if bounded {
            self.input.pop_bound()?;
        }

        let node = self.graph.node_mut(id);
        node.length = Some(self.input.position().saturating_sub(start));

        if let Some((multiple, mode)) = ty.attrs.align {
            if matches!(mode, crate::desc::AlignMode::Right | crate::desc::AlignMode::Both) {
                self.input.align(multiple)?;
            }
        }

        self.try_resolve_pending()?;
        self.publish(id, false, |obs, ev| obs.member_deserialized(ev));
        Ok(())
    }

    fn passes_conditions(&mut self, id: NodeId, gates: &[WhenSpec]) -> Result<bool> {
        for gate in gates {
            let value = self.demand_source(id, &gate.source)?;
            if value.loosely_eq(&gate.value) == gate.negate {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Resolves a path source, retrying once after flushing pending
    /// deferrals; still-unresolved sources are non-deferrable here.
    fn demand_source(&mut self, id: NodeId, bp: &BindPath) -> Result<Value> {
        match read_source(&self.graph, self.schema, id, bp)? {
            Resolved::Value(v) => Ok(v),
            Resolved::Unresolved { .. } => {
                self.try_resolve_pending()?;
                match read_source(&self.graph, self.schema, id, bp)? {
                    Resolved::Value(v) => Ok(v),
                    Resolved::Unresolved { .. } => {
                        Err(BinformError::NonDeferrableForwardReference {
                            path: bp.path.to_string(),
                        })
                    }
                }
            }
        }
    }

    /// Resolves a constant-or-path bind; `WriteOnly` bindings do not
    /// participate in deserialization and yield `None`.
    fn demand_bind(&mut self, id: NodeId, bind: &Bind) -> Result<Option<Value>> {
        match bind {
            Bind::Const(v) => Ok(Some(v.clone())),
            Bind::Path(bp) if bp.direction == BindDirection::WriteOnly => Ok(None),
            Bind::Path(bp) => self.demand_source(id, bp).map(Some),
        }
    }

    fn resolve_endian(
        &mut self,
        id: NodeId,
        ty: &TypeNode,
        inherited: Inherit,
    ) -> Result<EndianOutcome> {
        if let Some(e) = ty.const_endian() {
            return Ok(EndianOutcome::Known(e));
        }
        match &ty.attrs.endian {
            Some(EndianSpec::Bound(bp)) => {
                match read_source(&self.graph, self.schema, id, bp)? {
                    Resolved::Value(v) => Ok(EndianOutcome::Known(endian_from_value(&v)?)),
                    Resolved::Unresolved { .. } => {
                        self.try_resolve_pending()?;
                        match read_source(&self.graph, self.schema, id, bp)? {
                            Resolved::Value(v) => {
                                Ok(EndianOutcome::Known(endian_from_value(&v)?))
                            }
                            Resolved::Unresolved { .. } => Ok(EndianOutcome::Deferred),
                        }
                    }
                }
            }
            _ => Ok(EndianOutcome::Known(inherited.endian)),
        }
    }

    fn length_window(&mut self, id: NodeId, ty: &TypeNode) -> Result<bool> {
        let Some(bind) = ty.attrs.length.clone() else {
            return Ok(false);
        };
        let Some(limit) = self.demand_bind(id, &bind)? else {
            return Ok(false);
        };
        let limit = limit.to_count().ok_or(BinformError::TypeMismatch {
            expected: "length",
            found: "non-integer",
        })?;
        self.input.push_bound(limit)?;
        Ok(true)
    }

    fn read_string_bytes(
        &mut self,
        encoding: Encoding,
        bounded: bool,
        item_ctx: Option<ItemCtx>,
    ) -> Result<Vec<u8>> {
        let sized = bounded
            || match item_ctx {
                Some(ic) => ic.bounded,
                None => self.input.remaining().is_some(),
            };
        if sized {
            self.input.read_to_limit()
        } else {
            self.input.read_terminated(encoding.terminator_width())
        }
    }

    fn read_scalar(
        &mut self,
        id: NodeId,
        ty: &TypeNode,
        endian: Endian,
        encoding: Encoding,
        bounded: bool,
        item_ctx: Option<ItemCtx>,
    ) -> Result<()> {
        // String-mode enums travel as spelled literals.
        if let NodeKind::Enum { spec } = &ty.kind {
            if spec.is_string_mode() {
                let bytes = self.read_string_bytes(encoding, bounded, item_ctx)?;
                let spelled = decode_str_trimmed(&bytes, encoding)?;
                let literal = spec
                    .literals
                    .iter()
                    .find(|l| l.serialize_as.as_deref() == Some(spelled.as_str()))
                    .ok_or_else(|| BinformError::UnknownEnumLiteral {
                        value: format!("{spelled:?}"),
                    })?;
                self.graph.node_mut(id).slot = Some(Value::Str(literal.name.clone()));
                return Ok(());
            }
        }

        let width = ty.fixed_wire_width().ok_or(BinformError::TypeMismatch {
            expected: "scalar",
            found: "unsized",
        })?;

        // Nullable primitives are absent when the enclosing window leaves no
        // room for them.
        if matches!(ty.kind, NodeKind::NullablePrim { .. }) {
            match self.input.remaining() {
                Some(rem) if rem < width as u64 => {
                    self.graph.node_mut(id).slot = Some(Value::Null);
                    return Ok(());
                }
                None => {
                    match self.input.read_chunk_opt(width)? {
                        Some(bytes) => {
                            let value = decode_wire(ty, &bytes, endian)?;
                            self.graph.node_mut(id).slot = Some(value);
                        }
                        None => {
                            self.graph.node_mut(id).slot = Some(Value::Null);
                        }
                    }
                    return Ok(());
                }
                Some(_) => {}
            }
        }

        let bytes = self.input.read_exact(width)?;
        let value = decode_wire(ty, &bytes, endian)?;
        self.graph.node_mut(id).slot = Some(value);
        Ok(())
    }

    fn read_prim_array(
        &mut self,
        id: NodeId,
        ty: &TypeNode,
        prim: Prim,
        endian: Endian,
    ) -> Result<()> {
        let width = prim.width();
        let mut out = Vec::new();
        match collection::select(&ty.attrs) {
            Termination::Count(bind) => {
                if let Some(count) = self.demand_bind(id, &bind)?.and_then(|v| v.to_count()) {
                    for _ in 0..count {
                        let bytes = self.input.read_exact(width)?;
                        out.push(self.decode_element(ty, prim, &bytes, endian)?);
                    }
                } else {
                    self.read_prim_elements_to_exhaustion(ty, prim, endian, &mut out)?;
                }
            }
            Termination::Until(sentinel) => loop {
                if self.input.remaining() == Some(0) {
                    break;
                }
                let bytes = self.input.read_exact(width)?;
                let value = decode_prim(prim, &bytes, endian)?;
                if value.loosely_eq(&sentinel) {
                    break;
                }
                out.push(self.rescale_element(ty, value));
            },
            // A `FieldLength` window was already pushed by the caller;
            // anything else degrades to exhaustion of the bound.
            _ => self.read_prim_elements_to_exhaustion(ty, prim, endian, &mut out)?,
        }
        self.graph.node_mut(id).slot = Some(Value::List(out));
        Ok(())
    }

    fn read_prim_elements_to_exhaustion(
        &mut self,
        ty: &TypeNode,
        prim: Prim,
        endian: Endian,
        out: &mut Vec<Value>,
    ) -> Result<()> {
        let width = prim.width();
        loop {
            if let Some(rem) = self.input.remaining() {
                if rem < width as u64 {
                    return Ok(());
                }
            }
            match self.input.read_chunk_opt(width)? {
                Some(bytes) => out.push(self.decode_element(ty, prim, &bytes, endian)?),
                None => return Ok(()),
            }
        }
    }

    fn decode_element(
        &self,
        ty: &TypeNode,
        prim: Prim,
        bytes: &[u8],
        endian: Endian,
    ) -> Result<Value> {
        let value = decode_prim(prim, bytes, endian)?;
        Ok(self.rescale_element(ty, value))
    }

    fn rescale_element(&self, ty: &TypeNode, value: Value) -> Value {
        match ty.attrs.scale {
            Some(scale) => unapply_scale(scale, &value),
            None => value,
        }
    }

    fn read_collection(
        &mut self,
        id: NodeId,
        ty: &TypeNode,
        item_ty: &Arc<TypeNode>,
        inherit: Inherit,
    ) -> Result<()> {
        let windows = self.item_windows(id, ty)?;
        let mut index = 0usize;

        match collection::select(&ty.attrs) {
            Termination::Count(bind) => {
                if let Some(count) = self.demand_bind(id, &bind)?.and_then(|v| v.to_count()) {
                    for _ in 0..count {
                        self.read_item(id, item_ty, &windows, index, inherit)?;
                        index += 1;
                    }
                } else {
                    self.read_items_to_exhaustion(id, item_ty, &windows, &mut index, inherit)?;
                }
            }
            Termination::ItemUntil(spec) => loop {
                if self.input.remaining() == Some(0) {
                    break;
                }
                let mark = match spec.mode {
                    LastItemMode::Defer => Some(self.input.mark()?),
                    _ => None,
                };
                let item = self.read_item(id, item_ty, &windows, index, inherit)?;
                index += 1;
                let probe = resolve::resolve_path(&self.graph, self.schema, item, &spec.path)
                    .ok()
                    .and_then(|nid| self.graph.node(nid).slot.clone());
                let matched = probe.map_or(false, |v| v.loosely_eq(&spec.value));
                if matched {
                    match spec.mode {
                        LastItemMode::Include => {}
                        LastItemMode::Exclude => self.drop_last_item(id),
                        LastItemMode::Defer => {
                            if let Some(at) = mark {
                                self.input.rewind_to(at)?;
                            }
                            self.drop_last_item(id);
                        }
                    }
                    break;
                }
            },
            Termination::Until(sentinel) => {
                let prim = item_ty.wire_prim().unwrap_or(Prim::U8);
                let width = prim.width();
                loop {
                    if self.input.remaining() == Some(0) {
                        break;
                    }
                    let mark = self.input.mark()?;
                    let bytes = self.input.read_exact(width)?;
                    let value = decode_prim(prim, &bytes, self.graph.node(id).endian.unwrap_or(inherit.endian))?;
                    if value.loosely_eq(&sentinel) {
                        break;
                    }
                    self.input.rewind_to(mark)?;
                    self.read_item(id, item_ty, &windows, index, inherit)?;
                    index += 1;
                }
            }
            // `FieldLength` pushed a window already; bare collections run to
            // exhaustion of the bound or the stream.
            _ => self.read_items_to_exhaustion(id, item_ty, &windows, &mut index, inherit)?,
        }

        let items: Vec<Value> = self
            .graph
            .node(id)
            .children
            .clone()
            .into_iter()
            .map(|cid| self.graph.node(cid).slot.clone().unwrap_or(Value::Null))
            .collect();
        self.graph.node_mut(id).slot = Some(Value::List(items));
        Ok(())
    }

    fn read_items_to_exhaustion(
        &mut self,
        id: NodeId,
        item_ty: &Arc<TypeNode>,
        windows: &ItemWindows,
        index: &mut usize,
        inherit: Inherit,
    ) -> Result<()> {
        loop {
            match self.input.remaining() {
                Some(0) => return Ok(()),
                Some(_) => {
                    let before = self.input.position();
                    self.read_item(id, item_ty, windows, *index, inherit)?;
                    *index += 1;
                    if self.input.position() == before {
                        return Err(BinformError::Underflow {
                            needed: 1,
                            available: 0,
                        });
                    }
                }
                None => {
                    // Unbounded exhaustion needs a one-octet lookahead to
                    // detect the end of the stream.
                    let mark = self.input.mark().map_err(|_| BinformError::NotSeekable {
                        operation: "unbounded collection",
                    })?;
                    match self.input.read_chunk_opt(1)? {
                        None => return Ok(()),
                        Some(_) => self.input.rewind_to(mark)?,
                    }
                    self.read_item(id, item_ty, windows, *index, inherit)?;
                    *index += 1;
                }
            }
        }
    }

    fn read_item(
        &mut self,
        id: NodeId,
        item_ty: &Arc<TypeNode>,
        windows: &ItemWindows,
        index: usize,
        inherit: Inherit,
    ) -> Result<NodeId> {
        let window = match windows {
            ItemWindows::None => None,
            ItemWindows::Uniform(limit) => Some(*limit),
            ItemWindows::Jagged(limits) => Some(*limits.get(index).ok_or(
                BinformError::ItemLengthMismatch {
                    expected: limits.len(),
                    actual: index + 1,
                },
            )?),
        };
        let name = Arc::clone(&item_ty.name);
        let cid = self
            .graph
            .add_node(Arc::clone(item_ty), name, Some(id), Some(index));
        match window {
            Some(limit) => {
                self.input.push_bound(limit)?;
                self.read(cid, inherit, Some(ItemCtx { bounded: true }))?;
                self.input.pop_bound()?;
            }
            None => self.read(cid, inherit, Some(ItemCtx { bounded: false }))?,
        }
        Ok(cid)
    }

    fn drop_last_item(&mut self, id: NodeId) {
        self.graph.node_mut(id).children.pop();
    }

    fn item_windows(&mut self, id: NodeId, ty: &TypeNode) -> Result<ItemWindows> {
        let Some(bind) = ty.attrs.item_length.clone() else {
            return Ok(ItemWindows::None);
        };
        let Some(value) = self.demand_bind(id, &bind)? else {
            return Ok(ItemWindows::None);
        };
        match value {
            Value::List(lengths) => {
                let mut limits = Vec::with_capacity(lengths.len());
                for len in &lengths {
                    limits.push(len.to_count().ok_or(BinformError::TypeMismatch {
                        expected: "item length",
                        found: "non-integer",
                    })?);
                }
                Ok(ItemWindows::Jagged(limits))
            }
            scalar => {
                let limit = scalar.to_count().ok_or(BinformError::TypeMismatch {
                    expected: "item length",
                    found: "non-integer",
                })?;
                Ok(ItemWindows::Uniform(limit))
            }
        }
    }

    fn read_object(&mut self, id: NodeId, ty: &TypeNode, inherit: Inherit) -> Result<()> {
        let mut effective = Arc::clone(&self.graph.node(id).ty);
        if let Some(table) = &ty.subtypes {
            let key = self.demand_source(id, &table.key)?;
            let dispatch = subtype::dispatch_read(table, self.schema, &key)?;
            effective = Arc::clone(dispatch.node());
            self.graph.node_mut(id).actual = Some(Arc::clone(&effective));
        }

        // Members are materialized up front so binding paths can resolve
        // structurally before their targets are read.
        let child_ids: Vec<NodeId> = effective
            .children
            .iter()
            .map(|cty| {
                let name = Arc::clone(&cty.name);
                self.graph.add_node(Arc::clone(cty), name, Some(id), None)
            })
            .collect();
        for cid in child_ids {
            self.read(cid, inherit, None)?;
        }

        let type_id = match &effective.kind {
            NodeKind::Object { type_id } => type_id.clone(),
            _ => {
                return Err(BinformError::TypeMismatch {
                    expected: "record",
                    found: "non-object shape",
                })
            }
        };
        let ctor = effective.ctor.clone().unwrap_or_default();
        let fields: Vec<(String, Value)> = self
            .graph
            .node(id)
            .children
            .clone()
            .into_iter()
            .map(|cid| {
                let child = self.graph.node(cid);
                (
                    child.name.to_string(),
                    child.slot.clone().unwrap_or(Value::Null),
                )
            })
            .collect();
        let record = ctor.construct(type_id, fields);
        self.graph.node_mut(id).slot = Some(Value::Record(record));
        Ok(())
    }

    /// Re-interprets deferred fields whose endianness source has resolved,
    /// cascading until a fixed point.
    fn try_resolve_pending(&mut self) -> Result<()> {
        loop {
            let mut progress = false;
            let mut still = Vec::new();
            for id in std::mem::take(&mut self.pending) {
                let ty = Arc::clone(&self.graph.node(id).ty);
                let Some(EndianSpec::Bound(bp)) = ty.attrs.endian.clone() else {
                    continue;
                };
                match read_source(&self.graph, self.schema, id, &bp)? {
                    Resolved::Value(v) => {
                        let endian = endian_from_value(&v)?;
                        let raw = self.graph.node_mut(id).deferred.take().unwrap_or_default();
                        let value = decode_wire(&ty, &raw, endian)?;
                        let node = self.graph.node_mut(id);
                        node.slot = Some(value);
                        node.endian = Some(endian);
                        self.refresh_ancestors(id);
                        progress = true;
                    }
                    Resolved::Unresolved { .. } => still.push(id),
                }
            }
            self.pending = still;
            if !progress || self.pending.is_empty() {
                return Ok(());
            }
        }
    }

    /// Propagates a late-resolved slot into already-constructed ancestor
    /// records and lists.
    fn refresh_ancestors(&mut self, id: NodeId) {
        let mut child = id;
        while let Some(parent) = self.graph.node(child).parent {
            let name = self.graph.node(child).name.to_string();
            let index = self.graph.node(child).index;
            let Some(value) = self.graph.node(child).slot.clone() else {
                return;
            };
            match &mut self.graph.node_mut(parent).slot {
                Some(Value::Record(rec)) => rec.set(name, value),
                Some(Value::List(items)) => {
                    if let Some(i) = index {
                        if i < items.len() {
                            items[i] = value;
                        }
                    }
                }
                // The parent has not been constructed yet; it will pick the
                // slot up at construction time.
                _ => return,
            }
            child = parent;
        }
    }

    fn publish(&self, id: NodeId, before: bool, f: impl Fn(&dyn WalkObserver, &MemberEvent)) {
        if self.observers.is_empty() || self.graph.node(id).parent.is_none() {
            return;
        }
        let node = self.graph.node(id);
        let event = MemberEvent {
            name: node.name.to_string(),
            offset: self.input.position(),
            depth: self.graph.self_and_ancestors(id).count() - 1,
            value: if before { None } else { node.slot.clone() },
        };
        for obs in self.observers {
            f(obs.as_ref(), &event);
        }
    }
}

enum EndianOutcome {
    Known(Endian),
    Deferred,
}

enum ItemWindows {
    None,
    Uniform(u64),
    Jagged(Vec<u64>),
}

/// Decodes a scalar's wire octets into its declared value domain: raw
/// primitive, then inverse scaling, then enum literal mapping, then
/// coercion to the declared kind.
fn decode_wire(ty: &TypeNode, bytes: &[u8], endian: Endian) -> Result<Value> {
    let prim = ty.wire_prim().ok_or(BinformError::TypeMismatch {
        expected: "scalar",
        found: "unsized",
    })?;
    let raw = decode_prim(prim, bytes, endian)?;

    if let NodeKind::Enum { spec } = &ty.kind {
        let value = match ty.attrs.scale {
            Some(scale) => unapply_scale(scale, &raw),
            None => raw,
        };
        let numeric = value.as_i64().ok_or(BinformError::TypeMismatch {
            expected: "enum ordinal",
            found: value.kind_name(),
        })?;
        let literal = spec
            .literals
            .iter()
            .find(|l| l.value == numeric)
            .ok_or_else(|| BinformError::UnknownEnumLiteral {
                value: numeric.to_string(),
            })?;
        return Ok(Value::Str(literal.name.clone()));
    }

    // Coerce into the declared domain first so inverse scaling happens in
    // float space for float members carried on integer wires.
    let value = coerce_declared(ty, raw);
    Ok(match ty.attrs.scale {
        Some(scale) => unapply_scale(scale, &value),
        None => value,
    })
}

/// Coerces a decoded wire value into the node's declared domain, so a field
/// re-represented by `SerializeAs` comes back in its natural variant.
fn coerce_declared(ty: &TypeNode, value: Value) -> Value {
    let declared = match &ty.kind {
        NodeKind::Value { prim } | NodeKind::NullablePrim { prim } => *prim,
        NodeKind::Str => {
            return match value {
                Value::Int(v) => Value::Str(v.to_string()),
                Value::UInt(v) => Value::Str(v.to_string()),
                Value::Float(v) => Value::Str(v.to_string()),
                other => other,
            }
        }
        _ => return value,
    };
    if declared.is_float() {
        return value.as_f64().map(Value::Float).unwrap_or(value);
    }
    if declared.is_signed() {
        return value.as_i64().map(Value::Int).unwrap_or(value);
    }
    if declared == Prim::Bool {
        return match value {
            Value::Bool(_) => value,
            other => other.as_u64().map(|v| Value::Bool(v != 0)).unwrap_or(other),
        };
    }
    value.as_u64().map(Value::UInt).unwrap_or(value)
}
