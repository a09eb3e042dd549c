//! The type-graph builder.
//!
//! Walks a registered [`TypeDesc`], resolves base-class member chains,
//! classifies members into [`NodeKind`]s, normalizes attributes, selects a
//! constructor, and assembles the immutable [`TypeNode`] tree. Type roots
//! built during one pass are handed back to the schema for publication in
//! the shared cache.

use super::node::{
    AttrSet, Binding, BindingKind, Ctor, NodeKind, SubtypeEntry, SubtypeTable, TypeNode,
};
use super::Schema;
use crate::desc::{
    Attr, Bind, BindDirection, BindPath, CtorDesc, EndianSpec, FieldType, MemberDesc, PathSpec,
    SubtypeEntryDesc, TypeDesc,
};
use crate::error::{BinformError, Result};
use crate::value::TypeId;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Subtype-related attributes gathered during normalization.
#[derive(Debug, Default)]
struct SubtypeParts {
    key: Option<BindPath>,
    entries: Vec<SubtypeEntryDesc>,
    default: Option<TypeId>,
    factory: Option<String>,
}

impl SubtypeParts {
    fn is_empty(&self) -> bool {
        self.key.is_none()
            && self.entries.is_empty()
            && self.default.is_none()
            && self.factory.is_none()
    }
}

pub(super) struct GraphBuilder<'s> {
    schema: &'s Schema,
    built: HashMap<TypeId, Arc<TypeNode>>,
    in_progress: Vec<TypeId>,
}

impl<'s> GraphBuilder<'s> {
    pub(super) fn new(schema: &'s Schema, seed: HashMap<TypeId, Arc<TypeNode>>) -> Self {
        Self {
            schema,
            built: seed,
            in_progress: Vec::new(),
        }
    }

    pub(super) fn into_built(self) -> HashMap<TypeId, Arc<TypeNode>> {
        self.built
    }

    /// Builds (or returns the memoized) type root for `tid`.
    pub(super) fn build(&mut self, tid: &TypeId) -> Result<Arc<TypeNode>> {
        if let Some(node) = self.built.get(tid) {
            return Ok(Arc::clone(node));
        }
        if self.in_progress.contains(tid) {
            return Err(BinformError::CyclicType {
                type_id: tid.to_string(),
            });
        }
        self.in_progress.push(tid.clone());
        let result = self.build_fresh(tid);
        self.in_progress.pop();
        let node = result?;
        self.built.insert(tid.clone(), Arc::clone(&node));
        Ok(node)
    }

    fn build_fresh(&mut self, tid: &TypeId) -> Result<Arc<TypeNode>> {
        let chain = self.ancestry(tid)?;
        trace!(type_id = %tid, depth = chain.len(), "building type graph");

        let mut children = Vec::new();
        for desc in &chain {
            let group = ordered_group(desc)?;
            for member in group {
                if member.attrs.iter().any(|a| matches!(a, Attr::Ignore)) {
                    continue;
                }
                children.push(self.build_member(member)?);
            }
        }

        let field_names: Vec<String> = children.iter().map(|c| c.name.to_string()).collect();
        let own_ctors: &[CtorDesc] = chain.last().map(|d| d.ctors.as_slice()).unwrap_or(&[]);
        let ctor = select_ctor(own_ctors, &field_names, tid)?;

        Ok(Arc::new(TypeNode {
            name: Arc::from(tid.as_str()),
            kind: NodeKind::Object {
                type_id: tid.clone(),
            },
            attrs: AttrSet::default(),
            bindings: Vec::new(),
            children,
            subtypes: None,
            ctor: Some(ctor),
        }))
    }

    /// Collects the base-class chain, root-most ancestor first.
    fn ancestry(&self, tid: &TypeId) -> Result<Vec<TypeDesc>> {
        let mut chain = Vec::new();
        let mut seen = Vec::new();
        let mut cursor = Some(tid.clone());
        while let Some(id) = cursor {
            if seen.contains(&id) {
                return Err(BinformError::CyclicType {
                    type_id: id.to_string(),
                });
            }
            let desc = self
                .schema
                .desc(&id)
                .ok_or_else(|| BinformError::UnknownType {
                    type_id: id.to_string(),
                })?;
            cursor = desc.base.clone();
            seen.push(id);
            chain.push(desc.clone());
        }
        chain.reverse();
        Ok(chain)
    }

    fn build_member(&mut self, member: &MemberDesc) -> Result<Arc<TypeNode>> {
        let (attrs, bindings, subtype, item_subtype) = normalize(&member.attrs)?;
        let name: Arc<str> = Arc::from(member.name.as_str());
        self.build_shape(name, &member.field_type, attrs, bindings, subtype, item_subtype)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_shape(
        &mut self,
        name: Arc<str>,
        field_type: &FieldType,
        attrs: AttrSet,
        bindings: Vec<Binding>,
        subtype: SubtypeParts,
        item_subtype: SubtypeParts,
    ) -> Result<Arc<TypeNode>> {
        let subtypes = self.build_subtype_table(&name, subtype)?;
        let node = match field_type {
            FieldType::Prim(prim) => TypeNode {
                name,
                kind: NodeKind::Value { prim: *prim },
                attrs,
                bindings,
                children: Vec::new(),
                subtypes,
                ctor: None,
            },
            FieldType::Str => TypeNode {
                name,
                kind: NodeKind::Str,
                attrs,
                bindings,
                children: Vec::new(),
                subtypes,
                ctor: None,
            },
            FieldType::Enum(spec) => TypeNode {
                name,
                kind: NodeKind::Enum { spec: spec.clone() },
                attrs,
                bindings,
                children: Vec::new(),
                subtypes,
                ctor: None,
            },
            FieldType::Bytes => TypeNode {
                name,
                kind: NodeKind::Bytes,
                attrs,
                bindings,
                children: Vec::new(),
                subtypes,
                ctor: None,
            },
            FieldType::Stream => TypeNode {
                name,
                kind: NodeKind::Stream,
                attrs,
                bindings,
                children: Vec::new(),
                subtypes,
                ctor: None,
            },
            FieldType::Custom(codec) => TypeNode {
                name,
                kind: NodeKind::Custom {
                    codec: codec.clone(),
                },
                attrs,
                bindings,
                children: Vec::new(),
                subtypes,
                ctor: None,
            },
            FieldType::Nullable(inner) => match inner.as_ref() {
                FieldType::Prim(prim) => TypeNode {
                    name,
                    kind: NodeKind::NullablePrim { prim: *prim },
                    attrs,
                    bindings,
                    children: Vec::new(),
                    subtypes,
                    ctor: None,
                },
                other => {
                    return Err(BinformError::TypeMismatch {
                        expected: "nullable primitive",
                        found: type_kind_name(other),
                    })
                }
            },
            FieldType::Record(tid) => {
                let shape = self.build(tid)?;
                TypeNode {
                    name,
                    kind: NodeKind::Object {
                        type_id: tid.clone(),
                    },
                    attrs,
                    bindings,
                    children: shape.children.clone(),
                    subtypes,
                    ctor: shape.ctor.clone(),
                }
            }
            FieldType::List(item_ft) => {
                let bulk = matches!(item_ft.as_ref(), FieldType::Prim(_))
                    && attrs.item_length.is_none()
                    && attrs.item_until.is_none()
                    && item_subtype.is_empty();
                if bulk {
                    let prim = match item_ft.as_ref() {
                        FieldType::Prim(p) => *p,
                        // Guarded by the `bulk` predicate above.
                        _ => {
                            return Err(BinformError::TypeMismatch {
                                expected: "primitive item",
                                found: type_kind_name(item_ft),
                            })
                        }
                    };
                    TypeNode {
                        name,
                        kind: NodeKind::PrimArray { prim },
                        attrs,
                        bindings,
                        children: Vec::new(),
                        subtypes,
                        ctor: None,
                    }
                } else {
                    let item = self.build_shape(
                        Arc::from("item"),
                        item_ft,
                        AttrSet::default(),
                        Vec::new(),
                        item_subtype,
                        SubtypeParts::default(),
                    )?;
                    TypeNode {
                        name,
                        kind: NodeKind::Collection { item },
                        attrs,
                        bindings,
                        children: Vec::new(),
                        subtypes,
                        ctor: None,
                    }
                }
            }
        };
        Ok(Arc::new(node))
    }

    fn build_subtype_table(
        &mut self,
        member: &str,
        parts: SubtypeParts,
    ) -> Result<Option<SubtypeTable>> {
        if parts.is_empty() {
            return Ok(None);
        }
        let key = parts.key.ok_or_else(|| BinformError::BindingPathInvalid {
            path: member.to_owned(),
            reason: "subtype entries declared without a SubtypeKey binding".into(),
        })?;

        let mut entries = Vec::with_capacity(parts.entries.len());
        for desc in &parts.entries {
            let node = self.build(&desc.type_id)?;
            entries.push(SubtypeEntry {
                key: desc.key.clone(),
                type_id: desc.type_id.clone(),
                node,
                direction: desc.direction,
            });
        }

        // At most one readable mapping per key.
        for (i, a) in entries.iter().enumerate() {
            if a.direction == BindDirection::WriteOnly {
                continue;
            }
            for b in entries.iter().skip(i + 1) {
                if b.direction != BindDirection::WriteOnly && a.key == b.key {
                    return Err(BinformError::SubtypeKeyAmbiguous {
                        type_id: member.to_owned(),
                        key: format!("{:?}", a.key),
                    });
                }
            }
        }

        let default = match &parts.default {
            Some(tid) => Some(self.build(tid)?),
            None => None,
        };

        Ok(Some(SubtypeTable {
            key,
            entries,
            factory: parts.factory,
            default,
        }))
    }
}

fn type_kind_name(ft: &FieldType) -> &'static str {
    match ft {
        FieldType::Prim(_) => "primitive",
        FieldType::Str => "string",
        FieldType::Enum(_) => "enum",
        FieldType::Bytes => "bytes",
        FieldType::Record(_) => "record",
        FieldType::List(_) => "list",
        FieldType::Nullable(_) => "nullable",
        FieldType::Custom(_) => "custom",
        FieldType::Stream => "stream",
    }
}

/// Orders one type's own (non-inherited) members by field-order.
///
/// A single member may omit its order; with two or more members, at most one
/// may (it defaults to zero, and collisions with an explicit zero surface as
/// `DuplicateOrder`).
fn ordered_group(desc: &TypeDesc) -> Result<Vec<&MemberDesc>> {
    let mut missing = 0usize;
    let mut keyed: Vec<(i32, &MemberDesc)> = Vec::with_capacity(desc.members.len());
    for member in &desc.members {
        let order = member.attrs.iter().find_map(|a| match a {
            Attr::FieldOrder(o) => Some(*o),
            _ => None,
        });
        if order.is_none() {
            missing += 1;
        }
        keyed.push((order.unwrap_or(0), member));
    }
    if desc.members.len() > 1 && missing > 1 {
        return Err(BinformError::MissingOrder {
            type_id: desc.type_id.to_string(),
        });
    }
    for (i, (order, _)) in keyed.iter().enumerate() {
        if keyed.iter().skip(i + 1).any(|(o, _)| o == order) {
            return Err(BinformError::DuplicateOrder {
                type_id: desc.type_id.to_string(),
                order: *order,
            });
        }
    }
    keyed.sort_by_key(|(order, _)| *order);
    Ok(keyed.into_iter().map(|(_, m)| m).collect())
}

/// Picks the constructor whose parameter names best fit the readable fields:
/// greatest match count first, fewest non-matching parameters on ties. A
/// winner with non-matching parameters does not accept the fields; the
/// default constructor is used if one exists, otherwise construction is
/// unresolvable.
fn select_ctor(ctors: &[CtorDesc], field_names: &[String], tid: &TypeId) -> Result<Ctor> {
    if ctors.is_empty() {
        return Ok(Ctor::default());
    }
    let mut best: Option<(usize, usize, &CtorDesc)> = None;
    for ctor in ctors {
        let matches = ctor
            .params
            .iter()
            .filter(|p| field_names.contains(p))
            .count();
        let stray = ctor.params.len() - matches;
        let better = match &best {
            None => true,
            Some((m, s, _)) => matches > *m || (matches == *m && stray < *s),
        };
        if better {
            best = Some((matches, stray, ctor));
        }
    }
    match best {
        Some((_, 0, ctor)) => Ok(Ctor {
            params: ctor.params.clone(),
        }),
        _ if ctors.iter().any(|c| c.params.is_empty()) => Ok(Ctor::default()),
        _ => Err(BinformError::UnresolvedConstructor {
            type_id: tid.to_string(),
        }),
    }
}

fn check_path(path: &PathSpec) -> Result<()> {
    if path.segments.is_empty() || path.segments.iter().any(String::is_empty) {
        return Err(BinformError::BindingPathInvalid {
            path: path.to_string(),
            reason: "empty path segment".into(),
        });
    }
    Ok(())
}

fn check_bind(bind: &Bind) -> Result<()> {
    if let Bind::Path(bp) = bind {
        check_path(&bp.path)?;
    }
    Ok(())
}

fn record_bind(bindings: &mut Vec<Binding>, kind: BindingKind, bind: &Bind) {
    if let Bind::Path(bp) = bind {
        bindings.push(Binding {
            kind,
            path: bp.path.clone(),
            direction: bp.direction,
        });
    }
}

type Normalized = (AttrSet, Vec<Binding>, SubtypeParts, SubtypeParts);

/// Folds raw attribute annotations into an effective [`AttrSet`], the binding
/// list, and the member/item subtype parts, validating paths as it goes.
fn normalize(attrs: &[Attr]) -> Result<Normalized> {
    let mut set = AttrSet::default();
    let mut bindings = Vec::new();
    let mut subtype = SubtypeParts::default();
    let mut item_subtype = SubtypeParts::default();

    for attr in attrs {
        match attr {
            Attr::Ignore => set.ignore = true,
            Attr::FieldOrder(o) => set.order = Some(*o),
            Attr::FieldLength(bind) => {
                check_bind(bind)?;
                record_bind(&mut bindings, BindingKind::Length, bind);
                set.length = Some(bind.clone());
            }
            Attr::FieldCount(bind) => {
                check_bind(bind)?;
                record_bind(&mut bindings, BindingKind::Count, bind);
                set.count = Some(bind.clone());
            }
            Attr::FieldAlignment { multiple, mode } => set.align = Some((*multiple, *mode)),
            Attr::FieldScale(scale) => {
                if scale.den == 0 {
                    return Err(BinformError::ValueOutOfRange {
                        prim: "scale denominator",
                        value: "0".into(),
                    });
                }
                set.scale = Some(*scale);
            }
            Attr::FieldEndianness(spec) => {
                if let EndianSpec::Bound(bp) = spec {
                    check_path(&bp.path)?;
                    bindings.push(Binding {
                        kind: BindingKind::Endian,
                        path: bp.path.clone(),
                        direction: bp.direction,
                    });
                }
                set.endian = Some(spec.clone());
            }
            Attr::FieldEncoding(enc) => set.encoding = Some(*enc),
            Attr::FieldOffset(bind) => {
                check_bind(bind)?;
                record_bind(&mut bindings, BindingKind::Offset, bind);
                set.offset = Some(bind.clone());
            }
            Attr::FieldValue(spec) => {
                check_path(&spec.target)?;
                bindings.push(Binding {
                    kind: BindingKind::Computed,
                    path: spec.target.clone(),
                    direction: BindDirection::WriteOnly,
                });
                set.computed.push(spec.clone());
            }
            Attr::SubtypeKey(bp) => {
                check_path(&bp.path)?;
                bindings.push(Binding {
                    kind: BindingKind::SubtypeKey,
                    path: bp.path.clone(),
                    direction: bp.direction,
                });
                subtype.key = Some(bp.clone());
            }
            Attr::Subtype(entry) => subtype.entries.push(entry.clone()),
            Attr::SubtypeDefault(tid) => subtype.default = Some(tid.clone()),
            Attr::SubtypeFactory(name) => subtype.factory = Some(name.clone()),
            Attr::SerializeAs(spec) => set.serialize_as = Some(*spec),
            Attr::SerializeWhen(when) => {
                check_path(&when.source.path)?;
                bindings.push(Binding {
                    kind: BindingKind::When,
                    path: when.source.path.clone(),
                    direction: when.source.direction,
                });
                set.when.push(when.clone());
            }
            Attr::SerializeUntil(value) => set.until = Some(value.clone()),
            Attr::ItemLength(bind) => {
                check_bind(bind)?;
                record_bind(&mut bindings, BindingKind::ItemLength, bind);
                set.item_length = Some(bind.clone());
            }
            Attr::ItemSerializeUntil(spec) => {
                check_path(&spec.path)?;
                set.item_until = Some(spec.clone());
            }
            Attr::ItemSubtypeKey(bp) => {
                check_path(&bp.path)?;
                item_subtype.key = Some(bp.clone());
            }
            Attr::ItemSubtype(entry) => item_subtype.entries.push(entry.clone()),
            Attr::ItemSubtypeDefault(tid) => item_subtype.default = Some(tid.clone()),
            Attr::ItemSubtypeFactory(name) => item_subtype.factory = Some(name.clone()),
        }
    }

    Ok((set, bindings, subtype, item_subtype))
}
