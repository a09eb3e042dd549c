//! Tools for inspecting built type graphs.
//! Useful for debugging descriptor layouts and binding wiring.

use crate::error::Result;
use crate::schema::{NodeKind, Schema, TypeNode};
use crate::value::TypeId;
use serde::Serialize;

/// A structural report of one type graph.
#[derive(Debug, Serialize)]
pub struct GraphReport {
    /// The inspected type.
    pub type_id: String,
    /// Total nodes in the tree (shared subtrees counted once per position).
    pub node_count: usize,
    /// Maximum nesting depth.
    pub max_depth: usize,
    /// The hierarchical node tree.
    pub tree: NodeInfo,
}

/// Metadata for a single node in the graph.
#[derive(Debug, Serialize)]
pub struct NodeInfo {
    /// Member (or type) name.
    pub name: String,
    /// Structural kind, rendered.
    pub kind: String,
    /// Number of declared bindings.
    pub binding_count: usize,
    /// Subtype entry count, when the node is polymorphic.
    pub subtype_entries: Option<usize>,
    /// Child nodes.
    pub children: Vec<NodeInfo>,
}

/// The type-graph inspector tool.
#[derive(Debug)]
pub struct GraphInspector;

impl GraphInspector {
    /// Builds (or fetches) the graph for `type_id` and reports its shape.
    pub fn inspect(schema: &Schema, type_id: &TypeId) -> Result<GraphReport> {
        let root = schema.graph(type_id)?;
        let tree = Self::inspect_node(&root);
        let (node_count, max_depth) = Self::measure(&tree, 1);
        Ok(GraphReport {
            type_id: type_id.to_string(),
            node_count,
            max_depth,
            tree,
        })
    }

    fn inspect_node(node: &TypeNode) -> NodeInfo {
        let kind = match &node.kind {
            NodeKind::Object { type_id } => format!("object<{type_id}>"),
            NodeKind::Value { prim } => format!("value<{}>", prim.name()),
            NodeKind::Enum { spec } => format!("enum<{}>", spec.underlying.name()),
            NodeKind::Str => "string".to_string(),
            NodeKind::Bytes => "bytes".to_string(),
            NodeKind::PrimArray { prim } => format!("array<{}>", prim.name()),
            NodeKind::Collection { .. } => "collection".to_string(),
            NodeKind::NullablePrim { prim } => format!("nullable<{}>", prim.name()),
            NodeKind::Custom { codec } => format!("custom<{codec}>"),
            NodeKind::Stream => "stream".to_string(),
        };

        let mut children: Vec<NodeInfo> = node.children.iter().map(|c| Self::inspect_node(c)).collect();
        if let NodeKind::Collection { item } = &node.kind {
            children.push(Self::inspect_node(item));
        }

        NodeInfo {
            name: node.name.to_string(),
            kind,
            binding_count: node.bindings.len(),
            subtype_entries: node.subtypes.as_ref().map(|t| t.entries.len()),
            children,
        }
    }

    fn measure(info: &NodeInfo, depth: usize) -> (usize, usize) {
        let mut count = 1;
        let mut max = depth;
        for child in &info.children {
            let (c, d) = Self::measure(child, depth + 1);
            count += c;
            max = max.max(d);
        }
        (count, max)
    }
}
