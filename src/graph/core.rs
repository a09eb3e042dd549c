use super::id::NodeId;
use crate::codec::{Encoding, Endian, Prim};
use crate::schema::TypeNode;
use crate::value::Value;
use std::sync::Arc;

/// How a scalar was actually laid out on the wire; recorded at emission so
/// write-back can patch the same octets with the same representation.
#[derive(Debug, Clone, Copy)]
pub struct WireFmt {
    /// The primitive that was emitted.
    pub prim: Prim,
    /// The byte order that was used.
    pub endian: Endian,
}

/// A single node in the value graph.
///
/// # Lifecycle
/// 1. **Created:** when the walk enters (or mirrors) the position.
/// 2. **Bound:** `slot` holds the live value (immediately on serialize, after
///    decoding on deserialize).
/// 3. **Observed:** `offset`/`length` record where the node landed in the
///    stream, enabling write-back and breadcrumbs.
#[derive(Debug)]
pub struct ValueNode {
    /// The unique ID of this node.
    pub id: NodeId,

    /// The parent node. `None` for the root.
    pub parent: Option<NodeId>,

    /// The type-graph position this node mirrors.
    pub ty: Arc<TypeNode>,

    /// The dispatched subtype shape, when polymorphic dispatch replaced the
    /// declared one.
    pub actual: Option<Arc<TypeNode>>,

    /// Instance name: the member name, or the item name inside collections.
    pub name: Arc<str>,

    /// Item index when this node is a collection element.
    pub index: Option<usize>,

    /// Children, in visit order.
    pub children: Vec<NodeId>,

    /// The live in-memory value slot.
    pub slot: Option<Value>,

    /// Most recently observed absolute byte offset.
    pub offset: Option<u64>,

    /// Most recently observed serialized length.
    pub length: Option<u64>,

    /// Scalar wire layout recorded at emission.
    pub wire: Option<WireFmt>,

    /// Raw octets retained for deferred re-interpretation (forward-referenced
    /// endianness).
    pub deferred: Option<Vec<u8>>,

    /// Resolved endianness cache.
    pub endian: Option<Endian>,

    /// Resolved encoding cache.
    pub encoding: Option<Encoding>,
}

impl ValueNode {
    /// The effective shape: the dispatched subtype if any, else the declared
    /// type node.
    pub fn effective_ty(&self) -> &Arc<TypeNode> {
        self.actual.as_ref().unwrap_or(&self.ty)
    }
}

/// The container for one operation's value graph.
/// Acts as an arena allocator for nodes.
#[derive(Debug, Default)]
pub struct ValueGraph {
    nodes: Vec<ValueNode>,
}

impl ValueGraph {
    /// Creates a new empty graph.
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Adds a node mirroring `ty` under `parent`, linking it into the
    /// parent's child list.
    pub fn add_node(
        &mut self,
        ty: Arc<TypeNode>,
        name: Arc<str>,
        parent: Option<NodeId>,
        index: Option<usize>,
    ) -> NodeId {
        let id = NodeId::new(self.nodes.len() as u32);
        self.nodes.push(ValueNode {
            id,
            parent,
            ty,
            actual: None,
            name,
            index,
            children: Vec::new(),
            slot: None,
            offset: None,
            length: None,
            wire: None,
            deferred: None,
            endian: None,
            encoding: None,
        });
        if let Some(pid) = parent {
            self.nodes[pid.as_u32() as usize].children.push(id);
        }
        id
    }

    /// Returns a reference to a node.
    pub fn node(&self, id: NodeId) -> &ValueNode {
        &self.nodes[id.as_u32() as usize]
    }

    /// Returns a mutable reference to a node.
    pub fn node_mut(&mut self, id: NodeId) -> &mut ValueNode {
        &mut self.nodes[id.as_u32() as usize]
    }

    /// Returns the total number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when no nodes have been created.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All node ids, in creation order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as u32).map(NodeId::new)
    }

    /// Finds a direct child by instance name.
    pub fn child_by_name(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.node(id)
            .children
            .iter()
            .copied()
            .find(|&c| &*self.node(c).name == name)
    }

    /// Walks parent links from `id` upward, starting with `id` itself.
    pub fn self_and_ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut cursor = Some(id);
        std::iter::from_fn(move || {
            let current = cursor?;
            cursor = self.node(current).parent;
            Some(current)
        })
    }

    /// Renders the dotted breadcrumb path of a node, indices included.
    pub fn path_of(&self, id: NodeId) -> String {
        let mut parts: Vec<String> = self
            .self_and_ancestors(id)
            .map(|nid| {
                let node = self.node(nid);
                match node.index {
                    Some(i) => format!("{}[{i}]", node.name),
                    None => node.name.to_string(),
                }
            })
            .collect();
        parts.reverse();
        parts.join(".")
    }
}
