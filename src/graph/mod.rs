//! The per-operation value graph.
//!
//! A value graph mirrors the cached type graph, bound to concrete instance
//! data: every visited position gets a [`ValueNode`] carrying its live value
//! slot, observed offset/length, and resolved attribute caches. The graph is
//! an arena (nodes indexed by [`NodeId`]) with parent back-links, created at
//! the start of each serialize/deserialize call and torn down at the end.

/// Defines the arena and the `ValueNode` structure.
pub mod core;
/// Defines the `NodeId` type.
pub mod id;
/// The binding resolver: path navigation, converters, write-back.
pub mod resolve;

pub use self::core::{ValueGraph, ValueNode, WireFmt};
pub use self::id::NodeId;
pub use self::resolve::BindContext;
