//! Walk lifecycle events.
//!
//! Observers are notified synchronously on the walking thread, once before
//! and once after each member; subscribers must be non-blocking.

use crate::value::Value;

/// Snapshot published for one member visit.
#[derive(Debug, Clone)]
pub struct MemberEvent {
    /// Member name.
    pub name: String,
    /// Logical absolute byte offset at publication time.
    pub offset: u64,
    /// Nesting depth; the root's members are at depth 1.
    pub depth: usize,
    /// The member's value, when available (after-events and serialization).
    pub value: Option<Value>,
}

/// Synchronous subscriber for walk events. All methods default to no-ops so
/// implementers pick what they care about.
#[allow(unused_variables)]
pub trait WalkObserver: Send + Sync {
    /// A member is about to be serialized.
    fn member_serializing(&self, event: &MemberEvent) {}

    /// A member finished serializing.
    fn member_serialized(&self, event: &MemberEvent) {}

    /// A member is about to be deserialized.
    fn member_deserializing(&self, event: &MemberEvent) {}

    /// A member finished deserializing.
    fn member_deserialized(&self, event: &MemberEvent) {}
}
