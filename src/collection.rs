//! Collection termination: how a list knows where it ends.
//!
//! When several modes are declared on one member, the engine honors the
//! priority order `FieldCount`, then `FieldLength`, then `ItemSerializeUntil`,
//! then `SerializeUntil`; with none declared, deserialization consumes items
//! until the enclosing bound (or the stream) is exhausted.

use crate::desc::{Bind, ItemUntilSpec};
use crate::schema::AttrSet;
use crate::value::Value;

/// The selected termination mode for one collection walk.
#[derive(Debug, Clone)]
pub enum Termination {
    /// Read/write exactly the bound number of items.
    Count(Bind),
    /// Consume a bounded overlay of the given total byte length.
    Length(Bind),
    /// Terminate when a bound path inside an item equals a literal.
    ItemUntil(ItemUntilSpec),
    /// Terminate when the next value equals the sentinel literal.
    Until(Value),
    /// Run until the enclosing bound or stream is exhausted.
    Exhaustion,
}

/// Selects the termination mode from a collection's attribute set.
pub fn select(attrs: &AttrSet) -> Termination {
    if let Some(count) = &attrs.count {
        return Termination::Count(count.clone());
    }
    if let Some(length) = &attrs.length {
        return Termination::Length(length.clone());
    }
    if let Some(spec) = &attrs.item_until {
        return Termination::ItemUntil(spec.clone());
    }
    if let Some(value) = &attrs.until {
        return Termination::Until(value.clone());
    }
    Termination::Exhaustion
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use crate::desc::{LastItemMode, PathSpec};

    #[test]
    fn count_wins_over_everything() {
        let mut attrs = AttrSet {
            count: Some(Bind::constant(3)),
            length: Some(Bind::constant(12)),
            until: Some(Value::UInt(0)),
            ..AttrSet::default()
        };
        attrs.item_until = Some(ItemUntilSpec {
            path: PathSpec::to("Kind"),
            value: Value::UInt(9),
            mode: LastItemMode::Include,
        });
        assert!(matches!(select(&attrs), Termination::Count(_)));
    }

    #[test]
    fn length_wins_over_sentinels() {
        let attrs = AttrSet {
            length: Some(Bind::constant(12)),
            until: Some(Value::UInt(0)),
            ..AttrSet::default()
        };
        assert!(matches!(select(&attrs), Termination::Length(_)));
    }

    #[test]
    fn bare_collection_runs_to_exhaustion() {
        assert!(matches!(select(&AttrSet::default()), Termination::Exhaustion));
    }
}
