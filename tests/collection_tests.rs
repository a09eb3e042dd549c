#![allow(missing_docs)]

use binform::{
    Attr, Bind, BindDirection, BindPath, Binform, FieldType, ItemUntilSpec, LastItemMode,
    MemberDesc, PathSpec, Prim, Record, Schema, TypeDesc, Value,
};

fn list_of(prim: Prim) -> FieldType {
    FieldType::List(Box::new(FieldType::Prim(prim)))
}

/// A bound count drives both directions and ignores the instance's claim.
#[test]
fn count_binding_round_trip() -> binform::Result<()> {
    let mut schema = Schema::new();
    schema.register(
        TypeDesc::new("Batch")
            .member(MemberDesc::new("Count", FieldType::Prim(Prim::U8)).order(1))
            .member(
                MemberDesc::new("Items", list_of(Prim::U16))
                    .order(2)
                    .attr(Attr::FieldCount(Bind::to("Count"))),
            ),
    );
    let engine = Binform::new(schema);

    let batch = Record::new("Batch")
        .with("Count", Value::UInt(99))
        .with(
            "Items",
            Value::List(vec![Value::UInt(0x0102), Value::UInt(0x0304)]),
        );
    let bytes = engine.serialize(&batch)?;
    assert_eq!(bytes, vec![2, 0x02, 0x01, 0x04, 0x03]);

    let back = engine.deserialize("Batch", &bytes)?;
    assert_eq!(back.get("Count"), Some(&Value::UInt(2)));
    assert_eq!(
        back.get("Items"),
        Some(&Value::List(vec![Value::UInt(0x0102), Value::UInt(0x0304)]))
    );
    Ok(())
}

/// A constant count must match the instance exactly.
#[test]
fn constant_count_mismatch_fails() {
    let mut schema = Schema::new();
    schema.register(
        TypeDesc::new("Fixed").member(
            MemberDesc::new("Items", list_of(Prim::U8)).attr(Attr::FieldCount(Bind::constant(3))),
        ),
    );
    let engine = Binform::new(schema);

    let err = engine
        .serialize(&Record::new("Fixed").with("Items", Value::List(vec![Value::UInt(1)])))
        .unwrap_err();
    assert!(matches!(
        err.root_cause(),
        binform::BinformError::Overflow { natural: 1, bound: 3 }
    ));
}

/// A total-byte window terminates the list and pads on serialize.
#[test]
fn byte_length_window() -> binform::Result<()> {
    let mut schema = Schema::new();
    schema.register(
        TypeDesc::new("Windowed").member(
            MemberDesc::new("Items", list_of(Prim::U16)).attr(Attr::FieldLength(Bind::constant(6))),
        ),
    );
    let engine = Binform::new(schema);

    let bytes = engine.serialize(
        &Record::new("Windowed").with("Items", Value::List(vec![Value::UInt(1), Value::UInt(2)])),
    )?;
    assert_eq!(bytes, vec![1, 0, 2, 0, 0, 0]);

    let back = engine.deserialize("Windowed", &bytes)?;
    assert_eq!(
        back.get("Items"),
        Some(&Value::List(vec![
            Value::UInt(1),
            Value::UInt(2),
            Value::UInt(0)
        ]))
    );
    Ok(())
}

/// A value sentinel terminates the list; the sentinel is consumed.
#[test]
fn until_value_sentinel() -> binform::Result<()> {
    let mut schema = Schema::new();
    schema.register(
        TypeDesc::new("CString").member(
            MemberDesc::new("Bytes", list_of(Prim::U8)).attr(Attr::SerializeUntil(Value::UInt(0))),
        ),
    );
    let engine = Binform::new(schema);

    let bytes = engine.serialize(
        &Record::new("CString").with("Bytes", Value::List(vec![Value::UInt(5), Value::UInt(6)])),
    )?;
    assert_eq!(bytes, vec![5, 6, 0]);

    let back = engine.deserialize("CString", &bytes)?;
    assert_eq!(
        back.get("Bytes"),
        Some(&Value::List(vec![Value::UInt(5), Value::UInt(6)]))
    );
    Ok(())
}

/// Jagged item lengths: the nth source entry windows the nth item.
#[test]
fn jagged_item_lengths() -> binform::Result<()> {
    let mut schema = Schema::new();
    schema.register(
        TypeDesc::new("Jagged")
            .member(
                MemberDesc::new("Lens", list_of(Prim::U8))
                    .order(1)
                    .attr(Attr::FieldCount(Bind::constant(2))),
            )
            .member(
                MemberDesc::new("Slices", FieldType::List(Box::new(FieldType::Bytes)))
                    .order(2)
                    .attr(Attr::FieldCount(Bind::constant(2)))
                    .attr(Attr::ItemLength(Bind::Path(
                        BindPath::to("Lens").direction(BindDirection::ReadOnly),
                    ))),
            ),
    );
    let engine = Binform::new(schema);

    let jagged = Record::new("Jagged")
        .with("Lens", Value::List(vec![Value::UInt(2), Value::UInt(4)]))
        .with(
            "Slices",
            Value::List(vec![
                Value::Bytes(vec![0xA, 0xB]),
                Value::Bytes(vec![1, 2, 3, 4]),
            ]),
        );
    let bytes = engine.serialize(&jagged)?;
    assert_eq!(bytes, vec![2, 4, 0xA, 0xB, 1, 2, 3, 4]);

    let back = engine.deserialize("Jagged", &bytes)?;
    assert_eq!(
        back.get("Slices"),
        Some(&Value::List(vec![
            Value::Bytes(vec![0xA, 0xB]),
            Value::Bytes(vec![1, 2, 3, 4]),
        ]))
    );
    Ok(())
}

/// More items than jagged lengths is a mismatch.
#[test]
fn jagged_length_mismatch() {
    let mut schema = Schema::new();
    schema.register(
        TypeDesc::new("Jagged")
            .member(
                MemberDesc::new("Lens", list_of(Prim::U8))
                    .order(1)
                    .attr(Attr::FieldCount(Bind::constant(1))),
            )
            .member(
                MemberDesc::new("Slices", FieldType::List(Box::new(FieldType::Bytes)))
                    .order(2)
                    .attr(Attr::FieldCount(Bind::constant(2)))
                    .attr(Attr::ItemLength(Bind::Path(
                        BindPath::to("Lens").direction(BindDirection::ReadOnly),
                    ))),
            ),
    );
    let engine = Binform::new(schema);

    let jagged = Record::new("Jagged")
        .with("Lens", Value::List(vec![Value::UInt(2)]))
        .with(
            "Slices",
            Value::List(vec![Value::Bytes(vec![1, 2]), Value::Bytes(vec![3, 4])]),
        );
    let err = engine.serialize(&jagged).unwrap_err();
    assert!(matches!(
        err.root_cause(),
        binform::BinformError::ItemLengthMismatch { .. }
    ));
}

/// Strings inside collections default to null termination.
#[test]
fn string_items_are_null_terminated() -> binform::Result<()> {
    let mut schema = Schema::new();
    schema.register(
        TypeDesc::new("Names")
            .member(MemberDesc::new("N", FieldType::Prim(Prim::U8)).order(1))
            .member(
                MemberDesc::new("Items", FieldType::List(Box::new(FieldType::Str)))
                    .order(2)
                    .attr(Attr::FieldCount(Bind::to("N"))),
            ),
    );
    let engine = Binform::new(schema);

    let names = Record::new("Names").with(
        "Items",
        Value::List(vec![Value::Str("ab".into()), Value::Str("c".into())]),
    );
    let bytes = engine.serialize(&names)?;
    assert_eq!(bytes, b"\x02ab\0c\0");

    let back = engine.deserialize("Names", &bytes)?;
    assert_eq!(
        back.get("Items"),
        Some(&Value::List(vec![
            Value::Str("ab".into()),
            Value::Str("c".into())
        ]))
    );
    Ok(())
}

// --- ITEM-TERMINATED SECTIONS ---

fn block_schema() -> Schema {
    let mut schema = Schema::new();
    schema.register(
        TypeDesc::new("Block")
            .member(MemberDesc::new("Kind", FieldType::Prim(Prim::U8)).order(1))
            .member(MemberDesc::new("Val", FieldType::Prim(Prim::U8)).order(2)),
    );
    schema
}

/// Until-item with `Defer`: the sentinel block is rewound so the next
/// member consumes it.
#[test]
fn until_item_defer_rewinds_sentinel() -> binform::Result<()> {
    let mut schema = block_schema();
    schema.register(
        TypeDesc::new("Doc")
            .member(
                MemberDesc::new("Blocks", FieldType::List(Box::new(FieldType::Record("Block".into()))))
                    .order(1)
                    .attr(Attr::ItemSerializeUntil(ItemUntilSpec {
                        path: PathSpec::to("Kind"),
                        value: Value::UInt(9),
                        mode: LastItemMode::Defer,
                    })),
            )
            .member(MemberDesc::new("Header", FieldType::Record("Block".into())).order(2)),
    );
    let engine = Binform::new(schema);

    let bytes = vec![1, 0xA, 2, 0xB, 9, 0xC];
    let back = engine.deserialize("Doc", &bytes)?;

    let blocks = back.get("Blocks").and_then(Value::as_list).unwrap();
    assert_eq!(blocks.len(), 2);
    let header = back.get("Header").and_then(Value::as_record).unwrap();
    assert_eq!(header.get("Kind"), Some(&Value::UInt(9)));
    assert_eq!(header.get("Val"), Some(&Value::UInt(0xC)));

    // The same shape serializes back to the same octets.
    let again = engine.serialize(&back)?;
    assert_eq!(again, bytes);
    Ok(())
}

/// Until-item with `Include` keeps the sentinel in the list.
#[test]
fn until_item_include_keeps_sentinel() -> binform::Result<()> {
    let mut schema = block_schema();
    schema.register(
        TypeDesc::new("Doc").member(
            MemberDesc::new("Blocks", FieldType::List(Box::new(FieldType::Record("Block".into()))))
                .attr(Attr::ItemSerializeUntil(ItemUntilSpec {
                    path: PathSpec::to("Kind"),
                    value: Value::UInt(9),
                    mode: LastItemMode::Include,
                })),
        ),
    );
    let engine = Binform::new(schema);

    let bytes = vec![1, 0xA, 9, 0xC];
    let back = engine.deserialize("Doc", &bytes)?;
    let blocks = back.get("Blocks").and_then(Value::as_list).unwrap();
    assert_eq!(blocks.len(), 2);
    Ok(())
}

/// Until-item with `Exclude` consumes the sentinel's octets but drops it.
#[test]
fn until_item_exclude_drops_sentinel() -> binform::Result<()> {
    let mut schema = block_schema();
    schema.register(
        TypeDesc::new("Doc")
            .member(
                MemberDesc::new("Blocks", FieldType::List(Box::new(FieldType::Record("Block".into()))))
                    .order(1)
                    .attr(Attr::ItemSerializeUntil(ItemUntilSpec {
                        path: PathSpec::to("Kind"),
                        value: Value::UInt(9),
                        mode: LastItemMode::Exclude,
                    })),
            )
            .member(MemberDesc::new("Tail", FieldType::Prim(Prim::U8)).order(2)),
    );
    let engine = Binform::new(schema);

    let bytes = vec![1, 0xA, 9, 0xC, 0x55];
    let back = engine.deserialize("Doc", &bytes)?;
    let blocks = back.get("Blocks").and_then(Value::as_list).unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(back.get("Tail"), Some(&Value::UInt(0x55)));
    Ok(())
}
