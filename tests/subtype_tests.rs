#![allow(missing_docs)]

use binform::{
    Attr, Bind, BindDirection, BindPath, Binform, FieldType, MemberDesc, Prim, Record, Schema,
    SubtypeEntryDesc, SubtypeFactory, TypeDesc, TypeId, Value,
};
use std::sync::Arc;

// --- FIXTURES ---

/// A PNG-style frame: a length, a four-octet tag, a tag-dispatched body
/// bounded by the length, and a trailing octet to prove the window is exact.
fn chunk_schema() -> Schema {
    let mut schema = Schema::new();
    schema.register(TypeDesc::new("ChunkBody"));
    schema.register(TypeDesc::new("UnknownChunk"));
    schema.register(
        TypeDesc::new("IhdrChunk")
            .member(MemberDesc::new("Width", FieldType::Prim(Prim::U32)).order(1))
            .member(MemberDesc::new("Height", FieldType::Prim(Prim::U32)).order(2)),
    );
    schema.register(
        TypeDesc::new("Frame")
            .member(MemberDesc::new("Length", FieldType::Prim(Prim::U32)).order(1))
            .member(
                MemberDesc::new("Tag", FieldType::Str)
                    .order(2)
                    .attr(Attr::FieldLength(Bind::constant(4))),
            )
            .member(
                MemberDesc::new("Body", FieldType::Record("ChunkBody".into()))
                    .order(3)
                    .attr(Attr::FieldLength(Bind::to("Length")))
                    .attr(Attr::SubtypeKey(BindPath::to("Tag")))
                    .attr(Attr::Subtype(SubtypeEntryDesc {
                        key: Value::Str("IHDR".into()),
                        type_id: "IhdrChunk".into(),
                        direction: BindDirection::Both,
                    }))
                    .attr(Attr::SubtypeDefault("UnknownChunk".into())),
            )
            .member(MemberDesc::new("Trailer", FieldType::Prim(Prim::U8)).order(4)),
    );
    schema
}

// --- TESTS ---

/// Serializing a mapped subtype writes its key back into the tag field and
/// its measured length into the length field.
#[test]
fn subtype_key_and_length_write_back() -> binform::Result<()> {
    let engine = Binform::new(chunk_schema());

    let frame = Record::new("Frame")
        .with(
            "Body",
            Value::Record(
                Record::new("IhdrChunk")
                    .with("Width", Value::UInt(1))
                    .with("Height", Value::UInt(2)),
            ),
        )
        .with("Trailer", Value::UInt(0x7F));

    let bytes = engine.serialize(&frame)?;
    let mut expected = vec![8, 0, 0, 0];
    expected.extend_from_slice(b"IHDR");
    expected.extend_from_slice(&1u32.to_le_bytes());
    expected.extend_from_slice(&2u32.to_le_bytes());
    expected.push(0x7F);
    assert_eq!(bytes, expected);

    let back = engine.deserialize("Frame", &bytes)?;
    let body = back.get("Body").and_then(Value::as_record).unwrap();
    assert_eq!(body.type_id, TypeId::new("IhdrChunk"));
    assert_eq!(body.get("Width"), Some(&Value::UInt(1)));
    assert_eq!(back.get("Trailer"), Some(&Value::UInt(0x7F)));
    Ok(())
}

/// An unknown tag falls back to the default type and the walker skips
/// exactly the bound length.
#[test]
fn unknown_subtype_uses_default_and_skips() -> binform::Result<()> {
    let engine = Binform::new(chunk_schema());

    let mut bytes = vec![5, 0, 0, 0];
    bytes.extend_from_slice(b"ABCD");
    bytes.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF, 0x99]);
    bytes.push(0x7F);

    let back = engine.deserialize("Frame", &bytes)?;
    let body = back.get("Body").and_then(Value::as_record).unwrap();
    assert_eq!(body.type_id, TypeId::new("UnknownChunk"));
    assert_eq!(back.get("Trailer"), Some(&Value::UInt(0x7F)));
    Ok(())
}

/// Without a default, an unmatched key is an error.
#[test]
fn unknown_subtype_without_default_fails() {
    let mut schema = Schema::new();
    schema.register(TypeDesc::new("Base"));
    schema.register(TypeDesc::new("Known"));
    schema.register(
        TypeDesc::new("Holder")
            .member(MemberDesc::new("Kind", FieldType::Prim(Prim::U8)).order(1))
            .member(
                MemberDesc::new("Body", FieldType::Record("Base".into()))
                    .order(2)
                    .attr(Attr::SubtypeKey(BindPath::to("Kind")))
                    .attr(Attr::Subtype(SubtypeEntryDesc {
                        key: Value::UInt(1),
                        type_id: "Known".into(),
                        direction: BindDirection::Both,
                    })),
            ),
    );
    let engine = Binform::new(schema);

    let err = engine.deserialize("Holder", &[9]).unwrap_err();
    assert!(matches!(
        err.root_cause(),
        binform::BinformError::UnknownSubtype { .. }
    ));
}

/// A write-only mapping never matches during deserialize, a read-only one
/// never matches during serialize.
#[test]
fn direction_gated_mappings() -> binform::Result<()> {
    let mut schema = Schema::new();
    schema.register(TypeDesc::new("Base"));
    schema.register(TypeDesc::new("Old").member(MemberDesc::new("V", FieldType::Prim(Prim::U8))));
    schema.register(TypeDesc::new("New").member(MemberDesc::new("V", FieldType::Prim(Prim::U8))));
    schema.register(
        TypeDesc::new("Holder")
            .member(MemberDesc::new("Kind", FieldType::Prim(Prim::U8)).order(1))
            .member(
                MemberDesc::new("Body", FieldType::Record("Base".into()))
                    .order(2)
                    .attr(Attr::SubtypeKey(BindPath::to("Kind")))
                    // The legacy type still serializes under key 1...
                    .attr(Attr::Subtype(SubtypeEntryDesc {
                        key: Value::UInt(1),
                        type_id: "Old".into(),
                        direction: BindDirection::WriteOnly,
                    }))
                    // ...but key 1 now deserializes as the new type.
                    .attr(Attr::Subtype(SubtypeEntryDesc {
                        key: Value::UInt(1),
                        type_id: "New".into(),
                        direction: BindDirection::ReadOnly,
                    })),
            ),
    );
    let engine = Binform::new(schema);

    let old = Record::new("Holder").with(
        "Body",
        Value::Record(Record::new("Old").with("V", Value::UInt(7))),
    );
    let bytes = engine.serialize(&old)?;
    assert_eq!(bytes, vec![1, 7]);

    let back = engine.deserialize("Holder", &bytes)?;
    let body = back.get("Body").and_then(Value::as_record).unwrap();
    assert_eq!(body.type_id, TypeId::new("New"));

    // The read-only type has no write mapping.
    let new = Record::new("Holder").with(
        "Body",
        Value::Record(Record::new("New").with("V", Value::UInt(7))),
    );
    let err = engine.serialize(&new).unwrap_err();
    assert!(matches!(
        err.root_cause(),
        binform::BinformError::UnmappedSubtype { .. }
    ));
    Ok(())
}

/// The factory is consulted when the static table misses.
#[test]
fn factory_fallback() -> binform::Result<()> {
    struct NinthFactory;
    impl SubtypeFactory for NinthFactory {
        fn type_for_key(&self, key: &Value) -> Option<TypeId> {
            (key.as_u64() == Some(9)).then(|| TypeId::new("Ninth"))
        }
        fn key_for_type(&self, type_id: &TypeId) -> Option<Value> {
            (type_id == &TypeId::new("Ninth")).then(|| Value::UInt(9))
        }
    }

    let mut schema = Schema::new();
    schema.factory("ninth", Arc::new(NinthFactory));
    schema.register(TypeDesc::new("Base"));
    schema
        .register(TypeDesc::new("Ninth").member(MemberDesc::new("V", FieldType::Prim(Prim::U8))));
    schema.register(
        TypeDesc::new("Holder")
            .member(MemberDesc::new("Kind", FieldType::Prim(Prim::U8)).order(1))
            .member(
                MemberDesc::new("Body", FieldType::Record("Base".into()))
                    .order(2)
                    .attr(Attr::SubtypeKey(BindPath::to("Kind")))
                    .attr(Attr::SubtypeFactory("ninth".into())),
            ),
    );
    let engine = Binform::new(schema);

    let holder = Record::new("Holder").with(
        "Body",
        Value::Record(Record::new("Ninth").with("V", Value::UInt(3))),
    );
    let bytes = engine.serialize(&holder)?;
    assert_eq!(bytes, vec![9, 3]);

    let back = engine.deserialize("Holder", &bytes)?;
    let body = back.get("Body").and_then(Value::as_record).unwrap();
    assert_eq!(body.type_id, TypeId::new("Ninth"));
    assert_eq!(body.get("V"), Some(&Value::UInt(3)));
    Ok(())
}
