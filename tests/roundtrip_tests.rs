#![allow(missing_docs)]

use binform::{
    Attr, Bind, Binform, EndianSpec, Endian, EnumLiteral, EnumSpec, FieldType, MemberDesc, Prim,
    Record, Scale, Schema, SerializeAsSpec, TypeDesc, Value,
};

// --- FIXTURES ---

fn person_schema() -> Schema {
    let mut schema = Schema::new();
    schema.register(
        TypeDesc::new("Person")
            .member(MemberDesc::new("NameLength", FieldType::Prim(Prim::U8)).order(1))
            .member(
                MemberDesc::new("Name", FieldType::Str)
                    .order(2)
                    .attr(Attr::FieldLength(Bind::to("NameLength"))),
            ),
    );
    schema
}

// --- TESTS ---

/// Length binding: the emitted length octet tracks the measured string, and
/// both come back on deserialize.
#[test]
fn length_bound_string() -> binform::Result<()> {
    let engine = Binform::new(person_schema());
    let person = Record::new("Person").with("Name", Value::Str("Alice".into()));

    let bytes = engine.serialize(&person)?;
    assert_eq!(bytes, b"\x05Alice");

    let back = engine.deserialize("Person", &bytes)?;
    assert_eq!(back.get("NameLength"), Some(&Value::UInt(5)));
    assert_eq!(back.get("Name"), Some(&Value::Str("Alice".into())));
    Ok(())
}

/// Binding coherence: whatever the instance claims the length is, the wire
/// carries the measured value.
#[test]
fn stale_length_is_overwritten() -> binform::Result<()> {
    let engine = Binform::new(person_schema());
    let person = Record::new("Person")
        .with("NameLength", Value::UInt(99))
        .with("Name", Value::Str("Bob".into()));

    let bytes = engine.serialize(&person)?;
    assert_eq!(bytes, b"\x03Bob");
    Ok(())
}

/// Constant-length window: padded with zero octets on the tail, trimmed on
/// the way back.
#[test]
fn constant_length_pads_to_window() -> binform::Result<()> {
    let mut schema = Schema::new();
    schema.register(TypeDesc::new("Label").member(
        MemberDesc::new("Name", FieldType::Str).attr(Attr::FieldLength(Bind::constant(32))),
    ));
    let engine = Binform::new(schema);

    let bytes = engine.serialize(&Record::new("Label").with("Name", Value::Str("Alice".into())))?;
    assert_eq!(bytes.len(), 32);
    assert_eq!(&bytes[..5], b"Alice");
    assert!(bytes[5..].iter().all(|&b| b == 0));

    let back = engine.deserialize("Label", &bytes)?;
    assert_eq!(back.get("Name"), Some(&Value::Str("Alice".into())));
    Ok(())
}

/// A value wider than its constant window fails with an overflow.
#[test]
fn constant_length_overflow() {
    let mut schema = Schema::new();
    schema.register(TypeDesc::new("Tiny").member(
        MemberDesc::new("Name", FieldType::Str).attr(Attr::FieldLength(Bind::constant(2))),
    ));
    let engine = Binform::new(schema);

    let err = engine
        .serialize(&Record::new("Tiny").with("Name", Value::Str("toolong".into())))
        .unwrap_err();
    assert!(matches!(
        err.root_cause(),
        binform::BinformError::Overflow { .. }
    ));
}

/// Endianness declared on an ancestor is observed by descendants until one
/// overrides it.
#[test]
fn endianness_inherits_top_down() -> binform::Result<()> {
    let mut schema = Schema::new();
    schema.register(
        TypeDesc::new("Inner")
            .member(MemberDesc::new("A", FieldType::Prim(Prim::U16)).order(1))
            .member(
                MemberDesc::new("B", FieldType::Prim(Prim::U16))
                    .order(2)
                    .attr(Attr::FieldEndianness(EndianSpec::Const(Endian::Little))),
            ),
    );
    schema.register(
        TypeDesc::new("Outer").member(
            MemberDesc::new("Inner", FieldType::Record("Inner".into()))
                .attr(Attr::FieldEndianness(EndianSpec::Const(Endian::Big))),
        ),
    );
    let engine = Binform::new(schema);

    let outer = Record::new("Outer").with(
        "Inner",
        Value::Record(
            Record::new("Inner")
                .with("A", Value::UInt(0x0102))
                .with("B", Value::UInt(0x0304)),
        ),
    );
    let bytes = engine.serialize(&outer)?;
    // A inherits big-endian from the ancestor, B overrides back to little.
    assert_eq!(bytes, vec![0x01, 0x02, 0x04, 0x03]);

    let back = engine.deserialize("Outer", &bytes)?;
    assert_eq!(back, outer);
    Ok(())
}

/// Base-class members precede derived members in the emitted layout.
#[test]
fn base_members_serialize_first() -> binform::Result<()> {
    let mut schema = Schema::new();
    schema.register(TypeDesc::new("Base").member(MemberDesc::new("Tag", FieldType::Prim(Prim::U8))));
    schema.register(
        TypeDesc::new("Derived")
            .extends("Base")
            .member(MemberDesc::new("Payload", FieldType::Prim(Prim::U8))),
    );
    let engine = Binform::new(schema);

    let value = Record::new("Derived")
        .with("Tag", Value::UInt(0xAA))
        .with("Payload", Value::UInt(0xBB));
    let bytes = engine.serialize(&value)?;
    assert_eq!(bytes, vec![0xAA, 0xBB]);

    let back = engine.deserialize("Derived", &bytes)?;
    assert_eq!(back, value);
    Ok(())
}

/// Left alignment zero-fills to the multiple on encode and skips on decode.
#[test]
fn alignment_left() -> binform::Result<()> {
    let mut schema = Schema::new();
    schema.register(
        TypeDesc::new("Aligned")
            .member(MemberDesc::new("Tag", FieldType::Prim(Prim::U8)).order(1))
            .member(
                MemberDesc::new("Word", FieldType::Prim(Prim::U32))
                    .order(2)
                    .attr(Attr::FieldAlignment {
                        multiple: 4,
                        mode: binform::AlignMode::Left,
                    }),
            ),
    );
    let engine = Binform::new(schema);

    let value = Record::new("Aligned")
        .with("Tag", Value::UInt(7))
        .with("Word", Value::UInt(0x11223344));
    let bytes = engine.serialize(&value)?;
    assert_eq!(bytes.len(), 8);
    assert_eq!(&bytes[..4], &[7, 0, 0, 0]);

    let back = engine.deserialize("Aligned", &bytes)?;
    assert_eq!(back, value);
    Ok(())
}

/// FieldScale stores a scaled value on the wire and unscales on the way
/// back, even across a width re-representation.
#[test]
fn scaled_float_on_integer_wire() -> binform::Result<()> {
    let mut schema = Schema::new();
    schema.register(
        TypeDesc::new("Reading").member(
            MemberDesc::new("Volts", FieldType::Prim(Prim::F64))
                .attr(Attr::FieldScale(Scale { num: 1000, den: 1 }))
                .attr(Attr::SerializeAs(SerializeAsSpec {
                    prim: Prim::U16,
                    endian: None,
                })),
        ),
    );
    let engine = Binform::new(schema);

    let value = Record::new("Reading").with("Volts", Value::Float(1.5));
    let bytes = engine.serialize(&value)?;
    // 1.5 V scaled by 1000 -> 1500 millivolts on a u16 wire.
    assert_eq!(bytes, 1500u16.to_le_bytes().to_vec());

    let back = engine.deserialize("Reading", &bytes)?;
    assert_eq!(back.get("Volts"), Some(&Value::Float(1.5)));
    Ok(())
}

/// SerializeAs re-represents a textual member as a number on the wire.
#[test]
fn serialize_as_numeric_string() -> binform::Result<()> {
    let mut schema = Schema::new();
    schema.register(
        TypeDesc::new("Port").member(
            MemberDesc::new("Number", FieldType::Str).attr(Attr::SerializeAs(SerializeAsSpec {
                prim: Prim::U16,
                endian: Some(Endian::Big),
            })),
        ),
    );
    let engine = Binform::new(schema);

    let bytes = engine.serialize(&Record::new("Port").with("Number", Value::Str("8080".into())))?;
    assert_eq!(bytes, vec![0x1F, 0x90]);

    let back = engine.deserialize("Port", &bytes)?;
    assert_eq!(back.get("Number"), Some(&Value::Str("8080".into())));
    Ok(())
}

/// Numeric enums travel as their underlying ordinal.
#[test]
fn numeric_enum_round_trip() -> binform::Result<()> {
    let spec = EnumSpec {
        underlying: Prim::U8,
        literals: vec![
            EnumLiteral {
                name: "Red".into(),
                value: 1,
                serialize_as: None,
            },
            EnumLiteral {
                name: "Green".into(),
                value: 2,
                serialize_as: None,
            },
        ],
    };
    let mut schema = Schema::new();
    schema.register(TypeDesc::new("Pixel").member(MemberDesc::new("Color", FieldType::Enum(spec))));
    let engine = Binform::new(schema);

    let bytes = engine.serialize(&Record::new("Pixel").with("Color", Value::Str("Green".into())))?;
    assert_eq!(bytes, vec![2]);

    let back = engine.deserialize("Pixel", &bytes)?;
    assert_eq!(back.get("Color"), Some(&Value::Str("Green".into())));

    let err = engine.deserialize("Pixel", &[9]).unwrap_err();
    assert!(matches!(
        err.root_cause(),
        binform::BinformError::UnknownEnumLiteral { .. }
    ));
    Ok(())
}

/// SerializeAsEnum literals travel by their alternate spelling.
#[test]
fn spelled_enum_round_trip() -> binform::Result<()> {
    let spec = EnumSpec {
        underlying: Prim::U8,
        literals: vec![
            EnumLiteral {
                name: "Inches".into(),
                value: 0,
                serialize_as: Some("IN".into()),
            },
            EnumLiteral {
                name: "Centimeters".into(),
                value: 1,
                serialize_as: Some("CM".into()),
            },
        ],
    };
    let mut schema = Schema::new();
    schema.register(
        TypeDesc::new("Unit").member(
            MemberDesc::new("Kind", FieldType::Enum(spec)).attr(Attr::FieldLength(Bind::constant(2))),
        ),
    );
    let engine = Binform::new(schema);

    let bytes = engine.serialize(&Record::new("Unit").with("Kind", Value::Str("Inches".into())))?;
    assert_eq!(bytes, b"IN");

    let back = engine.deserialize("Unit", &bytes)?;
    assert_eq!(back.get("Kind"), Some(&Value::Str("Inches".into())));
    Ok(())
}

/// UTF-16 payloads honor the two-octet code units and the padded window.
#[test]
fn utf16_window() -> binform::Result<()> {
    let mut schema = Schema::new();
    schema.register(
        TypeDesc::new("Wide").member(
            MemberDesc::new("Text", FieldType::Str)
                .attr(Attr::FieldEncoding(binform::Encoding::Utf16Le))
                .attr(Attr::FieldLength(Bind::constant(8))),
        ),
    );
    let engine = Binform::new(schema);

    let bytes = engine.serialize(&Record::new("Wide").with("Text", Value::Str("ab".into())))?;
    assert_eq!(bytes, vec![b'a', 0, b'b', 0, 0, 0, 0, 0]);

    let back = engine.deserialize("Wide", &bytes)?;
    assert_eq!(back.get("Text"), Some(&Value::Str("ab".into())));
    Ok(())
}

/// A nullable primitive is absent exactly when the enclosing window has no
/// room left for it.
#[test]
fn nullable_by_exhausted_window() -> binform::Result<()> {
    let mut schema = Schema::new();
    schema.register(
        TypeDesc::new("Pair")
            .member(MemberDesc::new("A", FieldType::Prim(Prim::U8)).order(1))
            .member(
                MemberDesc::new("B", FieldType::Nullable(Box::new(FieldType::Prim(Prim::U16))))
                    .order(2),
            ),
    );
    schema.register(
        TypeDesc::new("Outer")
            .member(MemberDesc::new("Size", FieldType::Prim(Prim::U8)).order(1))
            .member(
                MemberDesc::new("Body", FieldType::Record("Pair".into()))
                    .order(2)
                    .attr(Attr::FieldLength(Bind::to("Size"))),
            ),
    );
    let engine = Binform::new(schema);

    let with_b = Record::new("Outer").with(
        "Body",
        Value::Record(
            Record::new("Pair")
                .with("A", Value::UInt(1))
                .with("B", Value::UInt(0x0203)),
        ),
    );
    let bytes = engine.serialize(&with_b)?;
    assert_eq!(bytes[0], 3);
    let back = engine.deserialize("Outer", &bytes)?;
    let body = back.get("Body").and_then(Value::as_record).unwrap();
    assert_eq!(body.get("B"), Some(&Value::UInt(0x0203)));

    let without_b = Record::new("Outer").with(
        "Body",
        Value::Record(Record::new("Pair").with("A", Value::UInt(1)).with("B", Value::Null)),
    );
    let bytes = engine.serialize(&without_b)?;
    assert_eq!(bytes[0], 1);
    let back = engine.deserialize("Outer", &bytes)?;
    let body = back.get("Body").and_then(Value::as_record).unwrap();
    assert_eq!(body.get("B"), Some(&Value::Null));
    Ok(())
}
