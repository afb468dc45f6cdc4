use std::sync::Mutex;

use strand_core::diagnostics::{Diagnostics, Phase};
use strand_core::{
    string, varint, Error, Kind, Record, RecordId, Schema, SchemaBuilder, Value, ValueCodec,
};

/// Schema with a `data { name: string, count: u32 }` record.
fn data_schema() -> (Schema, RecordId) {
    let mut builder = Schema::builder();
    let data = builder.record("data", [("name", Kind::String), ("count", Kind::U32)]);
    (builder.build().unwrap(), data)
}

/// Schema with a self-referential `node { label: string, next: option<node> }`.
fn list_schema() -> (Schema, RecordId) {
    let mut builder = Schema::builder();
    let node = builder.declare("node");
    builder
        .define(
            node,
            [("label", Kind::String), ("next", Kind::option(Kind::Record(node)))],
        )
        .unwrap();
    (builder.build().unwrap(), node)
}

fn slice(bytes: &[u8]) -> &[u8] {
    bytes
}

fn chain(len: usize) -> Record {
    let mut next = Value::none();
    for i in (0..len).rev() {
        let node = Record::new().with("label", format!("n{i}")).with("next", next);
        next = Value::some(node.into());
    }
    match next {
        Value::Option(Some(node)) => (*node).into_record().unwrap(),
        _ => unreachable!(),
    }
}

// Varint

#[test]
fn varint_roundtrip_boundaries() {
    for v in [0, 1, 127, 128, 255, 300, 16_383, 16_384, 1 << 28, u32::MAX - 1, u32::MAX] {
        let bytes = varint::encode(v);
        assert_eq!(varint::decode(&mut bytes.as_slice()).unwrap(), v, "value {v}");
    }
}

#[test]
fn varint_encoding_is_minimal() {
    assert_eq!(varint::encode(0), [0x00]);
    assert_eq!(varint::encode(127), [0x7f]);
    assert_eq!(varint::encode(128), [0x80, 0x01]);
    assert_eq!(varint::encode(300), [0xac, 0x02]);
    assert_eq!(varint::encode(u32::MAX), [0xff, 0xff, 0xff, 0xff, 0x0f]);
}

#[test]
fn varint_write_matches_encode() {
    let mut out = Vec::new();
    varint::write(&mut out, 624_485).unwrap();
    assert_eq!(out, varint::encode(624_485));
    assert_eq!(out, [0xe5, 0x8e, 0x26]);
}

#[test]
fn varint_accepts_non_minimal_forms() {
    assert_eq!(varint::decode(&mut slice(&[0x80, 0x00])).unwrap(), 0);
    assert_eq!(varint::decode(&mut slice(&[0x81, 0x80, 0x80, 0x80, 0x00])).unwrap(), 1);
}

#[test]
fn varint_fifth_group_overflow() {
    let err = varint::decode(&mut slice(&[0x80, 0x80, 0x80, 0x80, 0x10])).unwrap_err();
    assert!(matches!(err, Error::IntegerOverflow));

    let err = varint::decode(&mut slice(&[0xff, 0xff, 0xff, 0xff, 0x7f])).unwrap_err();
    assert!(matches!(err, Error::IntegerOverflow));
}

#[test]
fn varint_fifth_group_carries_four_bits() {
    // Bit 29 lives in the 5th group; a single-bit bound there would reject it.
    let bytes = [0x80, 0x80, 0x80, 0x80, 0x02];
    assert_eq!(varint::decode(&mut slice(&bytes)).unwrap(), 1 << 29);
    assert_eq!(varint::encode(1 << 29), bytes);

    let bytes = [0xff, 0xff, 0xff, 0xff, 0x0f];
    assert_eq!(varint::decode(&mut slice(&bytes)).unwrap(), u32::MAX);
}

#[test]
fn varint_fifth_byte_with_continuation_overflows() {
    let err = varint::decode(&mut slice(&[0x80, 0x80, 0x80, 0x80, 0x81, 0x00])).unwrap_err();
    assert!(matches!(err, Error::IntegerOverflow));
}

#[test]
fn varint_truncated_after_continuation() {
    let err = varint::decode(&mut slice(&[0x80])).unwrap_err();
    assert!(matches!(err, Error::UnexpectedEndOfStream));

    let err = varint::decode(&mut slice(&[0xff, 0xff])).unwrap_err();
    assert!(matches!(err, Error::UnexpectedEndOfStream));
}

#[test]
fn varint_empty_stream_is_clean_end() {
    let err = varint::decode(&mut slice(&[])).unwrap_err();
    assert!(err.is_end_of_stream());
    assert!(!matches!(err, Error::UnexpectedEndOfStream));
}

#[test]
fn varint_reads_consecutive_values_until_clean_end() {
    let mut bytes = Vec::new();
    for v in [5, 300, 0] {
        bytes.extend(varint::encode(v));
    }
    let mut reader = bytes.as_slice();
    let mut values = Vec::new();
    loop {
        match varint::decode(&mut reader) {
            Ok(v) => values.push(v),
            Err(e) if e.is_end_of_stream() => break,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(values, [5, 300, 0]);
}

// String

#[test]
fn string_roundtrip() {
    for s in ["", "a", "hello", "grüße", "日本語", "🦀 crab"] {
        let bytes = string::encode(s).unwrap();
        assert_eq!(string::decode(&mut bytes.as_slice()).unwrap(), s);
    }
}

#[test]
fn string_layout_is_length_then_bytes() {
    assert_eq!(string::encode("").unwrap(), [0x00]);
    assert_eq!(string::encode("hi").unwrap(), [0x02, b'h', b'i']);
    // "é" is two bytes in UTF-8
    assert_eq!(string::encode("é").unwrap(), [0x02, 0xc3, 0xa9]);
}

#[test]
fn string_declared_length_exceeds_stream() {
    let err = string::decode(&mut slice(&[0x05, b'a', b'b'])).unwrap_err();
    assert!(matches!(err, Error::UnexpectedEndOfStream));
}

#[test]
fn string_huge_length_does_not_preallocate() {
    let mut bytes = varint::encode(u32::MAX);
    bytes.extend_from_slice(b"short");
    let err = string::decode(&mut bytes.as_slice()).unwrap_err();
    assert!(matches!(err, Error::UnexpectedEndOfStream));
}

#[test]
fn string_consumes_exactly_declared_length() {
    let mut reader: &[u8] = &[0x02, b'o', b'k', 0x07];
    assert_eq!(string::decode(&mut reader).unwrap(), "ok");
    assert_eq!(reader, [0x07]);
}

#[test]
fn string_invalid_utf8_returns_lossy_value() {
    let err = string::decode(&mut slice(&[0x03, b'a', 0xff, b'b'])).unwrap_err();
    match err {
        Error::InvalidEncoding { lossy } => {
            assert!(!lossy.is_empty());
            assert_eq!(lossy, "a\u{fffd}b");
        }
        e => panic!("expected InvalidEncoding, got {e:?}"),
    }
}

#[test]
fn string_empty_stream_is_clean_end() {
    let err = string::decode(&mut slice(&[])).unwrap_err();
    assert!(err.is_end_of_stream());
}

// Records

#[test]
fn record_encodes_to_expected_bytes() {
    let (schema, data) = data_schema();
    let record = Record::new().with("name", "hello").with("count", 5u32);

    let bytes = ValueCodec::new(&schema).encode_record(data, &record).unwrap();
    assert_eq!(bytes, [0x05, b'h', b'e', b'l', b'l', b'o', 0x05]);

    let decoded = ValueCodec::new(&schema)
        .decode_record(&mut bytes.as_slice(), data)
        .unwrap();
    assert_eq!(decoded, record);
}

#[test]
fn record_mixed_kinds_roundtrip() {
    let mut builder = Schema::builder();
    let point = builder.record("point", [("x", Kind::U32), ("y", Kind::U32)]);
    let shape = builder.record(
        "shape",
        [
            ("name", Kind::String),
            ("origin", Kind::Record(point)),
            ("tags", Kind::list(Kind::String)),
            ("parent", Kind::option(Kind::String)),
            ("weight", Kind::U32),
        ],
    );
    let schema = builder.build().unwrap();

    let origin = Record::new().with("x", 3u32).with("y", 70_000u32);
    let record = Record::new()
        .with("name", "triangle")
        .with("origin", origin)
        .with("tags", vec![Value::from("a"), Value::from("βeta")])
        .with("parent", Value::some("root".into()))
        .with("weight", u32::MAX);

    let codec = ValueCodec::new(&schema);
    let bytes = codec.encode_record(shape, &record).unwrap();
    let decoded = codec.decode_record(&mut bytes.as_slice(), shape).unwrap();
    assert_eq!(decoded, record);
}

#[test]
fn record_write_leaves_stream_untouched_on_failure() {
    let (schema, data) = data_schema();
    let record = Record::new().with("name", "x").with("count", "not a number");

    let mut out = Vec::new();
    let err = ValueCodec::new(&schema)
        .write_record(&mut out, data, &record)
        .unwrap_err();
    assert!(out.is_empty());
    assert_eq!(err.field_path(), "count");
    assert!(matches!(err.root_cause(), Error::SchemaMismatch { .. }));
}

#[test]
fn record_rejects_misordered_fields() {
    let (schema, data) = data_schema();
    let record = Record::new().with("count", 5u32).with("name", "hello");
    let err = ValueCodec::new(&schema).encode_record(data, &record).unwrap_err();
    assert!(matches!(err, Error::SchemaMismatch { .. }));
}

#[test]
fn record_rejects_wrong_field_count() {
    let (schema, data) = data_schema();
    let record = Record::new().with("name", "hello");
    let err = ValueCodec::new(&schema).encode_record(data, &record).unwrap_err();
    assert!(matches!(err, Error::SchemaMismatch { .. }));
}

#[test]
fn record_decode_error_names_field() {
    let (schema, data) = data_schema();
    // name ok, count truncated mid-varint
    let bytes = [0x01, b'a', 0x80];
    let err = ValueCodec::new(&schema)
        .decode_record(&mut bytes.as_slice(), data)
        .unwrap_err();
    assert_eq!(err.field_path(), "count");
    assert!(matches!(err.root_cause(), Error::UnexpectedEndOfStream));
    assert!(err.to_string().contains("`count`"));
}

#[test]
fn record_missing_later_field_is_unexpected_end() {
    let (schema, data) = data_schema();
    let bytes = [0x01, b'a'];
    let err = ValueCodec::new(&schema)
        .decode_record(&mut bytes.as_slice(), data)
        .unwrap_err();
    assert_eq!(err.field_path(), "count");
    assert!(matches!(err.root_cause(), Error::UnexpectedEndOfStream));
}

#[test]
fn record_empty_stream_is_clean_end() {
    let (schema, data) = data_schema();
    let err = ValueCodec::new(&schema)
        .decode_record(&mut slice(&[]), data)
        .unwrap_err();
    assert!(err.is_end_of_stream());
}

#[test]
fn record_nested_error_path() {
    let mut builder = Schema::builder();
    let inner = builder.record("inner", [("label", Kind::String)]);
    let outer = builder.record("outer", [("id", Kind::U32), ("inner", Kind::Record(inner))]);
    let schema = builder.build().unwrap();

    let bytes = [0x01, 0x02, 0xc3, 0x28];
    let err = ValueCodec::new(&schema)
        .decode_record(&mut bytes.as_slice(), outer)
        .unwrap_err();
    assert_eq!(err.field_path(), "inner.label");
    assert!(matches!(err.root_cause(), Error::InvalidEncoding { .. }));
}

#[test]
fn option_rejects_unknown_discriminant() {
    let schema = Schema::builder().build().unwrap();
    let err = ValueCodec::new(&schema)
        .decode(&mut slice(&[0x02]), &Kind::option(Kind::U32))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidDiscriminant(0x02)));
}

#[test]
fn recursive_schema_roundtrip() {
    let (schema, node) = list_schema();
    let record = chain(10);
    let codec = ValueCodec::new(&schema);
    let bytes = codec.encode_record(node, &record).unwrap();
    assert_eq!(codec.decode_record(&mut bytes.as_slice(), node).unwrap(), record);
}

#[test]
fn recursive_decode_hits_depth_limit() {
    let (schema, node) = list_schema();
    // An endless chain of `label = "", next = some(...)`.
    let bytes = [0x00u8, 0x01].repeat(1000);
    let err = ValueCodec::new(&schema)
        .max_depth(16)
        .decode_record(&mut bytes.as_slice(), node)
        .unwrap_err();
    assert!(matches!(err.root_cause(), Error::SchemaDepthExceeded { limit: 16 }));
}

#[test]
fn recursive_encode_hits_depth_limit() {
    let (schema, node) = list_schema();
    let record = chain(100);
    let err = ValueCodec::new(&schema).encode_record(node, &record).unwrap_err();
    assert!(matches!(err.root_cause(), Error::SchemaDepthExceeded { limit: 64 }));
}

// Schema

#[test]
fn schema_rejects_undefined_record() {
    let mut builder = Schema::builder();
    builder.declare("ghost");
    assert!(matches!(builder.build(), Err(Error::UndefinedRecord(name)) if name == "ghost"));
}

#[test]
fn schema_rejects_duplicate_fields() {
    let mut builder = Schema::builder();
    builder.record("dup", [("a", Kind::U32), ("a", Kind::String)]);
    assert!(matches!(builder.build(), Err(Error::DuplicateField { .. })));
}

#[test]
fn schema_rejects_foreign_record_ids() {
    let mut other = Schema::builder();
    other.record("a", [("x", Kind::U32)]);
    let foreign = other.record("b", [("x", Kind::U32)]);

    let mut builder = Schema::builder();
    builder.record("c", [("x", Kind::Record(foreign))]);
    assert!(matches!(builder.build(), Err(Error::UnknownRecord(1))));
}

#[test]
fn schema_lookup_and_describe() {
    let (schema, node) = list_schema();
    assert_eq!(schema.lookup("node"), Some(node));
    assert_eq!(schema.lookup("missing"), None);
    assert_eq!(
        schema.describe(&Kind::list(Kind::option(Kind::Record(node)))),
        "list<option<record `node`>>"
    );
}

// Diagnostics

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Diagnostics for Recorder {
    fn field(&self, phase: Phase, record: &str, field: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("{} {record}.{field}", phase.as_str()));
    }

    fn failed(&self, phase: Phase, record: &str, field: &str, error: &Error) {
        self.events
            .lock()
            .unwrap()
            .push(format!("{} failed {record}.{field}: {error}", phase.as_str()));
    }
}

#[test]
fn diagnostics_hook_observes_fields() {
    let (schema, data) = data_schema();
    let recorder = Recorder::default();
    let codec = ValueCodec::new(&schema).diagnostics(&recorder);

    let record = Record::new().with("name", "x").with("count", 1u32);
    let bytes = codec.encode_record(data, &record).unwrap();
    codec.decode_record(&mut bytes.as_slice(), data).unwrap();

    assert_eq!(
        *recorder.events.lock().unwrap(),
        [
            "encode data.name",
            "encode data.count",
            "decode data.name",
            "decode data.count",
        ]
    );
}

#[test]
fn diagnostics_failure_reports_innermost_cause() {
    let mut builder = Schema::builder();
    let inner = builder.record("inner", [("label", Kind::String)]);
    let outer = builder.record("outer", [("inner", Kind::Record(inner))]);
    let schema = builder.build().unwrap();
    let recorder = Recorder::default();
    let codec = ValueCodec::new(&schema).diagnostics(&recorder);

    // Claims a five-byte label, carries one.
    let err = codec.decode_record(&mut slice(&[0x05, b'a']), outer).unwrap_err();
    assert_eq!(err.field_path(), "inner.label");

    assert_eq!(
        *recorder.events.lock().unwrap(),
        [
            "decode outer.inner",
            "decode inner.label",
            "decode failed inner.label: unexpected end of stream",
            "decode failed outer.inner: unexpected end of stream",
        ]
    );
}

// Resource bounds on hostile input

/// Schema with an empty record and a record holding only that one.
fn empty_schema() -> (SchemaBuilder, RecordId, RecordId) {
    let mut builder = Schema::builder();
    let empty = builder.record("empty", Vec::<(String, Kind)>::new());
    let wrapper = builder.record("wrapper", [("inner", Kind::Record(empty))]);
    (builder, empty, wrapper)
}

#[test]
fn schema_rejects_list_of_zero_sized_records() {
    let (mut builder, _, wrapper) = empty_schema();
    builder.record("holder", [("items", Kind::list(Kind::Record(wrapper)))]);
    let err = builder.build().unwrap_err();
    assert_eq!(err.field_path(), "items");
    assert!(matches!(err.root_cause(), Error::ZeroSizedItems(kind) if kind == "record `wrapper`"));
}

#[test]
fn schema_rejects_list_of_zero_sized_cycle() {
    let mut builder = Schema::builder();
    let a = builder.declare("a");
    let b = builder.declare("b");
    builder.define(a, [("b", Kind::option(Kind::Record(b)))]).unwrap();
    builder.define(b, [("a", Kind::Record(a))]).unwrap();
    let loop_id = builder.declare("loop");
    builder.define(loop_id, [("next", Kind::Record(loop_id))]).unwrap();
    let schema = builder.build().unwrap();

    // `a` carries an option byte, so lists of it are fine.
    assert!(!schema.is_zero_sized(&Kind::Record(a)));
    assert!(!schema.is_zero_sized(&Kind::Record(b)));
    assert!(schema.is_zero_sized(&Kind::Record(loop_id)));
    assert!(schema.check(&Kind::list(Kind::Record(a))).is_ok());
    assert!(matches!(
        schema.check(&Kind::list(Kind::Record(loop_id))),
        Err(Error::ZeroSizedItems(_))
    ));
}

#[test]
fn hostile_list_count_of_zero_sized_items_is_rejected() {
    let (builder, empty, _) = empty_schema();
    let schema = builder.build().unwrap();
    let codec = ValueCodec::new(&schema);
    let kind = Kind::list(Kind::Record(empty));

    // Four bytes claiming 2^28 items that occupy nothing.
    let bytes = varint::encode(1 << 28);
    let err = codec.decode(&mut bytes.as_slice(), &kind).unwrap_err();
    assert!(matches!(err, Error::ZeroSizedItems(_)));

    let value = Value::List(vec![Value::Record(Record::new())]);
    assert!(matches!(codec.encode(&kind, &value), Err(Error::ZeroSizedItems(_))));
}

#[test]
fn hostile_list_count_stops_at_end_of_input() {
    let schema = Schema::builder().build().unwrap();
    let codec = ValueCodec::new(&schema);

    // u32::MAX items claimed, two present.
    let mut bytes = varint::encode(u32::MAX);
    bytes.extend([0x01, 0x02]);
    let err = codec.decode(&mut bytes.as_slice(), &Kind::list(Kind::U32)).unwrap_err();
    assert!(matches!(err, Error::UnexpectedEndOfStream));
}
