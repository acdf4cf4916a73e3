//! Cross-crate round trips through the default engines.

use serde::{Deserialize, Serialize};
use spool::{
    DataFile, DatasetColumn, HashMethod, LiteralType, NativeType, NativeValue, Record, RecordType,
    RecordValue, Scalar, SchemaColumnKind, StructuredDataset, StructuredDatasetType, Table,
    TransformContext, TransformError, TypeAnnotation, TypeKey, TypedInterface,
};
use std::sync::Arc;

fn engines() -> (
    tempfile::TempDir,
    TransformContext,
    spool::TypeEngine,
    Arc<spool::DatasetEngine>,
) {
    let dir = tempfile::tempdir().unwrap();
    let ctx = TransformContext::sandbox(dir.path());
    let datasets = Arc::new(spool::default_dataset_engine().unwrap());
    let engine = spool::default_type_engine(Arc::clone(&datasets)).unwrap();
    (dir, ctx, engine, datasets)
}

#[derive(Debug, PartialEq)]
struct Point {
    x: i64,
    y: i64,
}

impl Record for Point {
    fn record_type() -> RecordType {
        RecordType::new("Point")
            .field("x", NativeType::Int)
            .field("y", NativeType::Int)
    }

    fn to_record(&self) -> RecordValue {
        RecordValue::new("Point")
            .field("x", NativeValue::Int(self.x))
            .field("y", NativeValue::Int(self.y))
    }

    fn from_record(record: &RecordValue) -> Result<Self, TransformError> {
        let get = |name: &str| match record.fields.get(name) {
            Some(NativeValue::Int(v)) => Ok(*v),
            _ => Err(TransformError::InvalidValue(format!(
                "Point missing int field {name}"
            ))),
        };
        Ok(Point {
            x: get("x")?,
            y: get("y")?,
        })
    }
}

#[test]
fn point_record_roundtrips_through_struct_literal() {
    let (_dir, ctx, engine, _datasets) = engines();

    let t = Point::native_type();
    let lt = engine.literal_type_of(&t).unwrap();
    assert_eq!(lt, LiteralType::structure());

    let point = Point { x: 1, y: 2 };
    let literal = engine.to_literal(&ctx, &point.to_native(), &t, &lt).unwrap();
    let back = engine.to_native(&ctx, &literal, &t).unwrap();
    assert_eq!(Point::from_native(&back).unwrap(), point);
}

#[test]
fn union_tie_break_is_declaration_order() {
    let (_dir, ctx, engine, _datasets) = engines();

    let t = NativeType::union(vec![NativeType::Int, NativeType::Str]);
    let lt = engine.literal_type_of(&t).unwrap();
    let literal = engine.to_literal(&ctx, &NativeValue::Int(5), &t, &lt).unwrap();

    let Some(Scalar::Union(case)) = literal.as_scalar() else {
        panic!("expected union scalar");
    };
    assert_eq!(case.tag, LiteralType::int());
    assert_eq!(engine.to_native(&ctx, &literal, &t).unwrap(), NativeValue::Int(5));
}

#[test]
fn file_roundtrips_by_content() {
    let (dir, ctx, engine, _datasets) = engines();

    let source = dir.path().join("notes.txt");
    std::fs::write(&source, b"important bytes").unwrap();

    let t = NativeType::file("");
    let lt = engine.literal_type_of(&t).unwrap();
    let value = NativeValue::File(DataFile::new(source.to_string_lossy().into_owned()));
    let literal = engine.to_literal(&ctx, &value, &t, &lt).unwrap();

    let NativeValue::File(decoded) = engine.to_native(&ctx, &literal, &t).unwrap() else {
        panic!("expected file value");
    };
    assert!(!decoded.is_downloaded());
    let local = decoded.download().unwrap();
    assert_eq!(std::fs::read(local).unwrap(), b"important bytes");
}

#[test]
fn dataset_format_negotiation() {
    let (_dir, ctx, engine, datasets) = engines();

    let mut table = Table::new(vec!["id".into(), "name".into()]);
    table
        .push_row(vec![NativeValue::Int(1), NativeValue::Str("ada".into())])
        .unwrap();
    let columns = vec![
        ("id".to_string(), NativeType::Int),
        ("name".to_string(), NativeType::Str),
    ];

    // Omitted format falls back to the frame default.
    let t = NativeType::Dataset {
        columns: columns.clone(),
        format: String::new(),
    };
    let lt = engine.literal_type_of(&t).unwrap();
    let value = NativeValue::Dataset(StructuredDataset::from_frame(table.clone()));
    let literal = engine.to_literal(&ctx, &value, &t, &lt).unwrap();
    assert_eq!(
        literal.as_dataset().unwrap().metadata.dataset_type.format,
        "ndjson"
    );

    // Explicit format is honored and reflected in the literal's metadata.
    let t_csv = NativeType::Dataset {
        columns,
        format: "csv".into(),
    };
    let lt_csv = engine.literal_type_of(&t_csv).unwrap();
    let value = NativeValue::Dataset(StructuredDataset::from_frame(table.clone()));
    let literal_csv = engine.to_literal(&ctx, &value, &t_csv, &lt_csv).unwrap();
    assert_eq!(
        literal_csv.as_dataset().unwrap().metadata.dataset_type.format,
        "csv"
    );

    // Both decode lazily, then materialize to equal tables.
    for literal in [&literal, &literal_csv] {
        let NativeValue::Dataset(handle) = engine.to_native(&ctx, literal, &t_csv).unwrap() else {
            panic!("expected dataset value");
        };
        assert!(handle.frame().is_none());
        let back: Table = handle.materialize(&ctx, &datasets).unwrap();
        assert_eq!(back, table);
    }
}

#[test]
fn dataset_decode_projects_declared_columns() {
    let (_dir, ctx, engine, datasets) = engines();

    let mut table = Table::new(vec!["id".into(), "name".into()]);
    table
        .push_row(vec![NativeValue::Int(7), NativeValue::Str("grace".into())])
        .unwrap();
    let t_full = NativeType::Dataset {
        columns: vec![
            ("id".to_string(), NativeType::Int),
            ("name".to_string(), NativeType::Str),
        ],
        format: String::new(),
    };
    let lt = engine.literal_type_of(&t_full).unwrap();
    let value = NativeValue::Dataset(StructuredDataset::from_frame(table));
    let literal = engine.to_literal(&ctx, &value, &t_full, &lt).unwrap();

    let t_narrow = NativeType::Dataset {
        columns: vec![("name".to_string(), NativeType::Str)],
        format: String::new(),
    };
    let NativeValue::Dataset(handle) = engine.to_native(&ctx, &literal, &t_narrow).unwrap() else {
        panic!("expected dataset value");
    };
    let narrowed: Table = handle.materialize(&ctx, &datasets).unwrap();
    assert_eq!(narrowed.columns(), ["name".to_string()]);
    assert_eq!(narrowed.rows()[0][0], NativeValue::Str("grace".into()));
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Config {
    retries: u32,
    tags: Vec<String>,
}

#[test]
fn serde_record_plugin_registration() {
    let (_dir, ctx, _ignored, datasets) = engines();
    let mut engine = spool::default_type_engine(datasets).unwrap();
    spool::register_serde_record::<Config>(&mut engine, "config").unwrap();

    let t = NativeType::custom("config");
    let lt = engine.literal_type_of(&t).unwrap();
    let config = Config {
        retries: 3,
        tags: vec!["prod".into()],
    };
    let value = spool::SerdeRecordTransformer::<Config>::wrap(config.clone());
    let literal = engine.to_literal(&ctx, &value, &t, &lt).unwrap();
    let back = engine.to_native(&ctx, &literal, &t).unwrap();
    assert_eq!(
        spool::SerdeRecordTransformer::<Config>::unwrap(&back).unwrap(),
        config
    );
}

#[test]
fn forbidden_fallback_names_the_kind() {
    let (_dir, _ctx, mut engine, _datasets) = engines();
    engine.forbid_fallback(TypeKey::Custom("frame".into()));
    let err = engine
        .transformer_for(&NativeType::custom("frame"))
        .unwrap_err();
    match err {
        TransformError::NoTransformer(name) => assert!(name.contains("frame")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn hash_method_drives_cache_fingerprint() {
    let (dir, ctx, engine, _datasets) = engines();

    let source = dir.path().join("model.bin");
    std::fs::write(&source, b"weights").unwrap();

    let t = NativeType::file("").annotated(
        TypeAnnotation::new().hashed(HashMethod::new(|_| "weights-v1".into())),
    );
    let lt = engine.literal_type_of(&t).unwrap();
    let value = NativeValue::File(DataFile::new(source.to_string_lossy().into_owned()));
    let literal = engine.to_literal(&ctx, &value, &t, &lt).unwrap();
    assert_eq!(literal.hash.as_deref(), Some("weights-v1"));
}

#[test]
fn interface_declaration_and_wire_roundtrip() {
    let (_dir, _ctx, engine, _datasets) = engines();

    let interface = TypedInterface::of(
        &engine,
        &[
            ("points", NativeType::list(Point::native_type())),
            ("raw", NativeType::file("csv")),
            (
                "measurements",
                NativeType::Schema(vec![("t".to_string(), SchemaColumnKind::Datetime)]),
            ),
        ],
        &[(
            "result",
            NativeType::Dataset {
                columns: vec![("id".to_string(), NativeType::Int)],
                format: "ndjson".into(),
            },
        )],
    )
    .unwrap();

    let back = TypedInterface::from_idl(&interface.to_idl()).unwrap();
    assert_eq!(interface, back);
}

#[test]
fn literal_wire_bytes_roundtrip() {
    use prost::Message;

    let literal = spool::Literal::collection(vec![
        spool::Literal::int(1),
        spool::Literal::string("two"),
        spool::Literal::scalar(Scalar::Union(Box::new(spool::literal::UnionCase {
            tag: LiteralType::int(),
            value: spool::Literal::int(3),
        }))),
    ])
    .with_hash("deadbeef");

    let bytes = literal.to_idl().encode_to_vec();
    let decoded = spool::idl::Literal::decode(bytes.as_slice()).unwrap();
    assert_eq!(spool::Literal::from_idl(&decoded).unwrap(), literal);
}

#[test]
fn guess_native_type_reverse_inference() {
    let (_dir, _ctx, engine, _datasets) = engines();

    let lt = LiteralType::collection(LiteralType::union(vec![
        LiteralType::int(),
        LiteralType::none(),
    ]));
    assert_eq!(
        engine.guess_native_type(&lt).unwrap(),
        NativeType::list(NativeType::optional(NativeType::Int))
    );

    let dataset_lt = LiteralType::dataset(StructuredDatasetType::new(
        vec![DatasetColumn::new("id", LiteralType::int())],
        "ndjson",
    ));
    assert_eq!(
        engine.guess_native_type(&dataset_lt).unwrap(),
        NativeType::Dataset {
            columns: vec![("id".to_string(), NativeType::Int)],
            format: "ndjson".into(),
        }
    );
}
