//! Records: named field sets encoded as struct literals.
//!
//! Concrete host structs opt in through the [`Record`] capability instead
//! of any runtime probing; the transformer itself works structurally on
//! [`RecordType`] declarations.

use crate::context::TransformContext;
use crate::engine::TypeEngine;
use crate::error::TransformError;
use crate::literal::{Literal, Scalar};
use crate::native::{NativeType, NativeValue, RecordValue, TypeKey};
use crate::transformer::Transformer;
use crate::types::LiteralType;
use serde_json::{Value as JsonValue, json};

pub use crate::native::RecordType;

/// Capability for host structs that participate as records.
///
/// Implementations declare their field schema once and convert to and from
/// the dynamic record form; everything else (literal types, encoding,
/// decoding) is derived from that.
pub trait Record: Sized {
    fn record_type() -> RecordType;

    fn to_record(&self) -> RecordValue;

    fn from_record(record: &RecordValue) -> Result<Self, TransformError>;

    fn native_type() -> NativeType {
        NativeType::Record(Self::record_type())
    }

    fn to_native(&self) -> NativeValue {
        NativeValue::Record(self.to_record())
    }

    fn from_native(value: &NativeValue) -> Result<Self, TransformError> {
        match value {
            NativeValue::Record(record) => Self::from_record(record),
            other => Err(TransformError::mismatch(
                Self::record_type().name,
                other.kind_name(),
            )),
        }
    }
}

/// Structural transformer for any record type.
///
/// Records become generic (struct) scalars; the literal type carries the
/// full field layout in metadata so interfaces stay self-describing.
pub struct RecordTransformer;

impl Transformer for RecordTransformer {
    fn name(&self) -> &str {
        "record"
    }

    fn key(&self) -> TypeKey {
        TypeKey::Record
    }

    fn literal_type(
        &self,
        engine: &TypeEngine,
        t: &NativeType,
    ) -> Result<LiteralType, TransformError> {
        let NativeType::Record(record_type) = t else {
            return Err(TransformError::mismatch("record", t));
        };
        let mut fields = serde_json::Map::new();
        for (field, field_type) in &record_type.fields {
            let field_lt = engine.literal_type_of(field_type)?;
            let encoded = serde_json::to_value(&field_lt)
                .map_err(|e| TransformError::Serialization(e.to_string()))?;
            fields.insert(field.clone(), encoded);
        }
        Ok(LiteralType::structure().with_metadata(
            "record",
            json!({ "name": record_type.name, "fields": JsonValue::Object(fields) }),
        ))
    }

    fn to_literal(
        &self,
        _engine: &TypeEngine,
        _ctx: &TransformContext,
        value: &NativeValue,
        declared: &NativeType,
        _expected: &LiteralType,
    ) -> Result<Literal, TransformError> {
        let NativeValue::Record(_) = value else {
            return Err(TransformError::mismatch(declared, value.kind_name()));
        };
        Ok(Literal::scalar(Scalar::Generic(value.to_json()?)))
    }

    fn to_native(
        &self,
        _engine: &TypeEngine,
        _ctx: &TransformContext,
        literal: &Literal,
        declared: &NativeType,
    ) -> Result<NativeValue, TransformError> {
        let Some(Scalar::Generic(json)) = literal.as_scalar() else {
            return Err(TransformError::mismatch(declared, "non-struct literal"));
        };
        NativeValue::from_json(json, declared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::{PrimitiveKind, PrimitiveTransformer};
    use std::sync::Arc;

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
            let get = |name: &str| -> Result<i64, TransformError> {
                match record.fields.get(name) {
                    Some(NativeValue::Int(v)) => Ok(*v),
                    _ => Err(TransformError::InvalidValue(format!(
                        "Point missing int field {name}"
                    ))),
                }
            };
            Ok(Point {
                x: get("x")?,
                y: get("y")?,
            })
        }
    }

    fn engine() -> TypeEngine {
        let mut engine = TypeEngine::new();
        for kind in PrimitiveKind::all() {
            engine
                .register(Arc::new(PrimitiveTransformer::new(kind)))
                .unwrap();
        }
        engine.register(Arc::new(RecordTransformer)).unwrap();
        engine
    }

    #[test]
    fn test_record_literal_type_carries_fields() {
        let engine = engine();
        let lt = engine.literal_type_of(&Point::native_type()).unwrap();
        assert_eq!(lt, LiteralType::structure());

        let record_meta = lt.metadata.get("record").unwrap();
        assert_eq!(record_meta.get("name").unwrap(), "Point");
        let fields = record_meta.get("fields").unwrap().as_object().unwrap();
        assert!(fields.contains_key("x"));
        assert!(fields.contains_key("y"));
        let x: LiteralType = serde_json::from_value(fields["x"].clone()).unwrap();
        assert_eq!(x, LiteralType::int());
    }

    #[test]
    fn test_record_roundtrip() {
        let engine = engine();
        let dir = tempfile::tempdir().unwrap();
        let ctx = TransformContext::sandbox(dir.path());

        let point = Point { x: 1, y: 2 };
        let t = Point::native_type();
        let lt = engine.literal_type_of(&t).unwrap();
        let lit = engine.to_literal(&ctx, &point.to_native(), &t, &lt).unwrap();

        let back = engine.to_native(&ctx, &lit, &t).unwrap();
        assert_eq!(Point::from_native(&back).unwrap(), point);
    }

    #[test]
    fn test_record_rejects_missing_field() {
        let engine = engine();
        let dir = tempfile::tempdir().unwrap();
        let ctx = TransformContext::sandbox(dir.path());

        let partial = NativeValue::Record(RecordValue::new("Point").field("x", NativeValue::Int(1)));
        let t = Point::native_type();
        let lt = engine.literal_type_of(&t).unwrap();
        let err = engine.to_literal(&ctx, &partial, &t, &lt).unwrap_err();
        assert!(matches!(err, TransformError::TypeMismatch { .. }));
    }

    #[test]
    fn test_engine_guesses_record_from_metadata() {
        let engine = engine();
        let lt = engine.literal_type_of(&Point::native_type()).unwrap();
        let guessed = engine.guess_native_type(&lt).unwrap();
        match guessed {
            NativeType::Record(r) => {
                assert_eq!(r.name, "Point");
                assert_eq!(r.fields.get("x"), Some(&NativeType::Int));
            }
            other => panic!("expected record, got {other}"),
        }
    }
}
