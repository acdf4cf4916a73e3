//! Serde-backed record transformers for Spool.
//!
//! Any `Serialize + DeserializeOwned` Rust type can participate in the type
//! engine as a custom kind: values pivot through `serde_json::Value` into
//! generic (struct) scalars, so the wire form stays self-describing without
//! a hand-written [`spool_core::Record`] implementation.

use serde::Serialize;
use serde::de::DeserializeOwned;
use spool_core::context::TransformContext;
use spool_core::engine::TypeEngine;
use spool_core::error::TransformError;
use spool_core::literal::{Literal, Scalar};
use spool_core::native::{NativeType, NativeValue, OpaqueValue, TypeKey};
use spool_core::transformer::Transformer;
use spool_core::types::LiteralType;
use std::marker::PhantomData;
use std::sync::Arc;

/// Transformer adapting one serde-serializable type under a custom kind.
///
/// Values travel as [`NativeValue::Opaque`] wrappers holding the live `T`;
/// [`SerdeRecordTransformer::wrap`] and [`SerdeRecordTransformer::unwrap`]
/// are the ends of that tunnel.
pub struct SerdeRecordTransformer<T> {
    kind: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SerdeRecordTransformer<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            _marker: PhantomData,
        }
    }

    /// The native type declaration for this kind.
    pub fn native_type(&self) -> NativeType {
        NativeType::custom(self.kind.clone())
    }

    pub fn wrap(value: T) -> NativeValue {
        NativeValue::opaque(value)
    }

    pub fn unwrap(value: &NativeValue) -> Result<T, TransformError> {
        match value {
            NativeValue::Opaque(opaque) => opaque.extract(),
            other => Err(TransformError::mismatch(
                std::any::type_name::<T>(),
                other.kind_name(),
            )),
        }
    }

    fn json_of(&self, opaque: &OpaqueValue) -> Result<serde_json::Value, TransformError> {
        match opaque.downcast_ref::<T>() {
            Some(live) => serde_json::to_value(live)
                .map_err(|e| TransformError::Serialization(e.to_string())),
            None => serde_json::to_value(opaque.extract::<T>()?)
                .map_err(|e| TransformError::Serialization(e.to_string())),
        }
    }
}

impl<T> Transformer for SerdeRecordTransformer<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.kind
    }

    fn key(&self) -> TypeKey {
        TypeKey::Custom(self.kind.clone())
    }

    fn literal_type(
        &self,
        _engine: &TypeEngine,
        _t: &NativeType,
    ) -> Result<LiteralType, TransformError> {
        Ok(LiteralType::structure().with_metadata("kind", self.kind.clone()))
    }

    fn to_literal(
        &self,
        _engine: &TypeEngine,
        _ctx: &TransformContext,
        value: &NativeValue,
        declared: &NativeType,
        _expected: &LiteralType,
    ) -> Result<Literal, TransformError> {
        let NativeValue::Opaque(opaque) = value else {
            return Err(TransformError::mismatch(declared, value.kind_name()));
        };
        Ok(Literal::scalar(Scalar::Generic(self.json_of(opaque)?)))
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
        let value: T = serde_json::from_value(json.clone())
            .map_err(|e| TransformError::Serialization(e.to_string()))?;
        Ok(NativeValue::opaque(value))
    }

    fn guess_native_type(&self, literal_type: &LiteralType) -> Option<NativeType> {
        let kind = literal_type.metadata.get("kind")?.as_str()?;
        if kind == self.kind {
            Some(NativeType::custom(self.kind.clone()))
        } else {
            None
        }
    }

    fn check_value(&self, _declared: &NativeType, value: &NativeValue) -> bool {
        // Byte-backed wrappers (from an opaque decode) are admitted too;
        // the serialization layer reports any real mismatch.
        matches!(value, NativeValue::Opaque(_))
    }
}

/// Register `T` under `kind`. The usual plugin entry point.
pub fn register<T>(engine: &mut TypeEngine, kind: impl Into<String>) -> Result<(), TransformError>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    engine.register(Arc::new(SerdeRecordTransformer::<T>::new(kind)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use spool_core::builtin::OpaqueTransformer;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Reading {
        sensor: String,
        values: Vec<f64>,
    }

    fn engine() -> TypeEngine {
        let mut engine = TypeEngine::new();
        register::<Reading>(&mut engine, "reading").unwrap();
        engine.register(Arc::new(OpaqueTransformer)).unwrap();
        engine
    }

    fn ctx() -> (tempfile::TempDir, TransformContext) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = TransformContext::sandbox(dir.path());
        (dir, ctx)
    }

    #[test]
    fn test_roundtrip() {
        let engine = engine();
        let (_dir, ctx) = ctx();
        let t = NativeType::custom("reading");
        let lt = engine.literal_type_of(&t).unwrap();
        assert_eq!(lt, LiteralType::structure());
        assert_eq!(lt.metadata.get("kind").unwrap(), "reading");

        let reading = Reading {
            sensor: "s1".into(),
            values: vec![1.0, 2.5],
        };
        let value = SerdeRecordTransformer::<Reading>::wrap(reading.clone());
        let literal = engine.to_literal(&ctx, &value, &t, &lt).unwrap();

        let back = engine.to_native(&ctx, &literal, &t).unwrap();
        assert_eq!(
            SerdeRecordTransformer::<Reading>::unwrap(&back).unwrap(),
            reading
        );
    }

    #[test]
    fn test_literal_is_self_describing_json() {
        let engine = engine();
        let (_dir, ctx) = ctx();
        let t = NativeType::custom("reading");
        let lt = engine.literal_type_of(&t).unwrap();
        let value = SerdeRecordTransformer::<Reading>::wrap(Reading {
            sensor: "s2".into(),
            values: vec![],
        });
        let literal = engine.to_literal(&ctx, &value, &t, &lt).unwrap();
        let Some(Scalar::Generic(json)) = literal.as_scalar() else {
            panic!("expected generic scalar");
        };
        assert_eq!(json.get("sensor").unwrap(), "s2");
    }

    #[test]
    fn test_registered_kind_beats_fallback() {
        let engine = engine();
        let found = engine
            .transformer_for(&NativeType::custom("reading"))
            .unwrap();
        assert_eq!(found.key(), TypeKey::Custom("reading".into()));
        // Unregistered kinds still degrade to the opaque fallback.
        let other = engine
            .transformer_for(&NativeType::custom("mystery"))
            .unwrap();
        assert_eq!(other.key(), TypeKey::Opaque);
    }

    #[test]
    fn test_guess_by_kind_metadata() {
        let transformer = SerdeRecordTransformer::<Reading>::new("reading");
        let lt = LiteralType::structure().with_metadata("kind", "reading");
        assert_eq!(
            transformer.guess_native_type(&lt),
            Some(NativeType::custom("reading"))
        );
        let other = LiteralType::structure().with_metadata("kind", "other");
        assert!(transformer.guess_native_type(&other).is_none());
    }

    #[test]
    fn test_malformed_payload_fails() {
        let engine = engine();
        let (_dir, ctx) = ctx();
        let t = NativeType::custom("reading");
        let literal = Literal::scalar(Scalar::Generic(serde_json::json!({"sensor": 42})));
        let err = engine.to_native(&ctx, &literal, &t).unwrap_err();
        assert!(matches!(err, TransformError::Serialization(_)));
    }
}
