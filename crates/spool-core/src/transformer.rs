//! The transformer capability: one registered handler per type kind.

use std::fmt;

use crate::context::TransformContext;
use crate::engine::TypeEngine;
use crate::error::TransformError;
use crate::literal::Literal;
use crate::native::{NativeType, NativeValue, TypeKey, matches_type};
use crate::types::LiteralType;

/// A bidirectional converter between native values of one type kind and
/// literals.
///
/// Transformers are registered into a [`TypeEngine`] once, at startup, and
/// only read afterwards. The engine reference is threaded into each call so
/// container transformers can recurse without global state.
pub trait Transformer: Send + Sync {
    /// Human-readable name, used in errors and logs.
    fn name(&self) -> &str;

    /// The registry key this transformer claims.
    fn key(&self) -> TypeKey;

    /// The literal type for a native type of this kind. Fails fast on
    /// malformed or unsupported types, before any value exists.
    fn literal_type(
        &self,
        engine: &TypeEngine,
        t: &NativeType,
    ) -> Result<LiteralType, TransformError>;

    /// Encode a checked value into a literal.
    fn to_literal(
        &self,
        engine: &TypeEngine,
        ctx: &TransformContext,
        value: &NativeValue,
        declared: &NativeType,
        expected: &LiteralType,
    ) -> Result<Literal, TransformError>;

    /// Decode a literal back into a native value.
    fn to_native(
        &self,
        engine: &TypeEngine,
        ctx: &TransformContext,
        literal: &Literal,
        declared: &NativeType,
    ) -> Result<NativeValue, TransformError>;

    /// Best-effort reverse inference from a literal type. Not guaranteed to
    /// round-trip for kinds that are not self-describing.
    fn guess_native_type(&self, literal_type: &LiteralType) -> Option<NativeType> {
        let _ = literal_type;
        None
    }

    /// Runtime compatibility probe between a declared type and a value.
    fn check_value(&self, declared: &NativeType, value: &NativeValue) -> bool {
        matches_type(declared, value)
    }
}

impl fmt::Debug for dyn Transformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transformer").field("name", &self.name()).finish()
    }
}
