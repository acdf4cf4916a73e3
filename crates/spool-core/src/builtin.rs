//! Built-in transformers: primitives, enums, containers, unions, and the
//! opaque fallback.

use crate::context::TransformContext;
use crate::engine::TypeEngine;
use crate::error::TransformError;
use crate::literal::{Blob, Literal, LiteralValue, Primitive, Scalar, UnionCase};
use crate::native::{NativeType, NativeValue, OpaqueValue, TypeKey, matches_type};
use crate::storage::StorageError;
use crate::transformer::Transformer;
use crate::types::{BlobType, LiteralType, SimpleType, TypeKind};
use indexmap::IndexMap;
use std::fs;
use std::path::Path;

/// Blob format tag used by the opaque fallback.
pub const OPAQUE_FORMAT: &str = "bincode";

/// Primitive kinds handled by [`PrimitiveTransformer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    Bool,
    Int,
    Float,
    Str,
    Datetime,
    Duration,
}

impl PrimitiveKind {
    pub fn all() -> [PrimitiveKind; 6] {
        [
            PrimitiveKind::Bool,
            PrimitiveKind::Int,
            PrimitiveKind::Float,
            PrimitiveKind::Str,
            PrimitiveKind::Datetime,
            PrimitiveKind::Duration,
        ]
    }

    fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Str => "str",
            PrimitiveKind::Datetime => "datetime",
            PrimitiveKind::Duration => "duration",
        }
    }

    fn key(self) -> TypeKey {
        match self {
            PrimitiveKind::Bool => TypeKey::Bool,
            PrimitiveKind::Int => TypeKey::Int,
            PrimitiveKind::Float => TypeKey::Float,
            PrimitiveKind::Str => TypeKey::Str,
            PrimitiveKind::Datetime => TypeKey::Datetime,
            PrimitiveKind::Duration => TypeKey::Duration,
        }
    }

    fn simple(self) -> SimpleType {
        match self {
            PrimitiveKind::Bool => SimpleType::Bool,
            PrimitiveKind::Int => SimpleType::Int,
            PrimitiveKind::Float => SimpleType::Float,
            PrimitiveKind::Str => SimpleType::Str,
            PrimitiveKind::Datetime => SimpleType::Datetime,
            PrimitiveKind::Duration => SimpleType::Duration,
        }
    }
}

/// One transformer instance per primitive kind.
pub struct PrimitiveTransformer {
    kind: PrimitiveKind,
}

impl PrimitiveTransformer {
    pub fn new(kind: PrimitiveKind) -> Self {
        Self { kind }
    }
}

impl Transformer for PrimitiveTransformer {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn key(&self) -> TypeKey {
        self.kind.key()
    }

    fn literal_type(
        &self,
        _engine: &TypeEngine,
        _t: &NativeType,
    ) -> Result<LiteralType, TransformError> {
        Ok(LiteralType::simple(self.kind.simple()))
    }

    fn to_literal(
        &self,
        _engine: &TypeEngine,
        _ctx: &TransformContext,
        value: &NativeValue,
        declared: &NativeType,
        _expected: &LiteralType,
    ) -> Result<Literal, TransformError> {
        let primitive = match (self.kind, value) {
            (PrimitiveKind::Bool, NativeValue::Bool(v)) => Primitive::Bool(*v),
            (PrimitiveKind::Int, NativeValue::Int(v)) => Primitive::Int(*v),
            (PrimitiveKind::Float, NativeValue::Float(v)) => Primitive::Float(*v),
            (PrimitiveKind::Str, NativeValue::Str(v)) => Primitive::Str(v.clone()),
            (PrimitiveKind::Datetime, NativeValue::Datetime(v)) => Primitive::Datetime(*v),
            (PrimitiveKind::Duration, NativeValue::Duration(v)) => Primitive::Duration(*v),
            _ => return Err(TransformError::mismatch(declared, value.kind_name())),
        };
        Ok(Literal::scalar(Scalar::Primitive(primitive)))
    }

    fn to_native(
        &self,
        _engine: &TypeEngine,
        _ctx: &TransformContext,
        literal: &Literal,
        declared: &NativeType,
    ) -> Result<NativeValue, TransformError> {
        let Some(Scalar::Primitive(primitive)) = literal.as_scalar() else {
            return Err(TransformError::mismatch(declared, "non-primitive literal"));
        };
        match (self.kind, primitive) {
            (PrimitiveKind::Bool, Primitive::Bool(v)) => Ok(NativeValue::Bool(*v)),
            (PrimitiveKind::Int, Primitive::Int(v)) => Ok(NativeValue::Int(*v)),
            (PrimitiveKind::Float, Primitive::Float(v)) => Ok(NativeValue::Float(*v)),
            (PrimitiveKind::Str, Primitive::Str(v)) => Ok(NativeValue::Str(v.clone())),
            (PrimitiveKind::Datetime, Primitive::Datetime(v)) => Ok(NativeValue::Datetime(*v)),
            (PrimitiveKind::Duration, Primitive::Duration(v)) => Ok(NativeValue::Duration(*v)),
            (_, other) => Err(TransformError::mismatch(declared, format!("{other:?}"))),
        }
    }

    fn guess_native_type(&self, literal_type: &LiteralType) -> Option<NativeType> {
        if literal_type.kind == TypeKind::Simple(self.kind.simple()) {
            Some(match self.kind {
                PrimitiveKind::Bool => NativeType::Bool,
                PrimitiveKind::Int => NativeType::Int,
                PrimitiveKind::Float => NativeType::Float,
                PrimitiveKind::Str => NativeType::Str,
                PrimitiveKind::Datetime => NativeType::Datetime,
                PrimitiveKind::Duration => NativeType::Duration,
            })
        } else {
            None
        }
    }
}

/// Enums encode as their string value; membership is validated both ways.
pub struct EnumTransformer;

impl Transformer for EnumTransformer {
    fn name(&self) -> &str {
        "enum"
    }

    fn key(&self) -> TypeKey {
        TypeKey::Enum
    }

    fn literal_type(
        &self,
        _engine: &TypeEngine,
        t: &NativeType,
    ) -> Result<LiteralType, TransformError> {
        let NativeType::Enum(e) = t else {
            return Err(TransformError::mismatch("enum", t));
        };
        if e.values.is_empty() {
            return Err(TransformError::InvalidValue(format!(
                "enum {} has no values",
                e.name
            )));
        }
        Ok(LiteralType::enumeration(e.values.clone()))
    }

    fn to_literal(
        &self,
        _engine: &TypeEngine,
        _ctx: &TransformContext,
        value: &NativeValue,
        declared: &NativeType,
        _expected: &LiteralType,
    ) -> Result<Literal, TransformError> {
        let (NativeType::Enum(e), NativeValue::Str(s)) = (declared, value) else {
            return Err(TransformError::mismatch(declared, value.kind_name()));
        };
        if !e.values.iter().any(|v| v == s) {
            return Err(TransformError::InvalidValue(format!(
                "\"{s}\" is not a value of enum {}",
                e.name
            )));
        }
        Ok(Literal::string(s.clone()))
    }

    fn to_native(
        &self,
        _engine: &TypeEngine,
        _ctx: &TransformContext,
        literal: &Literal,
        declared: &NativeType,
    ) -> Result<NativeValue, TransformError> {
        let NativeType::Enum(e) = declared else {
            return Err(TransformError::mismatch("enum", declared));
        };
        let Some(Scalar::Primitive(Primitive::Str(s))) = literal.as_scalar() else {
            return Err(TransformError::mismatch(declared, "non-string literal"));
        };
        if !e.values.iter().any(|v| v == s) {
            return Err(TransformError::InvalidValue(format!(
                "\"{s}\" is not a value of enum {}",
                e.name
            )));
        }
        Ok(NativeValue::Str(s.clone()))
    }

    fn guess_native_type(&self, literal_type: &LiteralType) -> Option<NativeType> {
        match &literal_type.kind {
            TypeKind::Enum(values) => Some(NativeType::Enum(crate::native::EnumType::new(
                "enum",
                values.clone(),
            ))),
            _ => None,
        }
    }
}

/// Homogeneous lists; elements recurse through the engine.
pub struct ListTransformer;

impl ListTransformer {
    fn element<'t>(t: &'t NativeType) -> Result<&'t NativeType, TransformError> {
        match t {
            NativeType::List(element) => Ok(element),
            other => Err(TransformError::mismatch("list", other)),
        }
    }
}

impl Transformer for ListTransformer {
    fn name(&self) -> &str {
        "list"
    }

    fn key(&self) -> TypeKey {
        TypeKey::List
    }

    fn literal_type(
        &self,
        engine: &TypeEngine,
        t: &NativeType,
    ) -> Result<LiteralType, TransformError> {
        let element = Self::element(t)?;
        Ok(LiteralType::collection(engine.literal_type_of(element)?))
    }

    fn to_literal(
        &self,
        engine: &TypeEngine,
        ctx: &TransformContext,
        value: &NativeValue,
        declared: &NativeType,
        expected: &LiteralType,
    ) -> Result<Literal, TransformError> {
        let element = Self::element(declared)?;
        let NativeValue::List(items) = value else {
            return Err(TransformError::mismatch(declared, value.kind_name()));
        };
        let element_lt = match &expected.kind {
            TypeKind::Collection(inner) => (**inner).clone(),
            _ => engine.literal_type_of(element)?,
        };
        let mut literals = Vec::with_capacity(items.len());
        for item in items {
            literals.push(engine.to_literal(ctx, item, element, &element_lt)?);
        }
        Ok(Literal::collection(literals))
    }

    fn to_native(
        &self,
        engine: &TypeEngine,
        ctx: &TransformContext,
        literal: &Literal,
        declared: &NativeType,
    ) -> Result<NativeValue, TransformError> {
        let element = Self::element(declared)?;
        let LiteralValue::Collection(items) = &literal.value else {
            return Err(TransformError::mismatch(declared, "non-collection literal"));
        };
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            values.push(engine.to_native(ctx, item, element)?);
        }
        Ok(NativeValue::List(values))
    }
}

/// String-keyed maps; values recurse through the engine.
pub struct MapTransformer;

impl MapTransformer {
    fn value_type<'t>(t: &'t NativeType) -> Result<&'t NativeType, TransformError> {
        match t {
            NativeType::Map(value) => Ok(value),
            other => Err(TransformError::mismatch("map", other)),
        }
    }
}

impl Transformer for MapTransformer {
    fn name(&self) -> &str {
        "map"
    }

    fn key(&self) -> TypeKey {
        TypeKey::Map
    }

    fn literal_type(
        &self,
        engine: &TypeEngine,
        t: &NativeType,
    ) -> Result<LiteralType, TransformError> {
        let value_type = Self::value_type(t)?;
        Ok(LiteralType::map_of(engine.literal_type_of(value_type)?))
    }

    fn to_literal(
        &self,
        engine: &TypeEngine,
        ctx: &TransformContext,
        value: &NativeValue,
        declared: &NativeType,
        expected: &LiteralType,
    ) -> Result<Literal, TransformError> {
        let value_type = Self::value_type(declared)?;
        let NativeValue::Map(entries) = value else {
            return Err(TransformError::mismatch(declared, value.kind_name()));
        };
        let value_lt = match &expected.kind {
            TypeKind::Map(inner) => (**inner).clone(),
            _ => engine.literal_type_of(value_type)?,
        };
        let mut literals = IndexMap::with_capacity(entries.len());
        for (key, entry) in entries {
            literals.insert(key.clone(), engine.to_literal(ctx, entry, value_type, &value_lt)?);
        }
        Ok(Literal::map(literals))
    }

    fn to_native(
        &self,
        engine: &TypeEngine,
        ctx: &TransformContext,
        literal: &Literal,
        declared: &NativeType,
    ) -> Result<NativeValue, TransformError> {
        let value_type = Self::value_type(declared)?;
        let LiteralValue::Map(entries) = &literal.value else {
            return Err(TransformError::mismatch(declared, "non-map literal"));
        };
        let mut values = IndexMap::with_capacity(entries.len());
        for (key, entry) in entries {
            values.insert(key.clone(), engine.to_native(ctx, entry, value_type)?);
        }
        Ok(NativeValue::Map(values))
    }
}

/// Unions and optionals.
///
/// Encoding tries members in declared order and commits to the first whose
/// runtime check passes; the chosen member's literal type becomes the
/// stored tag. Decoding trusts the tag and never re-probes members.
pub struct UnionTransformer;

impl UnionTransformer {
    /// Declared members plus whether a bare `None` is admitted.
    fn members(t: &NativeType) -> Result<(Vec<&NativeType>, bool), TransformError> {
        match t {
            NativeType::Optional(inner) => Ok((vec![inner.as_ref()], true)),
            NativeType::Union(members) => Ok((members.iter().collect(), false)),
            other => Err(TransformError::mismatch("union", other)),
        }
    }
}

impl Transformer for UnionTransformer {
    fn name(&self) -> &str {
        "union"
    }

    fn key(&self) -> TypeKey {
        TypeKey::Union
    }

    fn literal_type(
        &self,
        engine: &TypeEngine,
        t: &NativeType,
    ) -> Result<LiteralType, TransformError> {
        let (members, nullable) = Self::members(t)?;
        let mut variants = Vec::with_capacity(members.len() + usize::from(nullable));
        for member in members {
            variants.push(engine.literal_type_of(member)?);
        }
        if nullable {
            variants.push(LiteralType::none());
        }
        Ok(LiteralType::union(variants))
    }

    fn to_literal(
        &self,
        engine: &TypeEngine,
        ctx: &TransformContext,
        value: &NativeValue,
        declared: &NativeType,
        _expected: &LiteralType,
    ) -> Result<Literal, TransformError> {
        let (members, nullable) = Self::members(declared)?;
        if matches!(value, NativeValue::None) {
            if nullable {
                return Ok(Literal::scalar(Scalar::Union(Box::new(UnionCase {
                    tag: LiteralType::none(),
                    value: Literal::none(),
                }))));
            }
            return Err(TransformError::InvalidValue(format!(
                "none is not admitted by {declared}"
            )));
        }
        for member in members {
            if matches_type(member, value) {
                let tag = engine.literal_type_of(member)?;
                let inner = engine.to_literal(ctx, value, member, &tag)?;
                return Ok(Literal::scalar(Scalar::Union(Box::new(UnionCase {
                    tag,
                    value: inner,
                }))));
            }
        }
        Err(TransformError::mismatch(declared, value.kind_name()))
    }

    fn to_native(
        &self,
        engine: &TypeEngine,
        ctx: &TransformContext,
        literal: &Literal,
        declared: &NativeType,
    ) -> Result<NativeValue, TransformError> {
        let (members, nullable) = Self::members(declared)?;
        let Some(Scalar::Union(case)) = literal.as_scalar() else {
            return Err(TransformError::mismatch(declared, "non-union literal"));
        };
        if case.tag == LiteralType::none() {
            if nullable {
                return Ok(NativeValue::None);
            }
            return Err(TransformError::mismatch(declared, "none"));
        }
        // The stored tag is authoritative: decode with the member whose
        // literal type matches it.
        for member in members {
            if engine.literal_type_of(member)? == case.tag {
                return Ok(engine.to_native(ctx, &case.value, member)?);
            }
        }
        Err(TransformError::mismatch(
            declared,
            format!("union tagged {:?}", case.tag.kind),
        ))
    }
}

/// The universal fallback: persist any captured value as an opaque blob.
///
/// Lossy by design (the payload round-trips, the type identity does not),
/// and never preferred over a specific registration.
pub struct OpaqueTransformer;

impl OpaqueTransformer {
    fn blob_type() -> BlobType {
        BlobType::single(OPAQUE_FORMAT)
    }
}

impl Transformer for OpaqueTransformer {
    fn name(&self) -> &str {
        "opaque"
    }

    fn key(&self) -> TypeKey {
        TypeKey::Opaque
    }

    fn literal_type(
        &self,
        _engine: &TypeEngine,
        t: &NativeType,
    ) -> Result<LiteralType, TransformError> {
        Ok(LiteralType::blob(Self::blob_type())
            .with_metadata("native_type_name", t.to_string()))
    }

    fn to_literal(
        &self,
        _engine: &TypeEngine,
        ctx: &TransformContext,
        value: &NativeValue,
        declared: &NativeType,
        _expected: &LiteralType,
    ) -> Result<Literal, TransformError> {
        let NativeValue::Opaque(opaque) = value else {
            return Err(TransformError::mismatch(declared, value.kind_name()));
        };
        let bytes = opaque.to_bytes()?;
        let access = ctx.file_access();
        let staged = access.random_local_path();
        write_bytes(&staged, &bytes)?;
        let uri = access.put_raw_data(&staged)?;
        Ok(Literal::scalar(Scalar::Blob(Blob::new(
            uri,
            Self::blob_type(),
        ))))
    }

    fn to_native(
        &self,
        _engine: &TypeEngine,
        ctx: &TransformContext,
        literal: &Literal,
        declared: &NativeType,
    ) -> Result<NativeValue, TransformError> {
        let Some(blob) = literal.as_blob() else {
            return Err(TransformError::mismatch(declared, "non-blob literal"));
        };
        let access = ctx.file_access();
        let local = if access.is_remote(&blob.uri) {
            let staged = access.random_local_path();
            access.get_data(&blob.uri, &staged, false)?;
            staged
        } else {
            blob.uri.clone().into()
        };
        let bytes = fs::read(&local)
            .map_err(|e| StorageError::io(local.display().to_string(), e))?;
        let type_name = match declared {
            NativeType::Opaque { type_name } => type_name.clone(),
            other => other.to_string(),
        };
        Ok(NativeValue::Opaque(OpaqueValue::from_bytes(bytes, type_name)))
    }

    fn guess_native_type(&self, literal_type: &LiteralType) -> Option<NativeType> {
        let blob = literal_type.as_blob()?;
        if blob.format == OPAQUE_FORMAT {
            let type_name = literal_type
                .metadata
                .get("native_type_name")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            Some(NativeType::Opaque {
                type_name: type_name.to_string(),
            })
        } else {
            None
        }
    }

    fn check_value(&self, _declared: &NativeType, value: &NativeValue) -> bool {
        matches!(value, NativeValue::Opaque(_))
    }
}

pub(crate) fn write_bytes(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| StorageError::io(parent.display().to_string(), e))?;
    }
    fs::write(path, bytes).map_err(|e| StorageError::io(path.display().to_string(), e))
}
