//! The type engine: registry plus the algorithms that use it.
//!
//! One engine is built at process start, transformers are registered during
//! setup, and the engine is only read afterwards. Registration goes through
//! `&mut self`, so the single-writer phase is enforced at compile time;
//! shared read access happens behind an `Arc` once wiring is done.

use crate::context::TransformContext;
use crate::error::TransformError;
use crate::literal::Literal;
use crate::native::{EnumType, NativeType, NativeValue, RecordType, TypeKey};
use crate::transformer::Transformer;
use crate::types::{LiteralType, SimpleType, TypeKind};
use indexmap::{IndexMap, IndexSet};
use std::sync::Arc;
use tracing::debug;

/// Process-wide registry mapping type kinds to transformers.
pub struct TypeEngine {
    transformers: IndexMap<TypeKey, Arc<dyn Transformer>>,
    no_fallback: IndexSet<TypeKey>,
}

impl Default for TypeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeEngine {
    /// Create an empty engine.
    ///
    /// Blob-backed kinds refuse the opaque fallback out of the box: a
    /// missing file/dataset handler means a missing registration, and
    /// silently persisting an opaque payload instead would hide that.
    pub fn new() -> Self {
        let mut no_fallback = IndexSet::new();
        no_fallback.insert(TypeKey::File);
        no_fallback.insert(TypeKey::Path);
        no_fallback.insert(TypeKey::Directory);
        no_fallback.insert(TypeKey::Schema);
        no_fallback.insert(TypeKey::Dataset);
        Self {
            transformers: IndexMap::new(),
            no_fallback,
        }
    }

    /// Register a transformer under its declared key.
    pub fn register(&mut self, transformer: Arc<dyn Transformer>) -> Result<(), TransformError> {
        self.register_with(transformer, &[], false)
    }

    /// Register a transformer under its declared key plus aliases.
    ///
    /// Without `overwrite`, colliding with an existing entry is an error so
    /// precedence never changes silently.
    pub fn register_with(
        &mut self,
        transformer: Arc<dyn Transformer>,
        additional: &[TypeKey],
        overwrite: bool,
    ) -> Result<(), TransformError> {
        let mut keys = vec![transformer.key()];
        keys.extend(additional.iter().cloned());
        for key in &keys {
            if !overwrite && self.transformers.contains_key(key) {
                return Err(TransformError::AlreadyRegistered(key.to_string()));
            }
        }
        for key in keys {
            debug!(name = transformer.name(), key = %key, "registering transformer");
            self.transformers.insert(key, Arc::clone(&transformer));
        }
        Ok(())
    }

    /// Mark a key as "must be explicit": the opaque fallback will never be
    /// used for it.
    pub fn forbid_fallback(&mut self, key: TypeKey) {
        self.no_fallback.insert(key);
    }

    pub fn len(&self) -> usize {
        self.transformers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }

    /// Resolve the transformer for a native type.
    ///
    /// Priority order: exact key match (including plugin kinds), then the
    /// container keys (`list`/`map`/`union` entries recurse through their
    /// element types), then the structural record entry, and only then the
    /// opaque fallback — never for keys marked explicit.
    pub fn transformer_for(
        &self,
        t: &NativeType,
    ) -> Result<Arc<dyn Transformer>, TransformError> {
        let (base, _) = t.strip_annotation();
        let key = base.key();
        if let Some(found) = self.transformers.get(&key) {
            return Ok(Arc::clone(found));
        }
        if !self.no_fallback.contains(&key) {
            if let Some(fallback) = self.transformers.get(&TypeKey::Opaque) {
                debug!(declared = %base, "no exact transformer, using opaque fallback");
                return Ok(Arc::clone(fallback));
            }
        }
        Err(TransformError::NoTransformer(base.to_string()))
    }

    /// The literal type for a native type.
    ///
    /// Annotation wrappers are transparent for typing: their data lands in
    /// the literal type's annotation blob and their description in metadata,
    /// while the hash method stays host-side only.
    pub fn literal_type_of(&self, t: &NativeType) -> Result<LiteralType, TransformError> {
        let (base, annotation) = t.strip_annotation();
        let transformer = self.transformer_for(base)?;
        let mut lt = transformer.literal_type(self, base)?;
        if let Some(annotation) = annotation {
            for (k, v) in &annotation.data {
                lt.annotation.insert(k.clone(), v.clone());
            }
            if let Some(description) = &annotation.description {
                lt.metadata
                    .insert("description".into(), description.clone().into());
            }
        }
        Ok(lt)
    }

    /// Encode a value of a declared type into a literal.
    ///
    /// The runtime value is checked against the declared type before any
    /// transformer work, and a hash method attached to the type stamps the
    /// resulting literal's fingerprint.
    pub fn to_literal(
        &self,
        ctx: &TransformContext,
        value: &NativeValue,
        declared: &NativeType,
        expected: &LiteralType,
    ) -> Result<Literal, TransformError> {
        let (base, annotation) = declared.strip_annotation();
        let transformer = self.transformer_for(base)?;
        if !transformer.check_value(base, value) {
            return Err(TransformError::mismatch(base, value.kind_name()));
        }
        let mut literal = transformer.to_literal(self, ctx, value, base, expected)?;
        if let Some(hash) = annotation.and_then(|a| a.hash.as_ref()) {
            literal.hash = Some(hash.apply(value));
        }
        Ok(literal)
    }

    /// Decode a literal back into a value of the declared type.
    pub fn to_native(
        &self,
        ctx: &TransformContext,
        literal: &Literal,
        declared: &NativeType,
    ) -> Result<NativeValue, TransformError> {
        let (base, _) = declared.strip_annotation();
        let transformer = self.transformer_for(base)?;
        transformer.to_native(self, ctx, literal, base)
    }

    /// Best-effort reverse mapping from a literal type to a native type.
    ///
    /// Containers recurse structurally; leaf kinds are offered to every
    /// registered transformer in registration order.
    pub fn guess_native_type(&self, lt: &LiteralType) -> Result<NativeType, TransformError> {
        match &lt.kind {
            TypeKind::Collection(element) => {
                Ok(NativeType::list(self.guess_native_type(element)?))
            }
            TypeKind::Map(value) => Ok(NativeType::map_of(self.guess_native_type(value)?)),
            TypeKind::Union(variants) => {
                let mut members = Vec::new();
                let mut nullable = false;
                for variant in variants {
                    if variant.kind == TypeKind::Simple(SimpleType::None) {
                        nullable = true;
                    } else {
                        members.push(self.guess_native_type(variant)?);
                    }
                }
                match (members.len(), nullable) {
                    (1, true) => Ok(NativeType::optional(members.remove(0))),
                    (_, true) => {
                        let inner = NativeType::union(members);
                        Ok(NativeType::optional(inner))
                    }
                    _ => Ok(NativeType::union(members)),
                }
            }
            TypeKind::Enum(values) => Ok(NativeType::Enum(EnumType::new("enum", values.clone()))),
            TypeKind::Simple(SimpleType::Struct) => self.guess_record(lt),
            _ => {
                for transformer in self.transformers.values() {
                    if let Some(guessed) = transformer.guess_native_type(lt) {
                        return Ok(guessed);
                    }
                }
                Err(TransformError::NoTransformer(format!(
                    "no reverse mapping for {:?}",
                    lt.kind
                )))
            }
        }
    }

    /// Struct literal types carry their record layout in metadata; when
    /// present, rebuild the record type from it.
    fn guess_record(&self, lt: &LiteralType) -> Result<NativeType, TransformError> {
        let Some(record_meta) = lt.metadata.get("record") else {
            // An anonymous struct guesses back to the opaque kind.
            return Ok(NativeType::Opaque {
                type_name: "struct".into(),
            });
        };
        let name = record_meta
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("record");
        let mut record = RecordType::new(name);
        if let Some(fields) = record_meta.get("fields").and_then(|v| v.as_object()) {
            for (field, field_lt) in fields {
                let parsed: LiteralType = serde_json::from_value(field_lt.clone())
                    .map_err(|e| TransformError::Wire(format!("bad record metadata: {e}")))?;
                record
                    .fields
                    .insert(field.clone(), self.guess_native_type(&parsed)?);
            }
        }
        Ok(NativeType::Record(record))
    }
}
