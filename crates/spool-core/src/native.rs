//! Native model: host-side types and values as tagged variants.
//!
//! Host types are described by [`NativeType`] instead of runtime-generated
//! classes; parameterized kinds (a file of format X, a custom frame kind)
//! are plain variants carrying their parameter. [`TypeKey`] is the registry
//! key derived from a type: the base kind plus, for plugins, the custom
//! kind string.

use crate::dataset::StructuredDataset;
use crate::directory::DataDir;
use crate::error::TransformError;
use crate::file::DataFile;
use crate::schema::DataSchema;
use crate::types::SchemaColumnKind;
use indexmap::IndexMap;
use jiff::{SignedDuration, Timestamp};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A record type: a named set of typed fields.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordType {
    pub name: String,
    pub fields: IndexMap<String, NativeType>,
}

impl RecordType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, ty: NativeType) -> Self {
        self.fields.insert(name.into(), ty);
        self
    }
}

/// An enum type: a named, closed set of string values.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    pub name: String,
    pub values: Vec<String>,
}

impl EnumType {
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// A user-declared fingerprint function, used as the cache key for literals
/// whose serialized form is not deterministic.
#[derive(Clone)]
pub struct HashMethod(Arc<dyn Fn(&NativeValue) -> String + Send + Sync>);

impl HashMethod {
    pub fn new(f: impl Fn(&NativeValue) -> String + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn apply(&self, value: &NativeValue) -> String {
        (self.0)(value)
    }
}

impl fmt::Debug for HashMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HashMethod")
    }
}

/// Annotation attached to a type: documentation data, an optional hash
/// method. The function never participates in equality.
#[derive(Debug, Clone, Default)]
pub struct TypeAnnotation {
    pub data: IndexMap<String, JsonValue>,
    pub description: Option<String>,
    pub hash: Option<HashMethod>,
}

impl TypeAnnotation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn hashed(mut self, hash: HashMethod) -> Self {
        self.hash = Some(hash);
        self
    }
}

impl PartialEq for TypeAnnotation {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data && self.description == other.description
    }
}

/// Host-side type description.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeType {
    Bool,
    Int,
    Float,
    Str,
    Datetime,
    Duration,
    List(Box<NativeType>),
    Map(Box<NativeType>),
    Optional(Box<NativeType>),
    Union(Vec<NativeType>),
    Record(RecordType),
    Enum(EnumType),
    /// A single-blob file carrying an optional format tag ("" = any).
    File { format: String },
    /// A plain path: the caller wants no upload/download handling.
    Path,
    /// A multipart blob: a directory prefix of files.
    Directory { format: String },
    /// A column-typed multipart payload.
    Schema(Vec<(String, SchemaColumnKind)>),
    /// A structured dataset request: columns plus storage format.
    Dataset {
        columns: Vec<(String, NativeType)>,
        format: String,
    },
    /// The fallback target: an arbitrary value persisted opaquely.
    Opaque { type_name: String },
    /// A plugin-registered kind.
    Custom { kind: String, format: String },
    Annotated(Box<NativeType>, TypeAnnotation),
}

/// Registry key: the base kind a transformer claims.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKey {
    Bool,
    Int,
    Float,
    Str,
    Datetime,
    Duration,
    List,
    Map,
    Union,
    Record,
    Enum,
    File,
    Path,
    Directory,
    Schema,
    Dataset,
    Opaque,
    Custom(String),
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKey::Custom(kind) => write!(f, "custom kind \"{kind}\""),
            other => write!(f, "{}", format!("{other:?}").to_lowercase()),
        }
    }
}

impl NativeType {
    pub fn list(element: NativeType) -> Self {
        NativeType::List(Box::new(element))
    }

    pub fn map_of(value: NativeType) -> Self {
        NativeType::Map(Box::new(value))
    }

    pub fn optional(inner: NativeType) -> Self {
        NativeType::Optional(Box::new(inner))
    }

    pub fn union(members: Vec<NativeType>) -> Self {
        NativeType::Union(members)
    }

    pub fn file(format: impl Into<String>) -> Self {
        NativeType::File {
            format: format.into(),
        }
    }

    pub fn directory(format: impl Into<String>) -> Self {
        NativeType::Directory {
            format: format.into(),
        }
    }

    pub fn custom(kind: impl Into<String>) -> Self {
        NativeType::Custom {
            kind: kind.into(),
            format: String::new(),
        }
    }

    pub fn annotated(self, annotation: TypeAnnotation) -> Self {
        NativeType::Annotated(Box::new(self), annotation)
    }

    /// The registry key for this type. Annotations are transparent and
    /// `Optional` resolves through the union machinery.
    pub fn key(&self) -> TypeKey {
        match self {
            NativeType::Bool => TypeKey::Bool,
            NativeType::Int => TypeKey::Int,
            NativeType::Float => TypeKey::Float,
            NativeType::Str => TypeKey::Str,
            NativeType::Datetime => TypeKey::Datetime,
            NativeType::Duration => TypeKey::Duration,
            NativeType::List(_) => TypeKey::List,
            NativeType::Map(_) => TypeKey::Map,
            NativeType::Optional(_) | NativeType::Union(_) => TypeKey::Union,
            NativeType::Record(_) => TypeKey::Record,
            NativeType::Enum(_) => TypeKey::Enum,
            NativeType::File { .. } => TypeKey::File,
            NativeType::Path => TypeKey::Path,
            NativeType::Directory { .. } => TypeKey::Directory,
            NativeType::Schema(_) => TypeKey::Schema,
            NativeType::Dataset { .. } => TypeKey::Dataset,
            NativeType::Opaque { .. } => TypeKey::Opaque,
            NativeType::Custom { kind, .. } => TypeKey::Custom(kind.clone()),
            NativeType::Annotated(inner, _) => inner.key(),
        }
    }

    /// Strip annotation wrappers, returning the base type and the outermost
    /// annotation if any.
    pub fn strip_annotation(&self) -> (&NativeType, Option<&TypeAnnotation>) {
        let mut current = self;
        let mut annotation = None;
        while let NativeType::Annotated(inner, ann) = current {
            if annotation.is_none() {
                annotation = Some(ann);
            }
            current = inner;
        }
        (current, annotation)
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeType::Bool => write!(f, "bool"),
            NativeType::Int => write!(f, "int"),
            NativeType::Float => write!(f, "float"),
            NativeType::Str => write!(f, "str"),
            NativeType::Datetime => write!(f, "datetime"),
            NativeType::Duration => write!(f, "duration"),
            NativeType::List(e) => write!(f, "list<{e}>"),
            NativeType::Map(v) => write!(f, "map<str, {v}>"),
            NativeType::Optional(t) => write!(f, "optional<{t}>"),
            NativeType::Union(members) => {
                write!(f, "union<")?;
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{m}")?;
                }
                write!(f, ">")
            }
            NativeType::Record(r) => write!(f, "record {}", r.name),
            NativeType::Enum(e) => write!(f, "enum {}", e.name),
            NativeType::File { format } if format.is_empty() => write!(f, "file"),
            NativeType::File { format } => write!(f, "file[{format}]"),
            NativeType::Path => write!(f, "path"),
            NativeType::Directory { format } if format.is_empty() => write!(f, "directory"),
            NativeType::Directory { format } => write!(f, "directory[{format}]"),
            NativeType::Schema(_) => write!(f, "schema"),
            NativeType::Dataset { format, .. } if format.is_empty() => {
                write!(f, "dataset")
            }
            NativeType::Dataset { format, .. } => write!(f, "dataset[{format}]"),
            NativeType::Opaque { type_name } => write!(f, "opaque({type_name})"),
            NativeType::Custom { kind, format } if format.is_empty() => write!(f, "{kind}"),
            NativeType::Custom { kind, format } => write!(f, "{kind}[{format}]"),
            NativeType::Annotated(inner, _) => write!(f, "{inner}"),
        }
    }
}

/// A host value captured for opaque (fallback) encoding.
///
/// `new` captures any serde-serializable value together with its byte
/// serializer; decoded literals come back as raw bytes and rehydrate via
/// [`OpaqueValue::extract`].
#[derive(Clone)]
pub struct OpaqueValue {
    payload: OpaquePayload,
    type_name: String,
}

#[derive(Clone)]
enum OpaquePayload {
    Live {
        value: Arc<dyn Any + Send + Sync>,
        encode: Arc<dyn Fn() -> Result<Vec<u8>, String> + Send + Sync>,
    },
    Bytes(Arc<Vec<u8>>),
}

impl OpaqueValue {
    pub fn new<T: Serialize + Send + Sync + 'static>(value: T) -> Self {
        let value = Arc::new(value);
        let for_encode = Arc::clone(&value);
        let encode = Arc::new(move || {
            bincode::serde::encode_to_vec(&*for_encode, bincode::config::standard())
                .map_err(|e| e.to_string())
        });
        Self {
            payload: OpaquePayload::Live {
                value,
                encode,
            },
            type_name: std::any::type_name::<T>().to_string(),
        }
    }

    pub fn from_bytes(bytes: Vec<u8>, type_name: impl Into<String>) -> Self {
        Self {
            payload: OpaquePayload::Bytes(Arc::new(bytes)),
            type_name: type_name.into(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The serialized payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TransformError> {
        match &self.payload {
            OpaquePayload::Live { encode, .. } => {
                encode().map_err(TransformError::Serialization)
            }
            OpaquePayload::Bytes(bytes) => Ok(bytes.as_ref().clone()),
        }
    }

    /// Borrow the live value, if this instance was constructed locally.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        match &self.payload {
            OpaquePayload::Live { value, .. } => value.downcast_ref(),
            OpaquePayload::Bytes(_) => None,
        }
    }

    /// Rehydrate the payload as `T`, whether live or byte-backed.
    pub fn extract<T: DeserializeOwned>(&self) -> Result<T, TransformError> {
        let bytes = self.to_bytes()?;
        let (value, _) = bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
            .map_err(|e| TransformError::Serialization(e.to_string()))?;
        Ok(value)
    }
}

impl fmt::Debug for OpaqueValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpaqueValue({})", self.type_name)
    }
}

impl PartialEq for OpaqueValue {
    fn eq(&self, other: &Self) -> bool {
        match (&self.payload, &other.payload) {
            (OpaquePayload::Live { value: a, .. }, OpaquePayload::Live { value: b, .. }) => {
                Arc::ptr_eq(a, b)
            }
            (OpaquePayload::Bytes(a), OpaquePayload::Bytes(b)) => a == b,
            _ => false,
        }
    }
}

/// A record value: named fields in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordValue {
    pub name: String,
    pub fields: IndexMap<String, NativeValue>,
}

impl RecordValue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: NativeValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }
}

/// Host-side value.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Datetime(Timestamp),
    Duration(SignedDuration),
    List(Vec<NativeValue>),
    Map(IndexMap<String, NativeValue>),
    Record(RecordValue),
    File(DataFile),
    Directory(DataDir),
    Schema(DataSchema),
    Dataset(StructuredDataset),
    Opaque(OpaqueValue),
}

impl NativeValue {
    /// Short name of the value's kind, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            NativeValue::None => "none",
            NativeValue::Bool(_) => "bool",
            NativeValue::Int(_) => "int",
            NativeValue::Float(_) => "float",
            NativeValue::Str(_) => "str",
            NativeValue::Datetime(_) => "datetime",
            NativeValue::Duration(_) => "duration",
            NativeValue::List(_) => "list",
            NativeValue::Map(_) => "map",
            NativeValue::Record(_) => "record",
            NativeValue::File(_) => "file",
            NativeValue::Directory(_) => "directory",
            NativeValue::Schema(_) => "schema",
            NativeValue::Dataset(_) => "dataset",
            NativeValue::Opaque(_) => "opaque",
        }
    }

    /// Wrap any serde-serializable host value for opaque handling.
    pub fn opaque<T: Serialize + Send + Sync + 'static>(value: T) -> Self {
        NativeValue::Opaque(OpaqueValue::new(value))
    }

    /// JSON projection for struct-backed encodings. Only value kinds with a
    /// stable textual form are representable; blob-backed values are not.
    pub fn to_json(&self) -> Result<JsonValue, TransformError> {
        Ok(match self {
            NativeValue::None => JsonValue::Null,
            NativeValue::Bool(b) => JsonValue::Bool(*b),
            NativeValue::Int(v) => JsonValue::from(*v),
            NativeValue::Float(v) => JsonValue::from(*v),
            NativeValue::Str(s) => JsonValue::String(s.clone()),
            NativeValue::Datetime(ts) => JsonValue::String(ts.to_string()),
            NativeValue::Duration(d) => JsonValue::String(d.to_string()),
            NativeValue::List(items) => JsonValue::Array(
                items
                    .iter()
                    .map(NativeValue::to_json)
                    .collect::<Result<_, _>>()?,
            ),
            NativeValue::Map(entries) => JsonValue::Object(
                entries
                    .iter()
                    .map(|(k, v)| v.to_json().map(|j| (k.clone(), j)))
                    .collect::<Result<_, _>>()?,
            ),
            NativeValue::Record(record) => JsonValue::Object(
                record
                    .fields
                    .iter()
                    .map(|(k, v)| v.to_json().map(|j| (k.clone(), j)))
                    .collect::<Result<_, _>>()?,
            ),
            other => {
                return Err(TransformError::InvalidValue(format!(
                    "{} values have no JSON form",
                    other.kind_name()
                )));
            }
        })
    }

    /// Typed reconstruction from a JSON projection.
    pub fn from_json(value: &JsonValue, expected: &NativeType) -> Result<Self, TransformError> {
        let (expected, _) = expected.strip_annotation();
        match (expected, value) {
            (_, JsonValue::Null) => Ok(NativeValue::None),
            (NativeType::Bool, JsonValue::Bool(b)) => Ok(NativeValue::Bool(*b)),
            (NativeType::Int, JsonValue::Number(n)) => n
                .as_i64()
                .map(NativeValue::Int)
                .ok_or_else(|| TransformError::InvalidValue(format!("not an int: {n}"))),
            (NativeType::Float, JsonValue::Number(n)) => n
                .as_f64()
                .map(NativeValue::Float)
                .ok_or_else(|| TransformError::InvalidValue(format!("not a float: {n}"))),
            (NativeType::Str, JsonValue::String(s)) => Ok(NativeValue::Str(s.clone())),
            (NativeType::Datetime, JsonValue::String(s)) => s
                .parse::<Timestamp>()
                .map(NativeValue::Datetime)
                .map_err(|e| TransformError::InvalidValue(format!("bad datetime: {e}"))),
            (NativeType::Duration, JsonValue::String(s)) => s
                .parse::<SignedDuration>()
                .map(NativeValue::Duration)
                .map_err(|e| TransformError::InvalidValue(format!("bad duration: {e}"))),
            (NativeType::Optional(inner), v) => NativeValue::from_json(v, inner),
            (NativeType::List(element), JsonValue::Array(items)) => Ok(NativeValue::List(
                items
                    .iter()
                    .map(|v| NativeValue::from_json(v, element))
                    .collect::<Result<_, _>>()?,
            )),
            (NativeType::Map(value_type), JsonValue::Object(entries)) => Ok(NativeValue::Map(
                entries
                    .iter()
                    .map(|(k, v)| NativeValue::from_json(v, value_type).map(|n| (k.clone(), n)))
                    .collect::<Result<_, _>>()?,
            )),
            (NativeType::Record(record_type), JsonValue::Object(entries)) => {
                let mut record = RecordValue::new(record_type.name.clone());
                for (field, field_type) in &record_type.fields {
                    let field_value = entries.get(field).unwrap_or(&JsonValue::Null);
                    record
                        .fields
                        .insert(field.clone(), NativeValue::from_json(field_value, field_type)?);
                }
                Ok(NativeValue::Record(record))
            }
            (expected, found) => Err(TransformError::mismatch(expected, found)),
        }
    }
}

/// Runtime compatibility between a declared type and a value.
///
/// This is the probe union encoding relies on: the first declared member
/// whose check passes wins.
pub fn matches_type(declared: &NativeType, value: &NativeValue) -> bool {
    let (declared, _) = declared.strip_annotation();
    match (declared, value) {
        (NativeType::Bool, NativeValue::Bool(_)) => true,
        (NativeType::Int, NativeValue::Int(_)) => true,
        (NativeType::Float, NativeValue::Float(_)) => true,
        (NativeType::Str, NativeValue::Str(_)) => true,
        (NativeType::Datetime, NativeValue::Datetime(_)) => true,
        (NativeType::Duration, NativeValue::Duration(_)) => true,
        (NativeType::List(element), NativeValue::List(items)) => {
            items.iter().all(|v| matches_type(element, v))
        }
        (NativeType::Map(value_type), NativeValue::Map(entries)) => {
            entries.values().all(|v| matches_type(value_type, v))
        }
        (NativeType::Optional(inner), v) => {
            matches!(v, NativeValue::None) || matches_type(inner, v)
        }
        (NativeType::Union(members), v) => members.iter().any(|m| matches_type(m, v)),
        (NativeType::Record(record_type), NativeValue::Record(record)) => {
            record_type.name == record.name
                && record_type.fields.iter().all(|(name, field_type)| {
                    record
                        .fields
                        .get(name)
                        .is_some_and(|v| matches_type(field_type, v))
                })
        }
        (NativeType::Enum(e), NativeValue::Str(s)) => e.values.iter().any(|v| v == s),
        (NativeType::File { .. }, NativeValue::File(_)) => true,
        (NativeType::File { .. }, NativeValue::Str(_)) => true,
        (NativeType::Path, NativeValue::File(_) | NativeValue::Str(_)) => true,
        (NativeType::Directory { .. }, NativeValue::Directory(_)) => true,
        (NativeType::Directory { .. }, NativeValue::Str(_)) => true,
        (NativeType::Schema(_), NativeValue::Schema(_)) => true,
        (NativeType::Dataset { .. }, NativeValue::Dataset(_)) => true,
        (NativeType::Opaque { .. }, _) => true,
        (NativeType::Custom { .. }, NativeValue::Opaque(_)) => true,
        _ => false,
    }
}
