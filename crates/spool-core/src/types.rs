//! The literal type model: portable descriptions of value shapes.
//!
//! `LiteralType` is a closed tagged union mirroring the wire IDL. Equality
//! is structural over the kind only; the `metadata` and `annotation` side
//! channels ride along for documentation and UX but never influence
//! equality or transformation.

use crate::error::TransformError;
use crate::idl;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Simple scalar kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimpleType {
    None,
    Bool,
    Int,
    Float,
    Str,
    Datetime,
    Duration,
    Binary,
    Error,
    Struct,
}

/// Whether a blob is a single file or a directory prefix of files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlobDimensionality {
    Single,
    Multipart,
}

/// Shape of an opaque byte payload: a format tag plus dimensionality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobType {
    pub format: String,
    pub dimensionality: BlobDimensionality,
}

impl BlobType {
    pub fn single(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            dimensionality: BlobDimensionality::Single,
        }
    }

    pub fn multipart(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            dimensionality: BlobDimensionality::Multipart,
        }
    }
}

/// Column kinds a schema can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaColumnKind {
    Int,
    Float,
    Str,
    Bool,
    Datetime,
    Duration,
}

/// A named, typed schema column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaColumn {
    pub name: String,
    pub kind: SchemaColumnKind,
}

impl SchemaColumn {
    pub fn new(name: impl Into<String>, kind: SchemaColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Named and typed columns of a schema payload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchemaType {
    pub columns: Vec<SchemaColumn>,
}

/// A structured dataset column: name plus full literal type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetColumn {
    pub name: String,
    pub literal_type: LiteralType,
}

impl DatasetColumn {
    pub fn new(name: impl Into<String>, literal_type: LiteralType) -> Self {
        Self {
            name: name.into(),
            literal_type,
        }
    }
}

/// Column schema and storage format of a structured dataset.
///
/// An empty column list means "unspecified"; an empty format means "use the
/// frame type's default".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StructuredDatasetType {
    pub columns: Vec<DatasetColumn>,
    pub format: String,
}

impl StructuredDatasetType {
    pub fn new(columns: Vec<DatasetColumn>, format: impl Into<String>) -> Self {
        Self {
            columns,
            format: format.into(),
        }
    }

    /// Column names, in declaration order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// The tagged union of literal type shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Simple(SimpleType),
    Blob(BlobType),
    Schema(SchemaType),
    Dataset(StructuredDatasetType),
    Collection(Box<LiteralType>),
    Map(Box<LiteralType>),
    Union(Vec<LiteralType>),
    Enum(Vec<String>),
}

/// A literal type: the wire-stable encoded form of a type.
///
/// Immutable once constructed. Two literal types are equal iff their kinds
/// are structurally equal; `metadata` and `annotation` are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiteralType {
    pub kind: TypeKind,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub metadata: IndexMap<String, JsonValue>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub annotation: IndexMap<String, JsonValue>,
}

impl PartialEq for LiteralType {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl LiteralType {
    pub fn new(kind: TypeKind) -> Self {
        Self {
            kind,
            metadata: IndexMap::new(),
            annotation: IndexMap::new(),
        }
    }

    pub fn simple(simple: SimpleType) -> Self {
        Self::new(TypeKind::Simple(simple))
    }

    pub fn int() -> Self {
        Self::simple(SimpleType::Int)
    }

    pub fn float() -> Self {
        Self::simple(SimpleType::Float)
    }

    pub fn boolean() -> Self {
        Self::simple(SimpleType::Bool)
    }

    pub fn string() -> Self {
        Self::simple(SimpleType::Str)
    }

    pub fn datetime() -> Self {
        Self::simple(SimpleType::Datetime)
    }

    pub fn duration() -> Self {
        Self::simple(SimpleType::Duration)
    }

    pub fn none() -> Self {
        Self::simple(SimpleType::None)
    }

    pub fn structure() -> Self {
        Self::simple(SimpleType::Struct)
    }

    pub fn blob(blob: BlobType) -> Self {
        Self::new(TypeKind::Blob(blob))
    }

    pub fn schema(schema: SchemaType) -> Self {
        Self::new(TypeKind::Schema(schema))
    }

    pub fn dataset(dataset: StructuredDatasetType) -> Self {
        Self::new(TypeKind::Dataset(dataset))
    }

    pub fn collection(element: LiteralType) -> Self {
        Self::new(TypeKind::Collection(Box::new(element)))
    }

    pub fn map_of(value: LiteralType) -> Self {
        Self::new(TypeKind::Map(Box::new(value)))
    }

    pub fn union(variants: Vec<LiteralType>) -> Self {
        Self::new(TypeKind::Union(variants))
    }

    pub fn enumeration(values: Vec<String>) -> Self {
        Self::new(TypeKind::Enum(values))
    }

    /// Attach a metadata entry. Metadata never affects equality.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn as_blob(&self) -> Option<&BlobType> {
        match &self.kind {
            TypeKind::Blob(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_union(&self) -> Option<&[LiteralType]> {
        match &self.kind {
            TypeKind::Union(v) => Some(v),
            _ => None,
        }
    }
}

impl SimpleType {
    fn to_idl(self) -> idl::SimpleType {
        match self {
            SimpleType::None => idl::SimpleType::None,
            SimpleType::Bool => idl::SimpleType::Boolean,
            SimpleType::Int => idl::SimpleType::Integer,
            SimpleType::Float => idl::SimpleType::Float,
            SimpleType::Str => idl::SimpleType::String,
            SimpleType::Datetime => idl::SimpleType::Datetime,
            SimpleType::Duration => idl::SimpleType::Duration,
            SimpleType::Binary => idl::SimpleType::Binary,
            SimpleType::Error => idl::SimpleType::Error,
            SimpleType::Struct => idl::SimpleType::Struct,
        }
    }

    fn from_idl(value: i32) -> Result<Self, TransformError> {
        let simple = idl::SimpleType::try_from(value)
            .map_err(|_| TransformError::Wire(format!("unknown simple type {value}")))?;
        Ok(match simple {
            idl::SimpleType::None => SimpleType::None,
            idl::SimpleType::Boolean => SimpleType::Bool,
            idl::SimpleType::Integer => SimpleType::Int,
            idl::SimpleType::Float => SimpleType::Float,
            idl::SimpleType::String => SimpleType::Str,
            idl::SimpleType::Datetime => SimpleType::Datetime,
            idl::SimpleType::Duration => SimpleType::Duration,
            idl::SimpleType::Binary => SimpleType::Binary,
            idl::SimpleType::Error => SimpleType::Error,
            idl::SimpleType::Struct => SimpleType::Struct,
        })
    }
}

impl SchemaColumnKind {
    fn to_idl(self) -> idl::SchemaColumnKind {
        match self {
            SchemaColumnKind::Int => idl::SchemaColumnKind::Integer,
            SchemaColumnKind::Float => idl::SchemaColumnKind::Float,
            SchemaColumnKind::Str => idl::SchemaColumnKind::String,
            SchemaColumnKind::Bool => idl::SchemaColumnKind::Boolean,
            SchemaColumnKind::Datetime => idl::SchemaColumnKind::Datetime,
            SchemaColumnKind::Duration => idl::SchemaColumnKind::Duration,
        }
    }

    fn from_idl(value: i32) -> Result<Self, TransformError> {
        let kind = idl::SchemaColumnKind::try_from(value)
            .map_err(|_| TransformError::Wire(format!("unknown schema column kind {value}")))?;
        Ok(match kind {
            idl::SchemaColumnKind::Integer => SchemaColumnKind::Int,
            idl::SchemaColumnKind::Float => SchemaColumnKind::Float,
            idl::SchemaColumnKind::String => SchemaColumnKind::Str,
            idl::SchemaColumnKind::Boolean => SchemaColumnKind::Bool,
            idl::SchemaColumnKind::Datetime => SchemaColumnKind::Datetime,
            idl::SchemaColumnKind::Duration => SchemaColumnKind::Duration,
        })
    }
}

impl BlobType {
    pub fn to_idl(&self) -> idl::BlobType {
        idl::BlobType {
            format: self.format.clone(),
            dimensionality: match self.dimensionality {
                BlobDimensionality::Single => idl::BlobDimensionality::Single as i32,
                BlobDimensionality::Multipart => idl::BlobDimensionality::Multipart as i32,
            },
        }
    }

    pub fn from_idl(msg: &idl::BlobType) -> Result<Self, TransformError> {
        let dim = idl::BlobDimensionality::try_from(msg.dimensionality).map_err(|_| {
            TransformError::Wire(format!("unknown blob dimensionality {}", msg.dimensionality))
        })?;
        Ok(Self {
            format: msg.format.clone(),
            dimensionality: match dim {
                idl::BlobDimensionality::Single => BlobDimensionality::Single,
                idl::BlobDimensionality::Multipart => BlobDimensionality::Multipart,
            },
        })
    }
}

impl SchemaType {
    pub fn to_idl(&self) -> idl::SchemaType {
        idl::SchemaType {
            columns: self
                .columns
                .iter()
                .map(|c| idl::SchemaColumn {
                    name: c.name.clone(),
                    kind: c.kind.to_idl() as i32,
                })
                .collect(),
        }
    }

    pub fn from_idl(msg: &idl::SchemaType) -> Result<Self, TransformError> {
        let mut columns = Vec::with_capacity(msg.columns.len());
        for c in &msg.columns {
            columns.push(SchemaColumn {
                name: c.name.clone(),
                kind: SchemaColumnKind::from_idl(c.kind)?,
            });
        }
        Ok(Self { columns })
    }
}

impl StructuredDatasetType {
    pub fn to_idl(&self) -> idl::StructuredDatasetType {
        idl::StructuredDatasetType {
            columns: self
                .columns
                .iter()
                .map(|c| idl::DatasetColumn {
                    name: c.name.clone(),
                    literal_type: Some(c.literal_type.to_idl()),
                })
                .collect(),
            format: self.format.clone(),
        }
    }

    pub fn from_idl(msg: &idl::StructuredDatasetType) -> Result<Self, TransformError> {
        let mut columns = Vec::with_capacity(msg.columns.len());
        for c in &msg.columns {
            let lt = c
                .literal_type
                .as_ref()
                .ok_or_else(|| TransformError::Wire("dataset column missing type".into()))?;
            columns.push(DatasetColumn {
                name: c.name.clone(),
                literal_type: LiteralType::from_idl(lt)?,
            });
        }
        Ok(Self {
            columns,
            format: msg.format.clone(),
        })
    }
}

impl LiteralType {
    pub fn to_idl(&self) -> idl::LiteralType {
        use idl::literal_type::Kind;
        let kind = match &self.kind {
            TypeKind::Simple(s) => Kind::Simple(s.to_idl() as i32),
            TypeKind::Blob(b) => Kind::Blob(b.to_idl()),
            TypeKind::Schema(s) => Kind::Schema(s.to_idl()),
            TypeKind::Dataset(d) => Kind::StructuredDatasetType(d.to_idl()),
            TypeKind::Collection(elem) => Kind::CollectionType(Box::new(elem.to_idl())),
            TypeKind::Map(value) => Kind::MapValueType(Box::new(value.to_idl())),
            TypeKind::Union(variants) => Kind::UnionType(idl::UnionType {
                variants: variants.iter().map(LiteralType::to_idl).collect(),
            }),
            TypeKind::Enum(values) => Kind::EnumType(idl::EnumType {
                values: values.clone(),
            }),
        };
        idl::LiteralType {
            kind: Some(kind),
            metadata: json_map_to_struct(&self.metadata),
            annotation: json_map_to_struct(&self.annotation),
        }
    }

    pub fn from_idl(msg: &idl::LiteralType) -> Result<Self, TransformError> {
        use idl::literal_type::Kind;
        let kind = match msg
            .kind
            .as_ref()
            .ok_or_else(|| TransformError::Wire("literal type missing kind".into()))?
        {
            Kind::Simple(s) => TypeKind::Simple(SimpleType::from_idl(*s)?),
            Kind::Blob(b) => TypeKind::Blob(BlobType::from_idl(b)?),
            Kind::Schema(s) => TypeKind::Schema(SchemaType::from_idl(s)?),
            Kind::StructuredDatasetType(d) => TypeKind::Dataset(StructuredDatasetType::from_idl(d)?),
            Kind::CollectionType(elem) => {
                TypeKind::Collection(Box::new(LiteralType::from_idl(elem)?))
            }
            Kind::MapValueType(value) => TypeKind::Map(Box::new(LiteralType::from_idl(value)?)),
            Kind::UnionType(u) => {
                let mut variants = Vec::with_capacity(u.variants.len());
                for v in &u.variants {
                    variants.push(LiteralType::from_idl(v)?);
                }
                TypeKind::Union(variants)
            }
            Kind::EnumType(e) => TypeKind::Enum(e.values.clone()),
        };
        Ok(Self {
            kind,
            metadata: struct_to_json_map(msg.metadata.as_ref()),
            annotation: struct_to_json_map(msg.annotation.as_ref()),
        })
    }
}

/// Convert a JSON object map into a protobuf `Struct`. Empty maps become
/// absent messages so the wire form stays minimal.
pub(crate) fn json_map_to_struct(
    map: &IndexMap<String, JsonValue>,
) -> Option<::prost_types::Struct> {
    if map.is_empty() {
        return None;
    }
    let fields = map
        .iter()
        .map(|(k, v)| (k.clone(), json_to_pb_value(v)))
        .collect();
    Some(::prost_types::Struct { fields })
}

pub(crate) fn struct_to_json_map(
    msg: Option<&::prost_types::Struct>,
) -> IndexMap<String, JsonValue> {
    match msg {
        Some(s) => s
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), pb_value_to_json(v)))
            .collect(),
        None => IndexMap::new(),
    }
}

pub(crate) fn json_to_pb_value(value: &JsonValue) -> ::prost_types::Value {
    use ::prost_types::value::Kind;
    let kind = match value {
        JsonValue::Null => Kind::NullValue(0),
        JsonValue::Bool(b) => Kind::BoolValue(*b),
        JsonValue::Number(n) => Kind::NumberValue(n.as_f64().unwrap_or(f64::NAN)),
        JsonValue::String(s) => Kind::StringValue(s.clone()),
        JsonValue::Array(items) => Kind::ListValue(::prost_types::ListValue {
            values: items.iter().map(json_to_pb_value).collect(),
        }),
        JsonValue::Object(obj) => Kind::StructValue(::prost_types::Struct {
            fields: obj
                .iter()
                .map(|(k, v)| (k.clone(), json_to_pb_value(v)))
                .collect(),
        }),
    };
    ::prost_types::Value { kind: Some(kind) }
}

pub(crate) fn pb_value_to_json(value: &::prost_types::Value) -> JsonValue {
    use ::prost_types::value::Kind;
    match &value.kind {
        None | Some(Kind::NullValue(_)) => JsonValue::Null,
        Some(Kind::BoolValue(b)) => JsonValue::Bool(*b),
        // Whole numbers come back as integers so struct round-trips hold.
        Some(Kind::NumberValue(n)) => {
            if n.fract() == 0.0 && n.is_finite() && n.abs() < (i64::MAX as f64) {
                JsonValue::from(*n as i64)
            } else {
                JsonValue::from(*n)
            }
        }
        Some(Kind::StringValue(s)) => JsonValue::String(s.clone()),
        Some(Kind::ListValue(list)) => {
            JsonValue::Array(list.values.iter().map(pb_value_to_json).collect())
        }
        Some(Kind::StructValue(s)) => JsonValue::Object(
            s.fields
                .iter()
                .map(|(k, v)| (k.clone(), pb_value_to_json(v)))
                .collect(),
        ),
    }
}
