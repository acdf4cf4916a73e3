//! The literal model: wire-stable encoded values.
//!
//! Literals never hold host objects. Everything opaque (files, frames,
//! arbitrary records) is a URI pointing at externally persisted bytes plus
//! a format tag.

use crate::error::TransformError;
use crate::idl;
use crate::types::{
    BlobType, LiteralType, SchemaType, StructuredDatasetType, json_map_to_struct,
    struct_to_json_map,
};
use indexmap::IndexMap;
use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A primitive scalar value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Datetime(Timestamp),
    Duration(SignedDuration),
}

/// Metadata describing a blob payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobMetadata {
    pub kind: BlobType,
}

/// An opaque byte payload referenced by URI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blob {
    pub uri: String,
    pub metadata: BlobMetadata,
}

impl Blob {
    pub fn new(uri: impl Into<String>, kind: BlobType) -> Self {
        Self {
            uri: uri.into(),
            metadata: BlobMetadata { kind },
        }
    }
}

/// Inline bytes with a format tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryLiteral {
    pub bytes: Vec<u8>,
    pub tag: String,
}

/// A schema payload: URI prefix plus column layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaLiteral {
    pub uri: String,
    pub kind: SchemaType,
}

/// Metadata carried by a structured dataset literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub dataset_type: StructuredDatasetType,
}

/// A structured dataset payload: URI plus negotiated type metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetLiteral {
    pub uri: String,
    pub metadata: DatasetMetadata,
}

/// An error value propagated through the literal layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorLiteral {
    pub failed_node_id: String,
    pub message: String,
}

/// A union value: the encoded member plus the authoritative stored tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnionCase {
    pub tag: LiteralType,
    pub value: Literal,
}

/// A scalar literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scalar {
    Primitive(Primitive),
    Blob(Blob),
    Binary(BinaryLiteral),
    Schema(SchemaLiteral),
    Dataset(DatasetLiteral),
    Generic(JsonValue),
    Union(Box<UnionCase>),
    Error(ErrorLiteral),
    None,
}

/// The tagged union of literal shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiteralValue {
    Scalar(Scalar),
    Collection(Vec<Literal>),
    Map(IndexMap<String, Literal>),
}

/// The wire-stable encoded form of a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Literal {
    pub value: LiteralValue,
    /// User-declared cache fingerprint, if a hash method was attached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub metadata: IndexMap<String, String>,
}

impl Literal {
    pub fn new(value: LiteralValue) -> Self {
        Self {
            value,
            hash: None,
            metadata: IndexMap::new(),
        }
    }

    pub fn scalar(scalar: Scalar) -> Self {
        Self::new(LiteralValue::Scalar(scalar))
    }

    pub fn collection(literals: Vec<Literal>) -> Self {
        Self::new(LiteralValue::Collection(literals))
    }

    pub fn map(literals: IndexMap<String, Literal>) -> Self {
        Self::new(LiteralValue::Map(literals))
    }

    pub fn int(v: i64) -> Self {
        Self::scalar(Scalar::Primitive(Primitive::Int(v)))
    }

    pub fn float(v: f64) -> Self {
        Self::scalar(Scalar::Primitive(Primitive::Float(v)))
    }

    pub fn boolean(v: bool) -> Self {
        Self::scalar(Scalar::Primitive(Primitive::Bool(v)))
    }

    pub fn string(v: impl Into<String>) -> Self {
        Self::scalar(Scalar::Primitive(Primitive::Str(v.into())))
    }

    pub fn none() -> Self {
        Self::scalar(Scalar::None)
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match &self.value {
            LiteralValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&Blob> {
        match self.as_scalar() {
            Some(Scalar::Blob(b)) => Some(b),
            _ => None,
        }
    }

    pub fn as_dataset(&self) -> Option<&DatasetLiteral> {
        match self.as_scalar() {
            Some(Scalar::Dataset(d)) => Some(d),
            _ => None,
        }
    }
}

impl Primitive {
    pub fn to_idl(&self) -> idl::Primitive {
        use idl::primitive::Value;
        let value = match self {
            Primitive::Int(v) => Value::Integer(*v),
            Primitive::Float(v) => Value::FloatValue(*v),
            Primitive::Str(v) => Value::StringValue(v.clone()),
            Primitive::Bool(v) => Value::Boolean(*v),
            Primitive::Datetime(ts) => Value::Datetime(::prost_types::Timestamp {
                seconds: ts.as_second(),
                nanos: ts.subsec_nanosecond(),
            }),
            Primitive::Duration(d) => Value::Duration(::prost_types::Duration {
                seconds: d.as_secs(),
                nanos: d.subsec_nanos(),
            }),
        };
        idl::Primitive { value: Some(value) }
    }

    pub fn from_idl(msg: &idl::Primitive) -> Result<Self, TransformError> {
        use idl::primitive::Value;
        match msg
            .value
            .as_ref()
            .ok_or_else(|| TransformError::Wire("primitive missing value".into()))?
        {
            Value::Integer(v) => Ok(Primitive::Int(*v)),
            Value::FloatValue(v) => Ok(Primitive::Float(*v)),
            Value::StringValue(v) => Ok(Primitive::Str(v.clone())),
            Value::Boolean(v) => Ok(Primitive::Bool(*v)),
            Value::Datetime(ts) => Ok(Primitive::Datetime(
                Timestamp::new(ts.seconds, ts.nanos)
                    .map_err(|e| TransformError::Wire(format!("bad timestamp: {e}")))?,
            )),
            Value::Duration(d) => Ok(Primitive::Duration(SignedDuration::new(d.seconds, d.nanos))),
        }
    }
}

impl Scalar {
    pub fn to_idl(&self) -> idl::Scalar {
        use idl::scalar::Value;
        let value = match self {
            Scalar::Primitive(p) => Value::Primitive(p.to_idl()),
            Scalar::Blob(b) => Value::Blob(idl::Blob {
                metadata: Some(idl::BlobMetadata {
                    kind: Some(b.metadata.kind.to_idl()),
                }),
                uri: b.uri.clone(),
            }),
            Scalar::Binary(b) => Value::Binary(idl::Binary {
                value: b.bytes.clone(),
                tag: b.tag.clone(),
            }),
            Scalar::Schema(s) => Value::Schema(idl::Schema {
                uri: s.uri.clone(),
                kind: Some(s.kind.to_idl()),
            }),
            Scalar::Dataset(d) => Value::StructuredDataset(idl::StructuredDataset {
                uri: d.uri.clone(),
                metadata: Some(idl::StructuredDatasetMetadata {
                    dataset_type: Some(d.metadata.dataset_type.to_idl()),
                }),
            }),
            Scalar::Generic(v) => Value::Generic(json_to_struct(v)),
            Scalar::Union(u) => Value::Union(Box::new(idl::Union {
                value: Some(Box::new(u.value.to_idl())),
                tag: Some(u.tag.to_idl()),
            })),
            Scalar::Error(e) => Value::Error(idl::Error {
                failed_node_id: e.failed_node_id.clone(),
                message: e.message.clone(),
            }),
            Scalar::None => Value::NoneType(idl::Void {}),
        };
        idl::Scalar { value: Some(value) }
    }

    pub fn from_idl(msg: &idl::Scalar) -> Result<Self, TransformError> {
        use idl::scalar::Value;
        match msg
            .value
            .as_ref()
            .ok_or_else(|| TransformError::Wire("scalar missing value".into()))?
        {
            Value::Primitive(p) => Ok(Scalar::Primitive(Primitive::from_idl(p)?)),
            Value::Blob(b) => {
                let kind = b
                    .metadata
                    .as_ref()
                    .and_then(|m| m.kind.as_ref())
                    .ok_or_else(|| TransformError::Wire("blob missing metadata".into()))?;
                Ok(Scalar::Blob(Blob {
                    uri: b.uri.clone(),
                    metadata: BlobMetadata {
                        kind: BlobType::from_idl(kind)?,
                    },
                }))
            }
            Value::Binary(b) => Ok(Scalar::Binary(BinaryLiteral {
                bytes: b.value.clone(),
                tag: b.tag.clone(),
            })),
            Value::Schema(s) => Ok(Scalar::Schema(SchemaLiteral {
                uri: s.uri.clone(),
                kind: SchemaType::from_idl(
                    s.kind
                        .as_ref()
                        .ok_or_else(|| TransformError::Wire("schema missing type".into()))?,
                )?,
            })),
            Value::StructuredDataset(d) => {
                let dt = d
                    .metadata
                    .as_ref()
                    .and_then(|m| m.dataset_type.as_ref())
                    .ok_or_else(|| TransformError::Wire("dataset missing metadata".into()))?;
                Ok(Scalar::Dataset(DatasetLiteral {
                    uri: d.uri.clone(),
                    metadata: DatasetMetadata {
                        dataset_type: StructuredDatasetType::from_idl(dt)?,
                    },
                }))
            }
            Value::Generic(s) => Ok(Scalar::Generic(struct_to_json(s))),
            Value::Union(u) => {
                let value = u
                    .value
                    .as_ref()
                    .ok_or_else(|| TransformError::Wire("union missing value".into()))?;
                let tag = u
                    .tag
                    .as_ref()
                    .ok_or_else(|| TransformError::Wire("union missing tag".into()))?;
                Ok(Scalar::Union(Box::new(UnionCase {
                    tag: LiteralType::from_idl(tag)?,
                    value: Literal::from_idl(value)?,
                })))
            }
            Value::Error(e) => Ok(Scalar::Error(ErrorLiteral {
                failed_node_id: e.failed_node_id.clone(),
                message: e.message.clone(),
            })),
            Value::NoneType(_) => Ok(Scalar::None),
        }
    }
}

impl Literal {
    pub fn to_idl(&self) -> idl::Literal {
        use idl::literal::Value;
        let value = match &self.value {
            LiteralValue::Scalar(s) => Value::Scalar(s.to_idl()),
            LiteralValue::Collection(items) => Value::Collection(idl::LiteralCollection {
                literals: items.iter().map(Literal::to_idl).collect(),
            }),
            LiteralValue::Map(items) => Value::Map(idl::LiteralMap {
                literals: items
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_idl()))
                    .collect(),
            }),
        };
        idl::Literal {
            value: Some(value),
            hash: self.hash.clone().unwrap_or_default(),
            metadata: self
                .metadata
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    pub fn from_idl(msg: &idl::Literal) -> Result<Self, TransformError> {
        use idl::literal::Value;
        let value = match msg
            .value
            .as_ref()
            .ok_or_else(|| TransformError::Wire("literal missing value".into()))?
        {
            Value::Scalar(s) => LiteralValue::Scalar(Scalar::from_idl(s)?),
            Value::Collection(c) => {
                let mut items = Vec::with_capacity(c.literals.len());
                for l in &c.literals {
                    items.push(Literal::from_idl(l)?);
                }
                LiteralValue::Collection(items)
            }
            Value::Map(m) => {
                let mut items = IndexMap::with_capacity(m.literals.len());
                for (k, v) in &m.literals {
                    items.insert(k.clone(), Literal::from_idl(v)?);
                }
                LiteralValue::Map(items)
            }
        };
        Ok(Self {
            value,
            hash: if msg.hash.is_empty() {
                None
            } else {
                Some(msg.hash.clone())
            },
            metadata: msg
                .metadata
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        })
    }
}

/// Generic scalars carry arbitrary JSON; the wire form is a protobuf
/// `Struct`, so non-object payloads are wrapped under a reserved key.
const WRAPPED_KEY: &str = "@wrapped";

fn json_to_struct(value: &JsonValue) -> ::prost_types::Struct {
    let map: IndexMap<String, JsonValue> = match value {
        JsonValue::Object(obj) => obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        other => {
            let mut map = IndexMap::new();
            map.insert(WRAPPED_KEY.to_string(), other.clone());
            map
        }
    };
    json_map_to_struct(&map).unwrap_or_default()
}

fn struct_to_json(msg: &::prost_types::Struct) -> JsonValue {
    let map = struct_to_json_map(Some(msg));
    if map.len() == 1 {
        if let Some(inner) = map.get(WRAPPED_KEY) {
            return inner.clone();
        }
    }
    JsonValue::Object(map.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BlobDimensionality, DatasetColumn, SchemaColumn, SchemaColumnKind};

    #[test]
    fn test_idl_roundtrip_primitives() {
        let literals = vec![
            Literal::int(-7),
            Literal::float(2.5),
            Literal::boolean(true),
            Literal::string("hello"),
            Literal::scalar(Scalar::Primitive(Primitive::Datetime(
                Timestamp::new(1_700_000_000, 123_456_789).unwrap(),
            ))),
            Literal::scalar(Scalar::Primitive(Primitive::Duration(SignedDuration::new(
                90, 250_000_000,
            )))),
            Literal::none(),
        ];
        for lit in literals {
            let back = Literal::from_idl(&lit.to_idl()).unwrap();
            assert_eq!(lit, back);
        }
    }

    #[test]
    fn test_idl_roundtrip_blob() {
        let lit = Literal::scalar(Scalar::Blob(Blob::new(
            "sandbox://raw/abc",
            BlobType::single("csv"),
        )))
        .with_hash("cafebabe");
        let back = Literal::from_idl(&lit.to_idl()).unwrap();
        assert_eq!(lit, back);
        assert_eq!(back.hash.as_deref(), Some("cafebabe"));
        assert_eq!(
            back.as_blob().unwrap().metadata.kind.dimensionality,
            BlobDimensionality::Single
        );
    }

    #[test]
    fn test_idl_roundtrip_collection_and_map() {
        let mut entries = IndexMap::new();
        entries.insert("a".to_string(), Literal::int(1));
        entries.insert("b".to_string(), Literal::int(2));
        let lit = Literal::collection(vec![Literal::map(entries), Literal::string("tail")]);
        let back = Literal::from_idl(&lit.to_idl()).unwrap();
        assert_eq!(lit, back);
    }

    #[test]
    fn test_idl_roundtrip_union() {
        let lit = Literal::scalar(Scalar::Union(Box::new(UnionCase {
            tag: LiteralType::int(),
            value: Literal::int(5),
        })));
        let back = Literal::from_idl(&lit.to_idl()).unwrap();
        assert_eq!(lit, back);
    }

    #[test]
    fn test_idl_roundtrip_generic() {
        let lit = Literal::scalar(Scalar::Generic(serde_json::json!({
            "x": 1, "y": [true, "z"], "nested": {"k": "v"}
        })));
        let back = Literal::from_idl(&lit.to_idl()).unwrap();
        assert_eq!(lit, back);

        // Non-object payloads survive via wrapping.
        let lit = Literal::scalar(Scalar::Generic(serde_json::json!([1, 2, 3])));
        let back = Literal::from_idl(&lit.to_idl()).unwrap();
        assert_eq!(lit, back);
    }

    #[test]
    fn test_idl_roundtrip_schema_and_dataset() {
        let lit = Literal::scalar(Scalar::Schema(SchemaLiteral {
            uri: "sandbox://schemas/1".into(),
            kind: SchemaType {
                columns: vec![SchemaColumn::new("n", SchemaColumnKind::Int)],
            },
        }));
        assert_eq!(lit, Literal::from_idl(&lit.to_idl()).unwrap());

        let lit = Literal::scalar(Scalar::Dataset(DatasetLiteral {
            uri: "sandbox://data/5".into(),
            metadata: DatasetMetadata {
                dataset_type: StructuredDatasetType::new(
                    vec![DatasetColumn::new("id", LiteralType::int())],
                    "ndjson",
                ),
            },
        }));
        assert_eq!(lit, Literal::from_idl(&lit.to_idl()).unwrap());
    }

    #[test]
    fn test_wire_bytes_roundtrip() {
        use prost::Message;
        let lit = Literal::collection(vec![Literal::int(1), Literal::string("two")]);
        let bytes = lit.to_idl().encode_to_vec();
        let decoded = idl::Literal::decode(bytes.as_slice()).unwrap();
        assert_eq!(lit, Literal::from_idl(&decoded).unwrap());
    }
}
