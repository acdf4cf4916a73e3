//! Wire representation of literals and literal types.
//!
//! Hand-written protobuf messages (no build-time codegen). Every model type
//! in [`crate::literal`] and [`crate::types`] carries a `to_idl`/`from_idl`
//! pair targeting these messages; round-tripping through them is lossless.

/// Simple scalar kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum SimpleType {
    None = 0,
    Integer = 1,
    Float = 2,
    String = 3,
    Boolean = 4,
    Datetime = 5,
    Duration = 6,
    Binary = 7,
    Error = 8,
    Struct = 9,
}

/// Blob dimensionality: one file, or a directory prefix of files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum BlobDimensionality {
    Single = 0,
    Multipart = 1,
}

/// Column kinds for schema types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum SchemaColumnKind {
    Integer = 0,
    Float = 1,
    String = 2,
    Boolean = 3,
    Datetime = 4,
    Duration = 5,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BlobType {
    #[prost(string, tag = "1")]
    pub format: ::prost::alloc::string::String,
    #[prost(enumeration = "BlobDimensionality", tag = "2")]
    pub dimensionality: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SchemaColumn {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(enumeration = "SchemaColumnKind", tag = "2")]
    pub kind: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SchemaType {
    #[prost(message, repeated, tag = "1")]
    pub columns: ::prost::alloc::vec::Vec<SchemaColumn>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DatasetColumn {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub literal_type: ::core::option::Option<LiteralType>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StructuredDatasetType {
    #[prost(message, repeated, tag = "1")]
    pub columns: ::prost::alloc::vec::Vec<DatasetColumn>,
    #[prost(string, tag = "2")]
    pub format: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UnionType {
    #[prost(message, repeated, tag = "1")]
    pub variants: ::prost::alloc::vec::Vec<LiteralType>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EnumType {
    #[prost(string, repeated, tag = "1")]
    pub values: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LiteralType {
    #[prost(oneof = "literal_type::Kind", tags = "1, 2, 3, 4, 5, 6, 7, 8")]
    pub kind: ::core::option::Option<literal_type::Kind>,
    /// Free-form metadata; does not affect equality or transformation.
    #[prost(message, optional, tag = "9")]
    pub metadata: ::core::option::Option<::prost_types::Struct>,
    /// Structural annotation blob for documentation/UX.
    #[prost(message, optional, tag = "10")]
    pub annotation: ::core::option::Option<::prost_types::Struct>,
}

pub mod literal_type {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Kind {
        #[prost(enumeration = "super::SimpleType", tag = "1")]
        Simple(i32),
        #[prost(message, tag = "2")]
        Schema(super::SchemaType),
        #[prost(message, tag = "3")]
        CollectionType(::prost::alloc::boxed::Box<super::LiteralType>),
        #[prost(message, tag = "4")]
        MapValueType(::prost::alloc::boxed::Box<super::LiteralType>),
        #[prost(message, tag = "5")]
        Blob(super::BlobType),
        #[prost(message, tag = "6")]
        EnumType(super::EnumType),
        #[prost(message, tag = "7")]
        StructuredDatasetType(super::StructuredDatasetType),
        #[prost(message, tag = "8")]
        UnionType(super::UnionType),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Primitive {
    #[prost(oneof = "primitive::Value", tags = "1, 2, 3, 4, 5, 6")]
    pub value: ::core::option::Option<primitive::Value>,
}

pub mod primitive {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Value {
        #[prost(int64, tag = "1")]
        Integer(i64),
        #[prost(double, tag = "2")]
        FloatValue(f64),
        #[prost(string, tag = "3")]
        StringValue(::prost::alloc::string::String),
        #[prost(bool, tag = "4")]
        Boolean(bool),
        #[prost(message, tag = "5")]
        Datetime(::prost_types::Timestamp),
        #[prost(message, tag = "6")]
        Duration(::prost_types::Duration),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BlobMetadata {
    #[prost(message, optional, tag = "1")]
    pub kind: ::core::option::Option<BlobType>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Blob {
    #[prost(message, optional, tag = "1")]
    pub metadata: ::core::option::Option<BlobMetadata>,
    #[prost(string, tag = "2")]
    pub uri: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Binary {
    #[prost(bytes = "vec", tag = "1")]
    pub value: ::prost::alloc::vec::Vec<u8>,
    #[prost(string, tag = "2")]
    pub tag: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Schema {
    #[prost(string, tag = "1")]
    pub uri: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub kind: ::core::option::Option<SchemaType>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StructuredDatasetMetadata {
    #[prost(message, optional, tag = "1")]
    pub dataset_type: ::core::option::Option<StructuredDatasetType>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StructuredDataset {
    #[prost(string, tag = "1")]
    pub uri: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub metadata: ::core::option::Option<StructuredDatasetMetadata>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Union {
    #[prost(message, optional, boxed, tag = "1")]
    pub value: ::core::option::Option<::prost::alloc::boxed::Box<Literal>>,
    #[prost(message, optional, tag = "2")]
    pub tag: ::core::option::Option<LiteralType>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Error {
    #[prost(string, tag = "1")]
    pub failed_node_id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub message: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Void {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Scalar {
    #[prost(oneof = "scalar::Value", tags = "1, 2, 3, 4, 5, 6, 7, 8, 9")]
    pub value: ::core::option::Option<scalar::Value>,
}

pub mod scalar {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Value {
        #[prost(message, tag = "1")]
        Primitive(super::Primitive),
        #[prost(message, tag = "2")]
        Blob(super::Blob),
        #[prost(message, tag = "3")]
        Binary(super::Binary),
        #[prost(message, tag = "4")]
        Schema(super::Schema),
        #[prost(message, tag = "5")]
        NoneType(super::Void),
        #[prost(message, tag = "6")]
        Error(super::Error),
        #[prost(message, tag = "7")]
        Generic(::prost_types::Struct),
        #[prost(message, tag = "8")]
        StructuredDataset(super::StructuredDataset),
        #[prost(message, tag = "9")]
        Union(::prost::alloc::boxed::Box<super::Union>),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LiteralCollection {
    #[prost(message, repeated, tag = "1")]
    pub literals: ::prost::alloc::vec::Vec<Literal>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LiteralMap {
    #[prost(map = "string, message", tag = "1")]
    pub literals: ::std::collections::HashMap<::prost::alloc::string::String, Literal>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Literal {
    #[prost(oneof = "literal::Value", tags = "1, 2, 3")]
    pub value: ::core::option::Option<literal::Value>,
    /// User-declared cache fingerprint for this literal, if any.
    #[prost(string, tag = "4")]
    pub hash: ::prost::alloc::string::String,
    #[prost(map = "string, string", tag = "5")]
    pub metadata: ::std::collections::HashMap<
        ::prost::alloc::string::String,
        ::prost::alloc::string::String,
    >,
}

pub mod literal {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Value {
        #[prost(message, tag = "1")]
        Scalar(super::Scalar),
        #[prost(message, tag = "2")]
        Collection(super::LiteralCollection),
        #[prost(message, tag = "3")]
        Map(super::LiteralMap),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Variable {
    #[prost(message, optional, tag = "1")]
    pub literal_type: ::core::option::Option<LiteralType>,
    #[prost(string, tag = "2")]
    pub description: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TypedInterface {
    #[prost(map = "string, message", tag = "1")]
    pub inputs: ::std::collections::HashMap<::prost::alloc::string::String, Variable>,
    #[prost(map = "string, message", tag = "2")]
    pub outputs: ::std::collections::HashMap<::prost::alloc::string::String, Variable>,
}
