//! Spool core: a typed literal engine for workflow authoring.
//!
//! Host values are described by [`native::NativeType`] and converted to and
//! from the portable [`literal::Literal`] representation by transformers
//! registered in a [`engine::TypeEngine`]. Tabular data negotiates its
//! storage format through the secondary [`dataset::DatasetEngine`]. Both
//! registries are explicit objects built once at startup; all I/O goes
//! through the injected [`storage::FileAccess`] collaborator.

pub mod builtin;
pub mod context;
pub mod dataset;
pub mod directory;
pub mod engine;
pub mod error;
pub mod file;
pub mod idl;
pub mod interface;
pub mod literal;
pub mod native;
pub mod record;
pub mod schema;
pub mod storage;
pub mod table;
pub mod transformer;
pub mod types;

pub use context::TransformContext;
pub use dataset::{
    DatasetDecoder, DatasetEncoder, DatasetEngine, DatasetTransformer, Frame, FrameRenderer,
    StructuredDataset,
};
pub use directory::{DataDir, DirTransformer};
pub use engine::TypeEngine;
pub use error::TransformError;
pub use file::{DataFile, FileTransformer};
pub use interface::{TypedInterface, Variable};
pub use literal::{Literal, LiteralValue, Primitive, Scalar};
pub use native::{
    EnumType, HashMethod, NativeType, NativeValue, OpaqueValue, RecordType, RecordValue, TypeAnnotation,
    TypeKey,
};
pub use record::{Record, RecordTransformer};
pub use schema::{DataSchema, SchemaReader, SchemaTransformer, SchemaWriter};
pub use storage::{FileAccess, LocalFileAccess, StorageError};
pub use table::Table;
pub use transformer::Transformer;
pub use types::{
    BlobDimensionality, BlobType, DatasetColumn, LiteralType, SchemaColumn, SchemaColumnKind,
    SchemaType, SimpleType, StructuredDatasetType, TypeKind,
};
