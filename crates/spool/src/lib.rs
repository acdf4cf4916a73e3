//! Spool: typed literals for workflow authoring.
//!
//! Declared task types resolve to portable literal types, runtime values
//! encode to literals for the orchestration backend, and received literals
//! decode back to values. The facade wires every built-in transformer and
//! dataset handler into ready-to-use engines:
//!
//! ```
//! use std::sync::Arc;
//!
//! let datasets = Arc::new(spool::default_dataset_engine().unwrap());
//! let engine = spool::default_type_engine(Arc::clone(&datasets)).unwrap();
//! let ctx = spool::TransformContext::sandbox(std::env::temp_dir());
//!
//! let t = spool::NativeType::list(spool::NativeType::Int);
//! let lt = engine.literal_type_of(&t).unwrap();
//! let v = spool::NativeValue::List(vec![spool::NativeValue::Int(1)]);
//! let literal = engine.to_literal(&ctx, &v, &t, &lt).unwrap();
//! assert_eq!(engine.to_native(&ctx, &literal, &t).unwrap(), v);
//! ```

use std::sync::Arc;

pub use spool_core::{
    BlobDimensionality, BlobType, DataDir, DataFile, DataSchema, DatasetColumn, DatasetDecoder,
    DatasetEncoder, DatasetEngine, EnumType, FileAccess, Frame, FrameRenderer, HashMethod, Literal,
    LiteralType, LiteralValue, LocalFileAccess, NativeType, NativeValue, OpaqueValue, Primitive,
    Record, RecordType, RecordValue, Scalar, SchemaColumn, SchemaColumnKind, SchemaReader,
    SchemaType, SchemaWriter, SimpleType, StorageError, StructuredDataset, StructuredDatasetType,
    Table, TransformContext, TransformError, Transformer, TypeAnnotation, TypeEngine, TypeKey,
    TypeKind, TypedInterface, Variable,
};
pub use spool_core::{
    builtin, context, dataset, directory, engine, error, file, idl, interface, literal, native,
    record, schema, storage, table, transformer, types,
};
pub use spool_serde::{SerdeRecordTransformer, register as register_serde_record};

use spool_core::builtin::{
    EnumTransformer, ListTransformer, MapTransformer, OpaqueTransformer, PrimitiveKind,
    PrimitiveTransformer, UnionTransformer,
};
use spool_core::dataset::DatasetTransformer;
use spool_core::directory::DirTransformer;
use spool_core::file::FileTransformer;
use spool_core::record::RecordTransformer;
use spool_core::schema::SchemaTransformer;
use spool_core::table::{TableNdjsonDecoder, TableNdjsonEncoder, TableRenderer};

/// A dataset engine with every built-in handler registered: the NDJSON pair
/// (the table frame's default format), the table renderer, and the CSV pair
/// when the `csv` feature is on.
pub fn default_dataset_engine() -> Result<DatasetEngine, TransformError> {
    let mut datasets = DatasetEngine::new();
    datasets.register_encoder(Arc::new(TableNdjsonEncoder), true)?;
    datasets.register_decoder(Arc::new(TableNdjsonDecoder), true)?;
    datasets.register_renderer::<Table>(Arc::new(TableRenderer));
    #[cfg(feature = "csv")]
    spool_csv::register_all(&mut datasets)?;
    Ok(datasets)
}

/// A type engine with every built-in transformer registered, bridged to the
/// given dataset engine for dataset-typed values.
pub fn default_type_engine(datasets: Arc<DatasetEngine>) -> Result<TypeEngine, TransformError> {
    let mut engine = TypeEngine::new();
    for kind in PrimitiveKind::all() {
        engine.register(Arc::new(PrimitiveTransformer::new(kind)))?;
    }
    engine.register(Arc::new(EnumTransformer))?;
    engine.register(Arc::new(ListTransformer))?;
    engine.register(Arc::new(MapTransformer))?;
    engine.register(Arc::new(UnionTransformer))?;
    engine.register(Arc::new(RecordTransformer))?;
    engine.register_with(Arc::new(FileTransformer), &[TypeKey::Path], false)?;
    engine.register(Arc::new(DirTransformer))?;
    engine.register(Arc::new(SchemaTransformer))?;
    engine.register(Arc::new(DatasetTransformer::new(datasets)))?;
    engine.register(Arc::new(OpaqueTransformer))?;
    Ok(engine)
}
