//! Structured datasets: lazy tabular handles plus the secondary registry
//! that negotiates their storage format.
//!
//! Decoupled from the primary engine because one frame type may encode to
//! several storage formats, and the reverse decode must be chosen by the
//! format actually present in the literal, not by the frame type alone. The
//! registry key for this subsystem is the triple
//! (frame type, storage protocol, format).

use crate::context::TransformContext;
use crate::engine::TypeEngine;
use crate::error::TransformError;
use crate::literal::{DatasetLiteral, DatasetMetadata, Literal, Scalar};
use crate::native::{NativeType, NativeValue, TypeKey};
use crate::transformer::Transformer;
use crate::types::{DatasetColumn, LiteralType, SimpleType, StructuredDatasetType, TypeKind};
use indexmap::IndexMap;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A type-erased in-memory dataframe.
#[derive(Clone)]
pub struct Frame {
    value: Arc<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
}

impl Frame {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.type_name)
    }
}

/// A handle to tabular data: an in-memory frame, a storage URI, or both.
///
/// The one entity that is deliberately not always materialized. A handle
/// decoded from a literal carries only the URI and column metadata until
/// [`StructuredDataset::materialize`] is called, so passing the reference
/// onward performs zero I/O.
#[derive(Debug, Clone)]
pub struct StructuredDataset {
    frame: Option<Frame>,
    uri: Option<String>,
    dataset_type: StructuredDatasetType,
}

impl StructuredDataset {
    /// A locally constructed dataset around an in-memory frame.
    pub fn from_frame<T: Any + Send + Sync>(frame: T) -> Self {
        Self {
            frame: Some(Frame::new(frame)),
            uri: None,
            dataset_type: StructuredDatasetType::default(),
        }
    }

    /// A storage-backed handle; no frame is loaded.
    pub fn from_uri(uri: impl Into<String>, dataset_type: StructuredDatasetType) -> Self {
        Self {
            frame: None,
            uri: Some(uri.into()),
            dataset_type,
        }
    }

    /// The lazy handle for a dataset literal. Zero I/O.
    pub fn from_literal(literal: &DatasetLiteral) -> Self {
        Self::from_uri(literal.uri.clone(), literal.metadata.dataset_type.clone())
    }

    /// Request a storage format for encoding.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.dataset_type.format = format.into();
        self
    }

    /// Declare (or project to) a column schema.
    pub fn with_columns(mut self, columns: Vec<DatasetColumn>) -> Self {
        self.dataset_type.columns = columns;
        self
    }

    /// Pin the storage destination for encoding.
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    /// Borrow the in-memory frame as a concrete type.
    pub fn frame_ref<T: Any>(&self) -> Option<&T> {
        self.frame.as_ref().and_then(Frame::downcast_ref)
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn format(&self) -> &str {
        &self.dataset_type.format
    }

    pub fn columns(&self) -> &[DatasetColumn] {
        &self.dataset_type.columns
    }

    pub fn dataset_type(&self) -> &StructuredDatasetType {
        &self.dataset_type
    }

    /// The literal this handle stands for. Fails when nothing is persisted.
    pub fn to_literal(&self) -> Result<DatasetLiteral, TransformError> {
        let uri = self.uri.clone().ok_or_else(|| {
            TransformError::InvalidValue("dataset is not storage-backed".into())
        })?;
        Ok(DatasetLiteral {
            uri,
            metadata: DatasetMetadata {
                dataset_type: self.dataset_type.clone(),
            },
        })
    }

    /// Load the stored bytes as a concrete frame, honoring the handle's
    /// column projection. Requires a storage-backed handle.
    pub fn materialize<F: Any + Send + Sync>(
        &self,
        ctx: &TransformContext,
        datasets: &DatasetEngine,
    ) -> Result<F, TransformError> {
        let literal = self.to_literal()?;
        datasets.decode_frame(ctx, &literal, &self.dataset_type.columns)
    }
}

impl PartialEq for StructuredDataset {
    fn eq(&self, other: &Self) -> bool {
        let frames_match = match (&self.frame, &other.frame) {
            (Some(a), Some(b)) => Arc::ptr_eq(&a.value, &b.value),
            (None, None) => true,
            _ => false,
        };
        frames_match && self.uri == other.uri && self.dataset_type == other.dataset_type
    }
}

/// Persists one frame type in one storage format.
pub trait DatasetEncoder: Send + Sync {
    fn frame_type(&self) -> TypeId;

    fn frame_name(&self) -> &'static str;

    fn format(&self) -> &str;

    /// Storage protocol this handler is bound to; empty matches any URI
    /// scheme (the wildcard fallback).
    fn protocol(&self) -> &str {
        ""
    }

    /// Persist the dataset's frame and return the literal referencing it.
    fn encode(
        &self,
        ctx: &TransformContext,
        dataset: &StructuredDataset,
        requested: &StructuredDatasetType,
    ) -> Result<DatasetLiteral, TransformError>;
}

/// Loads one frame type from one storage format.
pub trait DatasetDecoder: Send + Sync {
    fn frame_type(&self) -> TypeId;

    fn frame_name(&self) -> &'static str;

    fn format(&self) -> &str;

    fn protocol(&self) -> &str {
        ""
    }

    /// Read the literal's bytes back into a frame. `metadata` carries the
    /// column selection: a subset of the literal's columns projects, an
    /// empty list means all columns.
    fn decode(
        &self,
        ctx: &TransformContext,
        literal: &DatasetLiteral,
        metadata: &DatasetMetadata,
    ) -> Result<Box<dyn Any + Send + Sync>, TransformError>;
}

/// Diagnostic HTML preview for a frame type. Display only, never part of
/// correctness.
pub trait FrameRenderer: Send + Sync {
    fn to_html(&self, frame: &Frame) -> Option<String>;
}

type HandlerKey = (TypeId, String, String);

/// The secondary registry: encoder and decoder handlers keyed by
/// (frame type, protocol, format), plus per-frame default formats and
/// renderers.
#[derive(Default)]
pub struct DatasetEngine {
    encoders: IndexMap<HandlerKey, Arc<dyn DatasetEncoder>>,
    decoders: IndexMap<HandlerKey, Arc<dyn DatasetDecoder>>,
    renderers: IndexMap<TypeId, Arc<dyn FrameRenderer>>,
    default_formats: IndexMap<TypeId, String>,
}

/// The URI scheme, or empty for plain paths.
fn protocol_of(uri: &str) -> &str {
    match uri.find("://") {
        Some(split) => &uri[..split],
        None => "",
    }
}

impl DatasetEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an encoder. At most one handler per exact triple; the first
    /// format registered for a frame type (or one registered with
    /// `default_format`) becomes that type's default.
    pub fn register_encoder(
        &mut self,
        encoder: Arc<dyn DatasetEncoder>,
        default_format: bool,
    ) -> Result<(), TransformError> {
        let key = (
            encoder.frame_type(),
            encoder.protocol().to_string(),
            encoder.format().to_string(),
        );
        if self.encoders.contains_key(&key) {
            return Err(TransformError::AlreadyRegistered(format!(
                "encoder for frame {} (protocol \"{}\", format \"{}\")",
                encoder.frame_name(),
                key.1,
                key.2
            )));
        }
        debug!(
            frame = encoder.frame_name(),
            protocol = %key.1,
            format = %key.2,
            "registering dataset encoder"
        );
        self.note_default(encoder.frame_type(), encoder.format(), default_format);
        self.encoders.insert(key, encoder);
        Ok(())
    }

    /// Register a decoder. Same conflict rules as encoders.
    pub fn register_decoder(
        &mut self,
        decoder: Arc<dyn DatasetDecoder>,
        default_format: bool,
    ) -> Result<(), TransformError> {
        let key = (
            decoder.frame_type(),
            decoder.protocol().to_string(),
            decoder.format().to_string(),
        );
        if self.decoders.contains_key(&key) {
            return Err(TransformError::AlreadyRegistered(format!(
                "decoder for frame {} (protocol \"{}\", format \"{}\")",
                decoder.frame_name(),
                key.1,
                key.2
            )));
        }
        debug!(
            frame = decoder.frame_name(),
            protocol = %key.1,
            format = %key.2,
            "registering dataset decoder"
        );
        self.note_default(decoder.frame_type(), decoder.format(), default_format);
        self.decoders.insert(key, decoder);
        Ok(())
    }

    fn note_default(&mut self, frame: TypeId, format: &str, force: bool) {
        if force || !self.default_formats.contains_key(&frame) {
            self.default_formats.insert(frame, format.to_string());
        }
    }

    /// Register the diagnostic renderer for a frame type.
    pub fn register_renderer<T: Any>(&mut self, renderer: Arc<dyn FrameRenderer>) {
        self.renderers.insert(TypeId::of::<T>(), renderer);
    }

    pub fn default_format_for(&self, frame: TypeId) -> Option<&str> {
        self.default_formats.get(&frame).map(String::as_str)
    }

    /// Diagnostic HTML for a frame, when a renderer is registered.
    pub fn render_html(&self, frame: &Frame) -> Option<String> {
        self.renderers.get(&frame.type_id())?.to_html(frame)
    }

    /// Encode a dataset into a literal.
    ///
    /// Negotiates (frame type, dataset protocol or the context default,
    /// requested format or the frame's default). A handle with no frame is
    /// already persisted: its literal is re-emitted as-is, zero I/O.
    pub fn encode(
        &self,
        ctx: &TransformContext,
        dataset: &StructuredDataset,
        requested: &StructuredDatasetType,
    ) -> Result<Literal, TransformError> {
        let Some(frame) = dataset.frame() else {
            let mut literal = dataset.to_literal()?;
            if literal.metadata.dataset_type.columns.is_empty() {
                literal.metadata.dataset_type.columns = requested.columns.clone();
            }
            return Ok(Literal::scalar(Scalar::Dataset(literal)));
        };

        let protocol = match dataset.uri() {
            Some(uri) => protocol_of(uri),
            None => protocol_of(ctx.file_access().raw_output_prefix()),
        };
        let format = if !requested.format.is_empty() {
            requested.format.as_str()
        } else if !dataset.format().is_empty() {
            dataset.format()
        } else {
            self.default_format_for(frame.type_id()).ok_or_else(|| {
                TransformError::NoEncoder {
                    frame: frame.type_name().to_string(),
                    protocol: protocol.to_string(),
                    format: String::new(),
                }
            })?
        };

        let encoder = self
            .lookup(&self.encoders, frame.type_id(), protocol, format)
            .ok_or_else(|| TransformError::NoEncoder {
                frame: frame.type_name().to_string(),
                protocol: protocol.to_string(),
                format: format.to_string(),
            })?;
        let requested = StructuredDatasetType::new(requested.columns.clone(), format);
        let literal = encoder.encode(ctx, dataset, &requested)?;
        Ok(Literal::scalar(Scalar::Dataset(literal)))
    }

    /// Decode a dataset literal into a concrete frame.
    ///
    /// The decoder is chosen by the format stored in the literal, never by
    /// re-negotiation. `columns` projects: a subset of the literal's column
    /// list, empty for all.
    pub fn decode_frame<F: Any + Send + Sync>(
        &self,
        ctx: &TransformContext,
        literal: &DatasetLiteral,
        columns: &[DatasetColumn],
    ) -> Result<F, TransformError> {
        let protocol = protocol_of(&literal.uri);
        let format = literal.metadata.dataset_type.format.as_str();
        let decoder = self
            .lookup(&self.decoders, TypeId::of::<F>(), protocol, format)
            .ok_or_else(|| TransformError::NoDecoder {
                frame: std::any::type_name::<F>().to_string(),
                protocol: protocol.to_string(),
                format: format.to_string(),
            })?;

        let selection = if columns.is_empty() {
            literal.metadata.dataset_type.columns.clone()
        } else {
            columns.to_vec()
        };
        let metadata = DatasetMetadata {
            dataset_type: StructuredDatasetType::new(selection, format),
        };
        let boxed = decoder.decode(ctx, literal, &metadata)?;
        boxed
            .downcast::<F>()
            .map(|frame| *frame)
            .map_err(|_| TransformError::mismatch(std::any::type_name::<F>(), decoder.frame_name()))
    }

    /// The lazy handle for a literal. Zero I/O by construction.
    pub fn decode_handle(&self, literal: &DatasetLiteral) -> StructuredDataset {
        StructuredDataset::from_literal(literal)
    }

    fn lookup<H: ?Sized>(
        &self,
        handlers: &IndexMap<HandlerKey, Arc<H>>,
        frame: TypeId,
        protocol: &str,
        format: &str,
    ) -> Option<Arc<H>> {
        handlers
            .get(&(frame, protocol.to_string(), format.to_string()))
            .or_else(|| handlers.get(&(frame, String::new(), format.to_string())))
            .cloned()
    }
}

/// Bridge registered into the primary engine for dataset-typed values.
pub struct DatasetTransformer {
    datasets: Arc<DatasetEngine>,
}

impl DatasetTransformer {
    pub fn new(datasets: Arc<DatasetEngine>) -> Self {
        Self { datasets }
    }

    fn declared_type(
        engine: &TypeEngine,
        declared: &NativeType,
    ) -> Result<StructuredDatasetType, TransformError> {
        let NativeType::Dataset { columns, format } = declared else {
            return Err(TransformError::mismatch("dataset", declared));
        };
        let mut dataset_columns = Vec::with_capacity(columns.len());
        for (name, column_type) in columns {
            dataset_columns.push(DatasetColumn::new(
                name.clone(),
                engine.literal_type_of(column_type)?,
            ));
        }
        Ok(StructuredDatasetType::new(dataset_columns, format.clone()))
    }
}

impl Transformer for DatasetTransformer {
    fn name(&self) -> &str {
        "dataset"
    }

    fn key(&self) -> TypeKey {
        TypeKey::Dataset
    }

    fn literal_type(
        &self,
        engine: &TypeEngine,
        t: &NativeType,
    ) -> Result<LiteralType, TransformError> {
        Ok(LiteralType::dataset(Self::declared_type(engine, t)?))
    }

    fn to_literal(
        &self,
        engine: &TypeEngine,
        ctx: &TransformContext,
        value: &NativeValue,
        declared: &NativeType,
        expected: &LiteralType,
    ) -> Result<Literal, TransformError> {
        let NativeValue::Dataset(dataset) = value else {
            return Err(TransformError::mismatch(declared, value.kind_name()));
        };
        let requested = match &expected.kind {
            TypeKind::Dataset(requested) => requested.clone(),
            _ => Self::declared_type(engine, declared)?,
        };
        self.datasets.encode(ctx, dataset, &requested)
    }

    fn to_native(
        &self,
        engine: &TypeEngine,
        _ctx: &TransformContext,
        literal: &Literal,
        declared: &NativeType,
    ) -> Result<NativeValue, TransformError> {
        let Some(dataset) = literal.as_dataset() else {
            return Err(TransformError::mismatch(declared, "non-dataset literal"));
        };
        // Always a lazy handle; the caller materializes when (and if) the
        // rows are actually needed. Declared columns narrow the handle.
        let mut handle = self.datasets.decode_handle(dataset);
        let requested = Self::declared_type(engine, declared)?;
        if !requested.columns.is_empty() {
            handle = handle.with_columns(requested.columns);
        }
        Ok(NativeValue::Dataset(handle))
    }

    fn guess_native_type(&self, literal_type: &LiteralType) -> Option<NativeType> {
        let TypeKind::Dataset(dataset_type) = &literal_type.kind else {
            return None;
        };
        // Best effort: only simple column types map back; others drop.
        let columns = dataset_type
            .columns
            .iter()
            .filter_map(|c| Some((c.name.clone(), simple_native(&c.literal_type)?)))
            .collect();
        Some(NativeType::Dataset {
            columns,
            format: dataset_type.format.clone(),
        })
    }
}

fn simple_native(lt: &LiteralType) -> Option<NativeType> {
    match &lt.kind {
        TypeKind::Simple(SimpleType::Bool) => Some(NativeType::Bool),
        TypeKind::Simple(SimpleType::Int) => Some(NativeType::Int),
        TypeKind::Simple(SimpleType::Float) => Some(NativeType::Float),
        TypeKind::Simple(SimpleType::Str) => Some(NativeType::Str),
        TypeKind::Simple(SimpleType::Datetime) => Some(NativeType::Datetime),
        TypeKind::Simple(SimpleType::Duration) => Some(NativeType::Duration),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{NDJSON, Table, TableNdjsonDecoder, TableNdjsonEncoder, TableRenderer};

    fn sample_table() -> Table {
        let mut table = Table::new(vec!["id".into(), "name".into()]);
        table
            .push_row(vec![NativeValue::Int(1), NativeValue::Str("ada".into())])
            .unwrap();
        table
            .push_row(vec![NativeValue::Int(2), NativeValue::Str("bob".into())])
            .unwrap();
        table
    }

    fn engine_with_ndjson() -> DatasetEngine {
        let mut datasets = DatasetEngine::new();
        datasets
            .register_encoder(Arc::new(TableNdjsonEncoder), false)
            .unwrap();
        datasets
            .register_decoder(Arc::new(TableNdjsonDecoder), false)
            .unwrap();
        datasets
    }

    fn ctx() -> (tempfile::TempDir, TransformContext) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = TransformContext::sandbox(dir.path());
        (dir, ctx)
    }

    fn typed_columns() -> Vec<DatasetColumn> {
        vec![
            DatasetColumn::new("id", LiteralType::int()),
            DatasetColumn::new("name", LiteralType::string()),
        ]
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let datasets = engine_with_ndjson();
        let (_dir, ctx) = ctx();
        let table = sample_table();

        let dataset = StructuredDataset::from_frame(table.clone());
        let requested = StructuredDatasetType::new(typed_columns(), "");
        let literal = datasets.encode(&ctx, &dataset, &requested).unwrap();

        let stored = literal.as_dataset().unwrap();
        assert_eq!(stored.metadata.dataset_type.format, NDJSON);

        let back: Table = datasets.decode_frame(&ctx, stored, &[]).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn test_omitted_format_uses_frame_default() {
        let datasets = engine_with_ndjson();
        let (_dir, ctx) = ctx();
        assert_eq!(
            datasets.default_format_for(TypeId::of::<Table>()),
            Some(NDJSON)
        );

        let dataset = StructuredDataset::from_frame(sample_table());
        let literal = datasets
            .encode(&ctx, &dataset, &StructuredDatasetType::default())
            .unwrap();
        assert_eq!(literal.as_dataset().unwrap().metadata.dataset_type.format, NDJSON);
    }

    #[test]
    fn test_missing_encoder_names_triple() {
        let datasets = engine_with_ndjson();
        let (_dir, ctx) = ctx();
        let dataset = StructuredDataset::from_frame(sample_table()).with_format("parquet");
        let err = datasets
            .encode(&ctx, &dataset, &StructuredDatasetType::default())
            .unwrap_err();
        match err {
            TransformError::NoEncoder {
                frame,
                protocol,
                format,
            } => {
                assert!(frame.contains("Table"));
                assert_eq!(protocol, "sandbox");
                assert_eq!(format, "parquet");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut datasets = engine_with_ndjson();
        let err = datasets
            .register_encoder(Arc::new(TableNdjsonEncoder), false)
            .unwrap_err();
        assert!(matches!(err, TransformError::AlreadyRegistered(_)));
    }

    #[test]
    fn test_decode_handle_is_lazy() {
        let datasets = engine_with_ndjson();
        let literal = DatasetLiteral {
            uri: "sandbox://raw/frames/1".into(),
            metadata: DatasetMetadata {
                dataset_type: StructuredDatasetType::new(typed_columns(), NDJSON),
            },
        };
        // No storage behind the URI; constructing the handle must not care.
        let handle = datasets.decode_handle(&literal);
        assert!(handle.frame().is_none());
        assert_eq!(handle.uri(), Some("sandbox://raw/frames/1"));
        assert_eq!(handle.format(), NDJSON);
    }

    #[test]
    fn test_persisted_handle_reencodes_without_handlers() {
        // A handle with a URI and no frame passes through even on an engine
        // with nothing registered.
        let datasets = DatasetEngine::new();
        let (_dir, ctx) = ctx();
        let handle = StructuredDataset::from_uri(
            "s3://warehouse/batch",
            StructuredDatasetType::new(typed_columns(), NDJSON),
        );
        let literal = datasets
            .encode(&ctx, &handle, &StructuredDatasetType::default())
            .unwrap();
        assert_eq!(literal.as_dataset().unwrap().uri, "s3://warehouse/batch");
    }

    #[test]
    fn test_column_projection() {
        let datasets = engine_with_ndjson();
        let (_dir, ctx) = ctx();

        let dataset = StructuredDataset::from_frame(sample_table());
        let requested = StructuredDatasetType::new(typed_columns(), "");
        let literal = datasets.encode(&ctx, &dataset, &requested).unwrap();

        let projection = vec![DatasetColumn::new("name", LiteralType::string())];
        let narrowed: Table = datasets
            .decode_frame(&ctx, literal.as_dataset().unwrap(), &projection)
            .unwrap();
        assert_eq!(narrowed.columns(), ["name".to_string()]);
        assert_eq!(narrowed.rows()[0][0], NativeValue::Str("ada".into()));
    }

    #[test]
    fn test_materialize_via_handle() {
        let datasets = engine_with_ndjson();
        let (_dir, ctx) = ctx();
        let table = sample_table();

        let literal = datasets
            .encode(
                &ctx,
                &StructuredDataset::from_frame(table.clone()),
                &StructuredDatasetType::new(typed_columns(), ""),
            )
            .unwrap();
        let handle = datasets.decode_handle(literal.as_dataset().unwrap());
        let back: Table = handle.materialize(&ctx, &datasets).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn test_renderer_dispatch() {
        let mut datasets = engine_with_ndjson();
        datasets.register_renderer::<Table>(Arc::new(TableRenderer));
        let frame = Frame::new(sample_table());
        let html = datasets.render_html(&frame).unwrap();
        assert!(html.contains("<th>id</th>"));

        let other = Frame::new(42_u8);
        assert!(datasets.render_html(&other).is_none());
    }

    #[test]
    fn test_transformer_literal_type_and_lazy_decode() {
        let datasets = Arc::new(engine_with_ndjson());
        let mut engine = TypeEngine::new();
        engine
            .register(Arc::new(DatasetTransformer::new(Arc::clone(&datasets))))
            .unwrap();
        let (_dir, ctx) = ctx();

        // Primitive column types recurse through the primary engine.
        engine
            .register(Arc::new(crate::builtin::PrimitiveTransformer::new(
                crate::builtin::PrimitiveKind::Int,
            )))
            .unwrap();
        engine
            .register(Arc::new(crate::builtin::PrimitiveTransformer::new(
                crate::builtin::PrimitiveKind::Str,
            )))
            .unwrap();

        let t = NativeType::Dataset {
            columns: vec![
                ("id".to_string(), NativeType::Int),
                ("name".to_string(), NativeType::Str),
            ],
            format: NDJSON.to_string(),
        };
        let lt = engine.literal_type_of(&t).unwrap();
        let TypeKind::Dataset(dataset_type) = &lt.kind else {
            panic!("expected dataset literal type");
        };
        assert_eq!(dataset_type.format, NDJSON);
        assert_eq!(dataset_type.column_names(), ["id", "name"]);

        let table = sample_table();
        let value = NativeValue::Dataset(StructuredDataset::from_frame(table.clone()));
        let literal = engine.to_literal(&ctx, &value, &t, &lt).unwrap();

        let NativeValue::Dataset(handle) = engine.to_native(&ctx, &literal, &t).unwrap() else {
            panic!("expected dataset value");
        };
        assert!(handle.frame().is_none());
        let back: Table = handle.materialize(&ctx, &datasets).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn test_guess_maps_simple_columns() {
        let datasets = Arc::new(DatasetEngine::new());
        let transformer = DatasetTransformer::new(datasets);
        let lt = LiteralType::dataset(StructuredDatasetType::new(typed_columns(), NDJSON));
        let guessed = transformer.guess_native_type(&lt).unwrap();
        assert_eq!(
            guessed,
            NativeType::Dataset {
                columns: vec![
                    ("id".to_string(), NativeType::Int),
                    ("name".to_string(), NativeType::Str),
                ],
                format: NDJSON.to_string(),
            }
        );
    }
}
