//! Schemas: column-typed multipart payloads, written and read in chunks.

use crate::context::TransformContext;
use crate::engine::TypeEngine;
use crate::error::TransformError;
use crate::file::Downloader;
use crate::literal::{Literal, Scalar, SchemaLiteral};
use crate::native::{NativeType, NativeValue, TypeKey};
use crate::table::Table;
use crate::transformer::Transformer;
use crate::types::{DatasetColumn, LiteralType, SchemaColumn, SchemaColumnKind, SchemaType, TypeKind};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A schema value: a directory of row chunks plus the column layout they
/// share.
///
/// Like the other blob-backed handles, a schema decoded from a remote
/// literal downloads lazily and at most once; chunk files under the prefix
/// are listed, never assumed by name.
pub struct DataSchema {
    path: String,
    columns: Vec<SchemaColumn>,
    remote_source: Option<String>,
    upload_to: Option<String>,
    downloader: Option<Downloader>,
    downloaded: AtomicBool,
}

impl DataSchema {
    pub fn new(path: impl Into<String>, columns: Vec<SchemaColumn>) -> Self {
        Self {
            path: path.into(),
            columns,
            remote_source: None,
            upload_to: None,
            downloader: None,
            downloaded: AtomicBool::new(false),
        }
    }

    /// A schema staged under a fresh local scratch directory, ready for a
    /// [`SchemaWriter`].
    pub fn staged(ctx: &TransformContext, columns: Vec<SchemaColumn>) -> Self {
        let path = ctx.file_access().random_local_path();
        Self::new(path.to_string_lossy().into_owned(), columns)
    }

    /// Pin the upload destination instead of a generated one.
    pub fn upload_to(mut self, dest: impl Into<String>) -> Self {
        self.upload_to = Some(dest.into());
        self
    }

    pub(crate) fn with_downloader(mut self, source: String, downloader: Downloader) -> Self {
        self.remote_source = Some(source);
        self.downloader = Some(downloader);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn columns(&self) -> &[SchemaColumn] {
        &self.columns
    }

    pub fn remote_source(&self) -> Option<&str> {
        self.remote_source.as_deref()
    }

    pub fn is_downloaded(&self) -> bool {
        self.downloader.is_none() || self.downloaded.load(Ordering::Acquire)
    }

    /// Materialize the chunk prefix locally. Idempotent.
    pub fn download(&self) -> Result<&str, TransformError> {
        if let Some(downloader) = &self.downloader {
            if !self.downloaded.load(Ordering::Acquire) {
                downloader()?;
                self.downloaded.store(true, Ordering::Release);
            }
        }
        Ok(&self.path)
    }

    /// A chunk writer appending to this schema's directory.
    pub fn writer(&self) -> SchemaWriter {
        SchemaWriter {
            dir: PathBuf::from(&self.path),
            columns: self.columns.clone(),
            parts: 0,
        }
    }

    /// A reader over all columns.
    pub fn reader(&self) -> Result<SchemaReader, TransformError> {
        self.reader_for(&[])
    }

    /// A reader projected to the named columns; empty means all.
    pub fn reader_for(&self, names: &[&str]) -> Result<SchemaReader, TransformError> {
        let selected: Vec<&SchemaColumn> = if names.is_empty() {
            self.columns.iter().collect()
        } else {
            let mut selected = Vec::with_capacity(names.len());
            for name in names {
                let column = self
                    .columns
                    .iter()
                    .find(|c| c.name == *name)
                    .ok_or_else(|| {
                        TransformError::InvalidValue(format!("schema has no column {name}"))
                    })?;
                selected.push(column);
            }
            selected
        };
        let columns = selected
            .iter()
            .map(|c| DatasetColumn::new(c.name.clone(), column_literal_type(c.kind)))
            .collect();

        let root = self.download()?.to_string();
        let mut parts = Vec::new();
        collect_parts(Path::new(&root), &mut parts)?;
        parts.sort();
        Ok(SchemaReader {
            parts,
            columns,
            next: 0,
        })
    }
}

fn collect_parts(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), TransformError> {
    let entries = fs::read_dir(dir)
        .map_err(|e| crate::storage::StorageError::io(dir.display().to_string(), e))?;
    for entry in entries {
        let entry =
            entry.map_err(|e| crate::storage::StorageError::io(dir.display().to_string(), e))?;
        let path = entry.path();
        if path.is_dir() {
            collect_parts(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// The literal type a schema column parses as.
fn column_literal_type(kind: SchemaColumnKind) -> LiteralType {
    match kind {
        SchemaColumnKind::Int => LiteralType::int(),
        SchemaColumnKind::Float => LiteralType::float(),
        SchemaColumnKind::Str => LiteralType::string(),
        SchemaColumnKind::Bool => LiteralType::boolean(),
        SchemaColumnKind::Datetime => LiteralType::datetime(),
        SchemaColumnKind::Duration => LiteralType::duration(),
    }
}

impl Clone for DataSchema {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            columns: self.columns.clone(),
            remote_source: self.remote_source.clone(),
            upload_to: self.upload_to.clone(),
            downloader: self.downloader.clone(),
            downloaded: AtomicBool::new(self.downloaded.load(Ordering::Acquire)),
        }
    }
}

impl fmt::Debug for DataSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSchema")
            .field("path", &self.path)
            .field("columns", &self.columns)
            .field("remote_source", &self.remote_source)
            .field("downloaded", &self.is_downloaded())
            .finish()
    }
}

impl PartialEq for DataSchema {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
            && self.columns == other.columns
            && self.upload_to == other.upload_to
    }
}

/// Writes tables as numbered NDJSON chunks under a schema's directory.
pub struct SchemaWriter {
    dir: PathBuf,
    columns: Vec<SchemaColumn>,
    parts: usize,
}

impl SchemaWriter {
    /// Append one table as the next chunk. The table is narrowed to the
    /// schema's columns, which must all be present.
    pub fn write(&mut self, table: &Table) -> Result<(), TransformError> {
        let names: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        let narrowed = table.project(&names)?;
        fs::create_dir_all(&self.dir)
            .map_err(|e| crate::storage::StorageError::io(self.dir.display().to_string(), e))?;
        let part = self.dir.join(format!("part-{:05}", self.parts));
        fs::write(&part, narrowed.to_ndjson()?)
            .map_err(|e| crate::storage::StorageError::io(part.display().to_string(), e))?;
        self.parts += 1;
        Ok(())
    }
}

/// Iterates the chunks of a schema as typed tables.
pub struct SchemaReader {
    parts: Vec<PathBuf>,
    columns: Vec<DatasetColumn>,
    next: usize,
}

impl SchemaReader {
    /// The next chunk, or `None` when exhausted.
    pub fn next_table(&mut self) -> Result<Option<Table>, TransformError> {
        let Some(part) = self.parts.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;
        let text = fs::read_to_string(part)
            .map_err(|e| crate::storage::StorageError::io(part.display().to_string(), e))?;
        Ok(Some(Table::from_ndjson(&text, &self.columns)?))
    }

    /// All remaining chunks concatenated into one table.
    pub fn all(&mut self) -> Result<Table, TransformError> {
        let mut combined = Table::new(self.columns.iter().map(|c| c.name.clone()).collect());
        while let Some(chunk) = self.next_table()? {
            for row in chunk.rows() {
                combined.push_row(row.clone())?;
            }
        }
        Ok(combined)
    }
}

/// Transformer for schema-typed values.
pub struct SchemaTransformer;

impl SchemaTransformer {
    fn declared_columns(declared: &NativeType) -> Result<Vec<SchemaColumn>, TransformError> {
        let NativeType::Schema(columns) = declared else {
            return Err(TransformError::mismatch("schema", declared));
        };
        Ok(columns
            .iter()
            .map(|(name, kind)| SchemaColumn::new(name.clone(), *kind))
            .collect())
    }
}

impl Transformer for SchemaTransformer {
    fn name(&self) -> &str {
        "schema"
    }

    fn key(&self) -> TypeKey {
        TypeKey::Schema
    }

    fn literal_type(
        &self,
        _engine: &TypeEngine,
        t: &NativeType,
    ) -> Result<LiteralType, TransformError> {
        Ok(LiteralType::schema(SchemaType {
            columns: Self::declared_columns(t)?,
        }))
    }

    fn to_literal(
        &self,
        _engine: &TypeEngine,
        ctx: &TransformContext,
        value: &NativeValue,
        declared: &NativeType,
        _expected: &LiteralType,
    ) -> Result<Literal, TransformError> {
        let NativeValue::Schema(schema) = value else {
            return Err(TransformError::mismatch(declared, value.kind_name()));
        };
        let mut columns = Self::declared_columns(declared)?;
        if columns.is_empty() {
            columns = schema.columns().to_vec();
        }
        let kind = SchemaType { columns };

        // A handle decoded from remote data converts straight back.
        if let Some(remote) = schema.remote_source() {
            return Ok(Literal::scalar(Scalar::Schema(SchemaLiteral {
                uri: remote.to_string(),
                kind,
            })));
        }

        let access = ctx.file_access();
        if access.is_remote(schema.path()) {
            return Ok(Literal::scalar(Scalar::Schema(SchemaLiteral {
                uri: schema.path().to_string(),
                kind,
            })));
        }
        if !Path::new(schema.path()).is_dir() {
            return Err(TransformError::InvalidValue(format!(
                "{} is not a directory of schema chunks",
                schema.path()
            )));
        }
        let dest = match &schema.upload_to {
            Some(dest) => dest.clone(),
            None => access.join(access.raw_output_prefix(), &access.random_name()),
        };
        let uri = access.put_data(Path::new(schema.path()), &dest, true)?;
        Ok(Literal::scalar(Scalar::Schema(SchemaLiteral { uri, kind })))
    }

    fn to_native(
        &self,
        _engine: &TypeEngine,
        ctx: &TransformContext,
        literal: &Literal,
        declared: &NativeType,
    ) -> Result<NativeValue, TransformError> {
        let Some(Scalar::Schema(stored)) = literal.as_scalar() else {
            return Err(TransformError::mismatch(declared, "non-schema literal"));
        };
        let mut columns = Self::declared_columns(declared)?;
        if columns.is_empty() {
            columns = stored.kind.columns.clone();
        }
        let uri = stored.uri.clone();

        let access = ctx.file_access();
        if !access.is_remote(&uri) {
            return Ok(NativeValue::Schema(DataSchema::new(uri, columns)));
        }

        let local = access.random_local_path();
        let fetch_access = Arc::clone(access);
        let fetch_uri = uri.clone();
        let fetch_local = local.clone();
        let downloader: Downloader =
            Arc::new(move || fetch_access.get_data(&fetch_uri, &fetch_local, true));
        Ok(NativeValue::Schema(
            DataSchema::new(local.to_string_lossy().into_owned(), columns)
                .with_downloader(uri, downloader),
        ))
    }

    fn guess_native_type(&self, literal_type: &LiteralType) -> Option<NativeType> {
        match &literal_type.kind {
            TypeKind::Schema(schema) => Some(NativeType::Schema(
                schema
                    .columns
                    .iter()
                    .map(|c| (c.name.clone(), c.kind))
                    .collect(),
            )),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> (tempfile::TempDir, TransformContext) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = TransformContext::sandbox(dir.path());
        (dir, ctx)
    }

    fn score_columns() -> Vec<SchemaColumn> {
        vec![
            SchemaColumn::new("id", SchemaColumnKind::Int),
            SchemaColumn::new("score", SchemaColumnKind::Float),
        ]
    }

    fn chunk(ids: &[i64]) -> Table {
        let mut table = Table::new(vec!["id".into(), "score".into()]);
        for id in ids {
            table
                .push_row(vec![NativeValue::Int(*id), NativeValue::Float(*id as f64 / 2.0)])
                .unwrap();
        }
        table
    }

    #[test]
    fn test_writer_reader_roundtrip() {
        let (_dir, ctx) = ctx();
        let schema = DataSchema::staged(&ctx, score_columns());

        let mut writer = schema.writer();
        writer.write(&chunk(&[1, 2])).unwrap();
        writer.write(&chunk(&[3])).unwrap();

        let mut reader = schema.reader().unwrap();
        let first = reader.next_table().unwrap().unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first.rows()[0][0], NativeValue::Int(1));
        let second = reader.next_table().unwrap().unwrap();
        assert_eq!(second.len(), 1);
        assert!(reader.next_table().unwrap().is_none());
    }

    #[test]
    fn test_reader_projection() {
        let (_dir, ctx) = ctx();
        let schema = DataSchema::staged(&ctx, score_columns());
        schema.writer().write(&chunk(&[7])).unwrap();

        let combined = schema.reader_for(&["score"]).unwrap().all().unwrap();
        assert_eq!(combined.columns(), ["score".to_string()]);
        assert_eq!(combined.rows()[0][0], NativeValue::Float(3.5));

        assert!(schema.reader_for(&["missing"]).is_err());
    }

    #[test]
    fn test_writer_requires_schema_columns() {
        let (_dir, ctx) = ctx();
        let schema = DataSchema::staged(&ctx, score_columns());
        let mut writer = schema.writer();
        let stray = Table::new(vec!["unrelated".into()]);
        assert!(writer.write(&stray).is_err());
    }

    #[test]
    fn test_transformer_roundtrip_lazy() {
        let (_dir, ctx) = ctx();
        let engine = TypeEngine::new();
        let schema = DataSchema::staged(&ctx, score_columns());
        let mut writer = schema.writer();
        writer.write(&chunk(&[1, 2, 3])).unwrap();

        let declared = NativeType::Schema(vec![
            ("id".to_string(), SchemaColumnKind::Int),
            ("score".to_string(), SchemaColumnKind::Float),
        ]);
        let lt = SchemaTransformer.literal_type(&engine, &declared).unwrap();
        let lit = SchemaTransformer
            .to_literal(&engine, &ctx, &NativeValue::Schema(schema), &declared, &lt)
            .unwrap();
        let Some(Scalar::Schema(stored)) = lit.as_scalar() else {
            panic!("expected schema scalar");
        };
        assert!(stored.uri.starts_with("sandbox://raw/"));
        assert_eq!(stored.kind.columns.len(), 2);

        let NativeValue::Schema(decoded) = SchemaTransformer
            .to_native(&engine, &ctx, &lit, &declared)
            .unwrap()
        else {
            panic!("expected schema value");
        };
        assert!(!decoded.is_downloaded());

        let combined = decoded.reader().unwrap().all().unwrap();
        assert_eq!(combined.len(), 3);
        assert!(decoded.is_downloaded());

        // Reading again does not refetch.
        decoded.reader().unwrap().all().unwrap();
    }

    #[test]
    fn test_decoded_remote_schema_reencodes_without_upload() {
        let (_dir, ctx) = ctx();
        let engine = TypeEngine::new();
        let declared = NativeType::Schema(vec![("id".to_string(), SchemaColumnKind::Int)]);
        let lit = Literal::scalar(Scalar::Schema(SchemaLiteral {
            uri: "sandbox://raw/shared".into(),
            kind: SchemaType {
                columns: vec![SchemaColumn::new("id", SchemaColumnKind::Int)],
            },
        }));

        let decoded = SchemaTransformer
            .to_native(&engine, &ctx, &lit, &declared)
            .unwrap();
        let lt = SchemaTransformer.literal_type(&engine, &declared).unwrap();
        let again = SchemaTransformer
            .to_literal(&engine, &ctx, &decoded, &declared, &lt)
            .unwrap();
        let Some(Scalar::Schema(stored)) = again.as_scalar() else {
            panic!("expected schema scalar");
        };
        assert_eq!(stored.uri, "sandbox://raw/shared");
    }

    #[test]
    fn test_guess() {
        let lt = LiteralType::schema(SchemaType {
            columns: score_columns(),
        });
        let guessed = SchemaTransformer.guess_native_type(&lt).unwrap();
        assert_eq!(
            guessed,
            NativeType::Schema(vec![
                ("id".to_string(), SchemaColumnKind::Int),
                ("score".to_string(), SchemaColumnKind::Float),
            ])
        );
    }
}
