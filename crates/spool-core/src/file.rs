//! Single-blob files: remote-aware path wrappers with lazy download.

use crate::context::TransformContext;
use crate::engine::TypeEngine;
use crate::error::TransformError;
use crate::literal::{Blob, Literal, Scalar};
use crate::native::{NativeType, NativeValue, TypeKey};
use crate::storage::{FileAccess, StorageError};
use crate::transformer::Transformer;
use crate::types::{BlobDimensionality, BlobType, LiteralType};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

pub(crate) type Downloader = Arc<dyn Fn() -> Result<(), StorageError> + Send + Sync>;

/// A file value: a path users can open, plus enough bookkeeping to defer
/// the actual byte movement.
///
/// A handle decoded from a remote blob starts as a pure reference; the
/// first [`DataFile::download`] (or [`DataFile::open`]) materializes it at
/// its local path, exactly once. Handles over local paths never touch
/// storage.
pub struct DataFile {
    path: String,
    format: String,
    remote_source: Option<String>,
    upload_to: Option<String>,
    no_upload: bool,
    downloader: Option<Downloader>,
    downloaded: AtomicBool,
}

impl DataFile {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            format: String::new(),
            remote_source: None,
            upload_to: None,
            no_upload: false,
            downloader: None,
            downloaded: AtomicBool::new(false),
        }
    }

    /// A handle pointing at a fresh upload destination under the context's
    /// output prefix.
    pub fn new_remote(ctx: &TransformContext) -> Self {
        let access = ctx.file_access();
        let path = access.join(access.raw_output_prefix(), &access.random_name());
        Self::new(path)
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// Pin the upload destination instead of a generated one.
    pub fn upload_to(mut self, dest: impl Into<String>) -> Self {
        self.upload_to = Some(dest.into());
        self
    }

    /// Escape hatch: reference pre-existing data, never upload.
    pub fn no_upload(mut self) -> Self {
        self.no_upload = true;
        self
    }

    pub(crate) fn with_downloader(mut self, source: String, downloader: Downloader) -> Self {
        self.remote_source = Some(source);
        self.downloader = Some(downloader);
        self
    }

    /// The local path (once downloaded) or source path.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    /// The original remote URI, when this handle was decoded from one.
    pub fn remote_source(&self) -> Option<&str> {
        self.remote_source.as_deref()
    }

    pub fn is_downloaded(&self) -> bool {
        self.downloader.is_none() || self.downloaded.load(Ordering::Acquire)
    }

    /// Materialize the file locally. Idempotent: repeated calls perform at
    /// most one storage fetch; handles without a remote source are no-ops.
    pub fn download(&self) -> Result<&str, TransformError> {
        if let Some(downloader) = &self.downloader {
            if !self.downloaded.load(Ordering::Acquire) {
                downloader()?;
                self.downloaded.store(true, Ordering::Release);
            }
        }
        Ok(&self.path)
    }

    /// Download if needed, then open for reading.
    pub fn open(&self) -> Result<fs::File, TransformError> {
        let path = self.download()?;
        fs::File::open(path)
            .map_err(|e| StorageError::io(path.to_string(), e).into())
    }
}

impl Clone for DataFile {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            format: self.format.clone(),
            remote_source: self.remote_source.clone(),
            upload_to: self.upload_to.clone(),
            no_upload: self.no_upload,
            downloader: self.downloader.clone(),
            downloaded: AtomicBool::new(self.downloaded.load(Ordering::Acquire)),
        }
    }
}

impl fmt::Debug for DataFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataFile")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("remote_source", &self.remote_source)
            .field("downloaded", &self.is_downloaded())
            .finish()
    }
}

impl PartialEq for DataFile {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
            && self.format == other.format
            && self.upload_to == other.upload_to
            && self.no_upload == other.no_upload
    }
}

/// Transformer for single-blob files, also serving plain-path declarations.
pub struct FileTransformer;

impl FileTransformer {
    fn declared_format(declared: &NativeType) -> Result<&str, TransformError> {
        match declared {
            NativeType::File { format } => Ok(format),
            NativeType::Path => Ok(""),
            other => Err(TransformError::mismatch("file", other)),
        }
    }

    fn blob_type(format: &str) -> BlobType {
        BlobType::single(format)
    }

    fn blob_literal(uri: impl Into<String>, format: &str) -> Literal {
        Literal::scalar(Scalar::Blob(Blob::new(uri, Self::blob_type(format))))
    }
}

impl Transformer for FileTransformer {
    fn name(&self) -> &str {
        "file"
    }

    fn key(&self) -> TypeKey {
        TypeKey::File
    }

    fn literal_type(
        &self,
        _engine: &TypeEngine,
        t: &NativeType,
    ) -> Result<LiteralType, TransformError> {
        Ok(LiteralType::blob(Self::blob_type(Self::declared_format(t)?)))
    }

    fn to_literal(
        &self,
        _engine: &TypeEngine,
        ctx: &TransformContext,
        value: &NativeValue,
        declared: &NativeType,
        _expected: &LiteralType,
    ) -> Result<Literal, TransformError> {
        let format = Self::declared_format(declared)?;
        let access = ctx.file_access();

        let (source, mut should_upload, upload_dest) = match value {
            NativeValue::File(file) => {
                // A handle decoded from remote data converts straight back
                // to its original URI; nothing moved, nothing to move.
                if let Some(remote) = file.remote_source() {
                    return Ok(Self::blob_literal(remote, format));
                }
                let should = !file.no_upload && !access.is_remote(file.path());
                (file.path().to_string(), should, file.upload_to.clone())
            }
            NativeValue::Str(path) => {
                let should = !access.is_remote(path);
                (path.clone(), should, None)
            }
            other => {
                return Err(TransformError::mismatch(declared, other.kind_name()));
            }
        };

        if matches!(declared, NativeType::Path) {
            if matches!(value, NativeValue::File(_)) {
                warn!(
                    path = %source,
                    "file handle declared as a plain path; skipping upload"
                );
            }
            should_upload = false;
        }

        validate_format(access, &source, format)?;

        if !should_upload {
            return Ok(Self::blob_literal(source, format));
        }

        if !Path::new(&source).is_file() {
            return Err(TransformError::InvalidValue(format!(
                "{source} is not a file"
            )));
        }
        let uri = match upload_dest {
            Some(dest) => access.put_data(Path::new(&source), &dest, false)?,
            None => access.put_raw_data(Path::new(&source))?,
        };
        Ok(Self::blob_literal(uri, format))
    }

    fn to_native(
        &self,
        _engine: &TypeEngine,
        ctx: &TransformContext,
        literal: &Literal,
        declared: &NativeType,
    ) -> Result<NativeValue, TransformError> {
        let format = Self::declared_format(declared)?;
        let Some(blob) = literal.as_blob() else {
            return Err(TransformError::mismatch(declared, "non-blob literal"));
        };
        let uri = blob.uri.clone();

        // Plain-path declarations get an inert wrapper, remote or not.
        if matches!(declared, NativeType::Path) {
            return Ok(NativeValue::File(DataFile::new(uri)));
        }

        let access = ctx.file_access();
        if !access.is_remote(&uri) {
            return Ok(NativeValue::File(DataFile::new(uri).with_format(format)));
        }

        let local = access.random_local_path();
        let fetch_access = Arc::clone(access);
        let fetch_uri = uri.clone();
        let fetch_local = local.clone();
        let downloader: Downloader =
            Arc::new(move || fetch_access.get_data(&fetch_uri, &fetch_local, false));
        Ok(NativeValue::File(
            DataFile::new(local.to_string_lossy().into_owned())
                .with_format(format)
                .with_downloader(uri, downloader),
        ))
    }

    fn guess_native_type(&self, literal_type: &LiteralType) -> Option<NativeType> {
        let blob = literal_type.as_blob()?;
        if blob.dimensionality == BlobDimensionality::Single
            && blob.format != crate::builtin::OPAQUE_FORMAT
        {
            Some(NativeType::file(blob.format.clone()))
        } else {
            None
        }
    }
}

/// Opportunistic content check for local files with a declared format.
/// Requires the `magic` feature; otherwise (and for remote or unformatted
/// paths) it is skipped.
#[cfg(feature = "magic")]
fn validate_format(
    access: &Arc<dyn FileAccess>,
    source: &str,
    format: &str,
) -> Result<(), TransformError> {
    if format.is_empty() || access.is_remote(source) {
        return Ok(());
    }
    let Some(expected) = format_mime(format) else {
        return Ok(());
    };
    let Ok(db) = magic_db::load() else {
        return Ok(());
    };
    let Ok(data) = fs::read(source) else {
        return Ok(());
    };
    let mut cursor = std::io::Cursor::new(data.as_slice());
    let Ok(magic) = db.best_magic(&mut cursor) else {
        return Ok(());
    };
    let actual = magic.mime_type();
    if actual != expected {
        return Err(TransformError::InvalidValue(format!(
            "{source}: declared format {format} ({expected}), sniffed {actual}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "magic"))]
fn validate_format(
    _access: &Arc<dyn FileAccess>,
    _source: &str,
    _format: &str,
) -> Result<(), TransformError> {
    Ok(())
}

#[cfg(feature = "magic")]
fn format_mime(format: &str) -> Option<&'static str> {
    match format {
        "json" => Some("application/json"),
        "csv" => Some("text/csv"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "pdf" => Some("application/pdf"),
        "zip" => Some("application/zip"),
        "gz" => Some("application/gzip"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalFileAccess;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize;

    /// Counting wrapper so tests can observe collaborator traffic.
    struct CountingAccess {
        inner: LocalFileAccess,
        gets: AtomicUsize,
        puts: AtomicUsize,
    }

    impl CountingAccess {
        fn new(root: &Path) -> Self {
            Self {
                inner: LocalFileAccess::new(root),
                gets: AtomicUsize::new(0),
                puts: AtomicUsize::new(0),
            }
        }
    }

    impl FileAccess for CountingAccess {
        fn is_remote(&self, uri: &str) -> bool {
            self.inner.is_remote(uri)
        }

        fn raw_output_prefix(&self) -> &str {
            self.inner.raw_output_prefix()
        }

        fn random_name(&self) -> String {
            self.inner.random_name()
        }

        fn random_local_path(&self) -> PathBuf {
            self.inner.random_local_path()
        }

        fn put_raw_data(&self, local: &Path) -> Result<String, StorageError> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            self.inner.put_raw_data(local)
        }

        fn put_data(
            &self,
            local: &Path,
            dest: &str,
            multipart: bool,
        ) -> Result<String, StorageError> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            self.inner.put_data(local, dest, multipart)
        }

        fn get_data(&self, uri: &str, local: &Path, multipart: bool) -> Result<(), StorageError> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.inner.get_data(uri, local, multipart)
        }

        fn list(&self, uri_prefix: &str) -> Result<Vec<String>, StorageError> {
            self.inner.list(uri_prefix)
        }
    }

    fn counting_ctx() -> (tempfile::TempDir, Arc<CountingAccess>, TransformContext) {
        let dir = tempfile::tempdir().unwrap();
        let access = Arc::new(CountingAccess::new(dir.path()));
        let ctx = TransformContext::new(Arc::clone(&access) as Arc<dyn FileAccess>);
        (dir, access, ctx)
    }

    fn write_sample(dir: &Path, name: &str, contents: &[u8]) -> String {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_local_file_uploads() {
        let (dir, access, ctx) = counting_ctx();
        let engine = TypeEngine::new();
        let source = write_sample(dir.path(), "input.csv", b"a,b\n1,2\n");

        let t = NativeType::file("csv");
        let lit = FileTransformer
            .to_literal(
                &engine,
                &ctx,
                &NativeValue::File(DataFile::new(&source).with_format("csv")),
                &t,
                &LiteralType::blob(BlobType::single("csv")),
            )
            .unwrap();

        let blob = lit.as_blob().unwrap();
        assert!(blob.uri.starts_with("sandbox://raw/"));
        assert_eq!(blob.metadata.kind.format, "csv");
        assert_eq!(access.puts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remote_uri_skips_upload() {
        let (_dir, access, ctx) = counting_ctx();
        let engine = TypeEngine::new();
        let t = NativeType::file("");

        let lit = FileTransformer
            .to_literal(
                &engine,
                &ctx,
                &NativeValue::Str("s3://bucket/key".into()),
                &t,
                &LiteralType::blob(BlobType::single("")),
            )
            .unwrap();
        assert_eq!(lit.as_blob().unwrap().uri, "s3://bucket/key");
        assert_eq!(access.puts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_no_upload_escape_hatch() {
        let (dir, access, ctx) = counting_ctx();
        let engine = TypeEngine::new();
        let source = write_sample(dir.path(), "kept.bin", b"x");

        let value = NativeValue::File(DataFile::new(&source).no_upload());
        let lit = FileTransformer
            .to_literal(
                &engine,
                &ctx,
                &value,
                &NativeType::file(""),
                &LiteralType::blob(BlobType::single("")),
            )
            .unwrap();
        assert_eq!(lit.as_blob().unwrap().uri, source);
        assert_eq!(access.puts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_plain_path_declaration_skips_upload() {
        let (dir, access, ctx) = counting_ctx();
        let engine = TypeEngine::new();
        let source = write_sample(dir.path(), "raw.txt", b"x");

        let lit = FileTransformer
            .to_literal(
                &engine,
                &ctx,
                &NativeValue::File(DataFile::new(&source)),
                &NativeType::Path,
                &LiteralType::blob(BlobType::single("")),
            )
            .unwrap();
        assert_eq!(lit.as_blob().unwrap().uri, source);
        assert_eq!(access.puts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_local_file_fails() {
        let (_dir, _access, ctx) = counting_ctx();
        let engine = TypeEngine::new();
        let err = FileTransformer
            .to_literal(
                &engine,
                &ctx,
                &NativeValue::Str("/definitely/not/here".into()),
                &NativeType::file(""),
                &LiteralType::blob(BlobType::single("")),
            )
            .unwrap_err();
        assert!(matches!(err, TransformError::InvalidValue(_)));
    }

    #[test]
    fn test_lazy_download_is_deferred_and_idempotent() {
        let (dir, access, ctx) = counting_ctx();
        let engine = TypeEngine::new();

        // Stage a remote blob.
        let source = write_sample(dir.path(), "payload.txt", b"remote bytes");
        let uri = access.put_raw_data(Path::new(&source)).unwrap();
        let lit = FileTransformer::blob_literal(&uri, "");
        let gets_before = access.gets.load(Ordering::SeqCst);

        let value = FileTransformer
            .to_native(&engine, &ctx, &lit, &NativeType::file(""))
            .unwrap();
        let NativeValue::File(file) = value else {
            panic!("expected file value");
        };

        // Construction alone has not touched the collaborator.
        assert_eq!(access.gets.load(Ordering::SeqCst), gets_before);
        assert!(!file.is_downloaded());
        assert_eq!(file.remote_source(), Some(uri.as_str()));

        // First open downloads; later opens reuse the local copy.
        let mut contents = String::new();
        use std::io::Read;
        file.open().unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "remote bytes");
        assert_eq!(access.gets.load(Ordering::SeqCst), gets_before + 1);

        file.open().unwrap();
        file.download().unwrap();
        assert_eq!(access.gets.load(Ordering::SeqCst), gets_before + 1);
        assert!(file.is_downloaded());
    }

    #[test]
    fn test_decoded_remote_file_roundtrips_without_reupload() {
        let (dir, access, ctx) = counting_ctx();
        let engine = TypeEngine::new();

        let source = write_sample(dir.path(), "data.bin", b"abc");
        let uri = access.put_raw_data(Path::new(&source)).unwrap();
        let lit = FileTransformer::blob_literal(&uri, "");

        let value = FileTransformer
            .to_native(&engine, &ctx, &lit, &NativeType::file(""))
            .unwrap();
        let puts_before = access.puts.load(Ordering::SeqCst);

        let lit2 = FileTransformer
            .to_literal(
                &engine,
                &ctx,
                &value,
                &NativeType::file(""),
                &LiteralType::blob(BlobType::single("")),
            )
            .unwrap();
        assert_eq!(lit2.as_blob().unwrap().uri, uri);
        assert_eq!(access.puts.load(Ordering::SeqCst), puts_before);
    }

    #[test]
    fn test_local_literal_decodes_to_inert_handle() {
        let (dir, access, ctx) = counting_ctx();
        let engine = TypeEngine::new();
        let source = write_sample(dir.path(), "local.txt", b"here");
        let lit = FileTransformer::blob_literal(&source, "");

        let NativeValue::File(file) = FileTransformer
            .to_native(&engine, &ctx, &lit, &NativeType::file(""))
            .unwrap()
        else {
            panic!("expected file");
        };
        assert!(file.is_downloaded());
        assert_eq!(file.path(), source);
        file.open().unwrap();
        assert_eq!(access.gets.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_guess_excludes_opaque_format() {
        let t = FileTransformer
            .guess_native_type(&LiteralType::blob(BlobType::single("csv")))
            .unwrap();
        assert_eq!(t, NativeType::file("csv"));

        assert!(
            FileTransformer
                .guess_native_type(&LiteralType::blob(BlobType::single(
                    crate::builtin::OPAQUE_FORMAT
                )))
                .is_none()
        );
        assert!(
            FileTransformer
                .guess_native_type(&LiteralType::blob(BlobType::multipart("")))
                .is_none()
        );
    }
}
