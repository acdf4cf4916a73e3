//! Multipart blobs: directory prefixes of files.

use crate::context::TransformContext;
use crate::engine::TypeEngine;
use crate::error::TransformError;
use crate::file::Downloader;
use crate::literal::{Blob, Literal, Scalar};
use crate::native::{NativeType, NativeValue, TypeKey};
use crate::transformer::Transformer;
use crate::types::{BlobDimensionality, BlobType, LiteralType};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A directory value: the multipart counterpart of a file handle.
///
/// Downloads fetch the whole prefix into a local directory, lazily and at
/// most once. The set of files under the prefix is open-ended; use
/// [`DataDir::entries`] after download, or list the remote prefix through
/// the collaborator without downloading.
pub struct DataDir {
    path: String,
    format: String,
    remote_source: Option<String>,
    upload_to: Option<String>,
    no_upload: bool,
    downloader: Option<Downloader>,
    downloaded: AtomicBool,
}

impl DataDir {
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

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn upload_to(mut self, dest: impl Into<String>) -> Self {
        self.upload_to = Some(dest.into());
        self
    }

    pub fn no_upload(mut self) -> Self {
        self.no_upload = true;
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

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn remote_source(&self) -> Option<&str> {
        self.remote_source.as_deref()
    }

    pub fn is_downloaded(&self) -> bool {
        self.downloader.is_none() || self.downloaded.load(Ordering::Acquire)
    }

    /// Materialize the prefix locally. Idempotent.
    pub fn download(&self) -> Result<&str, TransformError> {
        if let Some(downloader) = &self.downloader {
            if !self.downloaded.load(Ordering::Acquire) {
                downloader()?;
                self.downloaded.store(true, Ordering::Release);
            }
        }
        Ok(&self.path)
    }

    /// Download if needed, then list the local files, sorted.
    pub fn entries(&self) -> Result<Vec<std::path::PathBuf>, TransformError> {
        let root = self.download()?.to_string();
        let mut found = Vec::new();
        collect(Path::new(&root), &mut found)?;
        found.sort();
        Ok(found)
    }
}

fn collect(dir: &Path, out: &mut Vec<std::path::PathBuf>) -> Result<(), TransformError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| crate::storage::StorageError::io(dir.display().to_string(), e))?;
    for entry in entries {
        let entry =
            entry.map_err(|e| crate::storage::StorageError::io(dir.display().to_string(), e))?;
        let path = entry.path();
        if path.is_dir() {
            collect(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

impl Clone for DataDir {
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

impl fmt::Debug for DataDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataDir")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("remote_source", &self.remote_source)
            .field("downloaded", &self.is_downloaded())
            .finish()
    }
}

impl PartialEq for DataDir {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
            && self.format == other.format
            && self.upload_to == other.upload_to
            && self.no_upload == other.no_upload
    }
}

/// Transformer for multipart blobs.
pub struct DirTransformer;

impl DirTransformer {
    fn declared_format(declared: &NativeType) -> Result<&str, TransformError> {
        match declared {
            NativeType::Directory { format } => Ok(format),
            other => Err(TransformError::mismatch("directory", other)),
        }
    }

    fn blob_type(format: &str) -> BlobType {
        BlobType::multipart(format)
    }

    fn blob_literal(uri: impl Into<String>, format: &str) -> Literal {
        Literal::scalar(Scalar::Blob(Blob::new(uri, Self::blob_type(format))))
    }
}

impl Transformer for DirTransformer {
    fn name(&self) -> &str {
        "directory"
    }

    fn key(&self) -> TypeKey {
        TypeKey::Directory
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

        let (source, should_upload, upload_dest) = match value {
            NativeValue::Directory(dir) => {
                if let Some(remote) = dir.remote_source() {
                    return Ok(Self::blob_literal(remote, format));
                }
                let should = !dir.no_upload && !access.is_remote(dir.path());
                (dir.path().to_string(), should, dir.upload_to.clone())
            }
            NativeValue::Str(path) => {
                let should = !access.is_remote(path);
                (path.clone(), should, None)
            }
            other => {
                return Err(TransformError::mismatch(declared, other.kind_name()));
            }
        };

        if !should_upload {
            return Ok(Self::blob_literal(source, format));
        }

        if !Path::new(&source).is_dir() {
            return Err(TransformError::InvalidValue(format!(
                "{source} is not a directory"
            )));
        }
        let dest = match upload_dest {
            Some(dest) => dest,
            None => access.join(access.raw_output_prefix(), &access.random_name()),
        };
        let uri = access.put_data(Path::new(&source), &dest, true)?;
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

        let access = ctx.file_access();
        if !access.is_remote(&uri) {
            return Ok(NativeValue::Directory(
                DataDir::new(uri).with_format(format),
            ));
        }

        let local = access.random_local_path();
        let fetch_access = Arc::clone(access);
        let fetch_uri = uri.clone();
        let fetch_local = local.clone();
        let downloader: Downloader =
            Arc::new(move || fetch_access.get_data(&fetch_uri, &fetch_local, true));
        Ok(NativeValue::Directory(
            DataDir::new(local.to_string_lossy().into_owned())
                .with_format(format)
                .with_downloader(uri, downloader),
        ))
    }

    fn guess_native_type(&self, literal_type: &LiteralType) -> Option<NativeType> {
        let blob = literal_type.as_blob()?;
        if blob.dimensionality == BlobDimensionality::Multipart {
            Some(NativeType::directory(blob.format.clone()))
        } else {
            None
        }
    }
}
