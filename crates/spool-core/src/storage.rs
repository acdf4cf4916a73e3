//! Storage access: the injected collaborator that moves bytes.
//!
//! The engine never talks to object stores directly. Every upload and
//! download goes through [`FileAccess`], synchronously; failures are fatal
//! for the operation and never retried here.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Failures reported by a storage provider.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("i/o failure for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unsupported uri: {0}")]
    UnsupportedUri(String),
}

impl StorageError {
    pub fn io(path: impl Into<String>, source: io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

/// The storage-access collaborator.
///
/// `put_*` return the destination URI; `get_data` materializes a URI at a
/// local path. Multipart payloads are URI prefixes under which an arbitrary
/// number of files may exist, so consumers list the prefix instead of
/// assuming names.
pub trait FileAccess: Send + Sync {
    /// Whether a URI points outside the local filesystem.
    fn is_remote(&self, uri: &str) -> bool;

    /// Prefix under which generated uploads land.
    fn raw_output_prefix(&self) -> &str;

    fn join(&self, base: &str, tail: &str) -> String {
        format!("{}/{}", base.trim_end_matches('/'), tail.trim_start_matches('/'))
    }

    /// A fresh path component for generated destinations.
    fn random_name(&self) -> String;

    /// A fresh local scratch path (not created).
    fn random_local_path(&self) -> PathBuf;

    /// Upload a local file to a generated destination under the raw output
    /// prefix. Returns the destination URI.
    fn put_raw_data(&self, local: &Path) -> Result<String, StorageError>;

    /// Upload a local file (or directory when `multipart`) to an explicit
    /// destination. Returns the destination URI.
    fn put_data(&self, local: &Path, dest: &str, multipart: bool) -> Result<String, StorageError>;

    /// Download a URI (or URI prefix when `multipart`) to a local path.
    fn get_data(&self, uri: &str, local: &Path, multipart: bool) -> Result<(), StorageError>;

    /// List the file URIs under a multipart prefix.
    fn list(&self, uri_prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// Sandbox provider backed by a scratch directory.
///
/// URIs under the `sandbox://` scheme resolve to paths below the root;
/// anything with a scheme counts as remote. Used for local execution and
/// tests.
pub struct LocalFileAccess {
    root: PathBuf,
    raw_prefix: String,
}

const SCHEME: &str = "sandbox://";

impl LocalFileAccess {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            raw_prefix: format!("{SCHEME}raw"),
        }
    }

    pub fn with_raw_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.raw_prefix = prefix.into();
        self
    }

    fn resolve(&self, uri: &str) -> Result<PathBuf, StorageError> {
        let rest = uri
            .strip_prefix(SCHEME)
            .ok_or_else(|| StorageError::UnsupportedUri(uri.to_string()))?;
        Ok(self.root.join(rest))
    }
}

impl FileAccess for LocalFileAccess {
    fn is_remote(&self, uri: &str) -> bool {
        uri.contains("://")
    }

    fn raw_output_prefix(&self) -> &str {
        &self.raw_prefix
    }

    fn random_name(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    fn random_local_path(&self) -> PathBuf {
        self.root.join("tmp").join(self.random_name())
    }

    fn put_raw_data(&self, local: &Path) -> Result<String, StorageError> {
        let dest = self.join(&self.raw_prefix, &self.random_name());
        self.put_data(local, &dest, local.is_dir())
    }

    fn put_data(&self, local: &Path, dest: &str, multipart: bool) -> Result<String, StorageError> {
        let target = self.resolve(dest)?;
        if multipart {
            copy_dir(local, &target)?;
        } else {
            copy_file(local, &target)?;
        }
        Ok(dest.to_string())
    }

    fn get_data(&self, uri: &str, local: &Path, multipart: bool) -> Result<(), StorageError> {
        let source = self.resolve(uri)?;
        if !source.exists() {
            return Err(StorageError::NotFound(uri.to_string()));
        }
        if multipart {
            copy_dir(&source, local)?;
        } else {
            copy_file(&source, local)?;
        }
        Ok(())
    }

    fn list(&self, uri_prefix: &str) -> Result<Vec<String>, StorageError> {
        let dir = self.resolve(uri_prefix)?;
        if !dir.is_dir() {
            return Err(StorageError::NotFound(uri_prefix.to_string()));
        }
        let mut names = Vec::new();
        collect_files(&dir, &dir, &mut names)?;
        names.sort();
        Ok(names
            .into_iter()
            .map(|rel| self.join(uri_prefix, &rel))
            .collect())
    }
}

fn copy_file(from: &Path, to: &Path) -> Result<(), StorageError> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|e| StorageError::io(parent.display().to_string(), e))?;
    }
    fs::copy(from, to).map_err(|e| StorageError::io(from.display().to_string(), e))?;
    Ok(())
}

fn copy_dir(from: &Path, to: &Path) -> Result<(), StorageError> {
    fs::create_dir_all(to).map_err(|e| StorageError::io(to.display().to_string(), e))?;
    let entries =
        fs::read_dir(from).map_err(|e| StorageError::io(from.display().to_string(), e))?;
    for entry in entries {
        let entry = entry.map_err(|e| StorageError::io(from.display().to_string(), e))?;
        let path = entry.path();
        let dest = to.join(entry.file_name());
        if path.is_dir() {
            copy_dir(&path, &dest)?;
        } else {
            copy_file(&path, &dest)?;
        }
    }
    Ok(())
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<(), StorageError> {
    let entries = fs::read_dir(dir).map_err(|e| StorageError::io(dir.display().to_string(), e))?;
    for entry in entries {
        let entry = entry.map_err(|e| StorageError::io(dir.display().to_string(), e))?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
        } else if let Ok(rel) = path.strip_prefix(root) {
            out.push(rel.to_string_lossy().replace('\\', "/"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> (tempfile::TempDir, LocalFileAccess) {
        let dir = tempfile::tempdir().unwrap();
        let access = LocalFileAccess::new(dir.path());
        (dir, access)
    }

    #[test]
    fn test_put_and_get_roundtrip() {
        let (dir, access) = sandbox();
        let local = dir.path().join("input.txt");
        fs::write(&local, b"payload").unwrap();

        let uri = access.put_raw_data(&local).unwrap();
        assert!(uri.starts_with("sandbox://raw/"));

        let fetched = access.random_local_path();
        access.get_data(&uri, &fetched, false).unwrap();
        assert_eq!(fs::read(&fetched).unwrap(), b"payload");
    }

    #[test]
    fn test_multipart_roundtrip_and_list() {
        let (dir, access) = sandbox();
        let src = dir.path().join("parts");
        fs::create_dir_all(src.join("sub")).unwrap();
        fs::write(src.join("a.txt"), b"a").unwrap();
        fs::write(src.join("sub/b.txt"), b"b").unwrap();

        let dest = access.join(access.raw_output_prefix(), "batch");
        access.put_data(&src, &dest, true).unwrap();

        let listed = access.list(&dest).unwrap();
        assert_eq!(
            listed,
            vec![
                format!("{dest}/a.txt"),
                format!("{dest}/sub/b.txt"),
            ]
        );

        let fetched = access.random_local_path();
        access.get_data(&dest, &fetched, true).unwrap();
        assert_eq!(fs::read(fetched.join("sub/b.txt")).unwrap(), b"b");
    }

    #[test]
    fn test_missing_uri_fails() {
        let (_dir, access) = sandbox();
        let err = access
            .get_data("sandbox://raw/absent", Path::new("/tmp/x"), false)
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[test]
    fn test_remote_detection() {
        let (_dir, access) = sandbox();
        assert!(access.is_remote("sandbox://raw/x"));
        assert!(access.is_remote("s3://bucket/key"));
        assert!(!access.is_remote("/var/tmp/file"));
    }
}
