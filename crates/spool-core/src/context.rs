//! Execution context threaded through every transformer call.

use crate::storage::{FileAccess, LocalFileAccess};
use std::path::PathBuf;
use std::sync::Arc;

/// Ambient state for a transform: the storage collaborator and any
/// per-call settings. The engine never constructs this on its own (other
/// than the sandbox convenience below); the caller owns it, and it is
/// treated as immutable for the duration of a call.
#[derive(Clone)]
pub struct TransformContext {
    file_access: Arc<dyn FileAccess>,
}

impl TransformContext {
    pub fn new(file_access: Arc<dyn FileAccess>) -> Self {
        Self { file_access }
    }

    /// Context over a local sandbox root. Intended for tests and local runs.
    pub fn sandbox(root: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(LocalFileAccess::new(root)))
    }

    pub fn file_access(&self) -> &Arc<dyn FileAccess> {
        &self.file_access
    }
}
