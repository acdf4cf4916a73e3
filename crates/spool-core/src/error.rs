//! Errors surfaced by the type engine and its transformers.

use crate::storage::StorageError;

/// Errors that can occur while converting between native values and literals.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// Declared type and runtime value (or requested literal type) disagree.
    #[error("type mismatch: declared {declared}, got {actual}")]
    TypeMismatch { declared: String, actual: String },

    /// Well-typed but semantically invalid value.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// No transformer is registered for the requested type.
    #[error("no transformer registered for {0}")]
    NoTransformer(String),

    /// A non-override registration collided with an existing entry.
    #[error("transformer already registered for {0}")]
    AlreadyRegistered(String),

    /// No dataset encoder matches the (frame, protocol, format) triple.
    #[error("no encoder registered for frame {frame} (protocol \"{protocol}\", format \"{format}\")")]
    NoEncoder {
        frame: String,
        protocol: String,
        format: String,
    },

    /// No dataset decoder matches the (frame, protocol, format) triple.
    #[error("no decoder registered for frame {frame} (protocol \"{protocol}\", format \"{format}\")")]
    NoDecoder {
        frame: String,
        protocol: String,
        format: String,
    },

    /// A wire message could not be mapped back into the model.
    #[error("malformed wire message: {0}")]
    Wire(String),

    /// Payload (de)serialization failed.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Failure reported by the storage collaborator. Never retried.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl TransformError {
    /// Shorthand for a mismatch between a declared type and a value.
    pub fn mismatch(declared: impl ToString, actual: impl ToString) -> Self {
        TransformError::TypeMismatch {
            declared: declared.to_string(),
            actual: actual.to_string(),
        }
    }
}
