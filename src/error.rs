use crate::config::ConfigError;
use crate::schema::{FieldType, Violation};
use crate::store::StoreError;
use thiserror::Error;

/// Top-level error type for the schemakv library.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// No schema or namespace record at `key`.
    #[error("no record stored at '{key}'")]
    NotFound { key: String },

    /// The field is not in the schema, or it is but has no stored value.
    #[error("field '{field}' not found")]
    FieldNotFound { field: String },

    #[error("cannot convert '{value}' to {expected}")]
    TypeConversion { value: String, expected: FieldType },

    #[error("value '{value}' for field '{field}' rejected: {violation}")]
    ConstraintViolation {
        field: String,
        value: String,
        violation: Violation,
    },

    #[error("failed to decode record at '{key}': {source}")]
    Decode {
        key: String,
        source: serde_json::Error,
    },

    #[error("failed to encode schema fields: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("field '{field}' declared more than once")]
    DuplicateField { field: String },

    #[error("config target must be a record type, got {found}")]
    InvalidTarget { found: String },

    #[error("failed to populate config record: {0}")]
    Load(String),

    #[error("path '{path}' not present in key tree")]
    PathNotFound { path: String },

    #[error("client requires a backing store")]
    MissingStore,

    #[error("backing store error: {0}")]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    pub(crate) fn field_not_found(field: impl Into<String>) -> Self {
        Error::FieldNotFound {
            field: field.into(),
        }
    }
}
