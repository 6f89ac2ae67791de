//! Centralized error handling for schemata.
//!
//! Every fallible operation in the crate returns [`Result`], and every failure
//! is one variant of [`SchemaError`]. Nothing in the library panics; the crate
//! root enforces this through `#![deny(clippy::panic)]` and
//! `#![deny(clippy::unwrap_used)]`.
//!
//! ## Error Categories
//!
//! - **Dispatch:** [`SchemaError::UnsupportedFormat`],
//!   [`SchemaError::UnsupportedArchiveFormat`],
//!   [`SchemaError::MissingDependency`]
//! - **Schema:** [`SchemaError::UnknownField`], [`SchemaError::TypeMismatch`],
//!   [`SchemaError::UnknownSchemaType`]
//! - **Encoding rules:** [`SchemaError::InvalidCompressionOptions`],
//!   [`SchemaError::StructuredDataUnsupported`], [`SchemaError::Encoding`],
//!   [`SchemaError::DuplicateDataset`], [`SchemaError::InvalidArray`]
//! - **Storage:** [`SchemaError::Io`], [`SchemaError::Serialization`],
//!   [`SchemaError::Compression`], [`SchemaError::Format`]
//!
//! Validation that can run before any byte is written (extension lookup,
//! compression options, unknown fields, structured data in text output) always
//! does, so those errors never leave a partial file behind.
//!
//! ```rust
//! use schemata::{Format, SchemaError};
//!
//! match Format::from_path("data.csv") {
//!     Err(SchemaError::UnsupportedFormat(ext)) => assert_eq!(ext, "csv"),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use std::fmt;
use std::io;
use std::sync::Arc;

/// A specialized `Result` type for schemata operations.
pub type Result<T> = std::result::Result<T, SchemaError>;

/// The master error enum covering all failure domains.
///
/// This type is `Clone`; I/O errors are wrapped in `Arc` for that purpose.
#[derive(Debug, Clone)]
pub enum SchemaError {
    /// Low-level I/O failure (missing file, permissions, disk full, ...).
    Io(Arc<io::Error>),

    /// Encoding or decoding of an auxiliary document failed (bincode index,
    /// JSON text, bundle index).
    Serialization(String),

    /// Compression or decompression of a dataset chunk failed.
    Compression(String),

    /// The file is corrupted, truncated, or uses a layout this crate does not read.
    Format(String),

    /// The file extension does not map to any registered codec.
    UnsupportedFormat(String),

    /// The bundle output path does not name a supported archive type.
    UnsupportedArchiveFormat(String),

    /// A storage backend required for the requested format was not compiled in.
    MissingDependency(String),

    /// A field name was supplied that the schema does not declare.
    UnknownField {
        /// Name of the schema class.
        schema: String,
        /// The offending key.
        field: String,
    },

    /// A value could not be coerced to the declared field type.
    TypeMismatch {
        /// Field being assigned.
        field: String,
        /// Human readable description of the declared type.
        expected: String,
        /// Human readable description of the rejected value.
        found: String,
    },

    /// The compression algorithm and level combination is not valid.
    InvalidCompressionOptions(String),

    /// A record-array field cannot be written to the text format.
    StructuredDataUnsupported {
        /// The record-array field.
        field: String,
    },

    /// String data could not be encoded or decoded with the requested text encoding.
    Encoding(String),

    /// A dataset with this name already exists in the container being appended to.
    DuplicateDataset(String),

    /// An array was built with inconsistent shape, data, or column layout.
    InvalidArray(String),

    /// A bundle entry names a schema type that is not registered.
    UnknownSchemaType {
        /// Module name recorded in the bundle index.
        module: String,
        /// Class name recorded in the bundle index.
        classname: String,
    },
}

impl SchemaError {
    pub(crate) fn serialization(err: impl fmt::Display) -> Self {
        Self::Serialization(err.to_string())
    }

    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub(crate) fn mismatch(
        field: &str,
        expected: impl fmt::Display,
        found: impl fmt::Display,
    ) -> Self {
        Self::TypeMismatch {
            field: field.to_string(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O Error: {e}"),
            Self::Serialization(s) => write!(f, "Serialization Error: {s}"),
            Self::Compression(s) => write!(f, "Compression Error: {s}"),
            Self::Format(s) => write!(f, "Format Error: {s}"),
            Self::UnsupportedFormat(ext) => {
                write!(f, "Unsupported file format: '{ext}'")
            }
            Self::UnsupportedArchiveFormat(ext) => {
                write!(f, "Unsupported archive format: '{ext}'")
            }
            Self::MissingDependency(s) => write!(f, "Missing dependency: {s}"),
            Self::UnknownField { schema, field } => {
                write!(f, "field '{field}' is not in {schema}")
            }
            Self::TypeMismatch {
                field,
                expected,
                found,
            } => write!(f, "field '{field}' expects {expected}, got {found}"),
            Self::InvalidCompressionOptions(s) => {
                write!(f, "Invalid compression options: {s}")
            }
            Self::StructuredDataUnsupported { field } => write!(
                f,
                "field '{field}' holds structured records, which the text format cannot represent"
            ),
            Self::Encoding(s) => write!(f, "Encoding Error: {s}"),
            Self::DuplicateDataset(name) => {
                write!(f, "dataset '/{name}' already exists")
            }
            Self::InvalidArray(s) => write!(f, "Invalid array: {s}"),
            Self::UnknownSchemaType { module, classname } => {
                write!(f, "schema type {module}::{classname} is not registered")
            }
        }
    }
}

impl std::error::Error for SchemaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for SchemaError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for SchemaError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            return Self::Io(Arc::new(io::Error::other(err.to_string())));
        }
        Self::Serialization(err.to_string())
    }
}

impl From<zip::result::ZipError> for SchemaError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => Self::Io(Arc::new(e)),
            other => Self::Format(other.to_string()),
        }
    }
}
