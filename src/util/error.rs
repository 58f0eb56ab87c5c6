//! Error types for the asset bundle reader.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for container and asset operations.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Magic, version or size sanity checks failed; another decoder may apply
    #[error("Not a recognised container: {0}")]
    FormatMismatch(String),

    /// Decompressed index or object table is malformed
    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    /// Object references a type id with no resolvable schema
    #[error("No schema for object {path_id} (type id {type_id})")]
    UnsupportedSchema { path_id: i64, type_id: i32 },

    /// External payload could not be located
    #[error("Missing external resource: {0}")]
    MissingResource(String),

    /// A block decompressed to a different length than declared
    #[error("Decompressed size mismatch: expected {expected} bytes, got {actual}")]
    DecompressionSizeMismatch { expected: usize, actual: usize },

    /// Codec reported a failure
    #[error("Decompression failed: {0}")]
    Decompression(String),

    /// Read past the end of a source or object
    #[error("Unexpected end of data at position {0}")]
    UnexpectedEof(u64),

    /// Object bytes do not match the shape its schema describes
    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    /// Memory mapping failed
    #[error("Memory mapping failed: {0}")]
    MmapFailed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl Error {
    /// Create a format mismatch error.
    pub fn mismatch(msg: impl Into<String>) -> Self {
        Self::FormatMismatch(msg.into())
    }

    /// Create a corrupt index error.
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptIndex(msg.into())
    }

    /// Create an invalid structure error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidStructure(msg.into())
    }

    /// Failure that invalidates the whole container.
    pub fn is_container_failure(&self) -> bool {
        matches!(self, Self::FormatMismatch(_) | Self::CorruptIndex(_))
    }

    /// Failure confined to a single catalog entry.
    pub fn is_entry_failure(&self) -> bool {
        matches!(self, Self::UnsupportedSchema { .. } | Self::MissingResource(_))
    }
}

/// Result type alias for reader operations.
pub type Result<T> = std::result::Result<T, Error>;
