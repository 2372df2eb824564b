//! Error types for mesh codec I/O.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for mesh I/O operations.
pub type Result<T> = std::result::Result<T, MeshError>;

/// Errors that can occur while reading or writing mesh files.
#[derive(Debug, Error)]
pub enum MeshError {
    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was not found.
        path: PathBuf,
    },

    /// Unrecognized mesh file extension.
    #[error("unsupported mesh format: .{extension}")]
    UnknownFormat {
        /// The unrecognized extension.
        extension: String,
    },

    /// Invalid file content.
    #[error("invalid mesh content: {message}")]
    InvalidContent {
        /// Description of what was invalid.
        message: String,
    },

    /// Unexpected end of file.
    #[error("unexpected end of file at position {position}")]
    UnexpectedEof {
        /// Byte position where EOF was hit.
        position: u64,
    },

    /// Requested submesh does not exist in the document.
    #[error("submesh '{name}' not found")]
    SubmeshNotFound {
        /// The requested submesh identifier.
        name: String,
    },

    /// XML parsing error from the Collada codec.
    #[error("XML parse error: {0}")]
    XmlParse(String),

    /// I/O error from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Float parsing error.
    #[error("float parsing error: {0}")]
    ParseFloat(#[from] std::num::ParseFloatError),

    /// Integer parsing error.
    #[error("integer parsing error: {0}")]
    ParseInt(#[from] std::num::ParseIntError),
}

impl MeshError {
    /// Create an `InvalidContent` error with the given message.
    #[must_use]
    pub fn invalid_content(message: impl Into<String>) -> Self {
        Self::InvalidContent {
            message: message.into(),
        }
    }
}
