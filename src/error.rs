//! Unified error type for the ncd-canopy library.
//!
//! Library code returns `CanopyError`; the CLI wraps it in `anyhow::Result`
//! for context chaining.
//!
//! # Error Categories
//!
//! - **Io**: File system operations (open, read, write)
//! - **Config**: Invalid run parameters (thresholds, mode selection)
//! - **Parse**: Malformed record or pairs lines, duplicate ids in a file
//! - **UnknownRecord**: A pair references an id absent from the store
//! - **DuplicateRecord**: A record id inserted into a store twice
//! - **Compression**: The compression oracle failed

use std::fmt;
use std::path::PathBuf;

use crate::types::RecordId;

/// Unified error type for the ncd-canopy library.
#[derive(Debug)]
pub enum CanopyError {
    /// I/O error with path context.
    Io {
        path: PathBuf,
        operation: &'static str,
        source: std::io::Error,
    },

    /// Invalid configuration, detected before any computation starts.
    Config(String),

    /// Malformed input line.
    Parse {
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        content: String,
        detail: String,
    },

    /// Reference to a record id that is not loaded.
    UnknownRecord { id: RecordId, context: String },

    /// A record id that is already loaded.
    DuplicateRecord(RecordId),

    /// Compression oracle failure.
    Compression(String),
}

impl fmt::Display for CanopyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanopyError::Io {
                path,
                operation,
                source,
            } => {
                write!(
                    f,
                    "I/O error during {} on '{}': {}",
                    operation,
                    path.display(),
                    source
                )
            }
            CanopyError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CanopyError::Parse {
                path,
                line,
                content,
                detail,
            } => {
                write!(
                    f,
                    "Parse error in '{}' at line {}: {} (line: {:?})",
                    path.display(),
                    line,
                    detail,
                    content
                )
            }
            CanopyError::UnknownRecord { id, context } => {
                write!(f, "Unknown record id {} ({})", id, context)
            }
            CanopyError::DuplicateRecord(id) => write!(f, "duplicate record id {}", id),
            CanopyError::Compression(msg) => write!(f, "Compression error: {}", msg),
        }
    }
}

impl std::error::Error for CanopyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CanopyError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CanopyError {
    fn from(err: std::io::Error) -> Self {
        CanopyError::Io {
            path: PathBuf::new(),
            operation: "unknown",
            source: err,
        }
    }
}

/// Convenience type alias for Results using CanopyError.
pub type Result<T> = std::result::Result<T, CanopyError>;

// ============================================================================
// Helper constructors
// ============================================================================

impl CanopyError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, operation: &'static str, source: std::io::Error) -> Self {
        CanopyError::Io {
            path: path.into(),
            operation,
            source,
        }
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        CanopyError::Config(msg.into())
    }

    /// Create a parse error for a specific input line.
    pub fn parse(
        path: impl Into<PathBuf>,
        line: usize,
        content: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        CanopyError::Parse {
            path: path.into(),
            line,
            content: content.into(),
            detail: detail.into(),
        }
    }

    /// Create a reference error for an id missing from the store.
    pub fn unknown_record(id: RecordId, context: impl Into<String>) -> Self {
        CanopyError::UnknownRecord {
            id,
            context: context.into(),
        }
    }

    /// Create an error for an id that is already loaded.
    pub fn duplicate_record(id: RecordId) -> Self {
        CanopyError::DuplicateRecord(id)
    }

    /// Create a compression error.
    pub fn compression(msg: impl Into<String>) -> Self {
        CanopyError::Compression(msg.into())
    }
}
