//! Error types for dataset access operations

use std::io;
use std::path::Path;

use dataslice_core::CoreError;
use thiserror::Error;

/// Result type for dataset operations
pub type Result<T> = std::result::Result<T, DatasetError>;

/// Errors that can occur while loading, slicing or saving datasets
#[derive(Error, Debug)]
pub enum DatasetError {
    /// Malformed physical content; retrying will not help
    #[error("malformed dataset at {location}: {message}")]
    Format { location: String, message: String },

    /// Filesystem failure; not retried by this layer
    #[error("I/O failure at {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: io::Error,
    },

    /// Shape, slice or header inconsistency; a caller bug
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A slice read failed, with enough context to diagnose offline
    #[error("reading {path} from {location} failed for slice {slice}: {source}")]
    Read {
        location: String,
        path: String,
        slice: String,
        #[source]
        source: Box<DatasetError>,
    },

    /// A slice write failed, with enough context to diagnose offline
    #[error("writing {path} to {location} failed for slice {slice}: {source}")]
    Write {
        location: String,
        path: String,
        slice: String,
        #[source]
        source: Box<DatasetError>,
    },

    /// Monitor-driven abort; always distinct from failure
    #[error("operation cancelled")]
    Cancelled,

    /// Operation not available on this handle or format
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// A concurrent load shared through the result cache failed
    #[error("cached load failed: {0}")]
    Cache(String),
}

impl DatasetError {
    /// Wrap an I/O error with the location it happened at
    pub fn io(location: &Path, source: io::Error) -> Self {
        DatasetError::Io {
            location: location.display().to_string(),
            source,
        }
    }

    /// Flag malformed content at a location
    pub fn format(location: &Path, message: impl Into<String>) -> Self {
        DatasetError::Format {
            location: location.display().to_string(),
            message: message.into(),
        }
    }
}
