//! Error types for verset

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for verset operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for verset
#[derive(Error, Debug)]
pub enum Error {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy '{from}' to '{to}': {source}")]
    FileCopy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory '{path}': {source}")]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read directory '{path}': {source}")]
    DirectoryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // -------------------------------------------------------------------------
    // Value Errors
    // -------------------------------------------------------------------------
    #[error("Failed to serialize value: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to parse value: {0}")]
    Parse(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Invalid key {0:?}: keys cannot contain '=' or line breaks")]
    InvalidKey(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Invalid version '{0}': expected 2 to 4 dot-separated numbers")]
    InvalidVersion(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Check if this error came from the filesystem
    #[must_use]
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Error::FileRead { .. }
                | Error::FileWrite { .. }
                | Error::FileCopy { .. }
                | Error::DirectoryCreate { .. }
                | Error::DirectoryRead { .. }
        )
    }

    /// Check if this error means the file simply does not exist
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::FileRead { source, .. } | Error::DirectoryRead { source, .. } => {
                source.kind() == std::io::ErrorKind::NotFound
            }
            _ => false,
        }
    }
}

// =============================================================================
// Filesystem Helper Functions
// =============================================================================

use std::path::Path;

/// Create a directory (and parents) with proper error handling
pub(crate) fn create_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| Error::DirectoryCreate {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Copy a file byte-for-byte with proper error handling
pub(crate) fn copy_file(src: &Path, dest: &Path) -> Result<u64> {
    std::fs::copy(src, dest).map_err(|e| Error::FileCopy {
        from: src.to_path_buf(),
        to: dest.to_path_buf(),
        source: e,
    })
}

/// Read directory entries with proper error handling
pub(crate) fn read_dir(path: &Path) -> Result<std::fs::ReadDir> {
    std::fs::read_dir(path).map_err(|e| Error::DirectoryRead {
        path: path.to_path_buf(),
        source: e,
    })
}
