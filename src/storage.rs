//! Storage backend trait and the flat `key=value` file implementation

use crate::error::{Error, Result};
use log::debug;
use std::collections::HashMap;
use std::path::Path;

/// Raw entries as kept in memory: canonical key to encoded value
pub type Entries = HashMap<String, String>;

/// Trait for storage backend implementations
///
/// A backend reads and writes the whole entry map of one settings file.
pub trait StorageBackend: Clone + Send + Sync {
    /// Read every entry from `path`
    fn read(&self, path: &Path) -> Result<Entries>;

    /// Replace the contents of `path` with `entries`
    fn write(&self, path: &Path, entries: &Entries) -> Result<()>;
}

/// Canonical form of a settings key
pub(crate) fn canonical_key(key: &str) -> String {
    key.to_lowercase()
}

// =============================================================================
// Line Storage Implementation
// =============================================================================

/// Line-oriented storage: one `key=value` pair per line (default)
#[derive(Debug, Clone, Default)]
pub struct LineStorage;

impl LineStorage {
    /// Create a new line storage backend
    pub fn new() -> Self {
        Self
    }

    /// Parse file contents into entries
    ///
    /// The first `=` splits key from value. Lines without `=` are skipped and
    /// a repeated key keeps its last value.
    pub fn parse(content: &str) -> Entries {
        let mut entries = Entries::new();
        for (number, line) in content.lines().enumerate() {
            match line.split_once('=') {
                Some((key, value)) => {
                    entries.insert(canonical_key(key), value.to_string());
                }
                None if line.trim().is_empty() => {}
                None => debug!("Skipping settings line {} without '='", number + 1),
            }
        }
        entries
    }

    /// Render entries into file contents
    pub fn render(entries: &Entries) -> String {
        let mut content = String::new();
        for (key, value) in entries {
            content.push_str(key);
            content.push('=');
            content.push_str(value);
            content.push('\n');
        }
        content
    }
}

impl StorageBackend for LineStorage {
    fn read(&self, path: &Path) -> Result<Entries> {
        let bytes = std::fs::read(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let content = String::from_utf8_lossy(&bytes);
        if let std::borrow::Cow::Owned(_) = content {
            debug!("Replaced invalid UTF-8 in {}", path.display());
        }
        Ok(Self::parse(&content))
    }

    /// Uses atomic write: writes to temp file then renames to prevent corruption.
    fn write(&self, path: &Path, entries: &Entries) -> Result<()> {
        let content = Self::render(entries);

        if let Some(parent) = path.parent() {
            crate::error::create_dir(parent)?;
        }

        let file_name = path.file_name().ok_or_else(|| {
            Error::Config(format!(
                "Invalid path '{}': must have a filename",
                path.display()
            ))
        })?;
        let mut temp_filename = file_name.to_os_string();
        temp_filename.push(".tmp");
        let temp_path = path.with_file_name(temp_filename);

        std::fs::write(&temp_path, &content).map_err(|e| Error::FileWrite {
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, path).map_err(|e| {
            let _ = std::fs::remove_file(&temp_path);
            Error::FileWrite {
                path: path.to_path_buf(),
                source: e,
            }
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
