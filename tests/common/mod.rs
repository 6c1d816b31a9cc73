//! Common test utilities for verset integration tests
//!
//! Provides a temporary config root and helpers for laying out version
//! directories the way an installed application would leave them.

#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use verset::{SettingsStore, VersionedSettings};

pub const VENDOR: &str = "Dtronix";
pub const PRODUCT: &str = "Upload Client";

/// A server entry as the upload client stores it under `servers.list`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerEntry {
    pub url: String,
    pub name: String,
    pub connection_count: u32,
}

pub fn default_servers() -> Vec<ServerEntry> {
    vec![ServerEntry {
        url: "upload.example.com".to_string(),
        name: "Example Upload".to_string(),
        connection_count: 0,
    }]
}

/// Default population used by the upload client
pub fn populate_defaults(store: &SettingsStore) -> verset::Result<()> {
    store.get_or_set_default("servers.list", default_servers())?;
    store.get_or_set_default("upload.connections", 4u32)?;
    store.get_or_set_default("ui.theme", "dark".to_string())?;
    Ok(())
}

// =============================================================================
// Test Fixtures
// =============================================================================

/// Test fixture that provides a temporary config root
pub struct TestFixture {
    pub temp_dir: TempDir,
}

impl TestFixture {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// `<root>/<vendor>/<product>`
    pub fn base_dir(&self) -> PathBuf {
        self.root().join(VENDOR).join(PRODUCT)
    }

    pub fn settings_path(&self, version: &str) -> PathBuf {
        self.base_dir().join(version).join("settings")
    }

    /// Create a version directory holding a settings file with `content`
    pub fn write_version(&self, version: &str, content: &str) -> PathBuf {
        let path = self.settings_path(version);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    /// Create an empty version directory
    pub fn create_version_dir(&self, version: &str) -> PathBuf {
        let dir = self.base_dir().join(version);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Open settings for `version` with the upload client defaults
    pub fn open(&self, version: &str) -> VersionedSettings {
        self.open_with(version, true, populate_defaults)
    }

    pub fn open_with<F>(&self, version: &str, upgrade: bool, populate: F) -> VersionedSettings
    where
        F: FnOnce(&SettingsStore) -> verset::Result<()>,
    {
        VersionedSettings::builder(VENDOR, PRODUCT, version)
            .config_root(self.root())
            .attempt_upgrade(upgrade)
            .build(populate)
            .expect("Failed to open versioned settings")
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Read a settings file into sorted lines
pub fn read_lines(path: &Path) -> Vec<String> {
    let mut lines: Vec<String> = fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    lines.sort();
    lines
}
