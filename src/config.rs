//! Configuration for [`VersionedSettings`](crate::VersionedSettings)

use crate::error::{Error, Result};
use crate::storage::{LineStorage, StorageBackend};
use crate::version::VersionToken;
use std::path::PathBuf;

/// Default file name inside each version directory
pub const DEFAULT_SETTINGS_FILE: &str = "settings";

/// Source of environment variables
///
/// Abstracted so tests can resolve the config root without touching the
/// process environment.
pub trait EnvSource: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads the real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Where and how the settings of one application version live
///
/// The settings file resolves to
/// `<config_root>/<vendor>/<product>/<version>/<settings_file>`.
pub struct VersionedSettingsConfig<S: StorageBackend = LineStorage> {
    pub vendor: String,
    pub product: String,
    pub version: VersionToken,

    /// Root of the per-user configuration tree (e.g. `~/.config`)
    pub config_root: PathBuf,

    /// File name inside each version directory
    pub settings_file: String,

    /// Copy the newest older version's settings on first run
    pub attempt_upgrade: bool,

    /// Storage backend implementation
    pub storage: S,
}

impl<S: StorageBackend> VersionedSettingsConfig<S> {
    /// `<config_root>/<vendor>/<product>`, parent of every version directory
    pub fn base_dir(&self) -> PathBuf {
        self.config_root.join(&self.vendor).join(&self.product)
    }

    /// Directory of the running version
    pub fn version_dir(&self) -> PathBuf {
        self.base_dir().join(self.version.as_str())
    }

    /// Settings file of the running version
    pub fn settings_path(&self) -> PathBuf {
        self.version_dir().join(&self.settings_file)
    }
}

impl<S: StorageBackend> std::fmt::Debug for VersionedSettingsConfig<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionedSettingsConfig")
            .field("vendor", &self.vendor)
            .field("product", &self.product)
            .field("version", &self.version.as_str())
            .field("config_root", &self.config_root)
            .field("settings_file", &self.settings_file)
            .field("attempt_upgrade", &self.attempt_upgrade)
            .finish()
    }
}

/// Builder for [`VersionedSettingsConfig`]
pub struct VersionedSettingsConfigBuilder<S: StorageBackend = LineStorage> {
    vendor: String,
    product: String,
    version: String,
    config_root: Option<PathBuf>,
    root_env_var: Option<String>,
    env_source: Box<dyn EnvSource>,
    settings_file: String,
    attempt_upgrade: bool,
    storage: S,
}

impl VersionedSettingsConfigBuilder {
    /// Create a new builder with the application identity
    pub fn new(
        vendor: impl Into<String>,
        product: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            vendor: vendor.into(),
            product: product.into(),
            version: version.into(),
            config_root: None,
            root_env_var: None,
            env_source: Box::new(ProcessEnv),
            settings_file: DEFAULT_SETTINGS_FILE.into(),
            attempt_upgrade: true,
            storage: LineStorage::new(),
        }
    }
}

impl<S: StorageBackend> VersionedSettingsConfigBuilder<S> {
    /// Set the configuration root instead of the platform default
    ///
    /// Supports `~` expansion for home directory.
    pub fn config_root(mut self, path: impl Into<PathBuf>) -> Self {
        let path: PathBuf = path.into();
        let expanded = if path.starts_with("~") {
            match dirs::home_dir() {
                Some(home) => home.join(path.strip_prefix("~").unwrap_or(&path)),
                None => path,
            }
        } else {
            path
        };
        self.config_root = Some(expanded);
        self
    }

    /// Let an environment variable override the platform default root
    ///
    /// An explicit [`config_root`](Self::config_root) still wins.
    pub fn config_root_env(mut self, var: impl Into<String>) -> Self {
        self.root_env_var = Some(var.into());
        self
    }

    /// Read environment variables from a custom source
    pub fn env_source(mut self, source: impl EnvSource + 'static) -> Self {
        self.env_source = Box::new(source);
        self
    }

    /// Set the settings filename (default: "settings")
    pub fn settings_file(mut self, filename: impl Into<String>) -> Self {
        self.settings_file = filename.into();
        self
    }

    /// Enable or disable migration from the previous version (default: enabled)
    pub fn attempt_upgrade(mut self, enabled: bool) -> Self {
        self.attempt_upgrade = enabled;
        self
    }

    /// Use a different storage backend
    pub fn storage<T: StorageBackend>(self, storage: T) -> VersionedSettingsConfigBuilder<T> {
        VersionedSettingsConfigBuilder {
            vendor: self.vendor,
            product: self.product,
            version: self.version,
            config_root: self.config_root,
            root_env_var: self.root_env_var,
            env_source: self.env_source,
            settings_file: self.settings_file,
            attempt_upgrade: self.attempt_upgrade,
            storage,
        }
    }

    fn resolve_root(&self) -> Result<PathBuf> {
        if let Some(root) = &self.config_root {
            return Ok(root.clone());
        }
        if let Some(var) = &self.root_env_var {
            if let Some(value) = self.env_source.var(var).filter(|v| !v.is_empty()) {
                return Ok(PathBuf::from(value));
            }
        }
        dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not determine the platform config directory".into()))
    }

    /// Validate and build the configuration
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidVersion` for a malformed version and
    /// `Error::Config` for an empty vendor, product or settings file name, a
    /// name that is `.`, `..` or contains a separator, or when no config root
    /// can be determined.
    pub fn build(self) -> Result<VersionedSettingsConfig<S>> {
        for (field, value) in [
            ("vendor", &self.vendor),
            ("product", &self.product),
            ("settings file", &self.settings_file),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{field} must not be empty")));
            }
            if value.contains(['/', '\\']) {
                return Err(Error::Config(format!(
                    "{field} '{value}' must not contain path separators"
                )));
            }
            if value.as_str() == "." || value.as_str() == ".." {
                return Err(Error::Config(format!(
                    "{field} '{value}' must name a directory entry"
                )));
            }
        }

        let version = VersionToken::parse(&self.version)?;
        let config_root = self.resolve_root()?;

        Ok(VersionedSettingsConfig {
            vendor: self.vendor,
            product: self.product,
            version,
            config_root,
            settings_file: self.settings_file,
            attempt_upgrade: self.attempt_upgrade,
            storage: self.storage,
        })
    }
}
