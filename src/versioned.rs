//! Per-version settings with migration from the previous installed version

use crate::config::{VersionedSettingsConfig, VersionedSettingsConfigBuilder};
use crate::error::{Result, copy_file, create_dir, read_dir};
use crate::storage::{LineStorage, StorageBackend};
use crate::store::SettingsStore;
use crate::sync::RwLockExt;
use crate::version::VersionToken;

use log::{debug, info};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Settings stored under `<root>/<vendor>/<product>/<version>/settings`.
///
/// On the first run of a version the newest older version's settings file is
/// copied forward, then the caller's defaults fill whatever is still missing.
///
/// # Example
///
/// ```rust,no_run
/// use verset::VersionedSettings;
///
/// let settings = VersionedSettings::builder("Dtronix", "Upload Client", "1.4.0.0")
///     .build(|store| {
///         store.get_or_set_default("servers.list", vec!["upload.example.com".to_string()])?;
///         store.get_or_set_default("upload.connections", 4u32)?;
///         Ok(())
///     })?;
///
/// // Reads and writes go straight to the underlying store.
/// let connections: u32 = settings.get("upload.connections");
/// settings.set("upload.connections", &(connections * 2))?;
/// settings.save()?;
/// # Ok::<(), verset::Error>(())
/// ```
pub struct VersionedSettings<S: StorageBackend = LineStorage> {
    config: VersionedSettingsConfig<S>,
    store: SettingsStore<S>,
    migrated_from: RwLock<Option<VersionToken>>,
}

impl VersionedSettings {
    /// Create a builder for the given application identity
    pub fn builder(
        vendor: impl Into<String>,
        product: impl Into<String>,
        version: impl Into<String>,
    ) -> VersionedSettingsBuilder {
        VersionedSettingsBuilder {
            config: VersionedSettingsConfigBuilder::new(vendor, product, version),
        }
    }
}

impl<S: StorageBackend> VersionedSettings<S> {
    /// Open the settings for `config`, migrating or populating on first run
    ///
    /// When no settings file exists for the running version, the version
    /// directory is created, [`upgrade`](Self::upgrade) runs (if enabled),
    /// `populate` is called and the result is saved. Otherwise the existing
    /// file is loaded and `populate` is not called.
    ///
    /// # Errors
    ///
    /// Returns I/O errors from directory creation, migration, load or save,
    /// and any error returned by `populate`.
    pub fn open<F>(config: VersionedSettingsConfig<S>, populate: F) -> Result<Self>
    where
        F: FnOnce(&SettingsStore<S>) -> Result<()>,
    {
        let settings_path = config.settings_path();
        let store = SettingsStore::with_storage(&settings_path, config.storage.clone());
        let settings = Self {
            config,
            store,
            migrated_from: RwLock::new(None),
        };

        if settings_path.exists() {
            settings.store.load()?;
        } else {
            info!(
                "First run of version {}, creating {}",
                settings.config.version,
                settings.version_dir().display()
            );
            create_dir(&settings.version_dir())?;

            if settings.config.attempt_upgrade {
                settings.upgrade(false)?;
            }
            populate(&settings.store)?;
            settings.store.save()?;
        }

        Ok(settings)
    }

    /// Copy the newest older version's settings file over this version's and
    /// reload
    ///
    /// The source is the greatest version below the running one whose
    /// directory holds a settings file. Directory names that are not versions
    /// are ignored. Returns `false` without touching anything when
    /// `overwrite` is false and this version already has a settings file, or
    /// when there is no source.
    ///
    /// # Errors
    ///
    /// Returns `Error::DirectoryRead` if the base directory cannot be listed,
    /// `Error::FileCopy` if the copy fails and `Error::FileRead` if the copied
    /// file cannot be loaded.
    pub fn upgrade(&self, overwrite: bool) -> Result<bool> {
        let settings_path = self.settings_path();
        if !overwrite && settings_path.exists() {
            debug!("Settings for {} already exist, not upgrading", self.config.version);
            return Ok(false);
        }

        let Some((source_version, source_path)) = self.find_upgrade_source()? else {
            debug!("No previous settings to upgrade from");
            return Ok(false);
        };

        self.store.replace_and_load(|| {
            copy_file(&source_path, &settings_path)?;
            Ok(())
        })?;

        info!(
            "Upgraded settings from version {} to {}",
            source_version, self.config.version
        );
        *self.migrated_from.write_recovered() = Some(source_version);
        Ok(true)
    }

    fn find_upgrade_source(&self) -> Result<Option<(VersionToken, PathBuf)>> {
        let source = self
            .installed_versions()?
            .into_iter()
            .filter(|version| *version < self.config.version)
            .map(|version| {
                let path = self
                    .base_dir()
                    .join(version.as_str())
                    .join(&self.config.settings_file);
                (version, path)
            })
            .filter(|(version, path)| {
                let usable = path.is_file();
                if !usable {
                    debug!("Version {version} has no settings file, skipping");
                }
                usable
            })
            .max_by(|(a, _), (b, _)| a.cmp(b));
        Ok(source)
    }

    /// Every version directory under the base directory, sorted ascending
    ///
    /// Entries whose names are not versions are skipped. A missing base
    /// directory yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns `Error::DirectoryRead` if the base directory exists but cannot
    /// be listed.
    pub fn installed_versions(&self) -> Result<Vec<VersionToken>> {
        let base_dir = self.base_dir();
        if !base_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut versions = Vec::new();
        for entry in read_dir(&base_dir)? {
            let Ok(entry) = entry else { continue };
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            match VersionToken::parse(name) {
                Ok(version) => versions.push(version),
                Err(_) => debug!("Ignoring non-version directory '{name}'"),
            }
        }
        versions.sort();
        Ok(versions)
    }

    /// The version settings were migrated from, if a migration happened
    pub fn migrated_from(&self) -> Option<VersionToken> {
        self.migrated_from.read_recovered().clone()
    }

    /// The underlying store
    pub fn store(&self) -> &SettingsStore<S> {
        &self.store
    }

    /// The configuration this instance was opened with
    pub fn config(&self) -> &VersionedSettingsConfig<S> {
        &self.config
    }

    /// The running version
    pub fn version(&self) -> &VersionToken {
        &self.config.version
    }

    /// `<root>/<vendor>/<product>`
    pub fn base_dir(&self) -> PathBuf {
        self.config.base_dir()
    }

    /// Directory of the running version
    pub fn version_dir(&self) -> PathBuf {
        self.config.version_dir()
    }

    /// Settings file of the running version
    pub fn settings_path(&self) -> &Path {
        self.store.path()
    }
}

impl<S: StorageBackend> Deref for VersionedSettings<S> {
    type Target = SettingsStore<S>;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

impl<S: StorageBackend> std::fmt::Debug for VersionedSettings<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionedSettings")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("migrated_from", &self.migrated_from())
            .finish()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`VersionedSettings`] with a fluent API.
///
/// ```rust,no_run
/// use verset::VersionedSettings;
///
/// let settings = VersionedSettings::builder("Acme", "Uploader", "2.0.0.0")
///     .config_root("~/.config")
///     .attempt_upgrade(true)
///     .build(|_| Ok(()))?;
/// # Ok::<(), verset::Error>(())
/// ```
pub struct VersionedSettingsBuilder<S: StorageBackend = LineStorage> {
    config: VersionedSettingsConfigBuilder<S>,
}

impl<S: StorageBackend> VersionedSettingsBuilder<S> {
    /// Set the configuration root instead of the platform default.
    ///
    /// Supports `~` expansion for home directory.
    pub fn config_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config = self.config.config_root(path);
        self
    }

    /// Let an environment variable override the platform default root.
    pub fn config_root_env(mut self, var: impl Into<String>) -> Self {
        self.config = self.config.config_root_env(var);
        self
    }

    /// Read environment variables from a custom source.
    pub fn env_source(mut self, source: impl crate::config::EnvSource + 'static) -> Self {
        self.config = self.config.env_source(source);
        self
    }

    /// Set the settings filename (default: "settings").
    pub fn settings_file(mut self, filename: impl Into<String>) -> Self {
        self.config = self.config.settings_file(filename);
        self
    }

    /// Enable or disable migration from the previous version (default: enabled).
    pub fn attempt_upgrade(mut self, enabled: bool) -> Self {
        self.config = self.config.attempt_upgrade(enabled);
        self
    }

    /// Use a different storage backend.
    pub fn storage<T: StorageBackend>(self, storage: T) -> VersionedSettingsBuilder<T> {
        VersionedSettingsBuilder {
            config: self.config.storage(storage),
        }
    }

    /// Build the configuration without opening anything.
    ///
    /// # Errors
    ///
    /// See [`VersionedSettingsConfigBuilder::build`].
    pub fn build_config(self) -> Result<VersionedSettingsConfig<S>> {
        self.config.build()
    }

    /// Open the settings, running `populate` on the first run of this version.
    ///
    /// # Errors
    ///
    /// Returns configuration errors and everything
    /// [`VersionedSettings::open`] can return.
    pub fn build<F>(self, populate: F) -> Result<VersionedSettings<S>>
    where
        F: FnOnce(&SettingsStore<S>) -> Result<()>,
    {
        VersionedSettings::open(self.config.build()?, populate)
    }
}
