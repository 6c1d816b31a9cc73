//! # verset - versioned settings
//!
//! A small, framework-agnostic settings layer for desktop applications:
//! a thread-safe key/value store persisted to a flat `key=value` file, with
//! change notification, lazily populated defaults, and one-time migration of
//! settings from the previous installed version.
//!
//! ## Features
//!
//! - **Typed values**: values go through an explicit [`ValueCodec`]; JSON by default
//! - **Case-insensitive keys**: keys are stored lowercase
//! - **Change events**: per-key callbacks with [`SubscriptionId`] handles
//! - **Lazy defaults**: [`SettingsStore::get_or_set_default`] declares defaults at the call site
//! - **Version migration**: the first run of a new version inherits the newest older version's file
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use verset::VersionedSettings;
//!
//! let settings = VersionedSettings::builder("Acme", "Uploader", "1.2.0.0")
//!     .build(|store| {
//!         store.get_or_set_default("ui.theme", "dark".to_string())?;
//!         store.get_or_set_default("upload.connections", 4u32)?;
//!         Ok(())
//!     })?;
//!
//! settings.subscribe("ui.theme", || println!("theme changed"));
//! settings.set("UI.Theme", &"light")?;
//! settings.save()?;
//! # Ok::<(), verset::Error>(())
//! ```
//!
//! ## File Layout
//!
//! ```text
//! <config root>/<vendor>/<product>/1.1.0.0/settings
//! <config root>/<vendor>/<product>/1.2.0.0/settings   <- copied from 1.1.0.0 on first run
//! ```
//!
//! Each settings file holds one `key=value` line per entry, where the value is
//! the codec's single-line encoding (compact JSON unless another codec is used).
//!
//! ## Plain Store
//!
//! Without the version layer, a store can be bound to any path:
//!
//! ```rust,no_run
//! use verset::SettingsStore;
//!
//! let store = SettingsStore::open_or_init("/tmp/uploader/settings", |s| {
//!     s.set_if_empty("servers.list", &vec!["upload.example.com"])?;
//!     Ok(())
//! })?;
//! let servers: Vec<String> = store.get("servers.list");
//! # Ok::<(), verset::Error>(())
//! ```

mod error;
mod events;
mod store;
mod sync;
mod version;
mod versioned;

pub mod codec;
pub mod config;
pub mod storage;

pub use codec::{JsonCodec, ParseCodec, ValueCodec};
pub use config::{EnvSource, ProcessEnv, VersionedSettingsConfig, VersionedSettingsConfigBuilder};
pub use error::{Error, Result};
pub use events::{AnyChangeCallback, ChangeCallback, ChangeNotifier, SubscriptionId};
pub use storage::{Entries, LineStorage, StorageBackend};
pub use store::SettingsStore;
pub use version::VersionToken;
pub use versioned::{VersionedSettings, VersionedSettingsBuilder};
