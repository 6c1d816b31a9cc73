//! Thread-safe, file-backed key/value settings store

use crate::codec::{JsonCodec, ValueCodec};
use crate::error::{Error, Result};
use crate::events::{ChangeNotifier, SubscriptionId};
use crate::storage::{Entries, LineStorage, StorageBackend, canonical_key};
use crate::sync::{MutexExt, RwLockExt};

use log::{debug, info};
use serde::{Serialize, de::DeserializeOwned};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

struct StoreState {
    entries: Entries,
    /// Set by every mutation, cleared by a successful load or save
    modified: bool,
}

/// Key/value settings bound to one file.
///
/// Keys are case-insensitive and stored lowercase. Values are kept encoded;
/// typed access goes through a [`ValueCodec`], with [`JsonCodec`] used by the
/// plain [`get`](Self::get) / [`set`](Self::set) family.
///
/// All methods take `&self`; the store is `Send + Sync` and can be shared
/// behind an `Arc` between a UI thread and workers.
///
/// # Example
///
/// ```rust,no_run
/// use verset::SettingsStore;
///
/// let store = SettingsStore::open_or_init("/tmp/my-app/settings", |s| {
///     s.get_or_set_default("upload.retries", 3u32)?;
///     Ok(())
/// })?;
///
/// let retries: u32 = store.get("Upload.Retries");
/// store.set("upload.retries", &(retries + 1))?;
/// store.save()?;
/// # Ok::<(), verset::Error>(())
/// ```
pub struct SettingsStore<S: StorageBackend = LineStorage> {
    path: PathBuf,
    storage: S,
    state: RwLock<StoreState>,
    /// Serializes load/save and any other whole-file operation
    io_lock: Mutex<()>,
    events: ChangeNotifier,
}

impl SettingsStore {
    /// Create an empty store bound to `path` without touching the filesystem
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_storage(path, LineStorage::new())
    }

    /// Create a store bound to `path` and load it
    ///
    /// # Errors
    ///
    /// Returns `Error::FileRead` if the file cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(path);
        store.load()?;
        Ok(store)
    }

    /// Load `path` if it exists, otherwise populate defaults and save
    ///
    /// `populate` should use [`get_or_set_default`](Self::get_or_set_default)
    /// or [`set_if_empty`](Self::set_if_empty) for every option the
    /// application needs.
    ///
    /// # Errors
    ///
    /// Returns I/O errors from loading or saving, and any error `populate`
    /// returns.
    pub fn open_or_init<F>(path: impl Into<PathBuf>, populate: F) -> Result<Self>
    where
        F: FnOnce(&SettingsStore) -> Result<()>,
    {
        let store = Self::new(path);
        if store.path.exists() {
            store.load()?;
        } else {
            info!("No settings at {}, installing defaults", store.path.display());
            populate(&store)?;
            store.save()?;
        }
        Ok(store)
    }
}

impl<S: StorageBackend> SettingsStore<S> {
    /// Create an empty store bound to `path` using a custom storage backend
    pub fn with_storage(path: impl Into<PathBuf>, storage: S) -> Self {
        Self {
            path: path.into(),
            storage,
            state: RwLock::new(StoreState {
                entries: Entries::new(),
                modified: false,
            }),
            io_lock: Mutex::new(()),
            events: ChangeNotifier::new(),
        }
    }

    /// The file this store persists to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether there are changes not yet written by [`save`](Self::save)
    pub fn is_modified(&self) -> bool {
        self.state.read_recovered().modified
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Replace the in-memory entries with the contents of the file
    ///
    /// On failure the in-memory entries are left as they were.
    ///
    /// # Errors
    ///
    /// Returns `Error::FileRead` if the file cannot be read.
    pub fn load(&self) -> Result<()> {
        let _io = self.io_lock.lock_recovered();
        self.load_locked()
    }

    fn load_locked(&self) -> Result<()> {
        let entries = self.storage.read(&self.path)?;

        let count = entries.len();
        let mut state = self.state.write_recovered();
        state.entries = entries;
        state.modified = false;
        drop(state);

        info!("Loaded {count} settings from {}", self.path.display());
        Ok(())
    }

    /// Write the entries to the file if anything changed since the last load
    /// or save
    ///
    /// Creates the parent directory when missing. A failed save keeps the
    /// store marked modified.
    ///
    /// # Errors
    ///
    /// Returns `Error::DirectoryCreate` or `Error::FileWrite` on I/O failure.
    pub fn save(&self) -> Result<()> {
        let _io = self.io_lock.lock_recovered();

        let snapshot = {
            let mut state = self.state.write_recovered();
            if !state.modified {
                debug!("Settings unchanged, skipping save");
                return Ok(());
            }
            state.modified = false;
            state.entries.clone()
        };

        if let Err(e) = self.storage.write(&self.path, &snapshot) {
            self.state.write_recovered().modified = true;
            return Err(e);
        }

        info!("Saved {} settings to {}", snapshot.len(), self.path.display());
        Ok(())
    }

    // =========================================================================
    // Typed Access
    // =========================================================================

    /// Get a JSON-encoded value, or `T::default()` when the key is absent or
    /// the stored value does not decode as `T`
    pub fn get<T>(&self, key: &str) -> T
    where
        T: DeserializeOwned + Serialize + Default,
    {
        self.get_with(&JsonCodec, key)
    }

    /// Like [`get`](Self::get) with a caller-selected codec
    pub fn get_with<T, C>(&self, codec: &C, key: &str) -> T
    where
        T: Default,
        C: ValueCodec<T> + ?Sized,
    {
        self.try_get_with(codec, key).unwrap_or_default()
    }

    /// Get a JSON-encoded value, `None` when absent or undecodable
    pub fn try_get<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned + Serialize,
    {
        self.try_get_with(&JsonCodec, key)
    }

    /// Like [`try_get`](Self::try_get) with a caller-selected codec
    pub fn try_get_with<T, C>(&self, codec: &C, key: &str) -> Option<T>
    where
        C: ValueCodec<T> + ?Sized,
    {
        let key = canonical_key(key);
        let raw = self.state.read_recovered().entries.get(&key).cloned()?;
        match codec.decode(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Stored value for '{key}' not usable: {e}");
                None
            }
        }
    }

    /// Return the stored value, or store `default` and return it
    ///
    /// An absent key and a value that does not decode as `T` are treated
    /// the same: `default` overwrites it, the store is marked modified and
    /// the key's callbacks fire.
    ///
    /// The check and the insert happen under one write lock. When several
    /// threads race on the same key, one stores its default and fires the
    /// callbacks; the others return the value it stored. A value set by
    /// another thread in the meantime is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or `default` cannot be encoded.
    pub fn get_or_set_default<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: DeserializeOwned + Serialize,
    {
        self.get_or_set_default_with(&JsonCodec, key, default)
    }

    /// Like [`get_or_set_default`](Self::get_or_set_default) with a
    /// caller-selected codec
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or `default` cannot be encoded.
    pub fn get_or_set_default_with<T, C>(&self, codec: &C, key: &str, default: T) -> Result<T>
    where
        C: ValueCodec<T> + ?Sized,
    {
        let key = checked_key(key)?;
        if let Some(value) = self.try_get_with(codec, &key) {
            return Ok(value);
        }

        let raw = encode_line(codec, &key, &default)?;
        {
            let mut state = self.state.write_recovered();
            if let Some(value) = state
                .entries
                .get(&key)
                .and_then(|existing| codec.decode(existing).ok())
            {
                return Ok(value);
            }
            state.entries.insert(key.clone(), raw);
            state.modified = true;
        }
        debug!("Setting '{key}' set to its default");
        self.events.notify(&key);
        Ok(default)
    }

    /// Store `value` only if `key` has no entry yet
    ///
    /// Returns whether the value was stored. An existing entry is kept even
    /// if it does not decode.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or `value` cannot be encoded.
    pub fn set_if_empty<T>(&self, key: &str, value: &T) -> Result<bool>
    where
        T: Serialize,
    {
        if self.has(key) {
            return Ok(false);
        }
        let raw = serde_json::to_string(value)?;
        self.commit(key, raw, false)
    }

    /// Check whether a key has an entry (case-insensitive)
    pub fn has(&self, key: &str) -> bool {
        self.state
            .read_recovered()
            .entries
            .contains_key(&canonical_key(key))
    }

    /// Store a JSON-encoded value and notify the key's subscribers
    ///
    /// # Errors
    ///
    /// Returns `Error::Serialize` if the value cannot be encoded, or
    /// `Error::InvalidKey` if the key contains `=` or a line break. The
    /// store is left unchanged.
    pub fn set<T>(&self, key: &str, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        let raw = serde_json::to_string(value)?;
        self.commit(key, raw, true)?;
        Ok(())
    }

    /// Like [`set`](Self::set) with a caller-selected codec
    ///
    /// # Errors
    ///
    /// Returns the codec's error, `Error::InvalidValue` if the encoded
    /// value contains a line break, or `Error::InvalidKey`.
    pub fn set_with<T, C>(&self, codec: &C, key: &str, value: &T) -> Result<()>
    where
        C: ValueCodec<T> + ?Sized,
    {
        let raw = encode_line(codec, key, value)?;
        self.commit(key, raw, true)?;
        Ok(())
    }

    /// Insert an encoded value, then fire callbacks outside the lock
    ///
    /// With `overwrite` false an existing entry is kept and nothing fires.
    fn commit(&self, key: &str, raw: String, overwrite: bool) -> Result<bool> {
        let key = checked_key(key)?;
        {
            let mut state = self.state.write_recovered();
            if !overwrite && state.entries.contains_key(&key) {
                return Ok(false);
            }
            state.entries.insert(key.clone(), raw);
            state.modified = true;
        }
        debug!("Setting '{key}' updated");
        self.events.notify(&key);
        Ok(true)
    }

    /// Remove an entry, notifying subscribers if one existed
    pub fn remove(&self, key: &str) -> bool {
        let key = canonical_key(key);
        {
            let mut state = self.state.write_recovered();
            if state.entries.remove(&key).is_none() {
                return false;
            }
            state.modified = true;
        }
        debug!("Setting '{key}' removed");
        self.events.notify(&key);
        true
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// The encoded value stored for a key
    pub fn raw(&self, key: &str) -> Option<String> {
        self.state
            .read_recovered()
            .entries
            .get(&canonical_key(key))
            .cloned()
    }

    /// All keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.state.read_recovered().entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.state.read_recovered().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read_recovered().entries.is_empty()
    }

    // =========================================================================
    // Change Events
    // =========================================================================

    /// Call `callback` after every change to `key` (case-insensitive)
    ///
    /// Callbacks for one key run in registration order, on the thread that
    /// made the change, right after the new value is visible to readers.
    pub fn subscribe<F>(&self, key: &str, callback: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.events.subscribe(key, callback)
    }

    /// Call `callback` with the canonical key after every change to any key
    pub fn on_change<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.events.on_change(callback)
    }

    /// Remove a callback; returns `false` if it was not registered
    pub fn unsubscribe(&self, id: &SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// The notifier backing [`subscribe`](Self::subscribe)
    pub fn events(&self) -> &ChangeNotifier {
        &self.events
    }

    /// Let `replace` rewrite the file, then load it, all under the file lock
    pub(crate) fn replace_and_load(&self, replace: impl FnOnce() -> Result<()>) -> Result<()> {
        let _io = self.io_lock.lock_recovered();
        replace()?;
        self.load_locked()
    }
}

impl<S: StorageBackend> std::fmt::Debug for SettingsStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read_recovered();
        f.debug_struct("SettingsStore")
            .field("path", &self.path)
            .field("entries", &state.entries.len())
            .field("modified", &state.modified)
            .finish()
    }
}

/// Canonicalize a key, rejecting characters the line format cannot round-trip
fn checked_key(key: &str) -> Result<String> {
    if key.contains(['=', '\n', '\r']) {
        return Err(Error::InvalidKey(key.to_string()));
    }
    Ok(canonical_key(key))
}

fn encode_line<T, C>(codec: &C, key: &str, value: &T) -> Result<String>
where
    C: ValueCodec<T> + ?Sized,
{
    let raw = codec.encode(value)?;
    if raw.contains(['\n', '\r']) {
        return Err(Error::InvalidValue {
            key: canonical_key(key),
            reason: "encoded value spans multiple lines".into(),
        });
    }
    Ok(raw)
}

// =============================================================================
// Tests
// =============================================================================
