//! Change notification for settings keys
//!
//! Callbacks are registered per canonical key and identified by the
//! [`SubscriptionId`] handed back on registration.

use crate::storage::canonical_key;
use crate::sync::RwLockExt;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Type alias for a per-key change callback
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// Type alias for a callback receiving the changed key
pub type AnyChangeCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Handle identifying one registered callback
///
/// Pass it to [`ChangeNotifier::unsubscribe`] to remove the callback.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    key: Option<String>,
    seq: u64,
}

impl SubscriptionId {
    /// The canonical key this subscription watches, `None` for any-key listeners
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

/// Manages change listeners for settings keys
pub struct ChangeNotifier {
    /// Sequence source; ids only grow, so map order is registration order
    next_seq: AtomicU64,

    /// Per-key listeners
    key_listeners: RwLock<HashMap<String, BTreeMap<u64, ChangeCallback>>>,

    /// Listeners called for every key
    global_listeners: RwLock<BTreeMap<u64, AnyChangeCallback>>,
}

impl ChangeNotifier {
    /// Create an empty notifier
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_seq: AtomicU64::new(0),
            key_listeners: RwLock::new(HashMap::new()),
            global_listeners: RwLock::new(BTreeMap::new()),
        }
    }

    fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a callback for a specific key (case-insensitive)
    pub fn subscribe<F>(&self, key: &str, callback: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let key = canonical_key(key);
        let seq = self.next_seq();
        self.key_listeners
            .write_recovered()
            .entry(key.clone())
            .or_default()
            .insert(seq, Arc::new(callback));
        SubscriptionId {
            key: Some(key),
            seq,
        }
    }

    /// Register a callback invoked for every changed key
    pub fn on_change<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let seq = self.next_seq();
        self.global_listeners
            .write_recovered()
            .insert(seq, Arc::new(callback));
        SubscriptionId { key: None, seq }
    }

    /// Remove a callback
    ///
    /// Returns `false` if the subscription was not registered (already
    /// removed, or issued by another notifier).
    pub fn unsubscribe(&self, id: &SubscriptionId) -> bool {
        match &id.key {
            Some(key) => {
                let mut listeners = self.key_listeners.write_recovered();
                let Some(callbacks) = listeners.get_mut(key) else {
                    return false;
                };
                let removed = callbacks.remove(&id.seq).is_some();
                if callbacks.is_empty() {
                    listeners.remove(key);
                }
                removed
            }
            None => self
                .global_listeners
                .write_recovered()
                .remove(&id.seq)
                .is_some(),
        }
    }

    /// Number of callbacks registered for a key
    pub fn listener_count(&self, key: &str) -> usize {
        self.key_listeners
            .read_recovered()
            .get(&canonical_key(key))
            .map_or(0, BTreeMap::len)
    }

    /// Invoke the callbacks for `key` in registration order, then the
    /// any-key listeners
    ///
    /// `key` must already be canonical. Callbacks run without any notifier
    /// lock held.
    pub fn notify(&self, key: &str) {
        let callbacks: Vec<ChangeCallback> = self
            .key_listeners
            .read_recovered()
            .get(key)
            .map(|callbacks| callbacks.values().cloned().collect())
            .unwrap_or_default();
        for callback in callbacks {
            callback();
        }

        let global: Vec<AnyChangeCallback> = self
            .global_listeners
            .read_recovered()
            .values()
            .cloned()
            .collect();
        for callback in global {
            callback(key);
        }
    }

    /// Remove every listener
    pub fn clear(&self) {
        self.key_listeners.write_recovered().clear();
        self.global_listeners.write_recovered().clear();
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
