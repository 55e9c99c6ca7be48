//! Observable application settings
//!
//! One store is shared by the backdoor dispatcher and whatever view models
//! display the settings. Consumers subscribe for change notifications and
//! keep the returned [`Subscription`] for as long as they want them;
//! dropping it unsubscribes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Current setting values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub use_https: bool,
    pub server_url: Option<String>,
}

/// A setting that changed, with its new value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsChange {
    UseHttps(bool),
    ServerUrl(String),
}

impl SettingsChange {
    /// Name of the changed setting
    pub fn key(&self) -> &'static str {
        match self {
            SettingsChange::UseHttps(_) => "UseHttps",
            SettingsChange::ServerUrl(_) => "ServerUrl",
        }
    }
}

type Listener = Arc<dyn Fn(&SettingsChange) + Send + Sync>;

struct StoreInner {
    values: Mutex<Settings>,
    listeners: Mutex<BTreeMap<u64, Listener>>,
    next_id: AtomicU64,
}

/// Thread-safe settings with change notification; clones share one store
#[derive(Clone)]
pub struct SettingsStore {
    inner: Arc<StoreInner>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        SettingsStore {
            inner: Arc::new(StoreInner {
                values: Mutex::new(settings),
                listeners: Mutex::new(BTreeMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    fn values(&self) -> MutexGuard<'_, Settings> {
        self.inner.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> Settings {
        self.values().clone()
    }

    pub fn use_https(&self) -> bool {
        self.values().use_https
    }

    pub fn server_url(&self) -> Option<String> {
        self.values().server_url.clone()
    }

    /// Returns whether the value changed.
    pub fn set_use_https(&self, value: bool) -> bool {
        let changed = {
            let mut values = self.values();
            let changed = values.use_https != value;
            values.use_https = value;
            changed
        };
        if changed {
            self.notify(&SettingsChange::UseHttps(value));
        }
        changed
    }

    /// Flip `use_https` and return the new value.
    pub fn toggle_use_https(&self) -> bool {
        let value = {
            let mut values = self.values();
            values.use_https = !values.use_https;
            values.use_https
        };
        self.notify(&SettingsChange::UseHttps(value));
        value
    }

    /// Returns whether the value changed.
    pub fn set_server_url(&self, url: impl Into<String>) -> bool {
        let url = url.into();
        let changed = {
            let mut values = self.values();
            let changed = values.server_url.as_deref() != Some(url.as_str());
            values.server_url = Some(url.clone());
            changed
        };
        if changed {
            self.notify(&SettingsChange::ServerUrl(url));
        }
        changed
    }

    /// Call `listener` after every change until the subscription is dropped.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SettingsChange) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.listeners().insert(id, Arc::new(listener));
        Subscription {
            id,
            store: Arc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners().len()
    }

    fn listeners(&self) -> MutexGuard<'_, BTreeMap<u64, Listener>> {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notify(&self, change: &SettingsChange) {
        // Listeners run without any store lock held, so they may read or
        // write the store themselves.
        let listeners: Vec<Listener> = self.listeners().values().cloned().collect();
        log::debug!("settings changed: {:?} ({} listeners)", change, listeners.len());
        for listener in listeners {
            listener(change);
        }
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsStore")
            .field("settings", &self.snapshot())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Keeps a listener registered; dropping it unsubscribes
pub struct Subscription {
    id: u64,
    store: Weak<StoreInner>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            inner
                .listeners
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder(store: &SettingsStore) -> (Subscription, Arc<Mutex<Vec<SettingsChange>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sub = store.subscribe(move |change| sink.lock().unwrap().push(change.clone()));
        (sub, seen)
    }

    #[test]
    fn test_defaults() {
        let store = SettingsStore::new();
        assert!(!store.use_https());
        assert_eq!(store.server_url(), None);
    }

    #[test]
    fn test_change_notifies() {
        let store = SettingsStore::new();
        let (_sub, seen) = recorder(&store);

        assert!(store.set_use_https(true));
        assert!(store.set_server_url("http://10.0.0.5:3434"));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                SettingsChange::UseHttps(true),
                SettingsChange::ServerUrl("http://10.0.0.5:3434".to_string()),
            ]
        );
    }

    #[test]
    fn test_same_value_does_not_notify() {
        let store = SettingsStore::new();
        let (_sub, seen) = recorder(&store);
        assert!(!store.set_use_https(false));
        store.set_server_url("a");
        assert!(!store.set_server_url("a"));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_toggle() {
        let store = SettingsStore::new();
        assert!(store.toggle_use_https());
        assert!(!store.toggle_use_https());
    }

    #[test]
    fn test_drop_unsubscribes() {
        let store = SettingsStore::new();
        let (sub, seen) = recorder(&store);
        assert_eq!(store.subscriber_count(), 1);
        sub.unsubscribe();
        assert_eq!(store.subscriber_count(), 0);
        store.set_use_https(true);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_listener_may_read_store() {
        let store = SettingsStore::new();
        let reader = store.clone();
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let _sub = store.subscribe(move |_| *sink.lock().unwrap() = Some(reader.use_https()));
        store.set_use_https(true);
        assert_eq!(*seen.lock().unwrap(), Some(true));
    }

    #[test]
    fn test_subscription_outliving_store() {
        let store = SettingsStore::new();
        let (sub, _seen) = recorder(&store);
        drop(store);
        drop(sub);
    }
}
