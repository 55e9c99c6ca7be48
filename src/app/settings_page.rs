//! Model behind the settings page's "Use Https" switch

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::backdoor::settings::{SettingsChange, SettingsStore, Subscription};

/// Mirrors `use_https`; changes made elsewhere (e.g. through the backdoor)
/// show up here, changes made here are written through to the store.
pub struct SettingsPageModel {
    store: SettingsStore,
    use_https: Arc<AtomicBool>,
    _subscription: Subscription,
}

impl SettingsPageModel {
    pub fn new(store: SettingsStore) -> Self {
        let use_https = Arc::new(AtomicBool::new(store.use_https()));
        let mirror = use_https.clone();
        let subscription = store.subscribe(move |change| {
            if let SettingsChange::UseHttps(value) = change {
                mirror.store(*value, Ordering::SeqCst);
            }
        });

        SettingsPageModel {
            store,
            use_https,
            _subscription: subscription,
        }
    }

    pub fn use_https(&self) -> bool {
        self.use_https.load(Ordering::SeqCst)
    }

    /// Returns whether anything changed.
    pub fn set_use_https(&self, value: bool) -> bool {
        if self.use_https.swap(value, Ordering::SeqCst) == value {
            return false;
        }
        self.store.set_use_https(value);
        true
    }

    /// What tapping the switch does.
    pub fn tap_use_https(&self) -> bool {
        let value = !self.use_https();
        self.set_use_https(value);
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_writes_through() {
        let store = SettingsStore::new();
        let page = SettingsPageModel::new(store.clone());
        assert!(page.tap_use_https());
        assert!(store.use_https());
        assert!(!page.set_use_https(true));
    }

    #[test]
    fn test_model_mirrors_external_changes() {
        let store = SettingsStore::new();
        let page = SettingsPageModel::new(store.clone());
        store.set_use_https(true);
        assert!(page.use_https());
    }

    #[test]
    fn test_drop_releases_subscription() {
        let store = SettingsStore::new();
        let page = SettingsPageModel::new(store.clone());
        assert_eq!(store.subscriber_count(), 1);
        drop(page);
        assert_eq!(store.subscriber_count(), 0);
    }
}
