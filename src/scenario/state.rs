//! Scenario-scoped key/value store
//!
//! Shared between the scenario thread and test-server request handlers.
//! Every write wakes threads blocked in [`ScenarioState::wait_until`].

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::error::{Result, StagehandError};

pub(crate) type Entry = Arc<dyn Any + Send + Sync>;

struct Shared {
    entries: Mutex<HashMap<String, Entry>>,
    changed: Condvar,
}

/// Ephemeral state for one scenario; clones share the same store
#[derive(Clone)]
pub struct ScenarioState {
    id: Uuid,
    shared: Arc<Shared>,
}

/// Read-only view handed to wait predicates
pub struct Entries<'a> {
    map: &'a HashMap<String, Entry>,
}

impl Entries<'_> {
    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn get<T: Any + Clone>(&self, key: &str) -> Option<T> {
        self.map.get(key).and_then(|v| v.downcast_ref::<T>()).cloned()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl ScenarioState {
    pub fn new() -> Self {
        ScenarioState {
            id: Uuid::new_v4(),
            shared: Arc::new(Shared {
                entries: Mutex::new(HashMap::new()),
                changed: Condvar::new(),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // A handler that panicked while holding the lock cannot leave the map
        // half-written, so the data is still usable.
        self.shared
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store a value, replacing any previous value under `key`.
    pub fn set<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.set_entry(key.into(), Arc::new(value));
    }

    pub(crate) fn set_entry(&self, key: String, value: Entry) {
        self.lock().insert(key, value);
        self.shared.changed.notify_all();
    }

    /// A clone of the value under `key`, if present with type `T`.
    pub fn get<T: Any + Clone>(&self, key: &str) -> Option<T> {
        self.lock()
            .get(key)
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    pub(crate) fn get_entry(&self, key: &str) -> Option<Entry> {
        self.lock().get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn remove(&self, key: &str) -> bool {
        let removed = self.lock().remove(key).is_some();
        if removed {
            self.shared.changed.notify_all();
        }
        removed
    }

    pub fn clear(&self) {
        self.lock().clear();
        self.shared.changed.notify_all();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Store a value keyed by its type name.
    pub fn set_typed<T: Any + Send + Sync>(&self, value: T) {
        self.set(type_name::<T>(), value);
    }

    pub fn get_typed<T: Any + Clone>(&self) -> Option<T> {
        self.get(type_name::<T>())
    }

    pub fn remove_typed<T: Any>(&self) -> bool {
        self.remove(type_name::<T>())
    }

    /// Block until `predicate` holds or `timeout` passes.
    ///
    /// `expected` describes the awaited condition and ends up in the
    /// `Timeout` error.
    pub fn wait_until<F>(&self, timeout: Duration, expected: &str, predicate: F) -> Result<()>
    where
        F: Fn(&Entries<'_>) -> bool,
    {
        let start = Instant::now();
        let deadline = start + timeout;
        let mut entries = self.lock();

        loop {
            if predicate(&Entries { map: &*entries }) {
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                log::warn!("scenario {}: timed out waiting for {}", self.id, expected);
                return Err(StagehandError::Timeout {
                    expected: expected.to_string(),
                    waited: start.elapsed(),
                });
            }

            entries = self
                .shared
                .changed
                .wait_timeout(entries, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }

    /// Block until `key` is present.
    pub fn wait_for_key(&self, key: &str, timeout: Duration) -> Result<()> {
        self.wait_until(timeout, &format!("'{}' to be recorded", key), |entries| {
            entries.contains_key(key)
        })
    }
}

impl Default for ScenarioState {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ScenarioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        f.debug_struct("ScenarioState")
            .field("id", &self.id)
            .field("keys", &keys)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_set_get_overwrite() {
        let state = ScenarioState::new();
        state.set("count", 1i64);
        state.set("count", 2i64);
        assert_eq!(state.get::<i64>("count"), Some(2));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_get_wrong_type_is_none() {
        let state = ScenarioState::new();
        state.set("name", "value1".to_string());
        assert_eq!(state.get::<bool>("name"), None);
        assert_eq!(state.get::<String>("name").as_deref(), Some("value1"));
    }

    #[test]
    fn test_remove_and_clear() {
        let state = ScenarioState::new();
        state.set("a", true);
        state.set("b", true);
        assert!(state.remove("a"));
        assert!(!state.remove("a"));
        state.clear();
        assert!(state.is_empty());
    }

    #[test]
    fn test_typed_entries() {
        #[derive(Clone, Debug, PartialEq)]
        struct Marker(u8);

        let state = ScenarioState::new();
        state.set_typed(Marker(7));
        assert_eq!(state.get_typed::<Marker>(), Some(Marker(7)));
        assert!(state.remove_typed::<Marker>());
        assert_eq!(state.get_typed::<Marker>(), None);
    }

    #[test]
    fn test_clones_share_store() {
        let state = ScenarioState::new();
        let other = state.clone();
        other.set("shared", 5u32);
        assert_eq!(state.get::<u32>("shared"), Some(5));
        assert_eq!(state.id(), other.id());
    }

    #[test]
    fn test_wait_until_already_true() {
        let state = ScenarioState::new();
        state.set("ready", true);
        assert!(state.wait_for_key("ready", Duration::from_millis(10)).is_ok());
    }

    #[test]
    fn test_wait_until_woken_by_other_thread() {
        let state = ScenarioState::new();
        let writer = state.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            writer.set("WasCalled", true);
        });

        let start = Instant::now();
        state
            .wait_until(Duration::from_secs(5), "the flag", |e| {
                e.get::<bool>("WasCalled") == Some(true)
            })
            .unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_until_times_out() {
        let state = ScenarioState::new();
        let start = Instant::now();
        let err = state
            .wait_for_key("never", Duration::from_millis(100))
            .unwrap_err();
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert!(err.is_timeout());
        assert!(err.to_string().contains("'never' to be recorded"));
    }
}
