//! Constructors for scenario objects, keyed by identifier
//!
//! Steps ask for an object by id; the first request builds it from the
//! registered constructor and caches it in the scenario state, later
//! requests in the same scenario get the cached instance.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Result, StagehandError};
use crate::scenario::state::{Entry, ScenarioState};

/// State keys of cached objects start with this prefix.
pub const OBJECT_KEY_PREFIX: &str = "object:";

type Constructor<C> = Arc<dyn Fn(&C) -> Entry + Send + Sync>;

/// Maps object identifiers to constructors taking a shared context `C`
pub struct ObjectRegistry<C> {
    constructors: HashMap<String, Constructor<C>>,
}

impl<C> ObjectRegistry<C> {
    pub fn new() -> Self {
        ObjectRegistry {
            constructors: HashMap::new(),
        }
    }

    /// Register (or replace) the constructor for `id`.
    pub fn register<T, F>(&mut self, id: &str, constructor: F)
    where
        T: Any + Send + Sync,
        F: Fn(&C) -> T + Send + Sync + 'static,
    {
        let erased: Constructor<C> = Arc::new(move |ctx| Arc::new(constructor(ctx)) as Entry);
        self.constructors.insert(id.to_string(), erased);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.constructors.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// The scenario's instance of `id`, building it on first use.
    pub fn get_or_create<T>(&self, id: &str, ctx: &C, state: &ScenarioState) -> Result<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let key = format!("{}{}", OBJECT_KEY_PREFIX, id);
        if let Some(existing) = state.get_entry(&key) {
            return existing
                .downcast::<T>()
                .map_err(|_| StagehandError::ObjectTypeMismatch(id.to_string()));
        }

        let constructor = self
            .constructors
            .get(id)
            .ok_or_else(|| StagehandError::UnknownObject(id.to_string()))?;
        let entry = constructor(ctx);
        let typed = entry
            .clone()
            .downcast::<T>()
            .map_err(|_| StagehandError::ObjectTypeMismatch(id.to_string()))?;
        state.set_entry(key, entry);
        log::debug!("scenario {}: created object '{}'", state.id(), id);
        Ok(typed)
    }
}

impl<C> Default for ObjectRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Ctx {
        built: AtomicUsize,
        name: String,
    }

    struct MainPage {
        title: String,
    }

    struct SettingsPage;

    fn registry() -> ObjectRegistry<Ctx> {
        let mut registry = ObjectRegistry::new();
        registry.register("MainPage", |ctx: &Ctx| {
            ctx.built.fetch_add(1, Ordering::SeqCst);
            MainPage {
                title: ctx.name.clone(),
            }
        });
        registry.register("SettingsPage", |_: &Ctx| SettingsPage);
        registry
    }

    fn ctx() -> Ctx {
        Ctx {
            built: AtomicUsize::new(0),
            name: "Main".to_string(),
        }
    }

    #[test]
    fn test_builds_once_per_scenario() {
        let registry = registry();
        let ctx = ctx();
        let state = ScenarioState::new();

        let first = registry.get_or_create::<MainPage>("MainPage", &ctx, &state).unwrap();
        let second = registry.get_or_create::<MainPage>("MainPage", &ctx, &state).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.title, "Main");
        assert_eq!(ctx.built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_new_scenario_builds_again() {
        let registry = registry();
        let ctx = ctx();
        registry
            .get_or_create::<MainPage>("MainPage", &ctx, &ScenarioState::new())
            .unwrap();
        registry
            .get_or_create::<MainPage>("MainPage", &ctx, &ScenarioState::new())
            .unwrap();
        assert_eq!(ctx.built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unknown_object() {
        let err = registry()
            .get_or_create::<MainPage>("BarcodePage", &ctx(), &ScenarioState::new())
            .err()
            .unwrap();
        assert!(matches!(err, StagehandError::UnknownObject(id) if id == "BarcodePage"));
    }

    #[test]
    fn test_type_mismatch() {
        let registry = registry();
        let ctx = ctx();
        let state = ScenarioState::new();
        let err = registry
            .get_or_create::<MainPage>("SettingsPage", &ctx, &state)
            .err()
            .unwrap();
        assert!(matches!(err, StagehandError::ObjectTypeMismatch(_)));
        assert!(state.is_empty());

        registry.get_or_create::<SettingsPage>("SettingsPage", &ctx, &state).unwrap();
        let err = registry
            .get_or_create::<MainPage>("SettingsPage", &ctx, &state)
            .err()
            .unwrap();
        assert!(matches!(err, StagehandError::ObjectTypeMismatch(_)));
    }
}
