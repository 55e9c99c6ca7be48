//! Minimal model of the app under test
//!
//! Just enough app for the backdoor to act on: a settings store, the
//! dispatcher exported to the automation layer, the service that calls the
//! configured server, and the settings page model.

pub mod rest_service;
pub mod settings_page;

use std::sync::Arc;

use crate::backdoor::{BackdoorClient, Dispatcher, InProcessDriver, Platform, SettingsStore};

pub use rest_service::RestService;
pub use settings_page::SettingsPageModel;

pub struct App {
    settings: SettingsStore,
    dispatcher: Arc<Dispatcher>,
    rest: RestService,
}

impl App {
    pub fn new() -> Self {
        let settings = SettingsStore::new();
        App {
            dispatcher: Arc::new(Dispatcher::new(settings.clone())),
            rest: RestService::new(settings.clone()),
            settings,
        }
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        self.dispatcher.clone()
    }

    pub fn rest_service(&self) -> &RestService {
        &self.rest
    }

    /// A fresh settings page bound to this app's store.
    pub fn settings_page(&self) -> SettingsPageModel {
        SettingsPageModel::new(self.settings.clone())
    }

    /// Automation handle exposing this app's backdoor as `platform` would.
    pub fn driver(&self, platform: Platform) -> InProcessDriver {
        InProcessDriver::new(platform, self.dispatcher.clone())
    }

    pub fn backdoor(&self, platform: Platform) -> BackdoorClient<InProcessDriver> {
        BackdoorClient::new(self.driver(platform))
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}
