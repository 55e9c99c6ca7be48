//! Backdoor: a single named entry point in the app that tests call to read
//! and change app state without going through the UI.

pub mod client;
pub mod command;
pub mod dispatcher;
pub mod driver;
pub mod settings;

pub use client::{AppDriver, BackdoorClient, Platform};
pub use command::{BackdoorKey, Command, PROTOCOL_VERSION, UNKNOWN_KEY};
pub use dispatcher::Dispatcher;
pub use driver::InProcessDriver;
pub use settings::{Settings, SettingsChange, SettingsStore, Subscription};
