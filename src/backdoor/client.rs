//! Test-side end of the backdoor
//!
//! Serializes a command and hands it to the UI-automation layer's "call a
//! named export in the app" primitive, abstracted as [`AppDriver`]. The
//! export name depends on the platform: iOS selectors taking an argument
//! end in `:`, Android exports do not.

use std::fmt;
use std::str::FromStr;

use crate::backdoor::command::{BackdoorKey, Command};
use crate::backdoor::dispatcher::parse_bool;
use crate::error::{Result, StagehandError};
use crate::fixtures::BACKDOOR_EXPORT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Android,
    Ios,
}

impl Platform {
    /// The name an export called `base` is reachable under on this platform.
    pub fn export_name(&self, base: &str) -> String {
        match self {
            Platform::Android => base.to_string(),
            Platform::Ios => format!("{}:", base),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Android => f.write_str("android"),
            Platform::Ios => f.write_str("ios"),
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "android" => Ok(Platform::Android),
            "ios" => Ok(Platform::Ios),
            other => Err(format!("unknown platform '{}'", other)),
        }
    }
}

/// The automation layer's handle on a running app
pub trait AppDriver {
    fn platform(&self) -> Platform;

    /// Call export `name` with one string argument and return its string result.
    fn invoke_export(&self, name: &str, argument: &str) -> Result<String>;
}

impl<D: AppDriver + ?Sized> AppDriver for &D {
    fn platform(&self) -> Platform {
        (**self).platform()
    }

    fn invoke_export(&self, name: &str, argument: &str) -> Result<String> {
        (**self).invoke_export(name, argument)
    }
}

/// Sends backdoor commands through an `AppDriver`
///
/// One attempt per call; driver failures propagate unchanged.
pub struct BackdoorClient<D> {
    driver: D,
    export: String,
}

impl<D: AppDriver> BackdoorClient<D> {
    pub fn new(driver: D) -> Self {
        Self::with_export(driver, BACKDOOR_EXPORT)
    }

    /// Use a differently named export.
    pub fn with_export(driver: D, export: &str) -> Self {
        BackdoorClient {
            driver,
            export: export.to_string(),
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Export name for the driver's platform.
    pub fn export_name(&self) -> String {
        self.driver.platform().export_name(&self.export)
    }

    pub fn invoke(&self, key: &str) -> Result<String> {
        self.invoke_command(&Command::new(key))
    }

    pub fn invoke_with(&self, key: &str, payload: &str) -> Result<String> {
        self.invoke_command(&Command::with_payload(key, payload))
    }

    pub fn invoke_command(&self, command: &Command) -> Result<String> {
        let wire = command.to_wire()?;
        let name = self.export_name();
        log::debug!("invoking {} with {}", name, wire);
        self.driver.invoke_export(&name, &wire)
    }

    pub fn invoke_key(&self, key: BackdoorKey) -> Result<String> {
        self.invoke_command(&key.command())
    }

    /// Invoke `key` and read the reply as a boolean.
    ///
    /// A reply that is not `true`/`false` (e.g. the unknown-key sentinel)
    /// becomes an `Invocation` error carrying the reply.
    pub fn invoke_bool(&self, key: &str) -> Result<bool> {
        let reply = self.invoke(key)?;
        parse_bool(&reply).ok_or_else(|| {
            StagehandError::Invocation(format!("'{}' returned non-boolean '{}'", key, reply))
        })
    }
}
