//! In-app end of the backdoor
//!
//! The platform exports exactly one entry point taking a JSON string and
//! returning a string; it forwards to [`Dispatcher::invoke`]. Invocations
//! arrive on the app's UI thread, so every operation here only touches
//! in-memory state.
//!
//! Protocol errors never surface as `Err` or panics. They come back as
//! sentinel strings the caller is expected to check:
//!
//! - unrecognized key: `"Unknown Key" + key`
//! - input that is not a command object: `"Malformed Command: " + reason`
//! - setter without a usable payload: `"Invalid Payload" + key`

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::backdoor::command::{
    unknown_key_reply, BackdoorKey, Command, INVALID_PAYLOAD, MALFORMED_COMMAND, PROTOCOL_VERSION,
};
use crate::backdoor::settings::SettingsStore;

/// Executes backdoor commands against the app's settings
#[derive(Debug)]
pub struct Dispatcher {
    settings: SettingsStore,
    invocations: AtomicUsize,
}

impl Dispatcher {
    pub fn new(settings: SettingsStore) -> Self {
        Dispatcher {
            settings,
            invocations: AtomicUsize::new(0),
        }
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// Number of calls to `invoke` so far.
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    /// Parse a serialized command and execute it.
    pub fn invoke(&self, wire: &str) -> String {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let reply = match Command::from_wire(wire) {
            Ok(command) => self.execute(&command),
            Err(e) => format!("{}{}", MALFORMED_COMMAND, e),
        };
        log::debug!("backdoor {} -> {}", wire, reply);
        reply
    }

    /// Execute an already parsed command.
    pub fn execute(&self, command: &Command) -> String {
        let key = match command.backdoor_key() {
            Some(key) => key,
            None => {
                log::warn!("backdoor: unknown key '{}'", command.key);
                return unknown_key_reply(&command.key);
            }
        };
        let payload = command.payload.as_deref();

        match key {
            BackdoorKey::SetRestInfo => match payload.map(str::trim) {
                Some(url) if !url.is_empty() => {
                    self.settings.set_server_url(url);
                    url.to_string()
                }
                _ => invalid_payload(key),
            },
            BackdoorKey::GetRestInfo => self.settings.server_url().unwrap_or_default(),
            BackdoorKey::GetUseHttps => self.settings.use_https().to_string(),
            BackdoorKey::SetUseHttps => match payload.and_then(parse_bool) {
                Some(value) => {
                    self.settings.set_use_https(value);
                    value.to_string()
                }
                None => invalid_payload(key),
            },
            BackdoorKey::ToggleUseHttps => self.settings.toggle_use_https().to_string(),
            BackdoorKey::GetProtocolVersion => PROTOCOL_VERSION.to_string(),
        }
    }
}

fn invalid_payload(key: BackdoorKey) -> String {
    format!("{}{}", INVALID_PAYLOAD, key)
}

/// `true`/`false` in any letter case, surrounding whitespace ignored.
pub fn parse_bool(raw: &str) -> Option<bool> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}
