//! Backdoor wire format and key vocabulary
//!
//! A command travels as one JSON object:
//!
//! ```json
//! { "key": "SetUseHttps", "payload": "true" }
//! ```
//!
//! `payload` is optional. The set of keys is closed and versioned by
//! [`PROTOCOL_VERSION`]; anything else is answered with the unknown-key
//! sentinel.

use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;
use serde::de::Error as _;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Version of the key vocabulary below.
pub const PROTOCOL_VERSION: u32 = 1;

/// Wire field names
pub const KEY_FIELD: &str = "key";
pub const PAYLOAD_FIELD: &str = "payload";

/// Prefix of the reply to an unrecognized key; the key follows with no separator.
pub const UNKNOWN_KEY: &str = "Unknown Key";
/// Prefix of the reply to input that is not a command object.
pub const MALFORMED_COMMAND: &str = "Malformed Command: ";
/// Prefix of the reply to a setter given a missing or unparsable payload.
pub const INVALID_PAYLOAD: &str = "Invalid Payload";

/// One backdoor request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    #[serde(default)]
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl Command {
    pub fn new(key: impl Into<String>) -> Self {
        Command {
            key: key.into(),
            payload: None,
        }
    }

    pub fn with_payload(key: impl Into<String>, payload: impl Into<String>) -> Self {
        Command {
            key: key.into(),
            payload: Some(payload.into()),
        }
    }

    pub fn to_wire(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a command; only a JSON object is accepted.
    pub fn from_wire(wire: &str) -> Result<Self> {
        // serde reads a struct from a sequence too, so check the shape first
        let value: serde_json::Value = serde_json::from_str(wire)?;
        if !value.is_object() {
            return Err(serde_json::Error::custom(format!(
                "expected a command object, found {}",
                json_kind(&value)
            ))
            .into());
        }
        Ok(serde_json::from_value(value)?)
    }

    /// The recognized key this command names, if any.
    pub fn backdoor_key(&self) -> Option<BackdoorKey> {
        BackdoorKey::lookup(&self.key)
    }
}

/// Operations the app exposes through the backdoor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackdoorKey {
    /// Point the app at a server URL (payload: the URL)
    SetRestInfo,
    /// Read the configured server URL
    GetRestInfo,
    /// Read the "use https" setting
    GetUseHttps,
    /// Write the "use https" setting (payload: `true` / `false`)
    SetUseHttps,
    /// Flip the "use https" setting
    ToggleUseHttps,
    /// Report [`PROTOCOL_VERSION`]
    GetProtocolVersion,
}

lazy_static! {
    static ref KEY_TABLE: HashMap<&'static str, BackdoorKey> = BackdoorKey::ALL
        .iter()
        .map(|key| (key.as_str(), *key))
        .collect();
}

impl BackdoorKey {
    pub const ALL: [BackdoorKey; 6] = [
        BackdoorKey::SetRestInfo,
        BackdoorKey::GetRestInfo,
        BackdoorKey::GetUseHttps,
        BackdoorKey::SetUseHttps,
        BackdoorKey::ToggleUseHttps,
        BackdoorKey::GetProtocolVersion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackdoorKey::SetRestInfo => "SetRestInfo",
            BackdoorKey::GetRestInfo => "GetRestInfo",
            BackdoorKey::GetUseHttps => "GetUseHttps",
            BackdoorKey::SetUseHttps => "SetUseHttps",
            BackdoorKey::ToggleUseHttps => "ToggleUseHttps",
            BackdoorKey::GetProtocolVersion => "GetProtocolVersion",
        }
    }

    /// Exact, case-sensitive lookup.
    pub fn lookup(key: &str) -> Option<BackdoorKey> {
        KEY_TABLE.get(key).copied()
    }

    /// Whether the operation needs a payload.
    pub fn takes_payload(&self) -> bool {
        matches!(self, BackdoorKey::SetRestInfo | BackdoorKey::SetUseHttps)
    }

    pub fn command(&self) -> Command {
        Command::new(self.as_str())
    }

    pub fn command_with(&self, payload: impl Into<String>) -> Command {
        Command::with_payload(self.as_str(), payload)
    }
}

impl fmt::Display for BackdoorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// The reply to an unrecognized key.
pub fn unknown_key_reply(key: &str) -> String {
    format!("{}{}", UNKNOWN_KEY, key)
}
