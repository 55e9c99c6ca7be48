//! Runtime configuration for test servers and bounded waits.
//!
//! Everything lives in memory for one test run. Values can be overridden
//! from the environment:
//!
//! - `STAGEHAND_HOST` - interface the test server binds to
//! - `STAGEHAND_PORT` - port the test server binds to
//! - `STAGEHAND_WAIT_TIMEOUT_MS` - how long a bounded wait may block
//! - `STAGEHAND_WAIT_POLL_MS` - how often a polling wait re-checks

use std::time::Duration;

use crate::error::{Result, StagehandError};
use crate::fixtures::{DEFAULT_HOST, REST_PORT};

pub const HOST_VAR: &str = "STAGEHAND_HOST";
pub const PORT_VAR: &str = "STAGEHAND_PORT";
pub const WAIT_TIMEOUT_VAR: &str = "STAGEHAND_WAIT_TIMEOUT_MS";
pub const WAIT_POLL_VAR: &str = "STAGEHAND_WAIT_POLL_MS";

/// Where a test server listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        ServerSettings {
            host: host.into(),
            port,
        }
    }

    /// All interfaces on the given port.
    pub fn on_port(port: u16) -> Self {
        Self::new(DEFAULT_HOST, port)
    }

    /// Defaults overridden by `STAGEHAND_HOST` / `STAGEHAND_PORT`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = Self::default();
        if let Some(host) = lookup(HOST_VAR) {
            if host.trim().is_empty() {
                return Err(StagehandError::InvalidConfig(format!("{} is empty", HOST_VAR)));
            }
            settings.host = host.trim().to_string();
        }
        if let Some(port) = lookup(PORT_VAR) {
            settings.port = parse_number(PORT_VAR, &port)?;
        }
        Ok(settings)
    }

    /// The `host:port` string handed to the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self::on_port(REST_PORT)
    }
}

/// Bounds for waits on scenario state and polled conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitSettings {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl WaitSettings {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        WaitSettings {
            timeout,
            poll_interval,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Defaults overridden by `STAGEHAND_WAIT_TIMEOUT_MS` / `STAGEHAND_WAIT_POLL_MS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = Self::default();
        if let Some(ms) = lookup(WAIT_TIMEOUT_VAR) {
            settings.timeout = Duration::from_millis(parse_number(WAIT_TIMEOUT_VAR, &ms)?);
        }
        if let Some(ms) = lookup(WAIT_POLL_VAR) {
            let poll: u64 = parse_number(WAIT_POLL_VAR, &ms)?;
            if poll == 0 {
                return Err(StagehandError::InvalidConfig(format!(
                    "{} must be greater than zero",
                    WAIT_POLL_VAR
                )));
            }
            settings.poll_interval = Duration::from_millis(poll);
        }
        Ok(settings)
    }
}

impl Default for WaitSettings {
    fn default() -> Self {
        WaitSettings {
            timeout: Duration::from_secs(15),
            poll_interval: Duration::from_millis(250),
        }
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| StagehandError::InvalidConfig(format!("{} is not a valid number: '{}'", name, raw)))
}
