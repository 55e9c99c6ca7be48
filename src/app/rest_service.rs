//! The app's outbound call to its configured server

use std::time::Duration;

use crate::backdoor::settings::SettingsStore;
use crate::error::Result;
use crate::fixtures::TEST_ENDPOINT;

/// Query parameters the app sends with every call
pub const CALL_PARAMS: [(&str, &str); 2] = [("key1", "value1"), ("key2", "value2")];

const CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Calls `{server_url}{TEST_ENDPOINT}` with [`CALL_PARAMS`]
#[derive(Debug, Clone)]
pub struct RestService {
    settings: SettingsStore,
}

impl RestService {
    pub fn new(settings: SettingsStore) -> Self {
        RestService { settings }
    }

    /// The URL `call` would hit, or `None` while no server is configured.
    pub fn endpoint(&self) -> Option<String> {
        self.settings
            .server_url()
            .map(|base| format!("{}{}", base.trim_end_matches('/'), TEST_ENDPOINT))
    }

    /// Perform the call and return the response body.
    ///
    /// Without a configured server this is a no-op returning an empty body.
    pub fn call(&self) -> Result<String> {
        let url = match self.endpoint() {
            Some(url) => url,
            None => {
                log::info!("no server configured, skipping call");
                return Ok(String::new());
            }
        };

        log::info!("calling {}", url);
        let client = reqwest::blocking::Client::builder()
            .timeout(CALL_TIMEOUT)
            .build()?;
        let response = client.get(&url).query(&CALL_PARAMS).send()?;
        Ok(response.text()?)
    }
}
