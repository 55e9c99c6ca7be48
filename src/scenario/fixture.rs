//! Fixture and scenario lifetimes
//!
//! A `Fixture` owns one test server from set-up to tear-down; every
//! `Scenario` created from it finds that server in its state. A scenario can
//! also start servers of its own, which are stopped when the scenario ends.

use uuid::Uuid;

use crate::config::{ServerSettings, WaitSettings};
use crate::error::Result;
use crate::scenario::state::ScenarioState;
use crate::server::TestServer;

/// Owns one running test server for the fixture's lifetime
pub struct Fixture {
    server: TestServer,
}

impl Fixture {
    /// Start a console-logging server with `settings`.
    ///
    /// Wait bounds come from `STAGEHAND_WAIT_TIMEOUT_MS` / `STAGEHAND_WAIT_POLL_MS`
    /// when set; an unparsable value fails set-up with `InvalidConfig`.
    pub fn set_up(settings: ServerSettings) -> Result<Self> {
        Self::with_server(TestServer::with_wait(settings, WaitSettings::from_env()?))
    }

    /// Like `set_up`, with the server address also taken from the environment.
    pub fn from_env() -> Result<Self> {
        Self::with_server(TestServer::from_env()?)
    }

    /// Start the given (not yet started) server and own it.
    pub fn with_server(server: TestServer) -> Result<Self> {
        server.log_to_console().start()?;
        Ok(Fixture { server })
    }

    pub fn server(&self) -> &TestServer {
        &self.server
    }

    /// A new scenario whose state carries this fixture's server.
    pub fn scenario(&self) -> Scenario {
        let scenario = Scenario::new();
        scenario.state.set_typed(self.server.clone());
        scenario
    }

    /// Stop the server, blocking until its port is free again.
    pub fn tear_down(self) -> Result<()> {
        self.server.stop()
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        if let Err(e) = self.server.stop() {
            log::warn!("fixture teardown: {}", e);
        }
    }
}

/// One scenario: its state plus the servers it started itself
pub struct Scenario {
    state: ScenarioState,
    owned: Vec<TestServer>,
    finished: bool,
}

impl Scenario {
    pub fn new() -> Self {
        let state = ScenarioState::new();
        log::debug!("scenario {} started", state.id());
        Scenario {
            state,
            owned: Vec::new(),
            finished: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.state.id()
    }

    pub fn state(&self) -> &ScenarioState {
        &self.state
    }

    /// Start a server owned by this scenario and make it the scenario's server.
    pub fn start_server(&mut self, settings: ServerSettings) -> Result<TestServer> {
        let server = TestServer::new(settings);
        server.start()?;
        self.state.set_typed(server.clone());
        self.owned.push(server.clone());
        Ok(server)
    }

    /// The server stored in this scenario's state, if any.
    pub fn server(&self) -> Option<TestServer> {
        self.state.get_typed::<TestServer>()
    }

    /// Stop owned servers and clear the state.
    pub fn finish(mut self) -> Result<()> {
        self.end()
    }

    fn end(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        let mut first_error = None;
        for server in self.owned.drain(..) {
            if let Err(e) = server.stop() {
                first_error.get_or_insert(e);
            }
        }
        self.state.clear();
        log::debug!("scenario {} finished", self.state.id());

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Default for Scenario {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scenario {
    fn drop(&mut self) {
        if let Err(e) = self.end() {
            log::warn!("scenario teardown: {}", e);
        }
    }
}
