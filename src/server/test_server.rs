//! Disposable HTTP server for acceptance tests
//!
//! A `TestServer` is created per fixture or per scenario, started, given
//! routes while it runs, and stopped at teardown. It binds all interfaces by
//! default so an app on another device or emulator can reach it through
//! [`TestServer::url`].
//!
//! ## Lifecycle
//!
//! `Created -> Started -> Stopped`. A stopped server cannot be restarted;
//! create a new one on the same port instead. `stop()` blocks until the
//! port can be bound again.
//!
//! ## Threads
//!
//! One accept thread pulls requests off the listener and hands each one to
//! its own thread, so a slow handler does not hold up other requests.
//! Handlers typically record what they saw in a `ScenarioState` that the
//! scenario thread waits on.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use colored::*;
use serde::de::DeserializeOwned;

use crate::config::{ServerSettings, WaitSettings};
use crate::discovery;
use crate::error::{Result, StagehandError};
use crate::scenario::state::{Entries, ScenarioState};
use crate::server::request::{TestRequest, TestResponse};
use crate::server::routes::{Handler, Method, RouteTable};

/// How long `stop()` waits for the OS to release the port.
const PORT_RELEASE_TIMEOUT: Duration = Duration::from_secs(2);
const PORT_RELEASE_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Started,
    Stopped,
}

/// State shared with the accept and request threads
struct Shared {
    routes: RwLock<RouteTable>,
    echo: AtomicBool,
    served: AtomicUsize,
}

impl Shared {
    fn routes(&self) -> RwLockReadGuard<'_, RouteTable> {
        self.routes.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn routes_mut(&self) -> RwLockWriteGuard<'_, RouteTable> {
        self.routes.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

struct Runtime {
    lifecycle: Lifecycle,
    listener: Option<Arc<tiny_http::Server>>,
    worker: Option<JoinHandle<()>>,
    bound_port: Option<u16>,
}

struct ServerInner {
    settings: ServerSettings,
    wait: WaitSettings,
    shared: Arc<Shared>,
    runtime: Mutex<Runtime>,
}

impl ServerInner {
    fn runtime(&self) -> MutexGuard<'_, Runtime> {
        self.runtime.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for ServerInner {
    fn drop(&mut self) {
        let runtime = self.runtime.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(listener) = runtime.listener.take() {
            listener.unblock();
        }
        if let Some(worker) = runtime.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Handle to a test server; clones control the same server
#[derive(Clone)]
pub struct TestServer {
    inner: Arc<ServerInner>,
}

impl TestServer {
    pub fn new(settings: ServerSettings) -> Self {
        Self::with_wait(settings, WaitSettings::default())
    }

    /// A server on `port`, all interfaces.
    pub fn on_port(port: u16) -> Self {
        Self::new(ServerSettings::on_port(port))
    }

    /// Server and wait settings from the `STAGEHAND_*` variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self::with_wait(ServerSettings::from_env()?, WaitSettings::from_env()?))
    }

    pub fn with_wait(settings: ServerSettings, wait: WaitSettings) -> Self {
        TestServer {
            inner: Arc::new(ServerInner {
                settings,
                wait,
                shared: Arc::new(Shared {
                    routes: RwLock::new(RouteTable::new()),
                    echo: AtomicBool::new(false),
                    served: AtomicUsize::new(0),
                }),
                runtime: Mutex::new(Runtime {
                    lifecycle: Lifecycle::Created,
                    listener: None,
                    worker: None,
                    bound_port: None,
                }),
            }),
        }
    }

    /// Echo every handled request to stdout.
    pub fn log_to_console(&self) -> &Self {
        self.inner.shared.echo.store(true, Ordering::SeqCst);
        self
    }

    pub fn settings(&self) -> &ServerSettings {
        &self.inner.settings
    }

    pub fn wait_settings(&self) -> &WaitSettings {
        &self.inner.wait
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.runtime().lifecycle
    }

    pub fn is_listening(&self) -> bool {
        self.lifecycle() == Lifecycle::Started
    }

    /// The bound port once started (useful with port 0), the configured one before.
    pub fn port(&self) -> u16 {
        self.inner
            .runtime()
            .bound_port
            .unwrap_or(self.inner.settings.port)
    }

    /// Number of requests answered so far.
    pub fn requests_served(&self) -> usize {
        self.inner.shared.served.load(Ordering::SeqCst)
    }

    // ===========================================
    // Lifecycle
    // ===========================================

    /// Bind the listener and start accepting requests.
    pub fn start(&self) -> Result<&Self> {
        let mut runtime = self.inner.runtime();
        match runtime.lifecycle {
            Lifecycle::Started => return Err(StagehandError::AlreadyStarted),
            Lifecycle::Stopped => return Err(StagehandError::ServerStopped),
            Lifecycle::Created => {}
        }

        let addr = self.inner.settings.bind_addr();
        let listener = tiny_http::Server::http(&addr).map_err(|e| StagehandError::Bind {
            addr: addr.clone(),
            message: e.to_string(),
        })?;
        let listener = Arc::new(listener);
        let port = listener
            .server_addr()
            .to_ip()
            .map(|a| a.port())
            .unwrap_or(self.inner.settings.port);

        // On spawn failure the listener is dropped here, releasing the port.
        let worker = thread::Builder::new()
            .name(format!("stagehand-accept-{}", port))
            .spawn({
                let listener = listener.clone();
                let shared = self.inner.shared.clone();
                move || accept_loop(listener, shared)
            })?;

        runtime.lifecycle = Lifecycle::Started;
        runtime.listener = Some(listener);
        runtime.worker = Some(worker);
        runtime.bound_port = Some(port);

        log::info!("test server listening on {}:{}", self.inner.settings.host, port);
        Ok(self)
    }

    /// Stop accepting, close the listener and wait for the port to be free.
    ///
    /// Safe to call on a server that never started or already stopped.
    pub fn stop(&self) -> Result<()> {
        let (listener, worker, port) = {
            let mut runtime = self.inner.runtime();
            let was = runtime.lifecycle;
            runtime.lifecycle = Lifecycle::Stopped;
            if was != Lifecycle::Started {
                return Ok(());
            }
            (
                runtime.listener.take(),
                runtime.worker.take(),
                runtime.bound_port,
            )
        };

        if let Some(listener) = &listener {
            listener.unblock();
        }
        if let Some(worker) = worker {
            if worker.join().is_err() {
                log::warn!("test server accept loop panicked");
            }
        }
        drop(listener);

        if let Some(port) = port {
            wait_for_port_release(port)?;
            log::info!("test server on port {} stopped", port);
        }
        Ok(())
    }

    // ===========================================
    // Routes
    // ===========================================

    /// Register a handler; replaces any handler for the same method and pattern.
    pub fn register<F>(&self, method: Method, pattern: &str, handler: F) -> &Self
    where
        F: Fn(&TestRequest) -> TestResponse + Send + Sync + 'static,
    {
        self.register_handler(method, pattern, Arc::new(handler))
    }

    pub fn register_handler(&self, method: Method, pattern: &str, handler: Handler) -> &Self {
        log::debug!("registering {} {}", method, pattern);
        self.inner.shared.routes_mut().register(method, pattern, handler);
        self
    }

    pub fn get<F>(&self, pattern: &str, handler: F) -> &Self
    where
        F: Fn(&TestRequest) -> TestResponse + Send + Sync + 'static,
    {
        self.register(Method::Get, pattern, handler)
    }

    pub fn post<F>(&self, pattern: &str, handler: F) -> &Self
    where
        F: Fn(&TestRequest) -> TestResponse + Send + Sync + 'static,
    {
        self.register(Method::Post, pattern, handler)
    }

    pub fn unregister(&self, method: Method, pattern: &str) -> bool {
        self.inner.shared.routes_mut().unregister(method, pattern)
    }

    /// Handler for requests no route matches (404 by default).
    pub fn set_fallback<F>(&self, handler: F) -> &Self
    where
        F: Fn(&TestRequest) -> TestResponse + Send + Sync + 'static,
    {
        self.inner.shared.routes_mut().set_fallback(Arc::new(handler));
        self
    }

    /// Forget scenario routes; the liveness route stays.
    pub fn clear_routes(&self) {
        self.inner.shared.routes_mut().clear();
    }

    pub fn route_count(&self) -> usize {
        self.inner.shared.routes().len()
    }

    // ===========================================
    // Addressing
    // ===========================================

    /// This host's externally routable address.
    pub fn local_ip(&self) -> Result<String> {
        Ok(discovery::local_reachable_address()?.to_string())
    }

    /// `http://{local ip}:{port}{path}`
    pub fn url(&self, path: &str) -> Result<String> {
        Ok(self.url_for_host(&self.local_ip()?, path))
    }

    /// `http://{host}:{port}{path}`, a slash is put in front of `path` if missing.
    pub fn url_for_host(&self, host: &str, path: &str) -> String {
        if path.starts_with('/') {
            format!("http://{}:{}{}", host, self.port(), path)
        } else {
            format!("http://{}:{}/{}", host, self.port(), path)
        }
    }

    /// GET `path` on this server through its discovered address and return the body.
    pub fn fetch(&self, path: &str) -> Result<String> {
        fetch_text(&self.url(path)?)
    }

    /// GET `path` through an explicit host (e.g. `127.0.0.1`).
    pub fn fetch_from(&self, host: &str, path: &str) -> Result<String> {
        fetch_text(&self.url_for_host(host, path))
    }

    pub fn fetch_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self.fetch(path)?;
        Ok(serde_json::from_str(&body)?)
    }

    // ===========================================
    // Waiting on scenario state
    // ===========================================

    /// Block until `predicate` holds for `state`, bounded by this server's wait timeout.
    pub fn wait_until<F>(&self, state: &ScenarioState, expected: &str, predicate: F) -> Result<()>
    where
        F: Fn(&Entries<'_>) -> bool,
    {
        state.wait_until(self.inner.wait.timeout, expected, predicate)
    }

    /// Block until a handler has stored `true` under `key`.
    pub fn wait_for_flag(&self, state: &ScenarioState, key: &str) -> Result<()> {
        self.wait_until(state, &format!("'{}' to be set by the test server", key), |entries| {
            entries.get::<bool>(key) == Some(true)
        })
    }
}

impl fmt::Debug for TestServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestServer")
            .field("host", &self.inner.settings.host)
            .field("port", &self.port())
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}

fn fetch_text(url: &str) -> Result<String> {
    // A fresh client per call: pooled keep-alive connections could outlive
    // the server they were opened against.
    let response = reqwest::blocking::Client::new().get(url).send()?;
    Ok(response.text()?)
}

fn wait_for_port_release(port: u16) -> Result<()> {
    let start = Instant::now();
    while !discovery::is_port_free(port) {
        if start.elapsed() >= PORT_RELEASE_TIMEOUT {
            return Err(StagehandError::PortNotReleased { port });
        }
        thread::sleep(PORT_RELEASE_POLL);
    }
    Ok(())
}

fn accept_loop(listener: Arc<tiny_http::Server>, shared: Arc<Shared>) {
    // Ends once `unblock()` is called.
    for request in listener.incoming_requests() {
        let shared = shared.clone();
        let spawned = thread::Builder::new()
            .name("stagehand-request".to_string())
            .spawn(move || dispatch(request, &shared));
        // The request went down with the closure; tiny_http answers it with a 500.
        if let Err(e) = spawned {
            log::error!("failed to spawn request thread: {}", e);
        }
    }
}

fn dispatch(mut request: tiny_http::Request, shared: &Shared) {
    let response = match TestRequest::from_tiny(&mut request) {
        Ok(Some(req)) => {
            let (handler, params) = {
                let routes = shared.routes();
                match routes.resolve(req.method, &req.path) {
                    Some(resolved) => (resolved.handler, resolved.params),
                    None => (routes.fallback(), HashMap::new()),
                }
            };
            handler(&req.with_params(params))
        }
        Ok(None) => TestResponse::status(405, "Method Not Allowed"),
        Err(e) => TestResponse::status(400, format!("Bad Request: {}", e)),
    };

    let method = request.method().to_string();
    let url = request.url().to_string();
    let status = response.status;
    shared.served.fetch_add(1, Ordering::SeqCst);

    log::info!("{} {} -> {}", method, url, status);
    if shared.echo.load(Ordering::SeqCst) {
        let status_text = if status < 400 {
            status.to_string().green()
        } else {
            status.to_string().red()
        };
        println!("{} {} {}", method.cyan().bold(), url, status_text);
    }

    if let Err(e) = request.respond(response.into_tiny()) {
        log::warn!("failed to send response for {} {}: {}", method, url, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> TestServer {
        TestServer::with_wait(
            ServerSettings::new("127.0.0.1", 0),
            WaitSettings::new(Duration::from_millis(300), Duration::from_millis(10)),
        )
    }

    // ===========================================
    // Lifecycle Tests
    // ===========================================

    #[test]
    fn test_new_server_is_created() {
        let server = local();
        assert_eq!(server.lifecycle(), Lifecycle::Created);
        assert!(!server.is_listening());
        assert_eq!(server.route_count(), 1);
    }

    #[test]
    fn test_stop_without_start_is_noop() {
        let server = local();
        assert!(server.stop().is_ok());
        assert!(server.stop().is_ok());
    }

    #[test]
    fn test_start_twice_fails() {
        let server = local();
        server.start().unwrap();
        assert!(matches!(server.start(), Err(StagehandError::AlreadyStarted)));
        server.stop().unwrap();
        assert!(matches!(server.start(), Err(StagehandError::ServerStopped)));
    }

    #[test]
    fn test_bound_port_reported() {
        let server = local();
        server.start().unwrap();
        assert_ne!(server.port(), 0);
        assert!(server.is_listening());
        server.stop().unwrap();
        assert_eq!(server.lifecycle(), Lifecycle::Stopped);
    }

    #[test]
    fn test_bind_failure() {
        let first = local();
        first.start().unwrap();
        let second = TestServer::new(ServerSettings::new("127.0.0.1", first.port()));
        match second.start() {
            Err(StagehandError::Bind { addr, .. }) => assert!(addr.ends_with(&first.port().to_string())),
            other => panic!("Expected Bind error, got {:?}", other.map(|_| ())),
        }
        assert_eq!(second.lifecycle(), Lifecycle::Created);
        first.stop().unwrap();
    }

    // ===========================================
    // Addressing Tests
    // ===========================================

    #[test]
    fn test_url_for_host_adds_slash() {
        let server = TestServer::on_port(3434);
        assert_eq!(server.url_for_host("10.0.0.5", "api/test"), "http://10.0.0.5:3434/api/test");
        assert_eq!(server.url_for_host("10.0.0.5", "/api/test"), "http://10.0.0.5:3434/api/test");
    }

    // ===========================================
    // Dispatch Tests
    // ===========================================

    #[test]
    fn test_liveness_and_miss() {
        let server = local();
        server.start().unwrap();
        assert_eq!(server.fetch_from("127.0.0.1", "/").unwrap(), "Server Up");
        assert_eq!(server.fetch_from("127.0.0.1", "/nothing").unwrap(), "Not Found");
        assert_eq!(server.requests_served(), 2);
        server.stop().unwrap();
    }

    #[test]
    fn test_routes_added_after_start() {
        let server = local();
        server.start().unwrap();
        server.get("/users/{id}", |req| {
            TestResponse::text(format!("user {}", req.param("id").unwrap_or("?")))
        });
        assert_eq!(server.fetch_from("127.0.0.1", "/users/42").unwrap(), "user 42");
        server.stop().unwrap();
    }

    #[test]
    fn test_wait_for_flag_times_out() {
        let server = local();
        let state = ScenarioState::new();
        let err = server.wait_for_flag(&state, "WasCalled").unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().contains("WasCalled"));
    }
}
