//! Well-known names shared by the test harness and the app under test.

/// Name of the exported backdoor entry point inside the app.
pub const BACKDOOR_EXPORT: &str = "StagehandBackdoor";

/// Scenario-state key a route handler sets once it has been called.
pub const WAS_CALLED: &str = "WasCalled";

/// Scenario-state key holding the query value captured by the app endpoint.
pub const QUERY_STRING: &str = "QueryString";

/// Port the fixture server listens on.
pub const REST_PORT: u16 = 3434;

/// Endpoint the app calls on the configured server.
pub const TEST_ENDPOINT: &str = "/api/test";

/// Body of the default `GET /` route.
pub const LIVENESS_BODY: &str = "Server Up";

/// Interface the test server binds to when none is configured.
pub const DEFAULT_HOST: &str = "0.0.0.0";
