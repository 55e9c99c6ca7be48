//! Test HTTP server: route table, request/response values, and the server itself.

pub mod request;
pub mod routes;
pub mod test_server;

pub use request::{TestRequest, TestResponse};
pub use routes::{handler, Handler, Method, RouteTable};
pub use test_server::{Lifecycle, TestServer};
