//! Request and response values seen by route handlers.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, StagehandError};
use crate::server::routes::{normalize_path, Method};

/// An inbound request, fully read, handed to a route handler
#[derive(Debug, Clone)]
pub struct TestRequest {
    pub method: Method,
    /// Raw request target including any query string
    pub url: String,
    /// Normalized path without the query string
    pub path: String,
    /// Percent-decoded query parameters
    pub query: HashMap<String, String>,
    /// Values captured from `{name}` and `*` route segments
    pub params: HashMap<String, String>,
    /// Header names are lowercased
    pub headers: HashMap<String, String>,
    /// Body as text; invalid UTF-8 is replaced
    pub body: String,
    /// Body exactly as received
    pub body_bytes: Vec<u8>,
}

impl TestRequest {
    pub fn new(method: Method, url: &str) -> Self {
        let (raw_path, raw_query) = match url.split_once('?') {
            Some((path, query)) => (path, query),
            None => (url, ""),
        };

        TestRequest {
            method,
            url: url.to_string(),
            path: normalize_path(raw_path),
            query: parse_query(raw_query),
            params: HashMap::new(),
            headers: HashMap::new(),
            body: String::new(),
            body_bytes: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_lowercase(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self.body_bytes = self.body.clone().into_bytes();
        self
    }

    pub fn with_body_bytes(mut self, bytes: Vec<u8>) -> Self {
        self.body = String::from_utf8_lossy(&bytes).into_owned();
        self.body_bytes = bytes;
        self
    }

    pub(crate) fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }

    /// Read a tiny_http request (including its body) into a `TestRequest`.
    ///
    /// Returns `None` for methods the route table has no notion of.
    pub(crate) fn from_tiny(request: &mut tiny_http::Request) -> Result<Option<Self>> {
        let method = match request.method().as_str().parse::<Method>() {
            Ok(method) => method,
            Err(_) => return Ok(None),
        };

        let mut raw = Vec::new();
        request.as_reader().read_to_end(&mut raw)?;

        let mut req = TestRequest::new(method, request.url()).with_body_bytes(raw);
        for header in request.headers() {
            req.headers.insert(
                header.field.to_string().to_lowercase(),
                header.value.to_string(),
            );
        }
        Ok(Some(req))
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Parse `a=1&b=two%20words` into a map; later duplicates win.
fn parse_query(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        params.insert(decode_component(key), decode_component(value));
    }
    params
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// What a handler sends back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl TestResponse {
    /// 200 with a plain-text body
    pub fn text(body: impl Into<String>) -> Self {
        Self::status(200, body)
    }

    /// 200 with a JSON body
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        let body = serde_json::to_string(value)?;
        Ok(TestResponse {
            status: 200,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body,
        })
    }

    /// Plain-text body with an explicit status code
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        TestResponse {
            status,
            headers: vec![(
                "content-type".to_string(),
                "text/plain; charset=utf-8".to_string(),
            )],
            body: body.into(),
        }
    }

    pub fn not_found() -> Self {
        Self::status(404, "Not Found")
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::status(500, message)
    }

    pub fn redirect(location: &str) -> Self {
        TestResponse {
            status: 302,
            headers: vec![("location".to_string(), location.to_string())],
            body: String::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_lowercase(), value.to_string()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub(crate) fn into_tiny(self) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
        // from_data sets no headers of its own
        let mut response =
            tiny_http::Response::from_data(self.body.into_bytes()).with_status_code(self.status);
        for (name, value) in self.headers {
            match tiny_http::Header::from_bytes(name.as_bytes(), value.as_bytes()) {
                Ok(header) => response = response.with_header(header),
                Err(_) => log::warn!("dropping invalid response header '{}'", name),
            }
        }
        response
    }
}

impl From<StagehandError> for TestResponse {
    fn from(e: StagehandError) -> Self {
        TestResponse::error(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // ===========================================
    // Request Tests
    // ===========================================

    #[test]
    fn test_request_splits_path_and_query() {
        let req = TestRequest::new(Method::Get, "/api/test?key1=value1&key2=value2");
        assert_eq!(req.path, "/api/test");
        assert_eq!(req.query_value("key1"), Some("value1"));
        assert_eq!(req.query_value("key2"), Some("value2"));
        assert_eq!(req.query_value("key3"), None);
    }

    #[test]
    fn test_request_decodes_query() {
        let req = TestRequest::new(Method::Get, "/search?q=two%20words&tag=a+b&flag");
        assert_eq!(req.query_value("q"), Some("two words"));
        assert_eq!(req.query_value("tag"), Some("a b"));
        assert_eq!(req.query_value("flag"), Some(""));
    }

    #[test]
    fn test_request_without_query() {
        let req = TestRequest::new(Method::Post, "/users/");
        assert_eq!(req.path, "/users");
        assert!(req.query.is_empty());
    }

    #[test]
    fn test_request_headers_case_insensitive() {
        let req = TestRequest::new(Method::Get, "/").with_header("X-Scenario", "one");
        assert_eq!(req.header("x-scenario"), Some("one"));
        assert_eq!(req.header("X-SCENARIO"), Some("one"));
    }

    #[test]
    fn test_request_json_body() {
        let req = TestRequest::new(Method::Post, "/items").with_body(r#"{"name":"widget"}"#);
        let value: serde_json::Value = req.json().unwrap();
        assert_eq!(value["name"], "widget");

        let bad = TestRequest::new(Method::Post, "/items").with_body("not json");
        assert!(bad.json::<serde_json::Value>().is_err());
    }

    #[test]
    fn test_request_keeps_raw_body_bytes() {
        let raw = vec![b'o', b'k', 0xff, 0xfe];
        let req = TestRequest::new(Method::Post, "/upload").with_body_bytes(raw.clone());
        assert_eq!(req.body_bytes, raw);
        assert_eq!(req.body, "ok\u{fffd}\u{fffd}");

        let text = TestRequest::new(Method::Post, "/upload").with_body("plain");
        assert_eq!(text.body_bytes, b"plain".to_vec());
    }

    // ===========================================
    // Response Tests
    // ===========================================

    #[test]
    fn test_text_response() {
        let response = TestResponse::text("OK");
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "OK");
        assert_eq!(response.header("Content-Type"), Some("text/plain; charset=utf-8"));
    }

    #[test]
    fn test_json_response() {
        let response = TestResponse::json(&serde_json::json!({ "called": true })).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.header("content-type"), Some("application/json"));
        let parsed: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(parsed["called"], true);
    }

    #[test]
    fn test_status_helpers() {
        assert_eq!(TestResponse::not_found().status, 404);
        assert_eq!(TestResponse::not_found().body, "Not Found");
        assert_eq!(TestResponse::error("boom").status, 500);

        let redirect = TestResponse::redirect("/elsewhere");
        assert_eq!(redirect.status, 302);
        assert_eq!(redirect.header("location"), Some("/elsewhere"));
    }

    #[test]
    fn test_with_header_replaces() {
        let response = TestResponse::text("x")
            .with_header("Content-Type", "text/html")
            .with_header("x-extra", "1");
        assert_eq!(response.header("content-type"), Some("text/html"));
        assert_eq!(response.headers.len(), 2);
    }
}
