//! Route table for the test server
//!
//! Maps (method, path pattern) to a handler and can be changed while the
//! server is running. Patterns are matched segment by segment:
//!
//! - `/api/sanity` matches exactly that path
//! - `/users/{id}` captures one segment as `id`
//! - `/files/*` matches `/files` and anything below it, captured as `*`
//!
//! A freshly created table already answers `GET /` with a liveness body so a
//! server can be health-checked before any scenario registers routes.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::fixtures::LIVENESS_BODY;
use crate::server::request::{TestRequest, TestResponse};

/// Route handler invoked on the server's request thread
pub type Handler = Arc<dyn Fn(&TestRequest) -> TestResponse + Send + Sync + 'static>;

/// HTTP methods a route can be registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            other => Err(format!("unsupported HTTP method '{}'", other)),
        }
    }
}

/// Represents a route segment - static text, a parameter, or a trailing wildcard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteSegment {
    Static(String),
    Param(String),
    Wildcard,
}

/// A compiled route with its pattern parsed into segments
#[derive(Debug, Clone)]
pub struct Route {
    pub method: Method,
    pub pattern: String,
    pub segments: Vec<RouteSegment>,
}

impl Route {
    pub fn new(method: Method, pattern: &str) -> Self {
        let pattern = normalize_path(pattern);
        Route {
            method,
            segments: parse_route_pattern(&pattern),
            pattern,
        }
    }
}

/// A successful lookup
#[derive(Clone)]
pub struct Resolved {
    pub handler: Handler,
    pub params: HashMap<String, String>,
}

/// Ordered, runtime-mutable set of routes plus a catch-all
pub struct RouteTable {
    // Oldest first; lookups walk from the back so the newest registration wins.
    routes: Vec<(Route, Handler)>,
    fallback: Handler,
}

impl RouteTable {
    /// A table holding only the liveness route.
    pub fn new() -> Self {
        let mut table = RouteTable {
            routes: Vec::new(),
            fallback: not_found_handler(),
        };
        table.register(Method::Get, "/", liveness_handler());
        table
    }

    /// Add a route, replacing any existing handler for the same method and pattern.
    pub fn register(&mut self, method: Method, pattern: &str, handler: Handler) {
        let route = Route::new(method, pattern);
        self.routes
            .retain(|(r, _)| !(r.method == route.method && r.pattern == route.pattern));
        self.routes.push((route, handler));
    }

    /// Remove a route. Returns whether it existed.
    pub fn unregister(&mut self, method: Method, pattern: &str) -> bool {
        let pattern = normalize_path(pattern);
        let before = self.routes.len();
        self.routes
            .retain(|(r, _)| !(r.method == method && r.pattern == pattern));
        self.routes.len() != before
    }

    /// Replace the handler used when nothing matches.
    pub fn set_fallback(&mut self, handler: Handler) {
        self.fallback = handler;
    }

    pub fn fallback(&self) -> Handler {
        self.fallback.clone()
    }

    /// Find the handler for a request, newest registration first.
    pub fn resolve(&self, method: Method, path: &str) -> Option<Resolved> {
        let path = normalize_path(path);
        self.routes.iter().rev().find_map(|(route, handler)| {
            if route.method != method {
                return None;
            }
            match_route(&path, route).map(|params| Resolved {
                handler: handler.clone(),
                params,
            })
        })
    }

    /// Drop every route except the liveness route and restore the default fallback.
    pub fn clear(&mut self) {
        *self = RouteTable::new();
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// (method, pattern) pairs in registration order
    pub fn patterns(&self) -> Vec<(Method, String)> {
        self.routes
            .iter()
            .map(|(r, _)| (r.method, r.pattern.clone()))
            .collect()
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable")
            .field("routes", &self.patterns())
            .finish()
    }
}

/// Wrap a closure as a `Handler`.
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&TestRequest) -> TestResponse + Send + Sync + 'static,
{
    Arc::new(f)
}

fn liveness_handler() -> Handler {
    handler(|_| TestResponse::text(LIVENESS_BODY))
}

fn not_found_handler() -> Handler {
    handler(|_| TestResponse::not_found())
}

/// Leading slash, no trailing slash, no query string. The root stays `/`.
pub fn normalize_path(path: &str) -> String {
    let path = path.split('?').next().unwrap_or(path);
    let trimmed = path.trim_matches('/');
    format!("/{}", trimmed)
}

/// Parse a route pattern into segments
/// e.g., "/users/{id}/posts/*" -> [Static("users"), Param("id"), Static("posts"), Wildcard]
fn parse_route_pattern(pattern: &str) -> Vec<RouteSegment> {
    let parts: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let last = parts.len().saturating_sub(1);
    parts
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            if *segment == "*" && i == last {
                RouteSegment::Wildcard
            } else if segment.len() > 2 && segment.starts_with('{') && segment.ends_with('}') {
                RouteSegment::Param(segment[1..segment.len() - 1].to_string())
            } else {
                RouteSegment::Static(segment.to_string())
            }
        })
        .collect()
}

/// Match a URL path against a route, returning extracted parameters if matched
fn match_route(path: &str, route: &Route) -> Option<HashMap<String, String>> {
    let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let wildcard = matches!(route.segments.last(), Some(RouteSegment::Wildcard));
    let fixed = if wildcard {
        route.segments.len() - 1
    } else {
        route.segments.len()
    };

    if path_segments.len() < fixed || (!wildcard && path_segments.len() != fixed) {
        return None;
    }

    let mut params = HashMap::new();

    for (path_seg, route_seg) in path_segments.iter().zip(route.segments.iter().take(fixed)) {
        match route_seg {
            RouteSegment::Static(expected) => {
                if path_seg != expected {
                    return None;
                }
            }
            RouteSegment::Param(name) => {
                let value = urlencoding::decode(path_seg)
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|_| path_seg.to_string());
                params.insert(name.clone(), value);
            }
            RouteSegment::Wildcard => {}
        }
    }

    if wildcard {
        params.insert("*".to_string(), path_segments[fixed..].join("/"));
    }

    Some(params)
}
