//! Per-request state.

use std::net::IpAddr;

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use uuid::Uuid;

use crate::config::schema::AppConfig;
use crate::routing::types::Param;
use crate::routing::uri::{parse_convention, prepare_request_path, ConventionTarget};

/// What the host hands to the dispatcher.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// HTTP method as received.
    pub method: String,
    /// Request target; may still carry a query string or fragment.
    pub target: String,
    pub headers: HeaderMap,
    /// Peer address, when the host knows it.
    pub client: Option<IpAddr>,
}

impl RequestDescriptor {
    pub fn new(method: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            target: target.into(),
            headers: HeaderMap::new(),
            client: None,
        }
    }

    /// Add a header; invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(n), Ok(v)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(n, v);
        }
        self
    }

    pub fn with_client(mut self, client: IpAddr) -> Self {
        self.client = Some(client);
        self
    }
}

/// State for one request, created when dispatch starts and dropped when it
/// ends. Nothing here outlives the request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub method: String,
    /// Normalized path: no query, no leading or trailing slash.
    pub path: String,
    /// Whether `path` was percent-decoded.
    pub path_decoded: bool,
    /// Target as received, before normalization.
    pub raw_target: String,
    pub headers: HeaderMap,
    pub client: Option<IpAddr>,
    /// Convention-derived controller, action and parameters.
    pub convention: ConventionTarget,
    /// Parameters handed to the handler that finally runs.
    pub params: Vec<Param>,
}

impl RequestContext {
    /// Build the context for `request` under `app` settings.
    pub fn new(request: &RequestDescriptor, app: &AppConfig) -> Self {
        let prepared = prepare_request_path(&request.target, app.url_decode);
        let path = prepared.path;
        let convention = parse_convention(&path, app);
        Self {
            request_id: Uuid::new_v4(),
            method: request.method.trim().to_ascii_uppercase(),
            params: convention.params.clone(),
            path,
            path_decoded: prepared.decoded,
            raw_target: request.target.clone(),
            headers: request.headers.clone(),
            client: request.client,
            convention,
        }
    }

    /// Header value as a string, if present and textual.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Key identifying the caller for per-client limits.
    pub fn client_key(&self) -> String {
        match self.client {
            Some(ip) => ip.to_string(),
            None => "unknown".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_from_descriptor() {
        let request = RequestDescriptor::new("get", "/Blog/Show/42?draft=1")
            .with_header("X-Token", "abc")
            .with_client("10.0.0.1".parse().unwrap());
        let ctx = RequestContext::new(&request, &AppConfig::default());

        assert_eq!(ctx.method, "GET");
        assert_eq!(ctx.path, "Blog/Show/42");
        assert_eq!(ctx.convention.controller, "blogController");
        assert_eq!(ctx.convention.action, "show");
        assert_eq!(ctx.params, vec![Param::from("42")]);
        assert_eq!(ctx.header("x-token"), Some("abc"));
        assert_eq!(ctx.client_key(), "10.0.0.1");
    }

    #[test]
    fn test_contexts_are_independent() {
        let request = RequestDescriptor::new("GET", "/");
        let a = RequestContext::new(&request, &AppConfig::default());
        let b = RequestContext::new(&request, &AppConfig::default());
        assert_ne!(a.request_id, b.request_id);
    }
}
