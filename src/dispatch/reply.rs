//! Transport-neutral replies produced by dispatch.
//!
//! The host server turns a `Reply` into an HTTP response; routing itself
//! never touches the transport.

use axum::http::header::{HeaderName, CONTENT_TYPE, LOCATION};
use axum::http::{HeaderMap, HeaderValue, StatusCode};

/// Header carrying the reason for a 401.
pub const X_ERROR_MESSAGE: &str = "x-error-message";

const UNAUTHORIZED_MESSAGE: &str = "You are unauthorized to access this page!";

/// Reply body.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyBody {
    Empty,
    Text(String),
    Html(String),
    Json(serde_json::Value),
}

/// Status, headers and body of a dispatched request.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ReplyBody,
}

impl Reply {
    /// Create a reply; `Content-Type` follows the body kind.
    pub fn new(status: StatusCode, body: ReplyBody) -> Self {
        let mut headers = HeaderMap::new();
        let content_type = match &body {
            ReplyBody::Json(_) => Some("application/json"),
            ReplyBody::Text(_) => Some("text/plain; charset=utf-8"),
            ReplyBody::Html(_) => Some("text/html; charset=utf-8"),
            ReplyBody::Empty => None,
        };
        if let Some(ct) = content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(ct));
        }
        Self {
            status,
            headers,
            body,
        }
    }

    /// 200 with a plain-text body.
    pub fn text(body: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, ReplyBody::Text(body.into()))
    }

    /// 200 with an HTML body.
    pub fn html(body: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, ReplyBody::Html(body.into()))
    }

    /// 200 with a JSON body.
    pub fn json(value: serde_json::Value) -> Self {
        Self::new(StatusCode::OK, ReplyBody::Json(value))
    }

    /// Empty reply with the given status.
    pub fn empty(status: StatusCode) -> Self {
        Self::new(status, ReplyBody::Empty)
    }

    /// Replace the status.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Add a header. Values that are not valid header text are dropped.
    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        match HeaderValue::from_str(value) {
            Ok(v) => {
                self.headers.insert(name, v);
            }
            Err(_) => tracing::warn!(header = %name, "Dropping header with invalid value"),
        }
        self
    }

    /// The 401 signal emitted when a guard fails without a fallback.
    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            ReplyBody::Text("401 Unauthorized".to_string()),
        )
        .with_header(HeaderName::from_static(X_ERROR_MESSAGE), UNAUTHORIZED_MESSAGE)
    }

    /// Generic not-found page.
    pub fn not_found_page() -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            ReplyBody::Html(
                "<!DOCTYPE html><html><head><title>404</title></head><body>\
                 <h1>Oops 404</h1><p>The page you are looking for does not exist.</p>\
                 <a href=\"/\">home</a></body></html>"
                    .to_string(),
            ),
        )
    }

    /// Generic failure that leaks nothing about the application.
    pub fn internal_error() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ReplyBody::Text("500 Internal Server Error".to_string()),
        )
    }

    /// Development-mode diagnostic.
    pub fn diagnostic(status: StatusCode, title: &str, content: &str, description: &str) -> Self {
        let mut text = format!("{}\n\n{}", title, content);
        if !description.is_empty() {
            text.push_str("\n\n");
            text.push_str(description);
        }
        Self::new(status, ReplyBody::Text(text))
    }

    /// Redirect to `location` with a 3xx `code`.
    pub fn redirect(location: &str, code: u16) -> Self {
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::FOUND);
        Self::empty(status).with_header(LOCATION, location)
    }

    /// Body rendered as text, for logging and tests.
    pub fn body_text(&self) -> String {
        match &self.body {
            ReplyBody::Empty => String::new(),
            ReplyBody::Text(s) | ReplyBody::Html(s) => s.clone(),
            ReplyBody::Json(v) => v.to_string(),
        }
    }

    /// Body bytes as sent on the wire.
    pub fn into_bytes(self) -> Vec<u8> {
        match self.body {
            ReplyBody::Empty => Vec::new(),
            ReplyBody::Text(s) | ReplyBody::Html(s) => s.into_bytes(),
            ReplyBody::Json(v) => serde_json::to_vec(&v).unwrap_or_default(),
        }
    }

    /// Header value as a string, if present and textual.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
