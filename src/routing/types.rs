//! Routing types and error definitions.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Method a route entry is declared for.
///
/// Concrete verbs must equal the request method. `Any` accepts every verb.
/// `Map`, `View` and `Auth` are pseudo-types that never compare against the
/// request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Any,
    Map,
    View,
    Auth,
}

impl RouteMethod {
    /// Uppercase name as used in declarations and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteMethod::Get => "GET",
            RouteMethod::Post => "POST",
            RouteMethod::Put => "PUT",
            RouteMethod::Patch => "PATCH",
            RouteMethod::Delete => "DELETE",
            RouteMethod::Head => "HEAD",
            RouteMethod::Options => "OPTIONS",
            RouteMethod::Any => "ANY",
            RouteMethod::Map => "MAP",
            RouteMethod::View => "VIEW",
            RouteMethod::Auth => "AUTH",
        }
    }

    /// True for the non-network pseudo-types that short-circuit dispatch.
    pub fn is_direct(&self) -> bool {
        matches!(self, RouteMethod::Map | RouteMethod::View)
    }

    /// Whether an incoming request method qualifies for this entry.
    pub fn accepts(&self, request_method: &str) -> bool {
        match self {
            RouteMethod::Any | RouteMethod::Map | RouteMethod::View | RouteMethod::Auth => true,
            verb => verb.as_str().eq_ignore_ascii_case(request_method.trim()),
        }
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RouteMethod {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(RouteMethod::Get),
            "POST" => Ok(RouteMethod::Post),
            "PUT" => Ok(RouteMethod::Put),
            "PATCH" => Ok(RouteMethod::Patch),
            "DELETE" => Ok(RouteMethod::Delete),
            "HEAD" => Ok(RouteMethod::Head),
            "OPTIONS" => Ok(RouteMethod::Options),
            "ANY" => Ok(RouteMethod::Any),
            "MAP" => Ok(RouteMethod::Map),
            "VIEW" => Ok(RouteMethod::View),
            "AUTH" => Ok(RouteMethod::Auth),
            _ => Err(RouteError::UnknownMethod(s.to_string())),
        }
    }
}

/// A positional argument handed to a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    /// One captured or convention-derived path segment.
    Segment(String),
    /// The wildcard tail, passed as a single ordered sequence.
    Tail(Vec<String>),
}

impl Param {
    /// The segment value, if this is a single segment.
    pub fn as_segment(&self) -> Option<&str> {
        match self {
            Param::Segment(s) => Some(s),
            Param::Tail(_) => None,
        }
    }

    /// The tail segments, if this is a wildcard capture.
    pub fn as_tail(&self) -> Option<&[String]> {
        match self {
            Param::Tail(t) => Some(t),
            Param::Segment(_) => None,
        }
    }
}

impl From<&str> for Param {
    fn from(s: &str) -> Self {
        Param::Segment(s.to_string())
    }
}

impl From<String> for Param {
    fn from(s: String) -> Self {
        Param::Segment(s)
    }
}

/// Outcome of a successful pattern match. Produced per request and dropped
/// once dispatch finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// The pattern as declared.
    pub matched_pattern: String,
    /// Named captures in the order their placeholders appear in the pattern.
    pub params: Vec<(String, String)>,
    /// Path segments captured by the wildcard, if the pattern has one.
    pub tail: Option<Vec<String>>,
    /// The request path split into segments.
    pub uri_segments: Vec<String>,
}

impl MatchResult {
    /// Look up a named capture.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Handler arguments: named captures in order, then the wildcard tail as
    /// one argument.
    pub fn args(&self) -> Vec<Param> {
        let mut args: Vec<Param> = self
            .params
            .iter()
            .map(|(_, v)| Param::Segment(v.clone()))
            .collect();
        if let Some(tail) = &self.tail {
            args.push(Param::Tail(tail.clone()));
        }
        args
    }
}

/// Errors raised while declaring routes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    /// Same pattern and method already declared while override mode is off.
    #[error("route {method} /{pattern} is already declared")]
    DuplicateRoute { pattern: String, method: RouteMethod },

    /// Pattern is structurally invalid.
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Method name not recognised.
    #[error("unknown route method: {0}")]
    UnknownMethod(String),

    /// Redirect code outside the 3xx range.
    #[error("redirect code {0} is not a 3xx status")]
    InvalidRedirectCode(u16),
}

/// Result type for route declarations.
pub type RouteResult<T> = Result<T, RouteError>;
