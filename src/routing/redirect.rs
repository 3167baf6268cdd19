//! Path rewriting for declared redirects.
//!
//! `api/v1/(:any)` → `api/v2/(:any)` turns `api/v1/posts/3` into
//! `api/v2/posts/3`. The wildcard may appear in neither, either or both
//! patterns.

use crate::routing::pattern::{split_segments, WILDCARD};
use crate::routing::types::{RouteError, RouteResult};

fn is_wildcard(segment: &str) -> bool {
    segment.eq_ignore_ascii_case(WILDCARD)
}

/// Rewrite `request_path` from `old_pattern` to `new_pattern`.
///
/// Returns `None` when the literal prefix of `old_pattern` does not match the
/// request; the caller must not redirect in that case. Without a wildcard in
/// `old_pattern` the whole path must match.
pub fn resolve(old_pattern: &str, new_pattern: &str, request_path: &str) -> Option<String> {
    let uri = split_segments(request_path);
    let old = split_segments(old_pattern);

    let prefix_len = old.iter().position(|s| is_wildcard(s));
    let prefix = &old[..prefix_len.unwrap_or(old.len())];

    if uri.len() < prefix.len() {
        return None;
    }
    if prefix_len.is_none() && uri.len() != prefix.len() {
        return None;
    }
    let agrees = prefix
        .iter()
        .zip(uri.iter())
        .all(|(p, u)| p.to_lowercase() == u.to_lowercase());
    if !agrees {
        return None;
    }

    let tail = uri[prefix.len()..].join("/");
    let rewritten: Vec<&str> = split_segments(new_pattern)
        .into_iter()
        .map(|s| if is_wildcard(s) { tail.as_str() } else { s })
        .filter(|s| !s.is_empty())
        .collect();

    Some(rewritten.join("/"))
}

/// A redirect declared at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectRule {
    pub from: String,
    pub to: String,
    pub code: u16,
}

impl RedirectRule {
    /// Create a rule; `code` must be a 3xx status.
    pub fn new(from: impl Into<String>, to: impl Into<String>, code: u16) -> RouteResult<Self> {
        if !(300..=399).contains(&code) {
            return Err(RouteError::InvalidRedirectCode(code));
        }
        Ok(Self {
            from: from.into(),
            to: to.into(),
            code,
        })
    }

    /// Target path for `request_path`, if this rule applies.
    pub fn resolve(&self, request_path: &str) -> Option<String> {
        resolve(&self.from, &self.to, request_path)
    }
}
