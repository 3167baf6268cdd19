//! Request path preparation and convention parsing.
//!
//! # Responsibilities
//! - Strip query string and fragment
//! - Percent-decode when configured
//! - Trim leading and trailing slashes (interior empty segments are kept)
//! - Derive `(controller, action, params)` from the path by convention

use std::borrow::Cow;

use crate::config::schema::AppConfig;
use crate::routing::pattern::split_segments;
use crate::routing::types::Param;

/// A request path ready for matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedPath {
    /// No leading or trailing slash; the application root is empty.
    pub path: String,
    /// Whether percent-escapes were decoded. When `false` the path still
    /// carries the escapes exactly as received.
    pub decoded: bool,
}

/// Prepare a raw request target for matching.
pub fn prepare_request_path(raw: &str, url_decode: bool) -> PreparedPath {
    let path = raw.split(['?', '#']).next().unwrap_or_default();

    let (text, decoded): (Cow<'_, str>, bool) = if url_decode {
        let spaced = path.replace('+', " ");
        match urlencoding::decode(&spaced) {
            Ok(d) => (Cow::Owned(d.into_owned()), true),
            Err(e) => {
                tracing::debug!(path = %path, error = %e, "Path is not valid percent-encoded UTF-8, matching raw");
                (Cow::Borrowed(path), false)
            }
        }
    } else {
        (Cow::Borrowed(path), false)
    };

    PreparedPath {
        path: text.trim_matches('/').to_string(),
        decoded,
    }
}

/// Convention-derived handler target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConventionTarget {
    pub controller: String,
    pub action: String,
    pub params: Vec<Param>,
}

/// First segment plus the controller suffix names the controller, the second
/// names the action, the rest become positional parameters. Missing or empty
/// controller and action segments fall back to the configured defaults.
pub fn parse_convention(path: &str, app: &AppConfig) -> ConventionTarget {
    let lowered = path.to_lowercase();
    let segments = split_segments(&lowered);

    let controller = match segments.first().filter(|s| !s.is_empty()) {
        Some(first) => format!("{}{}", first, app.controller_suffix),
        None => app.default_controller.clone(),
    };
    let action = segments
        .get(1)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| app.default_action.clone());
    let params = segments
        .iter()
        .skip(2)
        .map(|s| Param::Segment(s.to_string()))
        .collect();

    ConventionTarget {
        controller,
        action,
        params,
    }
}
