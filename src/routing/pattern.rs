//! Route pattern compilation and matching.
//!
//! # Syntax
//! - `{name}` or `{:name}`: required named segment
//! - `{name?}`: optional named segment, only allowed at the end of a pattern
//! - `(:any)`: wildcard tail, captures every remaining segment as one sequence
//! - anything else: literal, compared case-insensitively
//!
//! # Design Decisions
//! - Patterns compiled once at declaration, matched without regex
//! - Captured values keep the request's original case
//! - The final decision substitutes captures back into the pattern and
//!   compares the two segment sequences, so matching has no side effects

use crate::routing::types::{MatchResult, RouteError, RouteResult};

/// Reserved wildcard tail token.
pub const WILDCARD: &str = "(:any)";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Stored lowercased.
    Literal(String),
    Named { name: String, optional: bool },
    Wildcard,
}

/// A compiled route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

/// Split a pattern or path on `/` after trimming leading and trailing
/// slashes. Empty interior segments are kept, so `a//b` has three segments.
pub fn split_segments(path: &str) -> Vec<&str> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed.split('/').collect()
}

fn parse_placeholder(segment: &str) -> Option<(String, bool)> {
    let inner = segment.strip_prefix('{')?.strip_suffix('}')?;
    let inner = inner.strip_prefix(':').unwrap_or(inner);
    let (name, optional) = match inner.strip_suffix('?') {
        Some(name) => (name, true),
        None => (inner, false),
    };
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    Some((name.to_string(), optional))
}

fn segments_equal(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

impl Pattern {
    /// Compile a pattern.
    ///
    /// Segments after the wildcard are never evaluated and are dropped.
    pub fn parse(raw: &str) -> RouteResult<Self> {
        let mut segments = Vec::new();
        let mut seen_optional = false;

        for part in split_segments(raw) {
            if part.eq_ignore_ascii_case(WILDCARD) {
                if seen_optional {
                    return Err(RouteError::InvalidPattern {
                        pattern: raw.to_string(),
                        reason: "wildcard cannot follow an optional segment".to_string(),
                    });
                }
                segments.push(Segment::Wildcard);
                break;
            }

            let segment = match parse_placeholder(part) {
                Some((name, optional)) => Segment::Named { name, optional },
                None => Segment::Literal(part.to_lowercase()),
            };

            let optional = matches!(segment, Segment::Named { optional: true, .. });
            if seen_optional && !optional {
                return Err(RouteError::InvalidPattern {
                    pattern: raw.to_string(),
                    reason: format!("segment '{}' follows an optional segment", part),
                });
            }
            seen_optional |= optional;
            segments.push(segment);
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The pattern as declared.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Canonical form used for duplicate detection: slashes trimmed,
    /// lowercased.
    pub fn normalized(&self) -> String {
        normalize(&self.raw)
    }

    /// Position of the wildcard token, if any.
    pub fn wildcard_position(&self) -> Option<usize> {
        self.segments.iter().position(|s| *s == Segment::Wildcard)
    }

    /// True when the pattern has no placeholders and no wildcard.
    pub fn is_literal(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, Segment::Literal(_)))
    }

    /// Names of the placeholders, in pattern order.
    pub fn param_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Named { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Match a request path. Returns `None` on any disagreement.
    pub fn matches(&self, path: &str) -> Option<MatchResult> {
        let uri: Vec<&str> = split_segments(path);

        let (evaluated_len, tail) = match self.wildcard_position() {
            Some(k) => {
                if uri.len() < k {
                    return None;
                }
                (k, Some(&uri[k..]))
            }
            None => {
                let required = self
                    .segments
                    .iter()
                    .filter(|s| !matches!(s, Segment::Named { optional: true, .. }))
                    .count();
                if uri.len() < required || uri.len() > self.segments.len() {
                    return None;
                }
                (uri.len(), None)
            }
        };

        let mut evaluated: Vec<&str> = Vec::with_capacity(uri.len());
        let mut params = Vec::new();

        for (segment, actual) in self.segments.iter().zip(uri.iter()).take(evaluated_len) {
            match segment {
                Segment::Literal(literal) => evaluated.push(literal.as_str()),
                Segment::Named { name, .. } => {
                    if actual.is_empty() {
                        return None;
                    }
                    params.push((name.clone(), actual.to_string()));
                    evaluated.push(actual);
                }
                Segment::Wildcard => break,
            }
        }

        if let Some(tail) = tail {
            evaluated.extend_from_slice(tail);
        }

        if evaluated.len() != uri.len()
            || !evaluated
                .iter()
                .zip(uri.iter())
                .all(|(a, b)| segments_equal(a, b))
        {
            return None;
        }

        Some(MatchResult {
            matched_pattern: self.raw.clone(),
            params,
            tail: tail.map(|t| t.iter().map(|s| s.to_string()).collect()),
            uri_segments: uri.iter().map(|s| s.to_string()).collect(),
        })
    }
}

/// Canonical form of a pattern or path string.
pub fn normalize(raw: &str) -> String {
    split_segments(raw).join("/").to_lowercase()
}

/// Compile `pattern` and match it against `path` in one step.
///
/// A pattern that fails to compile never matches.
pub fn match_path(pattern: &str, path: &str) -> Option<MatchResult> {
    match Pattern::parse(pattern) {
        Ok(compiled) => compiled.matches(path),
        Err(e) => {
            tracing::debug!(pattern = %pattern, error = %e, "Pattern rejected");
            None
        }
    }
}
