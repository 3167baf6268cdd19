//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the engine.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Dispatch behaviour (defaults, convention routing, dev mode).
    pub app: AppConfig,

    /// Autoloaded middlewares and alias table.
    pub middleware: MiddlewareConfig,

    /// Redirects registered at startup.
    pub redirects: Vec<RedirectConfig>,

    /// Framework rate limiter.
    pub rate_limit: RateLimitConfig,

    /// Framework input checks.
    pub security: SecurityConfig,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Dispatch behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Prefix for redirect targets (e.g. "https://example.com"). Empty means
    /// site-relative.
    pub base_url: String,

    /// Controller used when the request path is empty.
    pub default_controller: String,

    /// Action used when the path names no action.
    pub default_action: String,

    /// Appended to the first path segment to form a controller name.
    pub controller_suffix: String,

    /// Fall back to convention dispatch when no declared route matches.
    pub enable_default_routing: bool,

    /// Development mode: verbose diagnostics instead of generic replies.
    pub devmode: bool,

    /// Percent-decode the request path before matching.
    pub url_decode: bool,

    /// Later declarations of the same pattern and method shadow earlier ones.
    pub allow_override: bool,

    /// Controller whose default action renders not-found pages.
    pub not_found_controller: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            default_controller: "HomeController".to_string(),
            default_action: "default".to_string(),
            controller_suffix: "Controller".to_string(),
            enable_default_routing: true,
            devmode: false,
            url_decode: true,
            allow_override: false,
            not_found_controller: None,
        }
    }
}

/// Middleware configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MiddlewareConfig {
    /// Guards run on every request after the framework guards, in order.
    pub autoload: Vec<String>,

    /// Short names for guards, e.g. `isLogin = "IsLoginMiddleware"`.
    pub aliases: BTreeMap<String, String>,
}

/// A redirect declared in configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedirectConfig {
    /// Old pattern, may contain the `(:any)` wildcard.
    pub from: String,

    /// New pattern, may contain the `(:any)` wildcard.
    pub to: String,

    /// HTTP status code (default: 302).
    #[serde(default = "default_redirect_code")]
    pub code: u16,
}

fn default_redirect_code() -> u16 {
    302
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Maximum requests per second per client.
    pub requests_per_second: u32,

    /// Burst capacity.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_second: 100,
            burst_size: 50,
        }
    }
}

/// Input hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Reject request paths carrying control characters or markup.
    pub strict_input: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self { strict_input: true }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}
