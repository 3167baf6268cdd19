//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (redirect codes, bind address)
//! - Detect conflicting alias declarations
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EngineConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::EngineConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("app.{0} must not be empty")]
    EmptyField(&'static str),

    #[error("redirect '{from}' has code {code}, expected 300-399")]
    RedirectCode { from: String, code: u16 },

    #[error("redirect at index {0} has an empty pattern")]
    EmptyRedirect(usize),

    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("middleware alias '{0}' is declared more than once (aliases are case-insensitive)")]
    DuplicateAlias(String),

    #[error("middleware alias '{0}' has an empty target")]
    EmptyAliasTarget(String),

    #[error("middleware.autoload contains an empty name")]
    EmptyAutoload,
}

/// Check `config` for semantic errors.
pub fn validate_config(config: &EngineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.app.default_controller.trim().is_empty() {
        errors.push(ValidationError::EmptyField("default_controller"));
    }
    if config.app.default_action.trim().is_empty() {
        errors.push(ValidationError::EmptyField("default_action"));
    }

    for (i, redirect) in config.redirects.iter().enumerate() {
        if redirect.from.trim().is_empty() || redirect.to.trim().is_empty() {
            errors.push(ValidationError::EmptyRedirect(i));
        }
        if !(300..=399).contains(&redirect.code) {
            errors.push(ValidationError::RedirectCode {
                from: redirect.from.clone(),
                code: redirect.code,
            });
        }
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    let mut seen = HashSet::new();
    for (alias, target) in &config.middleware.aliases {
        if !seen.insert(alias.to_lowercase()) {
            errors.push(ValidationError::DuplicateAlias(alias.clone()));
        }
        if target.trim().is_empty() {
            errors.push(ValidationError::EmptyAliasTarget(alias.clone()));
        }
    }

    if config.middleware.autoload.iter().any(|n| n.trim().is_empty()) {
        errors.push(ValidationError::EmptyAutoload);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
