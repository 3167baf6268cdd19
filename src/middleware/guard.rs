//! Guards and the registry that names them.
//!
//! # Responsibilities
//! - Define the `Guard` capability (one boolean check per request)
//! - Map guard names to implementations, case-insensitively
//! - Resolve short aliases to guard names
//! - Keep framework guards in discovery order

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::config::schema::MiddlewareConfig;
use crate::dispatch::context::RequestContext;

/// An authorization or validation check attached to a route.
pub trait Guard: Send + Sync {
    /// `true` lets the request through.
    fn evaluate(&self, ctx: &RequestContext) -> bool;
}

impl<F> Guard for F
where
    F: Fn(&RequestContext) -> bool + Send + Sync,
{
    fn evaluate(&self, ctx: &RequestContext) -> bool {
        self(ctx)
    }
}

/// Guard configuration problems.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GuardError {
    /// No guard is registered under the (alias-resolved) name.
    #[error("middleware {name} cannot be found or does not implement evaluate()")]
    UnknownGuard { name: String },
}

#[derive(Clone)]
struct Registered {
    name: String,
    guard: Arc<dyn Guard>,
}

/// Named guards, aliases and the framework guard list. Built once at startup.
#[derive(Clone, Default)]
pub struct GuardRegistry {
    guards: HashMap<String, Registered>,
    aliases: Vec<(String, String)>,
    framework: Vec<String>,
}

impl fmt::Debug for GuardRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.guards.values().map(|r| r.name.as_str()).collect();
        names.sort_unstable();
        f.debug_struct("GuardRegistry")
            .field("guards", &names)
            .field("aliases", &self.aliases)
            .field("framework", &self.framework)
            .finish()
    }
}

impl GuardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the aliases declared in configuration.
    pub fn from_config(config: &MiddlewareConfig) -> Self {
        let mut registry = Self::new();
        for (alias, target) in &config.aliases {
            registry.alias(alias, target);
        }
        registry
    }

    /// Register an application guard.
    pub fn register<G>(&mut self, name: &str, guard: G) -> &mut Self
    where
        G: Guard + 'static,
    {
        self.guards.insert(
            name.to_lowercase(),
            Registered {
                name: name.to_string(),
                guard: Arc::new(guard),
            },
        );
        self
    }

    /// Register a framework guard. Framework guards run on every request in
    /// the order they were registered.
    pub fn register_framework<G>(&mut self, name: &str, guard: G) -> &mut Self
    where
        G: Guard + 'static,
    {
        self.register(name, guard);
        if !self.framework.iter().any(|n| n.eq_ignore_ascii_case(name)) {
            self.framework.push(name.to_string());
        }
        self
    }

    /// Declare `alias` as a short name for `target`. A later declaration of
    /// the same alias replaces the earlier one.
    pub fn alias(&mut self, alias: &str, target: &str) -> &mut Self {
        self.aliases.retain(|(a, _)| !a.eq_ignore_ascii_case(alias));
        self.aliases.push((alias.to_string(), target.to_string()));
        self
    }

    /// Resolve an alias to the guard name it stands for. Names that are not
    /// aliases come back unchanged.
    pub fn resolve_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases
            .iter()
            .find(|(a, _)| a.eq_ignore_ascii_case(name))
            .map(|(_, t)| t.as_str())
            .unwrap_or(name)
    }

    /// Look up a guard by name or alias. Returns its registered identity.
    pub fn resolve(&self, name: &str) -> Result<(&str, Arc<dyn Guard>), GuardError> {
        let resolved = self.resolve_name(name);
        self.guards
            .get(&resolved.to_lowercase())
            .map(|r| (r.name.as_str(), Arc::clone(&r.guard)))
            .ok_or_else(|| GuardError::UnknownGuard {
                name: resolved.to_string(),
            })
    }

    /// Framework guard names in discovery order.
    pub fn framework_guards(&self) -> &[String] {
        &self.framework
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }
}
