//! Handler invocation: resolving a controller/action pair to code.
//!
//! # Responsibilities
//! - Map controller names (case-insensitive) to registered controllers
//! - Check the controller may be dispatched to, the action exists and enough
//!   parameters were supplied
//! - Invoke the action with positional parameters
//!
//! # Design Decisions
//! - Controllers are registered as typed closures at startup, no reflection
//! - Every violation is a named `HandlerError`, never a panic

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::http::StatusCode;
use thiserror::Error;

use crate::dispatch::context::RequestContext;
use crate::dispatch::reply::Reply;
use crate::routing::types::Param;

/// Signature of an action.
pub type ActionFn = dyn Fn(&RequestContext, &[Param]) -> Reply + Send + Sync;

/// Why a controller/action pair could not be invoked.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandlerError {
    #[error("Class {controller} does not exist")]
    ControllerNotFound { controller: String },

    #[error("Class {controller} cannot be instantiated")]
    NotInstantiable { controller: String },

    #[error("Action ( {action} ) does not exist in {controller}")]
    ActionNotFound { controller: String, action: String },

    #[error("Not enough params for action {controller}::{action}: requires {expected}, supplied {supplied}")]
    MissingParams {
        controller: String,
        action: String,
        expected: usize,
        supplied: usize,
    },
}

impl HandlerError {
    /// Status used when the failure reaches the client.
    pub fn status(&self) -> StatusCode {
        match self {
            HandlerError::ControllerNotFound { .. } | HandlerError::ActionNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            HandlerError::NotInstantiable { .. } | HandlerError::MissingParams { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Longer explanation shown in development mode.
    pub fn description(&self) -> &'static str {
        match self {
            HandlerError::ControllerNotFound { .. } => {
                "A controller that is not registered was requested. Check the name and the route declared for it."
            }
            HandlerError::NotInstantiable { .. } => {
                "The controller is registered as abstract and cannot be dispatched to directly."
            }
            HandlerError::ActionNotFound { .. } => {
                "The action is not defined on the controller."
            }
            HandlerError::MissingParams { .. } => {
                "The action requires more params than were provided. Declare trailing params as optional if they may be absent."
            }
        }
    }
}

/// Collaborator that runs a named controller action.
pub trait HandlerInvoker: Send + Sync {
    fn invoke(
        &self,
        ctx: &RequestContext,
        controller: &str,
        action: &str,
        params: &[Param],
    ) -> Result<Reply, HandlerError>;
}

/// A single action on a controller.
#[derive(Clone)]
pub struct Action {
    required: usize,
    func: Arc<ActionFn>,
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}

/// A named group of actions.
#[derive(Debug, Clone)]
pub struct Controller {
    name: String,
    instantiable: bool,
    actions: HashMap<String, Action>,
}

impl Controller {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instantiable: true,
            actions: HashMap::new(),
        }
    }

    /// A controller that exists but cannot be dispatched to, such as a shared
    /// parent.
    pub fn abstract_controller(name: impl Into<String>) -> Self {
        Self {
            instantiable: false,
            ..Self::new(name)
        }
    }

    /// Add an action taking at least `required` parameters.
    pub fn action<F>(mut self, name: &str, required: usize, f: F) -> Self
    where
        F: Fn(&RequestContext, &[Param]) -> Reply + Send + Sync + 'static,
    {
        self.actions.insert(
            name.to_lowercase(),
            Action {
                required,
                func: Arc::new(f),
            },
        );
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Controllers available to convention dispatch and `map` routes.
#[derive(Debug, Clone, Default)]
pub struct ControllerRegistry {
    controllers: HashMap<String, Controller>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a controller, replacing any with the same name.
    pub fn register(&mut self, controller: Controller) -> &mut Self {
        self.controllers
            .insert(controller.name.to_lowercase(), controller);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.controllers.contains_key(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}

impl HandlerInvoker for ControllerRegistry {
    fn invoke(
        &self,
        ctx: &RequestContext,
        controller: &str,
        action: &str,
        params: &[Param],
    ) -> Result<Reply, HandlerError> {
        let target = self
            .controllers
            .get(&controller.to_lowercase())
            .ok_or_else(|| HandlerError::ControllerNotFound {
                controller: controller.to_string(),
            })?;

        if !target.instantiable {
            return Err(HandlerError::NotInstantiable {
                controller: target.name.clone(),
            });
        }

        let entry = target
            .actions
            .get(&action.to_lowercase())
            .ok_or_else(|| HandlerError::ActionNotFound {
                controller: target.name.clone(),
                action: action.to_string(),
            })?;

        if params.len() < entry.required {
            return Err(HandlerError::MissingParams {
                controller: target.name.clone(),
                action: action.to_string(),
                expected: entry.required,
                supplied: params.len(),
            });
        }

        tracing::debug!(
            request_id = %ctx.request_id,
            controller = %target.name,
            action = %action,
            params = params.len(),
            "Invoking action"
        );
        Ok((entry.func)(ctx, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::AppConfig;
    use crate::dispatch::context::RequestDescriptor;

    fn ctx() -> RequestContext {
        RequestContext::new(&RequestDescriptor::new("GET", "/"), &AppConfig::default())
    }

    fn registry() -> ControllerRegistry {
        let mut registry = ControllerRegistry::new();
        registry
            .register(
                Controller::new("BlogController")
                    .action("default", 0, |_, _| Reply::text("index"))
                    .action("show", 1, |_, p| {
                        Reply::text(format!("post {}", p[0].as_segment().unwrap_or("")))
                    }),
            )
            .register(Controller::abstract_controller("__ParentController"));
        registry
    }

    #[test]
    fn test_invoke_case_insensitive() {
        let reply = registry()
            .invoke(&ctx(), "blogcontroller", "SHOW", &[Param::from("7")])
            .unwrap();
        assert_eq!(reply.body_text(), "post 7");
    }

    #[test]
    fn test_controller_not_found() {
        let err = registry().invoke(&ctx(), "NopeController", "default", &[]).unwrap_err();
        assert_eq!(
            err,
            HandlerError::ControllerNotFound {
                controller: "NopeController".into()
            }
        );
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_not_instantiable() {
        let err = registry()
            .invoke(&ctx(), "__ParentController", "default", &[])
            .unwrap_err();
        assert!(matches!(err, HandlerError::NotInstantiable { .. }));
    }

    #[test]
    fn test_action_not_found() {
        let err = registry().invoke(&ctx(), "BlogController", "edit", &[]).unwrap_err();
        assert!(matches!(err, HandlerError::ActionNotFound { .. }));
    }

    #[test]
    fn test_missing_params_reports_counts() {
        let err = registry().invoke(&ctx(), "BlogController", "show", &[]).unwrap_err();
        assert_eq!(
            err,
            HandlerError::MissingParams {
                controller: "BlogController".into(),
                action: "show".into(),
                expected: 1,
                supplied: 0,
            }
        );
        assert!(err.to_string().contains("requires 1, supplied 0"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_extra_params_are_allowed() {
        let reply = registry()
            .invoke(&ctx(), "BlogController", "default", &[Param::from("x")])
            .unwrap();
        assert_eq!(reply.body_text(), "index");
    }
}
