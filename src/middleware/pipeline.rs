//! Ordered guard execution with fail-fast abort.

use std::fmt;
use std::sync::Arc;

use axum::http::StatusCode;

use crate::dispatch::context::RequestContext;
use crate::dispatch::reply::Reply;
use crate::middleware::guard::{GuardError, GuardRegistry};

/// Callback run when a guard rejects the request.
#[derive(Clone)]
pub enum Fallback {
    /// Receives the identity of the guard that failed.
    WithIdentity(Arc<dyn Fn(&RequestContext, &str) -> Reply + Send + Sync>),
    /// Takes no guard identity.
    Plain(Arc<dyn Fn(&RequestContext) -> Reply + Send + Sync>),
}

impl Fallback {
    pub fn with_identity<F>(f: F) -> Self
    where
        F: Fn(&RequestContext, &str) -> Reply + Send + Sync + 'static,
    {
        Fallback::WithIdentity(Arc::new(f))
    }

    pub fn plain<F>(f: F) -> Self
    where
        F: Fn(&RequestContext) -> Reply + Send + Sync + 'static,
    {
        Fallback::Plain(Arc::new(f))
    }

    pub fn invoke(&self, ctx: &RequestContext, guard: &str) -> Reply {
        match self {
            Fallback::WithIdentity(f) => f(ctx, guard),
            Fallback::Plain(f) => f(ctx),
        }
    }
}

impl fmt::Debug for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fallback::WithIdentity(_) => f.write_str("Fallback::WithIdentity"),
            Fallback::Plain(_) => f.write_str("Fallback::Plain"),
        }
    }
}

/// A guard attached to a route, with the fallback declared alongside it.
#[derive(Debug, Clone)]
pub struct MiddlewareBinding {
    pub guard: String,
    pub fallback: Option<Fallback>,
}

impl MiddlewareBinding {
    pub fn new(guard: impl Into<String>) -> Self {
        Self {
            guard: guard.into(),
            fallback: None,
        }
    }

    pub fn with_fallback(guard: impl Into<String>, fallback: Option<Fallback>) -> Self {
        Self {
            guard: guard.into(),
            fallback,
        }
    }
}

/// Outcome of running a binding list.
#[derive(Debug)]
pub enum Decision {
    /// Every guard passed.
    Proceed,
    /// Stop the request and send this reply.
    Abort(Reply),
}

impl Decision {
    pub fn is_proceed(&self) -> bool {
        matches!(self, Decision::Proceed)
    }
}

/// Runs guards from a registry in order. The first rejection ends the run.
#[derive(Debug, Clone, Copy)]
pub struct MiddlewarePipeline<'a> {
    registry: &'a GuardRegistry,
    devmode: bool,
}

impl<'a> MiddlewarePipeline<'a> {
    pub fn new(registry: &'a GuardRegistry, devmode: bool) -> Self {
        Self { registry, devmode }
    }

    /// Evaluate `bindings` against `ctx`.
    pub fn run(&self, bindings: &[MiddlewareBinding], ctx: &RequestContext) -> Decision {
        for binding in bindings {
            if let Decision::Abort(reply) = self.run_one(binding, ctx) {
                return Decision::Abort(reply);
            }
        }
        Decision::Proceed
    }

    /// Evaluate guards given by name, without fallbacks.
    pub fn run_names<S: AsRef<str>>(&self, names: &[S], ctx: &RequestContext) -> Decision {
        let bindings: Vec<MiddlewareBinding> = names
            .iter()
            .map(|n| MiddlewareBinding::new(n.as_ref()))
            .collect();
        self.run(&bindings, ctx)
    }

    fn run_one(&self, binding: &MiddlewareBinding, ctx: &RequestContext) -> Decision {
        let (identity, guard) = match self.registry.resolve(&binding.guard) {
            Ok(found) => found,
            Err(e) => return Decision::Abort(self.misconfigured(&e, ctx)),
        };

        if guard.evaluate(ctx) {
            return Decision::Proceed;
        }

        tracing::warn!(
            request_id = %ctx.request_id,
            guard = %identity,
            path = %ctx.path,
            has_fallback = binding.fallback.is_some(),
            "Guard rejected request"
        );

        let reply = match &binding.fallback {
            Some(fallback) => fallback.invoke(ctx, identity),
            None => Reply::unauthorized(),
        };
        Decision::Abort(reply)
    }

    fn misconfigured(&self, err: &GuardError, ctx: &RequestContext) -> Reply {
        if self.devmode {
            tracing::error!(request_id = %ctx.request_id, error = %err, "Guard misconfigured");
            Reply::diagnostic(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Middleware warning",
                &err.to_string(),
                "Register the guard, or point its alias at a registered guard.",
            )
        } else {
            tracing::warn!(request_id = %ctx.request_id, error = %err, "Guard misconfigured, rejecting");
            Reply::unauthorized()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::config::schema::AppConfig;
    use crate::dispatch::context::RequestDescriptor;
    use crate::dispatch::reply::X_ERROR_MESSAGE;

    fn ctx() -> RequestContext {
        RequestContext::new(&RequestDescriptor::new("GET", "/user"), &AppConfig::default())
    }

    #[test]
    fn test_all_pass_proceeds() {
        let mut registry = GuardRegistry::new();
        registry
            .register("A", |_: &RequestContext| true)
            .register("B", |_: &RequestContext| true);
        let decision = MiddlewarePipeline::new(&registry, false).run_names(&["A", "B"], &ctx());
        assert!(decision.is_proceed());
    }

    #[test]
    fn test_failure_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut registry = GuardRegistry::new();
        registry.register("G1", |_: &RequestContext| false).register(
            "G2",
            move |_: &RequestContext| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            },
        );

        let decision = MiddlewarePipeline::new(&registry, false).run_names(&["G1", "G2"], &ctx());
        match decision {
            Decision::Abort(reply) => {
                assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
                assert!(reply.header(X_ERROR_MESSAGE).is_some());
            }
            Decision::Proceed => panic!("expected abort"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_fallback_receives_identity() {
        let mut registry = GuardRegistry::new();
        registry.register("IsLoggedIn", |_: &RequestContext| false);
        registry.alias("auth", "IsLoggedIn");
        let binding = MiddlewareBinding::with_fallback(
            "auth",
            Some(Fallback::with_identity(|_, guard| {
                Reply::text(format!("denied by {}", guard)).with_status(StatusCode::FORBIDDEN)
            })),
        );

        match MiddlewarePipeline::new(&registry, false).run(&[binding], &ctx()) {
            Decision::Abort(reply) => {
                assert_eq!(reply.status, StatusCode::FORBIDDEN);
                assert_eq!(reply.body_text(), "denied by IsLoggedIn");
            }
            Decision::Proceed => panic!("expected abort"),
        }
    }

    #[test]
    fn test_plain_fallback() {
        let mut registry = GuardRegistry::new();
        registry.register("Never", |_: &RequestContext| false);
        let binding = MiddlewareBinding::with_fallback(
            "Never",
            Some(Fallback::plain(|_| Reply::redirect("/login", 302))),
        );
        match MiddlewarePipeline::new(&registry, false).run(&[binding], &ctx()) {
            Decision::Abort(reply) => assert_eq!(reply.header("location"), Some("/login")),
            Decision::Proceed => panic!("expected abort"),
        }
    }

    #[test]
    fn test_unknown_guard_production_is_unauthorized() {
        let registry = GuardRegistry::new();
        match MiddlewarePipeline::new(&registry, false).run_names(&["Ghost"], &ctx()) {
            Decision::Abort(reply) => assert_eq!(reply.status, StatusCode::UNAUTHORIZED),
            Decision::Proceed => panic!("expected abort"),
        }
    }

    #[test]
    fn test_unknown_guard_devmode_is_verbose() {
        let registry = GuardRegistry::new();
        match MiddlewarePipeline::new(&registry, true).run_names(&["Ghost"], &ctx()) {
            Decision::Abort(reply) => {
                assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
                assert!(reply.body_text().starts_with("Middleware warning"));
                assert!(reply.body_text().contains("Ghost"));
            }
            Decision::Proceed => panic!("expected abort"),
        }
    }
}
