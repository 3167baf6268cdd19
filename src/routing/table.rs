//! Route table and declaration API.
//!
//! # Responsibilities
//! - Store declared routes in registration order
//! - Reject duplicate `(pattern, method)` pairs unless override mode is on
//! - Attach middleware to the most recently declared entry
//! - Keep auth gates and redirect rules alongside the routes
//!
//! # Design Decisions
//! - Populated once at startup, then shared read-only (`Arc<RouteTable>`)
//! - Patterns compiled at declaration, so a bad pattern fails early
//! - Duplicate detection uses the normalized pattern, so `/blog/` and
//!   `Blog` collide
//! - Traversal order is decided here from the override flag: reversed when
//!   later declarations must win

use std::fmt;
use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::Value;

use crate::config::schema::RedirectConfig;
use crate::dispatch::context::RequestContext;
use crate::dispatch::reply::Reply;
use crate::middleware::pipeline::{Fallback, MiddlewareBinding};
use crate::routing::pattern::{normalize, Pattern};
use crate::routing::redirect::RedirectRule;
use crate::routing::types::{Param, RouteError, RouteMethod, RouteResult};

/// Signature of an inline route handler.
pub type RouteCallback = dyn Fn(&RequestContext, &[Param]) -> Reply + Send + Sync;

/// What runs when a route matches.
#[derive(Clone)]
pub enum RouteHandler {
    /// Inline closure, called with the captured arguments.
    Callback(Arc<RouteCallback>),
    /// Named controller action. With `params` set, those are passed instead
    /// of the captured arguments.
    Action {
        controller: String,
        action: String,
        params: Option<Vec<Param>>,
    },
    /// Named view rendered with fixed data.
    View { view: String, data: Value },
}

impl RouteHandler {
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&RequestContext, &[Param]) -> Reply + Send + Sync + 'static,
    {
        RouteHandler::Callback(Arc::new(f))
    }

    pub fn action(controller: impl Into<String>, action: impl Into<String>) -> Self {
        RouteHandler::Action {
            controller: controller.into(),
            action: action.into(),
            params: None,
        }
    }

    /// Controller action with fixed parameters.
    pub fn action_with(
        controller: impl Into<String>,
        action: impl Into<String>,
        params: Vec<Param>,
    ) -> Self {
        RouteHandler::Action {
            controller: controller.into(),
            action: action.into(),
            params: Some(params),
        }
    }

    pub fn view(view: impl Into<String>, data: Value) -> Self {
        RouteHandler::View {
            view: view.into(),
            data,
        }
    }

    /// Short label for listings and logs.
    pub fn describe(&self) -> String {
        match self {
            RouteHandler::Callback(_) => "<closure>".to_string(),
            RouteHandler::Action {
                controller, action, ..
            } => format!("{}::{}", controller, action),
            RouteHandler::View { view, .. } => format!("view:{}", view),
        }
    }
}

impl fmt::Debug for RouteHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// A declared route.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pattern: Pattern,
    method: RouteMethod,
    handler: RouteHandler,
    middlewares: Vec<MiddlewareBinding>,
}

impl RouteEntry {
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn method(&self) -> RouteMethod {
        self.method
    }

    pub fn handler(&self) -> &RouteHandler {
        &self.handler
    }

    pub fn middlewares(&self) -> &[MiddlewareBinding] {
        &self.middlewares
    }

    /// Guard names attached to this entry, in run order.
    pub fn guard_names(&self) -> Vec<&str> {
        self.middlewares.iter().map(|m| m.guard.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Route(usize),
    Auth(usize),
}

/// Routes, auth gates and redirects for one application.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
    auth_entries: Vec<RouteEntry>,
    redirects: Vec<RedirectRule>,
    allow_override: bool,
    last: Option<Slot>,
    /// The latest declaration was rejected, so middleware that follows it
    /// belongs to nothing.
    last_rejected: bool,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table where a later declaration of the same pattern and method is
    /// kept and wins over the earlier one.
    pub fn with_override(allow_override: bool) -> Self {
        Self {
            allow_override,
            ..Self::default()
        }
    }

    pub fn allow_override(&self) -> bool {
        self.allow_override
    }

    /// Declare a route.
    ///
    /// Without override mode a second declaration of the same pattern and
    /// method fails with `DuplicateRoute` and leaves the table unchanged.
    /// Middleware declared right after a rejected route is dropped with it.
    pub fn register(
        &mut self,
        pattern: &str,
        method: RouteMethod,
        handler: RouteHandler,
    ) -> RouteResult<&RouteEntry> {
        self.last_rejected = true;
        let compiled = Pattern::parse(pattern)?;

        if !self.allow_override && self.find_exact(pattern, Some(method)) {
            return Err(RouteError::DuplicateRoute {
                pattern: compiled.normalized(),
                method,
            });
        }
        self.last_rejected = false;

        let entry = RouteEntry {
            pattern: compiled,
            method,
            handler,
            middlewares: Vec::new(),
        };

        if method == RouteMethod::Auth {
            self.auth_entries.push(entry);
            let index = self.auth_entries.len() - 1;
            self.last = Some(Slot::Auth(index));
            Ok(&self.auth_entries[index])
        } else {
            self.entries.push(entry);
            let index = self.entries.len() - 1;
            self.last = Some(Slot::Route(index));
            Ok(&self.entries[index])
        }
    }

    /// Append guards to the most recently declared entry. Returns `false`
    /// when nothing has been declared yet or the latest declaration was
    /// rejected.
    pub fn attach_middleware<S: AsRef<str>>(
        &mut self,
        guards: &[S],
        fallback: Option<Fallback>,
    ) -> bool {
        if self.last_rejected {
            let names: Vec<&str> = guards.iter().map(|g| g.as_ref()).collect();
            tracing::debug!(guards = ?names, "Middleware follows a rejected route, ignoring");
            return false;
        }
        let entry = match self.last {
            Some(Slot::Route(i)) => self.entries.get_mut(i),
            Some(Slot::Auth(i)) => self.auth_entries.get_mut(i),
            None => None,
        };
        let Some(entry) = entry else {
            let names: Vec<&str> = guards.iter().map(|g| g.as_ref()).collect();
            tracing::warn!(guards = ?names, "Middleware declared before any route, ignoring");
            return false;
        };
        for guard in guards {
            entry.middlewares.push(MiddlewareBinding::with_fallback(
                guard.as_ref(),
                fallback.clone(),
            ));
        }
        true
    }

    /// Whether `pattern` has been declared literally, optionally for a
    /// specific method. Placeholders are compared as text, not evaluated.
    pub fn find_exact(&self, pattern: &str, method: Option<RouteMethod>) -> bool {
        let wanted = normalize(pattern);
        self.entries
            .iter()
            .chain(self.auth_entries.iter())
            .any(|e| {
                e.pattern.normalized() == wanted && method.map_or(true, |m| e.method == m)
            })
    }

    /// Declared routes in registration order.
    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    /// Routes in the order dispatch should try them.
    pub fn candidates(&self) -> Box<dyn Iterator<Item = &RouteEntry> + '_> {
        if self.allow_override {
            Box::new(self.entries.iter().rev())
        } else {
            Box::new(self.entries.iter())
        }
    }

    pub fn auth_entries(&self) -> &[RouteEntry] {
        &self.auth_entries
    }

    pub fn redirects(&self) -> &[RedirectRule] {
        &self.redirects
    }

    pub fn len(&self) -> usize {
        self.entries.len() + self.auth_entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store a redirect rule.
    pub fn add_redirect(&mut self, from: &str, to: &str, code: u16) -> RouteResult<()> {
        let rule = RedirectRule::new(from, to, code)?;
        tracing::debug!(from = %rule.from, to = %rule.to, code = rule.code, "Redirect declared");
        self.redirects.push(rule);
        Ok(())
    }

    /// Store the redirects declared in configuration.
    pub fn add_redirects(&mut self, redirects: &[RedirectConfig]) -> RouteResult<()> {
        for r in redirects {
            self.add_redirect(&r.from, &r.to, r.code)?;
        }
        Ok(())
    }

    fn declare(&mut self, pattern: &str, method: RouteMethod, handler: RouteHandler) -> &mut Self {
        match self.register(pattern, method, handler) {
            Ok(_) => {}
            Err(e @ RouteError::DuplicateRoute { .. }) => {
                tracing::debug!(error = %e, "Duplicate route ignored");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Route declaration rejected");
            }
        }
        self
    }

    pub fn get(&mut self, pattern: &str, handler: RouteHandler) -> &mut Self {
        self.declare(pattern, RouteMethod::Get, handler)
    }

    pub fn post(&mut self, pattern: &str, handler: RouteHandler) -> &mut Self {
        self.declare(pattern, RouteMethod::Post, handler)
    }

    pub fn put(&mut self, pattern: &str, handler: RouteHandler) -> &mut Self {
        self.declare(pattern, RouteMethod::Put, handler)
    }

    pub fn patch(&mut self, pattern: &str, handler: RouteHandler) -> &mut Self {
        self.declare(pattern, RouteMethod::Patch, handler)
    }

    pub fn delete(&mut self, pattern: &str, handler: RouteHandler) -> &mut Self {
        self.declare(pattern, RouteMethod::Delete, handler)
    }

    pub fn head(&mut self, pattern: &str, handler: RouteHandler) -> &mut Self {
        self.declare(pattern, RouteMethod::Head, handler)
    }

    pub fn options(&mut self, pattern: &str, handler: RouteHandler) -> &mut Self {
        self.declare(pattern, RouteMethod::Options, handler)
    }

    /// Route accepting every request method.
    pub fn any(&mut self, pattern: &str, handler: RouteHandler) -> &mut Self {
        self.declare(pattern, RouteMethod::Any, handler)
    }

    /// Map a pattern straight to a controller action with fixed parameters.
    pub fn map(
        &mut self,
        pattern: &str,
        controller: &str,
        action: &str,
        params: Vec<Param>,
    ) -> &mut Self {
        self.declare(
            pattern,
            RouteMethod::Map,
            RouteHandler::action_with(controller, action, params),
        )
    }

    /// Map a pattern straight to a view.
    pub fn view(&mut self, pattern: &str, view: &str, data: Value) -> &mut Self {
        self.declare(pattern, RouteMethod::View, RouteHandler::view(view, data))
    }

    /// Gate every path matching `pattern` behind `guards`.
    pub fn auth<S: AsRef<str>>(
        &mut self,
        pattern: &str,
        guards: &[S],
        fallback: Option<Fallback>,
    ) -> &mut Self {
        let registered = self
            .register(
                pattern,
                RouteMethod::Auth,
                RouteHandler::callback(|_, _| Reply::empty(StatusCode::NO_CONTENT)),
            )
            .is_ok();
        if registered {
            self.attach_middleware(guards, fallback);
        } else {
            tracing::debug!(pattern = %pattern, "Auth gate already declared");
        }
        self
    }

    /// Redirect requests matching `from` to `to`.
    pub fn redirect(&mut self, from: &str, to: &str, code: u16) -> &mut Self {
        if let Err(e) = self.add_redirect(from, to, code) {
            tracing::warn!(from = %from, error = %e, "Redirect declaration rejected");
        }
        self
    }

    /// Attach guards to the last declared route.
    pub fn middleware<S: AsRef<str>>(&mut self, guards: &[S]) -> &mut Self {
        self.attach_middleware(guards, None);
        self
    }

    /// Attach guards with a fallback to the last declared route.
    pub fn middleware_with_fallback<S: AsRef<str>>(
        &mut self,
        guards: &[S],
        fallback: Fallback,
    ) -> &mut Self {
        self.attach_middleware(guards, Some(fallback));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text(body: &'static str) -> RouteHandler {
        RouteHandler::callback(move |_, _| Reply::text(body))
    }

    #[test]
    fn test_register_in_order() {
        let mut table = RouteTable::new();
        table
            .get("blog/{id}", text("a"))
            .post("blog", text("b"))
            .get("about", text("c"));
        let patterns: Vec<&str> = table.entries().iter().map(|e| e.pattern().as_str()).collect();
        assert_eq!(patterns, vec!["blog/{id}", "blog", "about"]);
    }

    #[test]
    fn test_duplicate_is_rejected_without_override() {
        let mut table = RouteTable::new();
        table.register("blog", RouteMethod::Get, text("first")).unwrap();
        let err = table
            .register("/Blog/", RouteMethod::Get, text("second"))
            .unwrap_err();
        assert!(matches!(err, RouteError::DuplicateRoute { .. }));
        assert_eq!(table.len(), 1);

        // same pattern, different method is a different route
        table.register("blog", RouteMethod::Post, text("post")).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_reregistration_is_idempotent() {
        let mut table = RouteTable::new();
        for _ in 0..100 {
            table.get("user", text("u")).middleware(&["IsLoggedIn"]);
        }
        assert_eq!(table.entries().len(), 1);
        assert_eq!(table.entries()[0].guard_names(), vec!["IsLoggedIn"]);
    }

    #[test]
    fn test_middleware_after_rejected_route_is_dropped() {
        let mut table = RouteTable::new();
        table.get("a", text("a")).middleware(&["G1"]);
        assert!(table.register("a", RouteMethod::Get, text("again")).is_err());
        assert!(!table.attach_middleware(&["G2"], None));

        table.get("{x?}/b", text("bad")).middleware(&["G3"]);
        assert_eq!(table.entries().len(), 1);
        assert_eq!(table.entries()[0].guard_names(), vec!["G1"]);

        // an accepted declaration takes middleware again
        table.get("c", text("c")).middleware(&["G4"]);
        assert_eq!(table.entries()[1].guard_names(), vec!["G4"]);
    }

    #[test]
    fn test_override_keeps_both_and_reverses() {
        let mut table = RouteTable::with_override(true);
        table.get("blog", text("h1")).get("blog", text("h2"));
        assert_eq!(table.entries().len(), 2);
        let first = table.candidates().next().unwrap();
        assert_eq!(first.handler().describe(), "<closure>");
        assert!(std::ptr::eq(first, &table.entries()[1]));
    }

    #[test]
    fn test_middleware_attaches_to_last_entry_only() {
        let mut table = RouteTable::new();
        table
            .get("a", text("a"))
            .get("b", text("b"))
            .middleware_with_fallback(&["G1", "G2"], Fallback::plain(|_| Reply::text("no")));
        assert!(table.entries()[0].middlewares().is_empty());
        let bindings = table.entries()[1].middlewares();
        assert_eq!(bindings.len(), 2);
        assert!(bindings.iter().all(|b| b.fallback.is_some()));
    }

    #[test]
    fn test_middleware_before_any_route() {
        let mut table = RouteTable::new();
        assert!(!table.attach_middleware(&["G"], None));
        assert!(table.is_empty());
    }

    #[test]
    fn test_find_exact() {
        let mut table = RouteTable::new();
        table.get("/", text("home")).get("blog/{id}", text("post"));
        assert!(table.find_exact("/", None));
        assert!(table.find_exact("", Some(RouteMethod::Get)));
        assert!(!table.find_exact("/", Some(RouteMethod::Post)));
        assert!(table.find_exact("BLOG/{id}", None));
        assert!(!table.find_exact("blog/42", None));
    }

    #[test]
    fn test_invalid_pattern_fails_early() {
        let mut table = RouteTable::new();
        let err = table
            .register("blog/{id?}/edit", RouteMethod::Get, text("x"))
            .unwrap_err();
        assert!(matches!(err, RouteError::InvalidPattern { .. }));
        assert!(table.is_empty());
    }

    #[test]
    fn test_auth_and_direct_kinds() {
        let mut table = RouteTable::new();
        table
            .auth("admin/(:any)", &["IsAdmin"], None)
            .map("docs", "PageController", "show", vec![Param::from("docs")])
            .view("about", "pages/about", json!({"title": "About"}));

        assert_eq!(table.auth_entries().len(), 1);
        assert_eq!(table.auth_entries()[0].guard_names(), vec!["IsAdmin"]);
        assert_eq!(table.entries()[0].method(), RouteMethod::Map);
        assert_eq!(table.entries()[0].handler().describe(), "PageController::show");
        assert_eq!(table.entries()[1].method(), RouteMethod::View);
    }

    #[test]
    fn test_redirects() {
        let mut table = RouteTable::new();
        table.redirect("api/v1/(:any)", "api/v2/(:any)", 301);
        table.redirect("old", "new", 200);
        assert_eq!(table.redirects().len(), 1);
        assert_eq!(
            table.redirects()[0].resolve("api/v1/posts/3").as_deref(),
            Some("api/v2/posts/3")
        );

        let configured = vec![RedirectConfig {
            from: "legacy".into(),
            to: "modern".into(),
            code: 302,
        }];
        table.add_redirects(&configured).unwrap();
        assert_eq!(table.redirects().len(), 2);
    }
}
