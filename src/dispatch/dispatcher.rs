//! Request dispatch state machine.
//!
//! # Stages
//! Each stage either produces the final reply or hands over to the next one.
//! ```text
//! Redirect → GlobalMiddleware → AuthGates → HomeShortCircuit
//!     → UserRouteMatch → DefaultConventionDispatch | NotFound
//! ```
//!
//! # Design Decisions
//! - Collaborators are injected; nothing is looked up globally
//! - Every failure becomes a `Reply`; nothing escapes to the host
//! - Development mode replies carry diagnostics, production replies do not

use std::sync::Arc;
use std::time::Instant;

use axum::http::header::HeaderName;
use axum::http::StatusCode;

use crate::config::schema::EngineConfig;
use crate::dispatch::context::{RequestContext, RequestDescriptor};
use crate::dispatch::handler::{HandlerError, HandlerInvoker};
use crate::dispatch::reply::Reply;
use crate::dispatch::view::{JsonViewRenderer, ViewRenderer};
use crate::middleware::guard::GuardRegistry;
use crate::middleware::pipeline::{Decision, MiddlewarePipeline};
use crate::routing::pattern::split_segments;
use crate::routing::table::{RouteEntry, RouteHandler, RouteTable};
use crate::routing::types::MatchResult;

/// Header echoing the per-request id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Why a request ended up without a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NotFoundCause {
    DefaultRoutingDisabled,
    /// The root is declared by the application, but not for this method.
    RootClaimed,
    /// Convention dispatch found no such controller or action.
    Unresolved,
}

impl NotFoundCause {
    fn explain(self, path: &str) -> String {
        match self {
            Self::DefaultRoutingDisabled => {
                format!("The uri /{} has no route, default routing is disabled", path)
            }
            Self::RootClaimed => format!(
                "The uri /{} has no route for this method; the root is declared by the application, so default routing was skipped",
                path
            ),
            Self::Unresolved => format!(
                "The uri /{} has no route and default routing found no handler",
                path
            ),
        }
    }
}

/// Routes requests to handlers. Shared across workers behind an `Arc`.
pub struct Dispatcher {
    config: Arc<EngineConfig>,
    routes: Arc<RouteTable>,
    guards: Arc<GuardRegistry>,
    handlers: Arc<dyn HandlerInvoker>,
    views: Arc<dyn ViewRenderer>,
}

impl Dispatcher {
    pub fn new(
        config: Arc<EngineConfig>,
        routes: Arc<RouteTable>,
        guards: Arc<GuardRegistry>,
        handlers: Arc<dyn HandlerInvoker>,
    ) -> Self {
        Self {
            config,
            routes,
            guards,
            handlers,
            views: Arc::new(JsonViewRenderer),
        }
    }

    /// Replace the view renderer used by `view` routes.
    pub fn with_view_renderer(mut self, views: Arc<dyn ViewRenderer>) -> Self {
        self.views = views;
        self
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Dispatch one request. Always returns a reply.
    pub fn dispatch(&self, request: &RequestDescriptor) -> Reply {
        let start = Instant::now();
        let mut ctx = RequestContext::new(request, &self.config.app);

        let reply = self.route(&mut ctx);

        tracing::debug!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            path = %ctx.path,
            status = reply.status.as_u16(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "Request dispatched"
        );
        reply.with_header(
            HeaderName::from_static(X_REQUEST_ID),
            &ctx.request_id.to_string(),
        )
    }

    fn route(&self, ctx: &mut RequestContext) -> Reply {
        if let Some(reply) = self.redirect(ctx) {
            return reply;
        }
        if let Some(reply) = self.global_middleware(ctx) {
            return reply;
        }
        if let Some(reply) = self.auth_gates(ctx) {
            return reply;
        }

        let home_claimed = self.home_short_circuit(ctx);

        if let Some(reply) = self.user_routes(ctx) {
            return reply;
        }

        if home_claimed {
            return self.not_found(ctx, NotFoundCause::RootClaimed);
        }
        if self.config.app.enable_default_routing {
            return self.convention(ctx);
        }
        self.not_found(ctx, NotFoundCause::DefaultRoutingDisabled)
    }

    fn pipeline(&self) -> MiddlewarePipeline<'_> {
        MiddlewarePipeline::new(&self.guards, self.config.app.devmode)
    }

    fn redirect(&self, ctx: &RequestContext) -> Option<Reply> {
        self.routes.redirects().iter().find_map(|rule| {
            let target = rule.resolve(&ctx.path)?;
            let location = self.location_for(&target, ctx.path_decoded);
            tracing::info!(
                request_id = %ctx.request_id,
                from = %ctx.path,
                to = %location,
                code = rule.code,
                "Redirect issued"
            );
            Some(Reply::redirect(&location, rule.code))
        })
    }

    /// Absolute target for a resolved redirect. A decoded path is
    /// re-encoded per segment; a raw one already carries its escapes.
    fn location_for(&self, path: &str, decoded: bool) -> String {
        let base = self.config.app.base_url.trim_end_matches('/');
        if !decoded {
            return format!("{}/{}", base, path);
        }
        let encoded: Vec<String> = split_segments(path)
            .into_iter()
            .map(|s| urlencoding::encode(s).into_owned())
            .collect();
        format!("{}/{}", base, encoded.join("/"))
    }

    fn global_middleware(&self, ctx: &RequestContext) -> Option<Reply> {
        let names: Vec<&str> = self
            .guards
            .framework_guards()
            .iter()
            .chain(self.config.middleware.autoload.iter())
            .map(String::as_str)
            .collect();
        match self.pipeline().run_names(&names, ctx) {
            Decision::Proceed => None,
            Decision::Abort(reply) => Some(reply),
        }
    }

    fn auth_gates(&self, ctx: &RequestContext) -> Option<Reply> {
        let pipeline = self.pipeline();
        for gate in self.routes.auth_entries() {
            if gate.pattern().matches(&ctx.path).is_none() {
                continue;
            }
            if let Decision::Abort(reply) = pipeline.run(gate.middlewares(), ctx) {
                return Some(reply);
            }
        }
        None
    }

    /// A request for the default controller is left to the application when
    /// it declared the root itself.
    fn home_short_circuit(&self, ctx: &RequestContext) -> bool {
        let claimed = ctx.convention.controller == self.config.app.default_controller
            && self.routes.find_exact("/", None);
        if claimed {
            tracing::debug!(request_id = %ctx.request_id, "Root declared by application, convention dispatch skipped");
        }
        claimed
    }

    fn user_routes(&self, ctx: &mut RequestContext) -> Option<Reply> {
        for entry in self.routes.candidates() {
            let Some(matched) = entry.pattern().matches(&ctx.path) else {
                continue;
            };
            if !entry.method().accepts(&ctx.method) {
                continue;
            }
            tracing::debug!(
                request_id = %ctx.request_id,
                method = %entry.method(),
                pattern = %entry.pattern().as_str(),
                "Route matched"
            );
            return Some(self.execute(entry, matched, ctx));
        }
        None
    }

    fn execute(&self, entry: &RouteEntry, matched: MatchResult, ctx: &mut RequestContext) -> Reply {
        if let Decision::Abort(reply) = self.pipeline().run(entry.middlewares(), ctx) {
            return reply;
        }

        let args = matched.args();
        match entry.handler() {
            RouteHandler::Callback(f) => {
                ctx.params = args;
                f(ctx, &ctx.params)
            }
            RouteHandler::Action {
                controller,
                action,
                params,
            } => {
                ctx.params = params.clone().unwrap_or(args);
                match self.handlers.invoke(ctx, controller, action, &ctx.params) {
                    Ok(reply) => reply,
                    Err(e) => self.handler_failure(&e, ctx),
                }
            }
            RouteHandler::View { view, data } => {
                ctx.params = args;
                self.views.render(ctx, view, data)
            }
        }
    }

    fn convention(&self, ctx: &mut RequestContext) -> Reply {
        let target = ctx.convention.clone();
        ctx.params = target.params;
        match self
            .handlers
            .invoke(ctx, &target.controller, &target.action, &ctx.params)
        {
            Ok(reply) => reply,
            Err(e) => self.handler_failure(&e, ctx),
        }
    }

    fn handler_failure(&self, err: &HandlerError, ctx: &RequestContext) -> Reply {
        if self.config.app.devmode {
            tracing::error!(request_id = %ctx.request_id, path = %ctx.path, error = %err, "Handler resolution failed");
            let title = match err {
                HandlerError::ControllerNotFound { .. } => "Class not found",
                HandlerError::NotInstantiable { .. } => "Class not instantiable",
                HandlerError::ActionNotFound { .. } => "Action not found",
                HandlerError::MissingParams { .. } => "Not enough params",
            };
            return Reply::diagnostic(err.status(), title, &err.to_string(), err.description());
        }

        tracing::warn!(request_id = %ctx.request_id, path = %ctx.path, error = %err, "Handler resolution failed");
        if err.status() == StatusCode::NOT_FOUND {
            self.not_found(ctx, NotFoundCause::Unresolved)
        } else {
            Reply::internal_error()
        }
    }

    fn not_found(&self, ctx: &RequestContext, cause: NotFoundCause) -> Reply {
        tracing::info!(request_id = %ctx.request_id, method = %ctx.method, path = %ctx.path, cause = ?cause, "No route matched");
        let app = &self.config.app;

        if app.devmode {
            return Reply::diagnostic(
                StatusCode::NOT_FOUND,
                "Wrong path",
                &cause.explain(&ctx.path),
                "",
            );
        }

        let Some(controller) = app.not_found_controller.as_deref() else {
            return Reply::not_found_page();
        };
        match self
            .handlers
            .invoke(ctx, controller, &app.default_action, &[])
        {
            Ok(reply) if reply.status == StatusCode::OK => reply.with_status(StatusCode::NOT_FOUND),
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(controller = %controller, error = %e, "Not-found controller unavailable");
                Reply::not_found_page()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::handler::{Controller, ControllerRegistry};
    use crate::dispatch::reply::X_ERROR_MESSAGE;
    use crate::routing::types::Param;

    fn dispatcher_with(config: EngineConfig, table: RouteTable, guards: GuardRegistry) -> Dispatcher {
        let mut controllers = ControllerRegistry::new();
        controllers
            .register(
                Controller::new("HomeController").action("default", 0, |_, _| Reply::text("home")),
            )
            .register(
                Controller::new("blogController")
                    .action("show", 1, |_, p| {
                        Reply::text(format!("post {}", p[0].as_segment().unwrap_or("")))
                    }),
            )
            .register(
                Controller::new("ErrorsController")
                    .action("default", 0, |_, _| Reply::text("custom missing page")),
            );
        Dispatcher::new(
            Arc::new(config),
            Arc::new(table),
            Arc::new(guards),
            Arc::new(controllers),
        )
    }

    fn get(path: &str) -> RequestDescriptor {
        RequestDescriptor::new("GET", path)
    }

    #[test]
    fn test_reply_carries_request_id() {
        let d = dispatcher_with(EngineConfig::default(), RouteTable::new(), GuardRegistry::new());
        let reply = d.dispatch(&get("/"));
        assert_eq!(reply.body_text(), "home");
        assert!(reply.header(X_REQUEST_ID).is_some());
    }

    #[test]
    fn test_convention_dispatch() {
        let d = dispatcher_with(EngineConfig::default(), RouteTable::new(), GuardRegistry::new());
        assert_eq!(d.dispatch(&get("/blog/show/9")).body_text(), "post 9");
    }

    #[test]
    fn test_redirect_runs_first() {
        let mut table = RouteTable::new();
        table
            .redirect("api/v1/(:any)", "api/v2/(:any)", 301)
            .get("api/v1/(:any)", RouteHandler::callback(|_, _| Reply::text("old")));
        let mut config = EngineConfig::default();
        config.app.base_url = "https://example.com/".into();
        let d = dispatcher_with(config, table, GuardRegistry::new());

        let reply = d.dispatch(&get("/api/v1/posts/3"));
        assert_eq!(reply.status, StatusCode::MOVED_PERMANENTLY);
        assert_eq!(
            reply.header("location"),
            Some("https://example.com/api/v2/posts/3")
        );
    }

    #[test]
    fn test_redirect_location_encoding_follows_decoding() {
        let mut table = RouteTable::new();
        table.redirect("old/(:any)", "new/(:any)", 302);

        let mut raw = EngineConfig::default();
        raw.app.url_decode = false;
        let d = dispatcher_with(raw, table.clone(), GuardRegistry::new());
        let reply = d.dispatch(&get("/old/caf%C3%A9"));
        assert_eq!(reply.header("location"), Some("/new/caf%C3%A9"));

        let d = dispatcher_with(EngineConfig::default(), table, GuardRegistry::new());
        let reply = d.dispatch(&get("/old/caf%C3%A9"));
        assert_eq!(reply.header("location"), Some("/new/caf%C3%A9"));
        let reply = d.dispatch(&get("/old/a%20b"));
        assert_eq!(reply.header("location"), Some("/new/a%20b"));
    }

    #[test]
    fn test_autoload_guard_blocks_everything() {
        let mut config = EngineConfig::default();
        config.middleware.autoload = vec!["closed".into()];
        config.middleware.aliases.insert("closed".into(), "Maintenance".into());
        let mut guards = GuardRegistry::from_config(&config.middleware);
        guards.register("Maintenance", |_: &RequestContext| false);
        let d = dispatcher_with(config, RouteTable::new(), guards);

        let reply = d.dispatch(&get("/"));
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
        assert!(reply.header(X_ERROR_MESSAGE).is_some());
    }

    #[test]
    fn test_auth_gate_covers_area() {
        let mut table = RouteTable::new();
        table
            .auth("admin/(:any)", &["IsAdmin"], None)
            .get("admin/panel", RouteHandler::callback(|_, _| Reply::text("panel")))
            .get("public", RouteHandler::callback(|_, _| Reply::text("public")));
        let mut guards = GuardRegistry::new();
        guards.register("IsAdmin", |c: &RequestContext| c.header("x-admin").is_some());
        let d = dispatcher_with(EngineConfig::default(), table, guards);

        assert_eq!(d.dispatch(&get("/admin/panel")).status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            d.dispatch(&get("/admin/panel").with_header("x-admin", "1")).body_text(),
            "panel"
        );
        assert_eq!(d.dispatch(&get("/public")).body_text(), "public");
    }

    #[test]
    fn test_verb_mismatch_falls_through() {
        let mut table = RouteTable::new();
        table.post("blog/show/{id}", RouteHandler::callback(|_, _| Reply::text("posted")));
        let d = dispatcher_with(EngineConfig::default(), table, GuardRegistry::new());
        // GET skips the POST route and reaches convention dispatch
        assert_eq!(d.dispatch(&get("/blog/show/4")).body_text(), "post 4");
        assert_eq!(
            d.dispatch(&RequestDescriptor::new("post", "/blog/show/4")).body_text(),
            "posted"
        );
    }

    #[test]
    fn test_map_route_uses_fixed_params() {
        let mut table = RouteTable::new();
        table.map("latest", "blogController", "show", vec![Param::from("100")]);
        let d = dispatcher_with(EngineConfig::default(), table, GuardRegistry::new());
        assert_eq!(d.dispatch(&RequestDescriptor::new("DELETE", "/latest")).body_text(), "post 100");
    }

    #[test]
    fn test_home_short_circuit_skips_convention() {
        let mut table = RouteTable::new();
        table.post("/", RouteHandler::callback(|_, _| Reply::text("posted home")));
        let d = dispatcher_with(EngineConfig::default(), table, GuardRegistry::new());
        // root declared for POST only; a GET must not fall back to HomeController
        assert_eq!(d.dispatch(&get("/")).status, StatusCode::NOT_FOUND);
        assert_eq!(
            d.dispatch(&RequestDescriptor::new("POST", "/")).body_text(),
            "posted home"
        );
    }

    #[test]
    fn test_production_not_found_controller() {
        let mut config = EngineConfig::default();
        config.app.enable_default_routing = false;
        config.app.not_found_controller = Some("ErrorsController".into());
        let d = dispatcher_with(config, RouteTable::new(), GuardRegistry::new());
        let reply = d.dispatch(&get("/unknown"));
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
        assert_eq!(reply.body_text(), "custom missing page");
    }

    #[test]
    fn test_devmode_not_found_is_diagnostic() {
        let mut config = EngineConfig::default();
        config.app.enable_default_routing = false;
        config.app.devmode = true;
        let d = dispatcher_with(config, RouteTable::new(), GuardRegistry::new());
        let reply = d.dispatch(&get("/unknown"));
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
        assert!(reply.body_text().starts_with("Wrong path"));
        assert!(reply.body_text().contains("/unknown"));
        assert!(reply.body_text().contains("default routing is disabled"));
    }

    #[test]
    fn test_devmode_not_found_names_claimed_root() {
        let mut table = RouteTable::new();
        table.post("/", RouteHandler::callback(|_, _| Reply::text("posted home")));
        let mut config = EngineConfig::default();
        config.app.devmode = true;
        let d = dispatcher_with(config, table, GuardRegistry::new());

        let reply = d.dispatch(&get("/"));
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
        let body = reply.body_text();
        assert!(body.starts_with("Wrong path"));
        assert!(body.contains("root is declared by the application"));
        assert!(!body.contains("default routing is disabled"));
    }

    #[test]
    fn test_missing_params_devmode_vs_production() {
        let mut config = EngineConfig::default();
        config.app.devmode = true;
        let dev = dispatcher_with(config, RouteTable::new(), GuardRegistry::new());
        let reply = dev.dispatch(&get("/blog/show"));
        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(reply.body_text().contains("requires 1, supplied 0"));

        let prod = dispatcher_with(EngineConfig::default(), RouteTable::new(), GuardRegistry::new());
        let reply = prod.dispatch(&get("/blog/show"));
        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!reply.body_text().contains("blogController"));
    }

    #[test]
    fn test_unknown_controller_in_production_is_404() {
        let d = dispatcher_with(EngineConfig::default(), RouteTable::new(), GuardRegistry::new());
        let reply = d.dispatch(&get("/nowhere"));
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
        assert!(reply.body_text().contains("Oops 404"));
    }
}
