//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the guard registry (config aliases, framework guards)
//! - Collect route, guard and controller declarations from the application
//! - Register configured redirects
//! - Freeze everything into a `Dispatcher`
//!
//! # Design Decisions
//! - Fail fast: an invalid configured redirect is fatal
//! - Declarations happen here, before the listener binds
//! - Unresolvable autoload names are reported, not fatal; dispatch handles
//!   them per request

use std::sync::Arc;

use serde_json::json;
use thiserror::Error;

use crate::config::schema::EngineConfig;
use crate::dispatch::context::RequestContext;
use crate::dispatch::dispatcher::Dispatcher;
use crate::dispatch::handler::{Controller, ControllerRegistry};
use crate::dispatch::reply::Reply;
use crate::dispatch::view::ViewRenderer;
use crate::middleware::builtin::install_framework_guards;
use crate::middleware::guard::GuardRegistry;
use crate::middleware::pipeline::Fallback;
use crate::routing::table::{RouteHandler, RouteTable};
use crate::routing::types::{Param, RouteError};

/// Startup errors.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("route declaration failed: {0}")]
    Route(#[from] RouteError),
}

/// Collects declarations, then builds the dispatcher.
pub struct Application {
    config: EngineConfig,
    routes: RouteTable,
    guards: GuardRegistry,
    controllers: ControllerRegistry,
    views: Option<Arc<dyn ViewRenderer>>,
}

impl Application {
    pub fn new(config: EngineConfig) -> Self {
        let mut guards = GuardRegistry::from_config(&config.middleware);
        install_framework_guards(&mut guards, &config);
        Self {
            routes: RouteTable::with_override(config.app.allow_override),
            guards,
            controllers: ControllerRegistry::new(),
            views: None,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn routes(&mut self) -> &mut RouteTable {
        &mut self.routes
    }

    pub fn guards(&mut self) -> &mut GuardRegistry {
        &mut self.guards
    }

    pub fn controllers(&mut self) -> &mut ControllerRegistry {
        &mut self.controllers
    }

    pub fn view_renderer(mut self, views: Arc<dyn ViewRenderer>) -> Self {
        self.views = Some(views);
        self
    }

    /// Freeze declarations into a dispatcher.
    pub fn build(mut self) -> Result<Dispatcher, StartupError> {
        self.routes.add_redirects(&self.config.redirects)?;

        for name in &self.config.middleware.autoload {
            if !self.guards.contains(name) {
                tracing::warn!(guard = %name, "Autoload middleware does not resolve to a registered guard");
            }
        }

        tracing::info!(
            routes = self.routes.entries().len(),
            auth_gates = self.routes.auth_entries().len(),
            redirects = self.routes.redirects().len(),
            controllers = self.controllers.len(),
            "Application built"
        );

        let dispatcher = Dispatcher::new(
            Arc::new(self.config),
            Arc::new(self.routes),
            Arc::new(self.guards),
            Arc::new(self.controllers),
        );
        Ok(match self.views {
            Some(views) => dispatcher.with_view_renderer(views),
            None => dispatcher,
        })
    }
}

/// The application served by the bundled binary: a home page, a few static
/// pages, a blog with a login-gated editor and a versioned API redirect.
pub fn demo_application(config: EngineConfig) -> Application {
    let mut app = Application::new(config);

    app.controllers()
        .register(
            Controller::new("HomeController")
                .action("default", 0, |_, _| Reply::html("<h1>Welcome</h1>")),
        )
        .register(
            Controller::new("PageController").action("show", 1, |_, params| {
                let page = params.first().and_then(Param::as_segment).unwrap_or("");
                Reply::html(format!("<h1>{}</h1>", page))
            }),
        )
        .register(
            Controller::new("blogController")
                .action("default", 0, |_, _| Reply::json(json!({"posts": []})))
                .action("show", 1, |_, params| {
                    let id = params.first().and_then(Param::as_segment).unwrap_or("");
                    Reply::json(json!({ "id": id }))
                }),
        );

    app.guards().register("IsLoginMiddleware", |ctx: &RequestContext| {
        ctx.header("authorization").is_some()
    });
    app.guards().alias("isLogin", "IsLoginMiddleware");

    app.routes()
        .map("about-us", "PageController", "show", vec![Param::from("about-us")])
        .map("contact-us", "PageController", "show", vec![Param::from("contact-us")])
        .view("privacy-policy", "pages/privacy", json!({"title": "Privacy Policy"}))
        .get("blog/{id}", RouteHandler::action("blogController", "show"))
        .get(
            "blog/{id}/edit",
            RouteHandler::callback(|_, params| {
                let id = params.first().and_then(Param::as_segment).unwrap_or("");
                Reply::text(format!("editing {}", id))
            }),
        )
        .middleware_with_fallback(
            &["isLogin"],
            Fallback::plain(|_| Reply::redirect("/login", 302)),
        )
        .get(
            "files/(:any)",
            RouteHandler::callback(|_, params| {
                let path = params
                    .first()
                    .and_then(Param::as_tail)
                    .map(|t| t.join("/"))
                    .unwrap_or_default();
                Reply::text(path)
            }),
        )
        .redirect("api/v1/(:any)", "api/v2/(:any)", 301)
        .get(
            "api/v2/(:any)",
            RouteHandler::callback(|ctx, _| Reply::json(json!({ "path": ctx.path }))),
        );

    app
}
