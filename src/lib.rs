//! Request routing and dispatch engine.
//!
//! Matches request paths against declared route patterns, runs guard
//! chains, and dispatches to controller actions, closures or views, with
//! convention-based fallback routing.

pub mod config;
pub mod dispatch;
pub mod http;
pub mod lifecycle;
pub mod middleware;
pub mod observability;
pub mod routing;

pub use config::schema::EngineConfig;
pub use dispatch::{Dispatcher, Reply, RequestDescriptor};
pub use http::HttpServer;
pub use lifecycle::{Application, Shutdown};
pub use routing::{RouteHandler, RouteMethod, RouteTable};
