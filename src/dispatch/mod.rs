//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! RequestDescriptor (method, target, headers, client)
//!     → context.rs (normalize path, derive convention target, request id)
//!     → dispatcher.rs (redirects, guards, routes, convention, not-found)
//!         → handler.rs (controller/action invocation)
//!         → view.rs (view rendering)
//!     → reply.rs (status, headers, body)
//! ```
//!
//! # Design Decisions
//! - The dispatcher is synchronous; the host decides where it runs
//! - Collaborators sit behind traits so tests can swap them out
//! - One context per request, dropped with the reply

pub mod context;
pub mod dispatcher;
pub mod handler;
pub mod reply;
pub mod view;

pub use context::{RequestContext, RequestDescriptor};
pub use dispatcher::{Dispatcher, X_REQUEST_ID};
pub use handler::{Controller, ControllerRegistry, HandlerError, HandlerInvoker};
pub use reply::{Reply, ReplyBody};
pub use view::{JsonViewRenderer, ViewRenderer};
