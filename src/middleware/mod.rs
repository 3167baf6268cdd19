//! Middleware subsystem: guards attached to routes and to every request.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     [middleware] aliases → GuardRegistry::from_config
//!     builtin::install_framework_guards → framework list
//!     application guards → GuardRegistry::register
//!
//! Per request:
//!     MiddlewareBinding[] (framework, autoload, auth gate or route)
//!     → pipeline.rs (resolve alias, evaluate in order)
//!     → Proceed | Abort(fallback reply or 401)
//! ```
//!
//! # Design Decisions
//! - First rejection ends the run; later guards are never evaluated
//! - A name that resolves to no guard is a configuration error, not a pass
//! - Registry is built once and only read while serving

pub mod builtin;
pub mod guard;
pub mod pipeline;

pub use guard::{Guard, GuardError, GuardRegistry};
pub use pipeline::{Decision, Fallback, MiddlewareBinding, MiddlewarePipeline};
