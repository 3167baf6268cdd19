//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Declare guards, controllers, routes
//!     → Register configured redirects → Freeze Dispatcher → Start listener
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C → broadcast → Stop accepting → Drain in-flight requests → Exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then declarations, then listener
//! - Nothing is declared after the listener binds

pub mod shutdown;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{demo_application, Application, StartupError};
