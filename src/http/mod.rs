//! HTTP host subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, trace + timeout layers)
//!     → RequestDescriptor (method, target, headers, peer address)
//!     → [dispatcher decides handler]
//!     → Reply → HTTP response
//!     → Send to client
//! ```

pub mod server;

pub use server::HttpServer;
