//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with structured fields (request_id, path, guard)
//!     → logging.rs (filter, format, write)
//!
//! Consumers:
//!     → stdout (human-readable or JSON lines)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through every dispatch event
//! - `RUST_LOG` overrides the configured level

pub mod logging;
