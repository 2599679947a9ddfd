//! HTTP layer of the host service.
//!
//! # Data Flow
//! ```text
//! Listener (owned by net/)
//!     → server.rs (axum router, tracing + timeout layers)
//!     → in-flight middleware (one WorkGuard per request)
//!     → handlers: /, /status, /slow/{ms}
//!
//! On lifecycle shutdown broadcast:
//!     stop accepting → finish in-flight requests → drop subscription
//! ```

pub mod server;

pub use server::{HttpServer, InstanceInfo};
