//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Startup
//!     → listener.rs (adopt inherited socket at the agreed ordinal, or bind)
//!     → register descriptor with the lifecycle for the next reboot
//!     → hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - The listening socket outlives any single process: it is bound once
//!   and passed from predecessor to successor on every reboot

pub mod listener;

pub use listener::{Listener, ListenerError, ListenerOrigin};
