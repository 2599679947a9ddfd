//! Graceful shutdown and hot reboot for long-running network services.

pub mod collections;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use collections::{AtomicMap, RandomMap, RwMap};
pub use config::schema::GraceConfig;
pub use http::HttpServer;
pub use lifecycle::{Lifecycle, Outcome};
