//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GraceConfig (validated, immutable)
//!     → lifecycle / listener / observability take their sections
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; a reboot re-reads it in the successor
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::GraceConfig;
pub use schema::LifecycleConfig;
pub use schema::ListenerConfig;
pub use schema::ObservabilityConfig;
