//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for a service
//! running under lifecycle control. All types derive Serde traits for
//! deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GraceConfig {
    /// Shutdown and reboot behaviour.
    pub lifecycle: LifecycleConfig,

    /// Listener configuration (bind address, inherited descriptor).
    pub listener: ListenerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Deadline for the shutdown body when no explicit timeout is given.
    pub shutdown_timeout_secs: u64,

    /// Signal that triggers a hot reboot (e.g. "SIGUSR2").
    pub reboot_signal: String,

    /// Send SIGTERM to a non-init parent once a successor is running.
    pub retire_parent: bool,

    /// Install OS signal handlers at all.
    pub signals_enabled: bool,
}

impl LifecycleConfig {
    /// Default shutdown deadline as a [`Duration`].
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout_secs: 20,
            reboot_signal: "SIGUSR2".to_string(),
            retire_parent: true,
            signals_enabled: true,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Descriptor ordinal a predecessor hands the listening socket over at.
    pub inherit_fd: i32,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            inherit_fd: 3,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
