//! Lifecycle error taxonomy.
//!
//! Only [`LifecycleError::SpawnFailure`] changes the exit code of a
//! signal-driven attempt. Every other variant downgrades the attempt to
//! "not graceful" and is otherwise only logged.

use std::ffi::OsString;
use std::time::Duration;

/// Boxed error returned by user callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a successor process could not be started.
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("argument vector is empty")]
    EmptyArgv,
    #[error("executable {0:?} could not be resolved")]
    Unresolved(OsString),
    #[error("failed to stage inherited descriptor: {0}")]
    Descriptor(#[source] nix::Error),
    #[error("failed to spawn successor: {0}")]
    Spawn(#[source] std::io::Error),
}

/// A degradation recorded while shutting down or rebooting.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("pre-close hook failed: {0}")]
    HookFailure(#[source] BoxError),
    #[error(transparent)]
    SpawnFailure(#[from] SpawnError),
    #[error("failed to signal parent process {pid}: {source}")]
    SignalFailure {
        pid: i32,
        #[source]
        source: nix::Error,
    },
    #[error("shutdown did not finish within {0:?}")]
    ShutdownTimeout(Duration),
}

impl LifecycleError {
    /// Short label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            LifecycleError::HookFailure(_) => "hook_failure",
            LifecycleError::SpawnFailure(_) => "spawn_failure",
            LifecycleError::SignalFailure { .. } => "signal_failure",
            LifecycleError::ShutdownTimeout(_) => "shutdown_timeout",
        }
    }
}
