//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (coordinator.rs):
//!     SIGINT/SIGTERM → pre-close hook → broadcast stop → drain work → exit 0
//!
//! Reboot (reboot.rs):
//!     reboot signal → pre-close hook → launcher.rs starts successor with
//!     registry.rs descriptors → broadcast stop → drain work → retire parent
//!     → exit 0 (255 if no successor could be started)
//!
//! Signals (signals.rs):
//!     first signal wins; the watcher stops listening before dispatching
//! ```
//!
//! # Design Decisions
//! - All process-wide state lives in one [`Lifecycle`] handle
//! - Failures degrade an accumulating [`Status`] instead of aborting
//! - Shutdown has timeout: the process proceeds after the deadline
//! - Teardown runs even when the successor failed to start

pub mod context;
pub mod coordinator;
pub mod drain;
pub mod error;
pub mod launcher;
pub mod reboot;
pub mod registry;
pub mod shutdown;
pub mod signals;
pub mod status;

pub use context::Lifecycle;
pub use coordinator::PreCloseHook;
pub use drain::{WorkGuard, WorkTracker};
pub use error::{BoxError, LifecycleError, SpawnError};
pub use launcher::{ProcessImage, ProcessLauncher};
pub use reboot::ParentRetirement;
pub use registry::ProcessFileSet;
pub use shutdown::Shutdown;
pub use signals::{LifecycleSignal, NoSignals, SignalSource, SignalWatcher};
#[cfg(unix)]
pub use signals::UnixSignals;
pub use status::{AttemptKind, Outcome, ShutdownState, Status, SPAWN_FAILURE_EXIT_CODE};
