//! Hot reboot orchestration.
//!
//! # State Transitions
//! ```text
//! Idle → PreClose:            reboot requested
//! PreClose → Spawning:        hook ran (failure only degrades)
//! Spawning → ShuttingDownOld: always, whether or not the successor started
//! ShuttingDownOld → Done:     teardown finished or deadline elapsed
//! ```
//!
//! # Design Decisions
//! - Fork then free: the successor is started before the current process
//!   releases anything, and a failed spawn never skips teardown
//! - A supervising predecessor (non-init parent) gets SIGTERM once a
//!   successor exists; the parent is looked up at that moment, since an
//!   earlier one may have exited and left us to init
//! - The caller turns a missing successor into a non-zero exit code

use nix::sys::signal::{kill, Signal};
use nix::unistd::{getppid, Pid};

use crate::lifecycle::coordinator::ShutdownCoordinator;
use crate::lifecycle::error::LifecycleError;
use crate::lifecycle::launcher::{ProcessImage, ProcessLauncher};
use crate::lifecycle::registry::ProcessFileSet;
use crate::lifecycle::status::{AttemptKind, Outcome, Status};

/// Phases of a reboot attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebootPhase {
    Idle,
    PreClose,
    Spawning,
    ShuttingDownOld,
    Done,
}

/// Which process, if any, is sent SIGTERM after a successful reboot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentRetirement {
    /// Never signal anyone.
    Disabled,
    /// The parent at retirement time, skipped when it is init.
    Current,
    /// A fixed pid.
    Fixed(Pid),
}

impl ParentRetirement {
    pub(crate) fn target(self) -> Option<Pid> {
        match self {
            ParentRetirement::Disabled => None,
            ParentRetirement::Current => current_parent(),
            ParentRetirement::Fixed(pid) => Some(pid),
        }
    }
}

/// The parent pid, unless init adopted us.
fn current_parent() -> Option<Pid> {
    let ppid = getppid();
    (ppid != Pid::from_raw(1)).then_some(ppid)
}

pub(crate) struct RebootOrchestrator<'a> {
    pub(crate) coordinator: ShutdownCoordinator<'a>,
    pub(crate) image: &'a ProcessImage,
    pub(crate) files: ProcessFileSet,
    pub(crate) parent: ParentRetirement,
}

impl RebootOrchestrator<'_> {
    pub(crate) async fn run(self) -> Outcome {
        let Self {
            coordinator,
            image,
            files,
            parent,
        } = self;

        tracing::info!(
            phase = ?RebootPhase::Idle,
            timeout = ?coordinator.timeout,
            inherited = files.len(),
            "Rebooting process"
        );

        enter(RebootPhase::PreClose);
        let status = coordinator.pre_close(Status::new()).await;

        enter(RebootPhase::Spawning);
        let status = match ProcessLauncher::new(image).start(files) {
            Ok(pid) => status.with_successor(pid),
            Err(e) => {
                tracing::error!(error = %e, "Failed to start successor process");
                status.degrade(e.into())
            }
        };

        enter(RebootPhase::ShuttingDownOld);
        let status = coordinator.teardown(status).await;

        let status = match status.successor().and(parent.target()) {
            Some(parent) => retire_parent(parent, status),
            None => status,
        };

        enter(RebootPhase::Done);
        report(&status);

        Outcome::Completed {
            kind: AttemptKind::Reboot,
            status,
        }
    }
}

fn enter(phase: RebootPhase) {
    tracing::debug!(?phase, "Reboot phase");
}

/// Send SIGTERM to the process that started us.
fn retire_parent(parent: Pid, status: Status) -> Status {
    match kill(parent, Signal::SIGTERM) {
        Ok(()) => {
            tracing::info!(ppid = parent.as_raw(), "Sent SIGTERM to parent process");
            status
        }
        Err(e) => {
            tracing::error!(ppid = parent.as_raw(), error = %e, "Failed to retire parent process");
            status.degrade(LifecycleError::SignalFailure {
                pid: parent.as_raw(),
                source: e,
            })
        }
    }
}

fn report(status: &Status) {
    match (status.successor(), status.is_graceful()) {
        (Some(pid), true) => tracing::info!(successor = pid, "Process rebooted gracefully"),
        (Some(pid), false) => tracing::warn!(
            successor = pid,
            degradations = status.degradations().len(),
            "Process rebooted, but not gracefully"
        ),
        (None, true) => tracing::error!("Process reboot failed, but shut down gracefully"),
        (None, false) => {
            tracing::error!("Process reboot failed, and did not shut down gracefully")
        }
    }
}
