//! Attempt status threaded through the shutdown and reboot phases.
//!
//! Each phase takes the [`Status`] by value and hands back a possibly
//! degraded one. Nothing short-circuits: a failure is recorded and the
//! next phase still runs.

use std::fmt;

use crate::lifecycle::error::LifecycleError;

/// Exit code used when a reboot could not start its successor.
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 255;

/// What kind of attempt produced an [`Outcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptKind {
    Shutdown,
    Reboot,
}

impl AttemptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptKind::Shutdown => "shutdown",
            AttemptKind::Reboot => "reboot",
        }
    }
}

impl fmt::Display for AttemptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary flags of a finished attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownState {
    /// Hook, teardown and parent retirement all succeeded in time.
    pub graceful: bool,
    /// A successor process was started.
    pub rebooted: bool,
}

/// Accumulated degradations of one attempt.
#[derive(Debug, Default)]
pub struct Status {
    degradations: Vec<LifecycleError>,
    successor: Option<u32>,
}

impl Status {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a degradation and keep going.
    pub fn degrade(mut self, error: LifecycleError) -> Self {
        self.degradations.push(error);
        self
    }

    /// Record the pid of a started successor.
    pub fn with_successor(mut self, pid: u32) -> Self {
        self.successor = Some(pid);
        self
    }

    /// True when nothing but a spawn failure was recorded.
    ///
    /// A failed spawn is reported through [`Status::successor`] instead.
    pub fn is_graceful(&self) -> bool {
        self.degradations
            .iter()
            .all(|e| matches!(e, LifecycleError::SpawnFailure(_)))
    }

    pub fn successor(&self) -> Option<u32> {
        self.successor
    }

    pub fn degradations(&self) -> &[LifecycleError] {
        &self.degradations
    }
}

/// Result of a shutdown or reboot request.
#[derive(Debug)]
pub enum Outcome {
    /// The attempt ran to completion, possibly degraded.
    Completed { kind: AttemptKind, status: Status },
    /// Another attempt already owns this process; nothing was done.
    Skipped { kind: AttemptKind },
}

impl Outcome {
    pub fn kind(&self) -> AttemptKind {
        match self {
            Outcome::Completed { kind, .. } | Outcome::Skipped { kind } => *kind,
        }
    }

    pub fn status(&self) -> Option<&Status> {
        match self {
            Outcome::Completed { status, .. } => Some(status),
            Outcome::Skipped { .. } => None,
        }
    }

    /// Flags of a completed attempt, `None` when skipped.
    pub fn state(&self) -> Option<ShutdownState> {
        let status = self.status()?;
        Some(ShutdownState {
            graceful: status.is_graceful(),
            rebooted: status.successor().is_some(),
        })
    }

    /// Process exit code for a signal-driven attempt.
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Completed {
                kind: AttemptKind::Reboot,
                status,
            } if status.successor().is_none() => SPAWN_FAILURE_EXIT_CODE,
            _ => 0,
        }
    }
}
