//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT, SIGTERM or the configured reboot signal
//! - Dispatch the first one to shutdown or reboot, exactly once
//! - Exit the process with the attempt's exit code
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Signal delivery is a capability ([`SignalSource`]); [`NoSignals`] stands
//!   in where signals are unavailable or disabled
//! - The source is dropped as soon as one signal arrives, so a second
//!   signal during teardown cannot start another attempt

use std::future::Future;

use nix::sys::signal::Signal as NixSignal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::lifecycle::context::Lifecycle;
use crate::lifecycle::status::Outcome;

/// Signals the lifecycle reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleSignal {
    Interrupt,
    Terminate,
    Reboot,
}

/// Something that delivers lifecycle signals.
pub trait SignalSource: Send + 'static {
    /// Wait for the next signal. `None` means no signal will ever arrive.
    fn recv(&mut self) -> impl Future<Output = Option<LifecycleSignal>> + Send;
}

/// POSIX signals via Tokio.
#[cfg(unix)]
#[derive(Debug)]
pub struct UnixSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    reboot: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl UnixSignals {
    /// Register handlers for SIGINT, SIGTERM and `reboot`.
    pub fn install(reboot: NixSignal) -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            reboot: signal(SignalKind::from_raw(reboot as i32))?,
        })
    }
}

#[cfg(unix)]
impl SignalSource for UnixSignals {
    async fn recv(&mut self) -> Option<LifecycleSignal> {
        tokio::select! {
            Some(()) = self.interrupt.recv() => Some(LifecycleSignal::Interrupt),
            Some(()) = self.terminate.recv() => Some(LifecycleSignal::Terminate),
            Some(()) = self.reboot.recv() => Some(LifecycleSignal::Reboot),
            else => None,
        }
    }
}

/// A source that never fires.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSignals;

impl SignalSource for NoSignals {
    async fn recv(&mut self) -> Option<LifecycleSignal> {
        std::future::pending().await
    }
}

/// In-process delivery, e.g. from an admin endpoint.
impl SignalSource for mpsc::Receiver<LifecycleSignal> {
    async fn recv(&mut self) -> Option<LifecycleSignal> {
        mpsc::Receiver::recv(self).await
    }
}

/// Parse a reboot signal name such as `"SIGUSR2"` or `"usr2"`.
///
/// Only signals that do not already mean "stop" are accepted.
pub fn parse_reboot_signal(name: &str) -> Option<NixSignal> {
    let upper = name.trim().to_ascii_uppercase();
    let canonical = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{upper}")
    };

    let signal: NixSignal = canonical.parse().ok()?;
    matches!(
        signal,
        NixSignal::SIGHUP | NixSignal::SIGUSR1 | NixSignal::SIGUSR2
    )
    .then_some(signal)
}

/// Waits for one signal and routes it to shutdown or reboot.
pub struct SignalWatcher<S> {
    lifecycle: Lifecycle,
    source: S,
}

impl<S: SignalSource> SignalWatcher<S> {
    pub fn new(lifecycle: Lifecycle, source: S) -> Self {
        Self { lifecycle, source }
    }

    /// Wait for a signal and run the matching attempt.
    ///
    /// Returns `None` if the source closed without delivering anything.
    pub async fn dispatch(self) -> Option<Outcome> {
        let Self {
            lifecycle,
            mut source,
        } = self;

        let received = source.recv().await;
        drop(source);

        let Some(signal) = received else {
            tracing::debug!("Signal source closed");
            return None;
        };

        tracing::info!(?signal, "Signal received");
        let outcome = match signal {
            LifecycleSignal::Interrupt | LifecycleSignal::Terminate => {
                lifecycle.shutdown(None).await
            }
            LifecycleSignal::Reboot => lifecycle.reboot(None).await,
        };
        Some(outcome)
    }

    /// Run [`SignalWatcher::dispatch`] on its own task, then exit the process.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Some(outcome) = self.dispatch().await {
                let code = outcome.exit_code();
                tracing::info!(attempt = %outcome.kind(), code, "Exiting");
                std::process::exit(code);
            }
        })
    }
}
