//! Process-wide lifecycle context.
//!
//! [`Lifecycle`] is built once at process start and cloned into whatever
//! task ends up handling a signal. It owns everything a shutdown or reboot
//! attempt touches: the recorded process image, the parent retirement
//! policy, the descriptor registry, the pre-close hook and the shutdown
//! broadcast.

use std::future::Future;
use std::io;
use std::os::fd::{AsFd, RawFd};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::LifecycleConfig;
use crate::lifecycle::coordinator::{PreCloseHook, ShutdownCoordinator};
use crate::lifecycle::drain::WorkTracker;
use crate::lifecycle::error::BoxError;
use crate::lifecycle::launcher::ProcessImage;
use crate::lifecycle::reboot::{ParentRetirement, RebootOrchestrator};
use crate::lifecycle::registry::ProcessFileSet;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::{parse_reboot_signal, NoSignals, SignalWatcher, UnixSignals};
use crate::lifecycle::status::{AttemptKind, Outcome};
use crate::observability::metrics;

struct Inner {
    config: LifecycleConfig,
    image: ProcessImage,
    parent: ParentRetirement,
    files: Mutex<ProcessFileSet>,
    hook: Mutex<Option<PreCloseHook>>,
    shutdown: Shutdown,
    work: WorkTracker,
    /// Set by the first shutdown or reboot; later requests are skipped.
    engaged: AtomicBool,
}

/// Handle to the lifecycle of this process.
#[derive(Clone)]
pub struct Lifecycle {
    inner: Arc<Inner>,
}

impl Lifecycle {
    /// Capture argv and working directory of the current process.
    ///
    /// With `retire_parent` set, whichever process is the parent when a
    /// reboot finishes gets SIGTERM.
    pub fn new(config: LifecycleConfig) -> io::Result<Self> {
        let image = ProcessImage::capture()?;
        let parent = if config.retire_parent {
            ParentRetirement::Current
        } else {
            ParentRetirement::Disabled
        };
        Ok(Self::with_image(config, image, parent))
    }

    /// Build from an explicit image and parent retirement policy.
    pub fn with_image(
        config: LifecycleConfig,
        image: ProcessImage,
        parent: ParentRetirement,
    ) -> Self {
        tracing::debug!(
            argv = ?image.argv(),
            working_dir = %image.working_dir().display(),
            parent = ?parent,
            "Lifecycle context created"
        );
        Self {
            inner: Arc::new(Inner {
                config,
                image,
                parent,
                files: Mutex::new(ProcessFileSet::new()),
                hook: Mutex::new(None),
                shutdown: Shutdown::new(),
                work: WorkTracker::new(),
                engaged: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.inner.config
    }

    pub fn image(&self) -> &ProcessImage {
        &self.inner.image
    }

    /// Working directory recorded at startup; successors start here.
    pub fn original_working_dir(&self) -> &Path {
        self.inner.image.working_dir()
    }

    /// Install the callback run before any teardown, replacing a previous one.
    pub fn set_pre_close_hook<F, Fut, E>(&self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        let hook: PreCloseHook = Arc::new(move || {
            let fut = hook();
            async move { fut.await.map_err(Into::<BoxError>::into) }.boxed()
        });
        *self.inner.hook.lock().unwrap_or_else(PoisonError::into_inner) = Some(hook);
    }

    /// Register descriptors (listening sockets) that must survive a reboot.
    ///
    /// Already registered descriptors and stdio are ignored. Returns how
    /// many were added. The successor finds them at 3, 4, ... in
    /// registration order.
    pub fn set_extract_proc_files<I>(&self, fds: I) -> io::Result<usize>
    where
        I: IntoIterator,
        I::Item: AsFd,
    {
        self.inner
            .files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(fds)
    }

    /// Descriptor numbers a successor would inherit, stdio first.
    pub fn proc_files(&self) -> Vec<RawFd> {
        self.inner
            .files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .identities()
    }

    /// Subscribe a service to the shutdown broadcast.
    ///
    /// Hold the receiver until the service has stopped; teardown waits for
    /// every receiver to be dropped.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.inner.shutdown.subscribe()
    }

    /// Whether teardown has started.
    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutdown.is_triggered()
    }

    /// Tracker for in-flight work that teardown drains.
    pub fn work(&self) -> &WorkTracker {
        &self.inner.work
    }

    /// Gracefully shut the process down within `timeout`.
    ///
    /// Does not exit; the caller (normally the signal watcher) decides.
    pub async fn shutdown(&self, timeout: Option<Duration>) -> Outcome {
        let kind = AttemptKind::Shutdown;
        if !self.engage(kind) {
            return Outcome::Skipped { kind };
        }

        let started = tokio::time::Instant::now();
        let outcome = self.coordinator(kind, timeout).run().await;
        metrics::record_outcome(&outcome, started.elapsed());
        outcome
    }

    /// Start a successor with the registered descriptors, then shut down.
    ///
    /// The successor receives the original argv, the current environment
    /// and the startup working directory. Teardown runs even if the
    /// successor could not be started.
    pub async fn reboot(&self, timeout: Option<Duration>) -> Outcome {
        let kind = AttemptKind::Reboot;
        if !self.engage(kind) {
            return Outcome::Skipped { kind };
        }

        let files = std::mem::take(
            &mut *self
                .inner
                .files
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );

        let started = tokio::time::Instant::now();
        let outcome = RebootOrchestrator {
            coordinator: self.coordinator(kind, timeout),
            image: &self.inner.image,
            files,
            parent: self.inner.parent,
        }
        .run()
        .await;
        metrics::record_outcome(&outcome, started.elapsed());
        outcome
    }

    /// Spawn the signal watcher task.
    ///
    /// After a signal has been handled the task exits the process. With
    /// `signals_enabled = false` the watcher never fires.
    pub fn watch_signals(&self) -> io::Result<JoinHandle<()>> {
        if !self.inner.config.signals_enabled {
            tracing::warn!("Signal handling disabled; shutdown and reboot only run when called");
            return Ok(SignalWatcher::new(self.clone(), NoSignals).spawn());
        }

        let reboot = parse_reboot_signal(&self.inner.config.reboot_signal).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsupported reboot signal {:?}", self.inner.config.reboot_signal),
            )
        })?;
        let source = UnixSignals::install(reboot)?;

        tracing::info!(reboot_signal = reboot.as_str(), "Signal watcher armed");
        Ok(SignalWatcher::new(self.clone(), source).spawn())
    }

    fn engage(&self, kind: AttemptKind) -> bool {
        let first = !self.inner.engaged.swap(true, Ordering::SeqCst);
        if !first {
            tracing::warn!(attempt = %kind, "Lifecycle attempt already in progress; ignoring");
        }
        first
    }

    fn coordinator(&self, kind: AttemptKind, timeout: Option<Duration>) -> ShutdownCoordinator<'_> {
        let hook = self
            .inner
            .hook
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        ShutdownCoordinator::new(
            hook,
            &self.inner.shutdown,
            &self.inner.work,
            timeout.unwrap_or_else(|| self.inner.config.shutdown_timeout()),
            kind,
        )
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("image", &self.inner.image)
            .field("parent", &self.inner.parent)
            .field("proc_files", &self.proc_files())
            .field("engaged", &self.inner.engaged.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::sync::atomic::AtomicUsize;

    fn lifecycle(argv: &[&str]) -> Lifecycle {
        Lifecycle::with_image(
            LifecycleConfig {
                shutdown_timeout_secs: 2,
                retire_parent: false,
                ..Default::default()
            },
            ProcessImage::new(argv.iter().copied(), "/"),
            ParentRetirement::Disabled,
        )
    }

    #[test]
    fn registry_is_idempotent() {
        let lifecycle = lifecycle(&["/bin/true"]);
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();

        assert_eq!(lifecycle.set_extract_proc_files([listener.as_fd()]).unwrap(), 1);
        for _ in 0..3 {
            assert_eq!(lifecycle.set_extract_proc_files([listener.as_fd()]).unwrap(), 0);
        }
        assert_eq!(
            lifecycle.proc_files(),
            vec![0, 1, 2, std::os::fd::AsRawFd::as_raw_fd(&listener)]
        );
    }

    #[tokio::test]
    async fn second_attempt_is_skipped() {
        let lifecycle = lifecycle(&["/bin/true"]);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        lifecycle.set_pre_close_hook(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), io::Error>(())
            }
        });

        let first = lifecycle.shutdown(None).await;
        let second = lifecycle.shutdown(None).await;
        let third = lifecycle.reboot(None).await;

        assert!(first.state().unwrap().graceful);
        assert!(matches!(second, Outcome::Skipped { kind: AttemptKind::Shutdown }));
        assert!(matches!(third, Outcome::Skipped { kind: AttemptKind::Reboot }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(lifecycle.is_shutting_down());
    }

    #[tokio::test]
    async fn failing_hook_marks_shutdown_not_graceful() {
        let lifecycle = lifecycle(&["/bin/true"]);
        lifecycle.set_pre_close_hook(|| async {
            Err(io::Error::new(io::ErrorKind::Other, "drain failed"))
        });

        let outcome = lifecycle.shutdown(Some(Duration::from_millis(500))).await;
        let state = outcome.state().unwrap();
        assert!(!state.graceful);
        assert!(!state.rebooted);
        assert_eq!(outcome.exit_code(), 0);
    }

    #[tokio::test]
    async fn hung_hook_does_not_block_shutdown() {
        let lifecycle = lifecycle(&["/bin/true"]);
        lifecycle.set_pre_close_hook(|| std::future::pending::<Result<(), io::Error>>());

        let outcome = tokio::time::timeout(
            Duration::from_secs(3),
            lifecycle.shutdown(Some(Duration::from_millis(200))),
        )
        .await
        .expect("shutdown must finish once the deadline passes");

        assert!(lifecycle.is_shutting_down());
        assert!(!outcome.state().unwrap().graceful);
    }

    #[tokio::test]
    async fn reboot_consumes_registered_descriptors() {
        let lifecycle = lifecycle(&["/bin/sh", "-c", "exit 0"]);
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        lifecycle.set_extract_proc_files([listener.as_fd()]).unwrap();

        let outcome = lifecycle.reboot(Some(Duration::from_secs(1))).await;
        assert!(outcome.state().unwrap().rebooted);
        assert_eq!(lifecycle.proc_files(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn in_flight_work_delays_shutdown() {
        let lifecycle = lifecycle(&["/bin/true"]);
        let guard = lifecycle.work().track();

        let releaser = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            drop(guard);
        });

        let outcome = lifecycle.shutdown(Some(Duration::from_secs(2))).await;
        releaser.await.unwrap();
        assert!(outcome.state().unwrap().graceful);
        assert_eq!(lifecycle.work().active_count(), 0);
    }
}
