//! Successor process launcher.
//!
//! # Responsibilities
//! - Resolve the executable from the original `argv[0]` at reboot time
//! - Start the successor with the original argv, the current environment
//!   and the working directory recorded at startup
//! - Install the preserved descriptors at ordinals 0, 1, 2, 3, ...
//!
//! # Design Decisions
//! - Resolution never canonicalises, so a re-pointed symlink picks up the
//!   newly deployed binary
//! - Extra descriptors are first copied above the target range, then
//!   `dup2`'d into place in the child before exec; targets can never clobber
//!   a source that is still needed
//! - The launcher owns the descriptor set for the call and closes its copies
//!   whether or not the spawn succeeded

use std::env;
use std::ffi::{OsStr, OsString};
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use nix::fcntl::{fcntl, FcntlArg};
use nix::unistd::dup2;

use crate::lifecycle::error::SpawnError;
use crate::lifecycle::registry::{ProcessFileSet, FIRST_EXTRA_FD};

/// How this process was originally started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessImage {
    argv: Vec<OsString>,
    working_dir: PathBuf,
}

impl ProcessImage {
    /// Record the current argv and working directory.
    pub fn capture() -> io::Result<Self> {
        Ok(Self {
            argv: env::args_os().collect(),
            working_dir: env::current_dir()?,
        })
    }

    pub fn new<I, S>(argv: I, working_dir: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            working_dir: working_dir.into(),
        }
    }

    pub fn argv(&self) -> &[OsString] {
        &self.argv
    }

    /// Working directory at startup.
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }
}

/// Find the executable `argv0` refers to.
///
/// Names containing a slash are taken as paths (relative ones against
/// `working_dir`); bare names are searched for on `PATH`.
pub fn resolve_executable(argv0: &OsStr, working_dir: &Path) -> Result<PathBuf, SpawnError> {
    if argv0.is_empty() {
        return Err(SpawnError::Unresolved(argv0.to_os_string()));
    }

    if argv0.as_bytes().contains(&b'/') {
        let candidate = working_dir.join(argv0);
        return if is_executable(&candidate) {
            Ok(candidate)
        } else {
            Err(SpawnError::Unresolved(argv0.to_os_string()))
        };
    }

    let search = env::var_os("PATH").unwrap_or_default();
    env::split_paths(&search)
        .map(|dir| {
            // An empty PATH entry means the current directory.
            let dir = if dir.as_os_str().is_empty() {
                PathBuf::from(".")
            } else {
                dir
            };
            working_dir.join(dir).join(argv0)
        })
        .find(|candidate| is_executable(candidate))
        .ok_or_else(|| SpawnError::Unresolved(argv0.to_os_string()))
}

fn is_executable(path: &Path) -> bool {
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Starts successor processes from a [`ProcessImage`].
#[derive(Debug, Clone, Copy)]
pub struct ProcessLauncher<'a> {
    image: &'a ProcessImage,
}

impl<'a> ProcessLauncher<'a> {
    pub fn new(image: &'a ProcessImage) -> Self {
        Self { image }
    }

    /// Start a successor that inherits `files`. Returns its pid.
    pub fn start(&self, files: ProcessFileSet) -> Result<u32, SpawnError> {
        let extra = files.into_extra();

        let (argv0, args) = self.image.argv.split_first().ok_or(SpawnError::EmptyArgv)?;
        let path = resolve_executable(argv0, &self.image.working_dir)?;

        let staged = stage(&extra)?;
        let plan: Vec<(RawFd, RawFd)> = staged
            .iter()
            .enumerate()
            .map(|(i, fd)| (fd.as_raw_fd(), FIRST_EXTRA_FD + i as RawFd))
            .collect();

        let mut command = Command::new(&path);
        command
            .arg0(argv0)
            .args(args)
            .current_dir(&self.image.working_dir);

        // SAFETY: the closure runs between fork and exec and only calls
        // dup2, which is async-signal-safe. It does not allocate.
        unsafe {
            command.pre_exec(move || {
                for &(from, to) in &plan {
                    dup2(from, to).map_err(io::Error::from)?;
                }
                Ok(())
            });
        }

        let child = command.spawn().map_err(SpawnError::Spawn)?;
        let pid = child.id();

        tracing::info!(
            pid,
            executable = %path.display(),
            working_dir = %self.image.working_dir.display(),
            inherited = extra.len() + 3,
            "Successor process started"
        );
        Ok(pid)
    }
}

/// Copy each descriptor to a number above every target ordinal.
fn stage(extra: &[OwnedFd]) -> Result<Vec<OwnedFd>, SpawnError> {
    let floor = FIRST_EXTRA_FD + extra.len() as RawFd;
    extra
        .iter()
        .map(|fd| {
            let raw = fcntl(fd.as_raw_fd(), FcntlArg::F_DUPFD_CLOEXEC(floor))
                .map_err(SpawnError::Descriptor)?;
            // SAFETY: fcntl just returned a fresh descriptor nobody else owns.
            Ok(unsafe { OwnedFd::from_raw_fd(raw) })
        })
        .collect()
}
