//! Descriptors preserved across a reboot.
//!
//! # Responsibilities
//! - Keep stdio plus every registered extra descriptor, in registration order
//! - Ignore repeated registrations of the same open file
//! - Own a private duplicate of each extra descriptor until a launch consumes it
//!
//! # Design Decisions
//! - Identity is the open file (device and inode), not the descriptor
//!   number: a number the caller closed and reused for a new socket
//!   registers the new socket, and a `dup` of a registered socket is a
//!   repeat
//! - The set only grows; a launch takes the whole set by value and closes
//!   the duplicates once the successor has been started

use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};

use nix::sys::stat::fstat;

/// Descriptor numbers always handed to a successor.
pub const STDIO_FDS: [RawFd; 3] = [0, 1, 2];

/// Ordinal of the first extra descriptor in the successor.
pub const FIRST_EXTRA_FD: RawFd = 3;

/// Device and inode of an open file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileKey {
    dev: u64,
    ino: u64,
}

impl FileKey {
    fn of(fd: BorrowedFd<'_>) -> io::Result<Self> {
        let stat = fstat(fd.as_raw_fd()).map_err(io::Error::from)?;
        Ok(Self {
            dev: stat.st_dev as u64,
            ino: stat.st_ino as u64,
        })
    }
}

#[derive(Debug)]
struct Inherited {
    /// Number the caller registered, for reporting.
    identity: RawFd,
    key: FileKey,
    fd: OwnedFd,
}

/// Ordered set of descriptors a successor inherits.
#[derive(Debug, Default)]
pub struct ProcessFileSet {
    extra: Vec<Inherited>,
}

impl ProcessFileSet {
    /// A set holding only stdio.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `fd` is stdio or refers to an already registered file.
    pub fn contains(&self, fd: BorrowedFd<'_>) -> io::Result<bool> {
        if STDIO_FDS.contains(&fd.as_raw_fd()) {
            return Ok(true);
        }
        let key = FileKey::of(fd)?;
        Ok(self.extra.iter().any(|f| f.key == key))
    }

    /// Append a descriptor unless its file is already present.
    ///
    /// Returns `Ok(true)` when the descriptor was added.
    pub fn register(&mut self, fd: BorrowedFd<'_>) -> io::Result<bool> {
        let identity = fd.as_raw_fd();
        if STDIO_FDS.contains(&identity) {
            return Ok(false);
        }
        let key = FileKey::of(fd)?;
        if self.extra.iter().any(|f| f.key == key) {
            return Ok(false);
        }

        let owned = fd.try_clone_to_owned()?;
        tracing::debug!(
            fd = identity,
            ordinal = FIRST_EXTRA_FD + self.extra.len() as RawFd,
            "Descriptor registered for reboot"
        );
        self.extra.push(Inherited {
            identity,
            key,
            fd: owned,
        });
        Ok(true)
    }

    /// Register several descriptors, returning how many were new.
    pub fn extend<I>(&mut self, fds: I) -> io::Result<usize>
    where
        I: IntoIterator,
        I::Item: AsFd,
    {
        let mut added = 0;
        for fd in fds {
            if self.register(fd.as_fd())? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Registered descriptor numbers in successor order, stdio first.
    pub fn identities(&self) -> Vec<RawFd> {
        STDIO_FDS
            .iter()
            .copied()
            .chain(self.extra.iter().map(|f| f.identity))
            .collect()
    }

    /// Total number of descriptors, stdio included.
    pub fn len(&self) -> usize {
        STDIO_FDS.len() + self.extra.len()
    }

    /// Always false: stdio is always present.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Number of descriptors beyond stdio.
    pub fn extra_len(&self) -> usize {
        self.extra.len()
    }

    /// Give up the owned duplicates, in order.
    pub(crate) fn into_extra(self) -> Vec<OwnedFd> {
        self.extra.into_iter().map(|f| f.fd).collect()
    }
}
