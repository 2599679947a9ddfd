//! TCP listener that survives a hot reboot.
//!
//! # Responsibilities
//! - Adopt a listening socket handed over by a predecessor at the agreed
//!   descriptor ordinal
//! - Otherwise bind to the configured address
//! - Expose the descriptor so it can be registered for the next reboot
//!
//! # Design Decisions
//! - A descriptor is only adopted if it is open and `SO_ACCEPTCONN` says it
//!   is listening; anything else at that number is left alone
//! - The adopted descriptor gets close-on-exec back, the registry hands it
//!   over explicitly on the next reboot

use std::io;
use std::net::SocketAddr;
use std::os::fd::{AsFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};

use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use nix::sys::socket::{getsockopt, sockopt};
use tokio::net::TcpListener;

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    Bind(#[source] io::Error),
    /// Failed to adopt an inherited socket.
    #[error("Failed to adopt inherited descriptor {fd}: {source}")]
    Inherit {
        fd: RawFd,
        #[source]
        source: io::Error,
    },
}

/// Where the listening socket came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerOrigin {
    /// Bound by this process.
    Bound,
    /// Inherited from a predecessor at this descriptor number.
    Inherited(RawFd),
}

/// A listening socket plus its origin.
#[derive(Debug)]
pub struct Listener {
    /// The underlying TCP listener.
    inner: TcpListener,
    origin: ListenerOrigin,
}

impl Listener {
    /// Adopt the inherited socket if there is one, else bind.
    pub async fn bind_or_inherit(config: &ListenerConfig) -> Result<Self, ListenerError> {
        if let Some(fd) = take_inherited(config.inherit_fd) {
            return Self::adopt(config.inherit_fd, fd);
        }
        Self::bind(config).await
    }

    /// Bind to the configured address.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr: SocketAddr = config
            .bind_address
            .parse()
            .map_err(|e| ListenerError::Bind(io::Error::new(io::ErrorKind::InvalidInput, e)))?;

        let inner = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;
        let local_addr = inner.local_addr().map_err(ListenerError::Bind)?;

        tracing::info!(address = %local_addr, "Listener bound");

        Ok(Self {
            inner,
            origin: ListenerOrigin::Bound,
        })
    }

    fn adopt(raw: RawFd, fd: OwnedFd) -> Result<Self, ListenerError> {
        let inherit_err = |source| ListenerError::Inherit { fd: raw, source };

        fcntl(raw, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))
            .map_err(|e| inherit_err(io::Error::from(e)))?;

        let std_listener = std::net::TcpListener::from(fd);
        std_listener.set_nonblocking(true).map_err(inherit_err)?;
        let inner = TcpListener::from_std(std_listener).map_err(inherit_err)?;
        let local_addr = inner.local_addr().map_err(inherit_err)?;

        tracing::info!(address = %local_addr, fd = raw, "Listener inherited from predecessor");

        Ok(Self {
            inner,
            origin: ListenerOrigin::Inherited(raw),
        })
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, io::Error> {
        self.inner.local_addr()
    }

    pub fn origin(&self) -> ListenerOrigin {
        self.origin
    }

    /// Hand the socket to the server.
    pub fn into_inner(self) -> TcpListener {
        self.inner
    }
}

impl AsFd for Listener {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.inner.as_fd()
    }
}

/// Take ownership of `fd` if it is an open listening socket.
fn take_inherited(fd: RawFd) -> Option<OwnedFd> {
    if fcntl(fd, FcntlArg::F_GETFD).is_err() {
        return None;
    }

    // SAFETY: F_GETFD just confirmed the descriptor is open; the borrow
    // does not outlive this check.
    let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
    if !getsockopt(&borrowed, sockopt::AcceptConn).unwrap_or(false) {
        tracing::debug!(fd, "Descriptor is open but not a listening socket; ignoring");
        return None;
    }

    // SAFETY: the descriptor was handed over at startup by a predecessor and
    // nothing else in this process has claimed it.
    Some(unsafe { OwnedFd::from_raw_fd(fd) })
}
