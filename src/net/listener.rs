//! TCP listener implementation.
//!
//! # Responsibilities
//! - Bind to the configured IPv4 address and port
//! - Accept incoming TCP connections with a bounded wait
//! - Configure accepted sockets for low-latency relaying
//!
//! # Design Decisions
//! - An accept timeout is a result value, not an error; the accept loop
//!   uses it to poll for shutdown and reap finished workers
//! - A client that resets between the handshake and our first syscall costs
//!   that connection only: it is logged and reported as `Dropped`
//! - No connection cap: the fail-fast spawn policy is the only valve

use std::io;
use std::net::{AddrParseError, Ipv4Addr, SocketAddr};
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::net::socket::DuplexSocket;

/// Failed to set up the listening socket.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("invalid bind address {address:?}: {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: AddrParseError,
    },

    #[error("failed to bind {addr}: {source}")]
    Io {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// The listening socket itself failed.
#[derive(Debug, Error)]
pub enum AcceptError {
    #[error("failed to accept: {0}")]
    Accept(#[source] io::Error),
}

/// Outcome of one bounded accept attempt.
#[derive(Debug)]
pub enum Accepted {
    Connection(DuplexSocket),
    TimedOut,
    /// A pending connection failed before it could be used.
    Dropped,
}

/// A bound TCP listener with a fixed accept timeout.
pub struct Listener {
    inner: TcpListener,
    accept_timeout: Duration,
}

impl Listener {
    /// Bind to `address:port`. Port 0 picks an ephemeral port.
    pub async fn bind(address: &str, port: u16, accept_timeout: Duration) -> Result<Self, BindError> {
        let ip: Ipv4Addr = address.parse().map_err(|source| BindError::InvalidAddress {
            address: address.to_string(),
            source,
        })?;
        let addr = SocketAddr::from((ip, port));

        let inner = TcpListener::bind(addr)
            .await
            .map_err(|source| BindError::Io { addr, source })?;

        let local_addr = inner
            .local_addr()
            .map_err(|source| BindError::Io { addr, source })?;

        tracing::info!(address = %local_addr, "Listener bound");

        Ok(Self {
            inner,
            accept_timeout,
        })
    }

    /// Accept one connection, waiting at most the accept timeout.
    ///
    /// The returned socket already has Nagle's algorithm disabled. Errors
    /// that concern a single pending connection come back as
    /// `Accepted::Dropped`; only a failure of the listener is an `Err`.
    pub async fn accept(&self) -> Result<Accepted, AcceptError> {
        let (stream, peer) = match tokio::time::timeout(self.accept_timeout, self.inner.accept()).await {
            Err(_) => return Ok(Accepted::TimedOut),
            Ok(Ok(accepted)) => accepted,
            Ok(Err(e)) if is_connection_error(&e) => {
                tracing::debug!(error = %e, "Pending connection failed before accept");
                return Ok(Accepted::Dropped);
            }
            Ok(Err(e)) => return Err(AcceptError::Accept(e)),
        };

        let socket = match DuplexSocket::new(stream, peer) {
            Ok(socket) => socket,
            Err(e) => {
                tracing::warn!(peer_addr = %peer, error = %e, "Dropping inbound connection");
                return Ok(Accepted::Dropped);
            }
        };

        tracing::debug!(peer_addr = %peer, "Connection accepted");

        Ok(Accepted::Connection(socket))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, io::Error> {
        self.inner.local_addr()
    }
}

/// Accept errors that belong to the pending connection, not the listener.
fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
    )
}
