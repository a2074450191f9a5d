//! Connection spawning.
//!
//! # Responsibilities
//! - Open the outbound half of a connection to the fixed target
//! - Pair it with the accepted inbound socket as two transfer workers
//! - Generate unique connection IDs for tracing
//!
//! # Design Decisions
//! - A connection has no object of its own: it is the two workers that
//!   reference the same socket pair in opposite roles
//! - Connect has a deadline; a failure closes the inbound socket and is
//!   reported to the accept loop, which treats it as fatal

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;

use crate::lifecycle::{Shutdown, WorkerRegistry};
use crate::net::socket::DuplexSocket;
use crate::relay::worker::{Direction, TransferSettings, TransferWorker};

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Failed to establish the outbound half of a connection.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("connect to {target} failed: {source}")]
    Connect {
        target: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("connect to {target} timed out after {timeout:?}")]
    ConnectTimeout { target: SocketAddr, timeout: Duration },

    #[error("failed to configure outbound socket to {target}: {source}")]
    Configure {
        target: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// Turns accepted sockets into running connections.
#[derive(Debug, Clone)]
pub struct ConnectionSpawner {
    target: SocketAddr,
    connect_timeout: Duration,
    settings: TransferSettings,
    shutdown: Shutdown,
}

impl ConnectionSpawner {
    pub fn new(
        target: SocketAddr,
        connect_timeout: Duration,
        settings: TransferSettings,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            target,
            connect_timeout,
            settings,
            shutdown,
        }
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Connect to the target and start both transfer workers.
    ///
    /// On failure the inbound socket is closed before returning.
    pub async fn spawn(
        &self,
        inbound: DuplexSocket,
        registry: &mut WorkerRegistry,
    ) -> Result<ConnectionId, SpawnError> {
        let outbound = match self.connect().await {
            Ok(outbound) => outbound,
            Err(e) => {
                inbound.close();
                return Err(e);
            }
        };

        let id = ConnectionId::new();
        tracing::debug!(
            connection_id = %id,
            client = %inbound.peer_addr(),
            target = %outbound.peer_addr(),
            "Connection established"
        );

        let upstream = TransferWorker::new(
            id,
            Direction::ClientToTarget,
            inbound.clone(),
            outbound.clone(),
            self.settings.clone(),
            self.shutdown.clone(),
        );
        let downstream = TransferWorker::new(
            id,
            Direction::TargetToClient,
            outbound,
            inbound,
            self.settings.clone(),
            self.shutdown.clone(),
        );
        registry.register(upstream.run());
        registry.register(downstream.run());

        Ok(id)
    }

    async fn connect(&self) -> Result<DuplexSocket, SpawnError> {
        let target = self.target;
        let stream = match tokio::time::timeout(self.connect_timeout, TcpStream::connect(target)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(SpawnError::Connect { target, source }),
            Err(_) => {
                return Err(SpawnError::ConnectTimeout {
                    target,
                    timeout: self.connect_timeout,
                })
            }
        };
        DuplexSocket::new(stream, target).map_err(|source| SpawnError::Configure { target, source })
    }
}
