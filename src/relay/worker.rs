//! Transfer worker: one direction of one connection.
//!
//! ```text
//! Polling ──ready──▶ Transferring ──n > 0, sent──▶ Polling
//!    │ timeout: re-poll     │ spurious: re-poll
//!    │ shutdown             │ n == 0
//!    ▼                      ▼
//! Closing(EOF) ◀────────────┘
//! Closing(Error) ◀── recv/send failure, send deadline
//! ```
//!
//! On either closing state the worker closes the socket it was reading from
//! and nothing else. Its sibling finds out when its own read of that socket
//! hits EOF, or its own write to it fails.

use std::fmt;
use std::io;
use std::time::Duration;

use crate::config::RelayConfig;
use crate::lifecycle::Shutdown;
use crate::net::connection::ConnectionId;
use crate::net::socket::{CloseOnDrop, DuplexSocket, Readiness};
use crate::observability::metrics;

/// Per-worker timeouts and buffer size.
#[derive(Debug, Clone)]
pub struct TransferSettings {
    /// Read-readiness polling interval; bounds shutdown latency.
    pub wait: Duration,
    /// Deadline for forwarding one block.
    pub send: Duration,
    /// Size of the private transfer buffer.
    pub buffer_bytes: usize,
}

impl TransferSettings {
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            wait: config.timeouts.wait(),
            send: config.timeouts.send(),
            buffer_bytes: config.transfer.buffer_bytes,
        }
    }
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self::from_config(&RelayConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToTarget,
    TargetToClient,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::ClientToTarget => "client_to_target",
            Direction::TargetToClient => "target_to_client",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ClientToTarget => f.write_str("client->target"),
            Direction::TargetToClient => f.write_str("target->client"),
        }
    }
}

/// How a worker ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The source reached end of stream.
    Eof,
    /// Shutdown was requested while polling.
    Cancelled,
    /// A receive or send failed, or a send missed its deadline.
    Failed,
}

/// What a finished worker hands back to the registry.
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub connection: ConnectionId,
    pub direction: Direction,
    pub bytes: u64,
    pub outcome: Outcome,
}

enum State {
    Polling,
    Transferring,
    Closing(Outcome),
}

/// Copies bytes from `source` to `sink` until EOF, error, or shutdown.
pub struct TransferWorker {
    id: ConnectionId,
    direction: Direction,
    source: DuplexSocket,
    sink: DuplexSocket,
    settings: TransferSettings,
    shutdown: Shutdown,
}

impl TransferWorker {
    pub fn new(
        id: ConnectionId,
        direction: Direction,
        source: DuplexSocket,
        sink: DuplexSocket,
        settings: TransferSettings,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            id,
            direction,
            source,
            sink,
            settings,
            shutdown,
        }
    }

    /// Run to completion. Never returns an error: failures end this worker
    /// only and are reported through the log and the returned report.
    pub async fn run(self) -> WorkerReport {
        let TransferWorker {
            id,
            direction,
            source,
            sink,
            settings,
            shutdown,
        } = self;

        let source = CloseOnDrop::new(source);
        let mut buf = vec![0u8; settings.buffer_bytes];
        let mut bytes: u64 = 0;

        let fail = |op: &str, e: io::Error| {
            if is_peer_gone(&e) {
                tracing::debug!(connection_id = %id, direction = %direction, error = %e, "{op}: peer gone");
            } else {
                tracing::error!(connection_id = %id, direction = %direction, error = %e, "{op} failed");
            }
            metrics::record_worker_failure();
            State::Closing(Outcome::Failed)
        };

        let mut state = State::Polling;
        let outcome = loop {
            state = match state {
                State::Polling => {
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => State::Closing(Outcome::Cancelled),
                        readiness = source.wait_readable(settings.wait) => match readiness {
                            Ok(Readiness::Ready) => State::Transferring,
                            Ok(Readiness::TimedOut) => State::Polling,
                            Err(e) => fail("wait", e),
                        },
                    }
                }
                State::Transferring => match source.recv(&mut buf) {
                    Ok(None) => State::Polling,
                    Ok(Some(0)) => State::Closing(Outcome::Eof),
                    Ok(Some(n)) => match sink.send_all(&buf[..n], settings.send).await {
                        Ok(()) => {
                            bytes += n as u64;
                            metrics::record_bytes(direction, n);
                            State::Polling
                        }
                        Err(e) => fail("send", e),
                    },
                    Err(e) => fail("recv", e),
                },
                State::Closing(outcome) => break outcome,
            };
        };

        drop(source);
        tracing::debug!(
            connection_id = %id,
            direction = %direction,
            bytes,
            outcome = ?outcome,
            "Transfer finished"
        );

        WorkerReport {
            connection: id,
            direction,
            bytes,
            outcome,
        }
    }
}

/// Errors that just mean the other end of the connection is already torn down.
fn is_peer_gone(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset | io::ErrorKind::NotConnected
    )
}
