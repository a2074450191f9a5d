//! The accept loop.
//!
//! # Responsibilities
//! - Bind the listener
//! - Accept inbound connections, reaping finished workers every iteration
//! - Hand each connection to the spawner
//! - On exit: request shutdown, then drain every worker
//!
//! # Design Decisions
//! - Fail fast: a connection whose outbound half cannot be established stops
//!   the whole relay. An unreachable target or exhausted resources are
//!   treated as systemic, not as a per-connection anomaly
//! - Accept waits are bounded so shutdown is noticed within one interval
//! - A single client that fails during accept is dropped; only a failure of
//!   the listening socket itself is fatal

use std::net::{AddrParseError, Ipv4Addr, SocketAddr};

use thiserror::Error;

use crate::config::RelayConfig;
use crate::lifecycle::{Shutdown, WorkerRegistry};
use crate::net::connection::{ConnectionSpawner, SpawnError};
use crate::net::listener::{AcceptError, Accepted, BindError, Listener};
use crate::observability::metrics;
use crate::relay::worker::TransferSettings;

/// Errors that stop the relay.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Bind(#[from] BindError),

    #[error("invalid target address {address:?}: {source}")]
    InvalidTarget {
        address: String,
        #[source]
        source: AddrParseError,
    },

    #[error("accept loop stopped: {0}")]
    Accept(#[from] AcceptError),

    #[error("accept loop stopped: {0}")]
    Spawn(#[from] SpawnError),
}

impl RelayError {
    /// Process exit status for this error.
    ///
    /// Startup failures exit 2. A relay that ran and then stopped fail-fast
    /// has already logged why and drained its workers, so it exits 0.
    pub fn exit_code(&self) -> u8 {
        match self {
            RelayError::Bind(_) | RelayError::InvalidTarget { .. } => 2,
            RelayError::Accept(_) | RelayError::Spawn(_) => 0,
        }
    }
}

/// Totals reported once the relay has fully stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelaySummary {
    /// Connections that were paired with the target.
    pub connections: u64,
    /// Workers joined over the relay's lifetime.
    pub workers_reaped: u64,
}

/// TCP relay server.
pub struct RelayServer {
    config: RelayConfig,
    shutdown: Shutdown,
}

impl RelayServer {
    /// Create a relay for `config` that stops when `shutdown` is requested.
    pub fn new(config: RelayConfig, shutdown: Shutdown) -> Self {
        Self { config, shutdown }
    }

    /// Bind the listening socket described by the config.
    pub async fn bind(&self) -> Result<Listener, BindError> {
        let listener = &self.config.listener;
        Listener::bind(
            &listener.bind_address,
            listener.bind_port,
            self.config.timeouts.accept(),
        )
        .await
    }

    /// Run the accept loop on `listener` until shutdown or a fatal error,
    /// then drain every worker.
    pub async fn run(self, listener: Listener) -> Result<RelaySummary, RelayError> {
        let spawner = self.spawner()?;
        let mut registry = WorkerRegistry::new();
        let mut connections: u64 = 0;

        tracing::trace!(
            bind = %listener.local_addr().map(|a| a.to_string()).unwrap_or_default(),
            target = %spawner.target(),
            accept_ms = self.config.timeouts.accept_ms,
            wait_ms = self.config.timeouts.wait_ms,
            connect_ms = self.config.timeouts.connect_ms,
            send_ms = self.config.timeouts.send_ms,
            buffer_bytes = self.config.transfer.buffer_bytes,
            "startup"
        );

        let result = loop {
            if self.shutdown.is_shutting_down() {
                break Ok(());
            }

            registry.reap_finished();

            let accepted = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break Ok(()),
                accepted = listener.accept() => accepted,
            };

            let inbound = match accepted {
                Ok(Accepted::Connection(inbound)) => inbound,
                Ok(Accepted::TimedOut) | Ok(Accepted::Dropped) => continue,
                Err(e) => {
                    tracing::error!(error = %e, "Accept failed, exiting");
                    break Err(RelayError::from(e));
                }
            };
            metrics::record_accepted();

            match spawner.spawn(inbound, &mut registry).await {
                Ok(_) => connections += 1,
                Err(e) => {
                    tracing::error!(error = %e, "Spawn failed, exiting");
                    metrics::record_spawn_failure();
                    break Err(RelayError::from(e));
                }
            }
        };

        self.shutdown.request();
        tracing::info!(live_workers = registry.live(), "Draining workers");
        registry.drain_all().await;

        let summary = RelaySummary {
            connections,
            workers_reaped: registry.reaped(),
        };
        tracing::info!(
            connections = summary.connections,
            workers_reaped = summary.workers_reaped,
            "Relay stopped"
        );

        result.map(|()| summary)
    }

    fn spawner(&self) -> Result<ConnectionSpawner, RelayError> {
        let target = &self.config.target;
        let ip: Ipv4Addr = target
            .address
            .parse()
            .map_err(|source| RelayError::InvalidTarget {
                address: target.address.clone(),
                source,
            })?;

        Ok(ConnectionSpawner::new(
            SocketAddr::from((ip, target.port)),
            self.config.timeouts.connect(),
            TransferSettings::from_config(&self.config),
            self.shutdown.clone(),
        ))
    }
}

/// Bind and run a relay in one step.
pub async fn run_relay(config: RelayConfig, shutdown: Shutdown) -> Result<RelaySummary, RelayError> {
    let server = RelayServer::new(config, shutdown);
    let listener = server.bind().await?;
    server.run(listener).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> RelayConfig {
        let mut config = RelayConfig::default();
        config.listener.bind_address = "127.0.0.1".into();
        config.target.port = 9;
        config.timeouts.accept_ms = 20;
        config.timeouts.wait_ms = 20;
        config
    }

    #[tokio::test]
    async fn idle_relay_stops_on_shutdown() {
        let shutdown = Shutdown::new();
        let server = RelayServer::new(config(), shutdown.clone());
        let listener = server.bind().await.unwrap();
        let handle = tokio::spawn(server.run(listener));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!handle.is_finished());

        shutdown.request();
        let summary = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(summary, RelaySummary::default());
    }

    #[tokio::test]
    async fn invalid_target_is_reported() {
        let mut config = config();
        config.target.address = "nowhere".into();
        let err = run_relay(config, Shutdown::new()).await.unwrap_err();
        assert!(matches!(err, RelayError::InvalidTarget { .. }));
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let mut config = config();
        config.listener.bind_address = "300.1.1.1".into();
        let err = run_relay(config, Shutdown::new()).await.unwrap_err();
        assert!(matches!(err, RelayError::Bind(BindError::InvalidAddress { .. })));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn fail_fast_stop_exits_zero() {
        let spawn = RelayError::from(SpawnError::ConnectTimeout {
            target: SocketAddr::from(([127, 0, 0, 1], 9)),
            timeout: Duration::from_secs(1),
        });
        assert_eq!(spawn.exit_code(), 0);

        let accept = RelayError::from(AcceptError::Accept(std::io::ErrorKind::PermissionDenied.into()));
        assert_eq!(accept.exit_code(), 0);

        let target = RelayError::InvalidTarget {
            address: "nowhere".into(),
            source: "nowhere".parse::<Ipv4Addr>().unwrap_err(),
        };
        assert_eq!(target.exit_code(), 2);
    }
}
