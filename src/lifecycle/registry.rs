//! Worker registry and reaper.
//!
//! # Responsibilities
//! - Own every spawned transfer worker task
//! - Join finished workers without blocking on live ones (once per accept)
//! - Join everything that is left when the relay stops
//!
//! # Design Decisions
//! - Backed by a `JoinSet`; a worker's identity is its slot in the set
//! - A panicking worker is reaped like any other and logged, never re-raised

use std::future::Future;

use tokio::task::{JoinError, JoinSet};

use crate::observability::metrics;
use crate::relay::worker::WorkerReport;

/// Supervisor for transfer worker tasks.
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    workers: JoinSet<WorkerReport>,
    reaped: u64,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a worker onto the runtime and start tracking it.
    pub fn register<F>(&mut self, worker: F)
    where
        F: Future<Output = WorkerReport> + Send + 'static,
    {
        self.workers.spawn(worker);
        metrics::set_active_workers(self.workers.len());
    }

    /// Join every worker that has already finished. Never waits.
    ///
    /// Returns the number of workers reaped by this call.
    pub fn reap_finished(&mut self) -> usize {
        let mut count = 0;
        while let Some(result) = self.workers.try_join_next() {
            self.record(result);
            count += 1;
        }
        if count > 0 {
            metrics::set_active_workers(self.workers.len());
        }
        count
    }

    /// Wait for every remaining worker to finish.
    ///
    /// Only meaningful once shutdown has been requested; otherwise this waits
    /// for every connection to close on its own.
    pub async fn drain_all(&mut self) -> usize {
        let mut count = 0;
        while let Some(result) = self.workers.join_next().await {
            self.record(result);
            count += 1;
        }
        metrics::set_active_workers(0);
        count
    }

    /// Number of registered workers not yet reaped.
    pub fn live(&self) -> usize {
        self.workers.len()
    }

    /// Total workers reaped over the registry's lifetime.
    pub fn reaped(&self) -> u64 {
        self.reaped
    }

    fn record(&mut self, result: Result<WorkerReport, JoinError>) {
        self.reaped += 1;
        match result {
            Ok(report) => {
                tracing::trace!(
                    connection_id = %report.connection,
                    direction = %report.direction,
                    bytes = report.bytes,
                    outcome = ?report.outcome,
                    "Worker reaped"
                );
            }
            Err(e) if e.is_panic() => {
                tracing::error!(error = %e, "Transfer worker panicked");
                metrics::record_worker_failure();
            }
            Err(e) => {
                tracing::debug!(error = %e, "Transfer worker cancelled");
            }
        }
    }
}
