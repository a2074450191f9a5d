//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_connections_accepted_total` (counter): inbound connections accepted
//! - `relay_spawn_failures_total` (counter): connections whose outbound half failed
//! - `relay_bytes_transferred_total` (counter): payload bytes by direction
//! - `relay_worker_failures_total` (counter): workers that ended on an I/O error or panic
//! - `relay_active_workers` (gauge): registered, not yet reaped workers
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Prometheus exporter is opt-in

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::relay::worker::Direction;

pub const CONNECTIONS_ACCEPTED: &str = "relay_connections_accepted_total";
pub const SPAWN_FAILURES: &str = "relay_spawn_failures_total";
pub const BYTES_TRANSFERRED: &str = "relay_bytes_transferred_total";
pub const WORKER_FAILURES: &str = "relay_worker_failures_total";
pub const ACTIVE_WORKERS: &str = "relay_active_workers";

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_accepted() {
    metrics::counter!(CONNECTIONS_ACCEPTED).increment(1);
}

pub fn record_spawn_failure() {
    metrics::counter!(SPAWN_FAILURES).increment(1);
}

pub fn record_bytes(direction: Direction, bytes: usize) {
    metrics::counter!(BYTES_TRANSFERRED, "direction" => direction.as_str()).increment(bytes as u64);
}

pub fn record_worker_failure() {
    metrics::counter!(WORKER_FAILURES).increment(1);
}

pub fn set_active_workers(count: usize) {
    metrics::gauge!(ACTIVE_WORKERS).set(count as f64);
}
