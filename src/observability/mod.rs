//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Accept loop, spawner, workers, registry produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stderr in the foreground, an append-only log file once daemonized
//!       (pretty or JSON either way)
//!     → Metrics endpoint (Prometheus scrape, opt-in)
//! ```
//!
//! # Design Decisions
//! - Failures at error level, startup parameters at trace level
//! - Every per-connection event carries the connection ID
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
