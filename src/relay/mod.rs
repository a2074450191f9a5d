//! Relay subsystem.
//!
//! # Data Flow
//! ```text
//! server.rs (accept loop)
//!     → net::connection (outbound connect)
//!     → worker.rs ×2 (client→target, target→client)
//!     → lifecycle::registry (reap per iteration, drain at exit)
//! ```
//!
//! # Design Decisions
//! - One task per direction; tasks of the same connection never talk to
//!   each other, teardown propagates through the sockets they share
//! - A worker failure is local to that worker; only spawn failures stop
//!   the relay

pub mod server;
pub mod worker;

pub use server::{run_relay, RelayError, RelayServer, RelaySummary};
pub use worker::{Direction, Outcome, TransferSettings, TransferWorker, WorkerReport};
