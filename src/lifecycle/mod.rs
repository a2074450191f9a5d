//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (daemon.rs):
//!     Validate args → Detach from terminal → Build runtime → Bind
//!
//! Steady state (registry.rs):
//!     Accept loop registers two workers per connection
//!     → reaps finished workers once per iteration
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT or fatal spawn error → request shutdown
//!     → accept loop exits → workers observe the signal → drain → exit
//! ```
//!
//! # Design Decisions
//! - The stop signal is a value handed to every task, not a global
//! - The stop signal only ever moves from running to stopping
//! - Shutdown is cooperative: every wait in the relay is bounded, so every
//!   task reaches a checkpoint in bounded time

pub mod daemon;
pub mod registry;
pub mod shutdown;
pub mod signals;

pub use registry::WorkerRegistry;
pub use shutdown::Shutdown;
