//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bounded accept, TCP_NODELAY)
//!     → connection.rs (connect to target, start two workers)
//!     → socket.rs (shared handle each worker reads from or writes to)
//! ```
//!
//! # Design Decisions
//! - Every socket operation has a deadline
//! - A socket is closed by exactly one task: the worker reading from it
//! - Payload is opaque; nothing here inspects bytes

pub mod connection;
pub mod listener;
pub mod socket;

pub use connection::{ConnectionId, ConnectionSpawner, SpawnError};
pub use listener::{AcceptError, Accepted, BindError, Listener};
pub use socket::{CloseOnDrop, DuplexSocket, Readiness};
