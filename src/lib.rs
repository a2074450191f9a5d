//! Transparent TCP relay library.
//!
//! Accepts connections on a local address and pairs each with a fresh
//! connection to a fixed target, copying bytes both ways until either side
//! closes or the relay is shut down.

pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod relay;

pub use config::RelayConfig;
pub use lifecycle::Shutdown;
pub use relay::{run_relay, RelayError, RelayServer, RelaySummary};
