//! Detaching from the controlling terminal.
//!
//! Must run before the Tokio runtime is built: forking a process that already
//! owns runtime threads leaves the child with only the forking thread.

use std::io;

/// Become a background process: working directory `/`, stdio on `/dev/null`.
#[cfg(target_os = "linux")]
pub fn detach() -> io::Result<()> {
    nix::unistd::daemon(false, false).map_err(io::Error::from)
}

/// Become a background process. Unsupported on this platform, so the
/// process stays attached.
#[cfg(not(target_os = "linux"))]
pub fn detach() -> io::Result<()> {
    Ok(())
}
