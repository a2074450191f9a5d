//! Transparent TCP relay.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────┐
//!                     │                  TCP RELAY                    │
//!                     │                                               │
//!   Client            │  ┌──────────┐    ┌───────────┐                │
//!   ──────────────────┼─▶│ listener │───▶│ spawner   │── connect ─────┼──▶ Target
//!                     │  └──────────┘    └─────┬─────┘                │
//!                     │        ▲               │ 2 workers            │
//!                     │        │ reap          ▼                      │
//!                     │  ┌──────────┐    ┌───────────┐                │
//!                     │  │ registry │◀───│  workers  │ client→target  │
//!                     │  └──────────┘    │           │ target→client  │
//!                     │                  └───────────┘                │
//!                     │                                               │
//!                     │  shutdown signal ── observed by every task    │
//!                     └──────────────────────────────────────────────┘
//! ```
//!
//! Exit codes: 0 once the relay has run and stopped, whether by signal or
//! fail-fast; 1 usage, configuration or log file error; 2 startup failure
//! (bind, invalid target, detach, runtime).

use std::net::SocketAddr;
use std::process::ExitCode;

use clap::Parser;

use tcp_relay::config::{CliArgs, RelayConfig};
use tcp_relay::lifecycle::{daemon, signals, Shutdown};
use tcp_relay::observability::{logging, metrics};
use tcp_relay::relay::{RelayError, RelayServer};

const EXIT_USAGE: u8 = 1;
const EXIT_FATAL: u8 = 2;

fn main() -> ExitCode {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EXIT_USAGE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let config = match args.resolve() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("usage: tcp-relay bind_ip bind_port connect_ip connect_port [OPTIONS]");
            eprintln!("       {e}");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    // Opened while stderr still reaches the terminal.
    let destination = logging::log_destination(args.foreground, config.observability.log_file.as_deref());
    let log_file = match destination {
        Some(path) => match logging::open_log_file(&path) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("failed to open log file {}: {e}", path.display());
                return ExitCode::from(EXIT_USAGE);
            }
        },
        None => None,
    };

    // Fork before any runtime thread exists.
    if !args.foreground {
        if let Err(e) = daemon::detach() {
            eprintln!("failed to detach from terminal: {e}");
            return ExitCode::from(EXIT_FATAL);
        }
    }

    let _log_guard = match logging::init_logging(&config.observability, log_file) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("failed to initialize logging: {e}");
            None
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build runtime");
            return ExitCode::from(EXIT_FATAL);
        }
    };

    runtime.block_on(serve(config))
}

async fn serve(config: RelayConfig) -> ExitCode {
    tracing::info!("tcp-relay v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let server = RelayServer::new(config, shutdown.clone());

    let listener = match server.bind().await {
        Ok(listener) => listener,
        Err(e) => {
            let e = RelayError::from(e);
            tracing::error!(error = %e, "Bind failed");
            return ExitCode::from(e.exit_code());
        }
    };

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        tokio::select! {
            signal = signals::wait_for_signal() => match signal {
                Ok(name) => tracing::info!(signal = name, "Shutdown signal received"),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install signal handlers");
                    return;
                }
            },
            _ = signal_shutdown.cancelled() => return,
        }
        signal_shutdown.request();
    });

    match server.run(listener).await {
        Ok(_) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Relay stopped on error");
            ExitCode::from(e.exit_code())
        }
    }
}
