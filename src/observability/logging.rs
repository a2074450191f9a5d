//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global `tracing` subscriber
//! - Pick the filter: `RUST_LOG` wins over the configured directive
//! - Pick the sink: stderr in the foreground, a log file once daemonized
//!
//! # Design Decisions
//! - JSON format for log shippers, pretty format otherwise
//! - The log file is opened before the process detaches, so a bad path is
//!   still reported on the terminal
//! - File output goes through a non-blocking writer; the returned guard
//!   must live until exit or buffered lines are lost
//! - Initialization failure is reported, not fatal (a subscriber may
//!   already be installed, e.g. in tests)

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{LogFormat, ObservabilityConfig};

/// File name used under the temp directory when a daemonized relay has no
/// configured log file.
pub const DEFAULT_LOG_FILE: &str = "tcp-relay.log";

/// Where log lines go. `None` means stderr.
///
/// An explicit file always wins. Without one, a daemonized process writes
/// to [`DEFAULT_LOG_FILE`] in the temp directory, since its stderr is
/// `/dev/null`.
pub fn log_destination(foreground: bool, configured: Option<&Path>) -> Option<PathBuf> {
    match configured {
        Some(path) => Some(path.to_path_buf()),
        None if foreground => None,
        None => Some(std::env::temp_dir().join(DEFAULT_LOG_FILE)),
    }
}

/// Open `path` for appending, creating it if needed.
pub fn open_log_file(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global subscriber described by `config`, writing to `file`
/// or to stderr when there is none.
pub fn init_logging(
    config: &ObservabilityConfig,
    file: Option<File>,
) -> Result<Option<WorkerGuard>, TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));

    let (writer, ansi, guard) = match file {
        Some(file) => {
            let (writer, guard) = tracing_appender::non_blocking(file);
            (BoxMakeWriter::new(writer), false, Some(guard))
        }
        None => (BoxMakeWriter::new(io::stderr), true, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer(config.log_format, writer, ansi))
        .try_init()?;

    Ok(guard)
}

fn fmt_layer<S>(format: LogFormat, writer: BoxMakeWriter, ansi: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let layer = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(ansi);
    match format {
        LogFormat::Pretty => layer.boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreground_logs_to_stderr() {
        assert_eq!(log_destination(true, None), None);
    }

    #[test]
    fn daemon_falls_back_to_temp_file() {
        let path = log_destination(false, None).unwrap();
        assert_eq!(path, std::env::temp_dir().join(DEFAULT_LOG_FILE));
    }

    #[test]
    fn configured_file_wins() {
        let configured = Path::new("/var/log/relay.log");
        assert_eq!(log_destination(true, Some(configured)).as_deref(), Some(configured));
        assert_eq!(log_destination(false, Some(configured)).as_deref(), Some(configured));
    }

    #[test]
    fn file_sink_receives_events() {
        let path = std::env::temp_dir().join(format!("tcp-relay-logging-{}.log", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let (writer, guard) = tracing_appender::non_blocking(open_log_file(&path).unwrap());
        let subscriber = tracing_subscriber::registry().with(fmt_layer(
            LogFormat::Json,
            BoxMakeWriter::new(writer),
            false,
        ));
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(connection_id = "conn-7", "Connection established");
        });
        drop(guard);

        let written = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert!(written.contains("Connection established"), "{written}");
        assert!(written.contains("conn-7"));
        assert!(!written.contains('\u{1b}'), "file output must not carry ANSI escapes");
    }

    #[test]
    fn open_log_file_appends() {
        let path = std::env::temp_dir().join(format!("tcp-relay-append-{}.log", std::process::id()));
        let _ = std::fs::remove_file(&path);

        io::Write::write_all(&mut open_log_file(&path).unwrap(), b"first\n").unwrap();
        io::Write::write_all(&mut open_log_file(&path).unwrap(), b"second\n").unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(written, "first\nsecond\n");
    }
}
