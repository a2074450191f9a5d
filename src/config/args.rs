//! Command-line arguments.
//!
//! The four positionals are the whole contract with the caller; everything
//! else is optional and layered over the config file.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::Parser;

use crate::config::loader::{load_config, ConfigError};
use crate::config::schema::{LogFormat, RelayConfig};
use crate::config::validation::validate_config;

#[derive(Debug, Parser)]
#[command(name = "tcp-relay")]
#[command(about = "Relay every TCP connection accepted on a local port to a fixed target", long_about = None)]
pub struct CliArgs {
    /// IPv4 address to listen on.
    pub bind_ip: Ipv4Addr,

    /// Port to listen on.
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    pub bind_port: u16,

    /// IPv4 address of the target.
    pub connect_ip: Ipv4Addr,

    /// Port of the target.
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    pub connect_port: u16,

    /// Optional TOML file with timeouts, buffer size and observability settings.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Stay attached to the controlling terminal instead of daemonizing.
    #[arg(short, long)]
    pub foreground: bool,

    /// Log output format.
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Append log lines to this file instead of stderr.
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Serve Prometheus metrics on this address.
    #[arg(long)]
    pub metrics_address: Option<String>,
}

impl CliArgs {
    /// Build the effective configuration: defaults, then the config file,
    /// then the command line. The result is validated.
    pub fn resolve(&self) -> Result<RelayConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => RelayConfig::default(),
        };

        config.listener.bind_address = self.bind_ip.to_string();
        config.listener.bind_port = self.bind_port;
        config.target.address = self.connect_ip.to_string();
        config.target.port = self.connect_port;

        if let Some(format) = self.log_format {
            config.observability.log_format = format;
        }
        if let Some(path) = &self.log_file {
            config.observability.log_file = Some(path.clone());
        }
        if let Some(address) = &self.metrics_address {
            config.observability.metrics_enabled = true;
            config.observability.metrics_address = address.clone();
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}
