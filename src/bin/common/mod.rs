//! Command-line plumbing shared by the example programs.
//!
//! Every program takes positional arguments in the same order:
//! `[host] [port] [address] [count]`. An empty host means the default
//! interface for servers and the loopback address for clients.

#![allow(dead_code)]

use std::process::ExitCode;

use clap::Parser;
use mom_queue::{
    // ---
    ConnectConfig,
    DirectConfig,
    ListenConfig,
    RetryConfig,
    DEFAULT_ADDRESS,
    DEFAULT_COUNT,
    DEFAULT_PORT,
};
use tracing_subscriber::EnvFilter;

/// Arguments of the sender and receiver programs.
#[derive(Debug, Parser)]
pub struct ClientArgs {
    /// Server host; empty for the local machine
    #[arg(default_value = "")]
    pub host: String,

    /// Server port
    #[arg(default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to send to or receive from
    #[arg(default_value = DEFAULT_ADDRESS)]
    pub address: String,

    /// Number of messages in the batch
    #[arg(default_value_t = DEFAULT_COUNT)]
    pub count: u64,
}

impl ClientArgs {
    pub fn connect_config(&self) -> ConnectConfig {
        // ---
        ConnectConfig::new(self.host.as_str(), self.port, self.address.as_str())
            .with_count(self.count)
            .with_retry(RetryConfig::default())
    }
}

/// Arguments of the server programs.
#[derive(Debug, Parser)]
pub struct ServerArgs {
    /// Host to listen on; empty for all interfaces
    #[arg(default_value = "")]
    pub host: String,

    /// Port to listen on; 0 picks a free one
    #[arg(default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address served by the direct server
    #[arg(default_value = DEFAULT_ADDRESS)]
    pub address: String,

    /// Messages the direct server takes in or hands out before exiting
    #[arg(default_value_t = DEFAULT_COUNT)]
    pub count: u64,
}

impl ServerArgs {
    pub fn listen_config(&self) -> ListenConfig {
        ListenConfig::new(self.host.as_str(), self.port)
    }

    pub fn direct_config(&self) -> DirectConfig {
        // ---
        DirectConfig::new(self.listen_config())
            .with_address(self.address.as_str())
            .with_expected(self.count)
    }
}

/// Diagnostics go to stderr; stdout is reserved for console lines.
pub fn init_logging() {
    // ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(false)
        .init();
}

/// Report `err` on stderr and return the failure exit code.
pub fn fail(err: mom_queue::Error) -> ExitCode {
    eprintln!("{err}");
    ExitCode::FAILURE
}
