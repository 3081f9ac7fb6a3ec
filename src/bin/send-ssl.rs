//! Send a batch over a TLS-upgraded connection and commit every message.
//!
//! Usage: `send-ssl [host] [port] [address] [count]`

mod common;

use std::process::ExitCode;

use clap::Parser;
use common::ClientArgs;
use mom_queue::{send_batch, Settle, StdoutConsole};

#[tokio::main]
async fn main() -> ExitCode {
    // ---
    common::init_logging();
    let args = ClientArgs::parse();

    let config = args.connect_config().with_secure(true);

    match send_batch(&config, Settle::Commit, StdoutConsole::shared()).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => common::fail(err),
    }
}
