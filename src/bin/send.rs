//! Send a batch and commit every message.
//!
//! Usage: `send [host] [port] [address] [count]`

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

    match send_batch(&args.connect_config(), Settle::Commit, StdoutConsole::shared()).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => common::fail(err),
    }
}
