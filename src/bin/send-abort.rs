//! Send a batch and abort every message.
//!
//! Usage: `send-abort [host] [port] [address] [count]`

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

    match send_batch(&args.connect_config(), Settle::Abort, StdoutConsole::shared()).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => common::fail(err),
    }
}
