//! Receive a batch, printing each message body.
//!
//! Usage: `receive [host] [port] [address] [count]`
//!
//! Waits for messages that have not been sent yet.

mod common;

use std::process::ExitCode;

use clap::Parser;
use common::ClientArgs;
use mom_queue::{receive_batch, StdoutConsole};

#[tokio::main]
async fn main() -> ExitCode {
    // ---
    common::init_logging();
    let args = ClientArgs::parse();

    match receive_batch(&args.connect_config(), StdoutConsole::shared()).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => common::fail(err),
    }
}
