//! Direct server: receives from senders or hands out messages to
//! receivers, with no broker in between.
//!
//! Usage: `direct [host] [port] [address] [count]`
//!
//! Exits once `count` messages were received or acknowledged.

mod common;

use std::process::ExitCode;

use clap::Parser;
use common::ServerArgs;
use mom_queue::{DirectServer, StdoutConsole};

#[tokio::main]
async fn main() -> ExitCode {
    // ---
    common::init_logging();
    let args = ServerArgs::parse();

    let server = match DirectServer::bind(args.direct_config(), StdoutConsole::shared()).await {
        Ok(server) => server,
        Err(err) => return common::fail(err),
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => ExitCode::SUCCESS,
        result = server.run() => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => common::fail(err),
        },
    }
}
