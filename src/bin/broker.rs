//! Queuing broker.
//!
//! Usage: `broker [host] [port]`
//!
//! Prints `listening on <port>` once bound and serves until interrupted.

mod common;

use std::process::ExitCode;

use clap::Parser;
use common::ServerArgs;
use mom_queue::{Broker, StdoutConsole};

#[tokio::main]
async fn main() -> ExitCode {
    // ---
    common::init_logging();
    let args = ServerArgs::parse();

    let broker = match Broker::bind(args.listen_config(), StdoutConsole::shared()).await {
        Ok(broker) => broker,
        Err(err) => return common::fail(err),
    };

    let server = broker.spawn();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            broker.shutdown();
            ExitCode::SUCCESS
        }
        joined = server => match joined {
            Ok(Ok(())) => ExitCode::SUCCESS,
            Ok(Err(err)) => common::fail(err),
            Err(err) => {
                eprintln!("broker task failed: {err}");
                ExitCode::FAILURE
            }
        },
    }
}
