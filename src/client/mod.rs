//! Sender and receiver clients.
//!
//! Each client connects, attaches for exactly one batch, runs it to
//! completion and prints the batch's console lines.
//!
//! # Example
//!
//! ```no_run
//! use mom_queue::{send_batch, ConnectConfig, Settle, StdoutConsole};
//!
//! # async fn example() -> mom_queue::Result<()> {
//! let config = ConnectConfig::new("", 5672, "xtest").with_count(10);
//! let report = send_batch(&config, Settle::Commit, StdoutConsole::shared()).await?;
//! assert_eq!(report.committed, 10);
//! # Ok(())
//! # }
//! ```

mod link;
mod receiver;
mod sender;

pub use receiver::receive_batch;
pub use sender::{send_batch, SendReport};
