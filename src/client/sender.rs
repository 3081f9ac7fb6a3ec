// src/client/sender.rs

use crate::client::link::{unexpected, Link};
use crate::console::{self, ConsolePtr};
use crate::protocol::{Frame, Role, Settle};
use crate::{log_info, ConnectConfig, Envelope, Error, Result};

/// Server-confirmed settlement counts of a send batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReport {
    pub committed: u64,
    pub aborted: u64,
}

/// Send a batch of `config.count` numbered envelopes and settle each one
/// with `settle`.
///
/// Envelope bodies are `{"sequence": i}` for `i` in `1..=count`. Each
/// transfer waits for its acknowledgment before the next one goes out.
/// On success prints `N messages sent and acknowledged` (commit) or
/// `N messages started and aborted` (abort).
///
/// # Errors
///
/// - [`Error::SslInit`] if a secure connection was requested and TLS is
///   unavailable on either side
/// - [`Error::CountMismatch`] if the server's summary disagrees with the
///   batch
/// - transport and protocol errors as they occur
pub async fn send_batch(
    config: &ConnectConfig,
    settle: Settle,
    console: ConsolePtr,
) -> Result<SendReport> {
    // ---
    let mut link = Link::open(config, Role::Sender, &console).await?;

    for sequence in 1..=config.count {
        let envelope = Envelope::numbered(config.address.clone(), sequence);
        link.send(&Frame::Transfer { envelope, settle }).await?;

        match (settle, link.expect().await?) {
            (Settle::Commit, Frame::Ack { sequence: acked }) if acked == sequence => {}
            (Settle::Abort, Frame::Aborted { sequence: aborted }) if aborted == sequence => {}
            (Settle::Commit, other) => return Err(unexpected(&other, "ack")),
            (Settle::Abort, other) => return Err(unexpected(&other, "aborted")),
        }
    }

    link.send(&Frame::Detach).await?;
    let report = match link.expect().await? {
        Frame::Summary { committed, aborted } => SendReport { committed, aborted },
        other => return Err(unexpected(&other, "summary")),
    };
    link.close().await;

    let (expected_committed, expected_aborted) = match settle {
        Settle::Commit => (config.count, 0),
        Settle::Abort => (0, config.count),
    };
    if report.committed != expected_committed {
        return Err(Error::CountMismatch {
            expected: expected_committed,
            actual: report.committed,
        });
    }
    if report.aborted != expected_aborted {
        return Err(Error::CountMismatch {
            expected: expected_aborted,
            actual: report.aborted,
        });
    }

    log_info!(
        "{}: {} committed, {} aborted",
        config.address,
        report.committed,
        report.aborted
    );

    let line = match settle {
        Settle::Commit => console::sent_and_acknowledged(config.count),
        Settle::Abort => console::started_and_aborted(config.count),
    };
    console.line(&line);

    Ok(report)
}
