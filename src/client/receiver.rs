// src/client/receiver.rs

use crate::client::link::{unexpected, Link};
use crate::console::{self, ConsolePtr};
use crate::protocol::{Frame, Role};
use crate::{log_info, ConnectConfig, DeliveryState, Error, Result};

/// Receive `config.count` envelopes from `config.address`.
///
/// Blocks until enough envelopes have been committed; an empty queue is
/// not an error. Each body is printed as it is accepted, then
/// `N messages received`. Returns the number received.
///
/// # Errors
///
/// - [`Error::ConnectionClosed`] if the server goes away mid-batch
/// - [`Error::CountMismatch`] if the server's `done` total disagrees
pub async fn receive_batch(config: &ConnectConfig, console: ConsolePtr) -> Result<u64> {
    // ---
    let mut link = Link::open(config, Role::Receiver, &console).await?;
    let mut received = 0u64;

    while received < config.count {
        let envelope = match link.next().await? {
            Frame::Deliver { envelope } => envelope,
            other => return Err(unexpected(&other, "deliver")),
        };

        if envelope.state != DeliveryState::Committed {
            return Err(Error::Protocol(format!(
                "delivery {} is {:?}, not committed",
                envelope.sequence, envelope.state
            )));
        }

        link.send(&Frame::Accept {
            sequence: envelope.sequence,
        })
        .await?;
        console.line(&envelope.body.to_string());
        received += 1;
    }

    match link.expect().await? {
        Frame::Done { total } if total == received => {}
        Frame::Done { total } => {
            return Err(Error::CountMismatch {
                expected: received,
                actual: total,
            });
        }
        other => return Err(unexpected(&other, "done")),
    }
    link.close().await;

    log_info!("{}: {received} received", config.address);
    console.line(&console::received(received));
    Ok(received)
}
