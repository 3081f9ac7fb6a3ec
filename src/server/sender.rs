// src/server/sender.rs

//! Sender-role connection handling.
//!
//! Every `transfer` carries a pending envelope and its requested
//! settlement. The envelope is committed into the sink (or aborted) before
//! the matching `ack` / `aborted` frame is written, so an acknowledgment
//! always means the envelope is already visible to receivers.

use crate::protocol::{Attach, Frame, FrameStream, Settle};
use crate::{CommittedEnvelope, Envelope, Error, Result};

/// Destination of a sender's settled envelopes.
pub trait EnvelopeSink: Send + Sync {
    /// Take ownership of a committed envelope.
    ///
    /// Returning an error refuses the envelope; the sender's batch is
    /// abandoned with a protocol error.
    fn commit(&self, env: CommittedEnvelope) -> Result<()>;

    /// Observe an aborted envelope. It is dropped afterwards.
    fn aborted(&self, env: &Envelope);
}

/// Settlement counts of one sender batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub committed: u64,
    pub aborted: u64,
}

impl BatchOutcome {
    pub fn settled(&self) -> u64 {
        self.committed + self.aborted
    }
}

/// Drive one sender batch to completion.
///
/// Returns once the sender detached and the summary was written.
///
/// # Errors
///
/// - [`Error::ConnectionClosed`] if the sender disappears before
///   detaching; envelopes it never transferred are simply never committed
/// - [`Error::Protocol`] for transfers that do not match the attach
///   parameters
pub async fn serve_sender(
    stream: &mut FrameStream,
    attach: &Attach,
    sink: &dyn EnvelopeSink,
) -> Result<BatchOutcome> {
    // ---
    let mut outcome = BatchOutcome::default();
    let mut last_sequence = 0u64;

    loop {
        let frame = stream.read_frame().await?.ok_or(Error::ConnectionClosed)?;

        match frame {
            Frame::Transfer { envelope, settle } => {
                validate_transfer(attach, &envelope, last_sequence, outcome.settled())?;
                last_sequence = envelope.sequence;
                let sequence = envelope.sequence;

                match settle {
                    Settle::Commit => {
                        sink.commit(envelope.commit()?)?;
                        outcome.committed += 1;
                        stream.write_frame(&Frame::Ack { sequence }).await?;
                    }
                    Settle::Abort => {
                        let aborted = envelope.abort()?;
                        sink.aborted(&aborted);
                        outcome.aborted += 1;
                        stream.write_frame(&Frame::Aborted { sequence }).await?;
                    }
                }
            }
            Frame::Detach => {
                stream
                    .write_frame(&Frame::Summary {
                        committed: outcome.committed,
                        aborted: outcome.aborted,
                    })
                    .await?;
                return Ok(outcome);
            }
            other => {
                return Err(Error::Protocol(format!(
                    "unexpected {} frame from sender",
                    other.kind()
                )));
            }
        }
    }
}

fn validate_transfer(
    attach: &Attach,
    envelope: &Envelope,
    last_sequence: u64,
    settled: u64,
) -> Result<()> {
    // ---
    if settled >= attach.count {
        return Err(Error::Protocol(format!(
            "transfer beyond the attached batch size of {}",
            attach.count
        )));
    }
    if envelope.address != attach.address {
        return Err(Error::Protocol(format!(
            "transfer for {} on a link attached to {}",
            envelope.address, attach.address
        )));
    }
    if !envelope.is_pending() {
        return Err(Error::Protocol(format!(
            "transfer of envelope {} in state {:?}",
            envelope.sequence, envelope.state
        )));
    }
    if envelope.sequence <= last_sequence {
        return Err(Error::Protocol(format!(
            "sequence {} does not follow {last_sequence}",
            envelope.sequence
        )));
    }
    Ok(())
}
