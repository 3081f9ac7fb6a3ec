// src/server/receiver.rs

//! Receiver-role connection handling.

use crate::protocol::{Attach, Frame, FrameStream};
use crate::queue::AddressQueue;
use crate::{log_trace, CommittedEnvelope, Error, Result};

/// Deliver `attach.count` envelopes from `queue`, then write `done`.
///
/// Envelopes are handed out one at a time. A delivery counts once the
/// receiver accepts it; if the connection fails before that, the envelope
/// goes back to the front of the queue so the next receiver sees it first.
///
/// `on_accept` runs after each accepted delivery. Returns the number of
/// accepted deliveries.
///
/// # Errors
///
/// - [`Error::ConnectionClosed`] if the receiver leaves while waiting for
///   an envelope or before accepting one
/// - [`Error::Protocol`] for anything but the matching `accept`
pub async fn serve_receiver<F>(
    stream: &mut FrameStream,
    attach: &Attach,
    queue: &AddressQueue,
    mut on_accept: F,
) -> Result<u64>
where
    F: FnMut(&CommittedEnvelope) + Send,
{
    // ---
    let mut delivered = 0u64;

    while delivered < attach.count {
        let env = tokio::select! {
            env = queue.dequeue() => env,
            closed = stream.peer_closed() => {
                return Err(if closed? {
                    Error::ConnectionClosed
                } else {
                    Error::Protocol("receiver sent data while waiting for a delivery".into())
                });
            }
        };

        if let Err(err) = deliver(stream, &env).await {
            log_trace!("returning envelope {} to {}", env.sequence(), env.address());
            queue.requeue_front(env);
            return Err(err);
        }

        delivered += 1;
        on_accept(&env);
    }

    stream.write_frame(&Frame::Done { total: delivered }).await?;
    Ok(delivered)
}

async fn deliver(stream: &mut FrameStream, env: &CommittedEnvelope) -> Result<()> {
    // ---
    stream
        .write_frame(&Frame::Deliver {
            envelope: env.as_envelope().clone(),
        })
        .await?;

    match stream.read_frame().await? {
        Some(Frame::Accept { sequence }) if sequence == env.sequence() => Ok(()),
        Some(other) => Err(Error::Protocol(format!(
            "expected accept for {}, got {}",
            env.sequence(),
            other.kind()
        ))),
        None => Err(Error::ConnectionClosed),
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::protocol::Role;
    use crate::{Address, Envelope};
    use std::time::Duration;
    use tokio::io::duplex;
    use tokio::time::timeout;

    fn pair() -> (FrameStream, FrameStream) {
        let (a, b) = duplex(64 * 1024);
        (FrameStream::new(Box::new(a)), FrameStream::new(Box::new(b)))
    }

    fn attach(count: u64) -> Attach {
        Attach {
            role: Role::Receiver,
            address: Address::from("xtest"),
            count,
        }
    }

    fn committed(sequence: u64) -> CommittedEnvelope {
        Envelope::numbered(Address::from("xtest"), sequence)
            .commit()
            .unwrap()
    }

    #[tokio::test]
    async fn delivers_in_order_and_reports_done() {
        // ---
        // Arrange
        let (mut client, mut server) = pair();
        let queue = AddressQueue::new();
        for seq in 1..=3 {
            queue.enqueue(committed(seq));
        }

        // Act
        let server_task = tokio::spawn(async move {
            let mut accepted = Vec::new();
            let total = serve_receiver(&mut server, &attach(2), &queue, |env| {
                accepted.push(env.sequence())
            })
            .await;
            (total, accepted, queue)
        });

        for expected in 1..=2 {
            match client.expect_frame().await.unwrap() {
                Frame::Deliver { envelope } => {
                    assert_eq!(envelope.sequence, expected);
                    client
                        .write_frame(&Frame::Accept { sequence: expected })
                        .await
                        .unwrap();
                }
                other => panic!("unexpected frame {other:?}"),
            }
        }
        assert_eq!(client.expect_frame().await.unwrap(), Frame::Done { total: 2 });

        // Assert
        let (total, accepted, queue) = server_task.await.unwrap();
        assert_eq!(total.unwrap(), 2);
        assert_eq!(accepted, vec![1, 2]);
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn unaccepted_delivery_is_requeued() {
        // ---
        let (mut client, mut server) = pair();
        let queue = AddressQueue::new();
        queue.enqueue(committed(1));
        queue.enqueue(committed(2));

        let server_task = tokio::spawn(async move {
            let result = serve_receiver(&mut server, &attach(2), &queue, |_| {}).await;
            (result, queue)
        });

        // Take the first delivery, then leave without accepting.
        assert!(matches!(
            client.expect_frame().await.unwrap(),
            Frame::Deliver { .. }
        ));
        client.shutdown().await.unwrap();
        drop(client);

        let (result, queue) = server_task.await.unwrap();
        assert!(matches!(result, Err(Error::ConnectionClosed)));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.try_dequeue().unwrap().sequence(), 1);
    }

    #[tokio::test]
    async fn receiver_leaving_while_idle_is_detected() {
        // ---
        let (client, mut server) = pair();
        let queue = AddressQueue::new();
        drop(client);

        let result = timeout(
            Duration::from_secs(2),
            serve_receiver(&mut server, &attach(1), &queue, |_| {}),
        )
        .await
        .expect("serve_receiver should notice the closed peer");

        assert!(matches!(result, Err(Error::ConnectionClosed)));
        assert!(queue.is_empty());
    }
}
