// src/server/runner.rs

//! Accept loop and per-connection driver.
//!
//! The runner owns the parts every server shares: accepting TCP
//! connections, spawning one task per connection, running the handshake
//! and reporting failures. What happens after `attach` is left to a
//! [`SessionHandler`]; the broker and the direct server are the two
//! implementations.
//!
//! A failing connection never takes the server down. Its error is logged
//! and, where the peer can still hear it, sent as an `error` frame.

use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::protocol::Frame;
use crate::queue::lock_ignore_poison;
use crate::server::{open_session, Session};
use crate::transport::{BoxedStream, Listener, TlsIdentity};
use crate::{log_debug, log_error, log_warn, ConnectionId, Error, Result};

/// Role-specific handling of an attached connection.
#[async_trait::async_trait]
pub trait SessionHandler: Send + Sync {
    /// Serve the session until its batch is finished.
    ///
    /// Errors end this connection only.
    async fn handle_session(&self, session: &mut Session) -> Result<()>;
}

/// Accept connections until `stop` resolves.
///
/// Each connection runs on its own task, so one slow or misbehaving peer
/// never holds up the others. Connections already running when `stop`
/// resolves are left to finish on their own.
pub async fn accept_loop<H, S>(
    listener: Listener,
    handler: Arc<H>,
    tls: Option<Arc<TlsIdentity>>,
    stop: S,
) -> Result<()>
where
    H: SessionHandler + 'static,
    S: Future,
{
    // ---
    tokio::pin!(stop);

    loop {
        tokio::select! {
            _ = &mut stop => {
                log_debug!("listener on port {} stopping", listener.port());
                return Ok(());
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        let handler = handler.clone();
                        let tls = tls.clone();
                        tokio::spawn(async move {
                            serve_connection(handler, stream, peer, tls).await;
                        });
                    }
                    Err(_err) => {
                        // Typically fd exhaustion.
                        log_error!("accept failed: {_err}");
                        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                    }
                }
            }
        }
    }
}

/// Drive one connection from handshake to close.
async fn serve_connection<H>(
    handler: Arc<H>,
    stream: BoxedStream,
    peer: std::net::SocketAddr,
    tls: Option<Arc<TlsIdentity>>,
) where
    H: SessionHandler + ?Sized,
{
    // ---
    let id = ConnectionId::generate();
    log_debug!("[{}] accepted {peer}", id.short());

    let mut session = match open_session(id, stream, peer, tls.as_deref()).await {
        Ok(session) => session,
        Err(_err) => {
            log_warn!("[{}] handshake with {peer} failed: {_err}", id.short());
            return;
        }
    };

    match handler.handle_session(&mut session).await {
        Ok(()) => {}
        Err(Error::ConnectionClosed) => {
            log_debug!("[{}] {peer} closed the connection mid-batch", id.short());
        }
        Err(err) => {
            log_warn!("[{}] session with {peer} failed: {err}", id.short());
            let _ = session
                .stream
                .write_frame(&Frame::Error {
                    message: err.to_string(),
                })
                .await;
        }
    }

    let _ = session.stream.shutdown().await;
    log_debug!("[{}] closed", id.short());
}

/// One-shot stop signal shared by a server and its handles.
pub(crate) struct StopSignal {
    tx: Mutex<Option<oneshot::Sender<()>>>,
    rx: Mutex<Option<oneshot::Receiver<()>>>,
}

impl StopSignal {
    pub(crate) fn new() -> Self {
        // ---
        let (tx, rx) = oneshot::channel();
        Self {
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(Some(rx)),
        }
    }

    /// Fire the signal. Later calls do nothing.
    pub(crate) fn trigger(&self) {
        if let Some(tx) = lock_ignore_poison(&self.tx).take() {
            let _ = tx.send(());
        }
    }

    /// Receiver that resolves once the signal fires.
    ///
    /// Only the first caller gets it; the server's run loop is the only
    /// consumer.
    pub(crate) fn take_receiver(&self) -> Result<oneshot::Receiver<()>> {
        // ---
        lock_ignore_poison(&self.rx)
            .take()
            .ok_or_else(|| Error::Transport("server is already running".into()))
    }
}
