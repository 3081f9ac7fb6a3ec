// src/server/session.rs

//! Server half of the connection handshake.
//!
//! ```text
//! client                         server
//!   | -- start_tls (optional) -->  |
//!   | <-- tls_ready -------------  |
//!   | ==== TLS handshake ========  |
//!   | -- attach ----------------->  |
//!   | <-- attached --------------  |
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use tokio::time::timeout;

use crate::protocol::{Attach, Frame, FrameStream};
use crate::transport::{BoxedStream, TlsIdentity};
use crate::{log_debug, ConnectionId, Error, Result};

/// Time a peer gets to complete the handshake after connecting.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// An attached connection, ready for role-specific handling.
pub struct Session {
    // ---
    pub id: ConnectionId,
    pub peer: SocketAddr,
    pub stream: FrameStream,
    pub attach: Attach,
    /// The connection was upgraded to TLS.
    pub secure: bool,
}

impl Session {
    /// Transport label for log records.
    pub fn transport(&self) -> &'static str {
        if self.secure {
            "tls"
        } else {
            "plain"
        }
    }
}

/// Run the handshake on a freshly accepted stream.
///
/// Protocol violations are reported to the peer with an `error` frame
/// before the error is returned.
pub async fn open_session(
    id: ConnectionId,
    stream: BoxedStream,
    peer: SocketAddr,
    tls: Option<&TlsIdentity>,
) -> Result<Session> {
    // ---
    timeout(HANDSHAKE_TIMEOUT, handshake(id, stream, peer, tls))
        .await
        .map_err(|_| Error::Timeout)?
}

async fn handshake(
    id: ConnectionId,
    stream: BoxedStream,
    peer: SocketAddr,
    tls: Option<&TlsIdentity>,
) -> Result<Session> {
    // ---
    let mut framed = FrameStream::new(stream);
    let mut secure = false;
    let mut first = framed.expect_frame().await?;

    if first == Frame::StartTls {
        let Some(identity) = tls else {
            framed
                .write_frame(&Frame::TlsUnavailable {
                    reason: "TLS is not enabled on this server".into(),
                })
                .await?;
            return Err(Error::Protocol(
                "TLS upgrade requested but not available".into(),
            ));
        };

        framed.write_frame(&Frame::TlsReady).await?;
        let upgraded = identity.accept(framed.into_inner()?).await?;
        framed = FrameStream::new(upgraded);
        secure = true;
        log_debug!("[{}] upgraded {peer} to TLS", id.short());

        first = framed.expect_frame().await?;
    }

    let attach = match first {
        Frame::Attach(attach) => attach,
        other => {
            return reject(
                &mut framed,
                format!("expected attach, got {}", other.kind()),
            )
            .await;
        }
    };

    if attach.address.is_blank() {
        return reject(&mut framed, "attach with an empty address".to_string()).await;
    }

    framed
        .write_frame(&Frame::Attached {
            address: attach.address.clone(),
        })
        .await?;

    log_debug!(
        "[{}] {peer} attached as {:?} on {} for {}",
        id.short(),
        attach.role,
        attach.address,
        attach.count
    );

    Ok(Session {
        id,
        peer,
        stream: framed,
        attach,
        secure,
    })
}

async fn reject<T>(framed: &mut FrameStream, message: String) -> Result<T> {
    // Best effort: the peer may already be gone.
    let _ = framed
        .write_frame(&Frame::Error {
            message: message.clone(),
        })
        .await;
    Err(Error::Protocol(message))
}
