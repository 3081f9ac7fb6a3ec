// src/transport/tcp.rs

//! Plain TCP transport.
//!
//! Produces type-erased [`BoxedStream`]s so the protocol layer handles plain
//! and TLS sessions identically.

use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use crate::{log_debug, ConnectConfig, Error, ListenConfig, Result};

/// A bidirectional byte stream usable by the framing layer.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> AsyncStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Owned, type-erased byte stream (plain TCP or TLS).
pub type BoxedStream = Box<dyn AsyncStream>;

/// A bound TCP listener.
pub struct Listener {
    // ---
    inner: TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    /// Bind to the configured host and port.
    ///
    /// Port 0 asks the OS for an ephemeral port; [`Listener::port`] reports
    /// the port actually bound.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the address cannot be bound.
    pub async fn bind(config: &ListenConfig) -> Result<Self> {
        // ---
        let inner = TcpListener::bind((config.bind_host(), config.port)).await?;
        let local_addr = inner.local_addr()?;
        log_debug!("bound listener on {local_addr}");
        Ok(Self { inner, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Accept the next connection.
    pub async fn accept(&self) -> Result<(BoxedStream, SocketAddr)> {
        // ---
        let (stream, peer) = self.inner.accept().await?;
        stream.set_nodelay(true)?;
        Ok((Box::new(stream), peer))
    }
}

/// Open one TCP connection to the configured peer.
///
/// A refused or timed out connect is reported as
/// [`Error::TransportRetryable`] so callers may retry while the server is
/// still starting.
pub async fn connect(config: &ConnectConfig) -> Result<BoxedStream> {
    // ---
    let target = (config.connect_host(), config.port);

    let stream = match timeout(config.io_timeout, TcpStream::connect(target)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(err)) if is_transient(&err) => {
            return Err(Error::TransportRetryable(format!(
                "connect to {}:{} failed: {err}",
                config.connect_host(),
                config.port
            )));
        }
        Ok(Err(err)) => return Err(Error::Io(err)),
        Err(_) => {
            return Err(Error::TransportRetryable(format!(
                "connect to {}:{} timed out",
                config.connect_host(),
                config.port
            )));
        }
    };

    stream.set_nodelay(true)?;
    Ok(Box::new(stream))
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::TimedOut
    )
}
