// src/client/link.rs

//! Client half of a connection: connect, optional TLS upgrade, attach.

use std::time::Duration;

use tokio::time::{sleep, timeout};

use crate::console::{self, ConsolePtr};
use crate::protocol::{Attach, Frame, FrameStream, Role};
use crate::transport::{connect, BoxedStream, TlsClient};
use crate::{log_debug, ConnectConfig, Error, Result};

/// An attached client connection.
pub(crate) struct Link {
    stream: FrameStream,
    io_timeout: Duration,
}

impl Link {
    /// Connect and attach with `role` for `config.count` envelopes.
    ///
    /// With `config.secure`, the TLS subsystem is set up before any
    /// connect attempt and the connection is upgraded before `attach`.
    /// A server without TLS is reported as [`Error::SslInit`]. A blank
    /// address or a zero port is [`Error::MissingConfig`].
    pub(crate) async fn open(
        config: &ConnectConfig,
        role: Role,
        console: &ConsolePtr,
    ) -> Result<Self> {
        // ---
        if config.address.is_blank() {
            return Err(Error::MissingConfig("address".into()));
        }
        if config.port == 0 {
            return Err(Error::MissingConfig("port".into()));
        }

        let tls = if config.secure {
            Some(TlsClient::new()?)
        } else {
            None
        };

        let raw = connect_with_retry(config).await?;
        let mut link = Self {
            stream: FrameStream::new(raw),
            io_timeout: config.io_timeout,
        };

        if let Some(tls) = tls {
            link.send(&Frame::StartTls).await?;
            match link.expect().await? {
                Frame::TlsReady => {}
                Frame::TlsUnavailable { reason } => return Err(Error::SslInit(reason)),
                other => return Err(unexpected(&other, "tls_ready")),
            }

            let (upgraded, session) = tls.connect(link.stream.into_inner()?).await?;
            link.stream = FrameStream::new(upgraded);
            console.line(&console::secure_connection(&session));
        }

        link.send(&Frame::Attach(Attach {
            role,
            address: config.address.clone(),
            count: config.count,
        }))
        .await?;

        match link.expect().await? {
            Frame::Attached { address } if address == config.address => {}
            other => return Err(unexpected(&other, "attached")),
        }

        log_debug!(
            "attached to {}:{} as {role:?} on {} for {}",
            config.connect_host(),
            config.port,
            config.address,
            config.count
        );
        Ok(link)
    }

    pub(crate) async fn send(&mut self, frame: &Frame) -> Result<()> {
        // ---
        timeout(self.io_timeout, self.stream.write_frame(frame))
            .await
            .map_err(|_| Error::Timeout)?
    }

    /// Next frame, which must arrive within the I/O timeout.
    pub(crate) async fn expect(&mut self) -> Result<Frame> {
        // ---
        let frame = timeout(self.io_timeout, self.stream.expect_frame())
            .await
            .map_err(|_| Error::Timeout)??;
        server_error(frame)
    }

    /// Next frame, however long it takes. Used while waiting for
    /// deliveries on a queue that may stay empty.
    pub(crate) async fn next(&mut self) -> Result<Frame> {
        let frame = self.stream.expect_frame().await?;
        server_error(frame)
    }

    pub(crate) async fn close(mut self) {
        let _ = self.stream.shutdown().await;
    }
}

/// Connect, retrying refused attempts per `config.retry`.
///
/// Only [`Error::TransportRetryable`] is retried. Without a retry policy
/// there is exactly one attempt.
async fn connect_with_retry(config: &ConnectConfig) -> Result<BoxedStream> {
    // ---
    let mut attempt = 0;
    loop {
        let err = match connect(config).await {
            Err(Error::TransportRetryable(details)) => details,
            done => return done,
        };

        attempt += 1;
        let Some(retry) = config.retry.as_ref().filter(|r| attempt <= r.max_attempts) else {
            return Err(Error::TransportRetryable(err));
        };

        let delay = retry.backoff(attempt);
        log_debug!("{err}; retry {attempt}/{} in {delay:?}", retry.max_attempts);
        sleep(delay).await;
    }
}

fn server_error(frame: Frame) -> Result<Frame> {
    match frame {
        Frame::Error { message } => Err(Error::Protocol(format!("server: {message}"))),
        frame => Ok(frame),
    }
}

pub(crate) fn unexpected(frame: &Frame, wanted: &str) -> Error {
    Error::Protocol(format!("expected {wanted}, got {}", frame.kind()))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::transport::Listener;
    use crate::{ListenConfig, RetryConfig};

    fn fast(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            multiplier: 2.0,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
        }
    }

    /// A loopback port nobody listens on.
    async fn closed_port() -> u16 {
        Listener::bind(&ListenConfig::loopback(0)).await.unwrap().port()
    }

    #[tokio::test]
    async fn refused_connect_without_policy_fails_once() {
        // ---
        let config = ConnectConfig::new("127.0.0.1", closed_port().await, "xtest");

        let result = connect_with_retry(&config).await;
        assert!(matches!(result, Err(Error::TransportRetryable(_))));
    }

    #[tokio::test]
    async fn exhausted_retries_return_last_error() {
        // ---
        let config =
            ConnectConfig::new("127.0.0.1", closed_port().await, "xtest").with_retry(fast(2));

        let result = connect_with_retry(&config).await;
        assert!(matches!(result, Err(Error::TransportRetryable(_))));
    }

    #[tokio::test]
    async fn retries_until_the_server_is_up() {
        // ---
        let port = closed_port().await;
        let config = ConnectConfig::new("127.0.0.1", port, "xtest").with_retry(fast(20));

        let server = tokio::spawn(async move {
            sleep(Duration::from_millis(30)).await;
            let listener = Listener::bind(&ListenConfig::loopback(port)).await.unwrap();
            listener.accept().await.map(|_| ())
        });

        assert!(connect_with_retry(&config).await.is_ok());
        server.await.unwrap().unwrap();
    }
}
