// src/protocol/codec.rs

//! Line-delimited JSON framing over a byte stream.

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};

use crate::protocol::Frame;
use crate::transport::BoxedStream;
use crate::{log_trace, Error, Result};

/// Maximum encoded frame length, including the trailing newline.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// A framed connection.
///
/// Reads are buffered; writes are flushed per frame so that every
/// acknowledgment reaches the peer without waiting for more output.
pub struct FrameStream {
    // ---
    inner: BufReader<BoxedStream>,
}

impl FrameStream {
    pub fn new(stream: BoxedStream) -> Self {
        Self {
            inner: BufReader::new(stream),
        }
    }

    /// Read the next frame.
    ///
    /// Returns `Ok(None)` on a clean end of stream at a frame boundary.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the stream ends mid-frame
    /// - [`Error::FrameTooLarge`] if no newline appears within
    ///   [`MAX_FRAME_LEN`] bytes
    /// - [`Error::Serialization`] if the line is not a valid frame
    pub async fn read_frame(&mut self) -> Result<Option<Frame>> {
        // ---
        let mut line = String::new();
        let read = (&mut self.inner)
            .take(MAX_FRAME_LEN as u64)
            .read_line(&mut line)
            .await
            .map_err(closed_or_io)?;

        if read == 0 {
            return Ok(None);
        }
        if !line.ends_with('\n') {
            if read >= MAX_FRAME_LEN {
                return Err(Error::FrameTooLarge { max: MAX_FRAME_LEN });
            }
            return Err(Error::ConnectionClosed);
        }

        let frame: Frame = serde_json::from_str(line.trim_end())?;
        log_trace!("read frame {}", frame.kind());
        Ok(Some(frame))
    }

    /// Read the next frame, treating end of stream as an error.
    pub async fn expect_frame(&mut self) -> Result<Frame> {
        self.read_frame().await?.ok_or(Error::ConnectionClosed)
    }

    /// Write one frame and flush it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the peer is gone.
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        // ---
        let mut bytes = serde_json::to_vec(frame)?;
        bytes.push(b'\n');

        let stream = self.inner.get_mut();
        stream.write_all(&bytes).await.map_err(closed_or_io)?;
        stream.flush().await.map_err(closed_or_io)?;

        log_trace!("wrote frame {}", frame.kind());
        Ok(())
    }

    /// Resolve once the peer has closed its side or sent unsolicited data.
    ///
    /// Returns `true` on end of stream, `false` if bytes are waiting. Does
    /// not consume anything, so it is safe to race against other work in a
    /// `select!`.
    pub async fn peer_closed(&mut self) -> Result<bool> {
        let buf = self.inner.fill_buf().await.map_err(closed_or_io)?;
        Ok(buf.is_empty())
    }

    /// Shut down the write half.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.get_mut().shutdown().await?;
        Ok(())
    }

    /// Recover the raw stream, e.g. to run a TLS handshake over it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the peer already sent bytes past the
    /// last frame; they would be lost by the upgrade.
    pub fn into_inner(self) -> Result<BoxedStream> {
        // ---
        if !self.inner.buffer().is_empty() {
            return Err(Error::Protocol(
                "data received before the TLS handshake".into(),
            ));
        }
        Ok(self.inner.into_inner())
    }
}

/// A peer that went away is a closed connection, not an I/O fault.
fn closed_or_io(err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::BrokenPipe
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted => Error::ConnectionClosed,
        _ => Error::Io(err),
    }
}
