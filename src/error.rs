use thiserror::Error;

/// Errors that can occur while brokering, sending or receiving envelopes.
#[derive(Error, Debug)]
pub enum Error {
    /// Socket level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization of a frame failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The secure-transport subsystem could not be set up in this
    /// environment.
    ///
    /// Callers treat this as "feature unavailable" rather than a send
    /// failure, so the display text keeps a stable prefix.
    #[error("error initializing SSL: {0}")]
    SslInit(String),

    /// TLS handshake failed after the subsystem was initialized.
    #[error("TLS handshake error: {0}")]
    Tls(String),

    /// Peer violated the frame protocol (bad handshake, unexpected frame,
    /// wrong address, ...).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Batch counts reported by the peer do not match the local counts.
    #[error("count mismatch: expected {expected}, got {actual}")]
    CountMismatch {
        /// Locally expected count.
        expected: u64,
        /// Count reported or observed.
        actual: u64,
    },

    /// Peer closed the connection before the batch completed.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// Incoming frame exceeded the maximum frame length.
    #[error("frame too large: exceeds {max} bytes")]
    FrameTooLarge {
        /// Maximum frame length in bytes.
        max: usize,
    },

    /// Non-retryable transport failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Transport failure that may succeed on a later attempt (for example a
    /// refused connect while the broker is still starting).
    #[error("transport error (retryable): {0}")]
    TransportRetryable(String),

    /// Operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// Envelope state transition attempted from a terminal state.
    #[error("invalid delivery state transition: {0}")]
    InvalidTransition(String),

    /// Required configuration is missing or malformed.
    #[error("missing configuration: {0}")]
    MissingConfig(String),
}

/// Result type alias for queue operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn ssl_init_has_stable_prefix() {
        // ---
        let err = Error::SslInit("no crypto provider".into());
        assert!(err.to_string().starts_with("error initializing SSL"));
    }

    #[test]
    fn protocol_error_is_distinguishable() {
        // ---
        let err = Error::Protocol("unexpected frame".into());
        assert!(!err.to_string().starts_with("error initializing SSL"));
    }
}
