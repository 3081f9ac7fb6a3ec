//! Listener and connection configuration.
//!
//! Plain value types with `with_*` setters. Nothing here opens sockets;
//! servers and clients interpret these values when they start.

use std::time::Duration;

use crate::Address;

/// Port used when none is given.
pub const DEFAULT_PORT: u16 = 5672;

/// Address used by the direct server and the example programs when none is
/// given.
pub const DEFAULT_ADDRESS: &str = "examples";

/// Batch size used by the direct server and the example programs when none
/// is given.
pub const DEFAULT_COUNT: u64 = 10;

/// Default per-operation I/O timeout for clients.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(30);

/// Where and how a server listens.
#[derive(Debug, Clone)]
pub struct ListenConfig {
    // ---
    /// Host to bind. Empty means all interfaces.
    pub host: String,

    /// Port to bind. 0 requests an ephemeral port.
    pub port: u16,

    /// Offer TLS upgrades to clients that ask for one.
    pub tls: bool,
}

impl ListenConfig {
    /// Listen on `host:port` with TLS upgrades enabled.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            tls: true,
        }
    }

    /// Listen on the IPv4 loopback interface.
    pub fn loopback(port: u16) -> Self {
        Self::new("127.0.0.1", port)
    }

    /// Enable or disable TLS upgrades.
    pub fn with_tls(mut self, enabled: bool) -> Self {
        self.tls = enabled;
        self
    }

    pub(crate) fn bind_host(&self) -> &str {
        if self.host.is_empty() {
            "0.0.0.0"
        } else {
            &self.host
        }
    }
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self::new("", DEFAULT_PORT)
    }
}

/// Where a client connects and what batch it runs.
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    // ---
    /// Server host. Empty means the IPv4 loopback address.
    pub host: String,

    /// Server port.
    pub port: u16,

    /// Address to send to or receive from.
    pub address: Address,

    /// Batch size.
    pub count: u64,

    /// Request a TLS upgrade before the handshake.
    pub secure: bool,

    /// Optional retry configuration for refused connects.
    pub retry: Option<RetryConfig>,

    /// Timeout for connecting and for each frame exchange that expects a
    /// prompt reply.
    ///
    /// Waiting for deliveries on an empty queue is not bounded by this.
    ///
    /// Default: 30 seconds
    pub io_timeout: Duration,
}

impl ConnectConfig {
    /// Create a config for a batch of [`DEFAULT_COUNT`] envelopes.
    pub fn new(host: impl Into<String>, port: u16, address: impl Into<Address>) -> Self {
        Self {
            host: host.into(),
            port,
            address: address.into(),
            count: DEFAULT_COUNT,
            secure: false,
            retry: None,
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }

    /// Set the batch size.
    pub fn with_count(mut self, count: u64) -> Self {
        self.count = count;
        self
    }

    /// Request a TLS upgrade.
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Retry refused connects with exponential backoff.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Set the I/O timeout.
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub(crate) fn connect_host(&self) -> &str {
        if self.host.is_empty() {
            "127.0.0.1"
        } else {
            &self.host
        }
    }
}

/// Backoff policy for connects refused while the server is not up yet.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    // ---
    /// Retries after the first attempt. 0 means a single attempt.
    pub max_attempts: u32,

    /// Growth factor of the delay between retries.
    pub multiplier: f32,

    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Upper bound of the delay before jitter.
    pub max_delay: Duration,
}

impl RetryConfig {
    /// Delay before retry number `attempt`, counting from 1.
    ///
    /// `initial_delay * multiplier^(attempt - 1)`, capped at `max_delay`,
    /// then spread by up to 25 % either way so that clients started
    /// together do not retry in lockstep.
    pub fn backoff(&self, attempt: u32) -> Duration {
        // ---
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let grown = self.initial_delay.as_secs_f64() * f64::from(self.multiplier).powi(exponent);
        let capped = grown.min(self.max_delay.as_secs_f64());

        let spread = (uuid::Uuid::new_v4().as_u128() % 501) as f64 / 1000.0;
        Duration::from_secs_f64(capped * (0.75 + spread))
    }
}

impl Default for RetryConfig {
    /// Three retries starting at 100 ms, doubling up to 5 s.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            multiplier: 2.0,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// Configuration of a direct server.
#[derive(Debug, Clone)]
pub struct DirectConfig {
    // ---
    pub listen: ListenConfig,

    /// Address advertised to receivers.
    pub address: Address,

    /// Envelopes to take in as a sink, or to hand out as a source, before
    /// the server finishes.
    pub expected: u64,
}

impl DirectConfig {
    pub fn new(listen: ListenConfig) -> Self {
        Self {
            listen,
            address: Address::from(DEFAULT_ADDRESS),
            expected: DEFAULT_COUNT,
        }
    }

    pub fn with_address(mut self, address: impl Into<Address>) -> Self {
        self.address = address.into();
        self
    }

    pub fn with_expected(mut self, expected: u64) -> Self {
        self.expected = expected;
        self
    }
}
