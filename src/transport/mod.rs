//! Transport implementations.
//!
//! This module provides the byte-stream layer under the wire protocol:
//! plain TCP listeners and connectors, and the TLS upgrade applied to an
//! already established stream.
//!
//! Protocol and queue code must only depend on [`BoxedStream`], never on
//! the concrete stream types.

mod tcp;
mod tls;

pub use tcp::{connect, AsyncStream, BoxedStream, Listener};
pub use tls::{TlsClient, TlsIdentity, TLS_HANDSHAKE_TIMEOUT};
