//! Address-scoped message queuing over TCP.
//!
//! A [`Broker`] keeps one FIFO queue per address. Senders transfer
//! numbered envelopes and settle each one by committing it (it becomes
//! visible to receivers) or aborting it (it is dropped and reported).
//! Receivers drain committed envelopes in order, blocking on an empty
//! queue. A [`DirectServer`] plays the far end of a link itself, without a
//! queue in between. Senders may upgrade their connection to TLS before
//! attaching.
//!
//! Progress is reported as plain console lines through a [`Console`];
//! diagnostics go through `tracing` when the `logging` feature is on.

// Import all sub modules once...
mod macros;

mod broker;
mod client;
mod config;
mod connection_id;
mod console;
mod direct;
mod domain;
mod error;
mod protocol;
mod queue;
mod server;
mod transport;

pub(crate) use macros::{log_debug, log_error, log_info, log_trace, log_warn};

// --- public re-exports
pub use broker::Broker;
pub use client::{receive_batch, send_batch, SendReport};
pub use config::{
    // ---
    ConnectConfig,
    DirectConfig,
    ListenConfig,
    RetryConfig,
    DEFAULT_ADDRESS,
    DEFAULT_COUNT,
    DEFAULT_IO_TIMEOUT,
    DEFAULT_PORT,
};
pub use connection_id::ConnectionId;
pub use console::{
    // ---
    listening,
    received,
    secure_connection,
    sent_and_acknowledged,
    started_and_aborted,
    Console,
    ConsolePtr,
    MemoryConsole,
    StdoutConsole,
    MESSAGE_ABORTED,
};
pub use direct::DirectServer;
pub use domain::{
    // ---
    Address,
    Body,
    CommittedEnvelope,
    DeliveryState,
    Envelope,
    SEQUENCE_KEY,
};
pub use error::{Error, Result};
pub use protocol::{Attach, Frame, FrameStream, Role, Settle, MAX_FRAME_LEN};
pub use queue::{AddressQueue, QueueRegistry};
pub use server::{BatchOutcome, EnvelopeSink, HANDSHAKE_TIMEOUT};
pub use transport::{connect, AsyncStream, BoxedStream, Listener, TlsClient, TlsIdentity, TLS_HANDSHAKE_TIMEOUT};
