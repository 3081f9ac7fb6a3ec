//! Domain layer public interface.
//!
//! This module defines the delivery-level abstractions (addresses, envelopes
//! and their settlement states) that are independent of sockets, framing or
//! TLS.
//!
//! All domain consumers must import symbols via this module, not by
//! referencing individual files directly.

mod envelope;

// --- Envelope domain re-exports ---

pub use envelope::{
    //
    Address,
    Body,
    CommittedEnvelope,
    DeliveryState,
    Envelope,
    SEQUENCE_KEY,
};
