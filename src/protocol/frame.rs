// src/protocol/frame.rs

//! Wire frames exchanged between clients and servers.
//!
//! Every frame is one JSON object on its own line, tagged by `"type"`.
//! A connection starts with an optional `start_tls` exchange followed by
//! `attach`, which fixes the connection's role, address and batch size.

use serde::{Deserialize, Serialize};

use crate::{Address, Envelope};

/// Role a client takes for the lifetime of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Produces envelopes and settles them.
    Sender,
    /// Consumes committed envelopes.
    Receiver,
}

/// Requested settlement of a transferred envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Settle {
    Commit,
    Abort,
}

/// Handshake parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attach {
    pub role: Role,
    pub address: Address,
    /// Batch size: envelopes to send (sender) or to receive (receiver).
    pub count: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    // ---
    /// Client asks for a TLS upgrade before `attach`.
    StartTls,

    /// Server will run the TLS handshake next.
    TlsReady,

    /// Server has no TLS identity to upgrade with.
    TlsUnavailable { reason: String },

    /// Client handshake.
    Attach(Attach),

    /// Server accepted the handshake.
    Attached { address: Address },

    /// Sender hands over a pending envelope together with its settlement.
    Transfer { envelope: Envelope, settle: Settle },

    /// Envelope was committed.
    Ack { sequence: u64 },

    /// Envelope was aborted.
    Aborted { sequence: u64 },

    /// Client finished its batch.
    Detach,

    /// Terminal batch summary sent to a sender.
    Summary { committed: u64, aborted: u64 },

    /// One committed envelope for a receiver.
    Deliver { envelope: Envelope },

    /// Receiver accepted a delivery.
    Accept { sequence: u64 },

    /// Receiver's requested count has been delivered.
    Done { total: u64 },

    /// Protocol error reported to the offending connection.
    Error { message: String },
}

impl Frame {
    /// Short frame name used in log and error messages.
    pub fn kind(&self) -> &'static str {
        // ---
        match self {
            Frame::StartTls => "start_tls",
            Frame::TlsReady => "tls_ready",
            Frame::TlsUnavailable { .. } => "tls_unavailable",
            Frame::Attach(_) => "attach",
            Frame::Attached { .. } => "attached",
            Frame::Transfer { .. } => "transfer",
            Frame::Ack { .. } => "ack",
            Frame::Aborted { .. } => "aborted",
            Frame::Detach => "detach",
            Frame::Summary { .. } => "summary",
            Frame::Deliver { .. } => "deliver",
            Frame::Accept { .. } => "accept",
            Frame::Done { .. } => "done",
            Frame::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn attach_wire_form() {
        // ---
        let frame = Frame::Attach(Attach {
            role: Role::Receiver,
            address: Address::from("xtest"),
            count: 10,
        });
        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(
            json,
            r#"{"type":"attach","role":"receiver","address":"xtest","count":10}"#
        );
    }

    #[test]
    fn unit_frames_are_tagged() {
        // ---
        assert_eq!(
            serde_json::to_string(&Frame::StartTls).unwrap(),
            r#"{"type":"start_tls"}"#
        );
        let parsed: Frame = serde_json::from_str(r#"{"type":"detach"}"#).unwrap();
        assert_eq!(parsed, Frame::Detach);
    }

    #[test]
    fn unknown_frame_type_is_rejected() {
        // ---
        let parsed = serde_json::from_str::<Frame>(r#"{"type":"subscribe"}"#);
        assert!(parsed.is_err());
    }
}
