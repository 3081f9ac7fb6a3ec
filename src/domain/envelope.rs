// src/domain/envelope.rs

//! Envelope domain types.
//!
//! An [`Envelope`] is the unit exchanged between senders, the broker and
//! receivers. Its delivery state is a tagged variant: an envelope is created
//! `Pending` and makes exactly one terminal transition, either to
//! `Committed` or to `Aborted`.
//!
//! Only a [`CommittedEnvelope`] can be enqueued. That type can only be
//! produced by [`Envelope::commit`], so an aborted envelope is never even
//! transiently visible to a queue.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Body key carrying the batch sequence number.
pub const SEQUENCE_KEY: &str = "sequence";

/// A logical destination address.
///
/// Addresses are immutable, cheap to clone, and safe to share across
/// threads. The broker treats them as opaque, exact-match keys.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub Arc<str>);

impl Address {
    /// Borrow the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` when the address is empty or only whitespace.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl<T> From<T> for Address
where
    T: Into<Arc<str>>,
{
    fn from(value: T) -> Self {
        // ---
        Address(value.into())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Delivery state of an envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    /// Created by a sender, not yet settled.
    Pending,
    /// Settled into a queue; visible to receivers.
    Committed,
    /// Discarded; never visible to receivers.
    Aborted,
}

/// A small structured message body.
///
/// Rendered by [`fmt::Display`] in the fixed record format used by receivers,
/// e.g. `{"sequence"=3}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Body(pub BTreeMap<String, serde_json::Value>);

impl Body {
    /// Body carrying only the batch sequence number.
    pub fn sequence(sequence: u64) -> Self {
        // ---
        let mut fields = BTreeMap::new();
        fields.insert(SEQUENCE_KEY.to_string(), serde_json::Value::from(sequence));
        Self(fields)
    }

    /// The embedded sequence number, if present.
    pub fn sequence_number(&self) -> Option<u64> {
        self.0.get(SEQUENCE_KEY).and_then(serde_json::Value::as_u64)
    }
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        f.write_str("{")?;
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "\"{key}\"={value}")?;
        }
        f.write_str("}")
    }
}

/// A message envelope.
///
/// `sequence` is scoped to one send batch: it starts at 1 and restarts for
/// every new batch, so it is not a unique identifier across batches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    // ---
    /// Position of the envelope within its send batch (1-based).
    pub sequence: u64,

    /// Destination address.
    pub address: Address,

    /// Opaque payload.
    pub body: Body,

    /// Current delivery state.
    pub state: DeliveryState,
}

impl Envelope {
    /// Create a pending envelope.
    pub fn pending(sequence: u64, address: Address, body: Body) -> Self {
        // ---
        Self {
            sequence,
            address,
            body,
            state: DeliveryState::Pending,
        }
    }

    /// Create a pending envelope whose body embeds its sequence number.
    pub fn numbered(address: Address, sequence: u64) -> Self {
        Self::pending(sequence, address, Body::sequence(sequence))
    }

    /// `true` while the envelope has not been settled.
    pub fn is_pending(&self) -> bool {
        self.state == DeliveryState::Pending
    }

    /// Transition `Pending → Committed`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] if the envelope was already
    /// settled.
    pub fn commit(mut self) -> Result<CommittedEnvelope> {
        // ---
        self.require_pending("commit")?;
        self.state = DeliveryState::Committed;
        Ok(CommittedEnvelope(self))
    }

    /// Transition `Pending → Aborted`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] if the envelope was already
    /// settled.
    pub fn abort(mut self) -> Result<Envelope> {
        // ---
        self.require_pending("abort")?;
        self.state = DeliveryState::Aborted;
        Ok(self)
    }

    fn require_pending(&self, op: &str) -> Result<()> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(Error::InvalidTransition(format!(
                "cannot {op} envelope {} in state {:?}",
                self.sequence, self.state
            )))
        }
    }
}

/// An envelope that has been committed and may be enqueued.
#[derive(Clone, Debug, PartialEq)]
pub struct CommittedEnvelope(Envelope);

impl CommittedEnvelope {
    pub fn sequence(&self) -> u64 {
        self.0.sequence
    }

    pub fn address(&self) -> &Address {
        &self.0.address
    }

    pub fn body(&self) -> &Body {
        &self.0.body
    }

    /// Borrow the underlying envelope (state is always `Committed`).
    pub fn as_envelope(&self) -> &Envelope {
        &self.0
    }

    pub fn into_envelope(self) -> Envelope {
        self.0
    }
}
