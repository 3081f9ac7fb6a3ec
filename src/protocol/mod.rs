//! Wire protocol: frame types and line-delimited JSON framing.
//!
//! This module defines what travels over a connection. It knows nothing
//! about queues or console output.
mod codec;
mod frame;

pub use codec::{FrameStream, MAX_FRAME_LEN};
pub use frame::{Attach, Frame, Role, Settle};
