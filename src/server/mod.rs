//! Server-side connection handling shared by the broker and the direct
//! server.

mod receiver;
mod runner;
mod sender;
mod session;

pub use receiver::serve_receiver;
pub use runner::{accept_loop, SessionHandler};
pub use sender::{serve_sender, BatchOutcome, EnvelopeSink};
pub use session::{open_session, Session, HANDSHAKE_TIMEOUT};

pub(crate) use runner::StopSignal;
