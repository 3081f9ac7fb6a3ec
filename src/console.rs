//! Console output contract.
//!
//! Servers and clients report progress as plain text lines that external
//! callers parse (`listening on <port>`, `Message aborted`, summaries, one
//! line per received envelope). These lines are not logs: they go through a
//! [`Console`] so they can be captured in tests and so stdout only ever
//! carries them.
//!
//! [`StdoutConsole`] flushes after every line; the `listening on` line is a
//! readiness signal and must never sit in a buffer.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

use crate::queue::lock_ignore_poison;
use crate::{Error, Result};

/// Broker-side line printed once per aborted envelope.
pub const MESSAGE_ABORTED: &str = "Message aborted";

/// Readiness line, emitted once the listener is bound.
pub fn listening(port: u16) -> String {
    format!("listening on {port}")
}

/// Summary for a fully committed batch.
pub fn sent_and_acknowledged(count: u64) -> String {
    format!("{count} messages sent and acknowledged")
}

/// Summary for a fully aborted batch.
pub fn started_and_aborted(count: u64) -> String {
    format!("{count} messages started and aborted")
}

/// Receiver total line.
pub fn received(count: u64) -> String {
    format!("{count} messages received")
}

/// Line identifying an established TLS session.
pub fn secure_connection(session: &str) -> String {
    format!("secure connection: {session}")
}

/// Line sink for contract output.
pub trait Console: Send + Sync {
    /// Emit one line (without trailing newline).
    fn line(&self, text: &str);
}

/// Shared console pointer.
pub type ConsolePtr = Arc<dyn Console>;

/// Console writing to the process stdout, flushed per line.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutConsole;

impl StdoutConsole {
    pub fn shared() -> ConsolePtr {
        Arc::new(StdoutConsole)
    }
}

impl Console for StdoutConsole {
    fn line(&self, text: &str) {
        // ---
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        // A closed stdout leaves nothing useful to report to.
        let _ = writeln!(out, "{text}");
        let _ = out.flush();
    }
}

/// Console recording lines in memory.
///
/// # ⚠️  Testing Only
///
/// Exposed for integration tests that assert on the exact line contract.
#[derive(Default)]
pub struct MemoryConsole {
    // ---
    lines: Mutex<Vec<String>>,
    changed: Notify,
}

impl MemoryConsole {
    /// Create a new, empty console.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of every line recorded so far.
    pub fn lines(&self) -> Vec<String> {
        lock_ignore_poison(&self.lines).clone()
    }

    /// Recorded lines joined with trailing newlines, like captured stdout.
    pub fn output(&self) -> String {
        // ---
        self.lines().iter().map(|l| format!("{l}\n")).collect()
    }

    /// Wait until at least `count` lines were recorded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if fewer lines arrive within `limit`.
    pub async fn wait_for_lines(&self, count: usize, limit: Duration) -> Result<Vec<String>> {
        // ---
        let wait = async {
            loop {
                let notified = self.changed.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                let lines = self.lines();
                if lines.len() >= count {
                    return lines;
                }
                notified.await;
            }
        };
        tokio::time::timeout(limit, wait)
            .await
            .map_err(|_| Error::Timeout)
    }
}

impl Console for MemoryConsole {
    fn line(&self, text: &str) {
        // ---
        lock_ignore_poison(&self.lines).push(text.to_string());
        self.changed.notify_waiters();
    }
}
