//! Direct server: a single peer that is itself the sink or the source.
//!
//! With no intermediary, the server plays the far end of a link:
//!
//! - **sink**: senders transfer to it. Each committed body is printed, each
//!   aborted envelope prints `Message aborted`, and after `expected`
//!   commits the total is printed and the server finishes.
//! - **source**: the first receiver to attach triggers a batch of
//!   `expected` numbered envelopes. Once receivers have accepted all of
//!   them, the server prints the total and finishes.
//!
//! Which shape a run takes is decided by the peers that connect.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::console::{self, ConsolePtr, MESSAGE_ABORTED};
use crate::protocol::Role;
use crate::queue::{lock_ignore_poison, AddressQueue};
use crate::server::{
    // ---
    accept_loop,
    serve_receiver,
    serve_sender,
    EnvelopeSink,
    Session,
    SessionHandler,
    StopSignal,
};
use crate::transport::{Listener, TlsIdentity};
use crate::{
    // ---
    log_debug,
    log_info,
    log_warn,
    Address,
    CommittedEnvelope,
    DirectConfig,
    Envelope,
    Error,
    Result,
};

/// A direct server bound to its listener.
pub struct DirectServer {
    core: Arc<DirectCore>,
    listener: Mutex<Option<Listener>>,
    local_addr: SocketAddr,
    tls: Option<Arc<TlsIdentity>>,
    stop: StopSignal,
}

struct DirectCore {
    address: Address,
    expected: u64,
    console: ConsolePtr,
    state: Mutex<DirectState>,
    outbound: AddressQueue,
    finished: Notify,
}

#[derive(Default)]
struct DirectState {
    received: u64,
    generated: bool,
    /// Outbound envelopes promised to attached receivers.
    reserved: u64,
    acknowledged: u64,
    complete: bool,
}

impl DirectServer {
    /// Bind the listener and print `listening on <port>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the address cannot be bound.
    pub async fn bind(config: DirectConfig, console: ConsolePtr) -> Result<Self> {
        // ---
        let listener = Listener::bind(&config.listen).await?;
        let local_addr = listener.local_addr();

        let tls = if config.listen.tls {
            match TlsIdentity::self_signed() {
                Ok(identity) => Some(Arc::new(identity)),
                Err(_err) => {
                    log_warn!("TLS disabled: {_err}");
                    None
                }
            }
        } else {
            None
        };

        log_info!(
            "direct server for {} listening on {local_addr}, expecting {}",
            config.address,
            config.expected
        );
        console.line(&console::listening(local_addr.port()));

        Ok(Self {
            core: Arc::new(DirectCore {
                address: config.address,
                expected: config.expected,
                console,
                state: Mutex::new(DirectState::default()),
                outbound: AddressQueue::new(),
                finished: Notify::new(),
            }),
            listener: Mutex::new(Some(listener)),
            local_addr,
            tls,
            stop: StopSignal::new(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Serve until `expected` envelopes were received or handed out, or
    /// until [`shutdown`](Self::shutdown) is called.
    ///
    /// Returns after the connection that completed the run has received
    /// its final summary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the server is already running.
    pub async fn run(&self) -> Result<()> {
        // ---
        let listener = lock_ignore_poison(&self.listener)
            .take()
            .ok_or_else(|| Error::Transport("direct server is already running".into()))?;
        let stop = self.stop.take_receiver()?;

        if self.core.expected == 0 {
            self.core.finish_if_complete(true);
        }

        let core = self.core.clone();
        let done = async move {
            tokio::select! {
                _ = stop => {}
                _ = core.finished.notified() => {}
            }
        };

        accept_loop(listener, self.core.clone(), self.tls.clone(), done).await?;
        log_debug!("direct server on {} finished", self.local_addr);
        Ok(())
    }

    pub fn shutdown(&self) {
        self.stop.trigger();
    }
}

impl DirectCore {
    /// Signal the run loop once the run is complete.
    fn finish_if_complete(&self, complete: bool) {
        if complete {
            // notify_one keeps a permit if the run loop is not waiting yet.
            self.finished.notify_one();
        }
    }

    /// Set aside `count` outbound envelopes for one receiver.
    ///
    /// The outbound batch is generated the first time a receiver shows up.
    /// A receiver asking for more than is left would wait forever, so it is
    /// refused instead.
    fn reserve_outbound(&self, count: u64) -> Result<()> {
        // ---
        let mut state = lock_ignore_poison(&self.state);
        if !state.generated {
            for sequence in 1..=self.expected {
                let env = Envelope::numbered(self.address.clone(), sequence).commit()?;
                self.outbound.enqueue(env);
            }
            state.generated = true;
            log_debug!("generated {} envelopes for {}", self.expected, self.address);
        }

        let remaining = self.expected - state.reserved;
        if count > remaining {
            return Err(Error::CountMismatch {
                expected: remaining,
                actual: count,
            });
        }
        state.reserved += count;
        Ok(())
    }

    /// Hand back reservations a receiver did not use.
    fn release_outbound(&self, unused: u64) {
        lock_ignore_poison(&self.state).reserved -= unused;
    }

    fn record_acknowledged(&self) {
        // ---
        let mut state = lock_ignore_poison(&self.state);
        state.acknowledged += 1;
        if state.acknowledged == self.expected {
            self.console
                .line(&console::sent_and_acknowledged(self.expected));
            state.complete = true;
        }
    }

    fn is_complete(&self) -> bool {
        lock_ignore_poison(&self.state).complete
    }
}

impl EnvelopeSink for DirectCore {
    fn commit(&self, env: CommittedEnvelope) -> Result<()> {
        // ---
        let mut state = lock_ignore_poison(&self.state);
        if state.received >= self.expected {
            return Err(Error::Protocol(format!(
                "direct server already received its {} messages",
                self.expected
            )));
        }

        // Body line and total are printed under the lock so the total
        // always comes last.
        self.console.line(&env.body().to_string());
        state.received += 1;
        if state.received == self.expected {
            self.console.line(&console::received(self.expected));
            state.complete = true;
        }
        Ok(())
    }

    fn aborted(&self, _env: &Envelope) {
        self.console.line(MESSAGE_ABORTED);
    }
}

#[async_trait::async_trait]
impl SessionHandler for DirectCore {
    async fn handle_session(&self, session: &mut Session) -> Result<()> {
        // ---
        let attach = session.attach.clone();
        if attach.address != self.address {
            log_debug!(
                "[{}] {} attached to {} on a direct server for {}",
                session.id.short(),
                session.peer,
                attach.address,
                self.address
            );
        }

        let result = match attach.role {
            Role::Sender => serve_sender(&mut session.stream, &attach, self)
                .await
                .map(|_| ()),
            Role::Receiver => {
                self.reserve_outbound(attach.count)?;
                let mut accepted = 0;
                let result = serve_receiver(&mut session.stream, &attach, &self.outbound, |_| {
                    accepted += 1;
                    self.record_acknowledged()
                })
                .await;
                self.release_outbound(attach.count - accepted);
                result.map(|_| ())
            }
        };

        if result.is_ok() {
            log_info!(
                "[{}] {:?} on {} ({}) finished its batch of {}",
                session.id.short(),
                attach.role,
                attach.address,
                session.transport(),
                attach.count
            );
        }

        // Finish only after this connection got its summary or `done`.
        self.finish_if_complete(self.is_complete());
        result
    }
}
