//! Queuing broker.
//!
//! One FIFO queue per address, created on first use and kept for the
//! broker's lifetime. Senders commit envelopes into the queue named by
//! their attach address; receivers drain it in order. Aborted envelopes
//! are reported on the console and never reach a queue.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::console::{self, ConsolePtr, MESSAGE_ABORTED};
use crate::protocol::Role;
use crate::queue::QueueRegistry;
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
    CommittedEnvelope,
    Envelope,
    Error,
    ListenConfig,
    Result,
};

/// A running queuing broker.
///
/// Cheap to clone; clones share the queues and the stop signal.
#[derive(Clone)]
pub struct Broker {
    inner: Arc<Inner>,
}

struct Inner {
    core: Arc<BrokerCore>,
    local_addr: SocketAddr,
    tls: Option<Arc<TlsIdentity>>,
    listener: std::sync::Mutex<Option<Listener>>,
    stop: StopSignal,
}

/// Per-connection logic, shared by every connection task.
struct BrokerCore {
    queues: Arc<QueueRegistry>,
    console: ConsolePtr,
}

impl Broker {
    /// Bind the listener and announce it.
    ///
    /// Prints `listening on <port>` as soon as the socket is bound, before
    /// any connection is accepted. When TLS is enabled but no identity can
    /// be generated, the broker still starts; clients asking for TLS are
    /// told it is unavailable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the address cannot be bound.
    pub async fn bind(config: ListenConfig, console: ConsolePtr) -> Result<Self> {
        // ---
        let listener = Listener::bind(&config).await?;
        let local_addr = listener.local_addr();

        let tls = if config.tls {
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

        log_info!("broker listening on {local_addr} (tls: {})", tls.is_some());
        console.line(&console::listening(local_addr.port()));

        Ok(Self {
            inner: Arc::new(Inner {
                core: Arc::new(BrokerCore {
                    queues: Arc::new(QueueRegistry::new()),
                    console,
                }),
                local_addr,
                tls,
                listener: std::sync::Mutex::new(Some(listener)),
                stop: StopSignal::new(),
            }),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    /// Port actually bound, useful when the config asked for port 0.
    pub fn port(&self) -> u16 {
        self.inner.local_addr.port()
    }

    /// The broker's queues.
    pub fn queues(&self) -> Arc<QueueRegistry> {
        self.inner.core.queues.clone()
    }

    /// Accept connections until [`shutdown`](Self::shutdown) is called.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the broker is already running.
    pub async fn run(&self) -> Result<()> {
        // ---
        let listener = crate::queue::lock_ignore_poison(&self.inner.listener)
            .take()
            .ok_or_else(|| Error::Transport("broker is already running".into()))?;
        let stop = self.inner.stop.take_receiver()?;

        accept_loop(
            listener,
            self.inner.core.clone(),
            self.inner.tls.clone(),
            stop,
        )
        .await
    }

    /// Run the accept loop on a background task.
    pub fn spawn(&self) -> JoinHandle<Result<()>> {
        // ---
        let broker = self.clone();
        tokio::spawn(async move { broker.run().await })
    }

    /// Stop accepting connections. Connections already attached finish
    /// their batches.
    pub fn shutdown(&self) {
        log_debug!("broker on {} shutting down", self.inner.local_addr);
        self.inner.stop.trigger();
    }
}

impl EnvelopeSink for BrokerCore {
    fn commit(&self, env: CommittedEnvelope) -> Result<()> {
        self.queues.enqueue(env);
        Ok(())
    }

    fn aborted(&self, _env: &Envelope) {
        self.console.line(MESSAGE_ABORTED);
    }
}

#[async_trait::async_trait]
impl SessionHandler for BrokerCore {
    async fn handle_session(&self, session: &mut Session) -> Result<()> {
        // ---
        let attach = session.attach.clone();

        match attach.role {
            Role::Sender => {
                let _outcome = serve_sender(&mut session.stream, &attach, self).await?;
                log_info!(
                    "[{}] {} ({}): {} committed, {} aborted",
                    session.id.short(),
                    attach.address,
                    session.transport(),
                    _outcome.committed,
                    _outcome.aborted
                );
            }
            Role::Receiver => {
                let queue = self.queues.queue(&attach.address);
                let _delivered = serve_receiver(&mut session.stream, &attach, &queue, |_| {}).await?;
                log_info!(
                    "[{}] {} ({}): {} delivered, {} left",
                    session.id.short(),
                    attach.address,
                    session.transport(),
                    _delivered,
                    queue.len()
                );
            }
        }
        Ok(())
    }
}
