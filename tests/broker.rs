use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

use mom_queue::{
    // ---
    connect,
    receive_batch,
    send_batch,
    Address,
    Attach,
    Broker,
    ConnectConfig,
    Envelope,
    Error,
    Frame,
    FrameStream,
    ListenConfig,
    MemoryConsole,
    Result,
    Role,
    Settle,
    MESSAGE_ABORTED,
};

const WAIT: Duration = Duration::from_secs(10);

struct TestBroker {
    // ---
    broker: Broker,
    console: Arc<MemoryConsole>,
    handle: JoinHandle<Result<()>>,
}

impl TestBroker {
    // ---
    async fn start(tls: bool) -> Result<Self> {
        // ---
        let console = MemoryConsole::new();
        let broker = Broker::bind(ListenConfig::loopback(0).with_tls(tls), console.clone()).await?;
        let handle = broker.spawn();

        Ok(Self {
            broker,
            console,
            handle,
        })
    }

    fn config(&self, address: &str, count: u64) -> ConnectConfig {
        ConnectConfig::new("127.0.0.1", self.broker.port(), address)
            .with_count(count)
            .with_io_timeout(Duration::from_secs(5))
    }

    async fn shutdown(self) -> Result<()> {
        // ---
        self.broker.shutdown();
        self.handle.await.expect("broker task panicked")?;
        Ok(())
    }
}

fn bodies(range: std::ops::RangeInclusive<u64>) -> Vec<String> {
    range.map(|i| format!("{{\"sequence\"={i}}}")).collect()
}

async fn send(config: &ConnectConfig, settle: Settle) -> Result<Vec<String>> {
    let console = MemoryConsole::new();
    timeout(WAIT, send_batch(config, settle, console.clone()))
        .await
        .map_err(|_| Error::Timeout)??;
    Ok(console.lines())
}

async fn receive(config: &ConnectConfig) -> Result<Vec<String>> {
    let console = MemoryConsole::new();
    timeout(WAIT, receive_batch(config, console.clone()))
        .await
        .map_err(|_| Error::Timeout)??;
    Ok(console.lines())
}

#[tokio::test]
async fn test_listening_line_comes_first() -> Result<()> {
    // ---
    let broker = TestBroker::start(false).await?;

    let lines = broker.console.lines();
    assert_eq!(lines, vec![format!("listening on {}", broker.broker.port())]);

    broker.shutdown().await
}

#[tokio::test]
async fn test_send_then_receive() -> Result<()> {
    // ---
    let broker = TestBroker::start(false).await?;
    let config = broker.config("xtest", 10);

    let sent = send(&config, Settle::Commit).await?;
    assert_eq!(sent, vec!["10 messages sent and acknowledged".to_string()]);
    assert_eq!(broker.broker.queues().depth(&Address::from("xtest")), 10);

    let mut expected = bodies(1..=10);
    expected.push("10 messages received".into());
    assert_eq!(receive(&config).await?, expected);
    assert_eq!(broker.broker.queues().depth(&Address::from("xtest")), 0);

    broker.shutdown().await
}

#[tokio::test]
async fn test_receive_before_send() -> Result<()> {
    // ---
    // Arrange: receiver attaches to an empty queue
    let broker = TestBroker::start(false).await?;
    let config = broker.config("xtest", 10);

    let receiver_config = config.clone();
    let receiver = tokio::spawn(async move { receive(&receiver_config).await });
    sleep(Duration::from_millis(100)).await;
    assert!(!receiver.is_finished());

    // Act
    send(&config, Settle::Commit).await?;

    // Assert
    let mut expected = bodies(1..=10);
    expected.push("10 messages received".into());
    assert_eq!(receiver.await.expect("receiver panicked")?, expected);

    broker.shutdown().await
}

#[tokio::test]
async fn test_send_abort_delivers_nothing() -> Result<()> {
    // ---
    let broker = TestBroker::start(false).await?;
    let config = broker.config("xtest", 10);

    let sent = send(&config, Settle::Abort).await?;
    assert_eq!(sent, vec!["10 messages started and aborted".to_string()]);

    let lines = broker.console.lines();
    assert_eq!(lines.len(), 11);
    assert!(lines[1..].iter().all(|line| line == MESSAGE_ABORTED));
    assert_eq!(broker.broker.queues().depth(&Address::from("xtest")), 0);

    broker.shutdown().await
}

#[tokio::test]
async fn test_batches_concatenate_in_commit_order() -> Result<()> {
    // ---
    let broker = TestBroker::start(false).await?;

    send(&broker.config("xtest", 10), Settle::Commit).await?;
    send(&broker.config("xtest", 10), Settle::Commit).await?;

    let mut expected = bodies(1..=10);
    expected.extend(bodies(1..=10));
    expected.push("20 messages received".into());
    assert_eq!(receive(&broker.config("xtest", 20)).await?, expected);

    broker.shutdown().await
}

#[tokio::test]
async fn test_aborted_batch_between_commits() -> Result<()> {
    // ---
    let broker = TestBroker::start(false).await?;

    send(&broker.config("xtest", 2), Settle::Commit).await?;
    send(&broker.config("xtest", 5), Settle::Abort).await?;
    send(&broker.config("xtest", 1), Settle::Commit).await?;

    let mut expected = bodies(1..=2);
    expected.extend(bodies(1..=1));
    expected.push("3 messages received".into());
    assert_eq!(receive(&broker.config("xtest", 3)).await?, expected);

    broker.shutdown().await
}

#[tokio::test]
async fn test_addresses_are_isolated() -> Result<()> {
    // ---
    let broker = TestBroker::start(false).await?;

    send(&broker.config("a", 3), Settle::Commit).await?;
    send(&broker.config("b", 2), Settle::Commit).await?;

    let mut expected = bodies(1..=2);
    expected.push("2 messages received".into());
    assert_eq!(receive(&broker.config("b", 2)).await?, expected);

    assert_eq!(broker.broker.queues().depth(&Address::from("a")), 3);
    assert_eq!(broker.broker.queues().depth(&Address::from("b")), 0);

    broker.shutdown().await
}

#[tokio::test]
async fn test_secure_send() -> Result<()> {
    // ---
    let broker = TestBroker::start(true).await?;
    let config = broker.config("xtest", 10).with_secure(true);

    let sent = send(&config, Settle::Commit).await?;
    assert_eq!(sent.len(), 2);
    assert!(sent[0].starts_with("secure connection: "), "{sent:?}");
    assert_eq!(sent[1], "10 messages sent and acknowledged");

    // Plain receivers see envelopes committed over TLS.
    let received = receive(&broker.config("xtest", 10)).await?;
    assert_eq!(received.last().map(String::as_str), Some("10 messages received"));

    broker.shutdown().await
}

#[tokio::test]
async fn test_secure_send_without_tls_reports_ssl_error() -> Result<()> {
    // ---
    let broker = TestBroker::start(false).await?;
    let config = broker.config("xtest", 10).with_secure(true);

    let err = send(&config, Settle::Commit).await.unwrap_err();
    assert!(matches!(err, Error::SslInit(_)), "{err:?}");
    assert!(err.to_string().starts_with("error initializing SSL"));

    broker.shutdown().await
}

#[tokio::test]
async fn test_unaccepted_delivery_returns_to_front() -> Result<()> {
    // ---
    // Arrange
    let broker = TestBroker::start(false).await?;
    send(&broker.config("xtest", 3), Settle::Commit).await?;

    // Act: a raw receiver takes the first delivery and leaves without
    // accepting it.
    let config = broker.config("xtest", 3);
    let mut raw = FrameStream::new(connect(&config).await?);
    raw.write_frame(&Frame::Attach(Attach {
        role: Role::Receiver,
        address: Address::from("xtest"),
        count: 3,
    }))
    .await?;
    assert!(matches!(raw.expect_frame().await?, Frame::Attached { .. }));
    assert!(matches!(raw.expect_frame().await?, Frame::Deliver { .. }));
    raw.shutdown().await?;
    drop(raw);

    let queues = broker.broker.queues();
    timeout(WAIT, async {
        while queues.depth(&Address::from("xtest")) != 3 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .map_err(|_| Error::Timeout)?;

    // Assert
    let mut expected = bodies(1..=3);
    expected.push("3 messages received".into());
    assert_eq!(receive(&config).await?, expected);

    broker.shutdown().await
}

#[tokio::test]
async fn test_transfer_beyond_batch_gets_error_frame() -> Result<()> {
    // ---
    let broker = TestBroker::start(false).await?;
    let config = broker.config("xtest", 1);

    let mut raw = FrameStream::new(connect(&config).await?);
    raw.write_frame(&Frame::Attach(Attach {
        role: Role::Sender,
        address: Address::from("xtest"),
        count: 1,
    }))
    .await?;
    assert!(matches!(raw.expect_frame().await?, Frame::Attached { .. }));

    for sequence in 1..=2 {
        raw.write_frame(&Frame::Transfer {
            envelope: Envelope::numbered(Address::from("xtest"), sequence),
            settle: Settle::Commit,
        })
        .await?;
    }

    assert_eq!(raw.expect_frame().await?, Frame::Ack { sequence: 1 });
    assert!(matches!(raw.expect_frame().await?, Frame::Error { .. }));

    // The committed prefix stays.
    assert_eq!(broker.broker.queues().depth(&Address::from("xtest")), 1);

    broker.shutdown().await
}

#[tokio::test]
async fn test_blank_address_is_rejected() -> Result<()> {
    // ---
    let broker = TestBroker::start(false).await?;
    let config = broker.config("", 1);

    // The client refuses before connecting...
    let err = send(&config, Settle::Commit).await.unwrap_err();
    assert!(matches!(err, Error::MissingConfig(_)), "{err:?}");

    // ...and the broker refuses a raw attach.
    let mut raw = FrameStream::new(connect(&config).await?);
    raw.write_frame(&Frame::Attach(Attach {
        role: Role::Sender,
        address: Address::from(""),
        count: 1,
    }))
    .await?;
    assert!(matches!(raw.expect_frame().await?, Frame::Error { .. }));

    broker.shutdown().await
}

#[tokio::test]
async fn test_first_frame_must_be_attach() -> Result<()> {
    // ---
    let broker = TestBroker::start(false).await?;

    let mut raw = FrameStream::new(connect(&broker.config("xtest", 1)).await?);
    raw.write_frame(&Frame::Detach).await?;
    assert!(matches!(raw.expect_frame().await?, Frame::Error { .. }));

    broker.shutdown().await
}
