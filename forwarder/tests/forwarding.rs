use anomaly::{AnomalyWarning, Thresholds};
use async_trait::async_trait;
use forwarder::{
    Forwarder, Reading, Sink, SinkError,
    config::ListenerConfig,
    sink::ChannelSink,
};
use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use telemetry_protocol::{Framing, TelemetryRecord, encode_synced};
use tokio::{
    io::AsyncWriteExt,
    net::TcpStream,
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

struct Running {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<Result<(), forwarder::TransportError>>,
}

async fn start(framing: Framing, sink: Arc<dyn Sink>) -> Running {
    start_with(
        ListenerConfig {
            framing,
            ..local_config()
        },
        sink,
    )
    .await
}

fn local_config() -> ListenerConfig {
    ListenerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        failure_backoff_ms: 0,
        ..ListenerConfig::default()
    }
}

async fn start_with(config: ListenerConfig, sink: Arc<dyn Sink>) -> Running {
    let forwarder = Forwarder::bind(&config, Thresholds::default(), sink)
        .await
        .unwrap();
    let addr = forwarder.local_addr().unwrap();
    let (shutdown, rx) = oneshot::channel();
    let handle = tokio::spawn(forwarder.run(rx));

    Running {
        addr,
        shutdown,
        handle,
    }
}

async fn recv(rx: &mut mpsc::UnboundedReceiver<Reading>) -> Reading {
    tokio::time::timeout(RECV_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for a reading")
        .expect("sink channel closed")
}

async fn send_and_close(addr: SocketAddr, bytes: &[u8]) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(bytes).await.unwrap();
    stream.shutdown().await.unwrap();
}

fn record(t: f32, voltage: f32) -> TelemetryRecord {
    TelemetryRecord::new(t, voltage, 25.0, 25.0)
}

#[tokio::test]
async fn back_to_back_records_arrive_in_order() {
    let (sink, mut rx) = ChannelSink::new();
    let running = start(Framing::Raw, Arc::new(sink)).await;

    let records = [record(0.0, 355.2), record(1.0, 42.3), record(2.0, 520.0)];
    let bytes: Vec<u8> = records.iter().flat_map(|r| r.encode()).collect();
    send_and_close(running.addr, &bytes).await;

    let first = recv(&mut rx).await;
    assert_eq!(first.record, records[0]);
    assert_eq!(first.warning, None);

    let second = recv(&mut rx).await;
    assert_eq!(second.record, records[1]);
    assert_eq!(second.warning, Some(AnomalyWarning::LowVoltage(42.3)));

    let third = recv(&mut rx).await;
    assert_eq!(third.record, records[2]);
    assert_eq!(third.warning, Some(AnomalyWarning::HighVoltage(520.0)));

    // The forwarder goes back to accepting after a client leaves.
    send_and_close(running.addr, &record(3.0, 355.2).encode()).await;
    assert_eq!(recv(&mut rx).await.record.timestamp, 3.0);
}

#[tokio::test]
async fn short_read_forwards_nothing() {
    let (sink, mut rx) = ChannelSink::new();
    let running = start(Framing::Raw, Arc::new(sink)).await;

    send_and_close(running.addr, &record(0.0, 355.2).encode()[..8]).await;
    send_and_close(running.addr, &record(1.0, 355.2).encode()).await;

    // Only the complete record from the second connection shows up.
    assert_eq!(recv(&mut rx).await.record.timestamp, 1.0);
    assert!(rx.try_recv().is_err());
}

struct FailingSink {
    attempts: AtomicUsize,
}

#[async_trait]
impl Sink for FailingSink {
    async fn deliver(&self, _reading: &Reading) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(SinkError::Status {
            status: 503,
            body: "unavailable".to_string(),
        })
    }
}

#[tokio::test]
async fn failed_deliveries_are_dropped_and_reading_continues() {
    let sink = Arc::new(FailingSink {
        attempts: AtomicUsize::new(0),
    });
    let running = start(Framing::Raw, sink.clone()).await;

    let bytes: Vec<u8> = (0..5).flat_map(|t| record(t as f32, 355.2).encode()).collect();
    send_and_close(running.addr, &bytes).await;

    tokio::time::timeout(RECV_TIMEOUT, async {
        while sink.attempts.load(Ordering::SeqCst) < 5 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("every record should reach the sink once");
    assert_eq!(sink.attempts.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn synced_framing_recovers_from_garbage() {
    let (sink, mut rx) = ChannelSink::new();
    let running = start(Framing::Synced, Arc::new(sink)).await;

    let mut bytes = vec![0x00, 0xA5, 0x13, 0x37];
    bytes.extend_from_slice(&encode_synced(&record(0.0, 355.2)));
    let mut corrupted = encode_synced(&record(1.0, 355.2));
    corrupted[6] ^= 0xFF;
    bytes.extend_from_slice(&corrupted);
    bytes.extend_from_slice(&encode_synced(&record(2.0, 355.2)));
    send_and_close(running.addr, &bytes).await;

    assert_eq!(recv(&mut rx).await.record.timestamp, 0.0);
    assert_eq!(recv(&mut rx).await.record.timestamp, 2.0);
}

#[tokio::test]
async fn concurrent_connections_keep_their_own_order() {
    let (sink, mut rx) = ChannelSink::new();
    let running = start(Framing::Raw, Arc::new(sink)).await;

    // Two producers identified by voltage, interleaving their writes.
    let mut a = TcpStream::connect(running.addr).await.unwrap();
    let mut b = TcpStream::connect(running.addr).await.unwrap();
    for t in 0..10 {
        a.write_all(&record(t as f32, 300.0).encode()).await.unwrap();
        b.write_all(&record(t as f32, 400.0).encode()).await.unwrap();
    }
    a.shutdown().await.unwrap();
    b.shutdown().await.unwrap();

    let mut from_a = Vec::new();
    let mut from_b = Vec::new();
    for _ in 0..20 {
        let reading = recv(&mut rx).await;
        if reading.record.pack_voltage == 300.0 {
            from_a.push(reading.record.timestamp);
        } else {
            from_b.push(reading.record.timestamp);
        }
    }

    let expected: Vec<f32> = (0..10).map(|t| t as f32).collect();
    assert_eq!(from_a, expected);
    assert_eq!(from_b, expected);
}

#[tokio::test]
async fn shutdown_stops_accepting() {
    let (sink, _rx) = ChannelSink::new();
    let running = start(Framing::Raw, Arc::new(sink)).await;

    running.shutdown.send(()).unwrap();
    let result = tokio::time::timeout(RECV_TIMEOUT, running.handle)
        .await
        .expect("forwarder did not stop")
        .unwrap();
    assert!(result.is_ok());

    assert!(TcpStream::connect(running.addr).await.is_err());
}

#[tokio::test]
async fn open_connections_finish_after_shutdown() {
    let (sink, mut rx) = ChannelSink::new();
    let running = start(Framing::Raw, Arc::new(sink)).await;

    let mut producer = TcpStream::connect(running.addr).await.unwrap();
    producer.write_all(&record(0.0, 355.2).encode()).await.unwrap();
    assert_eq!(recv(&mut rx).await.record.timestamp, 0.0);

    running.shutdown.send(()).unwrap();
    producer.write_all(&record(1.0, 355.2).encode()).await.unwrap();
    assert_eq!(recv(&mut rx).await.record.timestamp, 1.0);

    // The producer is still connected, so the forwarder keeps waiting.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!running.handle.is_finished());

    producer.shutdown().await.unwrap();
    let result = tokio::time::timeout(RECV_TIMEOUT, running.handle)
        .await
        .expect("forwarder did not stop after the last connection closed")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn lingering_connections_are_aborted_after_the_grace_period() {
    let (sink, mut rx) = ChannelSink::new();
    let config = ListenerConfig {
        shutdown_grace_ms: 50,
        ..local_config()
    };
    let running = start_with(config, Arc::new(sink)).await;

    let mut producer = TcpStream::connect(running.addr).await.unwrap();
    producer.write_all(&record(0.0, 355.2).encode()).await.unwrap();
    assert_eq!(recv(&mut rx).await.record.timestamp, 0.0);

    running.shutdown.send(()).unwrap();
    let result = tokio::time::timeout(RECV_TIMEOUT, running.handle)
        .await
        .expect("forwarder did not abort the open connection")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn bind_failure_is_reported() {
    let (sink, _rx) = ChannelSink::new();
    let running = start(Framing::Raw, Arc::new(sink)).await;

    let (other, _other_rx) = ChannelSink::new();
    let config = ListenerConfig {
        host: "127.0.0.1".to_string(),
        port: running.addr.port(),
        ..ListenerConfig::default()
    };
    let result = Forwarder::bind(&config, Thresholds::default(), Arc::new(other)).await;

    assert!(matches!(
        result,
        Err(forwarder::TransportError::Bind { .. })
    ));
}
