//! gRPC Streaming Integration Tests
//!
//! Runs the tonic server on a random local port and talks to it through
//! the subscription client.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;

use temperature_stream::{
    ConsoleSink, RenderDispatcher, SequenceReadingGenerator, SessionTracker, StreamOutcome,
    SubscriptionDriver, TemperatureStreamServer, TemperatureStreamServerConfig,
    UnknownLocationPolicy, receive_samples,
};

const TICK: Duration = Duration::from_millis(50);
const WAIT: Duration = Duration::from_secs(5);

struct TestServer {
    url: String,
    tracker: Arc<SessionTracker>,
    shutdown: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

/// Start a test gRPC server on a random port.
async fn setup_test_server(max_sessions: usize) -> TestServer {
    let shutdown = CancellationToken::new();
    let config = TemperatureStreamServerConfig {
        tick_interval: TICK,
        max_sessions,
        ..TemperatureStreamServerConfig::default()
    };
    let server = TemperatureStreamServer::new(
        &config,
        Arc::new(SequenceReadingGenerator::default()),
        Arc::new(SessionTracker::new()),
        shutdown.clone(),
    );
    let tracker = server.tracker();

    // Find an available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        Server::builder()
            .add_service(server.into_service())
            .serve_with_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    // Give server time to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestServer {
        url: format!("http://{addr}"),
        tracker,
        shutdown,
        handle,
    }
}

fn locations(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| (*n).to_string()).collect()
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

// =============================================================================
// Subscribe and Broadcast
// =============================================================================

#[tokio::test]
async fn test_stream_covers_every_location_per_sweep() {
    let server = setup_test_server(10).await;
    let mut driver = SubscriptionDriver::connect(&server.url).await.unwrap();

    let stream = driver.subscribe(&locations(&["X", "Y"])).await.unwrap();
    let received: Vec<_> = timeout(WAIT, stream.take(6).collect::<Vec<_>>())
        .await
        .unwrap();

    assert_eq!(received.len(), 6);
    for sweep in received.chunks(2) {
        let sweep: HashSet<String> = sweep
            .iter()
            .map(|r| r.as_ref().unwrap().location.clone())
            .collect();
        assert_eq!(sweep, HashSet::from(["X".to_string(), "Y".to_string()]));
    }
    for data in &received {
        let data = data.as_ref().unwrap();
        assert!(data.timestamp.ends_with('Z'));
        assert!(data.temperature.is_finite());
    }

    server.handle.abort();
}

#[tokio::test]
async fn test_duplicate_locations_are_streamed_once() {
    let server = setup_test_server(10).await;
    let mut driver = SubscriptionDriver::connect(&server.url).await.unwrap();

    let stream = driver.subscribe(&locations(&["X", "X", "X"])).await.unwrap();
    let received: Vec<_> = timeout(WAIT, stream.take(3).collect::<Vec<_>>())
        .await
        .unwrap();

    assert!(received.iter().all(|r| r.as_ref().unwrap().location == "X"));
    assert_eq!(server.tracker.counts().broadcasting, 1);

    server.handle.abort();
}

#[tokio::test]
async fn test_sessions_have_independent_registries() {
    let server = setup_test_server(10).await;
    let mut first = SubscriptionDriver::connect(&server.url).await.unwrap();
    let mut second = SubscriptionDriver::connect(&server.url).await.unwrap();

    let a = first.subscribe(&locations(&["A"])).await.unwrap();
    let b = second.subscribe(&locations(&["B", "C"])).await.unwrap();

    let (a, b) = tokio::join!(
        timeout(WAIT, a.take(3).collect::<Vec<_>>()),
        timeout(WAIT, b.take(4).collect::<Vec<_>>()),
    );

    assert!(a.unwrap().iter().all(|r| r.as_ref().unwrap().location == "A"));
    let b: HashSet<String> = b
        .unwrap()
        .iter()
        .map(|r| r.as_ref().unwrap().location.clone())
        .collect();
    assert_eq!(b, HashSet::from(["B".to_string(), "C".to_string()]));

    server.handle.abort();
}

// =============================================================================
// Session Pool
// =============================================================================

#[tokio::test]
async fn test_full_pool_queues_until_a_session_ends() {
    let server = setup_test_server(1).await;
    let mut first = SubscriptionDriver::connect(&server.url).await.unwrap();
    let mut second = SubscriptionDriver::connect(&server.url).await.unwrap();

    let mut first_stream = first.subscribe(&locations(&["A"])).await.unwrap();
    timeout(WAIT, first_stream.message()).await.unwrap().unwrap().unwrap();

    let mut second_stream = second.subscribe(&locations(&["B"])).await.unwrap();
    let tracker = Arc::clone(&server.tracker);
    wait_until(|| tracker.counts().queued == 1).await;
    assert_eq!(tracker.counts().active(), 1);

    drop(first_stream);

    let data = timeout(WAIT, second_stream.message())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(data.location, "B");
    assert_eq!(tracker.counts().queued, 0);

    server.handle.abort();
}

// =============================================================================
// Client Receive Loop
// =============================================================================

#[tokio::test]
async fn test_receive_loop_renders_until_cancelled() {
    let server = setup_test_server(10).await;
    let mut driver = SubscriptionDriver::connect(&server.url).await.unwrap();
    let layout = locations(&["X", "Y"]);

    let mut dispatcher = RenderDispatcher::new(
        ConsoleSink::new(Vec::new()),
        NonZeroUsize::new(20).unwrap(),
        UnknownLocationPolicy::Drop,
    );
    dispatcher.initialize(&layout).unwrap();

    let stream = driver.subscribe(&layout).await.unwrap();
    let cancel = CancellationToken::new();
    let stopper = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(TICK * 5).await;
        stopper.cancel();
    });

    let summary = receive_samples(stream, &mut dispatcher, &cancel).await;

    assert!(matches!(summary.outcome, StreamOutcome::Cancelled));
    assert!(summary.received >= 2);
    assert_eq!(dispatcher.stats().rendered, summary.received);
    for location in ["X", "Y"] {
        assert!(!dispatcher.store().window(location).unwrap().is_empty());
    }

    server.handle.abort();
}

#[tokio::test]
async fn test_server_shutdown_ends_client_stream_cleanly() {
    let server = setup_test_server(10).await;
    let mut driver = SubscriptionDriver::connect(&server.url).await.unwrap();
    let layout = locations(&["X"]);

    let mut dispatcher = RenderDispatcher::new(
        ConsoleSink::new(Vec::new()),
        NonZeroUsize::new(20).unwrap(),
        UnknownLocationPolicy::Drop,
    );
    dispatcher.initialize(&layout).unwrap();

    let stream = driver.subscribe(&layout).await.unwrap();
    let shutdown = server.shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(TICK * 3).await;
        shutdown.cancel();
    });

    let summary = timeout(
        WAIT,
        receive_samples(stream, &mut dispatcher, &CancellationToken::new()),
    )
    .await
    .unwrap();

    assert!(matches!(summary.outcome, StreamOutcome::ServerClosed));
    assert!(summary.received >= 1);
    wait_until(|| server.tracker.is_empty()).await;
    assert_eq!(server.tracker.counts().closed_total, 1);

    server.handle.abort();
}

/// Run a server on its own runtime; sending on the returned channel drops
/// that runtime with every connection still open.
fn spawn_server_runtime() -> (
    String,
    tokio::sync::oneshot::Sender<()>,
    std::thread::JoinHandle<()>,
) {
    let (addr_tx, addr_rx) = std::sync::mpsc::channel();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

    let thread = std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            addr_tx.send(listener.local_addr().unwrap()).unwrap();

            let config = TemperatureStreamServerConfig {
                tick_interval: TICK,
                ..TemperatureStreamServerConfig::default()
            };
            let server = TemperatureStreamServer::new(
                &config,
                Arc::new(SequenceReadingGenerator::default()),
                Arc::new(SessionTracker::new()),
                CancellationToken::new(),
            );
            tokio::spawn(
                Server::builder()
                    .add_service(server.into_service())
                    .serve_with_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener)),
            );

            let _ = stop_rx.await;
        });

        runtime.shutdown_background();
    });

    let addr = addr_rx.recv_timeout(WAIT).unwrap();
    (format!("http://{addr}"), stop_tx, thread)
}

#[tokio::test]
async fn test_server_killed_mid_broadcast_fails_the_channel() {
    let (url, stop, thread) = spawn_server_runtime();
    let mut driver = SubscriptionDriver::connect(&url).await.unwrap();
    let layout = locations(&["X"]);

    let mut dispatcher = RenderDispatcher::new(
        ConsoleSink::new(Vec::new()),
        NonZeroUsize::new(20).unwrap(),
        UnknownLocationPolicy::Drop,
    );
    dispatcher.initialize(&layout).unwrap();

    let stream = driver.subscribe(&layout).await.unwrap();
    tokio::spawn(async move {
        tokio::time::sleep(TICK * 4).await;
        let _ = stop.send(());
    });

    let summary = timeout(
        WAIT,
        receive_samples(stream, &mut dispatcher, &CancellationToken::new()),
    )
    .await
    .unwrap();

    assert!(
        matches!(summary.outcome, StreamOutcome::ChannelFailed(_)),
        "unexpected outcome: {:?}",
        summary.outcome
    );
    assert!(summary.received >= 1);
    assert_eq!(dispatcher.stats().rendered, summary.received);

    thread.join().unwrap();
}

#[tokio::test]
async fn test_connect_to_missing_server_fails() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = SubscriptionDriver::connect(&format!("http://{addr}")).await;
    assert!(result.is_err());
}
