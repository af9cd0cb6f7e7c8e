//! gRPC Streaming Server Implementation
//!
//! Implements the `TemperatureService` gRPC service. Every call is handed to
//! a spawned session task; the response stream is the receiving end of that
//! task's bounded outbound channel.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio_stream::Stream;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status, Streaming};

use super::convert::sample_to_proto;
use super::proto::temperature::v1::{
    TemperatureData, TemperatureRequest,
    temperature_service_server::{TemperatureService, TemperatureServiceServer},
};
use super::sessions::SessionTracker;
use crate::application::ports::{OutboundClosed, ReadingGenerator, SampleOutbound};
use crate::application::services::SessionRunner;
use crate::domain::sample::Sample;
use crate::domain::session::SessionId;
use crate::infrastructure::metrics;

// =============================================================================
// Type Aliases
// =============================================================================

type StreamResult<T> = Result<Response<T>, Status>;
type BoxedStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

// =============================================================================
// Server Configuration
// =============================================================================

/// Configuration for the gRPC streaming server.
#[derive(Debug, Clone)]
pub struct TemperatureStreamServerConfig {
    /// Broadcast tick interval.
    pub tick_interval: Duration,
    /// Maximum concurrent sessions; further streams queue for a slot.
    pub max_sessions: usize,
    /// Per-session outbound buffer, in samples.
    pub session_buffer: usize,
}

impl Default for TemperatureStreamServerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            max_sessions: 10,
            session_buffer: 64,
        }
    }
}

// =============================================================================
// Outbound Adapter
// =============================================================================

/// Write half of one gRPC stream.
#[derive(Debug)]
struct GrpcOutbound {
    tx: mpsc::Sender<Result<TemperatureData, Status>>,
}

#[async_trait]
impl SampleOutbound for GrpcOutbound {
    async fn emit(&self, sample: Sample) -> Result<(), OutboundClosed> {
        self.tx
            .send(Ok(sample_to_proto(&sample)))
            .await
            .map_err(|_| OutboundClosed)?;
        metrics::record_samples_sent(1);
        Ok(())
    }

    async fn closed(&self) {
        self.tx.closed().await;
    }
}

// =============================================================================
// Server Implementation
// =============================================================================

/// gRPC streaming server for synthetic temperature samples.
#[derive(Debug, Clone)]
pub struct TemperatureStreamServer {
    runner: SessionRunner,
    slots: Arc<Semaphore>,
    tracker: Arc<SessionTracker>,
    session_buffer: usize,
    cancel: CancellationToken,
}

impl TemperatureStreamServer {
    /// Create a new server.
    ///
    /// Sessions observe `cancel`; cancelling it ends every open session and
    /// releases queued ones.
    #[must_use]
    pub fn new(
        config: &TemperatureStreamServerConfig,
        generator: Arc<dyn ReadingGenerator>,
        tracker: Arc<SessionTracker>,
        cancel: CancellationToken,
    ) -> Self {
        let runner = SessionRunner::new(generator, config.tick_interval, cancel.clone())
            .with_observer(tracker.clone());
        Self {
            runner,
            slots: Arc::new(Semaphore::new(config.max_sessions.max(1))),
            tracker,
            session_buffer: config.session_buffer.max(1),
            cancel,
        }
    }

    /// Session tracker shared with the health endpoint.
    #[must_use]
    pub fn tracker(&self) -> Arc<SessionTracker> {
        Arc::clone(&self.tracker)
    }

    /// Free session slots.
    #[must_use]
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Wrap in the generated tonic service.
    #[must_use]
    pub fn into_service(self) -> TemperatureServiceServer<Self> {
        TemperatureServiceServer::new(self)
    }
}

#[tonic::async_trait]
impl TemperatureService for TemperatureStreamServer {
    type StreamTemperatureStream = BoxedStream<TemperatureData>;

    async fn stream_temperature(
        &self,
        request: Request<Streaming<TemperatureRequest>>,
    ) -> StreamResult<Self::StreamTemperatureStream> {
        let peer = request
            .remote_addr()
            .map_or_else(|| "unknown".to_string(), |addr| addr.to_string());
        let inbound = request.into_inner().map(|req| req.map(|r| r.location));

        let session_id: SessionId = uuid::Uuid::new_v4().as_u64_pair().0;
        let (tx, rx) = mpsc::channel(self.session_buffer);

        let runner = self.runner.clone();
        let slots = Arc::clone(&self.slots);
        let tracker = Arc::clone(&self.tracker);
        let cancel = self.cancel.clone();

        tracing::info!(session_id, peer = %peer, "Stream opened");

        tokio::spawn(async move {
            let Some(_permit) = acquire_slot(slots, &tracker, &cancel, &tx).await else {
                tracing::debug!(session_id, "Stream ended before a session slot was free");
                return;
            };

            let outbound = GrpcOutbound { tx };
            runner.run(session_id, inbound, &outbound).await;
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }
}

/// Take a session slot, queueing only when none is free.
///
/// Returns `None` if shutdown starts or the peer leaves while queued.
async fn acquire_slot(
    slots: Arc<Semaphore>,
    tracker: &SessionTracker,
    cancel: &CancellationToken,
    tx: &mpsc::Sender<Result<TemperatureData, Status>>,
) -> Option<OwnedSemaphorePermit> {
    if let Ok(permit) = Arc::clone(&slots).try_acquire_owned() {
        return Some(permit);
    }

    tracker.enqueue();
    let permit = tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        () = tx.closed() => None,
        permit = slots.acquire_owned() => permit.ok(),
    };
    tracker.dequeue();
    permit
}

// =============================================================================
// Tests
// =============================================================================
