//! gRPC Subscription Client
//!
//! Client half of the stream: send every configured location, close the
//! send half, then consume samples until the stream ends.
//!
//! The request stream is finite, so tonic closes the client's send half as
//! soon as the last location is written. No request can follow the first
//! sample.

use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, Endpoint};
use tonic::{Status, Streaming};

use super::convert::sample_from_proto;
use super::proto::temperature::v1::{
    TemperatureData, TemperatureRequest, temperature_service_client::TemperatureServiceClient,
};
use crate::application::ports::{SinkError, VisualizationSink};
use crate::application::services::RenderDispatcher;
use crate::domain::sample::Location;

/// Connect timeout for the initial channel.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Errors
// =============================================================================

/// Client startup errors.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server URL is not a valid endpoint.
    #[error("invalid server url {url:?}: {source}")]
    InvalidEndpoint {
        /// URL as configured.
        url: String,
        /// Underlying error.
        source: tonic::transport::Error,
    },

    /// The server could not be reached.
    #[error("failed to connect to {url}: {source}")]
    Connect {
        /// URL as configured.
        url: String,
        /// Underlying error.
        source: tonic::transport::Error,
    },

    /// The server rejected the stream.
    #[error("stream rejected: {0}")]
    Rejected(#[from] Status),

    /// The visualization could not be set up.
    #[error("visualization setup failed: {0}")]
    Sink(#[from] SinkError),
}

// =============================================================================
// Subscription Driver
// =============================================================================

/// Opens the bidirectional stream and performs the subscribe phase.
#[derive(Debug, Clone)]
pub struct SubscriptionDriver {
    client: TemperatureServiceClient<Channel>,
}

impl SubscriptionDriver {
    /// Connect to the server at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the server is unreachable.
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let endpoint = Endpoint::from_shared(url.to_string())
            .map_err(|source| ClientError::InvalidEndpoint {
                url: url.to_string(),
                source,
            })?
            .connect_timeout(CONNECT_TIMEOUT);

        let channel = endpoint
            .connect()
            .await
            .map_err(|source| ClientError::Connect {
                url: url.to_string(),
                source,
            })?;

        tracing::info!(url = %url, "Connected to temperature server");
        Ok(Self::from_channel(channel))
    }

    /// Use an existing channel.
    #[must_use]
    pub fn from_channel(channel: Channel) -> Self {
        Self {
            client: TemperatureServiceClient::new(channel),
        }
    }

    /// Send one request per location, in order, then close the send half.
    ///
    /// Returns the server's sample stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the call.
    pub async fn subscribe(
        &mut self,
        locations: &[Location],
    ) -> Result<Streaming<TemperatureData>, ClientError> {
        let requests: Vec<TemperatureRequest> = locations
            .iter()
            .map(|location| TemperatureRequest {
                location: location.clone(),
            })
            .collect();

        tracing::info!(locations = requests.len(), "Subscribing");
        let response = self
            .client
            .stream_temperature(tokio_stream::iter(requests))
            .await?;
        Ok(response.into_inner())
    }
}

// =============================================================================
// Receive Loop
// =============================================================================

/// Why the receive loop ended.
#[derive(Debug, Clone)]
pub enum StreamOutcome {
    /// The server ended the stream.
    ServerClosed,
    /// The stream failed.
    ChannelFailed(Status),
    /// Local shutdown.
    Cancelled,
}

impl StreamOutcome {
    /// Short label for logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ServerClosed => "server_closed",
            Self::ChannelFailed(_) => "channel_failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Result of a receive loop.
#[derive(Debug, Clone)]
pub struct ReceiveSummary {
    /// Why the loop ended.
    pub outcome: StreamOutcome,
    /// Messages received, including rejected ones.
    pub received: u64,
}

/// Feed every received sample to the dispatcher until the stream ends or
/// `cancel` fires.
///
/// Messages that do not decode to a valid sample are counted as rejected
/// and skipped.
pub async fn receive_samples<St, S>(
    stream: St,
    dispatcher: &mut RenderDispatcher<S>,
    cancel: &CancellationToken,
) -> ReceiveSummary
where
    St: Stream<Item = Result<TemperatureData, Status>>,
    S: VisualizationSink,
{
    let mut stream = std::pin::pin!(stream);
    let mut received: u64 = 0;

    let outcome = loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => break StreamOutcome::Cancelled,
            next = stream.next() => next,
        };

        match next {
            Some(Ok(data)) => {
                received += 1;
                match sample_from_proto(data) {
                    Ok(sample) => {
                        dispatcher.dispatch(&sample);
                    }
                    Err(error) => {
                        tracing::warn!(error = %error, "Rejecting malformed sample");
                        dispatcher.record_rejected();
                    }
                }
            }
            Some(Err(status)) => break StreamOutcome::ChannelFailed(status),
            None => break StreamOutcome::ServerClosed,
        }
    };

    match &outcome {
        StreamOutcome::ChannelFailed(status) => {
            tracing::warn!(code = ?status.code(), message = %status.message(), received, "Stream failed");
        }
        other => tracing::info!(outcome = other.as_str(), received, "Stream ended"),
    }

    ReceiveSummary { outcome, received }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use futures::stream;

    use super::*;
    use crate::application::ports::MockVisualizationSink;
    use crate::application::services::UnknownLocationPolicy;

    fn data(location: &str, value: f64, timestamp: &str) -> Result<TemperatureData, Status> {
        Ok(TemperatureData {
            location: location.to_string(),
            temperature: value,
            timestamp: timestamp.to_string(),
        })
    }

    fn dispatcher() -> RenderDispatcher<MockVisualizationSink> {
        let mut sink = MockVisualizationSink::new();
        sink.expect_initialize().returning(|_| Ok(()));
        sink.expect_update().returning(|_, _| Ok(()));
        let mut dispatcher = RenderDispatcher::new(
            sink,
            NonZeroUsize::new(20).unwrap(),
            UnknownLocationPolicy::Drop,
        );
        dispatcher.initialize(&["X".to_string()]).unwrap();
        dispatcher
    }

    #[tokio::test]
    async fn drains_until_server_closes() {
        let mut dispatcher = dispatcher();
        let stream = stream::iter(vec![
            data("X", 1.0, "2024-01-01T00:00:01Z"),
            data("X", 2.0, "2024-01-01T00:00:02Z"),
        ]);

        let summary = receive_samples(stream, &mut dispatcher, &CancellationToken::new()).await;

        assert!(matches!(summary.outcome, StreamOutcome::ServerClosed));
        assert_eq!(summary.received, 2);
        assert_eq!(dispatcher.store().window("X").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn malformed_samples_are_rejected_and_skipped() {
        let mut dispatcher = dispatcher();
        let stream = stream::iter(vec![
            data("X", 1.0, "garbage"),
            data("", 1.0, "2024-01-01T00:00:01Z"),
            data("X", 3.0, "2024-01-01T00:00:03Z"),
        ]);

        let summary = receive_samples(stream, &mut dispatcher, &CancellationToken::new()).await;

        assert_eq!(summary.received, 3);
        assert_eq!(dispatcher.stats().rejected, 2);
        assert_eq!(dispatcher.stats().rendered, 1);
    }

    #[tokio::test]
    async fn channel_error_ends_the_loop() {
        let mut dispatcher = dispatcher();
        let stream = stream::iter(vec![
            data("X", 1.0, "2024-01-01T00:00:01Z"),
            Err(Status::unavailable("server went away")),
            data("X", 2.0, "2024-01-01T00:00:02Z"),
        ]);

        let summary = receive_samples(stream, &mut dispatcher, &CancellationToken::new()).await;

        match summary.outcome {
            StreamOutcome::ChannelFailed(status) => {
                assert_eq!(status.code(), tonic::Code::Unavailable);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(summary.received, 1);
    }

    #[tokio::test]
    async fn cancel_stops_a_silent_stream() {
        let mut dispatcher = dispatcher();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = receive_samples(
            stream::pending::<Result<TemperatureData, Status>>(),
            &mut dispatcher,
            &cancel,
        )
        .await;

        assert!(matches!(summary.outcome, StreamOutcome::Cancelled));
        assert_eq!(summary.received, 0);
    }

    #[tokio::test]
    async fn invalid_url_is_rejected() {
        let err = SubscriptionDriver::connect("not a url").await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidEndpoint { .. }));
    }
}
