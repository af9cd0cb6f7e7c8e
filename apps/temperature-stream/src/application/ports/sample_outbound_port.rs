//! Sample Outbound Port (Driven Port)
//!
//! The write half of one stream session.

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::domain::sample::Sample;

/// The outbound half rejected a write because the peer is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("outbound stream closed")]
pub struct OutboundClosed;

/// Port for writing samples to one peer.
#[async_trait]
pub trait SampleOutbound: Send + Sync {
    /// Write one sample, waiting for buffer space if needed.
    ///
    /// # Errors
    ///
    /// Returns `OutboundClosed` once the peer can no longer receive.
    async fn emit(&self, sample: Sample) -> Result<(), OutboundClosed>;

    /// Resolve once the peer can no longer receive.
    async fn closed(&self);
}

/// In-memory outbound half for testing.
///
/// Records every accepted sample. Optionally fails writes after a fixed
/// number of accepted samples, which closes it.
#[derive(Debug, Default)]
pub struct CollectingOutbound {
    samples: Mutex<Vec<Sample>>,
    limit: Option<usize>,
    closed: CancellationToken,
}

impl CollectingOutbound {
    /// Create an unbounded outbound half.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an outbound half that accepts `limit` samples, then fails.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// Simulate the peer going away.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Snapshot of the accepted samples.
    #[must_use]
    pub fn samples(&self) -> Vec<Sample> {
        self.samples.lock().clone()
    }

    /// Accepted samples for one location.
    #[must_use]
    pub fn count_for(&self, location: &str) -> usize {
        self.samples
            .lock()
            .iter()
            .filter(|s| s.location() == location)
            .count()
    }

    /// Number of accepted samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    /// Check if nothing was accepted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }
}

#[async_trait]
impl SampleOutbound for CollectingOutbound {
    async fn emit(&self, sample: Sample) -> Result<(), OutboundClosed> {
        if self.closed.is_cancelled() {
            return Err(OutboundClosed);
        }
        let mut samples = self.samples.lock();
        if self.limit.is_some_and(|limit| samples.len() >= limit) {
            drop(samples);
            self.closed.cancel();
            return Err(OutboundClosed);
        }
        samples.push(sample);
        drop(samples);
        Ok(())
    }

    async fn closed(&self) {
        self.closed.cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn sample(location: &str) -> Sample {
        Sample::new(location, 1.0, Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn collects_until_closed() {
        let outbound = CollectingOutbound::new();
        outbound.emit(sample("X")).await.unwrap();
        outbound.emit(sample("Y")).await.unwrap();

        outbound.close();

        assert_eq!(outbound.emit(sample("X")).await, Err(OutboundClosed));
        assert_eq!(outbound.len(), 2);
        assert_eq!(outbound.count_for("X"), 1);
        outbound.closed().await;
    }

    #[tokio::test]
    async fn limit_fails_and_closes() {
        let outbound = CollectingOutbound::with_limit(1);
        outbound.emit(sample("X")).await.unwrap();

        assert_eq!(outbound.emit(sample("X")).await, Err(OutboundClosed));
        outbound.closed().await;
        assert_eq!(outbound.len(), 1);
    }
}
