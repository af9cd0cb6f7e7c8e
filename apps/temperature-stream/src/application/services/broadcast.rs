//! Broadcast Loop
//!
//! The BROADCASTING phase: one sweep over the frozen registry per tick,
//! one freshly generated sample per location, written in sweep order.
//!
//! The wait between sweeps is a `tokio::time::Interval` raced against the
//! cancellation token and the outbound half's `closed()` signal, so shutdown
//! or a peer disconnect ends the loop without waiting out the interval.
//! Missed ticks are delayed rather than bursted, keeping each location at
//! one sample per interval.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{ReadingGenerator, SampleOutbound};
use crate::domain::session::{CloseReason, FrozenRegistry, StreamSession};

/// Shortest tick interval a loop will run with.
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Cancellable periodic sweep over a frozen registry.
#[derive(Debug, Clone)]
pub struct BroadcastLoop {
    interval: Duration,
    cancel: CancellationToken,
}

impl BroadcastLoop {
    /// Create a loop ticking every `interval`.
    ///
    /// Intervals below [`MIN_TICK_INTERVAL`] are raised to it.
    #[must_use]
    pub fn new(interval: Duration, cancel: CancellationToken) -> Self {
        Self {
            interval: interval.max(MIN_TICK_INTERVAL),
            cancel,
        }
    }

    /// Tick interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Run until the outbound half fails, the peer disconnects, or the token
    /// is cancelled.
    ///
    /// The first sweep happens immediately. With an empty registry the loop
    /// emits nothing and only waits for one of the exit conditions.
    pub async fn run<O>(
        &self,
        session: &mut StreamSession,
        targets: &FrozenRegistry,
        generator: &dyn ReadingGenerator,
        outbound: &O,
    ) -> CloseReason
    where
        O: SampleOutbound + ?Sized,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return CloseReason::Cancelled,
                () = outbound.closed() => return CloseReason::PeerDisconnected,
                _ = ticker.tick() => {}
            }

            for location in targets.iter() {
                let sample = match generator.generate(location) {
                    Ok(sample) => sample,
                    Err(error) => {
                        tracing::warn!(
                            session_id = session.id(),
                            location = %location,
                            error = %error,
                            "Skipping location, reading generation failed"
                        );
                        continue;
                    }
                };

                let written = tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => return CloseReason::Cancelled,
                    result = outbound.emit(sample) => result,
                };
                if written.is_err() {
                    return CloseReason::OutboundFailed;
                }
                session.record_sent();
            }

            session.record_tick();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::application::ports::{CollectingOutbound, SequenceReadingGenerator};

    fn broadcasting(locations: &[&str]) -> (StreamSession, FrozenRegistry) {
        let mut session = StreamSession::new(1);
        for location in locations {
            session.subscribe((*location).to_string()).unwrap();
        }
        let targets = session.begin_broadcast().unwrap();
        (session, targets)
    }

    fn cancel_after(token: &CancellationToken, after: Duration) {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            token.cancel();
        });
    }

    #[tokio::test(start_paused = true)]
    async fn each_sweep_covers_every_location_once() {
        let (mut session, targets) = broadcasting(&["X", "Y"]);
        let generator = SequenceReadingGenerator::default();
        let outbound = CollectingOutbound::new();
        let cancel = CancellationToken::new();
        cancel_after(&cancel, Duration::from_millis(3500));

        let reason = BroadcastLoop::new(Duration::from_secs(1), cancel)
            .run(&mut session, &targets, &generator, &outbound)
            .await;

        assert_eq!(reason, CloseReason::Cancelled);
        assert_eq!(outbound.count_for("X"), 4);
        assert_eq!(outbound.count_for("Y"), 4);
        assert_eq!(session.report().ticks, 4);
        assert_eq!(session.report().samples_sent, 8);
    }

    #[tokio::test(start_paused = true)]
    async fn samples_in_a_sweep_are_contiguous() {
        let (mut session, targets) = broadcasting(&["A", "B", "C"]);
        let generator = SequenceReadingGenerator::default();
        let outbound = CollectingOutbound::new();
        let cancel = CancellationToken::new();
        cancel_after(&cancel, Duration::from_millis(2500));

        BroadcastLoop::new(Duration::from_secs(1), cancel)
            .run(&mut session, &targets, &generator, &outbound)
            .await;

        let samples = outbound.samples();
        assert_eq!(samples.len(), 9);
        for sweep in samples.chunks(3) {
            let mut locations: Vec<_> = sweep.iter().map(|s| s.location()).collect();
            locations.sort_unstable();
            assert_eq!(locations, vec!["A", "B", "C"]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn empty_registry_emits_nothing() {
        let (mut session, targets) = broadcasting(&[]);
        let generator = SequenceReadingGenerator::default();
        let outbound = CollectingOutbound::new();
        let cancel = CancellationToken::new();
        cancel_after(&cancel, Duration::from_secs(10));

        let reason = BroadcastLoop::new(Duration::from_secs(1), cancel)
            .run(&mut session, &targets, &generator, &outbound)
            .await;

        assert_eq!(reason, CloseReason::Cancelled);
        assert!(outbound.is_empty());
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn write_failure_ends_the_loop() {
        let (mut session, targets) = broadcasting(&["X"]);
        let generator = SequenceReadingGenerator::default();
        let outbound = CollectingOutbound::with_limit(2);

        let reason = BroadcastLoop::new(Duration::from_secs(1), CancellationToken::new())
            .run(&mut session, &targets, &generator, &outbound)
            .await;

        assert_eq!(reason, CloseReason::OutboundFailed);
        assert_eq!(outbound.len(), 2);
        assert_eq!(session.report().samples_sent, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn peer_disconnect_interrupts_the_wait() {
        let (mut session, targets) = broadcasting(&["X"]);
        let generator = SequenceReadingGenerator::default();
        let outbound = Arc::new(CollectingOutbound::new());

        let closer = Arc::clone(&outbound);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            closer.close();
        });

        let started = tokio::time::Instant::now();
        let reason = BroadcastLoop::new(Duration::from_secs(60), CancellationToken::new())
            .run(&mut session, &targets, &generator, outbound.as_ref())
            .await;

        assert_eq!(reason, CloseReason::PeerDisconnected);
        assert_eq!(outbound.len(), 1);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_token_stops_before_first_sweep() {
        let (mut session, targets) = broadcasting(&["X"]);
        let generator = SequenceReadingGenerator::default();
        let outbound = CollectingOutbound::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let reason = BroadcastLoop::new(Duration::from_secs(1), cancel)
            .run(&mut session, &targets, &generator, &outbound)
            .await;

        assert_eq!(reason, CloseReason::Cancelled);
        assert!(outbound.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_is_raised_to_the_minimum() {
        let (mut session, targets) = broadcasting(&["X"]);
        let generator = SequenceReadingGenerator::default();
        let outbound = CollectingOutbound::with_limit(3);
        let broadcast = BroadcastLoop::new(Duration::ZERO, CancellationToken::new());

        assert_eq!(broadcast.interval(), MIN_TICK_INTERVAL);

        let reason = broadcast
            .run(&mut session, &targets, &generator, &outbound)
            .await;

        assert_eq!(reason, CloseReason::OutboundFailed);
        assert_eq!(outbound.len(), 3);
    }
}
