//! Session Runner
//!
//! Drives one stream session through its lifecycle on a single task:
//! read subscription requests until the peer closes its send half, then
//! broadcast to the frozen registry until the stream ends.
//!
//! The two phases run strictly in sequence. A peer that never closes its
//! send half keeps the session in SUBSCRIBING until cancellation.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use super::broadcast::{BroadcastLoop, MIN_TICK_INTERVAL};
use crate::application::ports::{
    NoOpSessionObserver, ReadingGenerator, SampleOutbound, SessionObserver,
};
use crate::domain::sample::Location;
use crate::domain::session::{
    CloseReason, SessionError, SessionId, SessionPhase, SessionReport, StreamSession,
};

/// Runs stream sessions against a shared generator.
#[derive(Clone)]
pub struct SessionRunner {
    generator: Arc<dyn ReadingGenerator>,
    tick_interval: Duration,
    cancel: CancellationToken,
    observer: Arc<dyn SessionObserver>,
}

impl std::fmt::Debug for SessionRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRunner")
            .field("tick_interval", &self.tick_interval)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl SessionRunner {
    /// Create a runner.
    ///
    /// `cancel` is the shutdown token; every session observes it. A
    /// `tick_interval` below [`MIN_TICK_INTERVAL`] is raised to it.
    #[must_use]
    pub fn new(
        generator: Arc<dyn ReadingGenerator>,
        tick_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            generator,
            tick_interval: tick_interval.max(MIN_TICK_INTERVAL),
            cancel,
            observer: Arc::new(NoOpSessionObserver),
        }
    }

    /// Attach a lifecycle observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Tick interval used by the broadcast phase.
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Run one session to completion.
    ///
    /// `inbound` yields requested locations; its end marks the end of the
    /// subscribe phase. An inbound error closes the session without
    /// broadcasting. Returns the session's final report.
    pub async fn run<S, E, O>(
        &self,
        session_id: SessionId,
        inbound: S,
        outbound: &O,
    ) -> SessionReport
    where
        S: Stream<Item = Result<Location, E>> + Send,
        E: Display,
        O: SampleOutbound + ?Sized,
    {
        let mut session = StreamSession::new(session_id);
        self.observer.on_phase(session_id, SessionPhase::Subscribing);
        tracing::debug!(session_id, "Session opened");

        let reason = match self.subscribe_phase(&mut session, inbound).await {
            Some(reason) => reason,
            None => self.broadcast_phase(&mut session, outbound).await,
        };

        session.close(reason);
        self.observer.on_phase(session_id, SessionPhase::Closed);

        let report = session.report();
        let reason = report
            .close_reason
            .as_ref()
            .map_or("unknown", CloseReason::as_str);
        tracing::info!(
            session_id,
            subscriptions = report.subscriptions,
            ticks = report.ticks,
            samples = report.samples_sent,
            duration_ms = u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX),
            reason,
            "Session closed"
        );
        self.observer.on_closed(&report);
        report
    }

    /// Read requests until the inbound half ends.
    ///
    /// Returns a close reason if the session must end without broadcasting.
    async fn subscribe_phase<S, E>(
        &self,
        session: &mut StreamSession,
        inbound: S,
    ) -> Option<CloseReason>
    where
        S: Stream<Item = Result<Location, E>> + Send,
        E: Display,
    {
        let session_id = session.id();
        let mut inbound = std::pin::pin!(inbound);

        loop {
            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Some(CloseReason::Cancelled),
                next = inbound.next() => next,
            };

            match next {
                Some(Ok(location)) => match session.subscribe(location.clone()) {
                    Ok(true) => {
                        tracing::debug!(session_id, location = %location, "Location subscribed");
                        self.observer.on_subscribed(session_id, &location);
                    }
                    Ok(false) => {
                        tracing::debug!(session_id, location = %location, "Duplicate subscription ignored");
                    }
                    Err(SessionError::EmptyLocation) => {
                        tracing::warn!(session_id, "Ignoring subscription request with empty location");
                    }
                    Err(error) => {
                        tracing::warn!(session_id, error = %error, "Subscription rejected");
                    }
                },
                Some(Err(error)) => {
                    tracing::warn!(session_id, error = %error, "Inbound stream failed while subscribing");
                    return Some(CloseReason::InboundFailed(error.to_string()));
                }
                None => return None,
            }
        }
    }

    /// Freeze the registry and broadcast until the stream ends.
    async fn broadcast_phase<O>(&self, session: &mut StreamSession, outbound: &O) -> CloseReason
    where
        O: SampleOutbound + ?Sized,
    {
        let session_id = session.id();
        let targets = match session.begin_broadcast() {
            Ok(targets) => targets,
            Err(error) => {
                tracing::error!(session_id, error = %error, "Cannot enter broadcast phase");
                return CloseReason::Cancelled;
            }
        };
        self.observer.on_phase(session_id, SessionPhase::Broadcasting);

        let broadcast = BroadcastLoop::new(self.tick_interval, self.cancel.clone());
        tracing::info!(
            session_id,
            locations = targets.len(),
            interval_ms = u64::try_from(broadcast.interval().as_millis()).unwrap_or(u64::MAX),
            "Subscription phase complete, broadcasting"
        );

        broadcast
            .run(session, &targets, self.generator.as_ref(), outbound)
            .await
    }
}
