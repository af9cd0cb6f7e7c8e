//! Stream Session State Machine
//!
//! Domain types for one bidirectional stream on the server side.
//!
//! # Design
//!
//! A session moves through exactly three phases:
//!
//! ```text
//! SUBSCRIBING ──(end of input)──► BROADCASTING ──(failure / disconnect / cancel)──► CLOSED
//!      │                                                                              ▲
//!      └──────────────────────(inbound failure / cancel)──────────────────────────────┘
//! ```
//!
//! The registry is a mutable [`SubscriptionRegistry`] only while the session
//! is subscribing. Leaving that phase consumes it into a [`FrozenRegistry`],
//! which has no insertion method, so the set of broadcast targets cannot
//! change once samples may have been sent.
//!
//! Each session exclusively owns its registry; nothing is shared across
//! connections.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::sample::Location;

// =============================================================================
// Types
// =============================================================================

/// Unique identifier for a stream session.
pub type SessionId = u64;

/// Observable phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    /// Reading subscription requests until the peer closes its send half.
    Subscribing,
    /// Emitting one sample per registered location per tick.
    Broadcasting,
    /// Terminal phase.
    Closed,
}

impl SessionPhase {
    /// Get the phase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Subscribing => "subscribing",
            Self::Broadcasting => "broadcasting",
            Self::Closed => "closed",
        }
    }
}

/// Why a session reached the `Closed` phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer went away (response stream dropped).
    PeerDisconnected,
    /// Writing a sample to the outbound half failed.
    OutboundFailed,
    /// Reading from the inbound half failed during subscription.
    InboundFailed(String),
    /// External shutdown.
    Cancelled,
}

impl CloseReason {
    /// Short label for logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PeerDisconnected => "peer_disconnected",
            Self::OutboundFailed => "outbound_failed",
            Self::InboundFailed(_) => "inbound_failed",
            Self::Cancelled => "cancelled",
        }
    }
}

// =============================================================================
// Subscription Registry
// =============================================================================

/// Set of distinct locations requested during the subscribe phase.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRegistry {
    locations: HashSet<Location>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a location.
    ///
    /// Returns `false` if it was already registered.
    pub fn insert(&mut self, location: Location) -> bool {
        self.locations.insert(location)
    }

    /// Check whether a location is registered.
    #[must_use]
    pub fn contains(&self, location: &str) -> bool {
        self.locations.contains(location)
    }

    /// Number of distinct locations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// Check if no location has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// End the subscribe phase.
    #[must_use]
    pub fn freeze(self) -> FrozenRegistry {
        FrozenRegistry {
            locations: self.locations.into_iter().collect(),
        }
    }
}

/// Registry after the subscribe phase. Read-only.
///
/// Iteration order is unspecified. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct FrozenRegistry {
    locations: Arc<[Location]>,
}

impl FrozenRegistry {
    /// Iterate the registered locations.
    pub fn iter(&self) -> impl Iterator<Item = &Location> {
        self.locations.iter()
    }

    /// Check whether a location is registered.
    #[must_use]
    pub fn contains(&self, location: &str) -> bool {
        self.locations.iter().any(|l| l == location)
    }

    /// Number of distinct locations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

// =============================================================================
// Session State
// =============================================================================

/// Tagged session state. The registry lives inside the state it belongs to.
#[derive(Debug)]
pub enum SessionState {
    /// Accepting subscription requests.
    Subscribing(SubscriptionRegistry),
    /// Broadcasting to a frozen set of locations.
    Broadcasting(FrozenRegistry),
    /// Terminal.
    Closed(CloseReason),
}

impl SessionState {
    /// Phase of this state.
    #[must_use]
    pub const fn phase(&self) -> SessionPhase {
        match self {
            Self::Subscribing(_) => SessionPhase::Subscribing,
            Self::Broadcasting(_) => SessionPhase::Broadcasting,
            Self::Closed(_) => SessionPhase::Closed,
        }
    }
}

/// One server-side stream session.
///
/// # Example
///
/// ```rust
/// use temperature_stream::domain::session::{SessionPhase, StreamSession};
///
/// let mut session = StreamSession::new(7);
/// assert!(session.subscribe("London".to_string()).unwrap());
/// assert!(!session.subscribe("London".to_string()).unwrap());
///
/// let targets = session.begin_broadcast().unwrap();
/// assert_eq!(targets.len(), 1);
/// assert_eq!(session.phase(), SessionPhase::Broadcasting);
///
/// // The registry is frozen now.
/// assert!(session.subscribe("Paris".to_string()).is_err());
/// ```
#[derive(Debug)]
pub struct StreamSession {
    id: SessionId,
    state: SessionState,
    opened_at: Instant,
    subscriptions: usize,
    ticks: u64,
    samples_sent: u64,
}

impl StreamSession {
    /// Open a session in the `Subscribing` phase with an empty registry.
    #[must_use]
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            state: SessionState::Subscribing(SubscriptionRegistry::new()),
            opened_at: Instant::now(),
            subscriptions: 0,
            ticks: 0,
            samples_sent: 0,
        }
    }

    /// Session identifier.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    /// Register a location.
    ///
    /// Returns `Ok(false)` for a duplicate, which leaves the registry unchanged.
    ///
    /// # Errors
    ///
    /// - `SessionError::EmptyLocation` for an empty location.
    /// - `SessionError::NotSubscribing` once the subscribe phase has ended.
    pub fn subscribe(&mut self, location: Location) -> Result<bool, SessionError> {
        let SessionState::Subscribing(registry) = &mut self.state else {
            return Err(SessionError::NotSubscribing(self.state.phase()));
        };
        if location.is_empty() {
            return Err(SessionError::EmptyLocation);
        }

        let added = registry.insert(location);
        if added {
            self.subscriptions += 1;
        }
        Ok(added)
    }

    /// Transition `Subscribing → Broadcasting`, freezing the registry.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` unless the session is
    /// currently subscribing.
    pub fn begin_broadcast(&mut self) -> Result<FrozenRegistry, SessionError> {
        let from = self.state.phase();
        let placeholder = SessionState::Closed(CloseReason::Cancelled);
        match std::mem::replace(&mut self.state, placeholder) {
            SessionState::Subscribing(registry) => {
                let frozen = registry.freeze();
                self.state = SessionState::Broadcasting(frozen.clone());
                Ok(frozen)
            }
            other => {
                self.state = other;
                Err(SessionError::InvalidTransition {
                    from,
                    to: SessionPhase::Broadcasting,
                })
            }
        }
    }

    /// Locations to sweep on each tick.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotBroadcasting` outside the broadcast phase.
    pub fn broadcast_targets(&self) -> Result<FrozenRegistry, SessionError> {
        match &self.state {
            SessionState::Broadcasting(registry) => Ok(registry.clone()),
            other => Err(SessionError::NotBroadcasting(other.phase())),
        }
    }

    /// Record a completed sweep.
    pub const fn record_tick(&mut self) {
        self.ticks += 1;
    }

    /// Record a sample written to the outbound half.
    pub const fn record_sent(&mut self) {
        self.samples_sent += 1;
    }

    /// Transition to `Closed`.
    ///
    /// Returns `false` if the session was already closed; the first reason
    /// is kept.
    pub fn close(&mut self, reason: CloseReason) -> bool {
        if matches!(self.state, SessionState::Closed(_)) {
            return false;
        }
        self.state = SessionState::Closed(reason);
        true
    }

    /// Summarize the session.
    #[must_use]
    pub fn report(&self) -> SessionReport {
        let close_reason = match &self.state {
            SessionState::Closed(reason) => Some(reason.clone()),
            _ => None,
        };
        SessionReport {
            session_id: self.id,
            subscriptions: self.subscriptions,
            ticks: self.ticks,
            samples_sent: self.samples_sent,
            duration: self.opened_at.elapsed(),
            close_reason,
        }
    }
}

// =============================================================================
// Report
// =============================================================================

/// Summary of a session, produced when it ends.
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// Session identifier.
    pub session_id: SessionId,
    /// Distinct locations registered.
    pub subscriptions: usize,
    /// Completed broadcast sweeps.
    pub ticks: u64,
    /// Samples written to the outbound half.
    pub samples_sent: u64,
    /// Time since the session was opened.
    pub duration: Duration,
    /// Why the session closed, if it has.
    pub close_reason: Option<CloseReason>,
}

// =============================================================================
// Errors
// =============================================================================

/// Session state machine errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Subscription attempted after the subscribe phase ended.
    #[error("cannot subscribe while {}", .0.as_str())]
    NotSubscribing(SessionPhase),

    /// Broadcast operation attempted outside the broadcast phase.
    #[error("cannot broadcast while {}", .0.as_str())]
    NotBroadcasting(SessionPhase),

    /// Transition not allowed from the current phase.
    #[error("invalid transition from {} to {}", .from.as_str(), .to.as_str())]
    InvalidTransition {
        /// Phase the session was in.
        from: SessionPhase,
        /// Phase that was requested.
        to: SessionPhase,
    },

    /// Empty location in a subscription request.
    #[error("location cannot be empty")]
    EmptyLocation,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn subscribed(locations: &[&str]) -> StreamSession {
        let mut session = StreamSession::new(1);
        for location in locations {
            session.subscribe((*location).to_string()).unwrap();
        }
        session
    }

    #[test]
    fn new_session_is_subscribing() {
        let session = StreamSession::new(42);
        assert_eq!(session.id(), 42);
        assert_eq!(session.phase(), SessionPhase::Subscribing);
    }

    #[test]
    fn duplicate_subscription_is_noop() {
        let mut session = StreamSession::new(1);
        assert!(session.subscribe("X".to_string()).unwrap());
        assert!(!session.subscribe("X".to_string()).unwrap());

        let targets = session.begin_broadcast().unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(session.report().subscriptions, 1);
    }

    #[test]
    fn empty_location_is_rejected() {
        let mut session = StreamSession::new(1);
        assert_eq!(
            session.subscribe(String::new()),
            Err(SessionError::EmptyLocation)
        );
        assert_eq!(session.phase(), SessionPhase::Subscribing);
    }

    #[test]
    fn broadcast_targets_are_distinct_requested_locations() {
        let mut session = subscribed(&["A", "B", "A", "C", "B"]);
        let targets = session.begin_broadcast().unwrap();

        let mut names: Vec<_> = targets.iter().cloned().collect();
        names.sort();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn registry_is_frozen_after_broadcast_begins() {
        let mut session = subscribed(&["A"]);
        session.begin_broadcast().unwrap();

        assert_eq!(
            session.subscribe("B".to_string()),
            Err(SessionError::NotSubscribing(SessionPhase::Broadcasting))
        );
        let targets = session.broadcast_targets().unwrap();
        assert_eq!(targets.len(), 1);
        assert!(targets.contains("A"));
        assert!(!targets.contains("B"));
    }

    #[test]
    fn begin_broadcast_fires_once() {
        let mut session = subscribed(&["A"]);
        session.begin_broadcast().unwrap();

        assert_eq!(
            session.begin_broadcast().unwrap_err(),
            SessionError::InvalidTransition {
                from: SessionPhase::Broadcasting,
                to: SessionPhase::Broadcasting,
            }
        );
        assert_eq!(session.phase(), SessionPhase::Broadcasting);
    }

    #[test]
    fn empty_registry_can_broadcast() {
        let mut session = StreamSession::new(1);
        let targets = session.begin_broadcast().unwrap();
        assert!(targets.is_empty());
        assert_eq!(session.phase(), SessionPhase::Broadcasting);
    }

    #[test]
    fn targets_unavailable_while_subscribing() {
        let session = subscribed(&["A"]);
        assert_eq!(
            session.broadcast_targets().unwrap_err(),
            SessionError::NotBroadcasting(SessionPhase::Subscribing)
        );
    }

    #[test]
    fn closed_session_cannot_resume() {
        let mut session = subscribed(&["A"]);
        assert!(session.close(CloseReason::InboundFailed("reset".to_string())));

        assert!(session.begin_broadcast().is_err());
        assert!(session.subscribe("B".to_string()).is_err());
        assert_eq!(session.phase(), SessionPhase::Closed);
    }

    #[test]
    fn close_keeps_first_reason() {
        let mut session = subscribed(&["A"]);
        session.begin_broadcast().unwrap();

        assert!(session.close(CloseReason::PeerDisconnected));
        assert!(!session.close(CloseReason::Cancelled));
        assert_eq!(
            session.report().close_reason,
            Some(CloseReason::PeerDisconnected)
        );
    }

    #[test]
    fn report_counts_ticks_and_samples() {
        let mut session = subscribed(&["A", "B"]);
        session.begin_broadcast().unwrap();
        for _ in 0..3 {
            session.record_sent();
            session.record_sent();
            session.record_tick();
        }

        let report = session.report();
        assert_eq!(report.ticks, 3);
        assert_eq!(report.samples_sent, 6);
        assert_eq!(report.subscriptions, 2);
        assert!(report.close_reason.is_none());
    }

    #[test]
    fn close_reason_labels() {
        assert_eq!(CloseReason::PeerDisconnected.as_str(), "peer_disconnected");
        assert_eq!(CloseReason::OutboundFailed.as_str(), "outbound_failed");
        assert_eq!(
            CloseReason::InboundFailed("x".to_string()).as_str(),
            "inbound_failed"
        );
        assert_eq!(CloseReason::Cancelled.as_str(), "cancelled");
    }
}
