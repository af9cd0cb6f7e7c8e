//! Session Tracker
//!
//! Live view of the server's stream sessions, fed by the session runner's
//! lifecycle callbacks. Backs the `/health` payload and the session gauges.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::application::ports::SessionObserver;
use crate::domain::session::{SessionId, SessionPhase, SessionReport};
use crate::infrastructure::metrics;

/// Tracked state of one open session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedSession {
    /// Current phase.
    pub phase: SessionPhase,
    /// Distinct locations registered so far.
    pub subscriptions: usize,
    /// When the session entered SUBSCRIBING.
    pub opened_at: DateTime<Utc>,
}

/// Aggregate session counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionCounts {
    /// Sessions reading subscription requests.
    pub subscribing: usize,
    /// Sessions emitting samples.
    pub broadcasting: usize,
    /// Streams waiting for a session slot.
    pub queued: usize,
    /// Streams that had to wait for a slot since start.
    pub queued_total: u64,
    /// Sessions opened since start.
    pub opened_total: u64,
    /// Sessions closed since start.
    pub closed_total: u64,
}

impl SessionCounts {
    /// Sessions currently holding a slot.
    #[must_use]
    pub const fn active(&self) -> usize {
        self.subscribing + self.broadcasting
    }
}

/// Registry of open sessions.
#[derive(Debug, Default)]
pub struct SessionTracker {
    sessions: RwLock<HashMap<SessionId, TrackedSession>>,
    queued: AtomicUsize,
    queued_total: AtomicU64,
    opened_total: AtomicU64,
    closed_total: AtomicU64,
}

impl SessionTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A stream is waiting for a session slot.
    pub fn enqueue(&self) {
        self.queued_total.fetch_add(1, Ordering::Relaxed);
        let queued = self.queued.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::set_sessions_queued(queued);
    }

    /// A waiting stream got a slot or gave up.
    pub fn dequeue(&self) {
        let previous = self
            .queued
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .unwrap_or(0);
        metrics::set_sessions_queued(previous.saturating_sub(1));
    }

    /// Tracked state of one session.
    #[must_use]
    pub fn get(&self, session_id: SessionId) -> Option<TrackedSession> {
        self.sessions.read().get(&session_id).cloned()
    }

    /// Number of open sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Check if no session is open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// When the longest-open session was opened.
    #[must_use]
    pub fn oldest_opened_at(&self) -> Option<DateTime<Utc>> {
        self.sessions.read().values().map(|s| s.opened_at).min()
    }

    /// Aggregate counts.
    #[must_use]
    pub fn counts(&self) -> SessionCounts {
        let sessions = self.sessions.read();
        let subscribing = sessions
            .values()
            .filter(|s| s.phase == SessionPhase::Subscribing)
            .count();
        let broadcasting = sessions
            .values()
            .filter(|s| s.phase == SessionPhase::Broadcasting)
            .count();
        drop(sessions);

        SessionCounts {
            subscribing,
            broadcasting,
            queued: self.queued.load(Ordering::Relaxed),
            queued_total: self.queued_total.load(Ordering::Relaxed),
            opened_total: self.opened_total.load(Ordering::Relaxed),
            closed_total: self.closed_total.load(Ordering::Relaxed),
        }
    }

    fn publish_gauges(&self) {
        let counts = self.counts();
        metrics::set_sessions_active(SessionPhase::Subscribing, counts.subscribing);
        metrics::set_sessions_active(SessionPhase::Broadcasting, counts.broadcasting);
    }
}

impl SessionObserver for SessionTracker {
    fn on_phase(&self, session_id: SessionId, phase: SessionPhase) {
        match phase {
            SessionPhase::Subscribing => {
                self.sessions.write().insert(
                    session_id,
                    TrackedSession {
                        phase,
                        subscriptions: 0,
                        opened_at: Utc::now(),
                    },
                );
                self.opened_total.fetch_add(1, Ordering::Relaxed);
            }
            SessionPhase::Broadcasting => {
                if let Some(session) = self.sessions.write().get_mut(&session_id) {
                    session.phase = phase;
                }
            }
            SessionPhase::Closed => {
                if self.sessions.write().remove(&session_id).is_some() {
                    self.closed_total.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        self.publish_gauges();
    }

    fn on_subscribed(&self, session_id: SessionId, _location: &str) {
        if let Some(session) = self.sessions.write().get_mut(&session_id) {
            session.subscriptions += 1;
        }
        metrics::record_subscription();
    }

    fn on_closed(&self, report: &SessionReport) {
        if let Some(reason) = &report.close_reason {
            metrics::record_session_closed(reason, report.duration);
        }
    }
}
