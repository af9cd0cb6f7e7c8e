//! Session Observer Port (Driven Port)
//!
//! Lifecycle notifications for stream sessions, consumed by the session
//! tracker behind the health endpoint and by tests.

use crate::domain::session::{SessionId, SessionPhase, SessionReport};

/// Port for observing session lifecycle events.
///
/// Callbacks run inline on the session task and must not block.
pub trait SessionObserver: Send + Sync {
    /// The session entered `phase`.
    fn on_phase(&self, session_id: SessionId, phase: SessionPhase);

    /// A new location was registered.
    fn on_subscribed(&self, session_id: SessionId, location: &str) {
        let _ = (session_id, location);
    }

    /// The session ended.
    fn on_closed(&self, report: &SessionReport) {
        let _ = report;
    }
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpSessionObserver;

impl SessionObserver for NoOpSessionObserver {
    fn on_phase(&self, _session_id: SessionId, _phase: SessionPhase) {}
}
