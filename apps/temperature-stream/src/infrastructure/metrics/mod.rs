//! Prometheus Metrics Module
//!
//! Exposes server metrics in Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Sessions**: Active sessions by phase, queued sessions, closed sessions
//!   by reason, session duration
//! - **Traffic**: Subscriptions registered and samples sent
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::domain::session::{CloseReason, SessionPhase};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Later calls return the handle installed by the first one.
///
/// # Errors
///
/// Returns an error if the recorder cannot be installed, e.g. because
/// another global recorder is already set.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Session gauges
    describe_gauge!(
        "temperature_sessions_active",
        "Number of open stream sessions by phase"
    );
    describe_gauge!(
        "temperature_sessions_queued",
        "Number of streams waiting for a session slot"
    );

    // Session counters
    describe_counter!(
        "temperature_sessions_total",
        "Total stream sessions closed, by close reason"
    );
    describe_counter!(
        "temperature_subscriptions_total",
        "Total distinct locations registered across sessions"
    );
    describe_counter!(
        "temperature_samples_sent_total",
        "Total samples written to clients"
    );

    // Duration histogram
    describe_histogram!(
        "temperature_session_duration_seconds",
        "Lifetime of a stream session"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Update the number of sessions in a phase.
#[allow(clippy::cast_precision_loss)]
pub fn set_sessions_active(phase: SessionPhase, count: usize) {
    gauge!(
        "temperature_sessions_active",
        "phase" => phase.as_str()
    )
    .set(count as f64);
}

/// Update the number of streams waiting for a session slot.
#[allow(clippy::cast_precision_loss)]
pub fn set_sessions_queued(count: usize) {
    gauge!("temperature_sessions_queued").set(count as f64);
}

/// Record a closed session.
pub fn record_session_closed(reason: &CloseReason, duration: Duration) {
    counter!(
        "temperature_sessions_total",
        "reason" => reason.as_str()
    )
    .increment(1);
    histogram!("temperature_session_duration_seconds").record(duration.as_secs_f64());
}

/// Record a newly registered location.
pub fn record_subscription() {
    counter!("temperature_subscriptions_total").increment(1);
}

/// Record samples written to a client.
pub fn record_samples_sent(count: u64) {
    counter!("temperature_samples_sent_total").increment(count);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_is_absent_before_init() {
        // No test in this crate installs the global recorder.
        assert!(get_metrics_handle().is_none());
    }

    #[test]
    fn recording_without_recorder_is_noop() {
        set_sessions_active(SessionPhase::Broadcasting, 2);
        set_sessions_queued(0);
        record_session_closed(&CloseReason::PeerDisconnected, Duration::from_secs(3));
        record_subscription();
        record_samples_sent(5);
    }
}
