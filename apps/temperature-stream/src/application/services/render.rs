//! Render Dispatcher
//!
//! Client-side routing of received samples: append to the location's
//! sliding window, then hand the updated window to the visualization sink.
//!
//! The sink's layout is fixed at `initialize` from the configured location
//! list. Samples for locations outside that layout are handled by an
//! explicit [`UnknownLocationPolicy`].

use std::collections::HashSet;
use std::num::NonZeroUsize;

use crate::application::ports::{SinkError, VisualizationSink};
use crate::domain::sample::{Location, Sample};
use crate::domain::series::{SeriesPoint, WindowedSeriesStore};

// =============================================================================
// Policy
// =============================================================================

/// What to do with a sample for a location outside the display layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UnknownLocationPolicy {
    /// Discard the sample and log a diagnostic.
    #[default]
    Drop,
    /// Open a display slot on demand. A slot that fails to open is retried
    /// on the location's next sample.
    Register,
}

impl UnknownLocationPolicy {
    /// Get the policy name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Drop => "drop",
            Self::Register => "register",
        }
    }

    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "drop" => Some(Self::Drop),
            "register" => Some(Self::Register),
            _ => None,
        }
    }
}

// =============================================================================
// Outcome and Stats
// =============================================================================

/// Result of dispatching one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Stored and rendered.
    Rendered {
        /// Window length after the append.
        window_len: usize,
    },
    /// Discarded under [`UnknownLocationPolicy::Drop`].
    Dropped,
    /// Stored, but the sink failed to render.
    SinkFailed,
}

/// Running dispatch counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Samples stored and rendered.
    pub rendered: u64,
    /// Samples discarded for an unknown location.
    pub dropped: u64,
    /// Samples rejected before dispatch (undecodable wire data).
    pub rejected: u64,
    /// Sink failures.
    pub sink_errors: u64,
}

impl DispatchStats {
    /// Total samples seen.
    #[must_use]
    pub const fn received(&self) -> u64 {
        self.rendered + self.dropped + self.rejected + self.sink_errors
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Routes samples into the store and the sink.
#[derive(Debug)]
pub struct RenderDispatcher<S> {
    sink: S,
    store: WindowedSeriesStore,
    layout: Vec<Location>,
    known: HashSet<Location>,
    policy: UnknownLocationPolicy,
    initialized: bool,
    stats: DispatchStats,
}

impl<S: VisualizationSink> RenderDispatcher<S> {
    /// Create a dispatcher with an empty store of `capacity`-point windows.
    #[must_use]
    pub fn new(sink: S, capacity: NonZeroUsize, policy: UnknownLocationPolicy) -> Self {
        Self {
            sink,
            store: WindowedSeriesStore::new(capacity),
            layout: Vec::new(),
            known: HashSet::new(),
            policy,
            initialized: false,
            stats: DispatchStats::default(),
        }
    }

    /// Set up the sink with one slot per location, in order.
    ///
    /// Duplicates keep their first position. Only the first call reaches the
    /// sink; later calls are ignored.
    ///
    /// # Errors
    ///
    /// Returns the sink's error if it cannot be initialized.
    pub fn initialize(&mut self, locations: &[Location]) -> Result<(), SinkError> {
        if self.initialized {
            tracing::debug!("Render dispatcher already initialized");
            return Ok(());
        }

        for location in locations {
            if self.known.insert(location.clone()) {
                self.layout.push(location.clone());
            }
        }
        self.sink.initialize(&self.layout)?;
        self.initialized = true;
        Ok(())
    }

    /// Store one sample and re-render its location.
    pub fn dispatch(&mut self, sample: &Sample) -> DispatchOutcome {
        let location = sample.location();

        if !self.known.contains(location) {
            match self.policy {
                UnknownLocationPolicy::Drop => {
                    tracing::warn!(location = %location, "Dropping sample for location outside the display layout");
                    self.stats.dropped += 1;
                    return DispatchOutcome::Dropped;
                }
                UnknownLocationPolicy::Register => {
                    if let Err(error) = self.sink.add_slot(location) {
                        tracing::warn!(location = %location, error = %error, "Failed to open display slot");
                        self.stats.sink_errors += 1;
                        return DispatchOutcome::SinkFailed;
                    }
                    self.known.insert(location.to_string());
                    self.layout.push(location.to_string());
                    tracing::info!(location = %location, "Registered display slot for new location");
                }
            }
        }

        let window = self.store.append(location, SeriesPoint::from(sample));
        let window_len = window.len();
        match self.sink.update(location, window) {
            Ok(()) => {
                self.stats.rendered += 1;
                DispatchOutcome::Rendered { window_len }
            }
            Err(error) => {
                tracing::warn!(location = %location, error = %error, "Visualization sink update failed");
                self.stats.sink_errors += 1;
                DispatchOutcome::SinkFailed
            }
        }
    }

    /// Count a sample rejected before it could be dispatched.
    pub const fn record_rejected(&mut self) {
        self.stats.rejected += 1;
    }

    /// The windowed store.
    #[must_use]
    pub const fn store(&self) -> &WindowedSeriesStore {
        &self.store
    }

    /// Current display layout, in slot order.
    #[must_use]
    pub fn layout(&self) -> &[Location] {
        &self.layout
    }

    /// Unknown-location policy.
    #[must_use]
    pub const fn policy(&self) -> UnknownLocationPolicy {
        self.policy
    }

    /// Dispatch counters.
    #[must_use]
    pub const fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// The sink.
    #[must_use]
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// Consume the dispatcher, returning the sink.
    #[must_use]
    pub fn into_sink(self) -> S {
        self.sink
    }
}

// =============================================================================
// Tests
// =============================================================================
