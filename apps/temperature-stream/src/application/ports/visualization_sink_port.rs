//! Visualization Sink Port (Driven Port)
//!
//! Rendering target for the client's windowed series.

use crate::domain::sample::Location;
use crate::domain::series::SeriesWindow;

/// Rendering failure.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Writing to the output failed.
    #[error("sink write failed: {0}")]
    Io(#[from] std::io::Error),

    /// The sink was used before `initialize`.
    #[error("sink not initialized")]
    NotInitialized,

    /// The sink has no slot for the location.
    #[error("no display slot for location {0:?}")]
    UnknownSlot(String),
}

/// Port for rendering sliding windows.
///
/// `initialize` is called once with the ordered layout; `update` is called
/// with the current window after each append. The sink only borrows the
/// window and never mutates the store.
#[cfg_attr(test, mockall::automock)]
pub trait VisualizationSink: Send {
    /// Set up one display slot per location, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be prepared.
    fn initialize(&mut self, layout: &[Location]) -> Result<(), SinkError>;

    /// Redraw the slot for `location` from its current window.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    fn update(&mut self, location: &str, window: &SeriesWindow) -> Result<(), SinkError>;

    /// Open a slot for a location that was not in the initial layout.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be added.
    fn add_slot(&mut self, location: &str) -> Result<(), SinkError>;
}
