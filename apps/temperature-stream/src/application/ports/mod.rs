//! Application Ports (Driver and Driven)
//!
//! Ports define interfaces for interacting with external systems.
//! - **Server side**: `ReadingGenerator` produces values, `SampleOutbound` is
//!   the write half of one stream, `SessionObserver` receives lifecycle events
//! - **Client side**: `VisualizationSink` renders windows

mod reading_generator_port;
mod sample_outbound_port;
mod session_observer_port;
mod visualization_sink_port;

pub use reading_generator_port::{ReadingGenerator, SequenceReadingGenerator};
pub use sample_outbound_port::{CollectingOutbound, OutboundClosed, SampleOutbound};
pub use session_observer_port::{NoOpSessionObserver, SessionObserver};
#[cfg(test)]
pub use visualization_sink_port::MockVisualizationSink;
pub use visualization_sink_port::{SinkError, VisualizationSink};
