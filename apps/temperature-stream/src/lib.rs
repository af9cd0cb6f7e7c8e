#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::cast_precision_loss
    )
)]

//! Temperature Stream - Synthetic Sensor Streaming
//!
//! A gRPC service that streams synthetic temperature samples over one
//! bidirectional stream per client, and a client that keeps a sliding
//! window of recent samples per location and renders it live.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core types and protocol state
//!   - `sample`: Temperature samples and timestamp formats
//!   - `session`: Subscription registry and session state machine
//!   - `series`: Bounded per-location history
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Generator, outbound half, session observer, visualization sink
//!   - `services`: Session runner, broadcast loop, render dispatcher
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `grpc`: tonic server, session tracker, subscription client
//!   - `generator`: Uniform random readings
//!   - `sink`: Terminal rendering
//!   - `config`: Environment configuration
//!   - `health`: Health check HTTP endpoint
//!
//! # Data Flow
//!
//! ```text
//!  client                                   server
//!  ──────                                   ──────
//!  locations ──► TemperatureRequest* ──►   SUBSCRIBING (registry grows)
//!  close send half ────────────────────►   BROADCASTING (registry frozen)
//!  RenderDispatcher ◄── TemperatureData* ◄─ one sample per location per tick
//!    └─► WindowedSeriesStore ─► VisualizationSink
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core types with no transport dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::sample::{Location, Sample, SampleError};
pub use domain::series::{DEFAULT_WINDOW_CAPACITY, SeriesPoint, SeriesWindow, WindowedSeriesStore};
pub use domain::session::{
    CloseReason, FrozenRegistry, SessionError, SessionId, SessionPhase, SessionReport,
    StreamSession,
};

// Application services and ports
pub use application::ports::{
    CollectingOutbound, NoOpSessionObserver, OutboundClosed, ReadingGenerator, SampleOutbound,
    SequenceReadingGenerator, SessionObserver, SinkError, VisualizationSink,
};
pub use application::services::{
    BroadcastLoop, DispatchOutcome, DispatchStats, RenderDispatcher, SessionRunner,
    UnknownLocationPolicy,
};

// Infrastructure config
pub use infrastructure::config::{ClientConfig, ConfigError, ServerConfig};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// gRPC (for integration tests)
pub use infrastructure::grpc::{
    ClientError, ReceiveSummary, SessionCounts, SessionTracker, StreamOutcome,
    SubscriptionDriver, TemperatureStreamServer, TemperatureStreamServerConfig,
    proto::temperature::v1 as proto, receive_samples,
};

// Generator and sink
pub use infrastructure::generator::UniformReadingGenerator;
pub use infrastructure::sink::ConsoleSink;

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
