//! Domain Layer - Core streaming types and protocol state.
//!
//! This layer contains the samples, the per-session subscription state
//! machine and the client-side windowed series store. Nothing here knows
//! about gRPC, the network or the rendering surface.

/// Temperature samples and timestamp formatting.
pub mod sample;

/// Per-connection subscription registry and session state machine.
pub mod session;

/// Sliding-window history per location.
pub mod series;
