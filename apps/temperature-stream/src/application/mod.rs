//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the session and rendering services and the port
//! interfaces that connect them to the transport, the generator and the
//! visualization.

/// Port interfaces for external systems (generator, outbound half, sink).
pub mod ports;

/// Application services for stream sessions and client-side rendering.
pub mod services;
