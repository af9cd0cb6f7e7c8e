//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Configuration from environment variables.
pub mod config;

/// Random reading generator.
pub mod generator;

/// gRPC server and subscription client.
pub mod grpc;

/// Health check HTTP endpoint.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Signal handling for graceful shutdown.
pub mod shutdown;

/// Terminal visualization sink.
pub mod sink;

/// OpenTelemetry tracing integration.
pub mod telemetry;
