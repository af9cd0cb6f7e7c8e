//! Temperature Server Binary
//!
//! Serves the `TemperatureService` bidirectional stream.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin temperature-server
//! ```
//!
//! # Environment Variables
//!
//! - `TEMPERATURE_LISTEN_ADDR`: gRPC listen address (default: 127.0.0.1:50051)
//! - `TEMPERATURE_TICK_INTERVAL_MS`: Broadcast period (default: 1000)
//! - `TEMPERATURE_MAX_SESSIONS`: Concurrent session limit (default: 10)
//! - `TEMPERATURE_SESSION_BUFFER`: Per-session outbound buffer (default: 64)
//! - `TEMPERATURE_VALUE_MIN` / `TEMPERATURE_VALUE_MAX`: Reading range (default: -10..40)
//! - `TEMPERATURE_HEALTH_PORT`: Health check HTTP port, 0 disables (default: 8083)
//! - `OTEL_ENABLED`: Enable OpenTelemetry export (default: false)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;

use anyhow::Context;
use temperature_stream::infrastructure::config::{ServerConfig, load_dotenv};
use temperature_stream::infrastructure::generator::UniformReadingGenerator;
use temperature_stream::infrastructure::grpc::{
    SessionTracker, TemperatureStreamServer, TemperatureStreamServerConfig,
};
use temperature_stream::infrastructure::health::{HealthServer, HealthServerState};
use temperature_stream::infrastructure::shutdown::await_shutdown;
use temperature_stream::infrastructure::telemetry;
use temperature_stream::init_metrics;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    // Initialize telemetry (tracing + optional OTLP export)
    let _telemetry_guard = telemetry::init(telemetry::SERVER_SERVICE_NAME);

    tracing::info!("Starting temperature server");

    // Initialize Prometheus metrics
    if let Err(e) = init_metrics() {
        tracing::warn!(error = %e, "Metrics recorder unavailable");
    }

    let config = ServerConfig::from_env().context("invalid server configuration")?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let generator = Arc::new(
        UniformReadingGenerator::new(config.value_min, config.value_max)
            .context("invalid reading range")?,
    );
    let tracker = Arc::new(SessionTracker::new());

    let server_config = TemperatureStreamServerConfig {
        tick_interval: config.tick_interval,
        max_sessions: config.max_sessions,
        session_buffer: config.session_buffer,
    };
    let grpc_server = TemperatureStreamServer::new(
        &server_config,
        generator,
        Arc::clone(&tracker),
        shutdown_token.clone(),
    );

    // Spawn health server
    if config.health_enabled() {
        let health_state = Arc::new(HealthServerState::new(
            env!("CARGO_PKG_VERSION").to_string(),
            config.max_sessions,
            Arc::clone(&tracker),
            shutdown_token.clone(),
        ));
        let health_server =
            HealthServer::new(config.health_port, health_state, shutdown_token.clone());
        tokio::spawn(async move {
            if let Err(e) = health_server.run().await {
                tracing::error!(error = %e, "Health server error");
            }
        });
    }

    tokio::spawn(await_shutdown(shutdown_token.clone()));

    tracing::info!(addr = %config.listen_addr, "gRPC server listening");
    Server::builder()
        .add_service(grpc_server.into_service())
        .serve_with_shutdown(config.listen_addr, shutdown_token.clone().cancelled_owned())
        .await
        .with_context(|| format!("gRPC server failed on {}", config.listen_addr))?;

    let counts = tracker.counts();
    tracing::info!(
        opened = counts.opened_total,
        closed = counts.closed_total,
        "Temperature server stopped"
    );
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &ServerConfig) {
    tracing::info!(
        listen_addr = %config.listen_addr,
        tick_interval_ms = config.tick_interval.as_millis(),
        max_sessions = config.max_sessions,
        session_buffer = config.session_buffer,
        health_port = config.health_port,
        "Configuration loaded"
    );
    tracing::debug!(
        value_min = config.value_min,
        value_max = config.value_max,
        "Reading range"
    );
}
