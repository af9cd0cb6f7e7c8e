//! Temperature Client Binary
//!
//! Subscribes to a set of locations and renders a live sliding window of
//! samples per location.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin temperature-client
//! ```
//!
//! # Environment Variables
//!
//! - `TEMPERATURE_SERVER_URL`: Server URL (default: http://127.0.0.1:50051)
//! - `TEMPERATURE_LOCATIONS`: Comma-separated locations (default: New York,San Francisco,London)
//! - `TEMPERATURE_WINDOW_CAPACITY`: Points kept per location (default: 20)
//! - `TEMPERATURE_UNKNOWN_LOCATION_POLICY`: drop | register (default: drop)
//! - `OTEL_ENABLED`: Enable OpenTelemetry export (default: false)
//! - `RUST_LOG`: Log level (default: info)

use anyhow::Context;
use temperature_stream::application::services::RenderDispatcher;
use temperature_stream::infrastructure::config::{ClientConfig, load_dotenv};
use temperature_stream::infrastructure::grpc::{SubscriptionDriver, receive_samples};
use temperature_stream::infrastructure::shutdown::await_shutdown;
use temperature_stream::infrastructure::sink::ConsoleSink;
use temperature_stream::infrastructure::telemetry;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    let _telemetry_guard = telemetry::init(telemetry::CLIENT_SERVICE_NAME);

    let config = ClientConfig::from_env().context("invalid client configuration")?;
    tracing::info!(
        server_url = %config.server_url,
        locations = ?config.locations,
        window_capacity = config.window_capacity.get(),
        unknown_location_policy = config.unknown_location_policy.as_str(),
        "Configuration loaded"
    );

    let mut dispatcher = RenderDispatcher::new(
        ConsoleSink::stdout(),
        config.window_capacity,
        config.unknown_location_policy,
    );
    dispatcher
        .initialize(&config.locations)
        .context("failed to set up the display")?;

    let mut driver = SubscriptionDriver::connect(&config.server_url).await?;
    let stream = driver.subscribe(&config.locations).await?;

    let shutdown_token = CancellationToken::new();
    tokio::spawn(await_shutdown(shutdown_token.clone()));

    let summary = receive_samples(stream, &mut dispatcher, &shutdown_token).await;
    shutdown_token.cancel();

    let stats = dispatcher.stats();
    tracing::info!(
        outcome = summary.outcome.as_str(),
        received = summary.received,
        rendered = stats.rendered,
        dropped = stats.dropped,
        rejected = stats.rejected,
        sink_errors = stats.sink_errors,
        "Temperature client stopped"
    );
    Ok(())
}
