//! Environment Settings
//!
//! Static configuration for the server and client binaries, read once at
//! startup from environment variables.

use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::time::Duration;

use crate::application::services::UnknownLocationPolicy;
use crate::domain::sample::Location;
use crate::domain::series::DEFAULT_WINDOW_CAPACITY;
use crate::infrastructure::generator::{DEFAULT_MAX, DEFAULT_MIN};

/// Default gRPC listen address.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:50051";

/// Default server URL for the client.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:50051";

/// Default monitored locations.
pub const DEFAULT_LOCATIONS: &str = "New York,San Francisco,London";

// =============================================================================
// Server
// =============================================================================

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// gRPC listen address.
    pub listen_addr: SocketAddr,
    /// Broadcast tick interval.
    pub tick_interval: Duration,
    /// Session pool capacity.
    pub max_sessions: usize,
    /// Per-session outbound buffer, in samples.
    pub session_buffer: usize,
    /// Lower bound of generated values (inclusive).
    pub value_min: f64,
    /// Upper bound of generated values (exclusive).
    pub value_max: f64,
    /// Health check HTTP port (0 = disabled).
    pub health_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 50051)),
            tick_interval: Duration::from_secs(1),
            max_sessions: 10,
            session_buffer: 64,
            value_min: DEFAULT_MIN,
            value_max: DEFAULT_MAX,
            health_port: 8083,
        }
    }
}

impl ServerConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is present but invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let env = EnvReader { lookup };

        let listen_addr = match env.get("TEMPERATURE_LISTEN_ADDR") {
            Some(raw) => raw
                .parse::<SocketAddr>()
                .map_err(|_| ConfigError::InvalidValue {
                    key: "TEMPERATURE_LISTEN_ADDR".to_string(),
                    value: raw,
                })?,
            None => defaults.listen_addr,
        };

        let config = Self {
            listen_addr,
            tick_interval: env.duration_millis("TEMPERATURE_TICK_INTERVAL_MS", defaults.tick_interval),
            max_sessions: env.parse("TEMPERATURE_MAX_SESSIONS", defaults.max_sessions),
            session_buffer: env.parse("TEMPERATURE_SESSION_BUFFER", defaults.session_buffer),
            value_min: env.parse("TEMPERATURE_VALUE_MIN", defaults.value_min),
            value_max: env.parse("TEMPERATURE_VALUE_MAX", defaults.value_max),
            health_port: env.parse("TEMPERATURE_HEALTH_PORT", defaults.health_port),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value constraints.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval.is_zero() {
            return Err(ConfigError::ZeroValue("TEMPERATURE_TICK_INTERVAL_MS".to_string()));
        }
        if self.max_sessions == 0 {
            return Err(ConfigError::ZeroValue("TEMPERATURE_MAX_SESSIONS".to_string()));
        }
        if self.session_buffer == 0 {
            return Err(ConfigError::ZeroValue("TEMPERATURE_SESSION_BUFFER".to_string()));
        }
        if !(self.value_min.is_finite() && self.value_max.is_finite())
            || self.value_min >= self.value_max
        {
            return Err(ConfigError::InvalidRange {
                min: self.value_min,
                max: self.value_max,
            });
        }
        Ok(())
    }

    /// Whether the health server should run.
    #[must_use]
    pub const fn health_enabled(&self) -> bool {
        self.health_port != 0
    }
}

// =============================================================================
// Client
// =============================================================================

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server URL.
    pub server_url: String,
    /// Locations to subscribe to, in display order.
    pub locations: Vec<Location>,
    /// Points kept per location.
    pub window_capacity: NonZeroUsize,
    /// Handling of samples for locations outside the layout.
    pub unknown_location_policy: UnknownLocationPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            locations: parse_locations(DEFAULT_LOCATIONS),
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            unknown_location_policy: UnknownLocationPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is present but invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let env = EnvReader { lookup };

        let server_url = match env.get("TEMPERATURE_SERVER_URL") {
            Some(url) if url.trim().is_empty() => {
                return Err(ConfigError::EmptyValue("TEMPERATURE_SERVER_URL".to_string()));
            }
            Some(url) => url.trim().to_string(),
            None => defaults.server_url,
        };

        let locations = match env.get("TEMPERATURE_LOCATIONS") {
            Some(raw) => parse_locations(&raw),
            None => defaults.locations,
        };
        if locations.is_empty() {
            return Err(ConfigError::EmptyValue("TEMPERATURE_LOCATIONS".to_string()));
        }

        let window_capacity = NonZeroUsize::new(
            env.parse("TEMPERATURE_WINDOW_CAPACITY", defaults.window_capacity.get()),
        )
        .ok_or_else(|| ConfigError::ZeroValue("TEMPERATURE_WINDOW_CAPACITY".to_string()))?;

        let unknown_location_policy = match env.get("TEMPERATURE_UNKNOWN_LOCATION_POLICY") {
            Some(raw) => UnknownLocationPolicy::from_str_case_insensitive(&raw).ok_or_else(|| {
                ConfigError::InvalidValue {
                    key: "TEMPERATURE_UNKNOWN_LOCATION_POLICY".to_string(),
                    value: raw,
                }
            })?,
            None => defaults.unknown_location_policy,
        };

        Ok(Self {
            server_url,
            locations,
            window_capacity,
            unknown_location_policy,
        })
    }
}

/// Split a comma-separated location list, trimming entries and dropping
/// empty ones.
#[must_use]
pub fn parse_locations(raw: &str) -> Vec<Location> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

// =============================================================================
// Errors
// =============================================================================

/// Configuration error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable must be non-zero.
    #[error("environment variable {0} must be greater than zero")]
    ZeroValue(String),
    /// Environment variable could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Raw value.
        value: String,
    },
    /// Generated value range is empty or not finite.
    #[error("invalid reading range [{min}, {max})")]
    InvalidRange {
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
}

// =============================================================================
// Env Helpers
// =============================================================================

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn duration_millis(&self, key: &str, default: Duration) -> Duration {
        self.get(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(default, Duration::from_millis)
    }
}
