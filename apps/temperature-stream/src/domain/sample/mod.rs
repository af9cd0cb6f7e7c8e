//! Temperature Samples
//!
//! The wire-level unit of data: one reading for one location at one instant.
//! Samples are immutable once constructed.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

// =============================================================================
// Types
// =============================================================================

/// An opaque location identifier used as the subscription key.
pub type Location = String;

/// Display format for the client's x-axis labels.
const DISPLAY_TIME_FORMAT: &str = "%H:%M:%S";

/// Fallback format for timestamps without an offset (naive UTC).
const NAIVE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// One reading: (location, value, timestamp).
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    location: Location,
    value: f64,
    timestamp: DateTime<Utc>,
}

impl Sample {
    /// Create a new sample.
    ///
    /// # Errors
    ///
    /// Returns `SampleError::EmptyLocation` if `location` is empty.
    pub fn new(
        location: impl Into<Location>,
        value: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, SampleError> {
        let location = location.into();
        if location.is_empty() {
            return Err(SampleError::EmptyLocation);
        }
        Ok(Self {
            location,
            value,
            timestamp,
        })
    }

    /// Decode a sample from its wire fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the location is empty or the timestamp cannot be
    /// parsed.
    pub fn from_wire(
        location: impl Into<Location>,
        value: f64,
        timestamp: &str,
    ) -> Result<Self, SampleError> {
        let timestamp = parse_wire_timestamp(timestamp)?;
        Self::new(location, value, timestamp)
    }

    /// The location this sample belongs to.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// The reading value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// The instant the reading was generated.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Timestamp in wire format (RFC 3339, UTC, microseconds).
    #[must_use]
    pub fn wire_timestamp(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    /// Human-readable clock string used as the display time.
    #[must_use]
    pub fn display_time(&self) -> String {
        self.timestamp.format(DISPLAY_TIME_FORMAT).to_string()
    }
}

// =============================================================================
// Timestamp Parsing
// =============================================================================

/// Parse a wire timestamp.
///
/// Accepts RFC 3339 with any offset, or a naive ISO-8601 date-time which is
/// taken as UTC.
///
/// # Errors
///
/// Returns `SampleError::InvalidTimestamp` if neither form matches.
pub fn parse_wire_timestamp(raw: &str) -> Result<DateTime<Utc>, SampleError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, NAIVE_TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| SampleError::InvalidTimestamp(raw.to_string()))
}

// =============================================================================
// Errors
// =============================================================================

/// Sample construction errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SampleError {
    /// Location was empty.
    #[error("sample location cannot be empty")]
    EmptyLocation,

    /// Timestamp could not be parsed.
    #[error("invalid sample timestamp: {0:?}")]
    InvalidTimestamp(String),
}

// =============================================================================
// Tests
// =============================================================================
