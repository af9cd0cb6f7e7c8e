//! Wire Conversions
//!
//! Mapping between domain samples and `temperature.v1` messages.

use super::proto::temperature::v1::TemperatureData;
use crate::domain::sample::{Sample, SampleError};

/// Encode a sample for the wire.
#[must_use]
pub fn sample_to_proto(sample: &Sample) -> TemperatureData {
    TemperatureData {
        location: sample.location().to_string(),
        temperature: sample.value(),
        timestamp: sample.wire_timestamp(),
    }
}

/// Decode a sample received from the wire.
///
/// # Errors
///
/// Returns an error for an empty location or an unparsable timestamp.
pub fn sample_from_proto(data: TemperatureData) -> Result<Sample, SampleError> {
    Sample::from_wire(data.location, data.temperature, &data.timestamp)
}
