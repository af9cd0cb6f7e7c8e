//! Reading Generator Port (Driven Port)
//!
//! Source of synthetic values for the broadcast loop.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

use crate::domain::sample::{Sample, SampleError};

/// Port for producing one reading for a location.
///
/// Implementations must be cheap and non-blocking; the broadcast loop calls
/// `generate` once per registered location per tick, right before writing
/// the sample.
pub trait ReadingGenerator: Send + Sync {
    /// Produce a fresh sample for `location`, timestamped now.
    ///
    /// # Errors
    ///
    /// Returns an error if a sample cannot be built for `location`.
    fn generate(&self, location: &str) -> Result<Sample, SampleError>;
}

/// Deterministic generator for testing.
///
/// Emits `start`, `start + step`, `start + 2 * step`, ... across all
/// locations in call order.
#[derive(Debug)]
pub struct SequenceReadingGenerator {
    start: f64,
    step: f64,
    calls: AtomicU64,
}

impl SequenceReadingGenerator {
    /// Create a generator.
    #[must_use]
    pub const fn new(start: f64, step: f64) -> Self {
        Self {
            start,
            step,
            calls: AtomicU64::new(0),
        }
    }

    /// Number of samples generated so far.
    #[must_use]
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Default for SequenceReadingGenerator {
    fn default() -> Self {
        Self::new(1.0, 1.0)
    }
}

impl ReadingGenerator for SequenceReadingGenerator {
    #[allow(clippy::cast_precision_loss)]
    fn generate(&self, location: &str) -> Result<Sample, SampleError> {
        let n = self.calls.fetch_add(1, Ordering::Relaxed);
        Sample::new(location, self.step.mul_add(n as f64, self.start), Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_generator_counts_up() {
        let generator = SequenceReadingGenerator::new(10.0, 0.5);

        let values: Vec<_> = (0..3)
            .map(|_| generator.generate("X").unwrap().value())
            .collect();

        assert_eq!(values, vec![10.0, 10.5, 11.0]);
        assert_eq!(generator.calls(), 3);
    }

    #[test]
    fn sequence_generator_rejects_empty_location() {
        let generator = SequenceReadingGenerator::default();
        assert_eq!(
            generator.generate("").unwrap_err(),
            SampleError::EmptyLocation
        );
    }
}
