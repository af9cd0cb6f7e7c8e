//! Synthetic Reading Generator
//!
//! Uniformly distributed readings over a half-open value range, timestamped
//! at generation time.

use std::ops::Range;

use chrono::Utc;
use rand::Rng;

use crate::application::ports::ReadingGenerator;
use crate::domain::sample::{Sample, SampleError};

/// Default lower bound (inclusive).
pub const DEFAULT_MIN: f64 = -10.0;

/// Default upper bound (exclusive).
pub const DEFAULT_MAX: f64 = 40.0;

/// Generator producing values uniformly in `[min, max)`.
#[derive(Debug, Clone)]
pub struct UniformReadingGenerator {
    range: Range<f64>,
}

impl UniformReadingGenerator {
    /// Create a generator over `[min, max)`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRange` unless `min < max` and both are finite.
    pub fn new(min: f64, max: f64) -> Result<Self, InvalidRange> {
        if !(min.is_finite() && max.is_finite() && min < max) {
            return Err(InvalidRange { min, max });
        }
        Ok(Self { range: min..max })
    }

    /// Value range.
    #[must_use]
    pub fn range(&self) -> Range<f64> {
        self.range.clone()
    }
}

impl Default for UniformReadingGenerator {
    fn default() -> Self {
        Self {
            range: DEFAULT_MIN..DEFAULT_MAX,
        }
    }
}

impl ReadingGenerator for UniformReadingGenerator {
    fn generate(&self, location: &str) -> Result<Sample, SampleError> {
        let value = rand::rng().random_range(self.range.clone());
        Sample::new(location, value, Utc::now())
    }
}

/// Rejected generator bounds.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("invalid reading range [{min}, {max})")]
pub struct InvalidRange {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn values_stay_in_range() {
        let generator = UniformReadingGenerator::new(-1.0, 1.0).unwrap();
        for _ in 0..1000 {
            let sample = generator.generate("X").unwrap();
            assert!((-1.0..1.0).contains(&sample.value()));
            assert_eq!(sample.location(), "X");
        }
    }

    #[test]
    fn default_range() {
        assert_eq!(
            UniformReadingGenerator::default().range(),
            DEFAULT_MIN..DEFAULT_MAX
        );
    }

    #[test]
    fn timestamps_are_current() {
        let before = Utc::now();
        let sample = UniformReadingGenerator::default().generate("X").unwrap();
        assert!(sample.timestamp() >= before);
        assert!(sample.timestamp() <= Utc::now());
    }

    #[test_case(1.0, 1.0 ; "empty range")]
    #[test_case(5.0, 1.0 ; "inverted range")]
    #[test_case(f64::NAN, 1.0 ; "nan bound")]
    #[test_case(0.0, f64::INFINITY ; "infinite bound")]
    fn rejects_bad_range(min: f64, max: f64) {
        assert!(UniformReadingGenerator::new(min, max).is_err());
    }
}
