//! Validated weight observations.

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, OvsError};

/// One validated weight-ratio observation destined for a single grid slot.
///
/// Meters produce raw `f64` values; wrapping them here is the point where a
/// non-finite observation is rejected, before it can corrupt the running
/// statistics downstream.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct WeightSample(f64);

impl WeightSample {
    /// Validates and wraps a raw meter observation.
    pub fn new(value: f64) -> Result<Self, OvsError> {
        if !value.is_finite() {
            return Err(OvsError::Sample(
                ErrorInfo::new(
                    "non-finite-sample",
                    format!("weight observation {value} is not finite"),
                )
                .with_hint("check the weight meter for overflow or division by zero"),
            ));
        }
        Ok(Self(value))
    }

    /// Returns the raw observation value.
    pub fn value(&self) -> f64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_finite_values() {
        assert_eq!(WeightSample::new(0.0).unwrap().value(), 0.0);
        assert_eq!(WeightSample::new(-3.5).unwrap().value(), -3.5);
    }

    #[test]
    fn rejects_non_finite_values() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = WeightSample::new(bad).unwrap_err();
            assert_eq!(err.info().code, "non-finite-sample");
        }
    }
}
