use serde::{Deserialize, Serialize};

use ovs_core::errors::{ErrorInfo, OvsError};

/// Ordered set of candidate bias values for one search stage.
///
/// Geometric grids are log-spaced around a center `c` with ratio span `s`:
/// `b_i = c * s^((2i - (n-1)) / (n-1))`, so the first and last values are
/// `c/s` and `c*s` and the center sits exactly on the middle slot. The point
/// count is odd for that reason. Grids are immutable; a stage transition
/// builds a new one.
///
/// The two sides of a session share a single grid. Side 1 is metered at the
/// mirrored traversal [`BiasGrid::mirrored_value`], which makes slot `i` on
/// side 0 and slot `n-1-i` on side 1 observations of the same bias value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasGrid {
    values: Vec<f64>,
    center: f64,
    span: f64,
}

impl BiasGrid {
    /// Builds a log-spaced grid around `center` spanning the ratio `span`.
    pub fn geometric(center: f64, span: f64, points: usize) -> Result<Self, OvsError> {
        if !center.is_finite() || center <= 0.0 {
            return Err(OvsError::Grid(
                ErrorInfo::new(
                    "grid-center-invalid",
                    format!("grid center {center} must be positive and finite"),
                )
                .with_hint("re-run the previous search stage before building this grid"),
            ));
        }
        if !span.is_finite() || span <= 1.0 {
            return Err(OvsError::Grid(ErrorInfo::new(
                "grid-span-invalid",
                format!("grid span {span} must be finite and greater than 1"),
            )));
        }
        if points < 3 || points % 2 == 0 {
            return Err(OvsError::Grid(
                ErrorInfo::new(
                    "grid-points-invalid",
                    format!("grid needs an odd point count of at least 3, got {points}"),
                )
                .with_hint("an odd count keeps the center value on the grid"),
            ));
        }
        let denominator = (points - 1) as f64;
        let mut values = Vec::with_capacity(points);
        for i in 0..points {
            let exponent = (2 * i as i64 - (points as i64 - 1)) as f64 / denominator;
            let value = center * span.powf(exponent);
            if !value.is_finite() || value <= 0.0 {
                return Err(OvsError::Grid(
                    ErrorInfo::new(
                        "grid-value-overflow",
                        format!("grid value at slot {i} is not a positive finite number"),
                    )
                    .with_context("center", center.to_string())
                    .with_context("span", span.to_string()),
                ));
            }
            if let Some(&previous) = values.last() {
                if value <= previous {
                    return Err(OvsError::Grid(
                        ErrorInfo::new(
                            "grid-not-increasing",
                            format!("grid values collapsed at slot {i}"),
                        )
                        .with_hint("the span is too wide for the center's floating point range"),
                    ));
                }
            }
            values.push(value);
        }
        Ok(Self {
            values,
            center,
            span,
        })
    }

    /// Builds the single-point grid used once the bias value is locked.
    pub fn locked(value: f64) -> Result<Self, OvsError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(OvsError::Grid(ErrorInfo::new(
                "grid-value-invalid",
                format!("locked bias value {value} must be positive and finite"),
            )));
        }
        Ok(Self {
            values: vec![value],
            center: value,
            span: 1.0,
        })
    }

    /// Number of grid points.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the grid is empty (never the case for constructed grids).
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True for the single-point production grid.
    pub fn is_locked(&self) -> bool {
        self.values.len() == 1
    }

    /// All grid values in increasing order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value at `index`; the index must be below [`BiasGrid::len`].
    pub fn value(&self, index: usize) -> f64 {
        self.values[index]
    }

    /// The center value the grid was built around.
    pub fn center(&self) -> f64 {
        self.center
    }

    /// The ratio span of the grid (1 for locked grids).
    pub fn span(&self) -> f64 {
        self.span
    }

    /// Slot index holding the center value.
    pub fn center_index(&self) -> usize {
        (self.values.len() - 1) / 2
    }

    /// The slot on the other side paired with `index`.
    pub fn paired_index(&self, index: usize) -> usize {
        self.values.len() - 1 - index
    }

    /// The bias value side 1 is metered at for slot `index`.
    pub fn mirrored_value(&self, index: usize) -> f64 {
        self.values[self.paired_index(index)]
    }

    /// Multiplicative spacing between adjacent grid values.
    pub fn spacing_factor(&self) -> f64 {
        if self.values.len() > 1 {
            self.span.powf(2.0 / (self.values.len() - 1) as f64)
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometric_grid_is_log_symmetric() {
        let grid = BiasGrid::geometric(2.0, 10.0, 11).unwrap();
        assert_eq!(grid.len(), 11);
        assert!((grid.value(0) - 0.2).abs() < 1e-12);
        assert!((grid.value(10) - 20.0).abs() < 1e-12);
        assert_eq!(grid.value(grid.center_index()), 2.0);
        for i in 0..grid.len() {
            let product = grid.value(i) * grid.mirrored_value(i);
            assert!(
                (product - 4.0).abs() < 1e-9,
                "paired product at {i}: {product}"
            );
        }
        let mut previous = 0.0;
        for &value in grid.values() {
            assert!(value > previous);
            previous = value;
        }
    }

    #[test]
    fn spacing_factor_matches_adjacent_ratio() {
        let grid = BiasGrid::geometric(1.0, 5.0, 11).unwrap();
        let ratio = grid.value(6) / grid.value(5);
        assert!((grid.spacing_factor() - ratio).abs() < 1e-12);
    }

    #[test]
    fn rejects_bad_parameters() {
        assert_eq!(
            BiasGrid::geometric(0.0, 40.0, 41).unwrap_err().info().code,
            "grid-center-invalid"
        );
        assert_eq!(
            BiasGrid::geometric(1.0, 1.0, 41).unwrap_err().info().code,
            "grid-span-invalid"
        );
        assert_eq!(
            BiasGrid::geometric(1.0, 40.0, 40).unwrap_err().info().code,
            "grid-points-invalid"
        );
        assert_eq!(
            BiasGrid::geometric(1.0, 40.0, 1).unwrap_err().info().code,
            "grid-points-invalid"
        );
        assert_eq!(
            BiasGrid::locked(f64::NAN).unwrap_err().info().code,
            "grid-value-invalid"
        );
        assert_eq!(
            BiasGrid::locked(0.0).unwrap_err().info().code,
            "grid-value-invalid"
        );
    }

    #[test]
    fn locked_grid_is_a_single_point() {
        let grid = BiasGrid::locked(0.125).unwrap();
        assert!(grid.is_locked());
        assert_eq!(grid.len(), 1);
        assert_eq!(grid.center_index(), 0);
        assert_eq!(grid.paired_index(0), 0);
        assert_eq!(grid.value(0), 0.125);
        assert_eq!(grid.spacing_factor(), 1.0);
    }
}
