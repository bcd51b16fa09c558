use ovs_core::errors::ErrorInfo;
use ovs_core::{EnsembleSampler, OvsError, Side, WeightMeter};
use serde::{Deserialize, Serialize};

use crate::coordinator::OverlapCoordinator;

/// Final free-energy readout.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FreeEnergyResult {
    /// Two-sided partition-function ratio at the readout bias.
    pub ratio: f64,
    /// Standard error of the ratio, both sides combined in quadrature.
    pub error: f64,
    /// Free-energy difference `-T * ln(ratio)`.
    pub delta_f: f64,
    /// Standard error of the free-energy difference.
    pub delta_f_error: f64,
}

/// Pure query layer turning accumulator snapshots into a free-energy number.
///
/// Reading never perturbs coordinator state, so the estimate can be polled
/// mid-run for progress reporting.
#[derive(Debug)]
pub struct FreeEnergyEstimator {
    temperature: f64,
}

impl FreeEnergyEstimator {
    /// Creates an estimator for a fixed, positive temperature.
    pub fn new(temperature: f64) -> Result<Self, OvsError> {
        if !temperature.is_finite() || temperature <= 0.0 {
            return Err(OvsError::Config(
                ErrorInfo::new(
                    "estimator-temperature",
                    format!("temperature {temperature} must be finite and positive"),
                )
                .with_hint("the free-energy scale is -T * ln(ratio)"),
            ));
        }
        Ok(Self { temperature })
    }

    /// Temperature the estimator converts ratios with.
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Reads both sides at the central slot and derives the estimate.
    ///
    /// The two sides sample independent ensembles, so their relative errors
    /// combine in quadrature; each side's cross-channel covariance is already
    /// inside its `ratio_error`.
    pub fn measure<D0, D1>(
        &self,
        coordinator: &OverlapCoordinator<D0, D1>,
    ) -> Result<FreeEnergyResult, OvsError>
    where
        D0: EnsembleSampler + WeightMeter,
        D1: EnsembleSampler + WeightMeter,
    {
        let grid = coordinator.grid();
        let slot = grid.center_index();
        let reference = coordinator
            .accumulator(Side::Reference)
            .stats(slot)?;
        let target = coordinator
            .accumulator(Side::Target)
            .stats(grid.paired_index(slot))?;

        let ratio = reference.ratio_average / target.ratio_average;
        let relative_0 = reference.ratio_error / reference.ratio_average;
        let relative_1 = target.ratio_error / target.ratio_average;
        let error = ratio.abs() * (relative_0 * relative_0 + relative_1 * relative_1).sqrt();
        Ok(FreeEnergyResult {
            ratio,
            error,
            delta_f: -self.temperature * ratio.ln(),
            delta_f_error: self.temperature * error / ratio,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerConfig;
    use ovs_core::RngHandle;
    use ovs_stat::BiasGrid;

    struct ConstantDriver(f64);

    impl EnsembleSampler for ConstantDriver {
        fn advance(&mut self, _rng: &mut RngHandle) -> Result<(), OvsError> {
            Ok(())
        }
    }

    impl WeightMeter for ConstantDriver {
        fn observe(&self, _bias: f64) -> f64 {
            self.0
        }
    }

    fn run_constant_pair(reference: f64, target: f64) -> OverlapCoordinator<ConstantDriver, ConstantDriver> {
        let config = SchedulerConfig {
            steps_per_block: 4,
            adjust_interval: 0,
            initial_fraction: 0.5,
        };
        let grid = BiasGrid::locked(1.0).unwrap();
        let mut coordinator = OverlapCoordinator::new(
            &config,
            1,
            grid,
            2,
            ConstantDriver(reference),
            ConstantDriver(target),
        )
        .unwrap();
        coordinator.run_blocks(8).unwrap();
        coordinator
    }

    #[test]
    fn constant_streams_give_exact_ratio_and_zero_error() {
        let estimator = FreeEnergyEstimator::new(3.0).unwrap();
        let result = estimator.measure(&run_constant_pair(0.4, 0.8)).unwrap();
        assert!((result.ratio - 0.5).abs() < 1e-12);
        assert_eq!(result.error, 0.0);
        assert!((result.delta_f - 3.0 * std::f64::consts::LN_2).abs() < 1e-12);
        assert_eq!(result.delta_f_error, 0.0);
    }

    #[test]
    fn unit_ratio_means_zero_free_energy_difference() {
        let estimator = FreeEnergyEstimator::new(0.7).unwrap();
        let result = estimator.measure(&run_constant_pair(1.0, 1.0)).unwrap();
        assert_eq!(result.ratio, 1.0);
        assert_eq!(result.delta_f, 0.0);
    }

    #[test]
    fn measuring_before_two_blocks_is_insufficient() {
        let config = SchedulerConfig {
            steps_per_block: 1,
            adjust_interval: 0,
            initial_fraction: 0.5,
        };
        let grid = BiasGrid::locked(1.0).unwrap();
        let mut coordinator = OverlapCoordinator::new(
            &config,
            1,
            grid,
            8,
            ConstantDriver(1.0),
            ConstantDriver(1.0),
        )
        .unwrap();
        coordinator.run_blocks(2).unwrap();
        let estimator = FreeEnergyEstimator::new(1.0).unwrap();
        let err = estimator.measure(&coordinator).unwrap_err();
        assert_eq!(err.info().code, "insufficient-blocks");
    }

    #[test]
    fn rejects_non_positive_temperature() {
        for bad in [0.0, -1.0, f64::NAN] {
            let err = FreeEnergyEstimator::new(bad).unwrap_err();
            assert_eq!(err.info().code, "estimator-temperature");
        }
    }
}
