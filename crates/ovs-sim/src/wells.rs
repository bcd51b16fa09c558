use ovs_core::errors::ErrorInfo;
use ovs_core::{EnsembleSampler, OvsError, RngHandle, Side, WeightMeter};
use serde::{Deserialize, Serialize};

/// 1-D harmonic well `U(x) = spring/2 * (x - center)^2 + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HarmonicWell {
    /// Spring constant.
    pub spring: f64,
    /// Well minimum position.
    pub center: f64,
    /// Constant energy offset.
    pub offset: f64,
}

impl HarmonicWell {
    /// Potential energy at `x`.
    pub fn energy(&self, x: f64) -> f64 {
        let dx = x - self.center;
        0.5 * self.spring * dx * dx + self.offset
    }
}

/// Double-well system section of the run file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellsConfig {
    /// Well sampled by the reference side.
    #[serde(default = "default_reference_well")]
    pub reference: HarmonicWell,
    /// Well sampled by the target side.
    #[serde(default = "default_target_well")]
    pub target: HarmonicWell,
    /// Half-width of the uniform displacement proposal.
    #[serde(default = "default_step_size")]
    pub step_size: f64,
}

fn default_reference_well() -> HarmonicWell {
    HarmonicWell {
        spring: 1.0,
        center: 0.0,
        offset: 0.0,
    }
}

fn default_target_well() -> HarmonicWell {
    HarmonicWell {
        spring: 1.0,
        center: 1.5,
        offset: 2.0,
    }
}

fn default_step_size() -> f64 {
    1.0
}

impl Default for WellsConfig {
    fn default() -> Self {
        Self {
            reference: default_reference_well(),
            target: default_target_well(),
            step_size: default_step_size(),
        }
    }
}

impl WellsConfig {
    /// Validates the system parameters.
    pub fn validate(&self) -> Result<(), OvsError> {
        for (label, well) in [("reference", &self.reference), ("target", &self.target)] {
            if !well.spring.is_finite() || well.spring <= 0.0 {
                return Err(system_error(
                    "system-spring",
                    format!("{label} well spring {} must be a positive finite number", well.spring),
                ));
            }
            if !well.center.is_finite() || !well.offset.is_finite() {
                return Err(system_error(
                    "system-well",
                    format!("{label} well center and offset must be finite"),
                ));
            }
        }
        if !self.step_size.is_finite() || self.step_size <= 0.0 {
            return Err(system_error(
                "system-step-size",
                format!("step size {} must be a positive finite number", self.step_size),
            ));
        }
        Ok(())
    }
}

fn system_error(code: &str, message: String) -> OvsError {
    OvsError::Config(ErrorInfo::new(code, message).with_hint("adjust the system section of the run file"))
}

/// Exact partition-function ratio of two harmonic wells.
///
/// Centers do not enter; the Gaussian integrals are translation invariant.
pub fn analytic_ratio(reference: &HarmonicWell, target: &HarmonicWell, temperature: f64) -> f64 {
    (reference.spring / target.spring).sqrt()
        * (-(target.offset - reference.offset) / temperature).exp()
}

/// Metropolis walker confined to one well, metering the overlap weight
/// against the other well.
pub struct WellWalker {
    side: Side,
    own: HarmonicWell,
    other: HarmonicWell,
    temperature: f64,
    step_size: f64,
    position: f64,
    accepted: u64,
    proposed: u64,
}

impl WellWalker {
    /// Creates a walker starting at its own well minimum.
    pub fn new(
        side: Side,
        own: HarmonicWell,
        other: HarmonicWell,
        temperature: f64,
        step_size: f64,
    ) -> Self {
        Self {
            side,
            own,
            other,
            temperature,
            step_size,
            position: own.center,
            accepted: 0,
            proposed: 0,
        }
    }

    /// Current walker position.
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Fraction of proposals accepted so far.
    pub fn acceptance_rate(&self) -> f64 {
        if self.proposed == 0 {
            return 0.0;
        }
        self.accepted as f64 / self.proposed as f64
    }
}

impl EnsembleSampler for WellWalker {
    fn advance(&mut self, rng: &mut RngHandle) -> Result<(), OvsError> {
        let trial = self.position + (2.0 * rng.next_unit() - 1.0) * self.step_size;
        let delta = self.own.energy(trial) - self.own.energy(self.position);
        self.proposed += 1;
        if delta <= 0.0 || rng.next_unit() < (-delta / self.temperature).exp() {
            self.position = trial;
            self.accepted += 1;
        }
        Ok(())
    }
}

impl WeightMeter for WellWalker {
    fn observe(&self, bias: f64) -> f64 {
        // Evaluated through 1/e so large energy gaps saturate toward 0, 1,
        // or 1/bias instead of overflowing to NaN.
        let log_e =
            (self.own.energy(self.position) - self.other.energy(self.position)) / self.temperature;
        let inv_e = (-log_e).exp();
        match self.side {
            Side::Reference => 1.0 / (1.0 + bias * inv_e),
            Side::Target => 1.0 / (inv_e + bias),
        }
    }
}

/// Builds the reference and target walkers for a configured system.
pub fn walker_pair(config: &WellsConfig, temperature: f64) -> (WellWalker, WellWalker) {
    (
        WellWalker::new(
            Side::Reference,
            config.reference,
            config.target,
            temperature,
            config.step_size,
        ),
        WellWalker::new(
            Side::Target,
            config.target,
            config.reference,
            temperature,
            config.step_size,
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovs_core::WeightSample;

    #[test]
    fn walker_equilibrates_in_its_own_well() {
        let well = HarmonicWell {
            spring: 1.0,
            center: 3.0,
            offset: 0.0,
        };
        let other = default_target_well();
        let mut walker = WellWalker::new(Side::Reference, well, other, 1.0, 1.5);
        let mut rng = RngHandle::from_seed(0x5EED);

        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        let samples = 20_000;
        for _ in 0..samples {
            walker.advance(&mut rng).unwrap();
            sum += walker.position();
            sum_sq += walker.position() * walker.position();
        }
        let mean = sum / samples as f64;
        let variance = sum_sq / samples as f64 - mean * mean;

        assert!((mean - 3.0).abs() < 0.1, "mean {mean}");
        assert!(
            (variance - 1.0).abs() < 0.15,
            "variance {variance} should approach T/spring"
        );
        let rate = walker.acceptance_rate();
        assert!(rate > 0.3 && rate < 0.95, "acceptance rate {rate}");
    }

    #[test]
    fn meters_match_the_overlap_formulas_at_the_start_position() {
        let reference = default_reference_well();
        let target = HarmonicWell {
            spring: 1.0,
            center: 1.0,
            offset: 0.0,
        };
        let bias = 2.0;

        // reference walker sits at x = 0 where e = exp(-0.5)
        let walker = WellWalker::new(Side::Reference, reference, target, 1.0, 1.0);
        let e = (-0.5f64).exp();
        assert!((walker.observe(bias) - e / (e + bias)).abs() < 1e-15);

        // target walker sits at x = 1 where its e is also exp(-0.5)
        let walker = WellWalker::new(Side::Target, target, reference, 1.0, 1.0);
        assert!((walker.observe(bias) - e / (1.0 + bias * e)).abs() < 1e-15);
    }

    #[test]
    fn saturated_meters_stay_finite() {
        let low = default_reference_well();
        let high = HarmonicWell {
            spring: 1.0,
            center: 0.0,
            offset: 800.0,
        };
        for side in [Side::Reference, Side::Target] {
            let uphill = WellWalker::new(side, low, high, 1.0, 1.0);
            let downhill = WellWalker::new(side, high, low, 1.0, 1.0);
            for bias in [1e-3, 1.0, 1e3] {
                let up = uphill.observe(bias);
                let down = downhill.observe(bias);
                assert!(up.is_finite() && down.is_finite());
                assert!(WeightSample::new(up).is_ok());
                assert!(WeightSample::new(down).is_ok());
            }
        }
    }

    #[test]
    fn analytic_ratio_matches_the_demo_wells() {
        let config = WellsConfig::default();
        let ratio = analytic_ratio(&config.reference, &config.target, 1.0);
        assert!((ratio - (-2.0f64).exp()).abs() < 1e-15);
    }

    #[test]
    fn rejects_non_positive_system_parameters() {
        let mut config = WellsConfig::default();
        config.reference.spring = 0.0;
        assert_eq!(config.validate().unwrap_err().info().code, "system-spring");

        let mut config = WellsConfig::default();
        config.step_size = -1.0;
        assert_eq!(
            config.validate().unwrap_err().info().code,
            "system-step-size"
        );

        let mut config = WellsConfig::default();
        config.target.offset = f64::NAN;
        assert_eq!(config.validate().unwrap_err().info().code, "system-well");
    }
}
