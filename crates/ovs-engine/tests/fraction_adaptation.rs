use ovs_core::{EnsembleSampler, OvsError, RngHandle, WeightMeter};
use ovs_engine::{OverlapCoordinator, SchedulerConfig};
use ovs_stat::BiasGrid;

struct UniformNoise {
    mean: f64,
    scale: f64,
    last: f64,
}

impl UniformNoise {
    fn new(mean: f64, scale: f64) -> Self {
        Self {
            mean,
            scale,
            last: mean,
        }
    }
}

impl EnsembleSampler for UniformNoise {
    fn advance(&mut self, rng: &mut RngHandle) -> Result<(), OvsError> {
        self.last = self.mean + self.scale * (rng.next_unit() - 0.5);
        Ok(())
    }
}

impl WeightMeter for UniformNoise {
    fn observe(&self, _bias: f64) -> f64 {
        self.last
    }
}

// With equal means the variance-balancing fraction is s0/(s0+s1) where s is
// each side's per-sample deviation scale, so a 3:1 noise ratio settles at 0.75.
#[test]
fn fraction_settles_at_the_error_balance_point() {
    let config = SchedulerConfig {
        steps_per_block: 10,
        adjust_interval: 2,
        initial_fraction: 0.5,
    };
    let mut coordinator = OverlapCoordinator::new(
        &config,
        99,
        BiasGrid::locked(1.0).unwrap(),
        20,
        UniformNoise::new(1.0, 0.6),
        UniformNoise::new(1.0, 0.2),
    )
    .unwrap();

    coordinator.run_blocks(2000).unwrap();

    let fraction = coordinator.step_fraction();
    assert!(
        (fraction - 0.75).abs() < 0.08,
        "target fraction {fraction} missed the 0.75 balance point"
    );
    let actual = coordinator.actual_step_fraction();
    assert!(
        (actual - 0.75).abs() < 0.08,
        "realized fraction {actual} missed the 0.75 balance point"
    );
}

#[test]
fn extreme_noise_imbalance_stays_inside_the_clamp() {
    let config = SchedulerConfig {
        steps_per_block: 10,
        adjust_interval: 2,
        initial_fraction: 0.5,
    };
    let mut coordinator = OverlapCoordinator::new(
        &config,
        7,
        BiasGrid::locked(1.0).unwrap(),
        20,
        UniformNoise::new(1.0, 1.9),
        UniformNoise::new(1.0, 1e-9),
    )
    .unwrap();

    coordinator.run_blocks(500).unwrap();

    let fraction = coordinator.step_fraction();
    assert!(fraction <= 0.99, "fraction {fraction} exceeded the clamp");
    assert!(fraction > 0.9, "fraction {fraction} did not chase the noise");
    // even at the clamp the starved side keeps receiving occasional blocks
    assert!(coordinator.actual_step_fraction() < 1.0);
}
