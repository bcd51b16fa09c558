use ovs_core::errors::ErrorInfo;
use ovs_core::{EnsembleSampler, OvsError, RngHandle, Side, WeightMeter, WeightSample};
use ovs_stat::{BiasGrid, RatioAccumulator};

use crate::config::SchedulerConfig;
use crate::determinism;

/// Lower clamp of the adaptive step fraction.
pub const MIN_STEP_FRACTION: f64 = 0.01;
/// Upper clamp of the adaptive step fraction.
pub const MAX_STEP_FRACTION: f64 = 0.99;

struct SideState<D> {
    driver: D,
    rng: RngHandle,
    acc: RatioAccumulator,
    steps: u64,
}

impl<D: EnsembleSampler + WeightMeter> SideState<D> {
    fn new(driver: D, seed: u64, slots: usize, block_size: u64) -> Result<Self, OvsError> {
        Ok(Self {
            driver,
            rng: RngHandle::from_seed(seed),
            acc: RatioAccumulator::new(slots, block_size)?,
            steps: 0,
        })
    }

    /// One block: each step advances the sampler once, then meters every
    /// grid slot. Side 1 traverses the grid mirrored so its slot `j` is
    /// evaluated at the same bias as side 0's slot `n-1-j`.
    fn run_block(&mut self, grid: &BiasGrid, mirrored: bool, steps: u64) -> Result<(), OvsError> {
        for _ in 0..steps {
            self.driver.advance(&mut self.rng)?;
            for slot in 0..grid.len() {
                let bias = if mirrored {
                    grid.mirrored_value(slot)
                } else {
                    grid.value(slot)
                };
                let sample = WeightSample::new(self.driver.observe(bias))?;
                self.acc.add_sample(slot, sample)?;
            }
            self.steps += 1;
        }
        Ok(())
    }
}

/// Two-side alternating block scheduler.
///
/// Drives the reference and target samplers in contiguous blocks of steps,
/// steering the share of effort given to the reference side toward the point
/// where both sides contribute equally to the estimator variance. Sampler
/// state and RNG streams persist across stage transitions; accumulators and
/// the grid are replaced wholesale by `relocate`.
pub struct OverlapCoordinator<D0, D1> {
    grid: BiasGrid,
    reference: SideState<D0>,
    target: SideState<D1>,
    steps_per_block: u64,
    adjust_interval: u64,
    adjust_enabled: bool,
    fraction: f64,
    blocks_done: u64,
}

impl<D0, D1> OverlapCoordinator<D0, D1>
where
    D0: EnsembleSampler + WeightMeter,
    D1: EnsembleSampler + WeightMeter,
{
    /// Creates a coordinator over a validated scheduler configuration.
    ///
    /// Both sides receive fresh accumulators sized to the grid and their own
    /// deterministic RNG substream derived from the master seed.
    pub fn new(
        config: &SchedulerConfig,
        master_seed: u64,
        grid: BiasGrid,
        block_size: u64,
        reference: D0,
        target: D1,
    ) -> Result<Self, OvsError> {
        let slots = grid.len();
        Ok(Self {
            reference: SideState::new(
                reference,
                determinism::side_seed(master_seed, Side::Reference),
                slots,
                block_size,
            )?,
            target: SideState::new(
                target,
                determinism::side_seed(master_seed, Side::Target),
                slots,
                block_size,
            )?,
            grid,
            steps_per_block: config.steps_per_block,
            adjust_interval: config.adjust_interval,
            adjust_enabled: true,
            fraction: config
                .initial_fraction
                .clamp(MIN_STEP_FRACTION, MAX_STEP_FRACTION),
            blocks_done: 0,
        })
    }

    /// Runs `blocks` scheduling blocks, picking a side per block.
    pub fn run_blocks(&mut self, blocks: u64) -> Result<(), OvsError> {
        for _ in 0..blocks {
            match self.next_side() {
                Side::Reference => {
                    self.reference
                        .run_block(&self.grid, false, self.steps_per_block)?
                }
                Side::Target => self
                    .target
                    .run_block(&self.grid, true, self.steps_per_block)?,
            }
            self.blocks_done += 1;
            if self.adjust_enabled
                && self.adjust_interval > 0
                && self.blocks_done % self.adjust_interval == 0
            {
                if let Some(fraction) = self.ideal_step_fraction() {
                    self.fraction = fraction.clamp(MIN_STEP_FRACTION, MAX_STEP_FRACTION);
                }
            }
        }
        Ok(())
    }

    /// Runs at least `steps` sampler steps; an in-progress block always
    /// completes, so the actual count rounds up to whole blocks.
    pub fn run_steps(&mut self, steps: u64) -> Result<(), OvsError> {
        let per_block = self.steps_per_block.max(1);
        self.run_blocks((steps + per_block - 1) / per_block)
    }

    /// Installs a new grid and fresh accumulators on both sides.
    ///
    /// Per-stage step counters restart at zero; sampler state and RNG
    /// streams carry over untouched.
    pub fn relocate(&mut self, grid: BiasGrid, block_size: u64) -> Result<(), OvsError> {
        let slots = grid.len();
        self.reference.acc = RatioAccumulator::new(slots, block_size)?;
        self.target.acc = RatioAccumulator::new(slots, block_size)?;
        self.reference.steps = 0;
        self.target.steps = 0;
        self.blocks_done = 0;
        self.grid = grid;
        Ok(())
    }

    /// Discards accumulated statistics without touching the grid or the
    /// samplers. Used to drop warmup data before measurement begins.
    pub fn reset_measurement(&mut self) {
        self.reference.acc.reset();
        self.target.acc.reset();
        self.reference.steps = 0;
        self.target.steps = 0;
        self.blocks_done = 0;
    }

    /// Step fraction both sides' center-slot statistics currently call for,
    /// or `None` while either side lacks the 2 completed blocks to answer.
    pub fn ideal_step_fraction(&self) -> Option<f64> {
        let slot = self.grid.center_index();
        let s0 = sample_scale(&self.reference.acc, slot, self.reference.steps)?;
        let s1 = sample_scale(&self.target.acc, slot, self.target.steps)?;
        if s0 + s1 <= 0.0 {
            return None;
        }
        Some(s0 / (s0 + s1))
    }

    /// Current target share of effort for the reference side.
    pub fn step_fraction(&self) -> f64 {
        self.fraction
    }

    /// Share of executed steps the reference side actually received.
    pub fn actual_step_fraction(&self) -> f64 {
        let total = self.reference.steps + self.target.steps;
        if total == 0 {
            return 0.0;
        }
        self.reference.steps as f64 / total as f64
    }

    /// Pins the target step fraction.
    pub fn set_step_fraction(&mut self, fraction: f64) -> Result<(), OvsError> {
        if !fraction.is_finite() || !(MIN_STEP_FRACTION..=MAX_STEP_FRACTION).contains(&fraction) {
            return Err(OvsError::Config(
                ErrorInfo::new(
                    "step-fraction-out-of-range",
                    format!(
                        "step fraction {fraction} must lie in [{MIN_STEP_FRACTION}, {MAX_STEP_FRACTION}]"
                    ),
                )
                .with_hint("the scheduler needs both sides to keep sampling"),
            ));
        }
        self.fraction = fraction;
        Ok(())
    }

    /// Enables or disables the periodic step-fraction adaptation.
    pub fn set_adjust_step_fraction(&mut self, enabled: bool) {
        self.adjust_enabled = enabled;
    }

    /// Whether the step fraction is being adapted.
    pub fn adjusts_step_fraction(&self) -> bool {
        self.adjust_enabled
    }

    /// Grid currently metered by both sides.
    pub fn grid(&self) -> &BiasGrid {
        &self.grid
    }

    /// One side's accumulator, for estimator and search queries.
    pub fn accumulator(&self, side: Side) -> &RatioAccumulator {
        match side {
            Side::Reference => &self.reference.acc,
            Side::Target => &self.target.acc,
        }
    }

    /// Steps one side has executed since the last relocation.
    pub fn side_steps(&self, side: Side) -> u64 {
        match side {
            Side::Reference => self.reference.steps,
            Side::Target => self.target.steps,
        }
    }

    /// Scheduling blocks completed since the last relocation.
    pub fn blocks_completed(&self) -> u64 {
        self.blocks_done
    }

    /// Steps executed per scheduling block.
    pub fn steps_per_block(&self) -> u64 {
        self.steps_per_block
    }

    fn next_side(&self) -> Side {
        let total = (self.reference.steps + self.target.steps) as f64;
        if (self.reference.steps as f64) <= self.fraction * total {
            Side::Reference
        } else {
            Side::Target
        }
    }
}

// Relative error is capped at 1 (NaN counts as 1) so early noise cannot pin
// the schedule; the sqrt(steps) factor turns the current standard error into
// a per-sample deviation scale.
fn sample_scale(acc: &RatioAccumulator, slot: usize, steps: u64) -> Option<f64> {
    let average = acc.ratio_average(slot).ok()?;
    let error = acc.ratio_error(slot).ok()?;
    let mut relative = (error / average).abs();
    if !relative.is_finite() || relative > 1.0 {
        relative = 1.0;
    }
    Some(relative * (steps as f64).sqrt())
}
