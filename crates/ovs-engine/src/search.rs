use std::path::PathBuf;

use ovs_core::errors::ErrorInfo;
use ovs_core::{EnsembleSampler, OvsError, Side, WeightMeter};
use ovs_stat::BiasGrid;
use serde::{Deserialize, Serialize};

use crate::config::{BlockPolicy, SearchSchedule};
use crate::coordinator::OverlapCoordinator;
use crate::metrics::{MetricsRecorder, TimelineSample};
use crate::persist;

/// Phase of the staged bias search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchStage {
    /// Equilibration on the coarse grid; statistics discarded afterwards.
    Warmup,
    /// Wide scan locating the first bias estimate.
    CoarseScan,
    /// Narrowing scan around the previous estimate.
    Refine,
    /// Single-point production grid.
    Locked,
}

impl SearchStage {
    /// Stable label used in reports and error contexts.
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchStage::Warmup => "warmup",
            SearchStage::CoarseScan => "coarse-scan",
            SearchStage::Refine => "refine",
            SearchStage::Locked => "locked",
        }
    }
}

/// Record of one executed search stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutcome {
    /// Stage kind.
    pub stage: SearchStage,
    /// Grid center the stage sampled around.
    pub center: f64,
    /// Multiplicative half-range of the stage grid.
    pub span: f64,
    /// Grid points metered per step.
    pub points: usize,
    /// Statistical block size used by the stage accumulators.
    pub block_size: u64,
    /// Steps the reference side spent in the stage.
    pub reference_steps: u64,
    /// Steps the target side spent in the stage.
    pub target_steps: u64,
    /// Minimum-discrepancy grid index, where the stage located one.
    pub winning_index: Option<usize>,
    /// Bias estimate the stage handed to its successor.
    pub located_bias: f64,
}

/// Result of a completed search, embedded in manifests and summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// Locked bias value production runs at.
    pub bias: f64,
    /// Whether the bias came from a persisted file instead of a search.
    pub from_restart: bool,
    /// Explanation recorded when a persisted bias existed but was unusable.
    pub restart_note: Option<String>,
    /// Per-stage records in execution order.
    pub stages: Vec<StageOutcome>,
}

/// Staged protocol discovering a near-optimal bias value.
///
/// The engine drives a coordinator through warmup, a coarse scan, and
/// narrowing refinement rounds, then collapses the grid to a single point.
/// The step fraction is pinned at 0.5 with adaptation disabled for the whole
/// search and re-enabled at lock. When a bias file is configured it is tried
/// first; a usable value skips straight to the locked stage.
pub struct BiasSearchEngine {
    schedule: SearchSchedule,
    blocks: BlockPolicy,
    bias_file: Option<PathBuf>,
}

impl BiasSearchEngine {
    /// Creates a search engine from the schedule and block policy.
    pub fn new(schedule: SearchSchedule, blocks: BlockPolicy) -> Self {
        Self {
            schedule,
            blocks,
            bias_file: None,
        }
    }

    /// Configures the persisted-bias file consulted before searching and
    /// written at lock.
    pub fn with_bias_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.bias_file = Some(path.into());
        self
    }

    /// Runs the staged search, leaving the coordinator locked on the result.
    ///
    /// One timeline row is recorded per stage; scan rows carry the located
    /// ratio, warmup and locked rows carry NaN.
    pub fn run<D0, D1>(
        &self,
        coordinator: &mut OverlapCoordinator<D0, D1>,
        recorder: &mut MetricsRecorder,
    ) -> Result<SearchOutcome, OvsError>
    where
        D0: EnsembleSampler + WeightMeter,
        D1: EnsembleSampler + WeightMeter,
    {
        let block_size = self.blocks.block_size_for(self.schedule.stage_steps);

        let mut restart_note = None;
        if let Some(path) = &self.bias_file {
            match persist::load_bias(path) {
                Ok(Some(bias)) => {
                    let bias = validate_bias(SearchStage::Locked, bias)?;
                    coordinator.relocate(BiasGrid::locked(bias)?, block_size)?;
                    coordinator.set_adjust_step_fraction(true);
                    recorder.push_sample(TimelineSample::capture(
                        SearchStage::Locked.as_str(),
                        coordinator,
                        f64::NAN,
                        f64::NAN,
                    ));
                    return Ok(SearchOutcome {
                        bias,
                        from_restart: true,
                        restart_note: None,
                        stages: vec![locked_outcome(bias, block_size)],
                    });
                }
                Ok(None) => {}
                Err(err @ OvsError::Persist(_)) => {
                    restart_note = Some(err.to_string());
                }
                Err(err) => return Err(err),
            }
        }

        let mut stages = Vec::new();

        let coarse = BiasGrid::geometric(
            self.schedule.initial_bias,
            self.schedule.coarse_span,
            self.schedule.coarse_points,
        )?;
        coordinator.relocate(coarse, block_size)?;
        coordinator.set_step_fraction(0.5)?;
        coordinator.set_adjust_step_fraction(false);

        coordinator.run_steps(self.schedule.stage_steps / 2)?;
        recorder.push_sample(TimelineSample::capture(
            SearchStage::Warmup.as_str(),
            coordinator,
            f64::NAN,
            f64::NAN,
        ));
        stages.push(StageOutcome {
            stage: SearchStage::Warmup,
            center: self.schedule.initial_bias,
            span: self.schedule.coarse_span,
            points: self.schedule.coarse_points,
            block_size,
            reference_steps: coordinator.side_steps(Side::Reference),
            target_steps: coordinator.side_steps(Side::Target),
            winning_index: None,
            located_bias: self.schedule.initial_bias,
        });
        coordinator.reset_measurement();

        coordinator.run_steps(self.schedule.stage_steps)?;
        let (index, located) = locate(coordinator, SearchStage::CoarseScan)?;
        recorder.push_sample(TimelineSample::capture(
            SearchStage::CoarseScan.as_str(),
            coordinator,
            located,
            f64::NAN,
        ));
        stages.push(StageOutcome {
            stage: SearchStage::CoarseScan,
            center: self.schedule.initial_bias,
            span: self.schedule.coarse_span,
            points: self.schedule.coarse_points,
            block_size,
            reference_steps: coordinator.side_steps(Side::Reference),
            target_steps: coordinator.side_steps(Side::Target),
            winning_index: Some(index),
            located_bias: located,
        });
        let mut center = located;

        // Refinement stops early once a round moves the center by less than
        // half a final-round grid spacing in log space.
        let final_span = self
            .schedule
            .refine_spans
            .last()
            .copied()
            .unwrap_or(self.schedule.coarse_span);
        let log_tolerance = final_span.ln() / (self.schedule.refine_points - 1) as f64;

        for &span in &self.schedule.refine_spans {
            let grid = BiasGrid::geometric(center, span, self.schedule.refine_points)?;
            coordinator.relocate(grid, block_size)?;
            coordinator.run_steps(self.schedule.stage_steps)?;
            let (index, located) = locate(coordinator, SearchStage::Refine)?;
            recorder.push_sample(TimelineSample::capture(
                SearchStage::Refine.as_str(),
                coordinator,
                located,
                f64::NAN,
            ));
            stages.push(StageOutcome {
                stage: SearchStage::Refine,
                center,
                span,
                points: self.schedule.refine_points,
                block_size,
                reference_steps: coordinator.side_steps(Side::Reference),
                target_steps: coordinator.side_steps(Side::Target),
                winning_index: Some(index),
                located_bias: located,
            });
            let shift = (located.ln() - center.ln()).abs();
            center = located;
            if shift <= log_tolerance {
                break;
            }
        }

        let bias = validate_bias(SearchStage::Locked, center)?;
        if let Some(path) = &self.bias_file {
            persist::store_bias(path, bias)?;
        }
        coordinator.relocate(BiasGrid::locked(bias)?, block_size)?;
        coordinator.set_adjust_step_fraction(true);
        recorder.push_sample(TimelineSample::capture(
            SearchStage::Locked.as_str(),
            coordinator,
            f64::NAN,
            f64::NAN,
        ));
        stages.push(locked_outcome(bias, block_size));

        Ok(SearchOutcome {
            bias,
            from_restart: false,
            restart_note,
            stages,
        })
    }
}

fn locked_outcome(bias: f64, block_size: u64) -> StageOutcome {
    StageOutcome {
        stage: SearchStage::Locked,
        center: bias,
        span: 1.0,
        points: 1,
        block_size,
        reference_steps: 0,
        target_steps: 0,
        winning_index: None,
        located_bias: bias,
    }
}

/// Finds the grid index whose measured two-sided ratio best agrees with its
/// own bias value, in squared log difference. Indices with a non-finite
/// discrepancy are skipped; ties go to the lowest index. The returned value
/// is the measured ratio at the winner, already validated.
fn locate<D0, D1>(
    coordinator: &OverlapCoordinator<D0, D1>,
    stage: SearchStage,
) -> Result<(usize, f64), OvsError>
where
    D0: EnsembleSampler + WeightMeter,
    D1: EnsembleSampler + WeightMeter,
{
    let grid = coordinator.grid();
    let reference = coordinator.accumulator(Side::Reference);
    let target = coordinator.accumulator(Side::Target);
    let mut best: Option<(usize, f64, f64)> = None;
    for index in 0..grid.len() {
        let ratio = reference.ratio_average(index)?
            / target.ratio_average(grid.paired_index(index))?;
        let discrepancy = (ratio.ln() - grid.value(index).ln()).powi(2);
        if !discrepancy.is_finite() {
            continue;
        }
        if best.map_or(true, |(_, held, _)| discrepancy < held) {
            best = Some((index, discrepancy, ratio));
        }
    }
    let (index, _, ratio) = best.ok_or_else(|| {
        OvsError::Search(
            ErrorInfo::new(
                "search-no-finite-discrepancy",
                "no grid index produced a finite self-consistency discrepancy",
            )
            .with_context("stage", stage.as_str())
            .with_hint("increase stage_steps so both sides complete blocks at the scan grid"),
        )
    })?;
    Ok((index, validate_bias(stage, ratio)?))
}

fn validate_bias(stage: SearchStage, value: f64) -> Result<f64, OvsError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(OvsError::Search(
            ErrorInfo::new(
                "search-degenerate-bias",
                format!("bias estimate {value} is not a positive finite number"),
            )
            .with_context("stage", stage.as_str()),
        ));
    }
    Ok(value)
}
