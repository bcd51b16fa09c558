use std::fs::File;
use std::io::Write;
use std::path::Path;

use ovs_core::{EnsembleSampler, Side, WeightMeter};
use serde::{Deserialize, Serialize};

use crate::coordinator::OverlapCoordinator;

/// Per-snapshot metrics stored for CSV export.
///
/// One row is recorded per search stage and per production reporting
/// interval; `ratio` and `error` are NaN while the estimate is not yet
/// available.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineSample {
    /// Phase label ("warmup", "coarse-scan", "refine", "locked", "production").
    pub stage: String,
    /// Steps the reference side has executed in the current phase.
    pub reference_steps: u64,
    /// Steps the target side has executed in the current phase.
    pub target_steps: u64,
    /// Completed statistical blocks at the readout slot, reference side.
    pub reference_blocks: u64,
    /// Completed statistical blocks at the readout slot, target side.
    pub target_blocks: u64,
    /// Step fraction the scheduler is currently steering toward.
    pub target_fraction: f64,
    /// Step fraction actually realized so far.
    pub actual_fraction: f64,
    /// Two-sided ratio estimate at the readout slot.
    pub ratio: f64,
    /// Standard error of the ratio estimate.
    pub error: f64,
}

impl TimelineSample {
    /// Snapshots a coordinator's scheduling state under a stage label.
    ///
    /// Block counts are read at the central slot (all slots of one side fill
    /// at the same rate). The caller supplies `ratio` and `error`, NaN when
    /// no estimate exists yet.
    pub fn capture<D0, D1>(
        stage: &str,
        coordinator: &OverlapCoordinator<D0, D1>,
        ratio: f64,
        error: f64,
    ) -> Self
    where
        D0: EnsembleSampler + WeightMeter,
        D1: EnsembleSampler + WeightMeter,
    {
        let grid = coordinator.grid();
        let slot = grid.center_index();
        Self {
            stage: stage.to_string(),
            reference_steps: coordinator.side_steps(Side::Reference),
            target_steps: coordinator.side_steps(Side::Target),
            reference_blocks: coordinator
                .accumulator(Side::Reference)
                .blocks(slot)
                .unwrap_or(0),
            target_blocks: coordinator
                .accumulator(Side::Target)
                .blocks(grid.paired_index(slot))
                .unwrap_or(0),
            target_fraction: coordinator.step_fraction(),
            actual_fraction: coordinator.actual_step_fraction(),
            ratio,
            error,
        }
    }
}

/// Collects timeline snapshots for CSV export.
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    samples: Vec<TimelineSample>,
}

impl MetricsRecorder {
    /// Creates a new recorder instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one timeline snapshot.
    pub fn push_sample(&mut self, sample: TimelineSample) {
        self.samples.push(sample);
    }

    /// Returns an immutable view over the recorded samples.
    pub fn samples(&self) -> &[TimelineSample] {
        &self.samples
    }

    /// Writes the recorded timeline to a CSV file.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let mut file = File::create(path)?;
        writeln!(
            file,
            "stage,reference_steps,target_steps,reference_blocks,target_blocks,target_fraction,actual_fraction,ratio,error"
        )?;
        for sample in &self.samples {
            writeln!(
                file,
                "{},{},{},{},{},{:.4},{:.4},{},{}",
                sample.stage,
                sample.reference_steps,
                sample.target_steps,
                sample.reference_blocks,
                sample.target_blocks,
                sample.target_fraction,
                sample.actual_fraction,
                sample.ratio,
                sample.error
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_has_header_and_one_row_per_sample() {
        let mut recorder = MetricsRecorder::new();
        for step in 1..=3u64 {
            recorder.push_sample(TimelineSample {
                stage: "production".to_string(),
                reference_steps: 100 * step,
                target_steps: 80 * step,
                reference_blocks: step,
                target_blocks: step,
                target_fraction: 0.55,
                actual_fraction: 0.5556,
                ratio: 0.135,
                error: 0.01 / step as f64,
            });
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.csv");
        recorder.write_csv(&path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("stage,reference_steps"));
        assert!(lines[1].starts_with("production,100,80,1,1,0.5500,0.5556,0.135,"));
    }
}
