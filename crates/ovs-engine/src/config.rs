use std::fs;
use std::path::{Path, PathBuf};

use ovs_core::errors::ErrorInfo;
use ovs_core::OvsError;
use serde::{Deserialize, Serialize};

/// YAML-configurable parameters governing an overlap session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlapConfig {
    /// Temperature shared by both ensembles (sets the free-energy scale).
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Block scheduling and step-fraction adaptation.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Staged bias-search schedule.
    #[serde(default)]
    pub search: SearchSchedule,
    /// Statistical block sizing policy.
    #[serde(default)]
    pub blocks: BlockPolicy,
    /// Production run length and reporting cadence.
    #[serde(default)]
    pub production: ProductionConfig,
    /// Master seed and substream policy.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    /// Output directory configuration.
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_temperature() -> f64 {
    1.0
}

impl Default for OverlapConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            scheduler: SchedulerConfig::default(),
            search: SearchSchedule::default(),
            blocks: BlockPolicy::default(),
            production: ProductionConfig::default(),
            seed_policy: SeedPolicy::default(),
            output: OutputConfig::default(),
        }
    }
}

impl OverlapConfig {
    /// Loads a configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self, OvsError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            OvsError::Config(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        let config: Self = serde_yaml::from_str(&contents).map_err(|err| {
            OvsError::Config(
                ErrorInfo::new("config-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects parameter combinations the engine cannot run.
    pub fn validate(&self) -> Result<(), OvsError> {
        if !self.temperature.is_finite() || self.temperature <= 0.0 {
            return Err(config_error(
                "config-temperature",
                format!("temperature {} must be finite and positive", self.temperature),
            ));
        }
        if self.scheduler.steps_per_block == 0 {
            return Err(config_error(
                "config-steps-per-block",
                "steps_per_block must be at least 1",
            ));
        }
        if !(self.scheduler.initial_fraction > 0.0 && self.scheduler.initial_fraction < 1.0) {
            return Err(config_error(
                "config-initial-fraction",
                format!(
                    "initial_fraction {} must lie strictly between 0 and 1",
                    self.scheduler.initial_fraction
                ),
            ));
        }
        if !self.search.initial_bias.is_finite() || self.search.initial_bias <= 0.0 {
            return Err(config_error(
                "config-initial-bias",
                format!(
                    "initial_bias {} must be finite and positive",
                    self.search.initial_bias
                ),
            ));
        }
        for (points, name) in [
            (self.search.coarse_points, "coarse_points"),
            (self.search.refine_points, "refine_points"),
        ] {
            if points < 3 || points % 2 == 0 {
                return Err(config_error(
                    "config-grid-points",
                    format!("{name} = {points} must be an odd count of at least 3"),
                ));
            }
        }
        for (span, name) in std::iter::once((self.search.coarse_span, "coarse_span")).chain(
            self.search
                .refine_spans
                .iter()
                .map(|&span| (span, "refine_spans")),
        ) {
            if !span.is_finite() || span <= 1.0 {
                return Err(config_error(
                    "config-grid-span",
                    format!("{name} entry {span} must be a finite ratio greater than 1"),
                ));
            }
        }
        if self.search.stage_steps < 2 {
            return Err(config_error(
                "config-stage-steps",
                "stage_steps must be at least 2 to fund a warmup half",
            ));
        }
        if self.blocks.target_blocks == 0 || self.blocks.min_block == 0 {
            return Err(config_error(
                "config-block-policy",
                "target_blocks and min_block must be at least 1",
            ));
        }
        if self.blocks.max_block < self.blocks.min_block {
            return Err(config_error(
                "config-block-policy",
                format!(
                    "max_block {} is below min_block {}",
                    self.blocks.max_block, self.blocks.min_block
                ),
            ));
        }
        if self.production.steps == 0 || self.production.report_interval == 0 {
            return Err(config_error(
                "config-production",
                "production steps and report_interval must be at least 1",
            ));
        }
        Ok(())
    }
}

fn config_error(code: &str, message: impl Into<String>) -> OvsError {
    OvsError::Config(ErrorInfo::new(code, message).with_hint("adjust the run configuration file"))
}

/// Block scheduling and step-fraction adaptation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Contiguous sampler steps executed per scheduling block.
    #[serde(default = "default_steps_per_block")]
    pub steps_per_block: u64,
    /// Completed blocks between step-fraction recomputations (0 disables).
    #[serde(default = "default_adjust_interval")]
    pub adjust_interval: u64,
    /// Starting share of effort given to the reference side.
    #[serde(default = "default_initial_fraction")]
    pub initial_fraction: f64,
}

fn default_steps_per_block() -> u64 {
    100
}

fn default_adjust_interval() -> u64 {
    10
}

fn default_initial_fraction() -> f64 {
    0.5
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            steps_per_block: default_steps_per_block(),
            adjust_interval: default_adjust_interval(),
            initial_fraction: default_initial_fraction(),
        }
    }
}

/// Staged bias-search schedule.
///
/// The warmup phase runs half of `stage_steps` on the coarse grid and is
/// discarded before measurement begins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSchedule {
    /// Bias value the coarse grid is centered on.
    #[serde(default = "default_initial_bias")]
    pub initial_bias: f64,
    /// Grid points in the coarse scan (odd).
    #[serde(default = "default_coarse_points")]
    pub coarse_points: usize,
    /// Multiplicative half-range of the coarse grid.
    #[serde(default = "default_coarse_span")]
    pub coarse_span: f64,
    /// Grid points in each refinement round (odd).
    #[serde(default = "default_refine_points")]
    pub refine_points: usize,
    /// Multiplicative half-ranges of the successive refinement rounds.
    #[serde(default = "default_refine_spans")]
    pub refine_spans: Vec<f64>,
    /// Sampler steps funded per search stage.
    #[serde(default = "default_stage_steps")]
    pub stage_steps: u64,
}

fn default_initial_bias() -> f64 {
    1.0
}

fn default_coarse_points() -> usize {
    41
}

fn default_coarse_span() -> f64 {
    40.0
}

fn default_refine_points() -> usize {
    11
}

fn default_refine_spans() -> Vec<f64> {
    vec![10.0, 5.0]
}

fn default_stage_steps() -> u64 {
    10_000
}

impl Default for SearchSchedule {
    fn default() -> Self {
        Self {
            initial_bias: default_initial_bias(),
            coarse_points: default_coarse_points(),
            coarse_span: default_coarse_span(),
            refine_points: default_refine_points(),
            refine_spans: default_refine_spans(),
            stage_steps: default_stage_steps(),
        }
    }
}

/// Statistical block sizing derived from stage budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockPolicy {
    /// Completed blocks a stage budget should roughly yield.
    #[serde(default = "default_target_blocks")]
    pub target_blocks: u64,
    /// Smallest admissible block size.
    #[serde(default = "default_min_block")]
    pub min_block: u64,
    /// Largest admissible block size.
    #[serde(default = "default_max_block")]
    pub max_block: u64,
}

fn default_target_blocks() -> u64 {
    1000
}

fn default_min_block() -> u64 {
    10
}

fn default_max_block() -> u64 {
    1_000_000
}

impl BlockPolicy {
    /// Block size for a stage budget, rounded up to even so the half-block
    /// correlation diagnostic stays defined.
    pub fn block_size_for(&self, stage_steps: u64) -> u64 {
        let raw = stage_steps / self.target_blocks;
        let clamped = raw.clamp(self.min_block, self.max_block);
        clamped + clamped % 2
    }
}

impl Default for BlockPolicy {
    fn default() -> Self {
        Self {
            target_blocks: default_target_blocks(),
            min_block: default_min_block(),
            max_block: default_max_block(),
        }
    }
}

/// Production run length and reporting cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionConfig {
    /// Total sampler steps after the bias is locked.
    #[serde(default = "default_production_steps")]
    pub steps: u64,
    /// Steps between progress reports and metric snapshots.
    #[serde(default = "default_report_interval")]
    pub report_interval: u64,
}

fn default_production_steps() -> u64 {
    100_000
}

fn default_report_interval() -> u64 {
    10_000
}

impl Default for ProductionConfig {
    fn default() -> Self {
        Self {
            steps: default_production_steps(),
            report_interval: default_report_interval(),
        }
    }
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed used for the run.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Optional label used when deriving substream seeds (documented in manifests).
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0x0B1A_5B1A_5000_5EED_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}

/// Output directory layout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root directory for run artefacts. Created if it does not exist.
    #[serde(default)]
    pub run_directory: Option<PathBuf>,
    /// Metrics filename relative to `run_directory`.
    #[serde(default = "default_metrics_filename")]
    pub metrics_file: PathBuf,
    /// Manifest filename relative to `run_directory`.
    #[serde(default = "default_manifest_filename")]
    pub manifest_file: PathBuf,
    /// Summary filename relative to `run_directory`.
    #[serde(default = "default_summary_filename")]
    pub summary_file: PathBuf,
    /// Optional path of the persisted bias value (read at startup, written at
    /// lock). Relative paths resolve from the CLI working directory.
    #[serde(default)]
    pub bias_file: Option<PathBuf>,
}

fn default_metrics_filename() -> PathBuf {
    PathBuf::from("metrics.csv")
}

fn default_manifest_filename() -> PathBuf {
    PathBuf::from("manifest.json")
}

fn default_summary_filename() -> PathBuf {
    PathBuf::from("summary.json")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            run_directory: None,
            metrics_file: default_metrics_filename(),
            manifest_file: default_manifest_filename(),
            summary_file: default_summary_filename(),
            bias_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        OverlapConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_even_grid_points() {
        let mut config = OverlapConfig::default();
        config.search.coarse_points = 40;
        let err = config.validate().unwrap_err();
        assert_eq!(err.info().code, "config-grid-points");
    }

    #[test]
    fn rejects_unit_span() {
        let mut config = OverlapConfig::default();
        config.search.refine_spans = vec![10.0, 1.0];
        let err = config.validate().unwrap_err();
        assert_eq!(err.info().code, "config-grid-span");
    }

    #[test]
    fn rejects_non_positive_temperature() {
        let mut config = OverlapConfig::default();
        config.temperature = 0.0;
        let err = config.validate().unwrap_err();
        assert_eq!(err.info().code, "config-temperature");
    }

    #[test]
    fn block_size_tracks_stage_budget() {
        let policy = BlockPolicy::default();
        assert_eq!(policy.block_size_for(100_000), 100);
        assert_eq!(policy.block_size_for(500), 10);
        assert_eq!(policy.block_size_for(5_000), 10);
        assert_eq!(policy.block_size_for(u64::MAX), 1_000_000);
    }

    #[test]
    fn block_size_rounds_up_to_even() {
        let policy = BlockPolicy {
            target_blocks: 1000,
            min_block: 11,
            max_block: 1_000_000,
        };
        assert_eq!(policy.block_size_for(500), 12);
        assert_eq!(policy.block_size_for(25_000), 26);
    }

    #[test]
    fn minimal_yaml_round_trips_through_defaults() {
        let config: OverlapConfig = serde_yaml::from_str("temperature: 2.0\n").unwrap();
        assert_eq!(config.temperature, 2.0);
        assert_eq!(config.search.coarse_points, 41);
        assert_eq!(config.scheduler.initial_fraction, 0.5);
        config.validate().unwrap();
    }
}
