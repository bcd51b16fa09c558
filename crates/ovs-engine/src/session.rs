use std::fs;
use std::path::PathBuf;

use ovs_core::errors::ErrorInfo;
use ovs_core::{EnsembleSampler, OvsError, Side, WeightMeter};
use ovs_stat::BiasGrid;
use serde::{Deserialize, Serialize};

use crate::config::OverlapConfig;
use crate::coordinator::OverlapCoordinator;
use crate::estimator::{FreeEnergyEstimator, FreeEnergyResult};
use crate::manifest::{config_hash, manifest_timestamp, RunManifest, MANIFEST_SCHEMA};
use crate::metrics::{MetricsRecorder, TimelineSample};
use crate::search::{BiasSearchEngine, SearchOutcome};

/// Schema tag stamped into every summary file.
pub const SUMMARY_SCHEMA: &str = "ovs-run-summary/1";

/// Serializable core of a completed session, written as the summary file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Summary schema identifier.
    pub schema: String,
    /// Temperature the free energy was derived at.
    pub temperature: f64,
    /// Search outcome including the locked bias.
    pub search: SearchOutcome,
    /// Final free-energy estimate.
    pub estimate: FreeEnergyResult,
    /// Production steps executed by the reference side.
    pub reference_steps: u64,
    /// Production steps executed by the target side.
    pub target_steps: u64,
    /// Step fraction the scheduler ended on.
    pub target_fraction: f64,
    /// Step fraction production actually realized.
    pub actual_fraction: f64,
}

/// Summary returned to callers after a session completes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    /// Serializable session core.
    pub summary: SessionSummary,
    /// Timeline snapshots collected across search and production.
    pub samples: Vec<TimelineSample>,
    /// Metrics CSV written during the run.
    pub metrics_path: Option<PathBuf>,
    /// Manifest path, if emitted.
    pub manifest_path: Option<PathBuf>,
    /// Summary file path, if emitted.
    pub summary_path: Option<PathBuf>,
}

/// Runs the full overlap session from scratch: bias search, production at
/// the locked bias, and artifact writes when an output directory is
/// configured.
///
/// `on_progress` is invoked once per production reporting interval; the
/// library itself never prints.
pub fn run_session<D0, D1, F>(
    config: &OverlapConfig,
    reference: D0,
    target: D1,
    mut on_progress: F,
) -> Result<SessionReport, OvsError>
where
    D0: EnsembleSampler + WeightMeter,
    D1: EnsembleSampler + WeightMeter,
    F: FnMut(&TimelineSample),
{
    config.validate()?;
    let estimator = FreeEnergyEstimator::new(config.temperature)?;
    let master_seed = config.seed_policy.master_seed;

    let mut coordinator = OverlapCoordinator::new(
        &config.scheduler,
        master_seed,
        BiasGrid::locked(config.search.initial_bias)?,
        config.blocks.block_size_for(config.search.stage_steps),
        reference,
        target,
    )?;

    let mut engine = BiasSearchEngine::new(config.search.clone(), config.blocks.clone());
    if let Some(path) = &config.output.bias_file {
        engine = engine.with_bias_file(path.clone());
    }

    let mut recorder = MetricsRecorder::new();
    let search = engine.run(&mut coordinator, &mut recorder)?;

    // Production re-sizes the locked accumulators to its own step budget.
    coordinator.relocate(
        BiasGrid::locked(search.bias)?,
        config.blocks.block_size_for(config.production.steps),
    )?;

    let mut remaining = config.production.steps;
    while remaining > 0 {
        let chunk = config.production.report_interval.min(remaining);
        coordinator.run_steps(chunk)?;
        remaining -= chunk;
        let estimate = estimator.measure(&coordinator).ok();
        let sample = TimelineSample::capture(
            "production",
            &coordinator,
            estimate.map_or(f64::NAN, |e| e.ratio),
            estimate.map_or(f64::NAN, |e| e.error),
        );
        on_progress(&sample);
        recorder.push_sample(sample);
    }

    let estimate = estimator.measure(&coordinator)?;
    let mut report = SessionReport {
        summary: SessionSummary {
            schema: SUMMARY_SCHEMA.to_string(),
            temperature: config.temperature,
            search: search.clone(),
            estimate,
            reference_steps: coordinator.side_steps(Side::Reference),
            target_steps: coordinator.side_steps(Side::Target),
            target_fraction: coordinator.step_fraction(),
            actual_fraction: coordinator.actual_step_fraction(),
        },
        samples: recorder.samples().to_vec(),
        metrics_path: None,
        manifest_path: None,
        summary_path: None,
    };

    if let Some(run_dir) = &config.output.run_directory {
        fs::create_dir_all(run_dir).map_err(|err| {
            OvsError::Serde(
                ErrorInfo::new("run-dir-create", err.to_string())
                    .with_context("path", run_dir.display().to_string()),
            )
        })?;

        let metrics_path = run_dir.join(&config.output.metrics_file);
        recorder.write_csv(&metrics_path).map_err(|err| {
            OvsError::Serde(
                ErrorInfo::new("metrics-write", err.to_string())
                    .with_context("path", metrics_path.display().to_string()),
            )
        })?;

        let summary_path = run_dir.join(&config.output.summary_file);
        let summary_json = serde_json::to_string_pretty(&report.summary).map_err(|err| {
            OvsError::Serde(
                ErrorInfo::new("summary-serialize", err.to_string())
                    .with_context("path", summary_path.display().to_string()),
            )
        })?;
        fs::write(&summary_path, summary_json).map_err(|err| {
            OvsError::Serde(
                ErrorInfo::new("summary-write", err.to_string())
                    .with_context("path", summary_path.display().to_string()),
            )
        })?;

        let manifest_path = run_dir.join(&config.output.manifest_file);
        let manifest = RunManifest {
            schema: MANIFEST_SCHEMA.to_string(),
            created_at: manifest_timestamp(),
            config: config.clone(),
            config_hash: config_hash(config)?,
            master_seed,
            seed_label: config.seed_policy.label.clone(),
            search,
            reference_steps: report.summary.reference_steps,
            target_steps: report.summary.target_steps,
            metrics_file: Some(config.output.metrics_file.clone()),
            summary_file: Some(config.output.summary_file.clone()),
        };
        manifest.write(&manifest_path)?;

        report.metrics_path = Some(metrics_path);
        report.summary_path = Some(summary_path);
        report.manifest_path = Some(manifest_path);
    }

    Ok(report)
}
