#![deny(missing_docs)]

//! Two-ensemble overlap sampling engine: block scheduling, bias search, and
//! free-energy estimation over a pair of user-supplied samplers.

/// YAML configuration schema and defaults.
pub mod config;
/// Two-side alternating block scheduler.
pub mod coordinator;
/// Deterministic seed derivation helpers.
pub mod determinism;
/// Free-energy readout from paired accumulators.
pub mod estimator;
/// Run manifest serialization and config hashing.
pub mod manifest;
/// Timeline metrics collection and CSV export.
pub mod metrics;
/// Locked-bias persistence for restartable searches.
pub mod persist;
/// Staged optimal-bias search protocol.
pub mod search;
/// Whole-run orchestration over search plus production.
pub mod session;

pub use config::{OverlapConfig, SchedulerConfig, SearchSchedule, SeedPolicy};
pub use coordinator::OverlapCoordinator;
pub use estimator::{FreeEnergyEstimator, FreeEnergyResult};
pub use metrics::{MetricsRecorder, TimelineSample};
pub use search::{BiasSearchEngine, SearchOutcome, SearchStage, StageOutcome};
pub use session::{run_session, SessionReport, SessionSummary};
