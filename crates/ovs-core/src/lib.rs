#![deny(missing_docs)]

//! Core traits and data types for the OVS overlap-sampling engine.

use serde::{Deserialize, Serialize};

/// Structured error payloads and the crate-wide error enum.
pub mod errors;
/// Deterministic RNG handles and substream derivation.
pub mod rng;
mod sample;

pub use errors::{ErrorInfo, OvsError};
pub use rng::{derive_substream_seed, RngHandle};
pub use sample::WeightSample;

/// Identifies one ensemble of an overlap session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Side {
    /// The reference ensemble, conventionally side 0.
    Reference,
    /// The target ensemble, conventionally side 1.
    Target,
}

impl Side {
    /// Returns the conventional integer index of the side.
    pub fn index(&self) -> usize {
        match self {
            Side::Reference => 0,
            Side::Target => 1,
        }
    }

    /// Returns the opposite side.
    pub fn other(&self) -> Side {
        match self {
            Side::Reference => Side::Target,
            Side::Target => Side::Reference,
        }
    }

    /// Stable label used in reports and artifacts.
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Reference => "reference",
            Side::Target => "target",
        }
    }
}

/// External process that advances one ensemble's configuration.
///
/// The RNG handle is passed in explicitly so that each side of a session can
/// run on its own deterministic substream; samplers must not keep generators
/// of their own.
pub trait EnsembleSampler: Send {
    /// Performs one step of the underlying sampling process.
    fn advance(&mut self, rng: &mut RngHandle) -> Result<(), OvsError>;
}

/// External observer turning the current sampler state into weight samples.
///
/// Invoked once per grid slot per step. A single concrete type usually
/// implements both this trait and [`EnsembleSampler`], since the observation
/// depends on the sampler's current configuration.
pub trait WeightMeter: Send {
    /// Returns the un-normalized weight-ratio sample at the given bias value.
    fn observe(&self, bias: f64) -> f64;
}
