#![deny(missing_docs)]

//! Block-averaged ratio statistics and bias grids for overlap sampling.

/// Per-grid-point ratio statistics with covariance tracking.
pub mod accumulator;
/// Streaming block-average primitives.
pub mod block;
/// Log-spaced candidate bias grids.
pub mod grid;

pub use accumulator::{RatioAccumulator, SlotStats};
pub use block::BlockStream;
pub use grid::BiasGrid;
