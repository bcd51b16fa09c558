use serde::{Deserialize, Serialize};

use ovs_core::errors::{ErrorInfo, OvsError};
use ovs_core::WeightSample;

use crate::block::BlockStream;

/// Named statistics snapshot for one accumulator slot.
///
/// Replaces positional stat indices with a typed result; available once the
/// slot has at least 2 completed blocks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlotStats {
    /// Mean of completed block averages of the numerator channel.
    pub average: f64,
    /// Standard error of the mean from the inter-block variance.
    pub error: f64,
    /// Half-block versus full-block variance diagnostic; `None` when the
    /// block size cannot be halved.
    pub block_correlation: Option<f64>,
    /// Ratio of the numerator and denominator channel means.
    pub ratio_average: f64,
    /// Error of the ratio including the cross-channel covariance term.
    pub ratio_error: f64,
    /// Covariance of the numerator and denominator means.
    pub covariance: f64,
    /// Number of completed blocks backing the snapshot.
    pub completed_blocks: u64,
}

/// Running covariance of paired block averages (Welford-style co-moment).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct CoMoment {
    pairs: u64,
    mean_x: f64,
    mean_y: f64,
    c: f64,
}

impl CoMoment {
    fn push(&mut self, x: f64, y: f64) {
        self.pairs += 1;
        let n = self.pairs as f64;
        let delta_x = x - self.mean_x;
        self.mean_x += delta_x / n;
        self.mean_y += (y - self.mean_y) / n;
        self.c += delta_x * (y - self.mean_y);
    }

    fn covariance(&self) -> Option<f64> {
        if self.pairs < 2 {
            return None;
        }
        Some(self.c / (self.pairs - 1) as f64)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Slot {
    num: BlockStream,
    den: BlockStream,
    num_half: Option<BlockStream>,
    cov: CoMoment,
}

impl Slot {
    fn new(block_size: u64, half_size: Option<u64>) -> Self {
        Self {
            num: BlockStream::new(block_size),
            den: BlockStream::new(block_size),
            num_half: half_size.map(BlockStream::new),
            cov: CoMoment::default(),
        }
    }

    fn push(&mut self, numerator: f64, denominator: f64) {
        if let Some(half) = &mut self.num_half {
            half.push(numerator);
        }
        let closed_num = self.num.push(numerator);
        let closed_den = self.den.push(denominator);
        if let (Some(block_num), Some(block_den)) = (closed_num, closed_den) {
            self.cov.push(block_num, block_den);
        }
    }

    fn ratio_average(&self) -> f64 {
        self.num.mean() / self.den.mean()
    }

    fn ratio_error(&self) -> Option<f64> {
        let err_n = self.num.error()?;
        let err_d = self.den.error()?;
        let cov = self.cov.covariance()? / self.num.blocks() as f64;
        let avg_n = self.num.mean();
        let avg_d = self.den.mean();
        let variance = (err_n / avg_d).powi(2) + (avg_n * err_d / (avg_d * avg_d)).powi(2)
            - 2.0 * avg_n * cov / (avg_d * avg_d * avg_d);
        if !variance.is_finite() {
            return Some(f64::NAN);
        }
        Some(variance.max(0.0).sqrt())
    }

    fn reset(&mut self) {
        self.num.reset();
        self.den.reset();
        if let Some(half) = &mut self.num_half {
            half.reset();
        }
        self.cov.reset();
    }
}

/// Per-grid-point streaming ratio statistics for one session side.
///
/// Each slot tracks a numerator and a denominator channel over equal-sized
/// blocks plus their running covariance. `add_sample` is the single-channel
/// form: the denominator receives a constant 1, which makes the ratio
/// statistics degenerate exactly to the plain block statistics. A slot should
/// be fed through one of the two entry points consistently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioAccumulator {
    block_size: u64,
    slots: Vec<Slot>,
}

impl RatioAccumulator {
    /// Creates an accumulator with `slots` parallel slots of fixed block size.
    ///
    /// The block correlation diagnostic needs a halvable block size; with an
    /// odd or unit block size every other statistic remains available.
    pub fn new(slots: usize, block_size: u64) -> Result<Self, OvsError> {
        if slots == 0 {
            return Err(OvsError::Stat(ErrorInfo::new(
                "empty-accumulator",
                "an accumulator needs at least one slot",
            )));
        }
        if block_size == 0 {
            return Err(OvsError::Stat(
                ErrorInfo::new("zero-block-size", "block size must be at least 1")
                    .with_hint("derive the block size from the stage step budget"),
            ));
        }
        let half_size = if block_size % 2 == 0 {
            Some(block_size / 2)
        } else {
            None
        };
        Ok(Self {
            block_size,
            slots: (0..slots)
                .map(|_| Slot::new(block_size, half_size))
                .collect(),
        })
    }

    /// Number of parallel slots.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Raw samples folded into one statistical block.
    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Appends a single-channel observation to the slot's current block.
    pub fn add_sample(&mut self, index: usize, sample: WeightSample) -> Result<(), OvsError> {
        let slot = self.slot_mut(index)?;
        slot.push(sample.value(), 1.0);
        Ok(())
    }

    /// Appends a correlated numerator/denominator pair to the slot.
    pub fn add_weighted(
        &mut self,
        index: usize,
        numerator: WeightSample,
        denominator: WeightSample,
    ) -> Result<(), OvsError> {
        let slot = self.slot_mut(index)?;
        slot.push(numerator.value(), denominator.value());
        Ok(())
    }

    /// Completed blocks in the slot.
    pub fn blocks(&self, index: usize) -> Result<u64, OvsError> {
        Ok(self.slot(index)?.num.blocks())
    }

    /// Mean of completed block averages; NaN until the first block closes.
    pub fn average(&self, index: usize) -> Result<f64, OvsError> {
        Ok(self.slot(index)?.num.mean())
    }

    /// Standard error of the mean from the inter-block variance.
    pub fn error(&self, index: usize) -> Result<f64, OvsError> {
        let slot = self.slot(index)?;
        match slot.num.error() {
            Some(error) => Ok(error),
            None => Err(insufficient_blocks(index, slot.num.blocks())),
        }
    }

    /// Ratio of the numerator and denominator channel means.
    pub fn ratio_average(&self, index: usize) -> Result<f64, OvsError> {
        Ok(self.slot(index)?.ratio_average())
    }

    /// Error of the channel-mean ratio via linearized propagation.
    pub fn ratio_error(&self, index: usize) -> Result<f64, OvsError> {
        let slot = self.slot(index)?;
        match slot.ratio_error() {
            Some(error) => Ok(error),
            None => Err(insufficient_blocks(index, slot.num.blocks())),
        }
    }

    /// Half-block versus full-block variance diagnostic, clamped to [-1, 1].
    ///
    /// Values near 1 mean the block size is too small to decorrelate
    /// consecutive samples; near 0 means the blocks average independently.
    pub fn block_correlation(&self, index: usize) -> Result<f64, OvsError> {
        let slot = self.slot(index)?;
        let half = match &slot.num_half {
            Some(half) => half,
            None => {
                return Err(OvsError::Stat(
                    ErrorInfo::new(
                        "block-correlation-undefined",
                        "block correlation requires an even block size of at least 2",
                    )
                    .with_context("block_size", self.block_size.to_string()),
                ));
            }
        };
        match (slot.num.variance(), half.variance()) {
            (Some(full_var), Some(half_var)) => {
                if half_var == 0.0 {
                    return Ok(0.0);
                }
                Ok((2.0 * full_var / half_var - 1.0).clamp(-1.0, 1.0))
            }
            _ => Err(insufficient_blocks(index, slot.num.blocks())),
        }
    }

    /// Named snapshot of every slot statistic; requires 2 completed blocks.
    pub fn stats(&self, index: usize) -> Result<SlotStats, OvsError> {
        let slot = self.slot(index)?;
        let blocks = slot.num.blocks();
        if blocks < 2 {
            return Err(insufficient_blocks(index, blocks));
        }
        Ok(SlotStats {
            average: slot.num.mean(),
            error: slot.num.error().unwrap_or(f64::NAN),
            block_correlation: self.block_correlation(index).ok(),
            ratio_average: slot.ratio_average(),
            ratio_error: slot.ratio_error().unwrap_or(f64::NAN),
            covariance: slot
                .cov
                .covariance()
                .map(|cov| cov / blocks as f64)
                .unwrap_or(f64::NAN),
            completed_blocks: blocks,
        })
    }

    /// Discards all accumulated state in every slot.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.reset();
        }
    }

    fn slot(&self, index: usize) -> Result<&Slot, OvsError> {
        let slots = self.slots.len();
        self.slots
            .get(index)
            .ok_or_else(|| slot_out_of_range(index, slots))
    }

    fn slot_mut(&mut self, index: usize) -> Result<&mut Slot, OvsError> {
        let slots = self.slots.len();
        self.slots
            .get_mut(index)
            .ok_or_else(|| slot_out_of_range(index, slots))
    }
}

fn slot_out_of_range(index: usize, slots: usize) -> OvsError {
    OvsError::Stat(
        ErrorInfo::new(
            "slot-out-of-range",
            format!("slot {index} exceeds the accumulator width"),
        )
        .with_context("slots", slots.to_string()),
    )
}

fn insufficient_blocks(index: usize, blocks: u64) -> OvsError {
    OvsError::Stat(
        ErrorInfo::new(
            "insufficient-blocks",
            "statistics require at least 2 completed blocks",
        )
        .with_context("slot", index.to_string())
        .with_context("completed_blocks", blocks.to_string()),
    )
}
