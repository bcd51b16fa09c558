use serde::{Deserialize, Serialize};

/// Streaming block-average statistics for one sample channel.
///
/// Raw samples are summed into fixed-size blocks; each completed block average
/// folds into a Welford-style running mean and variance. Memory use is O(1)
/// regardless of run length, and a trailing partial block never contributes to
/// the reported statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockStream {
    block_size: u64,
    partial_sum: f64,
    partial_count: u64,
    blocks: u64,
    mean: f64,
    m2: f64,
}

impl BlockStream {
    /// Creates an empty stream with the given block size (at least 1).
    pub fn new(block_size: u64) -> Self {
        Self {
            block_size: block_size.max(1),
            partial_sum: 0.0,
            partial_count: 0,
            blocks: 0,
            mean: 0.0,
            m2: 0.0,
        }
    }

    /// Number of raw samples folded into one block.
    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Number of completed blocks.
    pub fn blocks(&self) -> u64 {
        self.blocks
    }

    /// Total raw samples consumed, including the trailing partial block.
    pub fn count(&self) -> u64 {
        self.blocks * self.block_size + self.partial_count
    }

    /// Appends one raw sample; returns the block average when a block closes.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        self.partial_sum += value;
        self.partial_count += 1;
        if self.partial_count < self.block_size {
            return None;
        }
        let block_average = self.partial_sum / self.block_size as f64;
        self.partial_sum = 0.0;
        self.partial_count = 0;
        self.blocks += 1;
        let delta = block_average - self.mean;
        self.mean += delta / self.blocks as f64;
        self.m2 += delta * (block_average - self.mean);
        Some(block_average)
    }

    /// Mean of completed block averages; NaN until the first block closes.
    pub fn mean(&self) -> f64 {
        if self.blocks == 0 {
            f64::NAN
        } else {
            self.mean
        }
    }

    /// Sample variance of completed block averages; `None` below 2 blocks.
    pub fn variance(&self) -> Option<f64> {
        if self.blocks < 2 {
            return None;
        }
        Some(self.m2 / (self.blocks - 1) as f64)
    }

    /// Standard error of the mean from the inter-block variance.
    pub fn error(&self) -> Option<f64> {
        self.variance()
            .map(|variance| (variance / self.blocks as f64).sqrt())
    }

    /// Discards all accumulated state, keeping the block size.
    pub fn reset(&mut self) {
        *self = Self::new(self.block_size);
    }
}
