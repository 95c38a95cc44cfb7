use crate::error::{FilterError, Result};
use crate::hash::{HashStrategy, optimal_bit_vector_size, optimal_num_hashes};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Builder, Serialize, Deserialize)]
#[builder(pattern = "owned")]
pub struct BloomConfig {
    /// Expected number of elements (N)
    #[builder(default = "1_000_000")]
    pub capacity: usize,

    /// Target false positive rate, strictly between 0 and 1 (P)
    #[builder(default = "0.01")]
    pub false_positive_rate: f64,

    /// Hash strategy used to derive candidate indices
    #[builder(default = "HashStrategy::Optimal")]
    pub hash_strategy: HashStrategy,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            capacity: 1_000_000,
            false_positive_rate: 0.01,
            hash_strategy: HashStrategy::Optimal,
        }
    }
}

impl BloomConfig {
    /// Near-empty config for the first `previous` generation of a rotating
    /// filter.
    pub fn placeholder(hash_strategy: HashStrategy) -> Self {
        Self {
            capacity: 2,
            false_positive_rate: 0.5,
            hash_strategy,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(FilterError::InvalidConfig(
                "Capacity must be > 0".into(),
            ));
        }
        if !(self.false_positive_rate > 0.0 && self.false_positive_rate < 1.0)
        {
            return Err(FilterError::InvalidConfig(format!(
                "FPR must be between 0 and 1, got {}",
                self.false_positive_rate
            )));
        }
        Ok(())
    }
}

/// Derived parameters calculated from BloomConfig
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BloomParams {
    pub bit_vector_size: usize,
    pub num_hashes: usize,
}

impl From<&BloomConfig> for BloomParams {
    fn from(config: &BloomConfig) -> Self {
        let bit_vector_size =
            optimal_bit_vector_size(config.capacity, config.false_positive_rate);
        let num_hashes = optimal_num_hashes(config.capacity, bit_vector_size);

        Self {
            bit_vector_size,
            num_hashes,
        }
    }
}
