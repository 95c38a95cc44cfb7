use super::{BloomConfig, BloomParams};
use crate::bitfield::BitField;
use crate::error::{FilterError, Mismatch, Result};
use crate::hash::{HashFunction, hashers_agree};

/// Static Bloom filter over a single bit field.
///
/// `m` and `k` are derived from the config once and never change. Adding
/// only sets bits, so the fill ratio never goes down.
#[derive(Debug, Clone)]
pub struct BloomFilter {
    config: BloomConfig,
    bits: BitField,
    num_bits: usize,
    num_hashes: usize,
    hashers: Vec<HashFunction>,
}

impl BloomFilter {
    pub fn new(config: BloomConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Skips validation, `config` must already be valid.
    pub(crate) fn build(config: BloomConfig) -> Self {
        let params = BloomParams::from(&config);
        Self {
            bits: BitField::new(params.bit_vector_size),
            num_bits: params.bit_vector_size,
            num_hashes: params.num_hashes,
            hashers: config.hash_strategy.hashers(params.num_hashes),
            config,
        }
    }

    /// Reassembles a filter from decoded parts.
    pub(crate) fn from_parts(
        config: BloomConfig,
        bits: BitField,
        num_hashes: usize,
    ) -> Result<Self> {
        config.validate()?;
        if bits.is_empty() {
            return Err(FilterError::DecodeError(
                "bit field must not be empty".into(),
            ));
        }
        if num_hashes == 0 {
            return Err(FilterError::DecodeError(
                "number of hashes must be > 0".into(),
            ));
        }
        Ok(Self {
            num_bits: bits.len(),
            hashers: config.hash_strategy.hashers(num_hashes),
            bits,
            num_hashes,
            config,
        })
    }

    pub fn add(&self, item: &[u8]) {
        for hasher in &self.hashers {
            for candidate in hasher.hash(item) {
                self.bits.set(self.reduce(candidate));
            }
        }
    }

    pub fn check(&self, item: &[u8]) -> bool {
        for hasher in &self.hashers {
            for candidate in hasher.hash(item) {
                if !self.bits.test(self.reduce(candidate)) {
                    return false;
                }
            }
        }
        true
    }

    /// ORs `other` into this filter and returns the resulting fill ratio.
    ///
    /// Both filters need the same `m`, `k` and equivalent hashers. Nothing
    /// is merged when any of those checks fails.
    pub fn union(&self, other: &BloomFilter) -> Result<f64> {
        self.ensure_same_shape(other)?;
        if !hashers_agree(&self.hashers, &other.hashers) {
            return Err(FilterError::HashIncompatible);
        }
        self.merge(other)?;
        Ok(self.fill_ratio())
    }

    pub(crate) fn ensure_same_shape(&self, other: &BloomFilter) -> Result<()> {
        if self.num_bits != other.num_bits {
            return Err(FilterError::ConfigMismatch(Mismatch::BitSize {
                ours: self.num_bits,
                theirs: other.num_bits,
            }));
        }
        if self.num_hashes != other.num_hashes {
            return Err(FilterError::ConfigMismatch(Mismatch::NumHashes {
                ours: self.num_hashes,
                theirs: other.num_hashes,
            }));
        }
        Ok(())
    }

    pub(crate) fn merge(&self, other: &BloomFilter) -> Result<()> {
        self.bits.union_in_place(&other.bits)
    }

    /// Fraction of set bits, a saturation signal rather than a count.
    pub fn fill_ratio(&self) -> f64 {
        self.bits.count() as f64 / self.num_bits as f64
    }

    pub fn config(&self) -> &BloomConfig {
        &self.config
    }

    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    pub fn num_hashes(&self) -> usize {
        self.num_hashes
    }

    pub fn hashers(&self) -> &[HashFunction] {
        &self.hashers
    }

    pub(crate) fn bits(&self) -> &BitField {
        &self.bits
    }

    #[inline]
    fn reduce(&self, candidate: u64) -> usize {
        (candidate % self.num_bits as u64) as usize
    }
}
