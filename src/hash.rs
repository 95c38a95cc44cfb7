use crate::error::{FilterError, Result};
use crc::{CRC_64_XZ, Crc};
use fnv::FnvHasher;
use md5::Md5;
use murmur3::murmur3_x64_128;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fmt;
use std::hash::Hasher;
use std::io::Cursor;
use std::str::FromStr;

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_XZ);

/// Size of the random buffer used to compare two hasher sets.
pub(crate) const PROBE_LEN: usize = 1000;

/// A single hash function of a strategy.
///
/// Every function maps an input to an ordered list of candidate indices.
/// The candidates are not reduced modulo the bit vector size; that is the
/// filter's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashFunction {
    Md5,
    Crc64,
    Sha1,
    Fnv64,
    Murmur3x128,
    /// `h1 + i * h2` for `i` in `0..num_hashes`, with `(h1, h2)` taken from
    /// one 128 bit murmur3 digest.
    DoubleHashing { num_hashes: usize },
}

/// Catalog backing the `default` strategy, in order.
const DEFAULT_HASHERS: [HashFunction; 5] = [
    HashFunction::Md5,
    HashFunction::Crc64,
    HashFunction::Sha1,
    HashFunction::Fnv64,
    HashFunction::Murmur3x128,
];

impl HashFunction {
    pub fn hash(&self, item: &[u8]) -> Vec<u64> {
        match self {
            HashFunction::Md5 => digest_words::<Md5>(item),
            HashFunction::Sha1 => digest_words::<Sha1>(item),
            HashFunction::Crc64 => {
                le_words(&CRC64.checksum(item).to_le_bytes())
            }
            HashFunction::Fnv64 => le_words(&hash_fnv64(item).to_le_bytes()),
            HashFunction::Murmur3x128 => {
                le_words(&hash_murmur128(item).to_le_bytes())
            }
            HashFunction::DoubleHashing { num_hashes } => {
                let digest = hash_murmur128(item);
                let h1 = digest as u64;
                let h2 = (digest >> 64) as u64;
                (0..*num_hashes as u64)
                    .map(|i| h1.wrapping_add(i.wrapping_mul(h2)))
                    .collect()
            }
        }
    }
}

/// Named factories producing the hash functions for a given `k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashStrategy {
    /// First `k` entries of a fixed catalog of five digests.
    ///
    /// `k` above five is capped at five, so filters sized for more hashes
    /// get a weaker false positive bound than their config suggests.
    Default,
    /// Double hashing over a single 128 bit digest, uncapped.
    Optimal,
}

impl HashStrategy {
    pub const DEFAULT_NAME: &'static str = "default";
    pub const OPTIMAL_NAME: &'static str = "optimal";

    pub fn name(&self) -> &'static str {
        match self {
            HashStrategy::Default => Self::DEFAULT_NAME,
            HashStrategy::Optimal => Self::OPTIMAL_NAME,
        }
    }

    pub fn hashers(&self, num_hashes: usize) -> Vec<HashFunction> {
        match self {
            HashStrategy::Default => {
                let k = num_hashes.min(DEFAULT_HASHERS.len());
                DEFAULT_HASHERS[..k].to_vec()
            }
            HashStrategy::Optimal => {
                vec![HashFunction::DoubleHashing { num_hashes }]
            }
        }
    }
}

impl fmt::Display for HashStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashStrategy {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            Self::DEFAULT_NAME => Ok(HashStrategy::Default),
            Self::OPTIMAL_NAME => Ok(HashStrategy::Optimal),
            other => Err(FilterError::InvalidConfig(format!(
                "unknown hash strategy '{other}'"
            ))),
        }
    }
}

/// Runs every hasher over `item`, keeping the per-hasher grouping.
pub fn candidate_indices(hashers: &[HashFunction], item: &[u8]) -> Vec<Vec<u64>> {
    hashers.iter().map(|h| h.hash(item)).collect()
}

/// Compares two hasher sets by their output on one random buffer.
///
/// Identity of the functions is not compared; two sets agree when they
/// produce the same candidate sequences for the probe.
pub fn hashers_agree(ours: &[HashFunction], theirs: &[HashFunction]) -> bool {
    let mut subject = vec![0u8; PROBE_LEN];
    rand::rng().fill_bytes(&mut subject);
    candidate_indices(ours, &subject) == candidate_indices(theirs, &subject)
}

fn digest_words<D: Digest>(item: &[u8]) -> Vec<u64> {
    let mut hasher = D::new();
    hasher.update(item);
    le_words(&hasher.finalize())
}

/// Splits `bytes` into little endian u64 words, dropping any tail shorter
/// than eight bytes.
fn le_words(bytes: &[u8]) -> Vec<u64> {
    bytes
        .chunks_exact(8)
        .map(|chunk| {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            u64::from_le_bytes(word)
        })
        .collect()
}

pub(crate) fn hash_fnv64(key: &[u8]) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(key);
    hasher.finish()
}

pub(crate) fn hash_murmur128(key: &[u8]) -> u128 {
    let mut cursor = Cursor::new(key);
    murmur3_x64_128(&mut cursor, 0).expect("Failed to compute Murmur3 hash")
}

/// m = ceil(-n * ln(p) / ln(2)^2)
pub fn optimal_bit_vector_size(n: usize, fpr: f64) -> usize {
    let ln2 = std::f64::consts::LN_2;
    ((-(n as f64) * fpr.ln()) / (ln2 * ln2)).ceil() as usize
}

/// k = ceil(ln(2) * m / n)
pub fn optimal_num_hashes(n: usize, m: usize) -> usize {
    (std::f64::consts::LN_2 * m as f64 / n as f64).ceil() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_word_counts() {
        let item = b"some item";
        assert_eq!(HashFunction::Md5.hash(item).len(), 2);
        // 20 byte digest, the trailing 4 bytes are dropped
        assert_eq!(HashFunction::Sha1.hash(item).len(), 2);
        assert_eq!(HashFunction::Crc64.hash(item).len(), 1);
        assert_eq!(HashFunction::Fnv64.hash(item).len(), 1);
        assert_eq!(HashFunction::Murmur3x128.hash(item).len(), 2);
    }

    #[test]
    fn test_double_hashing_is_linear() {
        let digest = hash_murmur128(b"linear");
        let h1 = digest as u64;
        let h2 = (digest >> 64) as u64;
        let out = HashFunction::DoubleHashing { num_hashes: 4 }.hash(b"linear");
        assert_eq!(out.len(), 4);
        assert_eq!(out[0], h1);
        assert_eq!(out[3], h1.wrapping_add(3u64.wrapping_mul(h2)));
    }

    #[test]
    fn test_le_words_ignores_short_tail() {
        let bytes = [1u8, 0, 0, 0, 0, 0, 0, 0, 9, 9, 9];
        assert_eq!(le_words(&bytes), vec![1]);
    }

    #[test]
    fn test_fnv64_matches_crate() {
        let mut hasher = FnvHasher::default();
        hasher.write(b"abc");
        assert_eq!(hash_fnv64(b"abc"), hasher.finish());
    }

    #[test]
    fn test_agreement_is_by_output() {
        let a = HashStrategy::Optimal.hashers(7);
        let b = HashStrategy::Optimal.hashers(7);
        assert!(hashers_agree(&a, &b));

        let c = HashStrategy::Optimal.hashers(6);
        assert!(!hashers_agree(&a, &c));
    }
}
