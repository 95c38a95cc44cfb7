use crate::error::{FilterError, Mismatch, Result};
use std::sync::atomic::{AtomicU64, Ordering};

const WORD_BITS: usize = 64;

/// Fixed length bit array stored as atomic u64 words.
///
/// Bits are LSB first inside each word. `set` works through a shared
/// reference so many writers can add to the same field at once; bits are
/// only ever set, never cleared.
#[derive(Debug)]
pub struct BitField {
    words: Box<[AtomicU64]>,
    len: usize,
}

impl BitField {
    pub fn new(len: usize) -> Self {
        let words = (0..len.div_ceil(WORD_BITS))
            .map(|_| AtomicU64::new(0))
            .collect();
        Self { words, len }
    }

    /// Rebuilds a field from its raw words.
    pub fn from_words(len: usize, words: Vec<u64>) -> Result<Self> {
        if words.len() != len.div_ceil(WORD_BITS) {
            return Err(FilterError::DecodeError(format!(
                "bit field of {len} bits needs {} words, got {}",
                len.div_ceil(WORD_BITS),
                words.len()
            )));
        }
        Ok(Self {
            words: words.into_iter().map(AtomicU64::new).collect(),
            len,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `index` must be below `len()`.
    #[inline]
    pub fn set(&self, index: usize) {
        debug_assert!(index < self.len, "bit {index} out of {}", self.len);
        self.words[index / WORD_BITS]
            .fetch_or(1u64 << (index % WORD_BITS), Ordering::Relaxed);
    }

    #[inline]
    pub fn test(&self, index: usize) -> bool {
        debug_assert!(index < self.len, "bit {index} out of {}", self.len);
        self.words[index / WORD_BITS].load(Ordering::Relaxed)
            & (1u64 << (index % WORD_BITS))
            != 0
    }

    pub fn count(&self) -> usize {
        self.words
            .iter()
            .map(|w| w.load(Ordering::Relaxed).count_ones() as usize)
            .sum()
    }

    /// Word-wise OR of `other` into `self`.
    pub fn union_in_place(&self, other: &BitField) -> Result<()> {
        if self.len != other.len {
            return Err(FilterError::ConfigMismatch(Mismatch::BitSize {
                ours: self.len,
                theirs: other.len,
            }));
        }
        for (ours, theirs) in self.words.iter().zip(other.words.iter()) {
            ours.fetch_or(theirs.load(Ordering::Relaxed), Ordering::Relaxed);
        }
        Ok(())
    }

    pub fn to_words(&self) -> Vec<u64> {
        self.words.iter().map(|w| w.load(Ordering::Relaxed)).collect()
    }
}

impl Clone for BitField {
    fn clone(&self) -> Self {
        Self {
            words: self
                .words
                .iter()
                .map(|w| AtomicU64::new(w.load(Ordering::Relaxed)))
                .collect(),
            len: self.len,
        }
    }
}
