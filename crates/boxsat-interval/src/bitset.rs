//! Fixed-domain bitset over box dimensions.

use smallvec::SmallVec;
use std::fmt;

const WORD_BITS: usize = 64;

/// A set of dimension indices `0..domain`. Two inline words cover boxes of up
/// to 128 dimensions without allocating.
#[derive(Clone, PartialEq, Eq)]
pub struct DimensionSet {
    words: SmallVec<[u64; 2]>,
    domain: usize,
}

impl DimensionSet {
    /// The empty set over `0..domain`.
    pub fn new(domain: usize) -> DimensionSet {
        DimensionSet {
            words: SmallVec::from_elem(0, domain.div_ceil(WORD_BITS)),
            domain,
        }
    }

    #[inline]
    pub fn domain(&self) -> usize {
        self.domain
    }

    /// Insert `i`; returns whether the set grew.
    #[inline]
    pub fn add(&mut self, i: usize) -> bool {
        debug_assert!(i < self.domain, "index {i} outside domain {}", self.domain);
        let word = &mut self.words[i / WORD_BITS];
        let mask = 1u64 << (i % WORD_BITS);
        let fresh = *word & mask == 0;
        *word |= mask;
        fresh
    }

    #[inline]
    pub fn remove(&mut self, i: usize) {
        debug_assert!(i < self.domain);
        self.words[i / WORD_BITS] &= !(1u64 << (i % WORD_BITS));
    }

    #[inline]
    pub fn contains(&self, i: usize) -> bool {
        i < self.domain && self.words[i / WORD_BITS] & (1u64 << (i % WORD_BITS)) != 0
    }

    /// Insert every dimension of the domain.
    pub fn fill(&mut self) {
        for (w, word) in self.words.iter_mut().enumerate() {
            let base = w * WORD_BITS;
            let used = self.domain.saturating_sub(base).min(WORD_BITS);
            *word = if used == WORD_BITS {
                u64::MAX
            } else {
                (1u64 << used) - 1
            };
        }
    }

    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    /// In-place union; domains must agree.
    pub fn union_with(&mut self, other: &DimensionSet) {
        assert_eq!(self.domain, other.domain, "dimension set domain mismatch");
        for (w, o) in self.words.iter_mut().zip(&other.words) {
            *w |= o;
        }
    }

    /// Whether any member of `other` is also a member of `self`.
    pub fn intersects(&self, other: &DimensionSet) -> bool {
        self.words
            .iter()
            .zip(&other.words)
            .any(|(a, b)| a & b != 0)
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Ascending iterator over members.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(w, word)| {
            let mut bits = *word;
            std::iter::from_fn(move || {
                if bits == 0 {
                    return None;
                }
                let i = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                Some(w * WORD_BITS + i)
            })
        })
    }
}

impl fmt::Debug for DimensionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
