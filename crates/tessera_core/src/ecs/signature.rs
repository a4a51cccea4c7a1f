//! # Signatures
//!
//! A signature is a fixed-width bitset: bit *k* is set when the owner holds
//! at least one component of kind *k*. Entities carry one describing what
//! they own, systems carry one describing what they require.

use std::fmt;

use super::component::KindId;

/// Width of a signature in bits. Caps the number of component kinds.
pub const SIGNATURE_BITS: usize = 256;

/// Number of `u64` words in a signature.
const SIGNATURE_WORDS: usize = SIGNATURE_BITS / 64;

/// Bitset of component kinds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Signature {
    words: [u64; SIGNATURE_WORDS],
}

impl Signature {
    /// The empty signature.
    pub const EMPTY: Self = Self {
        words: [0; SIGNATURE_WORDS],
    };

    /// Builds a signature from a list of kinds.
    #[must_use]
    pub fn from_kinds(kinds: &[KindId]) -> Self {
        let mut signature = Self::EMPTY;
        for &kind in kinds {
            signature.set(kind);
        }
        signature
    }

    #[inline]
    const fn locate(kind: KindId) -> (usize, u64) {
        let bit = kind.index();
        (bit / 64, 1u64 << (bit % 64))
    }

    /// Sets the bit for `kind`.
    ///
    /// # Panics
    ///
    /// Panics if `kind` is [`KindId::INVALID`] or wider than the signature.
    #[inline]
    pub fn set(&mut self, kind: KindId) {
        let (word, mask) = Self::locate(kind);
        self.words[word] |= mask;
    }

    /// Clears the bit for `kind`.
    #[inline]
    pub fn clear(&mut self, kind: KindId) {
        let (word, mask) = Self::locate(kind);
        if let Some(w) = self.words.get_mut(word) {
            *w &= !mask;
        }
    }

    /// Returns `true` if the bit for `kind` is set.
    #[inline]
    #[must_use]
    pub fn has(&self, kind: KindId) -> bool {
        let (word, mask) = Self::locate(kind);
        self.words.get(word).is_some_and(|w| w & mask != 0)
    }

    /// Returns `true` if every bit set in `required` is set here.
    #[inline]
    #[must_use]
    pub fn contains_all(&self, required: &Signature) -> bool {
        self.words
            .iter()
            .zip(required.words.iter())
            .all(|(have, need)| have & need == *need)
    }

    /// Returns `true` if no bit is set.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Number of set bits.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    /// Clears every bit.
    #[inline]
    pub fn reset(&mut self) {
        self.words = [0; SIGNATURE_WORDS];
    }

    /// Lowest 64 bits, handy for small kind sets in tests and logs.
    #[inline]
    #[must_use]
    pub const fn low_bits(&self) -> u64 {
        self.words[0]
    }

    /// Iterates over the kinds whose bit is set, lowest first.
    pub fn kinds(&self) -> impl Iterator<Item = KindId> + '_ {
        self.words.iter().enumerate().flat_map(|(word_index, &word)| {
            let base = word_index * 64;
            let mut bits = word;
            std::iter::from_fn(move || {
                if bits == 0 {
                    return None;
                }
                let tz = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                Some(KindId::new((base + tz) as u16))
            })
        })
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, kind) in self.kinds().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{kind}")?;
        }
        f.write_str("}")
    }
}
