//! Word-addressed bit storage
//!
//! Both the live filter and the backing store are flat bit vectors viewed
//! as a sequence of fixed-width words. All access goes through word
//! addresses so a word can be read or replaced as a unit.

use bitvec::prelude::*;

/// Owned bit pattern of one word
pub type WordPattern = BitVec<u64, Lsb0>;

/// Borrowed bit pattern of one word
pub type WordSlice = BitSlice<u64, Lsb0>;

/// A flat bit vector of `word_count` words of `word_bits` bits each
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WordArray {
    bits: BitVec<u64, Lsb0>,
    word_count: usize,
    word_bits: usize,
}

impl WordArray {
    /// All-zero array
    pub fn new(word_count: usize, word_bits: usize) -> Self {
        Self {
            bits: bitvec![u64, Lsb0; 0; word_count * word_bits],
            word_count,
            word_bits,
        }
    }

    pub fn word_count(&self) -> usize {
        self.word_count
    }

    pub fn word_bits(&self) -> usize {
        self.word_bits
    }

    fn range(&self, word: usize) -> std::ops::Range<usize> {
        assert!(
            word < self.word_count,
            "word {} out of range (words = {})",
            word,
            self.word_count
        );
        let start = word * self.word_bits;
        start..start + self.word_bits
    }

    /// Read one word
    pub fn word(&self, word: usize) -> &WordSlice {
        let range = self.range(word);
        &self.bits[range]
    }

    pub fn bit(&self, word: usize, offset: usize) -> bool {
        self.word(word)[offset]
    }

    pub fn set_bit(&mut self, word: usize, offset: usize) {
        let range = self.range(word);
        self.bits[range].set(offset, true);
    }

    /// OR the given offsets into a word
    pub fn or_bits<I>(&mut self, word: usize, offsets: I)
    where
        I: IntoIterator<Item = usize>,
    {
        let range = self.range(word);
        let slot = &mut self.bits[range];
        for offset in offsets {
            slot.set(offset, true);
        }
    }

    /// Overwrite a word with `pattern`, returning the previous contents.
    ///
    /// # Panics
    /// Panics if `pattern` is not exactly one word wide.
    pub fn replace_word(&mut self, word: usize, pattern: &WordSlice) -> WordPattern {
        assert_eq!(
            pattern.len(),
            self.word_bits,
            "pattern width must equal the word width"
        );
        let range = self.range(word);
        let slot = &mut self.bits[range];
        let previous = slot.to_bitvec();
        slot.copy_from_bitslice(pattern);
        previous
    }

    /// Whether every offset is set in a word
    pub fn all_set<I>(&self, word: usize, offsets: I) -> bool
    where
        I: IntoIterator<Item = usize>,
    {
        let slot = self.word(word);
        offsets.into_iter().all(|offset| slot[offset])
    }

    /// Number of set bits across all words
    pub fn count_ones(&self) -> usize {
        self.bits.count_ones()
    }

    pub fn word_ones(&self, word: usize) -> usize {
        self.word(word).count_ones()
    }
}
