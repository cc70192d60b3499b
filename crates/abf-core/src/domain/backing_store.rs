//! Backing store ("slow memory") of per-group word patterns
//!
//! Shape `G x W x B`. For every (group, word) it holds the OR of the bit
//! positions that group would have set for every key shadow-inserted into
//! that word, so the filter can switch a word to another group without
//! replaying history.

use super::config::FilterGeometry;
use super::word_array::{WordArray, WordPattern, WordSlice};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackingStore {
    /// Group-major: (group, word) lives at word `group * words + word`
    patterns: WordArray,
    groups: usize,
    words: usize,
}

impl BackingStore {
    pub fn new(groups: usize, words: usize, bits_per_word: usize) -> Self {
        Self {
            patterns: WordArray::new(groups * words, bits_per_word),
            groups,
            words,
        }
    }

    pub fn for_geometry(geometry: &FilterGeometry) -> Self {
        Self::new(geometry.groups, geometry.words, geometry.bits_per_word)
    }

    pub fn groups(&self) -> usize {
        self.groups
    }

    pub fn words(&self) -> usize {
        self.words
    }

    pub fn bits_per_word(&self) -> usize {
        self.patterns.word_bits()
    }

    fn slot(&self, group: usize, word: usize) -> usize {
        assert!(
            group < self.groups,
            "group {} out of range (groups = {})",
            group,
            self.groups
        );
        assert!(
            word < self.words,
            "word {} out of range (words = {})",
            word,
            self.words
        );
        group * self.words + word
    }

    /// Accumulated pattern for `group` in `word`
    pub fn word_pattern(&self, group: usize, word: usize) -> &WordSlice {
        self.patterns.word(self.slot(group, word))
    }

    /// OR bit offsets into the stored pattern
    pub fn set_bits<I>(&mut self, group: usize, word: usize, offsets: I)
    where
        I: IntoIterator<Item = usize>,
    {
        let slot = self.slot(group, word);
        self.patterns.or_bits(slot, offsets);
    }

    /// Overwrite the stored pattern, returning the previous one
    pub fn replace_word_pattern(
        &mut self,
        group: usize,
        word: usize,
        pattern: &WordSlice,
    ) -> WordPattern {
        let slot = self.slot(group, word);
        self.patterns.replace_word(slot, pattern)
    }

    pub fn count_ones(&self) -> usize {
        self.patterns.count_ones()
    }
}
