//! Thread-safe adaptive filter
//!
//! Each word's selector and live bits sit behind one lock, so a reader
//! never observes bits of one group paired with the selector of another.
//! Distinct words never coordinate. The backing store is a lane array of
//! `AtomicU64`; shadow inserts are `fetch_or`s and need no lock.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::debug;

use super::adaptive_filter::SwapOutcome;
use super::config::{AdaptiveFilterConfig, FilterGeometry};
use super::hash_functions::{BitIndexDigest, BitIndexHasher};
use super::word_array::WordPattern;
use crate::error::FilterError;

const LANE_BITS: usize = 64;

/// Backing store safe for concurrent OR-writers
pub struct AtomicBackingStore {
    lanes: Vec<AtomicU64>,
    groups: usize,
    words: usize,
    bits_per_word: usize,
    lanes_per_word: usize,
}

impl AtomicBackingStore {
    pub fn new(groups: usize, words: usize, bits_per_word: usize) -> Self {
        let lanes_per_word = bits_per_word.div_ceil(LANE_BITS);
        Self {
            lanes: (0..groups * words * lanes_per_word)
                .map(|_| AtomicU64::new(0))
                .collect(),
            groups,
            words,
            bits_per_word,
            lanes_per_word,
        }
    }

    pub fn groups(&self) -> usize {
        self.groups
    }

    fn first_lane(&self, group: usize, word: usize) -> usize {
        assert!(group < self.groups, "group {} out of range", group);
        assert!(word < self.words, "word {} out of range", word);
        (group * self.words + word) * self.lanes_per_word
    }

    /// OR bit offsets into the stored pattern
    pub fn set_bits<I>(&self, group: usize, word: usize, offsets: I)
    where
        I: IntoIterator<Item = usize>,
    {
        let base = self.first_lane(group, word);
        for offset in offsets {
            assert!(offset < self.bits_per_word, "bit {} out of range", offset);
            self.lanes[base + offset / LANE_BITS]
                .fetch_or(1u64 << (offset % LANE_BITS), Ordering::AcqRel);
        }
    }

    /// Snapshot of the stored pattern.
    ///
    /// Concurrent `set_bits` calls may or may not be visible.
    pub fn word_pattern(&self, group: usize, word: usize) -> WordPattern {
        let base = self.first_lane(group, word);
        let lanes: Vec<u64> = self.lanes[base..base + self.lanes_per_word]
            .iter()
            .map(|lane| lane.load(Ordering::Acquire))
            .collect();
        let mut pattern = WordPattern::from_vec(lanes);
        pattern.truncate(self.bits_per_word);
        pattern
    }
}

struct WordSlot {
    group: usize,
    bits: WordPattern,
}

impl WordSlot {
    fn all_set<I: IntoIterator<Item = usize>>(&self, offsets: I) -> bool {
        offsets.into_iter().all(|offset| self.bits[offset])
    }
}

/// Adaptive Bloom filter with per-word locking; all operations take `&self`
pub struct SharedAdaptiveFilter {
    config: AdaptiveFilterConfig,
    hasher: Box<dyn BitIndexHasher>,
    slots: Vec<RwLock<WordSlot>>,
    backing: Option<AtomicBackingStore>,
}

impl SharedAdaptiveFilter {
    pub fn new(config: AdaptiveFilterConfig) -> Result<Self, FilterError> {
        config.validate()?;
        let geometry = config.geometry();
        let hasher = config.digest_family.build_hasher(geometry)?;

        let slots = (0..geometry.words)
            .map(|_| {
                RwLock::new(WordSlot {
                    group: config.initial_group,
                    bits: WordPattern::repeat(false, geometry.bits_per_word),
                })
            })
            .collect();
        let backing = config.is_adaptive().then(|| {
            AtomicBackingStore::new(geometry.groups, geometry.words, geometry.bits_per_word)
        });

        Ok(Self {
            config,
            hasher,
            slots,
            backing,
        })
    }

    fn locate(&self, key: &[u8]) -> (usize, BitIndexDigest) {
        let digest = self.hasher.digest(key);
        (self.hasher.layout().word_index(&digest), digest)
    }

    pub fn insert(&self, key: &[u8]) {
        let (word, digest) = self.locate(key);
        let layout = self.hasher.layout();
        let mut slot = self.slots[word].write();
        let group = slot.group;
        for bit in layout.group_positions(&digest, group) {
            slot.bits.set(bit, true);
        }
    }

    /// Lock-free; no-op when the filter is not adaptive
    pub fn insert_shadow(&self, key: &[u8]) {
        let Some(backing) = self.backing.as_ref() else {
            return;
        };
        let (word, digest) = self.locate(key);
        let layout = self.hasher.layout();
        for group in 0..backing.groups() {
            let positions: BTreeSet<usize> = layout.group_positions(&digest, group).collect();
            backing.set_bits(group, word, positions);
        }
    }

    /// Shadow first, so a swap racing with this call installs a pattern
    /// that already holds the key.
    pub fn record(&self, key: &[u8]) {
        self.insert_shadow(key);
        self.insert(key);
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        let (word, digest) = self.locate(key);
        let slot = self.slots[word].read();
        slot.all_set(self.hasher.layout().group_positions(&digest, slot.group))
    }

    /// Same search as [`AdaptiveBloomFilter::swap`], holding the word's
    /// write lock for the whole walk.
    ///
    /// [`AdaptiveBloomFilter::swap`]: super::AdaptiveBloomFilter::swap
    pub fn swap(&self, key: &[u8]) -> SwapOutcome {
        let (word, digest) = self.locate(key);
        let layout = self.hasher.layout();
        let mut slot = self.slots[word].write();
        let original = slot.group;

        let backing = match self.backing.as_ref() {
            Some(backing) if backing.groups() > 1 => backing,
            _ => {
                return SwapOutcome::Unavailable {
                    word,
                    group: original,
                }
            }
        };

        let groups = backing.groups();
        let mut current = original;
        let mut fetches = 0;
        loop {
            let next = (current + 1) % groups;
            slot.bits = backing.word_pattern(next, word);
            slot.group = next;
            fetches += 1;

            if next == original {
                debug!(word, group = original, fetches, "Shared swap exhausted all groups");
                return SwapOutcome::Exhausted {
                    word,
                    group: original,
                    fetches,
                };
            }
            if !slot.all_set(layout.group_positions(&digest, next)) {
                return SwapOutcome::Relieved {
                    word,
                    from: original,
                    to: next,
                    fetches,
                };
            }
            current = next;
        }
    }

    pub fn word_index(&self, key: &[u8]) -> usize {
        self.locate(key).0
    }

    pub fn active_group(&self, word: usize) -> usize {
        self.slots[word].read().group
    }

    /// Consistent copy of a word's group and bits
    pub fn word_snapshot(&self, word: usize) -> (usize, WordPattern) {
        let slot = self.slots[word].read();
        (slot.group, slot.bits.clone())
    }

    pub fn backing_store(&self) -> Option<&AtomicBackingStore> {
        self.backing.as_ref()
    }

    pub fn is_adaptive(&self) -> bool {
        self.backing.is_some()
    }

    pub fn config(&self) -> &AdaptiveFilterConfig {
        &self.config
    }

    pub fn geometry(&self) -> FilterGeometry {
        self.config.geometry()
    }

    pub fn bits_set(&self) -> usize {
        self.slots
            .iter()
            .map(|slot| slot.read().bits.count_ones())
            .sum()
    }
}
