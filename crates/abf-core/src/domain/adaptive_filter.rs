//! Adaptive Bloom filter engine
//!
//! The filter is split into `W` words of `B` bits. A key touches exactly
//! one word, and within it the `k` bits chosen by the word's active hash
//! group. When a caller detects a false positive it calls [`swap`], which
//! walks the other groups in cyclic order, installing each group's
//! accumulated pattern from the backing store until one no longer flags
//! the key.
//!
//! INVARIANTS:
//! - Insertion only sets bits; a swap replaces a whole word.
//! - No false negatives for a key inserted while its word's current group
//!   was active.
//! - A swap performs at most `G` backing-store fetches and ends with the
//!   word either in a group that rejects the key or back in its original
//!   group.
//!
//! [`swap`]: AdaptiveBloomFilter::swap

use std::collections::BTreeSet;
use std::fmt;

use tracing::{debug, trace};

use super::backing_store::BackingStore;
use super::config::{AdaptiveFilterConfig, FilterGeometry};
use super::hash_functions::{BitIndexDigest, BitIndexHasher};
use super::parameters::calculate_fpr;
use super::word_array::{WordArray, WordSlice};
use crate::error::FilterError;

/// Result of a [`AdaptiveBloomFilter::swap`] call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwapOutcome {
    /// The word moved to a group that does not flag the key
    Relieved {
        word: usize,
        from: usize,
        to: usize,
        fetches: usize,
    },
    /// Every other group also flagged the key. The word is back in its
    /// original group, resynced to the backing store's copy of that group.
    Exhausted {
        word: usize,
        group: usize,
        fetches: usize,
    },
    /// No backing store or a single group: nothing changed
    Unavailable { word: usize, group: usize },
}

impl SwapOutcome {
    /// Active group of the word after the call
    pub fn group(&self) -> usize {
        match *self {
            SwapOutcome::Relieved { to, .. } => to,
            SwapOutcome::Exhausted { group, .. } => group,
            SwapOutcome::Unavailable { group, .. } => group,
        }
    }

    pub fn word(&self) -> usize {
        match *self {
            SwapOutcome::Relieved { word, .. }
            | SwapOutcome::Exhausted { word, .. }
            | SwapOutcome::Unavailable { word, .. } => word,
        }
    }

    /// Backing-store patterns installed during the call
    pub fn fetches(&self) -> usize {
        match *self {
            SwapOutcome::Relieved { fetches, .. } | SwapOutcome::Exhausted { fetches, .. } => {
                fetches
            }
            SwapOutcome::Unavailable { .. } => 0,
        }
    }

    pub fn is_relieved(&self) -> bool {
        matches!(self, SwapOutcome::Relieved { .. })
    }
}

/// Word-partitioned Bloom filter with per-word swappable hash groups
pub struct AdaptiveBloomFilter {
    config: AdaptiveFilterConfig,
    hasher: Box<dyn BitIndexHasher>,
    /// Live bits, W words of B bits
    live: WordArray,
    /// Active group per word
    selector: Vec<usize>,
    /// Present only when the filter is adaptive
    backing: Option<BackingStore>,
    /// Number of `insert` calls
    inserted: usize,
}

impl AdaptiveBloomFilter {
    /// Create a filter using the digest family named in `config`
    pub fn new(config: AdaptiveFilterConfig) -> Result<Self, FilterError> {
        config.validate()?;
        let hasher = config.digest_family.build_hasher(config.geometry())?;
        Self::with_hasher(config, hasher)
    }

    /// Create a filter around an injected hasher.
    ///
    /// The hasher's layout must describe the same geometry as `config`; the
    /// recorded digest family is taken from the hasher.
    pub fn with_hasher(
        mut config: AdaptiveFilterConfig,
        hasher: Box<dyn BitIndexHasher>,
    ) -> Result<Self, FilterError> {
        config.digest_family = hasher.family();
        config.validate()?;

        let geometry = config.geometry();
        if hasher.layout().geometry() != geometry {
            return Err(FilterError::InvalidParameters(format!(
                "hasher geometry {:?} does not match filter geometry {:?}",
                hasher.layout().geometry(),
                geometry
            )));
        }

        let backing = config
            .is_adaptive()
            .then(|| BackingStore::for_geometry(&geometry));

        debug!(
            words = geometry.words,
            bits_per_word = geometry.bits_per_word,
            k = geometry.hashes_per_group,
            groups = geometry.groups,
            adaptive = backing.is_some(),
            family = %config.digest_family,
            "Created adaptive bloom filter"
        );

        Ok(Self {
            live: WordArray::new(geometry.words, geometry.bits_per_word),
            selector: vec![config.initial_group; geometry.words],
            backing,
            hasher,
            config,
            inserted: 0,
        })
    }

    fn locate(&self, key: &[u8]) -> (usize, BitIndexDigest) {
        let digest = self.hasher.digest(key);
        (self.hasher.layout().word_index(&digest), digest)
    }

    fn word_flags(&self, word: usize, group: usize, digest: &BitIndexDigest) -> bool {
        self.live
            .all_set(word, self.hasher.layout().group_positions(digest, group))
    }

    /// Set the active group's `k` bits for `key` in its word
    pub fn insert(&mut self, key: &[u8]) {
        let (word, digest) = self.locate(key);
        let group = self.selector[word];
        self.live
            .or_bits(word, self.hasher.layout().group_positions(&digest, group));
        self.inserted += 1;
    }

    /// Record `key` in the backing store under every group.
    ///
    /// Keys never shadow-inserted are only protected by the group active
    /// when they were inserted; swapping their word away can reintroduce
    /// a false negative for them. No-op when the filter is not adaptive.
    pub fn insert_shadow(&mut self, key: &[u8]) {
        let Some(backing) = self.backing.as_mut() else {
            return;
        };
        let digest = self.hasher.digest(key);
        let layout = self.hasher.layout();
        let word = layout.word_index(&digest);

        for group in 0..backing.groups() {
            let positions: BTreeSet<usize> = layout.group_positions(&digest, group).collect();
            backing.set_bits(group, word, positions);
        }
    }

    /// `insert` followed by `insert_shadow`
    pub fn record(&mut self, key: &[u8]) {
        self.insert(key);
        self.insert_shadow(key);
    }

    /// Test membership under the word's active group
    pub fn contains(&self, key: &[u8]) -> bool {
        let (word, digest) = self.locate(key);
        self.word_flags(word, self.selector[word], &digest)
    }

    /// Move `key`'s word to the next group that does not flag `key`.
    ///
    /// Groups are tried in cyclic order starting after the current one.
    /// Each step installs the group's backing pattern into the live word.
    /// If the search wraps back to the starting group the word is left
    /// holding the backing store's copy of that group.
    pub fn swap(&mut self, key: &[u8]) -> SwapOutcome {
        let digest = self.hasher.digest(key);
        let layout = self.hasher.layout();
        let word = layout.word_index(&digest);
        let original = self.selector[word];

        let Some(backing) = self.backing.as_ref() else {
            return SwapOutcome::Unavailable {
                word,
                group: original,
            };
        };
        let groups = backing.groups();
        if groups <= 1 {
            return SwapOutcome::Unavailable {
                word,
                group: original,
            };
        }

        let mut current = original;
        let mut fetches = 0;
        loop {
            let next = (current + 1) % groups;
            self.live.replace_word(word, backing.word_pattern(next, word));
            self.selector[word] = next;
            fetches += 1;
            trace!(word, group = next, "Installed backing pattern");

            if next == original {
                debug!(word, group = original, fetches, "Swap exhausted all groups");
                return SwapOutcome::Exhausted {
                    word,
                    group: original,
                    fetches,
                };
            }

            if !self
                .live
                .all_set(word, layout.group_positions(&digest, next))
            {
                debug!(word, from = original, to = next, fetches, "Swap relieved word");
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

    /// Active group of a word
    pub fn active_group(&self, word: usize) -> usize {
        self.selector[word]
    }

    pub fn selector(&self) -> &[usize] {
        &self.selector
    }

    pub fn live_word(&self, word: usize) -> &WordSlice {
        self.live.word(word)
    }

    pub fn backing_store(&self) -> Option<&BackingStore> {
        self.backing.as_ref()
    }

    pub fn is_adaptive(&self) -> bool {
        self.backing.is_some()
    }

    pub fn hasher(&self) -> &dyn BitIndexHasher {
        self.hasher.as_ref()
    }

    pub fn config(&self) -> &AdaptiveFilterConfig {
        &self.config
    }

    pub fn geometry(&self) -> FilterGeometry {
        self.config.geometry()
    }

    /// Number of live bits set
    pub fn bits_set(&self) -> usize {
        self.live.count_ones()
    }

    /// Number of `insert` calls so far
    pub fn elements_inserted(&self) -> usize {
        self.inserted
    }

    /// Classic FPR estimate for the current fill: (1 - e^(-kn/m))^k
    pub fn expected_fpr(&self) -> f64 {
        let geometry = self.geometry();
        calculate_fpr(
            geometry.total_bits(),
            self.inserted,
            geometry.hashes_per_group,
        )
    }
}

impl fmt::Debug for AdaptiveBloomFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptiveBloomFilter")
            .field("config", &self.config)
            .field("bits_set", &self.bits_set())
            .field("inserted", &self.inserted)
            .field("adaptive", &self.is_adaptive())
            .finish()
    }
}
