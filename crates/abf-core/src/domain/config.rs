//! Adaptive filter configuration and validation
//!
//! # Example
//!
//! ```
//! use abf_core::domain::{AdaptiveFilterConfigBuilder, DigestFamily};
//!
//! let config = AdaptiveFilterConfigBuilder::new()
//!     .words(1024)
//!     .bits_per_word(64)
//!     .hashes_per_group(3)
//!     .groups(2)
//!     .digest_family(DigestFamily::Sha512)
//!     .build()
//!     .expect("valid config");
//! assert!(config.is_adaptive());
//! ```

use serde::{Deserialize, Serialize};

use super::hash_functions::{DigestFamily, DigestLayout};
use crate::error::FilterError;

/// Shape of the filter: `W` words of `B` bits, `G` groups of `k` hashes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterGeometry {
    /// Number of words (W), a power of two
    pub words: usize,
    /// Bits per word (B), a power of two
    pub bits_per_word: usize,
    /// Hash functions per group (k)
    pub hashes_per_group: usize,
    /// Number of alternative hash groups (G)
    pub groups: usize,
}

impl FilterGeometry {
    pub fn new(words: usize, bits_per_word: usize, hashes_per_group: usize, groups: usize) -> Self {
        Self {
            words,
            bits_per_word,
            hashes_per_group,
            groups,
        }
    }

    /// Check positivity and power-of-two constraints.
    ///
    /// The digest budget depends on the digest family and is checked by
    /// [`DigestLayout::new`].
    pub fn validate(&self) -> Result<(), FilterError> {
        for (name, value) in [
            ("words", self.words),
            ("bits_per_word", self.bits_per_word),
            ("hashes_per_group", self.hashes_per_group),
            ("groups", self.groups),
        ] {
            if value == 0 {
                return Err(FilterError::ZeroParameter { name });
            }
        }

        if !self.words.is_power_of_two() {
            return Err(FilterError::NotPowerOfTwo {
                name: "words",
                value: self.words,
            });
        }
        if !self.bits_per_word.is_power_of_two() {
            return Err(FilterError::NotPowerOfTwo {
                name: "bits_per_word",
                value: self.bits_per_word,
            });
        }

        Ok(())
    }

    /// Bits of digest consumed by the word index: log2(W)
    pub fn word_index_bits(&self) -> usize {
        self.words.trailing_zeros() as usize
    }

    /// Bits of digest consumed by one bit index: log2(B)
    pub fn bit_index_bits(&self) -> usize {
        self.bits_per_word.trailing_zeros() as usize
    }

    /// Total bits in the live array (m = W * B)
    pub fn total_bits(&self) -> usize {
        self.words * self.bits_per_word
    }
}

/// Adaptive Bloom filter configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveFilterConfig {
    pub words: usize,
    pub bits_per_word: usize,
    pub hashes_per_group: usize,
    pub groups: usize,
    /// Keep a backing store so words can swap groups
    pub backing_enabled: bool,
    pub digest_family: DigestFamily,
    /// Group every word starts in
    pub initial_group: usize,
}

impl Default for AdaptiveFilterConfig {
    fn default() -> Self {
        Self {
            words: 1024,
            bits_per_word: 64,
            hashes_per_group: 3,
            groups: 2,
            backing_enabled: true,
            digest_family: DigestFamily::Md5,
            initial_group: 0,
        }
    }
}

impl AdaptiveFilterConfig {
    /// Create a new configuration with validation
    pub fn new(
        words: usize,
        bits_per_word: usize,
        hashes_per_group: usize,
        groups: usize,
        backing_enabled: bool,
        digest_family: DigestFamily,
    ) -> Result<Self, FilterError> {
        let config = Self {
            words,
            bits_per_word,
            hashes_per_group,
            groups,
            backing_enabled,
            digest_family,
            initial_group: 0,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn geometry(&self) -> FilterGeometry {
        FilterGeometry::new(
            self.words,
            self.bits_per_word,
            self.hashes_per_group,
            self.groups,
        )
    }

    /// Validate geometry, digest budget and initial group
    pub fn validate(&self) -> Result<(), FilterError> {
        DigestLayout::new(self.geometry(), self.digest_family)?;

        if self.initial_group >= self.groups {
            return Err(FilterError::InvalidInitialGroup {
                group: self.initial_group,
                groups: self.groups,
            });
        }

        Ok(())
    }

    /// Whether swaps can happen: a backing store and more than one group
    pub fn is_adaptive(&self) -> bool {
        self.backing_enabled && self.groups > 1
    }

    /// Builder-style method to change the digest family
    pub fn with_digest_family(mut self, family: DigestFamily) -> Self {
        self.digest_family = family;
        self
    }

    /// Builder-style method to toggle the backing store
    pub fn with_backing(mut self, enabled: bool) -> Self {
        self.backing_enabled = enabled;
        self
    }
}

/// Fluent builder for [`AdaptiveFilterConfig`]; unset fields take the defaults.
#[derive(Default)]
pub struct AdaptiveFilterConfigBuilder {
    words: Option<usize>,
    bits_per_word: Option<usize>,
    hashes_per_group: Option<usize>,
    groups: Option<usize>,
    backing_enabled: Option<bool>,
    digest_family: Option<DigestFamily>,
    initial_group: Option<usize>,
}

impl AdaptiveFilterConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of words (W), must be a power of two
    pub fn words(mut self, words: usize) -> Self {
        self.words = Some(words);
        self
    }

    /// Bits per word (B), must be a power of two
    pub fn bits_per_word(mut self, bits: usize) -> Self {
        self.bits_per_word = Some(bits);
        self
    }

    pub fn hashes_per_group(mut self, k: usize) -> Self {
        self.hashes_per_group = Some(k);
        self
    }

    pub fn groups(mut self, groups: usize) -> Self {
        self.groups = Some(groups);
        self
    }

    pub fn backing_enabled(mut self, enabled: bool) -> Self {
        self.backing_enabled = Some(enabled);
        self
    }

    pub fn digest_family(mut self, family: DigestFamily) -> Self {
        self.digest_family = Some(family);
        self
    }

    pub fn initial_group(mut self, group: usize) -> Self {
        self.initial_group = Some(group);
        self
    }

    /// Build the config, validating all parameters
    pub fn build(self) -> Result<AdaptiveFilterConfig, FilterError> {
        let config = self.build_unchecked();
        config.validate()?;
        Ok(config)
    }

    /// Build without validation (the filter constructor validates again)
    pub fn build_unchecked(self) -> AdaptiveFilterConfig {
        let defaults = AdaptiveFilterConfig::default();

        AdaptiveFilterConfig {
            words: self.words.unwrap_or(defaults.words),
            bits_per_word: self.bits_per_word.unwrap_or(defaults.bits_per_word),
            hashes_per_group: self.hashes_per_group.unwrap_or(defaults.hashes_per_group),
            groups: self.groups.unwrap_or(defaults.groups),
            backing_enabled: self.backing_enabled.unwrap_or(defaults.backing_enabled),
            digest_family: self.digest_family.unwrap_or(defaults.digest_family),
            initial_group: self.initial_group.unwrap_or(defaults.initial_group),
        }
    }
}
