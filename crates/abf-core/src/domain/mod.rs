//! Domain Layer - Pure filter logic
//!
//! This layer contains:
//! - Digest slicing into word and bit indices
//! - Word-addressed bit storage
//! - Backing store of per-group patterns
//! - The adaptive filter engine and its thread-safe variant
//! - Configuration and FPR models
//!
//! RULES:
//! - No I/O operations
//! - No async code

pub mod adaptive_filter;
pub mod backing_store;
pub mod config;
pub mod hash_functions;
pub mod parameters;
pub mod shared_filter;
pub mod word_array;

pub use adaptive_filter::{AdaptiveBloomFilter, SwapOutcome};
pub use backing_store::BackingStore;
pub use config::{AdaptiveFilterConfig, AdaptiveFilterConfigBuilder, FilterGeometry};
pub use hash_functions::{
    BitIndexDigest, BitIndexHasher, DigestFamily, DigestLayout, Md5BitIndexHasher,
    MemoizedHasher, Sha512BitIndexHasher,
};
pub use parameters::{calculate_fpr, optimal_k, word_partitioned_fpr};
pub use shared_filter::{AtomicBackingStore, SharedAdaptiveFilter};
pub use word_array::{WordArray, WordPattern, WordSlice};
