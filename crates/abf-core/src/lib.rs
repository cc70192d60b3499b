//! # ABF Core
//!
//! Adaptive Bloom filter: a word-partitioned Bloom filter that, when a
//! false positive is detected, can switch the offending word to another
//! group of hash functions without rebuilding the filter.
//!
//! ## Architecture
//!
//! This crate follows Hexagonal Architecture (Ports & Adapters):
//!
//! - **Domain Layer** (`domain/`): Pure filter logic, no I/O
//!   - `BitIndexHasher`: Digest slicing into word and bit indices (MD5, SHA-512)
//!   - `WordArray`: Word-addressed bit storage
//!   - `BackingStore`: Per-group patterns accumulated from every recorded key
//!   - `AdaptiveBloomFilter`: Insert, membership test and group swap
//!   - `SharedAdaptiveFilter`: Per-word locked variant for concurrent use
//!   - `AdaptiveFilterConfig`: Configuration with validation
//!
//! - **Ports Layer** (`ports/`): Trait definitions
//!   - `ExperimentApi`: Driving port (inbound API)
//!   - `MembershipOracle`, `KeySource`, `ReportSink`: Driven ports
//!
//! - **Service Layer** (`service/`): Orchestration
//!   - `ExperimentRunner`: Synthetic validation and trace replay
//!
//! - **Adapters Layer** (`adapters/`): Hash-set oracle, line and random key
//!   sources, report sinks
//!
//! ## Invariants
//!
//! - No false negatives while a word keeps the group a key was inserted under
//! - `swap` halts within `groups` backing-store fetches; afterwards the word is
//!   either back in its original group or no longer flags the key
//! - The backing store only ever gains bits
//!
//! ## Usage Example
//!
//! ```
//! use abf_core::{AdaptiveBloomFilter, AdaptiveFilterConfigBuilder};
//!
//! let config = AdaptiveFilterConfigBuilder::new()
//!     .words(1024)
//!     .bits_per_word(64)
//!     .hashes_per_group(3)
//!     .groups(2)
//!     .build()
//!     .unwrap();
//!
//! let mut filter = AdaptiveBloomFilter::new(config).unwrap();
//! filter.record(b"192.168.0.1");
//! assert!(filter.contains(b"192.168.0.1"));
//!
//! // A probe reported as present but known to be absent
//! if filter.contains(b"10.0.0.7") {
//!     let outcome = filter.swap(b"10.0.0.7");
//!     assert!(outcome.fetches() <= 2);
//! }
//! ```

pub mod adapters;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;

// Re-exports for convenience
pub use domain::{
    AdaptiveBloomFilter, AdaptiveFilterConfig, AdaptiveFilterConfigBuilder, BackingStore,
    BitIndexHasher, DigestFamily, FilterGeometry, SharedAdaptiveFilter, SwapOutcome,
};
pub use error::{DataError, ExperimentError, FilterError};
pub use metrics::{Metrics, MetricsRecorder, MetricsSnapshot, NoOpMetrics};
pub use ports::{ExperimentApi, KeySource, MembershipOracle, ReportSink};
pub use service::{ExperimentConfig, ExperimentRunner, ExperimentSummary, TrialResult};

pub use adapters::{FileSink, HashSetOracle, LineKeySource, NullSink, RandomKeyGenerator, TracingSink};
