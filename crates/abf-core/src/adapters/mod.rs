//! Adapters Layer (Driven Adapters)
//!
//! Implementations of the driven ports used by the experiment layer.
//!
//! ## Adapters
//!
//! - `HashSetOracle` - Exact membership oracle over a `HashSet`
//! - `LineKeySource` - One key per line of any buffered reader
//! - `RandomKeyGenerator` / `RandomKeys` - Random printable keys
//! - `TracingSink` / `FileSink` / `MemorySink` / `NullSink` - Report sinks

pub mod key_source;
pub mod oracle;
pub mod sinks;

pub use key_source::{LineKeySource, RandomKeyGenerator, RandomKeys, PRINTABLE};
pub use oracle::HashSetOracle;
pub use sinks::{FileSink, MemorySink, NullSink, TracingSink};
