//! Outbound Ports (Driven Ports)
//!
//! Collaborators the experiment layer depends on: a ground-truth membership
//! oracle, a source of keys and a sink for report lines. The filter core
//! never consults any of them.

use crate::error::DataError;

/// Exact membership set used to classify filter hits
pub trait MembershipOracle {
    fn add(&mut self, key: &[u8]);

    fn test(&self, key: &[u8]) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every key held by the oracle
    fn keys(&self) -> Box<dyn Iterator<Item = &[u8]> + '_>;

    /// True if no key is held by both oracles
    fn is_disjoint(&self, other: &dyn MembershipOracle) -> bool {
        if self.len() <= other.len() {
            self.keys().all(|key| !other.test(key))
        } else {
            other.keys().all(|key| !self.test(key))
        }
    }
}

/// Supplier of opaque keys
pub trait KeySource {
    /// Next key, or `None` once the source is exhausted
    fn next_key(&mut self) -> Result<Option<Vec<u8>>, DataError>;

    /// Up to `limit` keys; fewer if the source runs out
    fn take_keys(&mut self, limit: usize) -> Result<Vec<Vec<u8>>, DataError> {
        let mut keys = Vec::with_capacity(limit.min(1 << 20));
        while keys.len() < limit {
            match self.next_key()? {
                Some(key) => keys.push(key),
                None => break,
            }
        }
        Ok(keys)
    }
}

/// Receiver of human-readable progress and result lines
pub trait ReportSink {
    fn report(&mut self, line: &str) -> Result<(), DataError>;

    fn flush(&mut self) -> Result<(), DataError> {
        Ok(())
    }
}
