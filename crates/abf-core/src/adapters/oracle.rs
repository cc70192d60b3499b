//! Hash-set membership oracle

use std::collections::HashSet;

use crate::ports::MembershipOracle;

/// Exact set of keys, the ground truth for classifying filter hits
#[derive(Clone, Debug, Default)]
pub struct HashSetOracle {
    keys: HashSet<Vec<u8>>,
}

impl HashSetOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            keys: HashSet::with_capacity(capacity),
        }
    }
}

impl MembershipOracle for HashSetOracle {
    fn add(&mut self, key: &[u8]) {
        if !self.keys.contains(key) {
            self.keys.insert(key.to_vec());
        }
    }

    fn test(&self, key: &[u8]) -> bool {
        self.keys.contains(key)
    }

    fn len(&self) -> usize {
        self.keys.len()
    }

    fn keys(&self) -> Box<dyn Iterator<Item = &[u8]> + '_> {
        Box::new(self.keys.iter().map(Vec::as_slice))
    }
}

impl<K: AsRef<[u8]>> FromIterator<K> for HashSetOracle {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut oracle = HashSetOracle::new();
        for key in iter {
            oracle.add(key.as_ref());
        }
        oracle
    }
}
