//! Key sources: line-oriented readers and random key generation

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use rand::Rng;
use tracing::debug;

use crate::error::DataError;
use crate::ports::{KeySource, MembershipOracle};

/// Printable ASCII: digits, letters, punctuation and whitespace (100 chars)
pub const PRINTABLE: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~ \t\n\r\x0b\x0c";

/// One key per line; the line terminator (`\n` or `\r\n`) is stripped and
/// every other byte is kept as-is.
pub struct LineKeySource<R> {
    reader: R,
    buf: Vec<u8>,
    lines_read: usize,
}

impl<R: BufRead> LineKeySource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            lines_read: 0,
        }
    }

    pub fn lines_read(&self) -> usize {
        self.lines_read
    }
}

impl LineKeySource<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DataError> {
        let file = File::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "Opened key file");
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> KeySource for LineKeySource<R> {
    fn next_key(&mut self) -> Result<Option<Vec<u8>>, DataError> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        }
        self.lines_read += 1;
        Ok(Some(self.buf.clone()))
    }
}

/// Random keys of printable characters with a length drawn uniformly from
/// `min_len..=max_len`
#[derive(Clone, Debug)]
pub struct RandomKeyGenerator {
    min_len: usize,
    max_len: usize,
    alphabet: &'static [u8],
}

impl RandomKeyGenerator {
    pub fn new(min_len: usize, max_len: usize) -> Result<Self, DataError> {
        Self::with_alphabet(min_len, max_len, PRINTABLE)
    }

    pub fn with_alphabet(
        min_len: usize,
        max_len: usize,
        alphabet: &'static [u8],
    ) -> Result<Self, DataError> {
        if min_len == 0 || min_len > max_len {
            return Err(DataError::InvalidGenerator(format!(
                "key length range {}..={} is empty or admits empty keys",
                min_len, max_len
            )));
        }
        if alphabet.is_empty() {
            return Err(DataError::InvalidGenerator("empty alphabet".to_string()));
        }
        Ok(Self {
            min_len,
            max_len,
            alphabet,
        })
    }

    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<u8> {
        let len = rng.gen_range(self.min_len..=self.max_len);
        (0..len)
            .map(|_| self.alphabet[rng.gen_range(0..self.alphabet.len())])
            .collect()
    }

    /// `count` distinct keys, none of which is held by `exclude`.
    ///
    /// Fails with `SourceExhausted` if the key space is too small to find
    /// enough fresh keys.
    pub fn unique_keys<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        count: usize,
        exclude: Option<&dyn MembershipOracle>,
    ) -> Result<Vec<Vec<u8>>, DataError> {
        let max_attempts = count.saturating_mul(100).saturating_add(1000);
        let mut seen = HashSet::with_capacity(count);
        let mut keys = Vec::with_capacity(count);
        let mut attempts = 0;

        while keys.len() < count {
            if attempts == max_attempts {
                return Err(DataError::SourceExhausted {
                    produced: keys.len(),
                    requested: count,
                });
            }
            attempts += 1;

            let key = self.generate(rng);
            if exclude.is_some_and(|oracle| oracle.test(&key)) || !seen.insert(key.clone()) {
                continue;
            }
            keys.push(key);
        }
        Ok(keys)
    }
}

/// Endless [`KeySource`] over a [`RandomKeyGenerator`]
pub struct RandomKeys<R> {
    generator: RandomKeyGenerator,
    rng: R,
}

impl RandomKeyGenerator {
    pub fn into_source<R: Rng>(self, rng: R) -> RandomKeys<R> {
        RandomKeys {
            generator: self,
            rng,
        }
    }
}

impl<R: Rng> KeySource for RandomKeys<R> {
    fn next_key(&mut self) -> Result<Option<Vec<u8>>, DataError> {
        Ok(Some(self.generator.generate(&mut self.rng)))
    }
}
