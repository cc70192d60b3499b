//! Bit-index derivation for the adaptive filter
//!
//! A single cryptographic digest is computed per key and sliced,
//! most-significant bit first, into fixed-width index fields:
//!
//! ```text
//! [ word index | g0.h0 | g0.h1 | ... | g0.h(k-1) | g1.h0 | ... | g(G-1).h(k-1) | unused ]
//!   log2(W)      log2(B) bits each, group-major
//! ```
//!
//! The digest family (MD5, 128 bits or SHA-512, 512 bits) is chosen at
//! construction; the layout checks that every field fits in the digest.

use std::fmt;
use std::str::FromStr;

use bitvec::prelude::*;
use md5::Md5;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

use super::config::FilterGeometry;
use crate::error::FilterError;

/// Supported digest families
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestFamily {
    /// 128-bit MD5 digest
    Md5,
    /// 512-bit SHA-512 digest
    Sha512,
}

impl DigestFamily {
    /// Digest width in bits
    pub fn width_bits(&self) -> usize {
        match self {
            DigestFamily::Md5 => 128,
            DigestFamily::Sha512 => 512,
        }
    }

    /// Build the hasher for this family, validating the layout
    pub fn build_hasher(
        &self,
        geometry: FilterGeometry,
    ) -> Result<Box<dyn BitIndexHasher>, FilterError> {
        Ok(match self {
            DigestFamily::Md5 => Box::new(Md5BitIndexHasher::new(geometry)?),
            DigestFamily::Sha512 => Box::new(Sha512BitIndexHasher::new(geometry)?),
        })
    }
}

impl fmt::Display for DigestFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DigestFamily::Md5 => write!(f, "md5"),
            DigestFamily::Sha512 => write!(f, "sha512"),
        }
    }
}

impl FromStr for DigestFamily {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(DigestFamily::Md5),
            "sha512" | "sha-512" => Ok(DigestFamily::Sha512),
            other => Err(FilterError::InvalidParameters(format!(
                "unknown digest family '{}'",
                other
            ))),
        }
    }
}

/// Fixed-width digest of one key, read most-significant bit first
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BitIndexDigest {
    bytes: Vec<u8>,
}

impl BitIndexDigest {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn width_bits(&self) -> usize {
        self.bytes.len() * 8
    }

    /// Read `len` bits starting at bit `start` as a big-endian unsigned value.
    ///
    /// A zero-width field reads as 0.
    ///
    /// # Panics
    /// Panics if the field runs past the end of the digest or is wider
    /// than `usize`.
    pub fn field(&self, start: usize, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        self.bytes.view_bits::<Msb0>()[start..start + len].load_be::<usize>()
    }
}

impl fmt::Debug for BitIndexDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitIndexDigest({})", hex::encode(&self.bytes))
    }
}

impl fmt::Display for BitIndexDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.bytes))
    }
}

/// Field layout of a digest for a given geometry and family
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DigestLayout {
    geometry: FilterGeometry,
    family: DigestFamily,
    word_bits: usize,
    bit_bits: usize,
}

impl DigestLayout {
    /// Validate the geometry and check `G*k*log2(B) + log2(W) <= Dw`.
    pub fn new(geometry: FilterGeometry, family: DigestFamily) -> Result<Self, FilterError> {
        geometry.validate()?;

        let word_bits = geometry.word_index_bits();
        let bit_bits = geometry.bit_index_bits();
        let available = family.width_bits();
        let required = geometry
            .groups
            .checked_mul(geometry.hashes_per_group)
            .and_then(|n| n.checked_mul(bit_bits))
            .and_then(|n| n.checked_add(word_bits))
            .unwrap_or(usize::MAX);

        if required > available {
            return Err(FilterError::DigestBudgetExceeded {
                family,
                required,
                available,
            });
        }

        Ok(Self {
            geometry,
            family,
            word_bits,
            bit_bits,
        })
    }

    pub fn geometry(&self) -> FilterGeometry {
        self.geometry
    }

    pub fn family(&self) -> DigestFamily {
        self.family
    }

    /// Digest bits actually consumed by index fields
    pub fn required_bits(&self) -> usize {
        self.geometry.groups * self.geometry.hashes_per_group * self.bit_bits + self.word_bits
    }

    /// Bit offset of the field for hash `ordinal` of `group`
    ///
    /// # Panics
    /// Panics if `ordinal >= k` or `group >= G`.
    pub fn bit_field_offset(&self, ordinal: usize, group: usize) -> usize {
        assert!(
            group < self.geometry.groups,
            "group {} out of range (groups = {})",
            group,
            self.geometry.groups
        );
        assert!(
            ordinal < self.geometry.hashes_per_group,
            "hash ordinal {} out of range (k = {})",
            ordinal,
            self.geometry.hashes_per_group
        );
        self.word_bits + (group * self.geometry.hashes_per_group + ordinal) * self.bit_bits
    }

    pub fn word_index(&self, digest: &BitIndexDigest) -> usize {
        digest.field(0, self.word_bits)
    }

    pub fn bit_index(&self, digest: &BitIndexDigest, ordinal: usize, group: usize) -> usize {
        digest.field(self.bit_field_offset(ordinal, group), self.bit_bits)
    }

    /// The `k` bit positions (possibly repeated) of `group`
    pub fn group_positions<'a>(
        &'a self,
        digest: &'a BitIndexDigest,
        group: usize,
    ) -> impl Iterator<Item = usize> + 'a {
        (0..self.geometry.hashes_per_group).map(move |i| self.bit_index(digest, i, group))
    }
}

/// Deterministic mapping from a key to its word and per-group bit indices.
///
/// Implementations must be pure functions of the key. `word_index` and
/// `bit_index` must agree with `layout()` applied to `digest()`; the filter
/// engine relies on that to compute the digest once per operation.
pub trait BitIndexHasher: Send + Sync {
    fn family(&self) -> DigestFamily;

    fn layout(&self) -> &DigestLayout;

    fn digest(&self, key: &[u8]) -> BitIndexDigest;

    fn word_index(&self, key: &[u8]) -> usize {
        self.layout().word_index(&self.digest(key))
    }

    fn bit_index(&self, key: &[u8], ordinal: usize, group: usize) -> usize {
        self.layout().bit_index(&self.digest(key), ordinal, group)
    }
}

impl<H: BitIndexHasher + ?Sized> BitIndexHasher for Box<H> {
    fn family(&self) -> DigestFamily {
        (**self).family()
    }

    fn layout(&self) -> &DigestLayout {
        (**self).layout()
    }

    fn digest(&self, key: &[u8]) -> BitIndexDigest {
        (**self).digest(key)
    }

    fn word_index(&self, key: &[u8]) -> usize {
        (**self).word_index(key)
    }

    fn bit_index(&self, key: &[u8], ordinal: usize, group: usize) -> usize {
        (**self).bit_index(key, ordinal, group)
    }
}

/// Bit indices sliced from an MD5 digest (128-bit budget)
#[derive(Clone, Debug)]
pub struct Md5BitIndexHasher {
    layout: DigestLayout,
}

impl Md5BitIndexHasher {
    pub fn new(geometry: FilterGeometry) -> Result<Self, FilterError> {
        Ok(Self {
            layout: DigestLayout::new(geometry, DigestFamily::Md5)?,
        })
    }
}

impl BitIndexHasher for Md5BitIndexHasher {
    fn family(&self) -> DigestFamily {
        DigestFamily::Md5
    }

    fn layout(&self) -> &DigestLayout {
        &self.layout
    }

    fn digest(&self, key: &[u8]) -> BitIndexDigest {
        BitIndexDigest::from_bytes(Md5::digest(key).to_vec())
    }
}

/// Bit indices sliced from a SHA-512 digest (512-bit budget)
#[derive(Clone, Debug)]
pub struct Sha512BitIndexHasher {
    layout: DigestLayout,
}

impl Sha512BitIndexHasher {
    pub fn new(geometry: FilterGeometry) -> Result<Self, FilterError> {
        Ok(Self {
            layout: DigestLayout::new(geometry, DigestFamily::Sha512)?,
        })
    }
}

impl BitIndexHasher for Sha512BitIndexHasher {
    fn family(&self) -> DigestFamily {
        DigestFamily::Sha512
    }

    fn layout(&self) -> &DigestLayout {
        &self.layout
    }

    fn digest(&self, key: &[u8]) -> BitIndexDigest {
        BitIndexDigest::from_bytes(Sha512::digest(key).to_vec())
    }
}

/// Wraps a hasher with a single-slot memo of the last key and its digest.
///
/// Useful when a caller issues the `word_index` / `bit_index` calls of one
/// logical operation separately. Results are identical to the inner hasher.
pub struct MemoizedHasher<H> {
    inner: H,
    last: Mutex<Option<(Vec<u8>, BitIndexDigest)>>,
}

impl<H: BitIndexHasher> MemoizedHasher<H> {
    pub fn new(inner: H) -> Self {
        Self {
            inner,
            last: Mutex::new(None),
        }
    }

    pub fn into_inner(self) -> H {
        self.inner
    }
}

impl<H: BitIndexHasher> BitIndexHasher for MemoizedHasher<H> {
    fn family(&self) -> DigestFamily {
        self.inner.family()
    }

    fn layout(&self) -> &DigestLayout {
        self.inner.layout()
    }

    fn digest(&self, key: &[u8]) -> BitIndexDigest {
        let mut last = self.last.lock();
        if let Some((last_key, digest)) = last.as_ref() {
            if last_key.as_slice() == key {
                return digest.clone();
            }
        }
        let digest = self.inner.digest(key);
        *last = Some((key.to_vec(), digest.clone()));
        digest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> FilterGeometry {
        FilterGeometry::new(1024, 64, 3, 2)
    }

    #[test]
    fn test_digest_widths() {
        let md5 = Md5BitIndexHasher::new(geometry()).unwrap();
        let sha = Sha512BitIndexHasher::new(geometry()).unwrap();

        assert_eq!(md5.digest(b"key").width_bits(), 128);
        assert_eq!(sha.digest(b"key").width_bits(), 512);
    }

    #[test]
    fn test_md5_known_digest() {
        let md5 = Md5BitIndexHasher::new(geometry()).unwrap();
        assert_eq!(
            md5.digest(b"a").to_string(),
            "0cc175b9c0f1b6a831c399e269772661"
        );
    }

    #[test]
    fn test_fields_are_sliced_msb_first() {
        // 0x0cc1... = 0000 1100 1100 0001 ...
        let md5 = Md5BitIndexHasher::new(geometry()).unwrap();
        let digest = md5.digest(b"a");

        // First 10 bits: 0000110011 = 51
        assert_eq!(md5.layout().word_index(&digest), 51);
        assert_eq!(md5.word_index(b"a"), 51);
        // Next 6 bits (group 0, hash 0): 000001 = 1
        assert_eq!(md5.bit_index(b"a", 0, 0), 1);
    }

    #[test]
    fn test_field_spanning_bytes() {
        let digest = BitIndexDigest::from_bytes(vec![0b1010_1010, 0b1100_0011]);
        assert_eq!(digest.field(0, 4), 0b1010);
        assert_eq!(digest.field(6, 4), 0b1011);
        assert_eq!(digest.field(4, 8), 0b1010_1100);
        assert_eq!(digest.field(3, 0), 0, "Zero-width fields read as 0");
    }

    #[test]
    fn test_indices_deterministic_and_in_range() {
        let sha = Sha512BitIndexHasher::new(geometry()).unwrap();
        for i in 0..500 {
            let key = format!("element_{}", i);
            let w = sha.word_index(key.as_bytes());
            assert_eq!(w, sha.word_index(key.as_bytes()), "Word index must be deterministic");
            assert!(w < 1024);
            for g in 0..2 {
                for n in 0..3 {
                    let b = sha.bit_index(key.as_bytes(), n, g);
                    assert!(b < 64, "Bit index {} should be < 64", b);
                }
            }
        }
    }

    #[test]
    fn test_groups_use_disjoint_fields() {
        let layout = DigestLayout::new(geometry(), DigestFamily::Md5).unwrap();
        assert_eq!(layout.bit_field_offset(0, 0), 10);
        assert_eq!(layout.bit_field_offset(2, 0), 22);
        assert_eq!(layout.bit_field_offset(0, 1), 28);
        assert_eq!(layout.bit_field_offset(2, 1), 40);
        assert_eq!(layout.required_bits(), 46);
    }

    #[test]
    #[should_panic(expected = "group 2 out of range")]
    fn test_out_of_range_group_panics() {
        let md5 = Md5BitIndexHasher::new(geometry()).unwrap();
        md5.bit_index(b"key", 0, 2);
    }

    #[test]
    fn test_budget_exactly_full_is_accepted() {
        // 2 groups * 3 hashes * 19 bits + 14 = 128
        let geometry = FilterGeometry::new(1 << 14, 1 << 19, 3, 2);
        assert!(Md5BitIndexHasher::new(geometry).is_ok());

        let geometry = FilterGeometry::new(1 << 15, 1 << 19, 3, 2);
        assert!(matches!(
            Md5BitIndexHasher::new(geometry),
            Err(FilterError::DigestBudgetExceeded { required: 129, .. })
        ));
    }

    #[test]
    fn test_family_parsing() {
        assert_eq!("md5".parse::<DigestFamily>().unwrap(), DigestFamily::Md5);
        assert_eq!("SHA512".parse::<DigestFamily>().unwrap(), DigestFamily::Sha512);
        assert!("crc32".parse::<DigestFamily>().is_err());
    }

    #[test]
    fn test_build_hasher_selects_family() {
        let hasher = DigestFamily::Sha512.build_hasher(geometry()).unwrap();
        assert_eq!(hasher.family(), DigestFamily::Sha512);
        assert_eq!(hasher.layout().geometry(), geometry());
    }

    #[test]
    fn test_memoized_hasher_matches_inner() {
        let plain = Sha512BitIndexHasher::new(geometry()).unwrap();
        let memo = MemoizedHasher::new(plain.clone());

        for key in [b"alpha".as_slice(), b"beta", b"alpha", b"alpha", b"gamma"] {
            assert_eq!(memo.digest(key), plain.digest(key));
            assert_eq!(memo.word_index(key), plain.word_index(key));
            for g in 0..2 {
                for n in 0..3 {
                    assert_eq!(memo.bit_index(key, n, g), plain.bit_index(key, n, g));
                }
            }
        }
    }
}
