//! Content hashing of words into the 256 lookup buckets
//!
//! Every word is hashed with MD5. MD5 is long broken as a cryptographic hash,
//! but here it only serves as a stable, well-spread partitioning function
//! that the published data files were built with. The first byte of the
//! digest (2 hex characters) selects the bucket, the remaining 15 bytes
//! (30 hex characters) are the key of the word within that bucket.

use md5::{Digest, Md5};
use std::fmt;

/// Number of lookup buckets
pub const NUM_BUCKETS: usize = 256;

/// MD5 digest of a word
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct WordHash([u8; 16]);
//
impl WordHash {
    /// Hash a word, which should already be normalized
    pub fn of(word: &str) -> Self {
        let digest = Md5::digest(word.as_bytes());
        let mut bytes = [0; 16];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Bucket that this word belongs to
    pub fn prefix(&self) -> BucketPrefix {
        BucketPrefix(self.0[0])
    }

    /// Key of this word within its bucket
    pub fn suffix(&self) -> HashSuffix {
        let mut bytes = [0; 15];
        bytes.copy_from_slice(&self.0[1..]);
        HashSuffix(bytes)
    }

    /// Split into bucket prefix and in-bucket key
    pub fn split(&self) -> (BucketPrefix, HashSuffix) {
        (self.prefix(), self.suffix())
    }
}
//
impl fmt::Display for WordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Bucket identifier, displayed as 2 lowercase hex characters
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct BucketPrefix(u8);
//
impl BucketPrefix {
    /// Enumerate all buckets in order, from "00" to "ff"
    pub fn all() -> impl Iterator<Item = Self> {
        (0..=u8::MAX).map(Self)
    }

    /// Position of this bucket in [`all()`](Self::all)
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Name of the Parquet file holding this bucket
    pub fn file_name(self) -> String {
        format!("{self}.parquet")
    }
}
//
impl From<u8> for BucketPrefix {
    fn from(value: u8) -> Self {
        Self(value)
    }
}
//
impl fmt::Display for BucketPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}", self.0)
    }
}

/// Key of a word within its bucket, displayed as 30 lowercase hex characters
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct HashSuffix([u8; 15]);
//
impl HashSuffix {
    /// Decode the textual form used in bucket tables
    ///
    /// Returns `None` if the input is not exactly 30 hex characters.
    pub fn parse(hex_str: &str) -> Option<Self> {
        let mut bytes = [0; 15];
        hex::decode_to_slice(hex_str, &mut bytes).ok()?;
        Some(Self(bytes))
    }
}
//
impl fmt::Display for HashSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}
