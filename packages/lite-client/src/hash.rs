//! This module defines [`Hash`] and the merkle hashing scheme shared by headers and validator sets.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_with::{formats::Uppercase, hex::Hex, serde_as};
use sha2::{Digest, Sha256};

/// Size of a SHA-256 digest in bytes
pub const HASH_SIZE: usize = 32;

const LEAF_PREFIX: u8 = 0x00;
const INNER_PREFIX: u8 = 0x01;

/// A SHA-256 digest, displayed and serialized as upper-case hex
#[serde_as]
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash(#[serde_as(as = "Hex<Uppercase>")] [u8; HASH_SIZE]);

impl Hash {
    /// Wraps raw digest bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    /// Returns the raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// SHA-256 of `data`.
    #[must_use]
    pub fn digest(data: impl AsRef<[u8]>) -> Self {
        Self(Sha256::digest(data.as_ref()).into())
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({self})")
    }
}

/// Computes the merkle root of `items` with leaf and inner node domain separation.
///
/// Leaves are hashed as `SHA256(0x00 || item)` and inner nodes as `SHA256(0x01 || left || right)`.
/// The left subtree holds the largest power of two strictly less than the number of items.
/// An empty list hashes to `SHA256("")`.
#[must_use]
pub fn simple_hash_from_byte_vectors<T: AsRef<[u8]>>(items: &[T]) -> Hash {
    match items {
        [] => Hash::digest(b""),
        [item] => leaf_hash(item.as_ref()),
        _ => {
            let split = split_point(items.len());
            let left = simple_hash_from_byte_vectors(&items[..split]);
            let right = simple_hash_from_byte_vectors(&items[split..]);
            inner_hash(&left, &right)
        }
    }
}

fn leaf_hash(item: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_PREFIX]);
    hasher.update(item);
    Hash(hasher.finalize().into())
}

fn inner_hash(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update([INNER_PREFIX]);
    hasher.update(left.0);
    hasher.update(right.0);
    Hash(hasher.finalize().into())
}

// n must be at least 2
const fn split_point(n: usize) -> usize {
    1 << (n - 1).ilog2()
}

/// Appends `bytes` to `buf` prefixed with its big-endian `u64` length.
pub(crate) fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u64).to_be_bytes());
    buf.extend_from_slice(bytes);
}
