//! Content addresses for chunks.

use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 address of a chunk's canonical encoding.
///
/// Two chunks with the same content get the same id, and a non-leaf
/// chunk's id covers its children's ids, so matrix ids form a Merkle tree.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId([u8; 32]);

impl ChunkId {
    /// Hash an already-encoded chunk.
    pub(crate) fn from_encoding(bytes: &[u8]) -> Self {
        ChunkId(Sha256::digest(bytes).into())
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First six bytes as hex, enough to tell ids apart in logs.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkId({})", self.short())
    }
}
