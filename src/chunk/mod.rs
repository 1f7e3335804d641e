//! Immutable, content-addressed chunks.
//!
//! A chunk is either a scalar or a block-matrix node. Chunks are never
//! mutated after creation; every transformation produces a new chunk with
//! a new [`ChunkId`].

pub mod id;
pub mod matrix;

pub use id::ChunkId;
pub use matrix::{MatrixBody, MatrixChunk, Quadrant};

use crate::error::{ChunkError, Result};

/// How long the store keeps a registered chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// Kept until explicitly deleted.
    Persistent,
    /// Reclaimable once no task holds a reference.
    Transient,
}

/// A single integer or floating value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Int(i64),
    Float(f64),
}

/// Everything the store can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum Chunk {
    Scalar(Scalar),
    Matrix(MatrixChunk),
}

impl Chunk {
    pub fn int(value: i64) -> Self {
        Chunk::Scalar(Scalar::Int(value))
    }

    pub fn float(value: f64) -> Self {
        Chunk::Scalar(Scalar::Float(value))
    }

    /// Integer scalar holding a dimension or index.
    pub fn index(value: usize) -> Self {
        Chunk::int(value as i64)
    }

    /// Content address of this chunk.
    pub fn id(&self) -> ChunkId {
        let mut bytes = Vec::with_capacity(64);
        match self {
            Chunk::Scalar(Scalar::Int(v)) => {
                bytes.push(b'i');
                bytes.extend_from_slice(&v.to_le_bytes());
            }
            Chunk::Scalar(Scalar::Float(v)) => {
                bytes.push(b'f');
                bytes.extend_from_slice(&v.to_bits().to_le_bytes());
            }
            Chunk::Matrix(m) => {
                bytes.push(b'm');
                m.encode_into(&mut bytes);
            }
        }
        ChunkId::from_encoding(&bytes)
    }

    /// Short name of the chunk kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Chunk::Scalar(Scalar::Int(_)) => "int",
            Chunk::Scalar(Scalar::Float(_)) => "float",
            Chunk::Matrix(_) => "matrix",
        }
    }

    pub fn as_matrix(&self) -> Result<&MatrixChunk> {
        match self {
            Chunk::Matrix(m) => Ok(m),
            other => Err(ChunkError::UnexpectedChunk {
                expected: "matrix",
                found: other.kind(),
            }),
        }
    }

    pub fn as_int(&self) -> Result<i64> {
        match self {
            Chunk::Scalar(Scalar::Int(v)) => Ok(*v),
            other => Err(ChunkError::UnexpectedChunk {
                expected: "int",
                found: other.kind(),
            }),
        }
    }

    /// Non-negative integer scalar as `usize`.
    pub fn as_index(&self) -> Result<usize> {
        let v = self.as_int()?;
        usize::try_from(v).map_err(|_| ChunkError::InvalidIndex(v))
    }

    pub fn as_float(&self) -> Result<f64> {
        match self {
            Chunk::Scalar(Scalar::Float(v)) => Ok(*v),
            other => Err(ChunkError::UnexpectedChunk {
                expected: "float",
                found: other.kind(),
            }),
        }
    }

    pub fn size_in_bytes(&self) -> usize {
        match self {
            Chunk::Scalar(_) => 8,
            Chunk::Matrix(m) => m.size_in_bytes(),
        }
    }
}

impl From<MatrixChunk> for Chunk {
    fn from(m: MatrixChunk) -> Self {
        Chunk::Matrix(m)
    }
}
