//! Error types for chunk and task operations.

use crate::chunk::ChunkId;
use crate::runtime::TaskId;
use thiserror::Error;

/// Errors raised while declaring or evaluating block-matrix tasks.
///
/// Any of these fails the whole enclosing computation. Nothing in this
/// crate retries.
#[derive(Debug, Error)]
pub enum ChunkError {
    /// Requested dimension is not `block_size * 2^k`.
    #[error("invalid dimension {n}: must be {block_size} times a power of two")]
    InvalidDimension { n: usize, block_size: usize },

    /// Operands have different dimensions.
    #[error("dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    /// Operand is smaller than the leaf block.
    #[error("block too small: n = {n} is below the block size {block_size}")]
    BlockTooSmall { n: usize, block_size: usize },

    /// Accessor index outside `[0, n)`.
    #[error("index ({row}, {col}) out of range for n = {n}")]
    IndexOutOfRange { row: usize, col: usize, n: usize },

    /// Structural defect in a block-matrix tree.
    #[error("malformed tree: {0}")]
    MalformedTree(String),

    /// A chunk id that the store does not hold.
    #[error("unknown chunk {0}")]
    UnknownChunk(ChunkId),

    /// A task handle that was never declared.
    #[error("unknown task {0}")]
    UnknownTask(TaskId),

    /// A task input had the wrong chunk kind.
    #[error("expected a {expected} chunk, found {found}")]
    UnexpectedChunk {
        expected: &'static str,
        found: &'static str,
    },

    /// A task was declared with the wrong number of inputs.
    #[error("{op} takes {expected} inputs, got {found}")]
    Arity {
        op: &'static str,
        expected: usize,
        found: usize,
    },

    /// A negative integer where an index or dimension is required.
    #[error("invalid index value {0}")]
    InvalidIndex(i64),

    /// Leaf buffer length does not match `n * n`.
    #[error("leaf of dimension {n} cannot hold {len} elements")]
    InvalidLeaf { n: usize, len: usize },

    /// Rejected runtime configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Worker pool could not be started.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Result type for chunk and task operations.
pub type Result<T> = std::result::Result<T, ChunkError>;
