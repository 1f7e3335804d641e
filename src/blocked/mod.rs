//! Recursive block-matrix engines.
//!
//! Each engine is the body of one task kind. At the leaf level
//! (`n == block_size`) it computes a dense result directly; above that it
//! splits the block 2×2, declares sub-tasks on the quadrants and returns a
//! handle to an [`assemble`] task that stitches the quadrant results back
//! into a node.
//!
//! Engines:
//! - `create`: matrix factory driven by a [`Generator`]
//! - `multiply`: 8 quadrant products, combined pairwise by `add`
//! - `add`: quadrant-wise sum
//! - `assemble`: node chunk from four child ids
//! - `element`: descend to one scalar

pub mod add;
pub mod assemble;
pub mod create;
pub mod element;
pub mod generator;
pub mod multiply;

pub use generator::Generator;

use crate::chunk::{ChunkId, MatrixChunk};
use crate::error::{ChunkError, Result};
use crate::runtime::TaskContext;

/// Shared checks for binary engines. Returns the common dimension.
pub(crate) fn check_operands(a: &MatrixChunk, b: &MatrixChunk, block_size: usize) -> Result<usize> {
    if a.n() != b.n() {
        return Err(ChunkError::DimensionMismatch {
            left: a.n(),
            right: b.n(),
        });
    }
    let n = a.n();
    if n < block_size {
        return Err(ChunkError::BlockTooSmall { n, block_size });
    }
    for m in [a, b] {
        if m.is_leaf() != (n == block_size) {
            return Err(ChunkError::MalformedTree(format!(
                "{} of dimension {} with block size {}",
                if m.is_leaf() { "leaf" } else { "node" },
                n,
                block_size
            )));
        }
    }
    Ok(n)
}

/// Every child of a node must resolve.
pub(crate) fn check_children(ctx: &dyn TaskContext, children: &[ChunkId; 4]) -> Result<()> {
    for (slot, child) in children.iter().enumerate() {
        if !ctx.contains_chunk(child) {
            return Err(ChunkError::MalformedTree(format!(
                "child {} ({}) is missing",
                slot,
                child.short()
            )));
        }
    }
    Ok(())
}
