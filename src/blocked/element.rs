//! Element accessor.

use crate::chunk::{Chunk, Lifetime, MatrixBody, MatrixChunk, Quadrant};
use crate::error::{ChunkError, Result};
use crate::runtime::{Handle, Operation, TaskContext};

/// Read element (`row`, `col`) of a block-matrix tree.
///
/// A leaf answers with a float chunk. A node picks the quadrant holding
/// the element and declares the same lookup on that child with local
/// indices.
pub fn element(ctx: &mut dyn TaskContext, m: &MatrixChunk, row: usize, col: usize) -> Result<Handle> {
    let n = m.n();
    let out_of_range = ChunkError::IndexOutOfRange { row, col, n };
    if row >= n || col >= n {
        return Err(out_of_range);
    }

    match m.body() {
        MatrixBody::Leaf(_) => {
            let value = m.leaf_value(row, col).ok_or(out_of_range)?;
            let id = ctx.register_chunk(Chunk::float(value), Lifetime::Transient)?;
            Ok(id.into())
        }
        MatrixBody::Node(children) => {
            let half = n / 2;
            let q = Quadrant::containing(row, col, half);
            let (row_offset, col_offset) = q.offset(half);
            let child = children[q.index()];
            if !ctx.contains_chunk(&child) {
                return Err(ChunkError::MalformedTree(format!(
                    "child {} ({}) is missing",
                    q.index(),
                    child.short()
                )));
            }
            let cid_row = ctx.register_chunk(Chunk::index(row - row_offset), Lifetime::Transient)?;
            let cid_col = ctx.register_chunk(Chunk::index(col - col_offset), Lifetime::Transient)?;
            ctx.register_task(
                Operation::GetMatrixElement,
                &[child.into(), cid_row.into(), cid_col.into()],
                Lifetime::Transient,
            )
        }
    }
}
