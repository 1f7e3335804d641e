//! Matrix factory.

use super::{assemble, Generator};
use crate::chunk::{Chunk, Lifetime, MatrixChunk, Quadrant};
use crate::config::is_block_power;
use crate::error::{ChunkError, Result};
use crate::runtime::{Handle, Operation, TaskContext};

/// Build the block-matrix tree of dimension `n` whose element (i, j) is
/// `generator(base_row + i, base_col + j)`.
///
/// At `n == block_size` this fills and registers one leaf. Above it,
/// declares four factory tasks with shifted offsets plus their assembly.
pub fn create(
    ctx: &mut dyn TaskContext,
    generator: Generator,
    n: usize,
    base_row: usize,
    base_col: usize,
) -> Result<Handle> {
    let block_size = ctx.block_size();
    if !is_block_power(n, block_size) {
        return Err(ChunkError::InvalidDimension { n, block_size });
    }

    if n == block_size {
        let mut elements = vec![0.0; n * n];
        for col in 0..n {
            for row in 0..n {
                elements[col * n + row] = generator.generate(base_row + row, base_col + col);
            }
        }
        let id = ctx.register_chunk(MatrixChunk::leaf(n, elements)?.into(), Lifetime::Transient)?;
        return Ok(id.into());
    }

    let half = n / 2;
    let cid_half = ctx.register_chunk(Chunk::index(half), Lifetime::Transient)?;
    let mut quadrants = [Handle::Chunk(cid_half); 4];
    for q in Quadrant::ALL {
        let (row_offset, col_offset) = q.offset(half);
        let cid_row = ctx.register_chunk(Chunk::index(base_row + row_offset), Lifetime::Transient)?;
        let cid_col = ctx.register_chunk(Chunk::index(base_col + col_offset), Lifetime::Transient)?;
        quadrants[q.index()] = ctx.register_task(
            Operation::CreateMatrix(generator),
            &[cid_half.into(), cid_row.into(), cid_col.into()],
            Lifetime::Transient,
        )?;
    }
    assemble::declare(ctx, n, quadrants)
}
