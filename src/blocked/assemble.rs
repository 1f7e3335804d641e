//! Node assembly from four quadrant results.

use crate::chunk::{Chunk, ChunkId, Lifetime, MatrixChunk};
use crate::error::{ChunkError, Result};
use crate::runtime::{Handle, Input, Operation, TaskContext};

/// Build a node of dimension `n` over four resolved quadrants.
///
/// Each quadrant must be a matrix of dimension `n / 2`.
pub fn assemble(ctx: &mut dyn TaskContext, n: usize, quadrants: &[Input]) -> Result<Handle> {
    if quadrants.len() != 4 {
        return Err(ChunkError::Arity {
            op: Operation::AssembleMatrix.name(),
            expected: 5,
            found: quadrants.len() + 1,
        });
    }
    let half = n / 2;
    for (slot, q) in quadrants.iter().enumerate() {
        let m = q.chunk.as_matrix()?;
        if m.n() != half {
            return Err(ChunkError::MalformedTree(format!(
                "quadrant {} has dimension {}, node of {} needs {}",
                slot,
                m.n(),
                n,
                half
            )));
        }
    }
    let children: [ChunkId; 4] = [
        quadrants[0].id,
        quadrants[1].id,
        quadrants[2].id,
        quadrants[3].id,
    ];
    let id = ctx.register_chunk(MatrixChunk::node(n, children)?.into(), Lifetime::Transient)?;
    Ok(id.into())
}

/// Declare the assembly of four quadrant handles into a node of dimension `n`.
pub(crate) fn declare(ctx: &mut dyn TaskContext, n: usize, quadrants: [Handle; 4]) -> Result<Handle> {
    let cid_n = ctx.register_chunk(Chunk::index(n), Lifetime::Transient)?;
    let [q0, q1, q2, q3] = quadrants;
    ctx.register_task(
        Operation::AssembleMatrix,
        &[cid_n.into(), q0, q1, q2, q3],
        Lifetime::Transient,
    )
}
