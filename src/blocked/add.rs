//! Recursive block add.

use super::{assemble, check_children, check_operands};
use crate::chunk::{Lifetime, MatrixBody, MatrixChunk, Quadrant};
use crate::error::{ChunkError, Result};
use crate::runtime::{Handle, Operation, TaskContext};

/// `X + Y` over two block-matrix trees of equal dimension.
///
/// Leaves are summed elementwise into a new chunk; nodes declare one add
/// per quadrant pair plus their assembly. Neither input is touched.
pub fn add(ctx: &mut dyn TaskContext, x: &MatrixChunk, y: &MatrixChunk) -> Result<Handle> {
    let n = check_operands(x, y, ctx.block_size())?;

    match (x.body(), y.body()) {
        (MatrixBody::Leaf(xs), MatrixBody::Leaf(ys)) => {
            let sum: Vec<f64> = xs.iter().zip(ys).map(|(a, b)| a + b).collect();
            let id = ctx.register_chunk(MatrixChunk::leaf(n, sum)?.into(), Lifetime::Transient)?;
            Ok(id.into())
        }
        (MatrixBody::Node(xc), MatrixBody::Node(yc)) => {
            check_children(&*ctx, xc)?;
            check_children(&*ctx, yc)?;

            let mut quadrants = [Handle::Chunk(xc[0]); 4];
            for q in Quadrant::ALL {
                let slot = q.index();
                quadrants[slot] = ctx.register_task(
                    Operation::MatrixAdd,
                    &[xc[slot].into(), yc[slot].into()],
                    Lifetime::Transient,
                )?;
            }
            assemble::declare(ctx, n, quadrants)
        }
        _ => Err(ChunkError::MalformedTree(format!(
            "operands of dimension {} differ in leaf-ness",
            n
        ))),
    }
}
