//! Recursive block multiply.

use super::{assemble, check_children, check_operands};
use crate::chunk::{Lifetime, MatrixBody, MatrixChunk, Quadrant};
use crate::error::{ChunkError, Result};
use crate::runtime::{Handle, Operation, TaskContext};

/// `C = A · B` over two block-matrix trees of equal dimension.
///
/// Leaf operands go straight to the leaf kernel. Node operands never do
/// arithmetic here: for every output quadrant (i, j) the two products
/// `A[i,k] · B[k,j]` are declared as independent tasks, their sum as an
/// add task that takes both product handles as inputs, and the four sums
/// as one assembly. The 8 products have no ordering among themselves.
pub fn multiply(ctx: &mut dyn TaskContext, a: &MatrixChunk, b: &MatrixChunk) -> Result<Handle> {
    let n = check_operands(a, b, ctx.block_size())?;

    match (a.body(), b.body()) {
        (MatrixBody::Leaf(x), MatrixBody::Leaf(y)) => {
            let product = ctx.kernel().multiply(x, y, n);
            let id = ctx.register_chunk(MatrixChunk::leaf(n, product)?.into(), Lifetime::Transient)?;
            Ok(id.into())
        }
        (MatrixBody::Node(x), MatrixBody::Node(y)) => {
            check_children(&*ctx, x)?;
            check_children(&*ctx, y)?;

            let mut quadrants = [Handle::Chunk(x[0]); 4];
            for i in 0..2 {
                for j in 0..2 {
                    let mut partial = [Handle::Chunk(x[0]); 2];
                    for (k, slot) in partial.iter_mut().enumerate() {
                        *slot = ctx.register_task(
                            Operation::MatrixMultiply,
                            &[
                                x[Quadrant::at(i, k).index()].into(),
                                y[Quadrant::at(k, j).index()].into(),
                            ],
                            Lifetime::Transient,
                        )?;
                    }
                    quadrants[Quadrant::at(i, j).index()] =
                        ctx.register_task(Operation::MatrixAdd, &partial, Lifetime::Transient)?;
                }
            }
            assemble::declare(ctx, n, quadrants)
        }
        _ => Err(ChunkError::MalformedTree(format!(
            "operands of dimension {} differ in leaf-ness",
            n
        ))),
    }
}
