//! Task declarations and the chunk/task runtime they run on.
//!
//! Task bodies never wait on anything. A body either registers a finished
//! chunk, or declares further tasks through a [`TaskContext`] and returns a
//! [`Handle`] to their eventual result. Evaluating the declared graph is
//! the runtime's job; [`LocalRuntime`] does it in-process on a rayon pool.

pub mod local;
pub mod store;

pub use local::{LocalRuntime, StatsSnapshot};
pub use store::ChunkStore;

use crate::blocked::{add, assemble, create, element, multiply, Generator};
use crate::chunk::{Chunk, ChunkId, Lifetime};
use crate::error::{ChunkError, Result};
use crate::kernels::LeafKernel;
use std::fmt;
use std::sync::Arc;

/// Runtime-local handle to a declared task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Something that resolves to a chunk: either one that exists, or a
/// task that will produce one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handle {
    Chunk(ChunkId),
    Task(TaskId),
}

impl From<ChunkId> for Handle {
    fn from(id: ChunkId) -> Self {
        Handle::Chunk(id)
    }
}

impl From<TaskId> for Handle {
    fn from(id: TaskId) -> Self {
        Handle::Task(id)
    }
}

/// A resolved task input.
#[derive(Debug, Clone)]
pub struct Input {
    pub id: ChunkId,
    pub chunk: Arc<Chunk>,
}

/// Task kinds. Every kind is a pure function of its input chunks, so
/// `(Operation, input ids)` is a valid memo key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Inputs: n, base row, base column.
    CreateMatrix(Generator),
    /// Inputs: A, B.
    MatrixMultiply,
    /// Inputs: X, Y.
    MatrixAdd,
    /// Inputs: n, then the four quadrants in [`Quadrant`](crate::chunk::Quadrant) order.
    AssembleMatrix,
    /// Inputs: matrix, row, column.
    GetMatrixElement,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::CreateMatrix(_) => "CreateMatrix",
            Operation::MatrixMultiply => "MatrixMultiply",
            Operation::MatrixAdd => "MatrixAdd",
            Operation::AssembleMatrix => "AssembleMatrix",
            Operation::GetMatrixElement => "GetMatrixElement",
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Operation::CreateMatrix(_) => 3,
            Operation::MatrixMultiply | Operation::MatrixAdd => 2,
            Operation::AssembleMatrix => 5,
            Operation::GetMatrixElement => 3,
        }
    }

    pub fn check_arity(&self, found: usize) -> Result<()> {
        if found != self.arity() {
            return Err(ChunkError::Arity {
                op: self.name(),
                expected: self.arity(),
                found,
            });
        }
        Ok(())
    }

    /// Run the task body once its inputs are resolved.
    pub fn execute(&self, ctx: &mut dyn TaskContext, inputs: &[Input]) -> Result<Handle> {
        self.check_arity(inputs.len())?;
        match *self {
            Operation::CreateMatrix(generator) => create::create(
                ctx,
                generator,
                inputs[0].chunk.as_index()?,
                inputs[1].chunk.as_index()?,
                inputs[2].chunk.as_index()?,
            ),
            Operation::MatrixMultiply => multiply::multiply(
                ctx,
                inputs[0].chunk.as_matrix()?,
                inputs[1].chunk.as_matrix()?,
            ),
            Operation::MatrixAdd => add::add(
                ctx,
                inputs[0].chunk.as_matrix()?,
                inputs[1].chunk.as_matrix()?,
            ),
            Operation::AssembleMatrix => {
                assemble::assemble(ctx, inputs[0].chunk.as_index()?, &inputs[1..])
            }
            Operation::GetMatrixElement => element::element(
                ctx,
                inputs[0].chunk.as_matrix()?,
                inputs[1].chunk.as_index()?,
                inputs[2].chunk.as_index()?,
            ),
        }
    }
}

/// What a task body may do: register chunks and declare tasks.
///
/// Declaring a task never runs it. The returned handle can be passed
/// straight into further declarations.
pub trait TaskContext {
    /// Leaf dimension B.
    fn block_size(&self) -> usize;

    /// Kernel used for leaf products.
    fn kernel(&self) -> LeafKernel;

    fn contains_chunk(&self, id: &ChunkId) -> bool;

    fn register_chunk(&mut self, chunk: Chunk, lifetime: Lifetime) -> Result<ChunkId>;

    fn register_task(
        &mut self,
        op: Operation,
        inputs: &[Handle],
        lifetime: Lifetime,
    ) -> Result<Handle>;
}
