//! Recursive block matrix multiplication as a chunk/task graph.
//!
//! Matrices are trees of immutable, content-addressed chunks: dense
//! `B × B` leaves at the bottom, 2×2 nodes of child ids above. Multiplying
//! two trees declares a task DAG whose leaves run a numeric kernel and
//! whose internal nodes only route dependencies; a runtime evaluates it.
//!
//! ## Usage
//!
//! ```
//! use block_matmul::{create_matrix, get_element, multiply, Generator, LocalRuntime, RuntimeConfig};
//!
//! let rt = LocalRuntime::new(RuntimeConfig::new().with_block_size(2).with_threads(2)).unwrap();
//!
//! let a = create_matrix(&rt, 4, 0, 0, Generator::OperandA).unwrap();
//! let b = create_matrix(&rt, 4, 0, 0, Generator::OperandB).unwrap();
//! let c = multiply(&rt, a, b).unwrap();
//!
//! // Σ_k (0 + k) · (k - 0 + 1) = 0 + 2 + 6 + 12
//! assert_eq!(get_element(&rt, c, 0, 0).unwrap(), 20.0);
//! ```
//!
//! ## What's inside
//!
//! - `chunk`: the immutable data model and SHA-256 chunk ids
//! - `kernels`: leaf products (packed AVX2/FMA or reference triple loop)
//! - `blocked`: factory, multiply, add, assemble and element engines
//! - `runtime`: the task-declaration seam and an in-process evaluator

pub mod blocked;
pub mod chunk;
pub mod config;
pub mod error;
pub mod kernels;
pub mod runtime;

pub use blocked::Generator;
pub use chunk::{Chunk, ChunkId, Lifetime, MatrixChunk};
pub use config::{CacheConfig, RuntimeConfig};
pub use error::{ChunkError, Result};
pub use kernels::LeafKernel;
pub use runtime::{LocalRuntime, Operation};

/// Build an `n × n` matrix tree with element (i, j) = `generator(base_row + i, base_col + j)`.
///
/// `n` must be the runtime's block size times a power of two.
pub fn create_matrix(
    rt: &LocalRuntime,
    n: usize,
    base_row: usize,
    base_col: usize,
    generator: Generator,
) -> Result<ChunkId> {
    let inputs = [
        rt.register_chunk(Chunk::index(n), Lifetime::Persistent)?,
        rt.register_chunk(Chunk::index(base_row), Lifetime::Persistent)?,
        rt.register_chunk(Chunk::index(base_col), Lifetime::Persistent)?,
    ];
    let result = rt.execute_synchronously(Operation::CreateMatrix(generator), &inputs);
    release_all(rt, &inputs)?;
    result
}

/// `C = A · B`. Returns the root of C's tree, registered persistently.
pub fn multiply(rt: &LocalRuntime, a: ChunkId, b: ChunkId) -> Result<ChunkId> {
    rt.execute_synchronously(Operation::MatrixMultiply, &[a, b])
}

/// `X + Y`. Returns the root of the sum's tree, registered persistently.
pub fn add(rt: &LocalRuntime, x: ChunkId, y: ChunkId) -> Result<ChunkId> {
    rt.execute_synchronously(Operation::MatrixAdd, &[x, y])
}

/// Read element (`row`, `col`) of a matrix tree.
pub fn get_element(rt: &LocalRuntime, matrix: ChunkId, row: usize, col: usize) -> Result<f64> {
    let indices = [
        rt.register_chunk(Chunk::index(row), Lifetime::Persistent)?,
        rt.register_chunk(Chunk::index(col), Lifetime::Persistent)?,
    ];
    let result = rt.execute_synchronously(
        Operation::GetMatrixElement,
        &[matrix, indices[0], indices[1]],
    );
    release_all(rt, &indices)?;
    let cid_value = result?;
    let value = rt.fetch(&cid_value)?.as_float()?;
    rt.delete(&cid_value)?;
    Ok(value)
}

fn release_all(rt: &LocalRuntime, ids: &[ChunkId]) -> Result<()> {
    for id in ids {
        rt.delete(id)?;
    }
    Ok(())
}

/// Closed-form element (`row`, `col`) of `A · B` for two generated `n × n` matrices.
pub fn expected_product_element(a: Generator, b: Generator, n: usize, row: usize, col: usize) -> f64 {
    (0..n).map(|k| a.generate(row, k) * b.generate(k, col)).sum()
}
