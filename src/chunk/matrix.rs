//! Block-matrix chunks.

use super::ChunkId;
use crate::error::{ChunkError, Result};

/// One of the four quadrants of a 2×2 partition.
///
/// The discriminant is the child slot: `row_half * 2 + col_half`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quadrant {
    TopLeft = 0,
    TopRight = 1,
    BottomLeft = 2,
    BottomRight = 3,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::TopLeft,
        Quadrant::TopRight,
        Quadrant::BottomLeft,
        Quadrant::BottomRight,
    ];

    /// Quadrant at block position (`row_half`, `col_half`), each 0 or 1.
    pub fn at(row_half: usize, col_half: usize) -> Self {
        Self::ALL[row_half * 2 + col_half]
    }

    /// Quadrant holding local element (`row`, `col`) of a block with side `2 * half`.
    pub fn containing(row: usize, col: usize, half: usize) -> Self {
        Self::at(usize::from(row >= half), usize::from(col >= half))
    }

    /// (row, col) offset of this quadrant's first element.
    pub fn offset(self, half: usize) -> (usize, usize) {
        let slot = self as usize;
        ((slot / 2) * half, (slot % 2) * half)
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// What a matrix chunk holds.
#[derive(Debug, Clone, PartialEq)]
pub enum MatrixBody {
    /// Dense `n × n` buffer, element (row, col) at `col * n + row`.
    Leaf(Vec<f64>),
    /// Child ids in [`Quadrant`] order, each of dimension `n / 2`.
    Node([ChunkId; 4]),
}

/// A square block of dimension `n`.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixChunk {
    n: usize,
    body: MatrixBody,
}

impl MatrixChunk {
    /// Leaf chunk over a column-major buffer.
    pub fn leaf(n: usize, elements: Vec<f64>) -> Result<Self> {
        if n == 0 || elements.len() != n * n {
            return Err(ChunkError::InvalidLeaf {
                n,
                len: elements.len(),
            });
        }
        Ok(Self {
            n,
            body: MatrixBody::Leaf(elements),
        })
    }

    /// Non-leaf chunk over four children of dimension `n / 2`.
    pub fn node(n: usize, children: [ChunkId; 4]) -> Result<Self> {
        if n < 2 || n % 2 != 0 {
            return Err(ChunkError::MalformedTree(format!(
                "a node needs an even dimension, got {n}"
            )));
        }
        Ok(Self {
            n,
            body: MatrixBody::Node(children),
        })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn body(&self) -> &MatrixBody {
        &self.body
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.body, MatrixBody::Leaf(_))
    }

    /// Leaf elements, or `None` for a node.
    pub fn elements(&self) -> Option<&[f64]> {
        match &self.body {
            MatrixBody::Leaf(elements) => Some(elements),
            MatrixBody::Node(_) => None,
        }
    }

    /// Child ids, or `None` for a leaf.
    pub fn children(&self) -> Option<&[ChunkId; 4]> {
        match &self.body {
            MatrixBody::Leaf(_) => None,
            MatrixBody::Node(children) => Some(children),
        }
    }

    /// Logical element of a leaf. `None` for nodes or indices past `n`.
    pub fn leaf_value(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.n || col >= self.n {
            return None;
        }
        self.elements().map(|e| e[col * self.n + row])
    }

    /// Bytes held directly by this chunk (children not included).
    pub fn size_in_bytes(&self) -> usize {
        match &self.body {
            MatrixBody::Leaf(elements) => elements.len() * std::mem::size_of::<f64>(),
            MatrixBody::Node(_) => 4 * std::mem::size_of::<ChunkId>(),
        }
    }

    pub(crate) fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.n as u64).to_le_bytes());
        match &self.body {
            MatrixBody::Leaf(elements) => {
                out.push(0);
                for value in elements {
                    out.extend_from_slice(&value.to_bits().to_le_bytes());
                }
            }
            MatrixBody::Node(children) => {
                out.push(1);
                for child in children {
                    out.extend_from_slice(child.as_bytes());
                }
            }
        }
    }
}
