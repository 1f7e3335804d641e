//! Element generators for the matrix factory.

/// A pure `f(global_row, global_col) -> f64` used to fill leaf blocks.
///
/// Carried inside [`Operation::CreateMatrix`](crate::runtime::Operation),
/// so it is part of the memo key for a factory task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Generator {
    /// `i + j`
    OperandA,
    /// `i - j + 1`
    OperandB,
    /// 1 on the diagonal, 0 elsewhere.
    Identity,
    /// Pseudo-random values in `[-1, 1)`, fixed by the seed and position.
    Seeded(u64),
}

impl Generator {
    pub fn generate(&self, row: usize, col: usize) -> f64 {
        match *self {
            Generator::OperandA => (row + col) as f64,
            Generator::OperandB => row as f64 - col as f64 + 1.0,
            Generator::Identity => {
                if row == col {
                    1.0
                } else {
                    0.0
                }
            }
            Generator::Seeded(seed) => {
                let h = splitmix64(seed ^ splitmix64(row as u64 ^ splitmix64(col as u64)));
                // Top 53 bits as a fraction in [0, 1)
                let unit = (h >> 11) as f64 / (1u64 << 53) as f64;
                unit * 2.0 - 1.0
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Generator::OperandA => "operand-a",
            Generator::OperandB => "operand-b",
            Generator::Identity => "identity",
            Generator::Seeded(_) => "seeded",
        }
    }
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
