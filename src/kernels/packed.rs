//! Packed square GEMM over the 4×4 micro-kernel.
//!
//! Works on row-major buffers. Leaf blocks are column-major, and a
//! column-major `A·B` is the row-major `Bᵀ·Aᵀ` of the same buffers, so the
//! caller only has to swap operands.

#[cfg(target_arch = "x86_64")]
use super::kernel_4x4::tile_4x4_avx2;

/// Row-major `c = x · y` for `n × n` buffers.
///
/// Packs X into 4-row panels and Y into 4-column panels once, then runs
/// the micro-kernel over every full tile. Rows and columns past the last
/// multiple of 4 fall back to scalar code.
///
/// # Safety
///
/// Caller must ensure:
/// - CPU supports AVX2 and FMA
/// - `x`, `y` and `c` all hold `n * n` elements
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2,fma")]
#[allow(unsafe_op_in_unsafe_fn)]
pub unsafe fn square_gemm_avx2(x: &[f64], y: &[f64], c: &mut [f64], n: usize) {
    let n_main = (n / 4) * 4;

    // Panel for rows i..i+4 starts at i * n; column p's 4 values sit together
    let mut x_panels = vec![0.0; n_main * n];
    for i in (0..n_main).step_by(4) {
        for p in 0..n {
            let out = i * n + p * 4;
            for r in 0..4 {
                x_panels[out + r] = x[(i + r) * n + p];
            }
        }
    }

    // Panel for columns j..j+4 starts at j * n; row p's 4 values are contiguous in y
    let mut y_panels = vec![0.0; n * n_main];
    for j in (0..n_main).step_by(4) {
        for p in 0..n {
            let out = j * n + p * 4;
            y_panels[out..out + 4].copy_from_slice(&y[p * n + j..p * n + j + 4]);
        }
    }

    for i in (0..n_main).step_by(4) {
        for j in (0..n_main).step_by(4) {
            tile_4x4_avx2(
                x_panels.as_ptr().add(i * n),
                y_panels.as_ptr().add(j * n),
                c.as_mut_ptr().add(i * n + j),
                n,
                n,
            );
        }
    }

    if n_main < n {
        scalar_region(x, y, c, n, n_main..n, 0..n);
        scalar_region(x, y, c, n, 0..n_main, n_main..n);
    }
}

/// Row-major `c[i, j] = Σ_p x[i, p] · y[p, j]` over a rectangle of C.
pub fn scalar_region(
    x: &[f64],
    y: &[f64],
    c: &mut [f64],
    n: usize,
    rows: std::ops::Range<usize>,
    cols: std::ops::Range<usize>,
) {
    for i in rows {
        for j in cols.clone() {
            c[i * n + j] = 0.0;
        }
        for p in 0..n {
            let xip = x[i * n + p];
            for j in cols.clone() {
                c[i * n + j] += xip * y[p * n + j];
            }
        }
    }
}
