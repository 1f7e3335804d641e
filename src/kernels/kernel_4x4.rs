//! 4×4 AVX2 micro-kernel for leaf blocks.

use std::arch::x86_64::*;

/// Computes one 4×4 tile: C[0:4, 0:4] = X_panel × Y_panel
///
/// Four AVX2 registers hold the tile, one per output row. Each step
/// broadcasts the four X values of column `p`, loads row `p` of the Y
/// panel once, and FMAs into the accumulators. The tile is overwritten,
/// not accumulated, so C need not be zeroed.
///
/// # Safety
///
/// Caller must ensure:
/// - CPU supports AVX2 and FMA
/// - `x_panel` points to `k * 4` f64s, the 4 values of column `p` at `p * 4`
/// - `y_panel` points to `k * 4` f64s, the 4 values of row `p` at `p * 4`
/// - `c.add(row * ldc)` is writable for 4 f64s, for row in 0..4
#[target_feature(enable = "avx2,fma")]
#[allow(clippy::identity_op)]
#[allow(clippy::erasing_op)]
#[allow(unsafe_op_in_unsafe_fn)]
pub unsafe fn tile_4x4_avx2(
    x_panel: *const f64,
    y_panel: *const f64,
    c: *mut f64,
    k: usize,
    ldc: usize,
) {
    let mut c0 = _mm256_setzero_pd();
    let mut c1 = _mm256_setzero_pd();
    let mut c2 = _mm256_setzero_pd();
    let mut c3 = _mm256_setzero_pd();

    for p in 0..k {
        let y_row = _mm256_loadu_pd(y_panel.add(p * 4));

        let x0 = _mm256_broadcast_sd(&*x_panel.add(p * 4 + 0));
        let x1 = _mm256_broadcast_sd(&*x_panel.add(p * 4 + 1));
        let x2 = _mm256_broadcast_sd(&*x_panel.add(p * 4 + 2));
        let x3 = _mm256_broadcast_sd(&*x_panel.add(p * 4 + 3));

        c0 = _mm256_fmadd_pd(x0, y_row, c0);
        c1 = _mm256_fmadd_pd(x1, y_row, c1);
        c2 = _mm256_fmadd_pd(x2, y_row, c2);
        c3 = _mm256_fmadd_pd(x3, y_row, c3);
    }

    _mm256_storeu_pd(c.add(0 * ldc), c0);
    _mm256_storeu_pd(c.add(1 * ldc), c1);
    _mm256_storeu_pd(c.add(2 * ldc), c2);
    _mm256_storeu_pd(c.add(3 * ldc), c3);
}
