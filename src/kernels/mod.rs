//! Leaf kernels: the only place numeric multiplication happens.
//!
//! Every leaf buffer is column-major (`col * n + row`). Two kernels are
//! available and must agree elementwise within 1e-4:
//! - `Optimized`: packed 4×4 AVX2/FMA micro-kernel, picked at runtime when
//!   the CPU supports it, scalar reference code otherwise
//! - `Reference`: the plain triple loop

#[cfg(target_arch = "x86_64")]
pub mod kernel_4x4;
pub mod packed;
pub mod reference;

use std::sync::Once;

/// Which routine multiplies two leaf blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LeafKernel {
    /// Packed SIMD routine when the CPU supports it.
    #[default]
    Optimized,
    /// Triple-loop baseline.
    Reference,
}

impl LeafKernel {
    /// Product of two `n × n` column-major leaf buffers, same layout.
    ///
    /// # Panics
    ///
    /// Panics if either buffer does not hold `n * n` elements.
    pub fn multiply(self, a: &[f64], b: &[f64], n: usize) -> Vec<f64> {
        assert_eq!(a.len(), n * n, "A: expected {}x{}={} elements", n, n, n * n);
        assert_eq!(b.len(), n * n, "B: expected {}x{}={} elements", n, n, n * n);

        let mut c = vec![0.0; n * n];
        match self {
            LeafKernel::Reference => reference::leaf_product(a, b, &mut c, n),
            LeafKernel::Optimized => optimized_product(a, b, &mut c, n),
        }
        c
    }

    /// What this kernel actually runs on the current CPU.
    pub fn description(self) -> &'static str {
        match self {
            LeafKernel::Reference => "reference triple loop",
            LeafKernel::Optimized if simd_available() => "packed 4x4 AVX2/FMA",
            LeafKernel::Optimized => "optimized (scalar fallback, no AVX2/FMA)",
        }
    }
}

fn simd_available() -> bool {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma") {
            return true;
        }
    }
    false
}

fn optimized_product(a: &[f64], b: &[f64], c: &mut [f64], n: usize) {
    #[cfg(target_arch = "x86_64")]
    {
        if simd_available() {
            // Column-major A·B is row-major Bᵀ·Aᵀ over the same buffers
            unsafe { packed::square_gemm_avx2(b, a, c, n) };
            return;
        }
    }

    static FALLBACK: Once = Once::new();
    FALLBACK.call_once(|| {
        tracing::warn!("AVX2/FMA not available, optimized leaf kernel uses scalar code");
    });
    packed::scalar_region(b, a, c, n, 0..n, 0..n);
}
