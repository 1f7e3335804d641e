/// Reference leaf product in the column-major leaf layout.
///
/// Computes `C[row, col] += Σ_k A[row, k] · B[k, col]` where element
/// (row, col) of every buffer lives at `col * n + row`. Loop order is
/// col-k-row so the innermost loop walks A and C with stride 1, the
/// column-major counterpart of the i-k-j order.
///
/// This is the correctness baseline the optimized kernel is checked
/// against.
///
/// # Arguments
///
/// * `a` - Leaf A (n × n), column-major
/// * `b` - Leaf B (n × n), column-major
/// * `c` - Leaf C (n × n), column-major, accumulated into
/// * `n` - Block dimension
pub fn leaf_product(a: &[f64], b: &[f64], c: &mut [f64], n: usize) {
    for col in 0..n {
        for k in 0..n {
            let b_k_col = b[col * n + k];
            for row in 0..n {
                c[col * n + row] += a[k * n + row] * b_k_col;
            }
        }
    }
}
