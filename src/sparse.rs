//! Sparse matrix utilities.
//!
//! Helper functions for working with nalgebra-sparse matrices. The affine
//! machinery stores every coefficient block as a `CscMatrix<f64>`, so the
//! stacking, scaling, and product helpers here are used throughout
//! canonicalization, stuffing, and dualization.

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CscMatrix};

/// Create a CSC matrix from triplets (row, col, value).
///
/// Duplicates are summed together; out-of-range entries are dropped.
pub fn csc_from_triplets(
    nrows: usize,
    ncols: usize,
    rows: Vec<usize>,
    cols: Vec<usize>,
    vals: Vec<f64>,
) -> CscMatrix<f64> {
    if rows.is_empty() {
        return CscMatrix::zeros(nrows, ncols);
    }

    let mut coo = CooMatrix::new(nrows, ncols);
    for ((row, col), val) in rows.into_iter().zip(cols).zip(vals) {
        if row < nrows && col < ncols {
            coo.push(row, col, val);
        }
    }

    CscMatrix::from(&coo)
}

/// Convert a dense matrix to CSC format, dropping numerical zeros.
pub fn dense_to_csc(dense: &DMatrix<f64>) -> CscMatrix<f64> {
    let mut rows = Vec::new();
    let mut cols = Vec::new();
    let mut vals = Vec::new();

    for j in 0..dense.ncols() {
        for i in 0..dense.nrows() {
            let v = dense[(i, j)];
            if v.abs() > 1e-15 {
                rows.push(i);
                cols.push(j);
                vals.push(v);
            }
        }
    }

    csc_from_triplets(dense.nrows(), dense.ncols(), rows, cols, vals)
}

/// Convert CSC to dense matrix.
pub fn csc_to_dense(sparse: &CscMatrix<f64>) -> DMatrix<f64> {
    let mut dense = DMatrix::zeros(sparse.nrows(), sparse.ncols());
    for (row, col, val) in sparse.triplet_iter() {
        dense[(row, col)] = *val;
    }
    dense
}

/// Add two CSC matrices of the same shape.
pub fn csc_add(a: &CscMatrix<f64>, b: &CscMatrix<f64>) -> CscMatrix<f64> {
    let mut rows = Vec::new();
    let mut cols = Vec::new();
    let mut vals = Vec::new();

    for (r, c, v) in a.triplet_iter().chain(b.triplet_iter()) {
        rows.push(r);
        cols.push(c);
        vals.push(*v);
    }

    // csc_from_triplets sums duplicates
    csc_from_triplets(a.nrows(), a.ncols(), rows, cols, vals)
}

/// Negate a CSC matrix.
pub fn csc_neg(a: &CscMatrix<f64>) -> CscMatrix<f64> {
    csc_scale(a, -1.0)
}

/// Scale a CSC matrix by a scalar.
pub fn csc_scale(a: &CscMatrix<f64>, scalar: f64) -> CscMatrix<f64> {
    let values: Vec<f64> = a.values().iter().map(|v| v * scalar).collect();
    let col_offsets: Vec<usize> = a.col_offsets().to_vec();
    let row_indices: Vec<usize> = a.row_indices().to_vec();
    CscMatrix::try_from_csc_data(a.nrows(), a.ncols(), col_offsets, row_indices, values)
        .unwrap_or_else(|_| CscMatrix::zeros(a.nrows(), a.ncols()))
}

/// Transpose a CSC matrix.
pub fn csc_transpose(a: &CscMatrix<f64>) -> CscMatrix<f64> {
    let mut rows = Vec::new();
    let mut cols = Vec::new();
    let mut vals = Vec::new();
    for (r, c, v) in a.triplet_iter() {
        rows.push(c);
        cols.push(r);
        vals.push(*v);
    }
    csc_from_triplets(a.ncols(), a.nrows(), rows, cols, vals)
}

/// Sparse-sparse product `a * b`.
pub fn csc_matmul(a: &CscMatrix<f64>, b: &CscMatrix<f64>) -> CscMatrix<f64> {
    debug_assert_eq!(a.ncols(), b.nrows());
    let mut rows = Vec::new();
    let mut cols = Vec::new();
    let mut vals = Vec::new();

    // Column j of the result is a's columns combined with weights from
    // column j of b.
    for j in 0..b.ncols() {
        let b_col = b.col(j);
        for (&k, &w) in b_col.row_indices().iter().zip(b_col.values()) {
            let a_col = a.col(k);
            for (&i, &v) in a_col.row_indices().iter().zip(a_col.values()) {
                rows.push(i);
                cols.push(j);
                vals.push(v * w);
            }
        }
    }

    csc_from_triplets(a.nrows(), b.ncols(), rows, cols, vals)
}

/// Matrix-vector product `a * x` as a dense vector.
pub fn csc_mul_vec(a: &CscMatrix<f64>, x: &DVector<f64>) -> DVector<f64> {
    debug_assert_eq!(a.ncols(), x.len());
    let mut y = DVector::zeros(a.nrows());
    for (r, c, v) in a.triplet_iter() {
        y[r] += v * x[c];
    }
    y
}

/// Select the given rows of `a`, in order, as a new matrix.
pub fn csc_select_rows(a: &CscMatrix<f64>, indices: &[usize]) -> CscMatrix<f64> {
    let mut rows = Vec::new();
    let mut cols = Vec::new();
    let mut vals = Vec::new();

    let mut position = vec![usize::MAX; a.nrows()];
    for (out, &idx) in indices.iter().enumerate() {
        position[idx] = out;
    }
    for (r, c, v) in a.triplet_iter() {
        if position[r] != usize::MAX {
            rows.push(position[r]);
            cols.push(c);
            vals.push(*v);
        }
    }

    csc_from_triplets(indices.len(), a.ncols(), rows, cols, vals)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csc_from_triplets() {
        let m = csc_from_triplets(3, 3, vec![0, 1, 2], vec![0, 1, 2], vec![1.0, 2.0, 3.0]);
        assert_eq!(m.nrows(), 3);
        assert_eq!(m.ncols(), 3);
    }

    #[test]
    fn test_csc_transpose() {
        let m = csc_from_triplets(2, 3, vec![0, 1], vec![2, 0], vec![5.0, 7.0]);
        let t = csc_transpose(&m);
        assert_eq!(t.nrows(), 3);
        assert_eq!(t.ncols(), 2);
        let d = csc_to_dense(&t);
        assert_eq!(d[(2, 0)], 5.0);
        assert_eq!(d[(0, 1)], 7.0);
    }

    #[test]
    fn test_csc_matmul() {
        let a = dense_to_csc(&DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]));
        let b = dense_to_csc(&DMatrix::from_row_slice(2, 2, &[5.0, 6.0, 7.0, 8.0]));
        let c = csc_to_dense(&csc_matmul(&a, &b));
        assert_eq!(c, DMatrix::from_row_slice(2, 2, &[19.0, 22.0, 43.0, 50.0]));
    }

    #[test]
    fn test_csc_mul_vec() {
        let a = dense_to_csc(&DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]));
        let x = DVector::from_vec(vec![1.0, 1.0]);
        let y = csc_mul_vec(&a, &x);
        assert_eq!(y, DVector::from_vec(vec![3.0, 7.0]));
    }

    #[test]
    fn test_csc_select_rows() {
        let a = dense_to_csc(&DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 0.0, 2.0, 3.0, 0.0]));
        let s = csc_to_dense(&csc_select_rows(&a, &[2, 0]));
        assert_eq!(s, DMatrix::from_row_slice(2, 2, &[3.0, 0.0, 1.0, 0.0]));
    }
}
