//! Linear expression representation for canonicalization.
//!
//! After canonicalization, expressions are represented in standard affine
//! form: `sum_i(A_i * x_i) + b`. The dualization machinery manipulates
//! these forms directly, so beyond add/neg/scale this type carries
//! stacking, row selection, and left matrix application.

use std::collections::HashMap;

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CscMatrix;

use crate::expr::{ExprId, Shape};
use crate::sparse::{csc_add, csc_matmul, csc_mul_vec, csc_neg, csc_scale, csc_select_rows};

/// A linear expression in standard form: sum_i(A_i * x_i) + b
///
/// Each term is a sparse coefficient matrix multiplied by a flattened
/// variable. The constant term `b` is a dense matrix matching the shape.
#[derive(Debug, Clone)]
pub struct LinExpr {
    /// Coefficient matrices for each variable: var_id -> coefficient matrix.
    /// The coefficient matrix A_i has shape (output_size, var_size).
    pub coeffs: HashMap<ExprId, CscMatrix<f64>>,
    /// Constant term (offset).
    pub constant: DMatrix<f64>,
    /// Output shape of this expression.
    pub shape: Shape,
}

impl LinExpr {
    /// Create a zero linear expression with the given shape.
    pub fn zeros(shape: Shape) -> Self {
        let rows = shape.rows();
        let cols = shape.cols();
        LinExpr {
            coeffs: HashMap::new(),
            constant: DMatrix::zeros(rows, cols),
            shape,
        }
    }

    /// Create a linear expression for a single variable (identity coefficient).
    pub fn variable(var_id: ExprId, shape: Shape) -> Self {
        let size = shape.size();
        let mut coeffs = HashMap::new();
        coeffs.insert(var_id, CscMatrix::identity(size));
        LinExpr {
            coeffs,
            constant: DMatrix::zeros(shape.rows(), shape.cols()),
            shape,
        }
    }

    /// Create a constant linear expression.
    pub fn constant(value: DMatrix<f64>) -> Self {
        let shape = Shape::matrix(value.nrows(), value.ncols());
        LinExpr {
            coeffs: HashMap::new(),
            constant: value,
            shape,
        }
    }

    /// Create a scalar constant.
    pub fn scalar(value: f64) -> Self {
        LinExpr {
            coeffs: HashMap::new(),
            constant: DMatrix::from_element(1, 1, value),
            shape: Shape::scalar(),
        }
    }

    /// Check if this is a constant (no variables).
    pub fn is_constant(&self) -> bool {
        self.coeffs.is_empty()
    }

    /// Get the output size (flattened).
    pub fn size(&self) -> usize {
        self.shape.size()
    }

    /// The constant term flattened column-major.
    pub fn constant_vector(&self) -> DVector<f64> {
        DVector::from_iterator(
            self.constant.nrows() * self.constant.ncols(),
            self.constant.iter().copied(),
        )
    }

    /// Add two linear expressions.
    pub fn add(&self, other: &LinExpr) -> LinExpr {
        let coeffs = if self.coeffs.is_empty() {
            other.coeffs.clone()
        } else if other.coeffs.is_empty() {
            self.coeffs.clone()
        } else {
            let mut coeffs = self.coeffs.clone();
            coeffs.reserve(other.coeffs.len());
            for (var_id, coeff) in &other.coeffs {
                coeffs
                    .entry(*var_id)
                    .and_modify(|c| *c = csc_add(c, coeff))
                    .or_insert_with(|| coeff.clone());
            }
            coeffs
        };

        // Broadcast scalar constants
        let new_constant = if self.constant.nrows() == other.constant.nrows()
            && self.constant.ncols() == other.constant.ncols()
        {
            &self.constant + &other.constant
        } else if other.constant.nrows() == 1 && other.constant.ncols() == 1 {
            let scalar = other.constant[(0, 0)];
            self.constant.map(|v| v + scalar)
        } else if self.constant.nrows() == 1 && self.constant.ncols() == 1 {
            let scalar = self.constant[(0, 0)];
            other.constant.map(|v| v + scalar)
        } else {
            self.constant.clone()
        };

        let new_shape = if self.shape.size() >= other.shape.size() {
            self.shape.clone()
        } else {
            other.shape.clone()
        };

        LinExpr {
            coeffs,
            constant: new_constant,
            shape: new_shape,
        }
    }

    /// Negate a linear expression.
    pub fn neg(&self) -> LinExpr {
        let coeffs = self.coeffs.iter().map(|(k, v)| (*k, csc_neg(v))).collect();
        LinExpr {
            coeffs,
            constant: -&self.constant,
            shape: self.shape.clone(),
        }
    }

    /// Scale by a scalar.
    pub fn scale(&self, scalar: f64) -> LinExpr {
        let coeffs = self
            .coeffs
            .iter()
            .map(|(k, v)| (*k, csc_scale(v, scalar)))
            .collect();
        LinExpr {
            coeffs,
            constant: &self.constant * scalar,
            shape: self.shape.clone(),
        }
    }

    /// Apply a constant matrix on the left: `m * self`.
    ///
    /// `self` must be vector-shaped and `m.ncols()` must equal its size.
    pub fn apply_matrix(&self, m: &CscMatrix<f64>) -> LinExpr {
        debug_assert_eq!(m.ncols(), self.size());
        let coeffs = self
            .coeffs
            .iter()
            .map(|(k, v)| (*k, csc_matmul(m, v)))
            .collect();
        let constant = csc_mul_vec(m, &self.constant_vector());
        let rows = m.nrows();
        LinExpr {
            coeffs,
            constant: DMatrix::from_column_slice(rows, 1, constant.as_slice()),
            shape: Shape::vector(rows),
        }
    }

    /// Select the given rows, in order, of a vector-shaped expression.
    pub fn select_rows(&self, indices: &[usize]) -> LinExpr {
        let coeffs = self
            .coeffs
            .iter()
            .map(|(k, v)| (*k, csc_select_rows(v, indices)))
            .collect();
        let flat = self.constant_vector();
        let constant: Vec<f64> = indices.iter().map(|&i| flat[i]).collect();
        LinExpr {
            coeffs,
            constant: DMatrix::from_column_slice(indices.len(), 1, &constant),
            shape: Shape::vector(indices.len()),
        }
    }

    /// Stack vector-shaped expressions vertically.
    pub fn vstack(parts: &[LinExpr]) -> LinExpr {
        let total: usize = parts.iter().map(|p| p.size()).sum();
        let mut coeffs: HashMap<ExprId, CscMatrix<f64>> = HashMap::new();
        let mut constant = DVector::zeros(total);

        let mut offset = 0;
        for part in parts {
            let rows = part.size();
            for (var_id, coeff) in &part.coeffs {
                let padded = pad_rows(coeff, offset, total);
                coeffs
                    .entry(*var_id)
                    .and_modify(|c| *c = csc_add(c, &padded))
                    .or_insert(padded);
            }
            constant.rows_mut(offset, rows).copy_from(&part.constant_vector());
            offset += rows;
        }

        LinExpr {
            coeffs,
            constant: DMatrix::from_column_slice(total, 1, constant.as_slice()),
            shape: Shape::vector(total),
        }
    }

    /// Get all variable IDs in this expression.
    pub fn variables(&self) -> Vec<ExprId> {
        let mut vars: Vec<_> = self.coeffs.keys().copied().collect();
        vars.sort_by_key(|id| id.raw());
        vars
    }

    /// Width (flattened size) of each variable appearing in this expression.
    pub fn variable_sizes(&self) -> HashMap<ExprId, usize> {
        self.coeffs.iter().map(|(k, v)| (*k, v.ncols())).collect()
    }
}

/// Shift a coefficient block down by `offset` rows inside a `total`-row matrix.
fn pad_rows(m: &CscMatrix<f64>, offset: usize, total: usize) -> CscMatrix<f64> {
    let mut rows = Vec::new();
    let mut cols = Vec::new();
    let mut vals = Vec::new();
    for (r, c, v) in m.triplet_iter() {
        rows.push(r + offset);
        cols.push(c);
        vals.push(*v);
    }
    crate::sparse::csc_from_triplets(total, m.ncols(), rows, cols, vals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::dense_to_csc;

    #[test]
    fn test_lin_expr_zeros() {
        let e = LinExpr::zeros(Shape::vector(5));
        assert!(e.is_constant());
        assert_eq!(e.size(), 5);
    }

    #[test]
    fn test_lin_expr_variable() {
        let var_id = ExprId::new();
        let e = LinExpr::variable(var_id, Shape::vector(3));
        assert!(!e.is_constant());
        assert_eq!(e.variables(), vec![var_id]);
    }

    #[test]
    fn test_lin_expr_add() {
        let var1 = ExprId::new();
        let var2 = ExprId::new();
        let e1 = LinExpr::variable(var1, Shape::vector(3));
        let e2 = LinExpr::variable(var2, Shape::vector(3));
        let sum = e1.add(&e2);
        assert_eq!(sum.variables().len(), 2);
    }

    #[test]
    fn test_apply_matrix() {
        let var_id = ExprId::new();
        let e = LinExpr::variable(var_id, Shape::vector(2))
            .add(&LinExpr::constant(DMatrix::from_column_slice(2, 1, &[1.0, 2.0])));
        let m = dense_to_csc(&DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]));
        let me = e.apply_matrix(&m);
        assert_eq!(me.constant[(0, 0)], 5.0);
        assert_eq!(me.constant[(1, 0)], 11.0);
        let coeff = crate::sparse::csc_to_dense(&me.coeffs[&var_id]);
        assert_eq!(coeff[(1, 0)], 3.0);
    }

    #[test]
    fn test_vstack_and_select() {
        let var_id = ExprId::new();
        let e1 = LinExpr::variable(var_id, Shape::vector(2));
        let e2 = LinExpr::scalar(7.0);
        let stacked = LinExpr::vstack(&[e1, e2]);
        assert_eq!(stacked.size(), 3);
        assert_eq!(stacked.constant[(2, 0)], 7.0);

        let picked = stacked.select_rows(&[2, 0]);
        assert_eq!(picked.size(), 2);
        assert_eq!(picked.constant[(0, 0)], 7.0);
    }
}
