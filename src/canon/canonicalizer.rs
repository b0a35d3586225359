//! Expression canonicalization.
//!
//! Canonicalization transforms DCP expressions into standard form:
//! affine expressions become `LinExpr`, nonlinear atoms are reformulated
//! as affine expressions plus cone constraints. Saddle-extremum atoms are
//! canonicalized through an explicit registration table scoped to the
//! compilation session.

use std::collections::HashMap;
use std::sync::Arc;

use nalgebra::DMatrix;
use nalgebra_sparse::CscMatrix;

use super::lin_expr::LinExpr;
use crate::error::{Diagnostic, DspError, Result};
use crate::expr::{Array, Expr, ExprId, IndexSpec, Shape};
use crate::saddle::extremum::{ExtremumMode, SaddleExtremum};
use crate::sparse::{csc_to_dense, dense_to_csc};

/// A cone constraint in standard form: affine expression in K.
#[derive(Debug, Clone)]
pub enum ConeConstraint {
    /// Zero cone: a = 0 (equality).
    Zero { a: LinExpr },
    /// Nonnegative cone: a >= 0.
    NonNeg { a: LinExpr },
    /// Second-order cone: ||x||_2 <= t.
    Soc {
        /// The scalar t expression.
        t: LinExpr,
        /// The vector x expression.
        x: LinExpr,
    },
    /// Elementwise exponential cone: (x_i, y_i, z_i) in K_exp for each i,
    /// i.e. y_i * exp(x_i / y_i) <= z_i with y_i > 0.
    ExpCone {
        x: LinExpr,
        y: LinExpr,
        z: LinExpr,
    },
    /// Positive semidefinite cone: mat(a) is an n x n PSD matrix, with
    /// `a` holding the n^2 entries column-major.
    Psd { a: LinExpr, n: usize },
}

impl ConeConstraint {
    /// Ids and widths of all variables appearing in this constraint.
    pub fn variable_sizes(&self) -> HashMap<ExprId, usize> {
        let mut sizes = HashMap::new();
        let mut absorb = |e: &LinExpr| {
            for (id, w) in e.variable_sizes() {
                sizes.insert(id, w);
            }
        };
        match self {
            ConeConstraint::Zero { a }
            | ConeConstraint::NonNeg { a }
            | ConeConstraint::Psd { a, .. } => absorb(a),
            ConeConstraint::Soc { t, x } => {
                absorb(t);
                absorb(x);
            }
            ConeConstraint::ExpCone { x, y, z } => {
                absorb(x);
                absorb(y);
                absorb(z);
            }
        }
        sizes
    }
}

/// Canonicalizer hook for a saddle-extremum atom.
pub type SaddleCanonFn = fn(&SaddleExtremum, &mut CanonContext) -> Result<LinExpr>;

/// Explicit registration table mapping extremum modes to canonicalizers.
///
/// The table is handed to the canonicalizer at construction and lives for
/// one compilation session; there is no process-wide registry.
#[derive(Default, Clone)]
pub struct SaddleCanonTable {
    entries: Vec<(ExtremumMode, SaddleCanonFn)>,
}

impl SaddleCanonTable {
    /// An empty table: any extremum atom will fail to canonicalize.
    pub fn empty() -> Self {
        SaddleCanonTable::default()
    }

    /// Register a canonicalizer for a mode, replacing any existing entry.
    pub fn register(&mut self, mode: ExtremumMode, f: SaddleCanonFn) {
        self.entries.retain(|(m, _)| *m != mode);
        self.entries.push((mode, f));
    }

    /// Look up the canonicalizer for a mode.
    pub fn lookup(&self, mode: ExtremumMode) -> Option<SaddleCanonFn> {
        self.entries
            .iter()
            .find(|(m, _)| *m == mode)
            .map(|(_, f)| *f)
    }
}

/// Result of canonicalizing an expression.
#[derive(Debug)]
pub struct CanonResult {
    /// The canonicalized affine expression.
    pub expr: LinExpr,
    /// Cone constraints introduced during canonicalization.
    pub constraints: Vec<ConeConstraint>,
    /// Structured diagnostics collected along the way.
    pub diagnostics: Vec<Diagnostic>,
}

/// Canonicalize an expression with the given saddle canon table.
pub fn canonicalize_with(expr: &Expr, table: &SaddleCanonTable) -> Result<CanonResult> {
    let mut ctx = CanonContext::new(table);
    let lin = ctx.canonicalize_expr(expr)?;
    Ok(CanonResult {
        expr: lin,
        constraints: ctx.constraints,
        diagnostics: ctx.diagnostics,
    })
}

/// Canonicalize a purely-DCP expression (no saddle-extremum atoms).
pub fn canonicalize(expr: &Expr) -> Result<CanonResult> {
    let table = SaddleCanonTable::empty();
    canonicalize_with(expr, &table)
}

/// Context for canonicalization, tracking constraints and diagnostics.
pub struct CanonContext<'a> {
    pub constraints: Vec<ConeConstraint>,
    pub diagnostics: Vec<Diagnostic>,
    table: &'a SaddleCanonTable,
}

impl<'a> CanonContext<'a> {
    pub fn new(table: &'a SaddleCanonTable) -> Self {
        CanonContext {
            constraints: Vec::new(),
            diagnostics: Vec::new(),
            table,
        }
    }

    /// Create a new auxiliary variable.
    pub fn new_aux_var(&mut self, shape: Shape) -> (ExprId, LinExpr) {
        let var_id = ExprId::new();
        (var_id, LinExpr::variable(var_id, shape))
    }

    /// Create a new auxiliary variable constrained non-negative.
    pub fn new_nonneg_aux_var(&mut self, shape: Shape) -> (ExprId, LinExpr) {
        let (var_id, lin_var) = self.new_aux_var(shape);
        self.constraints
            .push(ConeConstraint::NonNeg { a: lin_var.clone() });
        (var_id, lin_var)
    }

    /// Canonicalize an expression into affine form, appending any cone
    /// constraints to the context.
    pub fn canonicalize_expr(&mut self, expr: &Expr) -> Result<LinExpr> {
        match expr {
            // Leaves
            Expr::Variable(v) => Ok(LinExpr::variable(v.id, v.shape.clone())),
            Expr::Constant(c) => Ok(canonicalize_constant(&c.value)),

            // Affine operations
            Expr::Add(a, b) => {
                let la = self.canonicalize_expr(a)?;
                let lb = self.canonicalize_expr(b)?;
                Ok(la.add(&lb))
            }
            Expr::Neg(a) => Ok(self.canonicalize_expr(a)?.neg()),
            Expr::Mul(a, b) => self.canonicalize_mul(a, b),
            Expr::MatMul(a, b) => self.canonicalize_matmul(a, b),
            Expr::Sum(a) => {
                let la = self.canonicalize_expr(a)?;
                Ok(sum_lin(&la))
            }
            Expr::Index(a, spec) => self.canonicalize_index(a, spec),
            Expr::Transpose(a) => self.canonicalize_transpose(a),

            // Nonlinear atoms
            Expr::Exp(x) => self.canonicalize_exp(x),
            Expr::Log(x) => self.canonicalize_log(x),
            Expr::Norm2(x) => self.canonicalize_norm2(x),
            Expr::SumSquares(x) => self.canonicalize_sum_squares(x),
            Expr::Maximum(exprs) => self.canonicalize_maximum(exprs),
            Expr::Minimum(exprs) => self.canonicalize_minimum(exprs),

            // Saddle nodes
            Expr::Saddle(_) => Err(DspError::NotDsp(
                "a convex-concave atom may only appear inside a saddle problem \
                 or a saddle-extremum atom"
                    .to_string(),
            )),
            Expr::Extremum(ext) => {
                let canon_fn = self.table.lookup(ext.mode()).ok_or_else(|| {
                    DspError::NotDsp(format!(
                        "no canonicalizer registered for {:?} extremum atoms",
                        ext.mode()
                    ))
                })?;
                canon_fn(ext, self)
            }
        }
    }

    fn canonicalize_mul(&mut self, a: &Expr, b: &Expr) -> Result<LinExpr> {
        if let Some(arr) = a.constant_value() {
            if let Some(scalar) = arr.as_scalar() {
                return Ok(self.canonicalize_expr(b)?.scale(scalar));
            }
        }
        if let Some(arr) = b.constant_value() {
            if let Some(scalar) = arr.as_scalar() {
                return Ok(self.canonicalize_expr(a)?.scale(scalar));
            }
        }
        Err(DspError::NotDsp(
            "product of two non-constant expressions is not canonicalizable".to_string(),
        ))
    }

    fn canonicalize_matmul(&mut self, a: &Expr, b: &Expr) -> Result<LinExpr> {
        if let Some(arr) = a.constant_value() {
            let lb = self.canonicalize_expr(b)?;
            return Ok(matmul_const_lin(arr, &lb));
        }
        if let Some(arr) = b.constant_value() {
            let la = self.canonicalize_expr(a)?;
            return Ok(lin_matmul_const(&la, arr));
        }
        Err(DspError::NotDsp(
            "matrix product of two non-constant expressions is not canonicalizable".to_string(),
        ))
    }

    fn canonicalize_index(&mut self, a: &Expr, spec: &IndexSpec) -> Result<LinExpr> {
        let la = self.canonicalize_expr(a)?;

        // Vector indexing with a single range; the LinExpr stores data in
        // flattened column-major order, so a range maps to row selection.
        if let [Some((start, stop, step))] = spec.ranges.as_slice() {
            let indices: Vec<usize> = (*start..*stop).step_by(*step).collect();
            if indices.iter().any(|&i| i >= la.size()) {
                return Err(DspError::ShapeMismatch {
                    expected: format!("index below {}", la.size()),
                    got: format!("{:?}", indices),
                });
            }
            return Ok(la.select_rows(&indices));
        }

        // Trailing full-range (take all) leaves the expression unchanged.
        if spec.ranges.iter().all(|r| r.is_none()) {
            return Ok(la);
        }

        Err(DspError::InvalidProblem(
            "unsupported index specification".to_string(),
        ))
    }

    fn canonicalize_transpose(&mut self, a: &Expr) -> Result<LinExpr> {
        let la = self.canonicalize_expr(a)?;
        let m = la.shape.rows();
        let n = la.shape.cols();
        // Column-major: entry (i, j) sits at flat index i + j*m before the
        // transpose and j + i*n after.
        let mut indices = vec![0usize; m * n];
        for j in 0..n {
            for i in 0..m {
                indices[j + i * n] = i + j * m;
            }
        }
        let flat = la.select_rows(&indices);
        let constant = flat.constant_vector();
        Ok(LinExpr {
            coeffs: flat.coeffs,
            constant: DMatrix::from_column_slice(n, m, constant.as_slice()),
            shape: la.shape.transpose(),
        })
    }

    // ========================================================================
    // Nonlinear atom canonicalizers
    // ========================================================================

    fn canonicalize_exp(&mut self, x: &Expr) -> Result<LinExpr> {
        // exp(x): introduce t with (x, 1, t) in K_exp elementwise,
        // i.e. t_i >= exp(x_i).
        let cx = self.canonicalize_expr(x)?;
        let n = cx.size();
        let (_, t) = self.new_aux_var(Shape::vector(n));
        self.constraints.push(ConeConstraint::ExpCone {
            x: cx,
            y: LinExpr::constant(DMatrix::from_element(n, 1, 1.0)),
            z: t.clone(),
        });
        Ok(t)
    }

    fn canonicalize_log(&mut self, x: &Expr) -> Result<LinExpr> {
        // log(x): introduce t with (t, 1, x) in K_exp elementwise,
        // i.e. exp(t_i) <= x_i, so t_i <= log(x_i).
        let cx = self.canonicalize_expr(x)?;
        let n = cx.size();
        let (_, t) = self.new_aux_var(Shape::vector(n));
        self.constraints.push(ConeConstraint::ExpCone {
            x: t.clone(),
            y: LinExpr::constant(DMatrix::from_element(n, 1, 1.0)),
            z: cx,
        });
        Ok(t)
    }

    fn canonicalize_norm2(&mut self, x: &Expr) -> Result<LinExpr> {
        // ||x||_2 <= t
        let cx = self.canonicalize_expr(x)?;
        let (_, t) = self.new_nonneg_aux_var(Shape::scalar());
        self.constraints.push(ConeConstraint::Soc {
            t: t.clone(),
            x: cx,
        });
        Ok(t)
    }

    fn canonicalize_sum_squares(&mut self, x: &Expr) -> Result<LinExpr> {
        // ||x||_2^2 <= t via the standard rotated-cone embedding:
        // || [x; (1 - t)/2] ||_2 <= (1 + t)/2.
        let cx = self.canonicalize_expr(x)?;
        let (_, t) = self.new_nonneg_aux_var(Shape::scalar());

        let half_minus = t.scale(-0.5).add(&LinExpr::scalar(0.5));
        let half_plus = t.scale(0.5).add(&LinExpr::scalar(0.5));
        let stacked = LinExpr::vstack(&[cx, half_minus]);
        self.constraints.push(ConeConstraint::Soc {
            t: half_plus,
            x: stacked,
        });
        Ok(t)
    }

    fn canonicalize_maximum(&mut self, exprs: &[Arc<Expr>]) -> Result<LinExpr> {
        // max(x1, ..., xn): introduce t with t >= x_i for all i.
        if exprs.is_empty() {
            return Ok(LinExpr::zeros(Shape::scalar()));
        }
        let shape = exprs[0].shape();
        let (_, t) = self.new_aux_var(shape);
        for e in exprs {
            let ce = self.canonicalize_expr(e)?;
            self.constraints
                .push(ConeConstraint::NonNeg { a: t.add(&ce.neg()) });
        }
        Ok(t)
    }

    fn canonicalize_minimum(&mut self, exprs: &[Arc<Expr>]) -> Result<LinExpr> {
        // min(x1, ..., xn): introduce t with t <= x_i for all i.
        if exprs.is_empty() {
            return Ok(LinExpr::zeros(Shape::scalar()));
        }
        let shape = exprs[0].shape();
        let (_, t) = self.new_aux_var(shape);
        for e in exprs {
            let ce = self.canonicalize_expr(e)?;
            self.constraints
                .push(ConeConstraint::NonNeg { a: ce.add(&t.neg()) });
        }
        Ok(t)
    }
}

// ============================================================================
// Affine helpers
// ============================================================================

/// Cone constraints induced by declared variable sign attributes.
pub(crate) fn attribute_cones(vars: &[crate::expr::VariableData]) -> Vec<ConeConstraint> {
    let mut cones = Vec::new();
    for v in vars {
        let lin = LinExpr::variable(v.id, Shape::vector(v.shape.size()));
        if v.nonneg {
            cones.push(ConeConstraint::NonNeg { a: lin.clone() });
        }
        if v.nonpos {
            cones.push(ConeConstraint::NonNeg { a: lin.neg() });
        }
    }
    cones
}

pub(crate) fn canonicalize_constant(arr: &Array) -> LinExpr {
    match arr {
        Array::Scalar(v) => LinExpr::scalar(*v),
        Array::Dense(m) => LinExpr::constant(m.clone()),
        Array::Sparse(s) => LinExpr::constant(csc_to_dense(s)),
    }
}

/// Sum all entries of an affine expression.
pub(crate) fn sum_lin(x: &LinExpr) -> LinExpr {
    let size = x.size();
    let ones = DMatrix::from_element(1, size, 1.0);

    let mut new_coeffs = HashMap::new();
    for (var_id, coeff) in &x.coeffs {
        new_coeffs.insert(*var_id, dense_sparse_matmul(&ones, coeff));
    }
    let total: f64 = x.constant.iter().sum();

    LinExpr {
        coeffs: new_coeffs,
        constant: DMatrix::from_element(1, 1, total),
        shape: Shape::scalar(),
    }
}

/// Left-multiply an affine matrix expression by a constant: A @ E.
///
/// With E of shape (m, n) flattened column-major, vec(A @ E) =
/// (I_n (x) A) @ vec(E); transforming a stored coefficient column c is
/// vec(A @ reshape(c, m, n)).
pub(crate) fn matmul_const_lin(a: &Array, b: &LinExpr) -> LinExpr {
    let a_mat = a.to_dense();
    let m = b.shape.rows();
    let n = b.shape.cols();
    let p = a_mat.nrows();

    let mut new_coeffs = HashMap::new();
    for (var_id, coeff) in &b.coeffs {
        let coeff_dense = csc_to_dense(coeff);
        let var_size = coeff_dense.ncols();
        let mut new_coeff = DMatrix::zeros(p * n, var_size);
        for j in 0..var_size {
            let col: Vec<f64> = (0..coeff_dense.nrows()).map(|i| coeff_dense[(i, j)]).collect();
            let mat = DMatrix::from_vec(m, n, col);
            let result = &a_mat * &mat;
            for (idx, val) in result.iter().enumerate() {
                new_coeff[(idx, j)] = *val;
            }
        }
        new_coeffs.insert(*var_id, dense_to_csc(&new_coeff));
    }

    let flat = DMatrix::from_column_slice(m, n, b.constant_vector().as_slice());
    let new_const = &a_mat * &flat;
    let shape = if n == 1 {
        Shape::vector(p)
    } else {
        Shape::matrix(p, n)
    };

    LinExpr {
        coeffs: new_coeffs,
        constant: new_const,
        shape,
    }
}

/// Right-multiply an affine matrix expression by a constant: E @ B.
pub(crate) fn lin_matmul_const(a: &LinExpr, b: &Array) -> LinExpr {
    let b_mat = b.to_dense();
    let m = a.shape.rows();
    let n = a.shape.cols();
    let p = b_mat.ncols();

    let mut new_coeffs = HashMap::new();
    for (var_id, coeff) in &a.coeffs {
        let coeff_dense = csc_to_dense(coeff);
        let var_size = coeff_dense.ncols();
        let mut new_coeff = DMatrix::zeros(m * p, var_size);
        for j in 0..var_size {
            let col: Vec<f64> = (0..coeff_dense.nrows()).map(|i| coeff_dense[(i, j)]).collect();
            let mat = DMatrix::from_vec(m, n, col);
            let result = &mat * &b_mat;
            for (idx, val) in result.iter().enumerate() {
                new_coeff[(idx, j)] = *val;
            }
        }
        new_coeffs.insert(*var_id, dense_to_csc(&new_coeff));
    }

    let flat = DMatrix::from_column_slice(m, n, a.constant_vector().as_slice());
    let new_const = &flat * &b_mat;
    let shape = if p == 1 {
        Shape::vector(m)
    } else {
        Shape::matrix(m, p)
    };

    LinExpr {
        coeffs: new_coeffs,
        constant: new_const,
        shape,
    }
}

fn dense_sparse_matmul(dense: &DMatrix<f64>, sparse: &CscMatrix<f64>) -> CscMatrix<f64> {
    let result = dense * csc_to_dense(sparse);
    dense_to_csc(&result)
}
