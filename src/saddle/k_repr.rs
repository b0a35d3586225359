//! Conic representations of saddle functions.
//!
//! A saddle function F(x, y), convex in x and concave in y, is carried as
//! its K-representation: a conic minimization over auxiliary variables u,
//!
//! ```text
//! F(x, y) = min_u  f(x, u)' g(y) + t(x, u)
//!           s.t.   constraints(x, u) in K,
//! ```
//!
//! where g(y) is the concave group's stacked vector and f, t are affine in
//! x and u. Representations add and scale without touching the cone
//! constraints, which is what makes saddle expressions compose.

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CscMatrix;

use crate::canon::{canonicalize, ConeConstraint, LinExpr};
use crate::error::{DspError, Result};
use crate::expr::{Expr, ExprId, Shape};
use crate::solver::{solve_cone_program, Settings};
use crate::sparse::{csc_from_triplets, dense_to_csc};

use super::eval::ConcaveEvaluator;
use super::layout::{Side, VariableLayout};

/// K-representation of a saddle function against a pairing vector.
#[derive(Debug, Clone)]
pub struct KRepr {
    /// Coefficient of the pairing vector; affine in the convex group and
    /// the auxiliary variables. Length equals the pairing width.
    pub f: LinExpr,
    /// Scalar offset; affine in the convex group and the auxiliaries.
    pub t: LinExpr,
    /// Cone constraints on the convex group and the auxiliaries.
    pub constraints: Vec<ConeConstraint>,
    /// Constraints hoisted onto the concave side (composition bounds).
    /// These join the outer maximization when the pairing is dualized.
    pub concave_constraints: Vec<ConeConstraint>,
    /// Closed-form evaluator used to recover the concave-side restriction
    /// of the represented function.
    pub evaluator: ConcaveEvaluator,
}

impl KRepr {
    /// A representation with no auxiliary variables or constraints.
    pub fn affine(f: LinExpr, t: LinExpr, evaluator: ConcaveEvaluator) -> Self {
        KRepr {
            f,
            t,
            constraints: Vec::new(),
            concave_constraints: Vec::new(),
            evaluator,
        }
    }

    /// The width of the pairing vector this representation targets.
    pub fn pairing_width(&self) -> usize {
        self.f.size()
    }

    /// Widen the pairing coefficient to `width` with trailing zeros.
    ///
    /// Slice assignments only ever append, so earlier coefficients keep
    /// their positions.
    pub fn pad_to(&self, width: usize) -> KRepr {
        let current = self.pairing_width();
        if current >= width {
            return self.clone();
        }
        let mut out = self.clone();
        out.f = LinExpr::vstack(&[
            self.f.clone(),
            LinExpr::zeros(Shape::vector(width - current)),
        ]);
        out
    }

    /// Sum of two representations over the same pairing vector.
    pub fn add(&self, other: &KRepr) -> KRepr {
        let width = self.pairing_width().max(other.pairing_width());
        let (a, b) = (self.pad_to(width), other.pad_to(width));
        a.add_padded(&b)
    }

    fn add_padded(&self, other: &KRepr) -> KRepr {
        let mut constraints = self.constraints.clone();
        constraints.extend(other.constraints.iter().cloned());
        let mut concave_constraints = self.concave_constraints.clone();
        concave_constraints.extend(other.concave_constraints.iter().cloned());
        KRepr {
            f: self.f.add(&other.f),
            t: self.t.add(&other.t),
            constraints,
            concave_constraints,
            evaluator: ConcaveEvaluator::Sum(vec![
                self.evaluator.clone(),
                other.evaluator.clone(),
            ]),
        }
    }

    /// Scale by a nonnegative constant. Scaling by a negative constant
    /// flips curvature and must be handled by switching instead.
    pub fn scale(&self, k: f64) -> KRepr {
        debug_assert!(k >= 0.0);
        KRepr {
            f: self.f.scale(k),
            t: self.t.scale(k),
            constraints: self.constraints.clone(),
            concave_constraints: self.concave_constraints.clone(),
            evaluator: ConcaveEvaluator::Scale(k, Box::new(self.evaluator.clone())),
        }
    }

    /// Add a scalar constant to the represented function.
    pub fn shift(&self, c: f64) -> KRepr {
        KRepr {
            f: self.f.clone(),
            t: self.t.add(&LinExpr::scalar(c)),
            constraints: self.constraints.clone(),
            concave_constraints: self.concave_constraints.clone(),
            evaluator: ConcaveEvaluator::Sum(vec![
                self.evaluator.clone(),
                ConcaveEvaluator::Constant(c),
            ]),
        }
    }

    /// Evaluate min_u f' g + t subject to the cone constraints, with the
    /// pairing vector and any remaining outer variables fixed numerically.
    pub fn support_value(
        &self,
        pairing_values: &DVector<f64>,
        fixed: &[(ExprId, DVector<f64>)],
        settings: &Settings,
    ) -> Result<f64> {
        if pairing_values.len() != self.pairing_width() {
            return Err(DspError::ShapeMismatch {
                expected: format!("pairing vector of length {}", self.pairing_width()),
                got: format!("length {}", pairing_values.len()),
            });
        }
        let row = dense_to_csc(&DMatrix::from_row_slice(
            1,
            pairing_values.len(),
            pairing_values.as_slice(),
        ));
        let objective = self.f.apply_matrix(&row).add(&self.t);

        let mut constraints = self.constraints.clone();
        for (id, value) in fixed {
            let v = LinExpr::variable(*id, Shape::vector(value.len()));
            let c = LinExpr::constant(DMatrix::from_column_slice(
                value.len(),
                1,
                value.as_slice(),
            ));
            constraints.push(ConeConstraint::Zero { a: v.add(&c.neg()) });
        }

        let solution = solve_cone_program(&objective, &constraints, settings)?;
        solution.value.ok_or_else(|| {
            DspError::Solver(format!(
                "representation subproblem did not solve: {:?}",
                solution.status
            ))
        })
    }
}

/// Canonicalize an affine expression over one side of the layout.
///
/// Returns (B, c) with expr = B' g + c, where g is the side's stacked
/// vector, B has shape (side width) x (expr size), and c is the constant
/// term. Errors if the expression is not affine or mentions variables
/// outside the side.
pub fn affine_to_canon(
    expr: &Expr,
    layout: &VariableLayout,
    side: Side,
) -> Result<(CscMatrix<f64>, DVector<f64>)> {
    let canon = canonicalize(expr)?;
    if !canon.constraints.is_empty() {
        return Err(DspError::NonAffine(
            "expected an affine expression of one variable group".to_string(),
        ));
    }

    let width = layout.size(side);
    let n = canon.expr.size();
    let mut rows = Vec::new();
    let mut cols = Vec::new();
    let mut vals = Vec::new();

    for (var_id, coeff) in &canon.expr.coeffs {
        let slice = layout.slice_of(side, *var_id)?;
        // coeff is (n x w); its transpose lands in B's rows for this slice.
        for (i, j, v) in coeff.triplet_iter() {
            rows.push(slice.start + j);
            cols.push(i);
            vals.push(*v);
        }
    }

    let b = csc_from_triplets(width, n, rows, cols, vals);
    Ok((b, canon.expr.constant_vector()))
}
