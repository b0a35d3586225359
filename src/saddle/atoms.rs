//! Convex-concave atoms.
//!
//! Each atom is a scalar saddle function: convex in one variable group,
//! concave in the other. Atoms know how to produce their K-representation
//! against a pass layout, both in natural orientation and switched (the
//! negated function with the two roles exchanged), and how to restrict
//! themselves to one group once the other has numeric values.
//!
//! Dispatch is a closed enum: the parser and the canonicalizer match on
//! the atom data directly rather than going through a trait object.

use std::collections::HashSet;
use std::sync::Arc;

use nalgebra::{Cholesky, DMatrix, DVector};

use crate::canon::{canonicalize, ConeConstraint, LinExpr};
use crate::constraints::Constraint;
use crate::error::{Diagnostic, DspError, Result};
use crate::expr::{constant_matrix, Expr, ExprId, Shape, VariableData};
use crate::sparse::dense_to_csc;

use super::eval::{evaluate, Assignment, ConcaveEvaluator};
use super::k_repr::{affine_to_canon, KRepr};
use super::layout::{Side, VariableLayout};
use super::switch::{stacked_side, switch_repr};

/// The family of a saddle atom, used by sign analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaddleAtomKind {
    /// A pairing: inner product of the two groups.
    Inner,
    /// Weighted log-sum-exp: log of weights' exp(exponents).
    WeightedLogSumExp,
    /// Quadratic form with an uncertain matrix.
    QuadForm,
}

#[derive(Debug, Clone)]
enum AtomData {
    /// Bilinear pairing of two affine arguments.
    Inner { fx: Expr, gy: Expr },
    /// Inner product of a nonnegative convex and a nonnegative concave
    /// argument.
    SaddleInner { fx: Expr, gy: Expr },
    /// log(weights' exp(exponents)).
    Wlse { exponents: Expr, weights: Expr },
    /// x' P x with x affine in the convex group and P affine in the
    /// concave group, P ranging over PSD matrices.
    QuadForm { x: Expr, p: Expr },
}

/// A convex-concave atom with its implicit domain.
#[derive(Debug, Clone)]
pub struct SaddleAtom {
    id: ExprId,
    data: AtomData,
    implicit: Vec<Constraint>,
    diagnostics: Vec<Diagnostic>,
}

/// Bilinear pairing Fx' Gy of two affine expressions.
pub fn inner(fx: &Expr, gy: &Expr) -> Result<Expr> {
    if !fx.is_affine() || !gy.is_affine() {
        return Err(DspError::Curvature(
            "inner requires two affine arguments; use saddle_inner for \
             convex-concave products"
                .to_string(),
        ));
    }
    check_same_size(fx, gy)?;
    Ok(wrap(AtomData::Inner {
        fx: fx.clone(),
        gy: gy.clone(),
    }))
}

/// Inner product Fx' Gy with Fx convex and Gy concave, both nonnegative.
///
/// An argument whose sign is not certified nonnegative gets one implicit
/// nonnegativity constraint and one diagnostic.
pub fn saddle_inner(fx: &Expr, gy: &Expr) -> Result<Expr> {
    if !fx.is_convex() {
        return Err(DspError::Curvature(
            "saddle_inner requires a convex first argument".to_string(),
        ));
    }
    if !gy.is_concave() {
        return Err(DspError::Curvature(
            "saddle_inner requires a concave second argument".to_string(),
        ));
    }
    check_same_size(fx, gy)?;

    let mut implicit = Vec::new();
    let mut diagnostics = Vec::new();
    if !fx.sign().is_nonneg() {
        implicit.push(Constraint::NonNeg(Arc::new(fx.clone())));
        diagnostics.push(Diagnostic::implicit_domain(
            "first argument of saddle_inner is not certified nonnegative; \
             assuming it is and adding a constraint",
        ));
    }
    if !gy.sign().is_nonneg() {
        implicit.push(Constraint::NonNeg(Arc::new(gy.clone())));
        diagnostics.push(Diagnostic::implicit_domain(
            "second argument of saddle_inner is not certified nonnegative; \
             assuming it is and adding a constraint",
        ));
    }

    Ok(wrap_with(
        AtomData::SaddleInner {
            fx: fx.clone(),
            gy: gy.clone(),
        },
        implicit,
        diagnostics,
    ))
}

/// Weighted log-sum-exp: log(weights' exp(exponents)), convex in the
/// exponents and concave in the weights.
pub fn weighted_log_sum_exp(exponents: &Expr, weights: &Expr) -> Result<Expr> {
    if !exponents.is_convex() {
        return Err(DspError::Curvature(
            "weighted_log_sum_exp requires convex exponents".to_string(),
        ));
    }
    if !weights.is_concave() {
        return Err(DspError::Curvature(
            "weighted_log_sum_exp requires concave weights".to_string(),
        ));
    }
    check_same_size(exponents, weights)?;

    let mut implicit = Vec::new();
    let mut diagnostics = Vec::new();
    if !weights.sign().is_nonneg() {
        implicit.push(Constraint::NonNeg(Arc::new(weights.clone())));
        diagnostics.push(Diagnostic::implicit_domain(
            "weights of weighted_log_sum_exp are not certified nonnegative; \
             assuming they are and adding a constraint",
        ));
    }

    Ok(wrap_with(
        AtomData::Wlse {
            exponents: exponents.clone(),
            weights: weights.clone(),
        },
        implicit,
        diagnostics,
    ))
}

/// Saddle quadratic form x' P x, convex in x and concave (linear) in P.
///
/// P is assumed to range over PSD matrices.
pub fn saddle_quad_form(x: &Expr, p: &Expr) -> Result<Expr> {
    if !x.is_affine() {
        return Err(DspError::Curvature(
            "saddle_quad_form requires an affine vector argument".to_string(),
        ));
    }
    if !p.is_affine() {
        return Err(DspError::Curvature(
            "saddle_quad_form requires an affine matrix argument".to_string(),
        ));
    }
    let n = x.shape().size();
    let p_shape = p.shape();
    if p_shape.rows() != n || p_shape.cols() != n {
        return Err(DspError::ShapeMismatch {
            expected: format!("{n} x {n} matrix"),
            got: format!("{} x {}", p_shape.rows(), p_shape.cols()),
        });
    }
    Ok(wrap(AtomData::QuadForm {
        x: x.clone(),
        p: p.clone(),
    }))
}

fn wrap(data: AtomData) -> Expr {
    wrap_with(data, Vec::new(), Vec::new())
}

fn wrap_with(data: AtomData, implicit: Vec<Constraint>, diagnostics: Vec<Diagnostic>) -> Expr {
    Expr::Saddle(Arc::new(SaddleAtom {
        id: ExprId::new(),
        data,
        implicit,
        diagnostics,
    }))
}

fn check_same_size(a: &Expr, b: &Expr) -> Result<()> {
    let (na, nb) = (a.shape().size(), b.shape().size());
    if na != nb {
        return Err(DspError::ShapeMismatch {
            expected: format!("arguments of equal size, first has {na}"),
            got: format!("second has {nb}"),
        });
    }
    Ok(())
}

impl SaddleAtom {
    pub fn id(&self) -> ExprId {
        self.id
    }

    pub fn kind(&self) -> SaddleAtomKind {
        match self.data {
            AtomData::Inner { .. } | AtomData::SaddleInner { .. } => SaddleAtomKind::Inner,
            AtomData::Wlse { .. } => SaddleAtomKind::WeightedLogSumExp,
            AtomData::QuadForm { .. } => SaddleAtomKind::QuadForm,
        }
    }

    /// The argument the atom is convex in.
    pub fn convex_arg(&self) -> &Expr {
        match &self.data {
            AtomData::Inner { fx, .. } | AtomData::SaddleInner { fx, .. } => fx,
            AtomData::Wlse { exponents, .. } => exponents,
            AtomData::QuadForm { x, .. } => x,
        }
    }

    /// The argument the atom is concave in.
    pub fn concave_arg(&self) -> &Expr {
        match &self.data {
            AtomData::Inner { gy, .. } | AtomData::SaddleInner { gy, .. } => gy,
            AtomData::Wlse { weights, .. } => weights,
            AtomData::QuadForm { p, .. } => p,
        }
    }

    /// Implicit domain constraints attached at construction.
    pub fn implicit_constraints(&self) -> &[Constraint] {
        &self.implicit
    }

    /// Diagnostics emitted at construction.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub(crate) fn collect_variable_data(&self, vars: &mut Vec<VariableData>) {
        self.convex_arg().collect_variable_data(vars);
        self.concave_arg().collect_variable_data(vars);
    }

    /// Variables of the convex-group argument.
    pub fn convex_vars(&self) -> Vec<VariableData> {
        self.convex_arg().variable_data()
    }

    /// Variables of the concave-group argument.
    pub fn concave_vars(&self) -> Vec<VariableData> {
        self.concave_arg().variable_data()
    }

    /// Numeric value with both groups assigned.
    pub fn value(&self, assignment: &Assignment) -> Result<f64> {
        match &self.data {
            AtomData::Inner { fx, gy } | AtomData::SaddleInner { fx, gy } => {
                let a = flatten(&evaluate(fx, assignment)?);
                let b = flatten(&evaluate(gy, assignment)?);
                Ok(a.dot(&b))
            }
            AtomData::Wlse { exponents, weights } => {
                let e = flatten(&evaluate(exponents, assignment)?);
                let w = flatten(&evaluate(weights, assignment)?);
                let total: f64 = w.iter().zip(e.iter()).map(|(wi, ei)| wi * ei.exp()).sum();
                Ok(total.ln())
            }
            AtomData::QuadForm { x, p } => {
                let xv = flatten(&evaluate(x, assignment)?);
                let pv = evaluate(p, assignment)?;
                Ok((xv.transpose() * pv * xv)[(0, 0)])
            }
        }
    }

    /// The concave function obtained by fixing the parameter group.
    ///
    /// Unswitched, the convex argument is substituted numerically and the
    /// result is concave in the concave group. Switched, the concave
    /// argument is substituted and the result is the negated atom, concave
    /// in the convex group.
    pub fn concave_restriction(&self, switched: bool, assignment: &Assignment) -> Result<Expr> {
        match (&self.data, switched) {
            (AtomData::Inner { fx, gy }, false) | (AtomData::SaddleInner { fx, gy }, false) => {
                let v = flatten(&evaluate(fx, assignment)?);
                Ok(row_times(&v, gy))
            }
            (AtomData::Inner { fx, gy }, true) | (AtomData::SaddleInner { fx, gy }, true) => {
                let v = flatten(&evaluate(gy, assignment)?);
                Ok(Expr::Neg(Arc::new(row_times(&v, fx))))
            }
            (AtomData::Wlse { exponents, weights }, false) => {
                let e = flatten(&evaluate(exponents, assignment)?);
                let coeffs: Vec<f64> = e.iter().map(|v| v.exp()).collect();
                let scaled = row_times(&DVector::from_vec(coeffs), weights);
                Ok(Expr::Log(Arc::new(scaled)))
            }
            (AtomData::Wlse { exponents, weights }, true) => {
                let w = flatten(&evaluate(weights, assignment)?);
                let weighted = Expr::MatMul(
                    Arc::new(constant_matrix(1, w.len(), w.as_slice())),
                    Arc::new(Expr::Exp(Arc::new(exponents.clone()))),
                );
                Ok(Expr::Neg(Arc::new(Expr::Log(Arc::new(weighted)))))
            }
            (AtomData::QuadForm { x, p }, false) => {
                let xv = flatten(&evaluate(x, assignment)?);
                let col = constant_matrix(xv.len(), 1, xv.as_slice());
                let px = Expr::MatMul(Arc::new(p.clone()), Arc::new(col));
                Ok(row_times(&xv, &px))
            }
            (AtomData::QuadForm { x, p }, true) => {
                let pv = evaluate(p, assignment)?;
                let chol = Cholesky::new(pv).ok_or_else(|| {
                    DspError::InvalidProblem(
                        "quadratic form matrix value is not positive semidefinite".to_string(),
                    )
                })?;
                let lt = chol.l().transpose();
                let n = lt.nrows();
                let factor: Vec<f64> = (0..n)
                    .flat_map(|i| (0..n).map(move |j| (i, j)))
                    .map(|(i, j)| lt[(i, j)])
                    .collect();
                let lx = Expr::MatMul(
                    Arc::new(constant_matrix(n, n, &factor)),
                    Arc::new(x.clone()),
                );
                Ok(Expr::Neg(Arc::new(Expr::SumSquares(Arc::new(lx)))))
            }
        }
    }

    /// Build the natural-orientation K-representation against a layout
    /// whose convex side holds the convex group.
    fn build_natural(
        &self,
        layout: &mut VariableLayout,
        evaluator: ConcaveEvaluator,
    ) -> Result<KRepr> {
        check_group_side(self.convex_arg(), layout, Side::Convex)?;
        check_group_side(self.concave_arg(), layout, Side::Concave)?;

        match &self.data {
            AtomData::Inner { fx, gy } => {
                let (b, c) = affine_to_canon(gy, layout, Side::Concave)?;
                let lin_fx = affine_lin(fx)?;
                let f = lin_fx.apply_matrix(&b);
                let t = lin_fx.apply_matrix(&row(&c));
                Ok(KRepr::affine(f, t, evaluator))
            }

            AtomData::SaddleInner { fx, gy } => {
                let n = fx.shape().size();
                let canon_fx = canonicalize(fx)?;
                let z = LinExpr::variable(ExprId::new(), Shape::vector(n));

                let mut constraints = canon_fx.constraints;
                constraints.push(ConeConstraint::NonNeg {
                    a: z.add(&canon_fx.expr.neg()),
                });

                let (f, t, concave_constraints) =
                    pair_concave(&z, &LinExpr::scalar(0.0), gy, layout)?;
                Ok(KRepr {
                    f,
                    t,
                    constraints,
                    concave_constraints,
                    evaluator,
                })
            }

            AtomData::Wlse { exponents, weights } => {
                let n = exponents.shape().size();
                let canon_e = canonicalize(exponents)?;

                let f_local = LinExpr::variable(ExprId::new(), Shape::vector(n));
                let t_local = LinExpr::variable(ExprId::new(), Shape::scalar());
                let u = LinExpr::variable(ExprId::new(), Shape::scalar());
                let epi = LinExpr::variable(ExprId::new(), Shape::vector(n));

                let ones_col = dense_to_csc(&DMatrix::from_element(n, 1, 1.0));
                let u_vec = u.apply_matrix(&ones_col);

                let mut constraints = canon_e.constraints;
                constraints.push(ConeConstraint::NonNeg {
                    a: epi.add(&canon_e.expr.neg()),
                });
                constraints.push(ConeConstraint::ExpCone {
                    x: epi.add(&u_vec),
                    y: LinExpr::constant(DMatrix::from_element(n, 1, 1.0)),
                    z: f_local.clone(),
                });
                constraints.push(ConeConstraint::NonNeg {
                    a: t_local.add(&u).add(&LinExpr::scalar(1.0)),
                });

                let (f, t, concave_constraints) = pair_concave(&f_local, &t_local, weights, layout)?;
                Ok(KRepr {
                    f,
                    t,
                    constraints,
                    concave_constraints,
                    evaluator,
                })
            }

            AtomData::QuadForm { x, p } => {
                let n = x.shape().size();
                let lin_x = affine_lin(x)?;
                let side = n + 1;
                let a = LinExpr::variable(ExprId::new(), Shape::vector(side * side));

                // Column-major positions of the bordered matrix
                // [[M, x], [x', 1]]: M in the top-left n x n block.
                let m_rows: Vec<usize> = (0..n)
                    .flat_map(|j| (0..n).map(move |i| i + j * side))
                    .collect();
                let last_col: Vec<usize> = (0..n).map(|i| i + n * side).collect();
                let last_row: Vec<usize> = (0..n).map(|j| n + j * side).collect();
                let corner = n + n * side;

                let mut constraints = vec![ConeConstraint::Psd {
                    a: a.clone(),
                    n: side,
                }];
                constraints.push(ConeConstraint::Zero {
                    a: a.select_rows(&[corner]).add(&LinExpr::scalar(-1.0)),
                });
                constraints.push(ConeConstraint::Zero {
                    a: a.select_rows(&last_col).add(&lin_x.neg()),
                });
                constraints.push(ConeConstraint::Zero {
                    a: a.select_rows(&last_row).add(&lin_x.neg()),
                });

                let vec_m = a.select_rows(&m_rows);
                let (b, c) = affine_to_canon(p, layout, Side::Concave)?;
                let f = vec_m.apply_matrix(&b);
                let t = vec_m.apply_matrix(&row(&c));
                Ok(KRepr {
                    f,
                    t,
                    constraints,
                    concave_constraints: Vec::new(),
                    evaluator,
                })
            }
        }
    }
}

/// K-representation of an atom against a pass layout.
///
/// Switched, the atom's concave group sits on the pass's convex side: the
/// natural system is built against the flipped layout and dualized, giving
/// the representation of the negated atom.
pub fn atom_k_repr(
    atom: &Arc<SaddleAtom>,
    layout: &mut VariableLayout,
    switched: bool,
) -> Result<KRepr> {
    if !switched {
        let evaluator = ConcaveEvaluator::Atom {
            atom: atom.clone(),
            switched: false,
        };
        return atom.build_natural(layout, evaluator);
    }

    let mut natural = layout.flipped();
    let inner_eval = ConcaveEvaluator::Atom {
        atom: atom.clone(),
        switched: false,
    };
    let repr = atom.build_natural(&mut natural, inner_eval)?;

    let pairing = stacked_side(&natural, Side::Concave);
    let mut dualize: HashSet<ExprId> = HashSet::new();
    let mut absorb = |e: &LinExpr| {
        for id in e.coeffs.keys() {
            if natural.side_of(*id).is_none() {
                dualize.insert(*id);
            }
        }
    };
    absorb(&repr.f);
    absorb(&repr.t);
    for c in &repr.constraints {
        for id in c.variable_sizes().keys() {
            if natural.side_of(*id).is_none() {
                dualize.insert(*id);
            }
        }
    }

    switch_repr(
        &repr,
        &pairing,
        &dualize,
        layout,
        ConcaveEvaluator::Atom {
            atom: atom.clone(),
            switched: true,
        },
    )
}

/// Pair an inner objective f_local' g + t_local against a concave
/// argument. Affine arguments pair directly through their canonical form;
/// a non-affine concave argument gets a precomposition variable bounded by
/// its hypograph, hoisted to the concave side.
fn pair_concave(
    f_local: &LinExpr,
    t_local: &LinExpr,
    concave: &Expr,
    layout: &mut VariableLayout,
) -> Result<(LinExpr, LinExpr, Vec<ConeConstraint>)> {
    if concave.is_affine() {
        let (b, c) = affine_to_canon(concave, layout, Side::Concave)?;
        let f = f_local.apply_matrix(&b);
        let t = t_local.add(&f_local.apply_matrix(&row(&c)));
        return Ok((f, t, Vec::new()));
    }

    let n = concave.shape().size();
    let canon = canonicalize(concave)?;
    let precomp = VariableData {
        id: ExprId::new(),
        shape: Shape::vector(n),
        name: None,
        nonneg: false,
        nonpos: false,
        local: false,
    };
    let w = LinExpr::variable(precomp.id, Shape::vector(n));
    let slice = layout.register(Side::Concave, precomp)?;

    let mut concave_constraints = canon.constraints;
    concave_constraints.push(ConeConstraint::NonNeg {
        a: canon.expr.add(&w.neg()),
    });

    let f = place_at(slice.start, f_local, layout.size(Side::Concave));
    Ok((f, t_local.clone(), concave_constraints))
}

/// Canonicalize an expression that must already be affine.
fn affine_lin(expr: &Expr) -> Result<LinExpr> {
    let canon = canonicalize(expr)?;
    if !canon.constraints.is_empty() {
        return Err(DspError::NonAffine(
            "expected an affine expression".to_string(),
        ));
    }
    Ok(canon.expr)
}

fn check_group_side(expr: &Expr, layout: &VariableLayout, side: Side) -> Result<()> {
    for v in expr.variable_data() {
        if layout.side_of(v.id) != Some(side) {
            return Err(DspError::NotDsp(format!(
                "variable `{}` is not on the expected side of the saddle \
                 partition",
                v.display_name()
            )));
        }
    }
    Ok(())
}

fn place_at(start: usize, expr: &LinExpr, total: usize) -> LinExpr {
    let mut parts = Vec::new();
    if start > 0 {
        parts.push(LinExpr::zeros(Shape::vector(start)));
    }
    parts.push(expr.clone());
    let end = start + expr.size();
    if total > end {
        parts.push(LinExpr::zeros(Shape::vector(total - end)));
    }
    LinExpr::vstack(&parts)
}

fn row(c: &DVector<f64>) -> nalgebra_sparse::CscMatrix<f64> {
    dense_to_csc(&DMatrix::from_row_slice(1, c.len(), c.as_slice()))
}

fn row_times(v: &DVector<f64>, expr: &Expr) -> Expr {
    Expr::MatMul(
        Arc::new(constant_matrix(1, v.len(), v.as_slice())),
        Arc::new(expr.clone()),
    )
}

fn flatten(m: &DMatrix<f64>) -> DVector<f64> {
    DVector::from_iterator(m.nrows() * m.ncols(), m.iter().copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{nonneg_variable, variable};

    fn data(e: &Expr) -> VariableData {
        match e {
            Expr::Variable(v) => v.clone(),
            _ => panic!("not a variable"),
        }
    }

    fn atom_of(e: &Expr) -> Arc<SaddleAtom> {
        match e {
            Expr::Saddle(a) => a.clone(),
            _ => panic!("not a saddle atom"),
        }
    }

    #[test]
    fn test_inner_rejects_nonlinear_args() {
        let x = variable(2);
        let y = variable(2);
        let nl = Expr::Exp(Arc::new(x));
        assert!(matches!(inner(&nl, &y), Err(DspError::Curvature(_))));
    }

    #[test]
    fn test_inner_rejects_shape_mismatch() {
        let x = variable(2);
        let y = variable(3);
        assert!(matches!(
            inner(&x, &y),
            Err(DspError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_saddle_inner_uncertified_sign_once() {
        let x = variable(2);
        let y = nonneg_variable(2);
        let e = saddle_inner(&x, &y).unwrap();
        let atom = atom_of(&e);
        // Only the first argument lacks a sign certificate.
        assert_eq!(atom.implicit_constraints().len(), 1);
        assert_eq!(atom.diagnostics().len(), 1);
    }

    #[test]
    fn test_saddle_inner_certified_signs_clean() {
        let x = nonneg_variable(2);
        let y = nonneg_variable(2);
        let e = saddle_inner(&x, &y).unwrap();
        let atom = atom_of(&e);
        assert!(atom.implicit_constraints().is_empty());
        assert!(atom.diagnostics().is_empty());
    }

    #[test]
    fn test_wlse_value() {
        // log(1 * e^0 + 1 * e^0) = log(2)
        let x = variable(2);
        let y = nonneg_variable(2);
        let e = weighted_log_sum_exp(&x, &y).unwrap();
        let atom = atom_of(&e);

        let mut assignment = Assignment::new();
        assignment.set_vector(x.variable_id().unwrap(), &[0.0, 0.0]);
        assignment.set_vector(y.variable_id().unwrap(), &[1.0, 1.0]);
        let v = atom.value(&assignment).unwrap();
        assert!((v - 2.0_f64.ln()).abs() < 1e-12);

        // log(1 * e^{log 2} + 1 * e^{log 2}) = log(4)
        let log2 = 2.0_f64.ln();
        assignment.set_vector(x.variable_id().unwrap(), &[log2, log2]);
        assignment.set_vector(y.variable_id().unwrap(), &[1.0, 1.0]);
        let v = atom.value(&assignment).unwrap();
        assert!((v - 4.0_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_quad_form_identity_is_sum_of_squares() {
        let x = variable(2);
        let p = variable((2, 2));
        let e = saddle_quad_form(&x, &p).unwrap();
        let atom = atom_of(&e);

        let mut assignment = Assignment::new();
        assignment.set_vector(x.variable_id().unwrap(), &[3.0, 4.0]);
        assignment.set_matrix(
            p.variable_id().unwrap(),
            &DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]),
        );
        let v = atom.value(&assignment).unwrap();
        assert!((v - 25.0).abs() < 1e-12);
    }

    #[test]
    fn test_bilinear_repr_is_literal_inner_product() {
        // inner(x, A @ y): f = (A' applied to x), t = 0.
        let x = variable(2);
        let y = variable(2);
        let a = constant_matrix(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let ay = Expr::MatMul(Arc::new(a), Arc::new(y.clone()));
        let e = inner(&x, &ay).unwrap();
        let atom = atom_of(&e);

        let mut layout = VariableLayout::new(vec![data(&x)], vec![data(&y)]).unwrap();
        let repr = atom_k_repr(&atom, &mut layout, false).unwrap();

        assert!(repr.constraints.is_empty());
        assert_eq!(repr.pairing_width(), 2);
        // f is affine in x with coefficient A'.
        let coeff = crate::sparse::csc_to_dense(&repr.f.coeffs[&x.variable_id().unwrap()]);
        assert_eq!(
            coeff,
            DMatrix::from_row_slice(2, 2, &[1.0, 3.0, 2.0, 4.0])
        );
        assert_eq!(repr.t.constant_vector()[0], 0.0);
    }

    #[test]
    fn test_wlse_repr_has_exp_cone() {
        let x = variable(2);
        let y = nonneg_variable(2);
        let e = weighted_log_sum_exp(&x, &y).unwrap();
        let atom = atom_of(&e);

        let mut layout = VariableLayout::new(vec![data(&x)], vec![data(&y)]).unwrap();
        let repr = atom_k_repr(&atom, &mut layout, false).unwrap();

        assert!(repr
            .constraints
            .iter()
            .any(|c| matches!(c, ConeConstraint::ExpCone { .. })));
        assert_eq!(repr.pairing_width(), 2);
    }

    #[test]
    fn test_switched_bilinear_pairs_against_convex_group() {
        let x = variable(2);
        let y = variable(2);
        let e = inner(&x, &y).unwrap();
        let atom = atom_of(&e);

        // Max-pass layout: y is the pass's convex group, x its concave one.
        let mut layout = VariableLayout::new(vec![data(&y)], vec![data(&x)]).unwrap();
        let repr = atom_k_repr(&atom, &mut layout, true).unwrap();

        // Representation of -x'y paired against x: f = -y.
        assert_eq!(repr.pairing_width(), 2);
        let coeff = crate::sparse::csc_to_dense(&repr.f.coeffs[&y.variable_id().unwrap()]);
        assert_eq!(coeff, DMatrix::from_element(2, 2, 0.0) - DMatrix::identity(2, 2));
    }
}
