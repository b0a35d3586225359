//! Conic dualization for saddle representations.
//!
//! Everything here is built on one identity: for a conic maximization
//!
//! ```text
//! max_v  c'v + k   s.t.  Av + b in K,
//! ```
//!
//! strong duality gives
//!
//! ```text
//! min_lam  lam'b + k   s.t.  A'lam + c = 0,  lam in K*.
//! ```
//!
//! `partial_dualize` introduces the multipliers and collects the `A'lam`
//! terms per variable; `dualize_over` assembles them into a new
//! representation, dualizing some variables to equalities and turning the
//! rest into pairing coefficients. Switching a representation and taking
//! the hypograph dual of a concave expression are both thin wrappers.

use std::collections::{HashMap, HashSet};

use nalgebra::DMatrix;

use crate::canon::{canonicalize, ConeConstraint, LinExpr};
use crate::error::{DspError, Result};
use crate::expr::{Expr, ExprId, Shape};
use crate::sparse::{csc_transpose, dense_to_csc};

use super::eval::ConcaveEvaluator;
use super::k_repr::KRepr;
use super::layout::{Side, VariableLayout};

/// Multipliers and transposed coefficient terms for a block of cone
/// constraints.
pub struct PartialDual {
    /// Dual-cone memberships of the fresh multiplier variables.
    pub memberships: Vec<ConeConstraint>,
    /// Per-variable accumulated `A'lam` terms; each entry has the width of
    /// the corresponding variable.
    pub lambda_terms: HashMap<ExprId, LinExpr>,
    /// The scalar `lam'b` term over all blocks.
    pub offset: LinExpr,
}

/// Introduce a multiplier per constraint block and collect the transposed
/// products. The dual cone of each block:
/// zero -> free, nonneg / SOC / PSD -> self-dual, and the dual exponential
/// cone written through the primal as (u, v, w) in Kexp* iff
/// (u - v, -u, w) in Kexp.
pub fn partial_dualize(constraints: &[ConeConstraint]) -> Result<PartialDual> {
    let mut memberships = Vec::new();
    let mut lambda_terms: HashMap<ExprId, LinExpr> = HashMap::new();
    let mut offset = LinExpr::scalar(0.0);

    for block in constraints {
        let stacked = match block {
            ConeConstraint::Zero { a }
            | ConeConstraint::NonNeg { a }
            | ConeConstraint::Psd { a, .. } => a.clone(),
            ConeConstraint::Soc { t, x } => LinExpr::vstack(&[t.clone(), x.clone()]),
            ConeConstraint::ExpCone { x, y, z } => {
                LinExpr::vstack(&[x.clone(), y.clone(), z.clone()])
            }
        };
        let width = stacked.size();
        if width == 0 {
            continue;
        }

        let lam = LinExpr::variable(ExprId::new(), Shape::vector(width));

        for (var_id, coeff) in &stacked.coeffs {
            let term = lam.apply_matrix(&csc_transpose(coeff));
            lambda_terms
                .entry(*var_id)
                .and_modify(|acc| *acc = acc.add(&term))
                .or_insert(term);
        }

        let b = stacked.constant_vector();
        let b_row = dense_to_csc(&DMatrix::from_row_slice(1, width, b.as_slice()));
        offset = offset.add(&lam.apply_matrix(&b_row));

        match block {
            ConeConstraint::Zero { .. } => {}
            ConeConstraint::NonNeg { .. } => {
                memberships.push(ConeConstraint::NonNeg { a: lam });
            }
            ConeConstraint::Soc { .. } => {
                let rest: Vec<usize> = (1..width).collect();
                memberships.push(ConeConstraint::Soc {
                    t: lam.select_rows(&[0]),
                    x: lam.select_rows(&rest),
                });
            }
            ConeConstraint::ExpCone { .. } => {
                let n = width / 3;
                let lx = lam.select_rows(&(0..n).collect::<Vec<_>>());
                let ly = lam.select_rows(&(n..2 * n).collect::<Vec<_>>());
                let lz = lam.select_rows(&(2 * n..3 * n).collect::<Vec<_>>());
                memberships.push(ConeConstraint::ExpCone {
                    x: lx.add(&ly.neg()),
                    y: lx.neg(),
                    z: lz,
                });
            }
            ConeConstraint::Psd { n, .. } => {
                memberships.push(ConeConstraint::Psd { a: lam, n: *n });
            }
        }
    }

    Ok(PartialDual {
        memberships,
        lambda_terms,
        offset,
    })
}

/// A dualized maximization: min_lam f' g + t over the emitted constraints,
/// with g the target side's stacked vector.
pub struct DualizedMax {
    pub f: LinExpr,
    pub t: LinExpr,
    pub constraints: Vec<ConeConstraint>,
}

/// Dualize `max over the `dualize` set of obj_f' pairing + obj_t` subject
/// to `constraints`.
///
/// Variables in `dualize` become zero-cone equalities on their dual terms;
/// every other variable must sit on `target_side` of `target` and its dual
/// term becomes that slice of the new pairing coefficient.
pub fn dualize_over(
    obj_f: &LinExpr,
    pairing: &LinExpr,
    obj_t: &LinExpr,
    constraints: &[ConeConstraint],
    dualize: &HashSet<ExprId>,
    target: &VariableLayout,
    target_side: Side,
) -> Result<DualizedMax> {
    let pd = partial_dualize(constraints)?;

    // Universe of variables carrying an objective coefficient or a
    // multiplier term.
    let mut universe: Vec<ExprId> = Vec::new();
    universe.extend(obj_f.coeffs.keys().copied());
    universe.extend(obj_t.coeffs.keys().copied());
    universe.extend(pd.lambda_terms.keys().copied());
    universe.sort();
    universe.dedup();

    let mut out_constraints = pd.memberships;
    let mut kept: HashMap<ExprId, LinExpr> = HashMap::new();

    for var_id in universe {
        let width = obj_f
            .coeffs
            .get(&var_id)
            .map(|c| c.ncols())
            .or_else(|| obj_t.coeffs.get(&var_id).map(|c| c.ncols()))
            .or_else(|| pd.lambda_terms.get(&var_id).map(|t| t.size()));
        let width = match width {
            Some(w) => w,
            None => continue,
        };

        let mut term = match pd.lambda_terms.get(&var_id) {
            Some(t) => t.clone(),
            None => LinExpr::zeros(Shape::vector(width)),
        };
        // Linear objective coefficient (a constant vector).
        if let Some(tau) = obj_t.coeffs.get(&var_id) {
            let tau_col = crate::sparse::csc_to_dense(&csc_transpose(tau));
            term = term.add(&LinExpr::constant(tau_col));
        }
        // Bilinear coefficient through the pairing vector.
        if let Some(c) = obj_f.coeffs.get(&var_id) {
            term = term.add(&pairing.apply_matrix(&csc_transpose(c)));
        }

        if dualize.contains(&var_id) {
            out_constraints.push(ConeConstraint::Zero { a: term });
        } else {
            if !target.contains(target_side, var_id) {
                return Err(DspError::UnknownVariable(format!("var{}", var_id.raw())));
            }
            kept.insert(var_id, term);
        }
    }

    // Stack pairing coefficients in the target side's slice order.
    let mut parts = Vec::new();
    for v in target.vars(target_side) {
        match kept.remove(&v.id) {
            Some(term) => parts.push(term),
            None => parts.push(LinExpr::zeros(Shape::vector(v.shape.size()))),
        }
    }
    let f = LinExpr::vstack(&parts);

    // New offset: lam'b plus the objective's constant parts.
    let mut t = pd.offset;
    t = t.add(&LinExpr::scalar(obj_t.constant_vector()[0]));
    if obj_f.size() > 0 {
        let f0 = obj_f.constant_vector();
        let f0_row = dense_to_csc(&DMatrix::from_row_slice(1, f0.len(), f0.as_slice()));
        t = t.add(&pairing.apply_matrix(&f0_row));
    }

    Ok(DualizedMax {
        f,
        t,
        constraints: out_constraints,
    })
}

/// Switch a representation: from F(x, y) paired against the concave side,
/// produce the representation of -F with the two roles exchanged.
///
/// `pairing` is the old concave side's stacked vector (kept symbolic: it
/// becomes the new convex group); `dualize` holds the representation's
/// auxiliaries, which are eliminated; the old convex group survives as the
/// new pairing slices. `target` is the new pass layout, whose concave side
/// is the old convex group.
pub fn switch_repr(
    repr: &KRepr,
    pairing: &LinExpr,
    dualize: &HashSet<ExprId>,
    target: &VariableLayout,
    evaluator: ConcaveEvaluator,
) -> Result<KRepr> {
    let dm = dualize_over(
        &repr.f.neg(),
        pairing,
        &repr.t.neg(),
        &repr.constraints,
        dualize,
        target,
        Side::Concave,
    )?;

    // Constraints previously hoisted to the concave side now bind the new
    // convex group and join the inner minimization.
    let mut constraints = dm.constraints;
    constraints.extend(repr.concave_constraints.iter().cloned());

    Ok(KRepr {
        f: dm.f,
        t: dm.t,
        constraints,
        concave_constraints: Vec::new(),
        evaluator,
    })
}

/// K-representation of a concave expression of the concave group alone.
///
/// The expression is canonicalized (its hypograph), then the auxiliary
/// variables are dualized out with the concave group kept as the pairing
/// vector.
pub fn k_repr_concave(expr: &Expr, layout: &VariableLayout) -> Result<KRepr> {
    let canon = canonicalize(expr)?;

    let mut vars: HashSet<ExprId> = canon.expr.coeffs.keys().copied().collect();
    for c in &canon.constraints {
        vars.extend(c.variable_sizes().keys().copied());
    }

    let mut dualize = HashSet::new();
    for id in vars {
        match layout.side_of(id) {
            Some(Side::Concave) => {}
            Some(Side::Convex) => {
                return Err(DspError::NotDsp(
                    "expected an expression of the concave group only".to_string(),
                ));
            }
            None => {
                dualize.insert(id);
            }
        }
    }

    let empty = LinExpr::zeros(Shape::vector(0));
    let dm = dualize_over(
        &empty,
        &empty,
        &canon.expr,
        &canon.constraints,
        &dualize,
        layout,
        Side::Concave,
    )?;

    Ok(KRepr {
        f: dm.f,
        t: dm.t,
        constraints: dm.constraints,
        concave_constraints: Vec::new(),
        evaluator: ConcaveEvaluator::Expr(expr.clone()),
    })
}

/// The stacked vector of one side of a layout, as a linear expression.
pub fn stacked_side(layout: &VariableLayout, side: Side) -> LinExpr {
    let parts: Vec<LinExpr> = layout
        .vars(side)
        .iter()
        .map(|v| LinExpr::variable(v.id, Shape::vector(v.shape.size())))
        .collect();
    LinExpr::vstack(&parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{variable, Expr, VariableData};
    use std::sync::Arc;

    fn data(e: &Expr) -> VariableData {
        match e {
            Expr::Variable(v) => v.clone(),
            _ => panic!("not a variable"),
        }
    }

    #[test]
    fn test_partial_dualize_nonneg_block() {
        // x + 1 >= 0 with x scalar: lam >= 0, term = lam, offset = lam.
        let x = variable(());
        let a = LinExpr::variable(x.variable_id().unwrap(), Shape::scalar())
            .add(&LinExpr::scalar(1.0));
        let pd = partial_dualize(&[ConeConstraint::NonNeg { a }]).unwrap();

        assert_eq!(pd.memberships.len(), 1);
        let term = &pd.lambda_terms[&x.variable_id().unwrap()];
        assert_eq!(term.size(), 1);
        assert_eq!(pd.offset.coeffs.len(), 1);
    }

    #[test]
    fn test_partial_dualize_exp_block_is_single_cone() {
        let x = variable(2);
        let lx = LinExpr::variable(x.variable_id().unwrap(), Shape::vector(2));
        let ones = LinExpr::constant(DMatrix::from_element(2, 1, 1.0));
        let pd = partial_dualize(&[ConeConstraint::ExpCone {
            x: lx.clone(),
            y: ones,
            z: lx,
        }])
        .unwrap();
        assert_eq!(pd.memberships.len(), 1);
        assert!(matches!(pd.memberships[0], ConeConstraint::ExpCone { .. }));
    }

    #[test]
    fn test_k_repr_concave_affine() {
        // expr = y_0 + 2, pairing against y of width 2: f = [1, 0], t = 2.
        let y = variable(2);
        let layout = VariableLayout::new(vec![], vec![data(&y)]).unwrap();
        let expr = Expr::Add(
            Arc::new(Expr::Index(
                Arc::new(y),
                crate::expr::IndexSpec::range(0, 1),
            )),
            Arc::new(crate::expr::constant(2.0)),
        );
        let repr = k_repr_concave(&expr, &layout).unwrap();

        assert!(repr.constraints.is_empty());
        assert!(repr.f.is_constant());
        let f = repr.f.constant_vector();
        assert_eq!(f.as_slice(), &[1.0, 0.0]);
        assert_eq!(repr.t.constant_vector()[0], 2.0);
    }

    #[test]
    fn test_k_repr_concave_rejects_convex_group() {
        let x = variable(2);
        let y = variable(2);
        let layout = VariableLayout::new(vec![data(&x)], vec![data(&y)]).unwrap();
        let result = k_repr_concave(&x, &layout);
        assert!(matches!(result, Err(DspError::NotDsp(_))));
    }

    #[test]
    fn test_k_repr_concave_log_emits_exp_cone() {
        let y = variable(());
        let layout = VariableLayout::new(vec![], vec![data(&y)]).unwrap();
        let expr = Expr::Log(Arc::new(y));
        let repr = k_repr_concave(&expr, &layout).unwrap();

        // One dual-cone membership plus one equality for the hypograph aux.
        assert_eq!(repr.constraints.len(), 2);
        assert!(repr
            .constraints
            .iter()
            .any(|c| matches!(c, ConeConstraint::ExpCone { .. })));
        assert!(repr
            .constraints
            .iter()
            .any(|c| matches!(c, ConeConstraint::Zero { .. })));
    }

    #[test]
    fn test_stacked_side_order() {
        let y = variable(2);
        let z = variable(());
        let layout = VariableLayout::new(vec![], vec![data(&y), data(&z)]).unwrap();
        let g = stacked_side(&layout, Side::Concave);
        assert_eq!(g.size(), 3);
        assert_eq!(g.coeffs.len(), 2);
    }
}
