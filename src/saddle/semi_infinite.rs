//! Elimination of an inner maximization by conic duality.
//!
//! Given a representation of F(x, y) and cone constraints on the concave
//! group, `dualize_sup` replaces `sup_y F(x, y)` with an explicit convex
//! program in x, the representation auxiliaries and fresh multipliers.
//! The same machinery canonicalizes inner-extremum atoms when they appear
//! inside an ordinary convex problem, and evaluates them numerically.

use std::sync::Arc;

use nalgebra::DMatrix;

use crate::canon::{
    canonicalize_with, CanonContext, ConeConstraint, LinExpr, SaddleCanonTable,
};
use crate::constraints::Constraint;
use crate::error::{DspError, Result};
use crate::expr::{Expr, Shape, VariableData};
use crate::solver::{solve_cone_program, Settings};

use super::eval::Assignment;
use super::extremum::{ExtremumMode, SaddleExtremum};
use super::k_repr::KRepr;
use super::layout::{Side, VariableLayout};
use super::parser::parse_saddle;
use super::switch::partial_dualize;

/// Dualize the concave group out of `sup over it of the represented
/// function`, subject to `blocks` (cone constraints on the concave group
/// and any of its auxiliaries).
///
/// Returns the value as a linear expression in the convex group, the
/// representation auxiliaries and the fresh multipliers, together with the
/// cone constraints that make it tight.
pub fn dualize_sup(
    repr: &KRepr,
    layout: &VariableLayout,
    blocks: &[ConeConstraint],
) -> Result<(LinExpr, Vec<ConeConstraint>)> {
    let repr = repr.pad_to(layout.size(Side::Concave));

    let mut all_blocks: Vec<ConeConstraint> = blocks.to_vec();
    all_blocks.extend(repr.concave_constraints.iter().cloned());
    let mut pd = partial_dualize(&all_blocks)?;

    let mut constraints = repr.constraints.clone();
    constraints.extend(pd.memberships);

    // Stationarity per concave-group variable: A'lam + f_slice = 0.
    for v in layout.vars(Side::Concave) {
        let slice = layout.slice_of(Side::Concave, v.id)?;
        let rows: Vec<usize> = slice.collect();
        let mut term = match pd.lambda_terms.remove(&v.id) {
            Some(t) => t,
            None => LinExpr::zeros(Shape::vector(rows.len())),
        };
        term = term.add(&repr.f.select_rows(&rows));
        constraints.push(ConeConstraint::Zero { a: term });
    }

    // Remaining multiplier terms belong to block auxiliaries, maximized
    // with zero objective coefficient.
    for (var_id, term) in pd.lambda_terms {
        if layout.side_of(var_id).is_some() {
            return Err(DspError::NotDsp(format!(
                "constraint on the maximizing group mentions `var{}` of the \
                 other group",
                var_id.raw()
            )));
        }
        constraints.push(ConeConstraint::Zero { a: term });
    }

    let objective = repr.t.add(&pd.offset);
    Ok((objective, constraints))
}

/// Lower a DCP constraint to cone constraints. Auxiliary constraints from
/// nonlinear parts are included, as are diagnostics picked up by any
/// extremum canonicalization.
pub(crate) fn constraint_to_cones(
    constraint: &Constraint,
    table: &SaddleCanonTable,
) -> Result<(Vec<ConeConstraint>, Vec<crate::error::Diagnostic>)> {
    match constraint {
        Constraint::Zero(e) => {
            let canon = canonicalize_with(e.as_ref(), table)?;
            if !canon.constraints.is_empty() {
                return Err(DspError::NonAffine(
                    "equality constraints must be affine".to_string(),
                ));
            }
            Ok((
                vec![ConeConstraint::Zero { a: canon.expr }],
                canon.diagnostics,
            ))
        }
        Constraint::NonNeg(e) => {
            let mut canon = canonicalize_with(e.as_ref(), table)?;
            canon
                .constraints
                .push(ConeConstraint::NonNeg { a: canon.expr });
            Ok((canon.constraints, canon.diagnostics))
        }
        Constraint::Soc { t, x } => {
            let ct = canonicalize_with(t.as_ref(), table)?;
            let cx = canonicalize_with(x.as_ref(), table)?;
            if !ct.constraints.is_empty() || !cx.constraints.is_empty() {
                return Err(DspError::NonAffine(
                    "second-order cone constraints must be affine".to_string(),
                ));
            }
            Ok((
                vec![ConeConstraint::Soc {
                    t: ct.expr,
                    x: cx.expr,
                }],
                Vec::new(),
            ))
        }
    }
}

/// The canonicalization table used by the problem drivers: both extremum
/// modes lower through conic duality.
pub fn default_saddle_canon_table() -> SaddleCanonTable {
    let mut table = SaddleCanonTable::empty();
    table.register(ExtremumMode::Sup, canonicalize_extremum);
    table.register(ExtremumMode::Inf, canonicalize_extremum);
    table
}

/// Everything needed to stand in for an inner extremum: its value as a
/// linear expression plus supporting cone constraints.
struct LoweredExtremum {
    value: LinExpr,
    constraints: Vec<ConeConstraint>,
    diagnostics: Vec<crate::error::Diagnostic>,
}

/// Lower `sup` (or, negated, `inf`) over the extremum's local variables.
fn lower_extremum(ext: &SaddleExtremum) -> Result<LoweredExtremum> {
    let free = ext.free_vars();
    let mut layout = VariableLayout::new(free, ext.locals().to_vec())?;

    // An infimum over its locals is a negated supremum of the negated
    // objective, which swaps the objective's curvature roles.
    let objective = match ext.mode() {
        ExtremumMode::Sup => ext.objective().clone(),
        ExtremumMode::Inf => Expr::Neg(Arc::new(ext.objective().clone())),
    };
    let parsed = parse_saddle(&objective, &mut layout)?;

    // Constraints on the locals join the inner maximization; implicit atom
    // domains join whichever group their variables sit on. Nested extrema
    // are not allowed here, so an empty table suffices.
    let empty = SaddleCanonTable::empty();
    let mut blocks = Vec::new();
    for c in ext.constraints() {
        let (cones, _) = constraint_to_cones(c, &empty)?;
        blocks.extend(cones);
    }
    let mut outer = Vec::new();
    for c in &parsed.implicit {
        let (cones, _) = constraint_to_cones(c, &empty)?;
        let concave_side = c
            .variables()
            .iter()
            .any(|id| layout.side_of(*id) == Some(Side::Concave));
        if concave_side {
            blocks.extend(cones);
        } else {
            outer.extend(cones);
        }
    }

    let (value, mut constraints) = dualize_sup(&parsed.repr, &layout, &blocks)?;
    constraints.extend(outer);

    let value = match ext.mode() {
        ExtremumMode::Sup => value,
        ExtremumMode::Inf => value.neg(),
    };

    Ok(LoweredExtremum {
        value,
        constraints,
        diagnostics: parsed.diagnostics,
    })
}

/// Canonicalization hook for `Expr::Extremum` inside an ordinary convex
/// problem.
pub fn canonicalize_extremum(ext: &SaddleExtremum, ctx: &mut CanonContext) -> Result<LinExpr> {
    let lowered = lower_extremum(ext)?;
    ctx.constraints.extend(lowered.constraints);
    ctx.diagnostics.extend(lowered.diagnostics);
    Ok(lowered.value)
}

/// Numeric value of an extremum at a full assignment of its free
/// variables: the lowered program is solved with the free variables pinned.
pub fn extremum_value(ext: &SaddleExtremum, assignment: &Assignment) -> Result<f64> {
    let lowered = lower_extremum(ext)?;

    let mut constraints = lowered.constraints;
    for v in ext.free_vars() {
        let value = assignment
            .get(v.id)
            .ok_or_else(|| DspError::UnsetValue(v.display_name()))?;
        pin_variable(&mut constraints, &v, value);
    }

    let solution = solve_cone_program(&lowered.value, &constraints, &Settings::default())?;
    solution.value.ok_or_else(|| {
        DspError::Solver(format!(
            "inner extremum did not solve: {:?}",
            solution.status
        ))
    })
}

fn pin_variable(constraints: &mut Vec<ConeConstraint>, var: &VariableData, value: &DMatrix<f64>) {
    let n = var.shape.size();
    let v = LinExpr::variable(var.id, Shape::vector(n));
    let col = DMatrix::from_iterator(n, 1, value.iter().copied());
    constraints.push(ConeConstraint::Zero {
        a: v.add(&LinExpr::constant(col).neg()),
    });
}
