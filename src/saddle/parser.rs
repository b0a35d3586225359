//! Sign-tracked parsing of saddle expressions.
//!
//! The parser walks a saddle objective and produces one K-representation
//! against the pass layout. Sums recurse, scalar multiples fold into a
//! running sign-and-scale factor, atoms dispatch on whether their concave
//! group sits on the pass's concave side (natural) or its convex side
//! (switched), and one-sided subexpressions reduce to DCP canonicalization
//! on the appropriate side. Atom representations are memoized per
//! (atom, switched) pair within a parse.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::canon::{canonicalize, LinExpr};
use crate::constraints::Constraint;
use crate::error::{Diagnostic, DspError, Result};
use crate::expr::{constant, Expr, ExprId, Shape, VariableData};
use crate::sparse::csc_to_dense;

use super::atoms::{atom_k_repr, SaddleAtom};
use super::eval::ConcaveEvaluator;
use super::k_repr::KRepr;
use super::layout::{Side, VariableLayout};
use super::switch::k_repr_concave;

/// Result of parsing a saddle objective.
pub struct ParsedSaddle {
    /// Representation of the objective against the pass layout.
    pub repr: KRepr,
    /// Implicit domain constraints collected from the atoms.
    pub implicit: Vec<Constraint>,
    /// Diagnostics collected from the atoms, one set per distinct atom.
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse a saddle objective against a pass layout.
pub fn parse_saddle(expr: &Expr, layout: &mut VariableLayout) -> Result<ParsedSaddle> {
    let mut parser = Parser {
        memo: HashMap::new(),
        seen_atoms: HashSet::new(),
        implicit: Vec::new(),
        diagnostics: Vec::new(),
    };
    let repr = parser.parse(expr, 1.0, layout)?;
    let repr = repr.pad_to(layout.size(Side::Concave));
    Ok(ParsedSaddle {
        repr,
        implicit: parser.implicit,
        diagnostics: parser.diagnostics,
    })
}

struct Parser {
    memo: HashMap<(ExprId, bool), KRepr>,
    seen_atoms: HashSet<ExprId>,
    implicit: Vec<Constraint>,
    diagnostics: Vec<Diagnostic>,
}

impl Parser {
    fn parse(&mut self, expr: &Expr, scale: f64, layout: &mut VariableLayout) -> Result<KRepr> {
        match expr {
            Expr::Add(a, b) => {
                let ra = self.parse(a, scale, layout)?;
                let rb = self.parse(b, scale, layout)?;
                Ok(ra.add(&rb))
            }
            Expr::Neg(a) => self.parse(a, -scale, layout),
            Expr::Mul(a, b) => {
                if let Some(k) = a.constant_value().and_then(|v| v.as_scalar()) {
                    return self.parse(b, scale * k, layout);
                }
                if let Some(k) = b.constant_value().and_then(|v| v.as_scalar()) {
                    return self.parse(a, scale * k, layout);
                }
                Err(DspError::NotDsp(
                    "saddle expressions may only be scaled by constants".to_string(),
                ))
            }
            Expr::Saddle(atom) => self.parse_atom(atom, scale, layout),
            other => self.parse_leaf(other, scale, layout),
        }
    }

    fn parse_atom(
        &mut self,
        atom: &Arc<SaddleAtom>,
        scale: f64,
        layout: &mut VariableLayout,
    ) -> Result<KRepr> {
        let conv_side = group_side(&atom.convex_vars(), &atom.concave_vars(), layout)?;
        let switched = match (scale > 0.0, conv_side) {
            (true, Side::Convex) => false,
            (false, Side::Concave) => true,
            _ => {
                return Err(DspError::NotDsp(
                    "saddle atom appears with the wrong sign for its \
                     variable roles"
                        .to_string(),
                ))
            }
        };

        if self.seen_atoms.insert(atom.id()) {
            self.implicit.extend(atom.implicit_constraints().iter().cloned());
            self.diagnostics.extend(atom.diagnostics().iter().cloned());
        }

        let repr = match self.memo.get(&(atom.id(), switched)) {
            Some(r) => r.clone(),
            None => {
                let r = atom_k_repr(atom, layout, switched)?;
                self.memo.insert((atom.id(), switched), r.clone());
                r
            }
        };
        Ok(repr.scale(scale.abs()))
    }

    fn parse_leaf(&mut self, expr: &Expr, scale: f64, layout: &mut VariableLayout) -> Result<KRepr> {
        if contains_saddle(expr) {
            return Err(DspError::NotDsp(
                "saddle atoms may only be combined by sums and constant \
                 scalings"
                    .to_string(),
            ));
        }

        let scaled = scaled_expr(scale, expr);
        let vars = expr.variable_data();
        let mut on_convex = false;
        let mut on_concave = false;
        for v in &vars {
            match layout.side_of(v.id) {
                Some(Side::Convex) => on_convex = true,
                Some(Side::Concave) => on_concave = true,
                None => return Err(DspError::UnknownVariable(v.display_name())),
            }
        }

        if on_concave && !on_convex {
            if !scaled.is_concave() {
                return Err(DspError::Curvature(
                    "expression of the concave group must be concave".to_string(),
                ));
            }
            return k_repr_concave(&scaled, layout);
        }

        if on_convex && on_concave {
            if !scaled.is_affine() {
                return Err(DspError::NotDsp(
                    "a term mixing both groups must be affine or a saddle \
                     atom"
                        .to_string(),
                ));
            }
            return split_affine(&scaled, layout);
        }

        // Convex group only (or fully constant): lands in the offset.
        if !scaled.is_convex() {
            return Err(DspError::Curvature(
                "expression of the convex group must be convex".to_string(),
            ));
        }
        let canon = canonicalize(&scaled)?;
        Ok(KRepr {
            f: LinExpr::zeros(Shape::vector(0)),
            t: canon.expr,
            constraints: canon.constraints,
            concave_constraints: Vec::new(),
            evaluator: ConcaveEvaluator::Expr(scaled),
        })
    }
}

/// Split an affine expression mixing both groups: concave-group
/// coefficients become constant pairing entries, the rest is offset.
fn split_affine(expr: &Expr, layout: &VariableLayout) -> Result<KRepr> {
    let canon = canonicalize(expr)?;
    if !canon.constraints.is_empty() {
        return Err(DspError::NonAffine(
            "expected an affine expression".to_string(),
        ));
    }

    let width = layout.size(Side::Concave);
    let mut f = LinExpr::zeros(Shape::vector(width));
    let mut t = LinExpr::scalar(canon.expr.constant_vector()[0]);

    for (var_id, coeff) in &canon.expr.coeffs {
        match layout.side_of(*var_id) {
            Some(Side::Concave) => {
                let slice = layout.slice_of(Side::Concave, *var_id)?;
                let col = csc_to_dense(coeff).transpose();
                let mut parts = Vec::new();
                if slice.start > 0 {
                    parts.push(LinExpr::zeros(Shape::vector(slice.start)));
                }
                parts.push(LinExpr::constant(col));
                if width > slice.end {
                    parts.push(LinExpr::zeros(Shape::vector(width - slice.end)));
                }
                f = f.add(&LinExpr::vstack(&parts));
            }
            Some(Side::Convex) => {
                let term = LinExpr {
                    coeffs: [(*var_id, coeff.clone())].into_iter().collect(),
                    constant: nalgebra::DMatrix::zeros(1, 1),
                    shape: Shape::scalar(),
                };
                t = t.add(&term);
            }
            None => {
                return Err(DspError::UnknownVariable(format!("var{}", var_id.raw())));
            }
        }
    }

    Ok(KRepr {
        f,
        t,
        constraints: Vec::new(),
        concave_constraints: Vec::new(),
        evaluator: ConcaveEvaluator::Expr(expr.clone()),
    })
}

/// Which side an atom's convex group sits on in this pass.
fn group_side(
    convex_vars: &[VariableData],
    concave_vars: &[VariableData],
    layout: &VariableLayout,
) -> Result<Side> {
    let side_of_group = |vars: &[VariableData]| -> Result<Option<Side>> {
        let mut side = None;
        for v in vars {
            let s = layout
                .side_of(v.id)
                .ok_or_else(|| DspError::UnknownVariable(v.display_name()))?;
            match side {
                None => side = Some(s),
                Some(prev) if prev != s => {
                    return Err(DspError::NotDsp(
                        "an atom argument mixes variables of both groups".to_string(),
                    ))
                }
                _ => {}
            }
        }
        Ok(side)
    };

    let conv = side_of_group(convex_vars)?;
    let conc = side_of_group(concave_vars)?;
    match (conv, conc) {
        (Some(a), Some(b)) if a == b => Err(DspError::NotDsp(
            "both atom arguments draw from the same variable group".to_string(),
        )),
        (Some(a), _) => Ok(a),
        (None, Some(b)) => Ok(b.flip()),
        (None, None) => Err(DspError::NotDsp(
            "saddle atom has no variables".to_string(),
        )),
    }
}

fn contains_saddle(expr: &Expr) -> bool {
    match expr {
        Expr::Saddle(_) | Expr::Extremum(_) => true,
        Expr::Variable(_) | Expr::Constant(_) => false,
        Expr::Add(a, b) | Expr::Mul(a, b) | Expr::MatMul(a, b) => {
            contains_saddle(a) || contains_saddle(b)
        }
        Expr::Neg(a)
        | Expr::Sum(a)
        | Expr::Index(a, _)
        | Expr::Transpose(a)
        | Expr::Exp(a)
        | Expr::Log(a)
        | Expr::Norm2(a)
        | Expr::SumSquares(a) => contains_saddle(a),
        Expr::Maximum(exprs) | Expr::Minimum(exprs) => exprs.iter().any(|e| contains_saddle(e)),
    }
}

fn scaled_expr(scale: f64, expr: &Expr) -> Expr {
    if (scale - 1.0).abs() < f64::EPSILON {
        expr.clone()
    } else {
        Expr::Mul(Arc::new(constant(scale)), Arc::new(expr.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{nonneg_variable, variable};
    use crate::saddle::atoms::{inner, weighted_log_sum_exp};

    fn data(e: &Expr) -> VariableData {
        match e {
            Expr::Variable(v) => v.clone(),
            _ => panic!("not a variable"),
        }
    }

    #[test]
    fn test_parse_sum_of_atom_and_sides() {
        // inner(x, y) + x_0 + y_0
        let x = variable(2);
        let y = variable(2);
        let ip = inner(&x, &y).unwrap();
        let expr = Expr::Add(
            Arc::new(Expr::Add(
                Arc::new(ip),
                Arc::new(Expr::Index(
                    Arc::new(x.clone()),
                    crate::expr::IndexSpec::range(0, 1),
                )),
            )),
            Arc::new(Expr::Index(
                Arc::new(y.clone()),
                crate::expr::IndexSpec::range(0, 1),
            )),
        );

        let mut layout = VariableLayout::new(vec![data(&x)], vec![data(&y)]).unwrap();
        let parsed = parse_saddle(&expr, &mut layout).unwrap();

        assert_eq!(parsed.repr.pairing_width(), 2);
        assert!(parsed.diagnostics.is_empty());
        // The y_0 term contributes a constant 1 at the first pairing slot.
        let f0 = parsed.repr.f.constant_vector();
        assert_eq!(f0.as_slice(), &[1.0, 0.0]);
    }

    #[test]
    fn test_parse_rejects_wrong_sign_atom() {
        let x = variable(2);
        let y = variable(2);
        let ip = inner(&x, &y).unwrap();
        let expr = Expr::Neg(Arc::new(ip));

        let mut layout = VariableLayout::new(vec![data(&x)], vec![data(&y)]).unwrap();
        let result = parse_saddle(&expr, &mut layout);
        assert!(matches!(result, Err(DspError::NotDsp(_))));
    }

    #[test]
    fn test_parse_negated_atom_in_flipped_pass() {
        // In the pass where y minimizes, -inner(x, y) is the right sign.
        let x = variable(2);
        let y = variable(2);
        let ip = inner(&x, &y).unwrap();
        let expr = Expr::Neg(Arc::new(ip));

        let mut layout = VariableLayout::new(vec![data(&y)], vec![data(&x)]).unwrap();
        let parsed = parse_saddle(&expr, &mut layout).unwrap();
        assert_eq!(parsed.repr.pairing_width(), 2);
    }

    #[test]
    fn test_parse_collects_atom_diagnostics_once() {
        let x = variable(2);
        let y = variable(2);
        let atom = weighted_log_sum_exp(&x, &y).unwrap();
        // The atom appears twice in the objective.
        let expr = Expr::Add(
            Arc::new(atom.clone()),
            Arc::new(Expr::Mul(Arc::new(constant(2.0)), Arc::new(atom))),
        );

        let mut layout = VariableLayout::new(vec![data(&x)], vec![data(&y)]).unwrap();
        let parsed = parse_saddle(&expr, &mut layout).unwrap();
        assert_eq!(parsed.diagnostics.len(), 1);
        assert_eq!(parsed.implicit.len(), 1);
    }

    #[test]
    fn test_parse_rejects_nonconvex_convex_side_term() {
        let x = variable(2);
        let y = nonneg_variable(2);
        let ip = inner(&x, &y).unwrap();
        // -sum_squares(x) is concave but sits on the convex side.
        let bad = Expr::Neg(Arc::new(Expr::SumSquares(Arc::new(x.clone()))));
        let expr = Expr::Add(Arc::new(ip), Arc::new(bad));

        let mut layout = VariableLayout::new(vec![data(&x)], vec![data(&y)]).unwrap();
        let result = parse_saddle(&expr, &mut layout);
        assert!(matches!(result, Err(DspError::Curvature(_))));
    }
}
