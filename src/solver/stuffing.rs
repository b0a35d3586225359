//! Matrix stuffing: converts cone-constrained linear programs to solver
//! format.
//!
//! This module builds the matrices (q, A, b) and cone specifications
//! required by Clarabel from a linear objective and cone constraint blocks.

use std::collections::HashMap;

use nalgebra_sparse::CscMatrix;

use crate::canon::{ConeConstraint, LinExpr};
use crate::error::{DspError, Result};
use crate::expr::ExprId;
use crate::sparse::csc_from_triplets;

/// Cone dimensions for Clarabel.
#[derive(Debug, Clone, Default)]
pub struct ConeDims {
    /// Number of zero cone (equality) constraints.
    pub zero: usize,
    /// Number of nonnegative cone constraints.
    pub nonneg: usize,
    /// Second-order cone dimensions (each entry is the cone dimension).
    pub soc: Vec<usize>,
    /// Number of exponential cones (each is 3D).
    pub exp: usize,
}

impl ConeDims {
    /// Total number of constraint rows.
    pub fn total(&self) -> usize {
        self.zero + self.nonneg + self.soc.iter().sum::<usize>() + self.exp * 3
    }
}

/// Mapping from variable IDs to column indices in the optimization variable.
#[derive(Debug, Clone)]
pub struct VariableMap {
    /// Map from variable ID to (start_col, size).
    pub id_to_col: HashMap<ExprId, (usize, usize)>,
    /// Total number of optimization variables.
    pub total_vars: usize,
}

impl VariableMap {
    /// Create from a list of (variable_id, size) pairs.
    pub fn from_sizes(vars: &[(ExprId, usize)]) -> Self {
        let mut id_to_col = HashMap::new();
        let mut offset = 0;

        for (var_id, size) in vars {
            id_to_col.insert(*var_id, (offset, *size));
            offset += size;
        }

        VariableMap {
            id_to_col,
            total_vars: offset,
        }
    }

    /// Get the column range for a variable.
    pub fn get(&self, var_id: ExprId) -> Option<(usize, usize)> {
        self.id_to_col.get(&var_id).copied()
    }
}

/// Stuffed problem ready for Clarabel.
#[derive(Debug)]
pub struct StuffedProblem {
    /// Linear cost vector q (n).
    pub q: Vec<f64>,
    /// Constraint matrix A (m x n).
    pub a: CscMatrix<f64>,
    /// Constraint vector b (m).
    pub b: Vec<f64>,
    /// Cone dimensions.
    pub cone_dims: ConeDims,
    /// Variable mapping for solution recovery.
    pub var_map: VariableMap,
    /// Constant offset in objective.
    pub objective_offset: f64,
}

/// Collect every variable mentioned by the objective or a constraint, in a
/// deterministic order.
fn collect_variables(
    objective: &LinExpr,
    constraints: &[ConeConstraint],
) -> Result<Vec<(ExprId, usize)>> {
    let mut sizes: HashMap<ExprId, usize> = objective.variable_sizes();
    for c in constraints {
        for (id, size) in c.variable_sizes() {
            match sizes.get(&id) {
                Some(&prev) if prev != size => {
                    return Err(DspError::ShapeMismatch {
                        expected: format!("{} entries for var{}", prev, id.raw()),
                        got: format!("{} entries", size),
                    });
                }
                _ => {
                    sizes.insert(id, size);
                }
            }
        }
    }
    let mut vars: Vec<(ExprId, usize)> = sizes.into_iter().collect();
    vars.sort_by_key(|(id, _)| *id);
    Ok(vars)
}

/// Build the stuffed problem from a linear objective and cone blocks.
pub fn stuff_problem(
    objective: &LinExpr,
    constraints: &[ConeConstraint],
) -> Result<StuffedProblem> {
    if constraints
        .iter()
        .any(|c| matches!(c, ConeConstraint::Psd { .. }))
    {
        return Err(DspError::Solver(
            "semidefinite blocks require a solver with PSD cone support".to_string(),
        ));
    }

    let vars = collect_variables(objective, constraints)?;
    let var_map = VariableMap::from_sizes(&vars);

    let q = stuff_objective(objective, &var_map);
    let (a, b, cone_dims) = stuff_constraints(constraints, &var_map);

    Ok(StuffedProblem {
        q,
        a,
        b,
        cone_dims,
        var_map,
        objective_offset: objective.constant_vector()[0],
    })
}

/// Stuff the scalar objective into q.
fn stuff_objective(objective: &LinExpr, var_map: &VariableMap) -> Vec<f64> {
    let n = var_map.total_vars;
    let mut q = vec![0.0; n];
    for (var_id, coeff) in &objective.coeffs {
        if let Some((start, size)) = var_map.get(*var_id) {
            for (_row, col, val) in coeff.triplet_iter() {
                if col < size {
                    q[start + col] += *val;
                }
            }
        }
    }
    q
}

/// Stuff constraints into A, b, and cone dims.
///
/// Row layout follows the cone order Clarabel expects: zero, nonneg, SOC,
/// then exponential. Exponential blocks hold elementwise triples, so a
/// block of width k contributes k cones with interleaved rows
/// (x_i, y_i, z_i).
fn stuff_constraints(
    constraints: &[ConeConstraint],
    var_map: &VariableMap,
) -> (CscMatrix<f64>, Vec<f64>, ConeDims) {
    let n = var_map.total_vars;

    let mut zeros: Vec<&LinExpr> = Vec::new();
    let mut nonnegs: Vec<&LinExpr> = Vec::new();
    let mut socs: Vec<(&LinExpr, &LinExpr)> = Vec::new();
    let mut exps: Vec<(&LinExpr, &LinExpr, &LinExpr)> = Vec::new();

    for c in constraints {
        match c {
            ConeConstraint::Zero { a } => zeros.push(a),
            ConeConstraint::NonNeg { a } => nonnegs.push(a),
            ConeConstraint::Soc { t, x } => socs.push((t, x)),
            ConeConstraint::ExpCone { x, y, z } => exps.push((x, y, z)),
            ConeConstraint::Psd { .. } => unreachable!("rejected before stuffing"),
        }
    }

    let zero_rows: usize = zeros.iter().map(|e| e.size()).sum();
    let nonneg_rows: usize = nonnegs.iter().map(|e| e.size()).sum();
    let soc_dims: Vec<usize> = socs.iter().map(|(t, x)| t.size() + x.size()).collect();
    let soc_rows: usize = soc_dims.iter().sum();
    let exp_cones: usize = exps.iter().map(|(x, _, _)| x.size()).sum();

    let total_rows = zero_rows + nonneg_rows + soc_rows + exp_cones * 3;

    let cone_dims = ConeDims {
        zero: zero_rows,
        nonneg: nonneg_rows,
        soc: soc_dims,
        exp: exp_cones,
    };

    let mut a_rows = Vec::new();
    let mut a_cols = Vec::new();
    let mut a_vals = Vec::new();
    let mut b = vec![0.0; total_rows];

    let mut row_offset = 0;

    // Zero cone (equalities): expr = 0 becomes Ax = -const.
    for expr in zeros {
        stuff_linear_expr(
            expr,
            var_map,
            row_offset,
            1,
            &mut a_rows,
            &mut a_cols,
            &mut a_vals,
            &mut b,
            false,
        );
        row_offset += expr.size();
    }

    // Nonnegative cone: expr >= 0 becomes -Ax <= const.
    for expr in nonnegs {
        stuff_linear_expr(
            expr,
            var_map,
            row_offset,
            1,
            &mut a_rows,
            &mut a_cols,
            &mut a_vals,
            &mut b,
            true,
        );
        row_offset += expr.size();
    }

    // SOC: slack s = [t_expr; x_expr] must land in the cone, so both
    // parts are negated.
    for (t_expr, x_expr) in socs {
        stuff_linear_expr(
            t_expr,
            var_map,
            row_offset,
            1,
            &mut a_rows,
            &mut a_cols,
            &mut a_vals,
            &mut b,
            true,
        );
        row_offset += t_expr.size();

        stuff_linear_expr(
            x_expr,
            var_map,
            row_offset,
            1,
            &mut a_rows,
            &mut a_cols,
            &mut a_vals,
            &mut b,
            true,
        );
        row_offset += x_expr.size();
    }

    // Exponential cones: row i of each part maps to row_offset + 3i + phase,
    // giving consecutive (x_i, y_i, z_i) triples.
    for (x_expr, y_expr, z_expr) in exps {
        for (phase, expr) in [x_expr, y_expr, z_expr].into_iter().enumerate() {
            stuff_linear_expr(
                expr,
                var_map,
                row_offset + phase,
                3,
                &mut a_rows,
                &mut a_cols,
                &mut a_vals,
                &mut b,
                true,
            );
        }
        row_offset += x_expr.size() * 3;
    }

    let a = csc_from_triplets(total_rows, n, a_rows, a_cols, a_vals);

    (a, b, cone_dims)
}

/// Stuff a single linear expression into A and b.
///
/// Row r of the expression lands at `row_offset + stride * r`. With
/// `negate` the coefficients flip sign and the constant passes through
/// (slack form `-Ax + s = const`); without it the constant flips
/// (equality form `Ax = -const`).
#[allow(clippy::too_many_arguments)]
fn stuff_linear_expr(
    expr: &LinExpr,
    var_map: &VariableMap,
    row_offset: usize,
    stride: usize,
    a_rows: &mut Vec<usize>,
    a_cols: &mut Vec<usize>,
    a_vals: &mut Vec<f64>,
    b: &mut Vec<f64>,
    negate: bool,
) {
    let sign = if negate { -1.0 } else { 1.0 };

    for (var_id, coeff) in &expr.coeffs {
        if let Some((col_start, _)) = var_map.get(*var_id) {
            for (row, col, val) in coeff.triplet_iter() {
                a_rows.push(row_offset + stride * row);
                a_cols.push(col_start + col);
                a_vals.push(*val * sign);
            }
        }
    }

    let constant = expr.constant_vector();
    for (i, value) in constant.iter().enumerate() {
        b[row_offset + stride * i] = if negate { *value } else { -*value };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Shape;

    #[test]
    fn test_variable_map() {
        let vars = vec![(ExprId::new(), 3), (ExprId::new(), 2)];
        let map = VariableMap::from_sizes(&vars);
        assert_eq!(map.total_vars, 5);
    }

    #[test]
    fn test_cone_dims_total() {
        let dims = ConeDims {
            zero: 2,
            nonneg: 3,
            soc: vec![4, 5],
            exp: 2,
        };
        // 2 + 3 + 4 + 5 + 6 = 20
        assert_eq!(dims.total(), 20);
    }

    #[test]
    fn test_stuff_rejects_psd() {
        let x = ExprId::new();
        let a = LinExpr::variable(x, Shape::vector(4));
        let result = stuff_problem(
            &LinExpr::scalar(0.0),
            &[ConeConstraint::Psd { a, n: 2 }],
        );
        assert!(matches!(result, Err(DspError::Solver(_))));
    }

    #[test]
    fn test_stuff_exp_block_interleaves() {
        // One elementwise block of width 2 becomes two 3D cones.
        let x = ExprId::new();
        let lx = LinExpr::variable(x, Shape::vector(2));
        let ones = LinExpr::constant(nalgebra::DMatrix::from_element(2, 1, 1.0));
        let stuffed = stuff_problem(
            &LinExpr::scalar(0.0),
            &[ConeConstraint::ExpCone {
                x: lx.clone(),
                y: ones,
                z: lx,
            }],
        )
        .unwrap();
        assert_eq!(stuffed.cone_dims.exp, 2);
        assert_eq!(stuffed.b.len(), 6);
        // The constant rows are the y parts: rows 1 and 4.
        assert_eq!(stuffed.b[1], 1.0);
        assert_eq!(stuffed.b[4], 1.0);
    }

    #[test]
    fn test_stuff_objective_offset() {
        let x = ExprId::new();
        let obj = LinExpr::variable(x, Shape::scalar()).add(&LinExpr::scalar(3.0));
        let stuffed = stuff_problem(
            &obj,
            &[ConeConstraint::NonNeg {
                a: LinExpr::variable(x, Shape::scalar()),
            }],
        )
        .unwrap();
        assert_eq!(stuffed.objective_offset, 3.0);
        assert_eq!(stuffed.q, vec![1.0]);
    }
}
