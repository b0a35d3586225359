//! Clarabel solver integration.
//!
//! This module provides the interface to the Clarabel conic solver.

use std::collections::HashMap;

use clarabel::algebra::CscMatrix as ClarabelCsc;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT,
};

use super::stuffing::{stuff_problem, ConeDims, VariableMap};
use crate::canon::{ConeConstraint, LinExpr};
use crate::error::{DspError, Result};
use crate::expr::{Array, ExprId};

/// Solution status from the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Optimal solution found.
    Optimal,
    /// Problem is infeasible.
    Infeasible,
    /// Problem is unbounded.
    Unbounded,
    /// Maximum iterations reached.
    MaxIterations,
    /// Numerical difficulties.
    NumericalError,
    /// Unknown status.
    Unknown,
}

impl From<SolverStatus> for SolveStatus {
    fn from(status: SolverStatus) -> Self {
        match status {
            SolverStatus::Solved => SolveStatus::Optimal,
            SolverStatus::PrimalInfeasible => SolveStatus::Infeasible,
            SolverStatus::DualInfeasible => SolveStatus::Unbounded,
            SolverStatus::MaxIterations => SolveStatus::MaxIterations,
            SolverStatus::MaxTime => SolveStatus::MaxIterations,
            _ => SolveStatus::Unknown,
        }
    }
}

/// Solver settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Print solver output.
    pub verbose: bool,
    /// Maximum iterations.
    pub max_iter: u32,
    /// Time limit in seconds.
    pub time_limit: f64,
    /// Absolute tolerance.
    pub tol_gap_abs: f64,
    /// Relative tolerance.
    pub tol_gap_rel: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            verbose: false,
            max_iter: 200,
            time_limit: f64::INFINITY,
            tol_gap_abs: 1e-8,
            tol_gap_rel: 1e-8,
        }
    }
}

/// Solution from the solver.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Solution status.
    pub status: SolveStatus,
    /// Optimal value (if solved).
    pub value: Option<f64>,
    /// Primal variable values (if solved).
    pub primal: Option<HashMap<ExprId, Array>>,
    /// Dual variable values (if solved).
    pub dual: Option<Vec<f64>>,
    /// Solve time in seconds.
    pub solve_time: f64,
    /// Number of iterations.
    pub iterations: u32,
}

impl Solution {
    /// Get the value of a variable.
    pub fn get_value(&self, var_id: ExprId) -> Option<&Array> {
        self.primal.as_ref().and_then(|p| p.get(&var_id))
    }

    /// Get scalar value for a variable, returning an error on failure.
    pub fn try_value(&self, var: &crate::expr::Expr) -> Result<f64> {
        let var_id = var
            .variable_id()
            .ok_or_else(|| DspError::InvalidProblem("Expression is not a variable".into()))?;
        let arr = self
            .get_value(var_id)
            .ok_or_else(|| DspError::InvalidProblem("Variable not in solution".into()))?;
        arr.as_scalar().ok_or_else(|| {
            DspError::InvalidProblem(
                "Variable is not scalar; use index operator for vectors/matrices".into(),
            )
        })
    }

    /// Get scalar value for a variable.
    ///
    /// # Panics
    ///
    /// Panics if the expression is not a variable, the variable is not in
    /// the solution, or the variable is not scalar. Use `try_value()` for
    /// explicit error handling, or the index operator for vectors.
    pub fn value(&self, var: &crate::expr::Expr) -> f64 {
        self.try_value(var).expect("failed to get scalar value")
    }
}

impl std::ops::Index<&crate::expr::Expr> for Solution {
    type Output = nalgebra::DMatrix<f64>;

    /// Get matrix/vector value for a variable using the index operator.
    ///
    /// # Panics
    ///
    /// Panics if the variable is not found or is a scalar (use `.value()`
    /// for scalars).
    fn index(&self, var: &crate::expr::Expr) -> &nalgebra::DMatrix<f64> {
        let var_id = var.variable_id().expect("Expression is not a variable");
        match self.get_value(var_id).expect("Variable not in solution") {
            Array::Dense(m) => m,
            Array::Scalar(_) => {
                panic!("Variable is scalar, use .value() method instead of indexing")
            }
            Array::Sparse(_) => unreachable!("Solution values are never sparse"),
        }
    }
}

/// Minimize a linear objective over cone constraint blocks.
pub fn solve_cone_program(
    objective: &LinExpr,
    constraints: &[ConeConstraint],
    settings: &Settings,
) -> Result<Solution> {
    let problem = stuff_problem(objective, constraints)?;

    // Clarabel takes (1/2) x'Px + q'x; the objective here is linear.
    let n = problem.var_map.total_vars;
    let p = to_clarabel_csc(&crate::sparse::csc_from_triplets(n, n, vec![], vec![], vec![]));
    let a = to_clarabel_csc(&problem.a);
    let cones = to_clarabel_cones(&problem.cone_dims);

    let clarabel_settings = DefaultSettingsBuilder::default()
        .verbose(settings.verbose)
        .max_iter(settings.max_iter)
        .time_limit(settings.time_limit)
        .tol_gap_abs(settings.tol_gap_abs)
        .tol_gap_rel(settings.tol_gap_rel)
        .build()
        .map_err(|_| DspError::Solver("invalid solver settings".to_string()))?;

    let mut solver = DefaultSolver::new(&p, &problem.q, &a, &problem.b, &cones, clarabel_settings);
    solver.solve();

    let status: SolveStatus = solver.solution.status.into();
    let solve_time = solver.solution.solve_time;
    let iterations = solver.info.iterations;

    if status == SolveStatus::Optimal {
        let primal = unpack_primal(&solver.solution.x, &problem.var_map);
        let linear: f64 = problem
            .q
            .iter()
            .zip(solver.solution.x.iter())
            .map(|(qi, xi)| qi * xi)
            .sum();

        Ok(Solution {
            status,
            value: Some(linear + problem.objective_offset),
            primal: Some(primal),
            dual: Some(solver.solution.z.clone()),
            solve_time,
            iterations,
        })
    } else {
        Ok(Solution {
            status,
            value: None,
            primal: None,
            dual: None,
            solve_time,
            iterations,
        })
    }
}

/// Convert nalgebra CSC to Clarabel CSC.
fn to_clarabel_csc(m: &nalgebra_sparse::CscMatrix<f64>) -> ClarabelCsc<f64> {
    ClarabelCsc::new(
        m.nrows(),
        m.ncols(),
        m.col_offsets().to_vec(),
        m.row_indices().to_vec(),
        m.values().to_vec(),
    )
}

/// Convert cone dimensions to Clarabel cones.
fn to_clarabel_cones(dims: &ConeDims) -> Vec<SupportedConeT<f64>> {
    let mut cones = Vec::new();

    if dims.zero > 0 {
        cones.push(SupportedConeT::ZeroConeT(dims.zero));
    }

    if dims.nonneg > 0 {
        cones.push(SupportedConeT::NonnegativeConeT(dims.nonneg));
    }

    for &soc_dim in &dims.soc {
        cones.push(SupportedConeT::SecondOrderConeT(soc_dim));
    }

    for _ in 0..dims.exp {
        cones.push(SupportedConeT::ExponentialConeT());
    }

    cones
}

/// Unpack primal solution into variable values.
fn unpack_primal(x: &[f64], var_map: &VariableMap) -> HashMap<ExprId, Array> {
    let mut result = HashMap::new();

    for (&var_id, &(start, size)) in &var_map.id_to_col {
        let values: Vec<f64> = x[start..start + size].to_vec();
        let arr = if size == 1 {
            Array::Scalar(values[0])
        } else {
            Array::from_vec(values)
        };
        result.insert(var_id, arr);
    }

    result
}
