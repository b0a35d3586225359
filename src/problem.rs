//! Convex problem definition and solving API.
//!
//! The `Problem` struct represents an ordinary DCP problem with:
//! - An objective (minimize or maximize)
//! - A set of constraints
//!
//! Inner saddle extrema (`saddle_max` / `saddle_min`) are allowed anywhere
//! a convex or concave expression is: they are lowered through the
//! registered canonicalization table before stuffing.
//!
//! Use the builder pattern to construct problems:
//! ```ignore
//! let solution = Problem::minimize(objective)
//!     .subject_to([constraint1, constraint2])
//!     .solve()?;
//! ```

use std::sync::Arc;

use crate::canon::{canonicalize_with, ConeConstraint};
use crate::constraints::Constraint;
use crate::error::{Diagnostic, DspError, Result};
use crate::expr::{Expr, ExprId, VariableData};
use crate::saddle::semi_infinite::{constraint_to_cones, default_saddle_canon_table};
use crate::solver::{solve_cone_program, Settings, Solution, SolveStatus};

/// Objective type for optimization problems.
#[derive(Debug, Clone)]
pub enum Objective {
    /// Minimize the expression.
    Minimize(Expr),
    /// Maximize the expression (internally converted to minimization).
    Maximize(Expr),
}

impl Objective {
    /// Get the expression being optimized.
    pub fn expr(&self) -> &Expr {
        match self {
            Objective::Minimize(e) | Objective::Maximize(e) => e,
        }
    }

    /// Check if this is a minimization.
    pub fn is_minimize(&self) -> bool {
        matches!(self, Objective::Minimize(_))
    }
}

/// An optimization problem.
#[derive(Debug, Clone)]
pub struct Problem {
    /// The objective to optimize.
    pub objective: Objective,
    /// The constraints.
    pub constraints: Vec<Constraint>,
}

impl Problem {
    /// Create a minimization problem.
    pub fn minimize(expr: Expr) -> ProblemBuilder {
        ProblemBuilder {
            objective: Objective::Minimize(expr),
            constraints: Vec::new(),
        }
    }

    /// Create a maximization problem.
    pub fn maximize(expr: Expr) -> ProblemBuilder {
        ProblemBuilder {
            objective: Objective::Maximize(expr),
            constraints: Vec::new(),
        }
    }

    /// Check if this problem is DCP-compliant.
    ///
    /// A problem is DCP if:
    /// - Minimize: objective is convex
    /// - Maximize: objective is concave
    /// - All constraints are DCP
    pub fn is_dcp(&self) -> bool {
        let obj_valid = match &self.objective {
            Objective::Minimize(e) => e.is_convex(),
            Objective::Maximize(e) => e.is_concave(),
        };

        obj_valid && self.constraints.iter().all(|c| c.is_dcp())
    }

    /// Get all variable IDs in this problem.
    pub fn variables(&self) -> Vec<ExprId> {
        let mut vars = self.objective.expr().variables();
        for c in &self.constraints {
            vars.extend(c.variables());
        }
        vars.sort_by_key(|id| id.raw());
        vars.dedup();
        vars
    }

    /// Get all variables with their declarations.
    pub fn variable_data(&self) -> Vec<VariableData> {
        let mut data = self.objective.expr().variable_data();
        for c in &self.constraints {
            for expr in c.expressions() {
                data.extend(expr.variable_data());
            }
        }
        data.sort_by_key(|v| v.id);
        data.dedup_by_key(|v| v.id);
        data
    }

    /// Solve the problem with default settings.
    pub fn solve(&self) -> Result<Solution> {
        self.solve_with(Settings::default())
    }

    /// Solve the problem with custom settings, returning the diagnostics
    /// collected during lowering alongside the solution.
    pub fn solve_with_diagnostics(
        &self,
        settings: Settings,
    ) -> Result<(Solution, Vec<Diagnostic>)> {
        if !self.is_dcp() {
            return Err(DspError::Curvature(self.dcp_violation_message()));
        }

        let table = default_saddle_canon_table();

        let (obj_expr, negate_result) = match &self.objective {
            Objective::Minimize(e) => (e.clone(), false),
            Objective::Maximize(e) => (Expr::Neg(Arc::new(e.clone())), true),
        };

        let obj_canon = canonicalize_with(&obj_expr, &table)?;
        let mut cones: Vec<ConeConstraint> = obj_canon.constraints;
        let mut diagnostics = obj_canon.diagnostics;

        for constraint in &self.constraints {
            let (blocks, diags) = constraint_to_cones(constraint, &table)?;
            cones.extend(blocks);
            diagnostics.extend(diags);
        }

        cones.extend(crate::canon::canonicalizer::attribute_cones(
            &self.variable_data(),
        ));

        let mut solution = solve_cone_program(&obj_canon.expr, &cones, &settings)?;

        if negate_result {
            solution.value = solution.value.map(|v| -v);
        }

        match solution.status {
            SolveStatus::Optimal => Ok((solution, diagnostics)),
            SolveStatus::Infeasible => Err(DspError::Solver("Problem is infeasible".into())),
            SolveStatus::Unbounded => Err(DspError::Solver("Problem is unbounded".into())),
            SolveStatus::MaxIterations => {
                Err(DspError::Solver("Maximum iterations reached".into()))
            }
            SolveStatus::NumericalError => Err(DspError::Solver(
                "Solver encountered numerical difficulties".into(),
            )),
            SolveStatus::Unknown => Err(DspError::Solver("Unknown solver status".into())),
        }
    }

    /// Solve the problem with custom settings.
    pub fn solve_with(&self, settings: Settings) -> Result<Solution> {
        self.solve_with_diagnostics(settings).map(|(s, _)| s)
    }

    /// Get a message describing why the problem is not DCP.
    fn dcp_violation_message(&self) -> String {
        let mut violations = Vec::new();

        match &self.objective {
            Objective::Minimize(e) if !e.is_convex() => {
                violations.push(format!(
                    "Objective has curvature {:?} but must be convex for minimization",
                    e.curvature()
                ));
            }
            Objective::Maximize(e) if !e.is_concave() => {
                violations.push(format!(
                    "Objective has curvature {:?} but must be concave for maximization",
                    e.curvature()
                ));
            }
            _ => {}
        }

        for (i, c) in self.constraints.iter().enumerate() {
            if !c.is_dcp() {
                violations.push(format!("Constraint {} is not DCP", i));
            }
        }

        if violations.is_empty() {
            "Unknown DCP violation".into()
        } else {
            violations.join("; ")
        }
    }
}

/// Builder for constructing problems.
#[derive(Debug, Clone)]
pub struct ProblemBuilder {
    objective: Objective,
    constraints: Vec<Constraint>,
}

impl ProblemBuilder {
    /// Add constraints to the problem.
    pub fn subject_to(mut self, constraints: impl IntoIterator<Item = Constraint>) -> Self {
        self.constraints.extend(constraints);
        self
    }

    /// Add a single constraint.
    pub fn constraint(mut self, c: Constraint) -> Self {
        self.constraints.push(c);
        self
    }

    /// Build the problem.
    pub fn build(self) -> Problem {
        Problem {
            objective: self.objective,
            constraints: self.constraints,
        }
    }

    /// Build and solve the problem with default settings.
    pub fn solve(self) -> Result<Solution> {
        self.build().solve()
    }

    /// Build and solve the problem with custom settings.
    pub fn solve_with(self, settings: Settings) -> Result<Solution> {
        self.build().solve_with(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::{norm2, sum};
    use crate::constraints::ConstraintExt;
    use crate::expr::{constant, variable};
    use crate::solver::SolveStatus;

    #[test]
    fn test_problem_builder() {
        let x = variable(5);
        let problem = Problem::minimize(sum(&x)).build();
        assert!(problem.is_dcp());
    }

    #[test]
    fn test_minimize_convex_is_dcp() {
        let x = variable(5);
        let problem = Problem::minimize(norm2(&x)).build();
        assert!(problem.is_dcp());
    }

    #[test]
    fn test_maximize_convex_not_dcp() {
        let x = variable(5);
        let problem = Problem::maximize(norm2(&x)).build();
        assert!(!problem.is_dcp());
    }

    #[test]
    fn test_maximize_concave_is_dcp() {
        let x = variable(5);
        let neg_norm = Expr::Neg(Arc::new(norm2(&x)));
        let problem = Problem::maximize(neg_norm).build();
        assert!(problem.is_dcp());
    }

    #[test]
    fn test_solve_simple_lp() {
        // Minimize sum(x) subject to x >= 1
        // Optimal: x = [1, 1, 1, 1, 1], value = 5
        let x = variable(5);
        let one = constant(1.0);
        let result = Problem::minimize(sum(&x))
            .subject_to([x.geq(&one)])
            .solve()
            .expect("solve failed");

        assert_eq!(result.status, SolveStatus::Optimal);
        let value = result.value.expect("no value");
        assert!((value - 5.0).abs() < 1e-4, "Expected ~5.0, got {}", value);
    }

    #[test]
    fn test_solve_norm2_minimization() {
        // Minimize ||x||_2 subject to sum(x) = 5
        // Optimal: x = [1, 1, 1, 1, 1], ||x||_2 = sqrt(5)
        let x = variable(5);
        let five = constant(5.0);
        let result = Problem::minimize(norm2(&x))
            .subject_to([sum(&x).equals(&five)])
            .solve()
            .expect("solve failed");

        assert_eq!(result.status, SolveStatus::Optimal);
        let value = result.value.expect("no value");
        let expected = (5.0_f64).sqrt();
        assert!(
            (value - expected).abs() < 1e-3,
            "Expected ~{}, got {}",
            expected,
            value
        );
    }

    #[test]
    fn test_nonneg_attribute_enforced() {
        // Minimize sum(x) with x declared nonnegative: optimum is 0.
        let x = crate::expr::nonneg_variable(3);
        let result = Problem::minimize(sum(&x)).solve().expect("solve failed");
        let value = result.value.expect("no value");
        assert!(value.abs() < 1e-6, "Expected ~0.0, got {}", value);
    }
}
