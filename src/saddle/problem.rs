//! Saddle-point problem definition and solving API.
//!
//! A `SaddleProblem` min-maxes an objective that is convex in one variable
//! group and concave in the other. It is solved twice, once per group: the
//! inner maximization is eliminated by conic duality and the outer
//! minimization goes to the cone solver. The two pass values must agree,
//! which certifies the saddle point.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::canon::canonicalizer::attribute_cones;
use crate::constraints::Constraint;
use crate::error::{Diagnostic, DspError, Result};
use crate::expr::{Array, Expr, ExprId, VariableData};
use crate::solver::{solve_cone_program, Settings, SolveStatus};

use super::atoms::SaddleAtom;
use super::layout::{Side, VariableLayout};
use super::parser::parse_saddle;
use super::semi_infinite::{constraint_to_cones, default_saddle_canon_table, dualize_sup};

/// Relative agreement required between the two pass values.
const SADDLE_GAP_TOL: f64 = 1e-4;

/// A saddle objective: minimized over one group, maximized over the other.
#[derive(Debug, Clone)]
pub struct MinimizeMaximize {
    expr: Expr,
}

impl MinimizeMaximize {
    pub fn new(expr: Expr) -> Self {
        MinimizeMaximize { expr }
    }

    /// The underlying expression.
    pub fn expr(&self) -> &Expr {
        &self.expr
    }
}

/// A saddle-point problem.
#[derive(Debug, Clone)]
pub struct SaddleProblem {
    objective: Expr,
    constraints: Vec<Constraint>,
    min_vars: Vec<VariableData>,
    max_vars: Vec<VariableData>,
}

/// Solution of a saddle-point problem.
#[derive(Debug, Clone)]
pub struct SaddleSolution {
    /// The saddle value, averaged over the two passes.
    pub value: f64,
    /// Solver status (both passes solved to optimality).
    pub status: SolveStatus,
    /// Values of the minimization group.
    pub min_values: HashMap<ExprId, Array>,
    /// Values of the maximization group.
    pub max_values: HashMap<ExprId, Array>,
    /// Diagnostics collected while lowering the objective.
    pub diagnostics: Vec<Diagnostic>,
}

impl SaddleSolution {
    /// Get the value of a variable from either group.
    pub fn get_value(&self, var_id: ExprId) -> Option<&Array> {
        self.min_values
            .get(&var_id)
            .or_else(|| self.max_values.get(&var_id))
    }
}

impl SaddleProblem {
    /// Create a saddle problem, inferring each variable's role from the
    /// saddle atoms in the objective and propagating through constraints.
    pub fn new(objective: MinimizeMaximize, constraints: Vec<Constraint>) -> Result<Self> {
        Self::with_roles(objective, constraints, vec![], vec![])
    }

    /// Create a saddle problem with explicit role declarations for
    /// variables whose role the atoms leave ambiguous.
    pub fn with_roles(
        objective: MinimizeMaximize,
        constraints: Vec<Constraint>,
        min_vars: Vec<Expr>,
        max_vars: Vec<Expr>,
    ) -> Result<Self> {
        let mut roles: HashMap<ExprId, Side> = HashMap::new();
        let mut order: Vec<VariableData> = Vec::new();

        let assign = |roles: &mut HashMap<ExprId, Side>,
                          order: &mut Vec<VariableData>,
                          var: &VariableData,
                          side: Side|
         -> Result<()> {
            match roles.get(&var.id) {
                Some(&prev) if prev != side => Err(DspError::InvalidProblem(format!(
                    "`{}` is used in both roles",
                    var.display_name()
                ))),
                Some(_) => Ok(()),
                None => {
                    roles.insert(var.id, side);
                    order.push(var.clone());
                    Ok(())
                }
            }
        };

        for var in &min_vars {
            for v in var.variable_data() {
                assign(&mut roles, &mut order, &v, Side::Convex)?;
            }
        }
        for var in &max_vars {
            for v in var.variable_data() {
                assign(&mut roles, &mut order, &v, Side::Concave)?;
            }
        }

        for atom in collect_atoms(objective.expr()) {
            for v in atom.convex_vars() {
                assign(&mut roles, &mut order, &v, Side::Convex)?;
            }
            for v in atom.concave_vars() {
                assign(&mut roles, &mut order, &v, Side::Concave)?;
            }
        }

        // Constraints are single-group: a constraint touching one resolved
        // variable resolves the rest of its variables too.
        let mut all_vars: Vec<VariableData> = objective.expr().variable_data();
        for c in &constraints {
            all_vars.extend(c.variable_data());
        }
        let mut changed = true;
        while changed {
            changed = false;
            for c in &constraints {
                let vars = c.variable_data();
                let side = vars.iter().find_map(|v| roles.get(&v.id).copied());
                if let Some(side) = side {
                    for v in &vars {
                        if !roles.contains_key(&v.id) {
                            assign(&mut roles, &mut order, v, side)?;
                            changed = true;
                        }
                    }
                }
            }
        }

        for v in &all_vars {
            if !roles.contains_key(&v.id) {
                return Err(DspError::InvalidProblem(format!(
                    "cannot infer the role of `{}`; declare it explicitly",
                    v.display_name()
                )));
            }
        }

        let min_group: Vec<VariableData> = order
            .iter()
            .filter(|v| roles[&v.id] == Side::Convex)
            .cloned()
            .collect();
        let max_group: Vec<VariableData> = order
            .iter()
            .filter(|v| roles[&v.id] == Side::Concave)
            .cloned()
            .collect();

        Ok(SaddleProblem {
            objective: objective.expr().clone(),
            constraints,
            min_vars: min_group,
            max_vars: max_group,
        })
    }

    /// The minimization group, in registration order.
    pub fn min_vars(&self) -> &[VariableData] {
        &self.min_vars
    }

    /// The maximization group, in registration order.
    pub fn max_vars(&self) -> &[VariableData] {
        &self.max_vars
    }

    /// Solve with default settings.
    pub fn solve(&self) -> Result<SaddleSolution> {
        self.solve_with(Settings::default())
    }

    /// Solve both passes and cross-check the saddle value.
    pub fn solve_with(&self, settings: Settings) -> Result<SaddleSolution> {
        let roles: HashMap<ExprId, Side> = self
            .min_vars
            .iter()
            .map(|v| (v.id, Side::Convex))
            .chain(self.max_vars.iter().map(|v| (v.id, Side::Concave)))
            .collect();

        // Min pass: eliminate the maximization group.
        let mut layout =
            VariableLayout::new(self.min_vars.clone(), self.max_vars.clone())?;
        let parsed = parse_saddle(&self.objective, &mut layout)?;
        let diagnostics = parsed.diagnostics.clone();

        let (min_cons, max_cons) = self.classify_constraints(&parsed.implicit, &roles)?;

        let table = default_saddle_canon_table();
        let mut max_blocks = Vec::new();
        for c in &max_cons {
            let (cones, _) = constraint_to_cones(c, &table)?;
            max_blocks.extend(cones);
        }
        max_blocks.extend(attribute_cones(&self.max_vars));

        let (objective, mut cones) = dualize_sup(&parsed.repr, &layout, &max_blocks)?;
        for c in &min_cons {
            let (blocks, _) = constraint_to_cones(c, &table)?;
            cones.extend(blocks);
        }
        cones.extend(attribute_cones(&self.min_vars));

        let min_solution = solve_cone_program(&objective, &cones, &settings)?;
        let min_value = checked_value(&min_solution, "minimization pass")?;

        // Max pass: the negated objective with the roles exchanged.
        let mut flipped =
            VariableLayout::new(self.max_vars.clone(), self.min_vars.clone())?;
        let negated = Expr::Neg(Arc::new(self.objective.clone()));
        let parsed_neg = parse_saddle(&negated, &mut flipped)?;

        let mut min_blocks = Vec::new();
        for c in &min_cons {
            let (cones, _) = constraint_to_cones(c, &table)?;
            min_blocks.extend(cones);
        }
        min_blocks.extend(attribute_cones(&self.min_vars));

        let (neg_objective, mut neg_cones) =
            dualize_sup(&parsed_neg.repr, &flipped, &min_blocks)?;
        for c in &max_cons {
            let (blocks, _) = constraint_to_cones(c, &table)?;
            neg_cones.extend(blocks);
        }
        neg_cones.extend(attribute_cones(&self.max_vars));

        let max_solution = solve_cone_program(&neg_objective, &neg_cones, &settings)?;
        let max_value = -checked_value(&max_solution, "maximization pass")?;

        let gap = (min_value - max_value).abs();
        if gap > SADDLE_GAP_TOL * (1.0 + min_value.abs()) {
            return Err(DspError::Solver(format!(
                "saddle passes disagree: {} vs {}",
                min_value, max_value
            )));
        }

        let min_values = extract_group(&min_solution.primal, &self.min_vars);
        let max_values = extract_group(&max_solution.primal, &self.max_vars);

        Ok(SaddleSolution {
            value: 0.5 * (min_value + max_value),
            status: SolveStatus::Optimal,
            min_values,
            max_values,
            diagnostics,
        })
    }

    /// Split constraints by group. Constraints coupling both groups are
    /// rejected.
    fn classify_constraints<'a>(
        &'a self,
        implicit: &'a [Constraint],
        roles: &HashMap<ExprId, Side>,
    ) -> Result<(Vec<&'a Constraint>, Vec<&'a Constraint>)> {
        let mut min_cons = Vec::new();
        let mut max_cons = Vec::new();
        for c in self.constraints.iter().chain(implicit.iter()) {
            let mut sides = HashSet::new();
            for id in c.variables() {
                match roles.get(&id) {
                    Some(side) => {
                        sides.insert(*side);
                    }
                    None => {
                        return Err(DspError::UnknownVariable(format!("var{}", id.raw())))
                    }
                }
            }
            if sides.len() > 1 {
                return Err(DspError::NotDsp(
                    "a constraint may not couple the two variable groups".to_string(),
                ));
            }
            match sides.into_iter().next() {
                Some(Side::Concave) => max_cons.push(c),
                _ => min_cons.push(c),
            }
        }
        Ok((min_cons, max_cons))
    }
}

fn checked_value(solution: &crate::solver::Solution, pass: &str) -> Result<f64> {
    if solution.status != SolveStatus::Optimal {
        return Err(DspError::Solver(format!(
            "{} did not solve: {:?}",
            pass, solution.status
        )));
    }
    solution
        .value
        .ok_or_else(|| DspError::Solver(format!("{} returned no value", pass)))
}

fn extract_group(
    primal: &Option<HashMap<ExprId, Array>>,
    vars: &[VariableData],
) -> HashMap<ExprId, Array> {
    let mut out = HashMap::new();
    if let Some(primal) = primal {
        for v in vars {
            if let Some(value) = primal.get(&v.id) {
                out.insert(v.id, value.clone());
            }
        }
    }
    out
}

/// Collect every saddle atom in an expression.
fn collect_atoms(expr: &Expr) -> Vec<Arc<SaddleAtom>> {
    let mut atoms = Vec::new();
    walk_atoms(expr, &mut atoms);
    atoms
}

fn walk_atoms(expr: &Expr, atoms: &mut Vec<Arc<SaddleAtom>>) {
    match expr {
        Expr::Saddle(atom) => atoms.push(atom.clone()),
        Expr::Variable(_) | Expr::Constant(_) | Expr::Extremum(_) => {}
        Expr::Add(a, b) | Expr::Mul(a, b) | Expr::MatMul(a, b) => {
            walk_atoms(a, atoms);
            walk_atoms(b, atoms);
        }
        Expr::Neg(a)
        | Expr::Sum(a)
        | Expr::Index(a, _)
        | Expr::Transpose(a)
        | Expr::Exp(a)
        | Expr::Log(a)
        | Expr::Norm2(a)
        | Expr::SumSquares(a) => walk_atoms(a, atoms),
        Expr::Maximum(exprs) | Expr::Minimum(exprs) => {
            for e in exprs {
                walk_atoms(e, atoms);
            }
        }
    }
}
