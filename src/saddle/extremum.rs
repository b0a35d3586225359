//! Saddle-extremum atoms: sup and inf over local variables.
//!
//! A saddle extremum closes over a set of local variables, turning a
//! saddle expression into a purely convex (sup) or concave (inf) one. The
//! local variables and their constraints are scoped to the atom and never
//! appear in the enclosing problem.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock};

use crate::constraints::Constraint;
use crate::error::{DspError, Result};
use crate::expr::{Expr, ExprId, VariableData};

// Each local variable belongs to at most one extremum for the life of the
// process, like the variable id counter itself.
fn bound_locals() -> &'static Mutex<HashSet<ExprId>> {
    static REGISTRY: OnceLock<Mutex<HashSet<ExprId>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Whether the extremum maximizes or minimizes over its locals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtremumMode {
    /// sup over the locals; the result is convex.
    Sup,
    /// inf over the locals; the result is concave.
    Inf,
}

/// A sup or inf of a saddle expression over local variables.
#[derive(Debug, Clone)]
pub struct SaddleExtremum {
    id: ExprId,
    mode: ExtremumMode,
    objective: Expr,
    locals: Vec<VariableData>,
    constraints: Vec<Constraint>,
}

/// sup over the local variables of `objective`, subject to `constraints`.
///
/// Every variable in the constraints must be local; the objective may mix
/// local variables with free ones.
pub fn saddle_max(objective: Expr, constraints: Vec<Constraint>) -> Result<Expr> {
    build(ExtremumMode::Sup, objective, constraints)
}

/// inf over the local variables of `objective`, subject to `constraints`.
pub fn saddle_min(objective: Expr, constraints: Vec<Constraint>) -> Result<Expr> {
    build(ExtremumMode::Inf, objective, constraints)
}

fn build(mode: ExtremumMode, objective: Expr, constraints: Vec<Constraint>) -> Result<Expr> {
    for c in &constraints {
        for v in c.variable_data() {
            if !v.local {
                return Err(DspError::Scope(format!(
                    "constraint of a saddle extremum mentions non-local \
                     variable `{}`",
                    v.display_name()
                )));
            }
        }
        if !c.is_dcp() {
            return Err(DspError::NotDsp(
                "saddle extremum constraint is not DCP".to_string(),
            ));
        }
    }

    let mut locals: Vec<VariableData> = Vec::new();
    let mut collect = |vars: Vec<VariableData>| {
        for v in vars {
            if v.local && !locals.iter().any(|l| l.id == v.id) {
                locals.push(v);
            }
        }
    };
    collect(objective.variable_data());
    for c in &constraints {
        collect(c.variable_data());
    }

    if locals.is_empty() {
        return Err(DspError::Scope(
            "saddle extremum binds no local variables".to_string(),
        ));
    }

    let mut registry = match bound_locals().lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    for v in &locals {
        if registry.contains(&v.id) {
            return Err(DspError::Scope(format!(
                "local variable `{}` is already bound by another extremum",
                v.display_name()
            )));
        }
    }
    for v in &locals {
        registry.insert(v.id);
    }
    drop(registry);

    Ok(Expr::Extremum(Arc::new(SaddleExtremum {
        id: ExprId::new(),
        mode,
        objective,
        locals,
        constraints,
    })))
}

impl SaddleExtremum {
    pub fn id(&self) -> ExprId {
        self.id
    }

    pub fn mode(&self) -> ExtremumMode {
        self.mode
    }

    pub fn objective(&self) -> &Expr {
        &self.objective
    }

    /// The local variables bound by this extremum.
    pub fn locals(&self) -> &[VariableData] {
        &self.locals
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Variables of the objective that are not bound by this extremum.
    pub fn free_vars(&self) -> Vec<VariableData> {
        self.objective
            .variable_data()
            .into_iter()
            .filter(|v| !self.locals.iter().any(|l| l.id == v.id))
            .collect()
    }

    pub(crate) fn collect_free_variable_data(&self, vars: &mut Vec<VariableData>) {
        vars.extend(self.free_vars());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::ConstraintExt;
    use crate::expr::{constant, local_variable, variable};
    use crate::saddle::atoms::inner;

    #[test]
    fn test_saddle_max_collects_locals() {
        let x = variable(2);
        let y = local_variable(2);
        let obj = inner(&x, &y).unwrap();
        let e = saddle_max(obj, vec![y.leq(&constant(1.0))]).unwrap();

        let ext = match &e {
            Expr::Extremum(ext) => ext.clone(),
            _ => panic!("expected extremum"),
        };
        assert_eq!(ext.mode(), ExtremumMode::Sup);
        assert_eq!(ext.locals().len(), 1);
        assert_eq!(ext.free_vars().len(), 1);
        assert_eq!(Some(ext.free_vars()[0].id), x.variable_id());
    }

    #[test]
    fn test_extremum_rejects_nonlocal_constraint() {
        let x = variable(2);
        let y = local_variable(2);
        let obj = inner(&x, &y).unwrap();
        let result = saddle_max(obj, vec![x.leq(&constant(1.0))]);
        assert!(matches!(result, Err(DspError::Scope(_))));
    }

    #[test]
    fn test_extremum_requires_locals() {
        let x = variable(2);
        let y = variable(2);
        let obj = inner(&x, &y).unwrap();
        let result = saddle_max(obj, vec![]);
        assert!(matches!(result, Err(DspError::Scope(_))));
    }

    #[test]
    fn test_local_cannot_be_bound_twice() {
        let x = variable(2);
        let y = local_variable(2);
        let obj = inner(&x, &y).unwrap();
        saddle_max(obj, vec![y.leq(&constant(1.0))]).unwrap();

        let x2 = variable(2);
        let obj2 = inner(&x2, &y).unwrap();
        let result = saddle_min(obj2, vec![y.geq(&constant(0.0))]);
        assert!(matches!(result, Err(DspError::Scope(_))));
    }

    #[test]
    fn test_extremum_is_convex_to_dcp() {
        let x = variable(2);
        let y = local_variable(2);
        let obj = inner(&x, &y).unwrap();
        let e = saddle_max(obj, vec![y.leq(&constant(1.0))]).unwrap();
        assert!(e.is_convex());
        assert!(!e.is_concave());
    }
}
