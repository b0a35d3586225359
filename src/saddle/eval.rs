//! Numeric evaluation of expressions and saddle representations.

use std::collections::HashMap;
use std::sync::Arc;

use nalgebra::DMatrix;

use crate::error::{DspError, Result};
use crate::expr::{constant, Expr, ExprId};

use super::atoms::SaddleAtom;

/// Numeric values for variables.
#[derive(Debug, Clone, Default)]
pub struct Assignment {
    values: HashMap<ExprId, DMatrix<f64>>,
}

impl Assignment {
    pub fn new() -> Self {
        Assignment::default()
    }

    /// Set a scalar value.
    pub fn set_scalar(&mut self, id: ExprId, value: f64) {
        self.values.insert(id, DMatrix::from_element(1, 1, value));
    }

    /// Set a vector value (stored as a column).
    pub fn set_vector(&mut self, id: ExprId, values: &[f64]) {
        self.values
            .insert(id, DMatrix::from_column_slice(values.len(), 1, values));
    }

    /// Set a matrix value.
    pub fn set_matrix(&mut self, id: ExprId, value: &DMatrix<f64>) {
        self.values.insert(id, value.clone());
    }

    pub fn get(&self, id: ExprId) -> Option<&DMatrix<f64>> {
        self.values.get(&id)
    }

    pub fn contains(&self, id: ExprId) -> bool {
        self.values.contains_key(&id)
    }
}

/// Evaluate an expression numerically.
///
/// Fails with `UnsetValue` when a variable has no assigned value.
pub fn evaluate(expr: &Expr, assignment: &Assignment) -> Result<DMatrix<f64>> {
    match expr {
        Expr::Variable(v) => assignment
            .get(v.id)
            .cloned()
            .ok_or_else(|| DspError::UnsetValue(v.display_name())),
        Expr::Constant(c) => Ok(c.value.to_dense()),

        Expr::Add(a, b) => {
            let ma = evaluate(a, assignment)?;
            let mb = evaluate(b, assignment)?;
            broadcast_binary(&ma, &mb, |x, y| x + y)
        }
        Expr::Neg(a) => Ok(-evaluate(a, assignment)?),
        Expr::Mul(a, b) => {
            let ma = evaluate(a, assignment)?;
            let mb = evaluate(b, assignment)?;
            broadcast_binary(&ma, &mb, |x, y| x * y)
        }
        Expr::MatMul(a, b) => {
            let ma = evaluate(a, assignment)?;
            let mb = evaluate(b, assignment)?;
            if ma.ncols() != mb.nrows() {
                return Err(DspError::ShapeMismatch {
                    expected: format!("inner dimension {}", ma.ncols()),
                    got: format!("{}", mb.nrows()),
                });
            }
            Ok(&ma * &mb)
        }
        Expr::Sum(a) => {
            let m = evaluate(a, assignment)?;
            Ok(DMatrix::from_element(1, 1, m.iter().sum()))
        }
        Expr::Index(a, spec) => {
            let m = evaluate(a, assignment)?;
            index_matrix(&m, &spec.ranges)
        }
        Expr::Transpose(a) => Ok(evaluate(a, assignment)?.transpose()),

        Expr::Exp(a) => Ok(evaluate(a, assignment)?.map(f64::exp)),
        Expr::Log(a) => Ok(evaluate(a, assignment)?.map(f64::ln)),
        Expr::Norm2(a) => {
            let m = evaluate(a, assignment)?;
            let v: f64 = m.iter().map(|x| x * x).sum();
            Ok(DMatrix::from_element(1, 1, v.sqrt()))
        }
        Expr::SumSquares(a) => {
            let m = evaluate(a, assignment)?;
            Ok(DMatrix::from_element(1, 1, m.iter().map(|x| x * x).sum()))
        }
        Expr::Maximum(exprs) => reduce_elementwise(exprs, assignment, f64::max),
        Expr::Minimum(exprs) => reduce_elementwise(exprs, assignment, f64::min),

        Expr::Saddle(atom) => Ok(DMatrix::from_element(1, 1, atom.value(assignment)?)),
        Expr::Extremum(ext) => Ok(DMatrix::from_element(
            1,
            1,
            super::semi_infinite::extremum_value(ext, assignment)?,
        )),
    }
}

fn broadcast_binary(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    op: impl Fn(f64, f64) -> f64,
) -> Result<DMatrix<f64>> {
    if a.nrows() == b.nrows() && a.ncols() == b.ncols() {
        Ok(a.zip_map(b, op))
    } else if a.nrows() == 1 && a.ncols() == 1 {
        let s = a[(0, 0)];
        Ok(b.map(|v| op(s, v)))
    } else if b.nrows() == 1 && b.ncols() == 1 {
        let s = b[(0, 0)];
        Ok(a.map(|v| op(v, s)))
    } else {
        Err(DspError::ShapeMismatch {
            expected: format!("{} x {}", a.nrows(), a.ncols()),
            got: format!("{} x {}", b.nrows(), b.ncols()),
        })
    }
}

fn reduce_elementwise(
    exprs: &[Arc<Expr>],
    assignment: &Assignment,
    op: impl Fn(f64, f64) -> f64 + Copy,
) -> Result<DMatrix<f64>> {
    let mut iter = exprs.iter();
    let first = iter
        .next()
        .ok_or_else(|| DspError::InvalidProblem("empty extremum argument list".to_string()))?;
    let mut acc = evaluate(first, assignment)?;
    for e in iter {
        let m = evaluate(e, assignment)?;
        acc = broadcast_binary(&acc, &m, op)?;
    }
    Ok(acc)
}

fn index_matrix(
    m: &DMatrix<f64>,
    ranges: &[Option<(usize, usize, usize)>],
) -> Result<DMatrix<f64>> {
    let expand = |r: &Option<(usize, usize, usize)>, len: usize| -> Vec<usize> {
        match r {
            Some((start, stop, step)) => (*start..*stop).step_by(*step).collect(),
            None => (0..len).collect(),
        }
    };
    match ranges {
        [r0] => {
            let rows = expand(r0, m.nrows());
            let out: Vec<f64> = rows.iter().map(|&i| m[(i, 0)]).collect();
            Ok(DMatrix::from_column_slice(out.len(), 1, &out))
        }
        [r0, r1] => {
            let rows = expand(r0, m.nrows());
            let cols = expand(r1, m.ncols());
            let mut out = DMatrix::zeros(rows.len(), cols.len());
            for (oi, &i) in rows.iter().enumerate() {
                for (oj, &j) in cols.iter().enumerate() {
                    out[(oi, oj)] = m[(i, j)];
                }
            }
            Ok(out)
        }
        _ => Err(DspError::InvalidProblem(
            "unsupported index specification".to_string(),
        )),
    }
}

/// Replace every assigned variable by its numeric value, leaving the
/// remaining variables symbolic.
pub fn substitute(expr: &Expr, assignment: &Assignment) -> Expr {
    match expr {
        Expr::Variable(v) => match assignment.get(v.id) {
            Some(m) => crate::expr::constant_dmatrix(m.clone()),
            None => expr.clone(),
        },
        Expr::Constant(_) | Expr::Saddle(_) | Expr::Extremum(_) => expr.clone(),

        Expr::Add(a, b) => Expr::Add(
            Arc::new(substitute(a, assignment)),
            Arc::new(substitute(b, assignment)),
        ),
        Expr::Mul(a, b) => Expr::Mul(
            Arc::new(substitute(a, assignment)),
            Arc::new(substitute(b, assignment)),
        ),
        Expr::MatMul(a, b) => Expr::MatMul(
            Arc::new(substitute(a, assignment)),
            Arc::new(substitute(b, assignment)),
        ),
        Expr::Neg(a) => Expr::Neg(Arc::new(substitute(a, assignment))),
        Expr::Sum(a) => Expr::Sum(Arc::new(substitute(a, assignment))),
        Expr::Index(a, spec) => Expr::Index(Arc::new(substitute(a, assignment)), spec.clone()),
        Expr::Transpose(a) => Expr::Transpose(Arc::new(substitute(a, assignment))),
        Expr::Exp(a) => Expr::Exp(Arc::new(substitute(a, assignment))),
        Expr::Log(a) => Expr::Log(Arc::new(substitute(a, assignment))),
        Expr::Norm2(a) => Expr::Norm2(Arc::new(substitute(a, assignment))),
        Expr::SumSquares(a) => Expr::SumSquares(Arc::new(substitute(a, assignment))),
        Expr::Maximum(exprs) => Expr::Maximum(
            exprs
                .iter()
                .map(|e| Arc::new(substitute(e, assignment)))
                .collect(),
        ),
        Expr::Minimum(exprs) => Expr::Minimum(
            exprs
                .iter()
                .map(|e| Arc::new(substitute(e, assignment)))
                .collect(),
        ),
    }
}

/// The concave-side restriction of a saddle representation.
///
/// Representations are built and combined symbolically; this object mirrors
/// those combinations so the concave restriction can be recovered as a DCP
/// expression once the other group has numeric values.
#[derive(Debug, Clone)]
pub enum ConcaveEvaluator {
    /// An atom, possibly switched (the negated atom with roles exchanged).
    Atom {
        atom: Arc<SaddleAtom>,
        switched: bool,
    },
    /// An expression whose parameter-group variables are substituted
    /// numerically, leaving a concave expression of the remaining group.
    Expr(Expr),
    /// Sum of restrictions.
    Sum(Vec<ConcaveEvaluator>),
    /// A nonnegative multiple of a restriction.
    Scale(f64, Box<ConcaveEvaluator>),
    /// A constant term.
    Constant(f64),
}

impl ConcaveEvaluator {
    /// The concave expression obtained by substituting the parameter
    /// group's numeric values.
    pub fn concave_expr(&self, assignment: &Assignment) -> Result<Expr> {
        match self {
            ConcaveEvaluator::Atom { atom, switched } => {
                atom.concave_restriction(*switched, assignment)
            }
            ConcaveEvaluator::Expr(e) => Ok(substitute(e, assignment)),
            ConcaveEvaluator::Sum(parts) => {
                let mut iter = parts.iter();
                let first = match iter.next() {
                    Some(p) => p.concave_expr(assignment)?,
                    None => return Ok(constant(0.0)),
                };
                let mut acc = first;
                for p in iter {
                    acc = Expr::Add(Arc::new(acc), Arc::new(p.concave_expr(assignment)?));
                }
                Ok(acc)
            }
            ConcaveEvaluator::Scale(k, inner) => Ok(Expr::Mul(
                Arc::new(constant(*k)),
                Arc::new(inner.concave_expr(assignment)?),
            )),
            ConcaveEvaluator::Constant(c) => Ok(constant(*c)),
        }
    }
}
