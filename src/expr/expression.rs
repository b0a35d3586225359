//! Core expression types for dsprust.
//!
//! The `Expr` enum represents all expressions in the disciplined
//! saddle-point framework. Expressions form an immutable DAG using `Arc`
//! for sharing; saddle atoms and saddle-extremum atoms appear as leaf-like
//! nodes carrying their own argument trees.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use nalgebra::DMatrix;
use nalgebra_sparse::CscMatrix;

use crate::saddle::atoms::SaddleAtom;
use crate::saddle::extremum::SaddleExtremum;

use super::shape::Shape;

/// Unique identifier for variables and atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(u64);

impl ExprId {
    /// Generate a new unique ID.
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);
        ExprId(NEXT_ID.fetch_add(1, Ordering::SeqCst))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ExprId {
    fn default() -> Self {
        Self::new()
    }
}

/// Efficient array storage (dense or sparse).
#[derive(Debug, Clone)]
pub enum Array {
    /// Dense matrix storage.
    Dense(DMatrix<f64>),
    /// Sparse CSC matrix storage.
    Sparse(CscMatrix<f64>),
    /// Scalar value.
    Scalar(f64),
}

impl Array {
    /// Get the shape of the array.
    pub fn shape(&self) -> Shape {
        match self {
            Array::Dense(m) => Shape::matrix(m.nrows(), m.ncols()),
            Array::Sparse(m) => Shape::matrix(m.nrows(), m.ncols()),
            Array::Scalar(_) => Shape::scalar(),
        }
    }

    /// Get the total number of elements.
    pub fn size(&self) -> usize {
        match self {
            Array::Dense(m) => m.nrows() * m.ncols(),
            Array::Sparse(m) => m.nrows() * m.ncols(),
            Array::Scalar(_) => 1,
        }
    }

    /// Try to get as a scalar value.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Array::Scalar(v) => Some(*v),
            Array::Dense(m) if m.nrows() == 1 && m.ncols() == 1 => Some(m[(0, 0)]),
            _ => None,
        }
    }

    /// The value as a dense matrix.
    pub fn to_dense(&self) -> DMatrix<f64> {
        match self {
            Array::Dense(m) => m.clone(),
            Array::Sparse(m) => crate::sparse::csc_to_dense(m),
            Array::Scalar(v) => DMatrix::from_element(1, 1, *v),
        }
    }

    /// Check if all elements are non-negative.
    pub fn is_nonneg(&self) -> bool {
        match self {
            Array::Scalar(v) => *v >= 0.0,
            Array::Dense(m) => m.iter().all(|&v| v >= 0.0),
            Array::Sparse(m) => m.values().iter().all(|&v| v >= 0.0),
        }
    }

    /// Check if all elements are non-positive.
    pub fn is_nonpos(&self) -> bool {
        match self {
            Array::Scalar(v) => *v <= 0.0,
            Array::Dense(m) => m.iter().all(|&v| v <= 0.0),
            Array::Sparse(m) => m.values().iter().all(|&v| v <= 0.0),
        }
    }

    /// Create from a scalar.
    pub fn from_scalar(v: f64) -> Self {
        Array::Scalar(v)
    }

    /// Create from a vector.
    pub fn from_vec(v: Vec<f64>) -> Self {
        let n = v.len();
        Array::Dense(DMatrix::from_vec(n, 1, v))
    }

    /// Create from a dense matrix.
    pub fn from_matrix(m: DMatrix<f64>) -> Self {
        Array::Dense(m)
    }
}

impl From<f64> for Array {
    fn from(v: f64) -> Self {
        Array::Scalar(v)
    }
}

impl From<Vec<f64>> for Array {
    fn from(v: Vec<f64>) -> Self {
        Array::from_vec(v)
    }
}

impl From<DMatrix<f64>> for Array {
    fn from(m: DMatrix<f64>) -> Self {
        Array::Dense(m)
    }
}

/// Data for a variable expression.
#[derive(Debug, Clone)]
pub struct VariableData {
    /// Unique identifier.
    pub id: ExprId,
    /// Shape of the variable.
    pub shape: Shape,
    /// Optional name for display.
    pub name: Option<String>,
    /// Variable is constrained to be non-negative.
    pub nonneg: bool,
    /// Variable is constrained to be non-positive.
    pub nonpos: bool,
    /// Variable is local to one saddle-extremum scope.
    pub local: bool,
}

impl VariableData {
    /// Display name: the user name if set, else `var<id>`.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("var{}", self.id.raw()),
        }
    }
}

/// Data for a constant expression.
#[derive(Debug, Clone)]
pub struct ConstantData {
    /// Unique identifier.
    pub id: ExprId,
    /// The constant value.
    pub value: Array,
}

impl ConstantData {
    /// Get the shape of the constant.
    pub fn shape(&self) -> Shape {
        self.value.shape()
    }
}

/// Specification for indexing operations.
#[derive(Debug, Clone)]
pub struct IndexSpec {
    /// Ranges for each dimension: (start, stop, step).
    /// None means take the whole dimension.
    pub ranges: Vec<Option<(usize, usize, usize)>>,
}

impl IndexSpec {
    /// Create an index spec for a single element.
    pub fn element(indices: Vec<usize>) -> Self {
        IndexSpec {
            ranges: indices.into_iter().map(|i| Some((i, i + 1, 1))).collect(),
        }
    }

    /// Create an index spec for a range.
    pub fn range(start: usize, stop: usize) -> Self {
        IndexSpec {
            ranges: vec![Some((start, stop, 1))],
        }
    }
}

/// The core expression type - an algebraic data type.
///
/// All expressions are immutable and use `Arc` for efficient sharing.
#[derive(Debug, Clone)]
pub enum Expr {
    // ========== Leaf nodes ==========
    /// A decision variable.
    Variable(VariableData),
    /// A constant value.
    Constant(ConstantData),

    // ========== Affine atoms ==========
    /// Addition: a + b
    Add(Arc<Expr>, Arc<Expr>),
    /// Negation: -a
    Neg(Arc<Expr>),
    /// Multiplication: a * b (scalar or elementwise with broadcast)
    Mul(Arc<Expr>, Arc<Expr>),
    /// Matrix-vector or matrix-matrix multiplication.
    MatMul(Arc<Expr>, Arc<Expr>),
    /// Sum of all entries.
    Sum(Arc<Expr>),
    /// Indexing/slicing.
    Index(Arc<Expr>, IndexSpec),
    /// Transpose.
    Transpose(Arc<Expr>),

    // ========== Nonlinear atoms ==========
    /// Exponential: exp(x) (elementwise).
    Exp(Arc<Expr>),
    /// Natural logarithm: log(x) (elementwise).
    Log(Arc<Expr>),
    /// L2 norm: ||x||_2
    Norm2(Arc<Expr>),
    /// Sum of squares: ||x||_2^2
    SumSquares(Arc<Expr>),
    /// Elementwise maximum of expressions.
    Maximum(Vec<Arc<Expr>>),
    /// Elementwise minimum of expressions.
    Minimum(Vec<Arc<Expr>>),

    // ========== Saddle nodes ==========
    /// A convex-concave atom (pairing, weighted log-sum-exp, quadratic
    /// form). Opaque to plain DCP analysis; the saddle parser consumes it.
    Saddle(Arc<SaddleAtom>),
    /// A saddle-extremum atom (sup or inf over local variables). Convex
    /// (sup) or concave (inf) to DCP analysis.
    Extremum(Arc<SaddleExtremum>),
}

impl Expr {
    /// Get the shape of the expression.
    pub fn shape(&self) -> Shape {
        match self {
            Expr::Variable(v) => v.shape.clone(),
            Expr::Constant(c) => c.shape(),

            Expr::Add(a, b) => a
                .shape()
                .broadcast(&b.shape())
                .unwrap_or_else(Shape::scalar),
            Expr::Neg(a) => a.shape(),
            Expr::Mul(a, b) => a
                .shape()
                .broadcast(&b.shape())
                .unwrap_or_else(Shape::scalar),
            Expr::MatMul(a, b) => a.shape().matmul(&b.shape()).unwrap_or_else(Shape::scalar),
            Expr::Sum(_) => Shape::scalar(),
            Expr::Index(a, spec) => {
                let base = a.shape();
                let mut new_dims = Vec::new();
                for (i, r) in spec.ranges.iter().enumerate() {
                    match r {
                        Some((start, stop, step)) => {
                            let size = (stop - start + step - 1) / step;
                            if size > 1 {
                                new_dims.push(size);
                            }
                        }
                        None => {
                            if i < base.ndim() {
                                new_dims.push(base.dims()[i]);
                            }
                        }
                    }
                }
                if new_dims.is_empty() {
                    Shape::scalar()
                } else {
                    Shape::from_dims(new_dims)
                }
            }
            Expr::Transpose(a) => a.shape().transpose(),

            Expr::Exp(a) | Expr::Log(a) => a.shape(),
            Expr::Norm2(_) | Expr::SumSquares(_) => Shape::scalar(),
            Expr::Maximum(exprs) | Expr::Minimum(exprs) => {
                if exprs.is_empty() {
                    Shape::scalar()
                } else {
                    exprs[0].shape()
                }
            }

            Expr::Saddle(_) | Expr::Extremum(_) => Shape::scalar(),
        }
    }

    /// Get the unique ID if this is a variable.
    pub fn variable_id(&self) -> Option<ExprId> {
        match self {
            Expr::Variable(v) => Some(v.id),
            _ => None,
        }
    }

    /// Check if this expression is a constant.
    pub fn is_constant(&self) -> bool {
        matches!(self, Expr::Constant(_))
    }

    /// Check if this expression is a variable.
    pub fn is_variable(&self) -> bool {
        matches!(self, Expr::Variable(_))
    }

    /// Get the constant value if this is a constant expression.
    pub fn constant_value(&self) -> Option<&Array> {
        match self {
            Expr::Constant(c) => Some(&c.value),
            _ => None,
        }
    }

    /// Collect the ids of all free variables in this expression.
    ///
    /// Saddle atoms contribute both variable groups; extremum atoms
    /// contribute only their free (non-local) variables.
    pub fn variables(&self) -> Vec<ExprId> {
        let mut vars = Vec::new();
        self.collect_variable_data(&mut vars);
        let mut ids: Vec<ExprId> = vars.into_iter().map(|v| v.id).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Collect `VariableData` for all free variables in this expression.
    pub fn variable_data(&self) -> Vec<VariableData> {
        let mut vars = Vec::new();
        self.collect_variable_data(&mut vars);
        vars.sort_by_key(|v| v.id);
        vars.dedup_by_key(|v| v.id);
        vars
    }

    pub(crate) fn collect_variable_data(&self, vars: &mut Vec<VariableData>) {
        match self {
            Expr::Variable(v) => vars.push(v.clone()),
            Expr::Constant(_) => {}

            Expr::Add(a, b) | Expr::Mul(a, b) | Expr::MatMul(a, b) => {
                a.collect_variable_data(vars);
                b.collect_variable_data(vars);
            }
            Expr::Neg(a)
            | Expr::Sum(a)
            | Expr::Index(a, _)
            | Expr::Transpose(a)
            | Expr::Exp(a)
            | Expr::Log(a)
            | Expr::Norm2(a)
            | Expr::SumSquares(a) => {
                a.collect_variable_data(vars);
            }
            Expr::Maximum(exprs) | Expr::Minimum(exprs) => {
                for e in exprs {
                    e.collect_variable_data(vars);
                }
            }

            Expr::Saddle(atom) => atom.collect_variable_data(vars),
            Expr::Extremum(ext) => ext.collect_free_variable_data(vars),
        }
    }
}

// Convenient From implementations for automatic conversion
impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        crate::expr::constant(value)
    }
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        crate::expr::constant(value as f64)
    }
}

impl From<&Expr> for Expr {
    fn from(expr: &Expr) -> Self {
        expr.clone()
    }
}
