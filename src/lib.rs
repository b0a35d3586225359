//! # dsprust
//!
//! A Rust implementation of Disciplined Saddle-point Programming (DSP).
//!
//! dsprust provides a domain-specific language for specifying convex-concave
//! saddle-point problems in Rust, with automatic verification of the saddle
//! composition rules and solving via conic dualization and the Clarabel
//! solver. Ordinary Disciplined Convex Programming (DCP) problems are
//! supported as the base layer.
//!
//! ## Quick Start
//!
//! ```ignore
//! use dsprust::prelude::*;
//!
//! // A matrix game: min over x, max over y of x' A y on the simplex.
//! let x = variable(2);
//! let y = variable(2);
//! let a = constant_matrix(2, 2, &[1.0, 2.0, 3.0, 4.0]);
//!
//! let objective = MinimizeMaximize::new(inner(&x, &matmul(&a, &y))?);
//! let problem = SaddleProblem::new(
//!     objective,
//!     vec![
//!         sum(&x).equals(&constant(1.0)),
//!         x.geq(&constant(0.0)),
//!         sum(&y).equals(&constant(1.0)),
//!         y.geq(&constant(0.0)),
//!     ],
//! )?;
//!
//! let solution = problem.solve()?;
//! println!("Saddle value: {}", solution.value);
//! ```
//!
//! ## Saddle composition rules
//!
//! A saddle objective is a sum of:
//!
//! - **Saddle atoms**: `inner`, `saddle_inner`, `weighted_log_sum_exp`,
//!   `saddle_quad_form` — convex in one variable group, concave in the other
//! - **Convex terms** of the minimization group
//! - **Concave terms** of the maximization group
//! - **Affine terms** mixing the two groups
//!
//! Inner extrema (`saddle_max`, `saddle_min`) wrap a saddle expression into
//! a purely convex or concave atom usable inside ordinary `Problem`s.
//!
//! ## Architecture
//!
//! - **Expression trees** built using the `Expr` enum with `Arc` sharing
//! - **DCP verification** via curvature and sign tracking
//! - **K-representations** pair each saddle term against the concave
//!   group's stacked vector
//! - **Conic dualization** eliminates inner maximizations and switches
//!   representations between the two solve passes
//! - **Clarabel solver** for the resulting LP, SOCP, and exponential-cone
//!   programs

pub mod atoms;
pub mod canon;
pub mod constraints;
pub mod dcp;
pub mod error;
pub mod expr;
pub mod problem;
pub mod saddle;
pub mod solver;
pub mod sparse;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use dsprust::prelude::*;
/// ```
pub mod prelude {
    // Expression types
    pub use crate::expr::{
        constant, constant_dmatrix, constant_matrix, constant_vec, eye, local_variable,
        named_variable, nonneg_variable, ones, variable, zeros, Array, Expr, ExprId, IntoConstant,
        Shape, VariableBuilder, VariableExt,
    };

    // Atoms
    pub use crate::atoms::{
        dot, exp, index, log, matmul, max2, maximum, min2, minimum, norm2, slice, sum,
        sum_squares, transpose,
    };

    // Saddle programming
    pub use crate::saddle::{
        evaluate, inner, saddle_inner, saddle_max, saddle_min, saddle_quad_form,
        weighted_log_sum_exp, Assignment, MinimizeMaximize, SaddleProblem, SaddleSolution,
    };

    // Constraints
    pub use crate::constraints::{Constraint, ConstraintExt};

    // DCP
    pub use crate::dcp::{Curvature, Sign};

    // Problem
    pub use crate::problem::{Objective, Problem, ProblemBuilder};

    // Solver
    pub use crate::solver::{Settings, Solution, SolveStatus};

    // Errors
    pub use crate::error::{Diagnostic, DspError, Result};
}

// Re-export main types at crate root
pub use error::{DspError, Result};
pub use problem::Problem;
pub use saddle::{MinimizeMaximize, SaddleProblem, SaddleSolution};
pub use solver::{Solution, SolveStatus};
