//! Disciplined saddle-point programming.
//!
//! Saddle functions are convex in one variable group and concave in the
//! other. This module provides:
//! - the atom library (`atoms`): bilinear pairings, weighted log-sum-exp
//!   and saddle quadratic forms
//! - saddle extrema (`extremum`): partial suprema and infima usable inside
//!   ordinary convex problems
//! - the conic machinery behind them: variable layouts, K-representations,
//!   the switching transform and semi-infinite dualization
//! - the `SaddleProblem` driver that solves both passes and cross-checks
//!   the saddle value

pub mod atoms;
pub mod eval;
pub mod extremum;
pub mod k_repr;
pub mod layout;
pub mod parser;
pub mod problem;
pub mod semi_infinite;
pub mod switch;

pub use atoms::{inner, saddle_inner, saddle_quad_form, weighted_log_sum_exp, SaddleAtom};
pub use eval::{evaluate, Assignment};
pub use extremum::{saddle_max, saddle_min, SaddleExtremum};
pub use problem::{MinimizeMaximize, SaddleProblem, SaddleSolution};
pub use semi_infinite::default_saddle_canon_table;
