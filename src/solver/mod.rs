//! Solver interface for dsprust.
//!
//! This module provides:
//! - Matrix stuffing to convert cone-constrained programs to solver format
//! - Clarabel solver integration

pub mod clarabel;
pub mod stuffing;

pub use self::clarabel::{solve_cone_program, Settings, Solution, SolveStatus};
pub use stuffing::{stuff_problem, ConeDims, StuffedProblem, VariableMap};
