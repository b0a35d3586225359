//! Atom functions for building expressions.
//!
//! Atoms are the building blocks of optimization problems. They include:
//!
//! - **Affine atoms**: Operations that preserve linearity (add, mul, sum, etc.)
//! - **Nonlinear atoms**: Operations with specific curvature (norms, exp, log, etc.)
//!
//! Saddle atoms (bilinear pairings and friends) live in `crate::saddle::atoms`.

pub mod affine;
pub mod nonlinear;

// Re-export affine operations
pub use affine::{dot, index, matmul, slice, sum, transpose};

// Re-export nonlinear atoms
pub use nonlinear::{exp, log, max2, maximum, min2, minimum, norm2, sum_squares};
