//! Disciplined convexity analysis.
//!
//! This module provides the local composition rules the saddle machinery
//! builds on:
//! - Curvature tracking (convex, concave, affine, constant)
//! - Sign tracking (non-negative, non-positive, unknown)

pub mod curvature;
pub mod sign;

pub use curvature::{add_curvature, scalar_mul_curvature, Curvature};
pub use sign::{add_sign, mul_sign, Sign};
