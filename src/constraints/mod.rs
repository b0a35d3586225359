//! Constraints for optimization and saddle problems.

pub mod constraint;

pub use constraint::{Constraint, ConstraintExt};
