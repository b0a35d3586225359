//! Canonicalization transforms expressions into standard form.
//!
//! This module converts DCP expressions into:
//! - Linear expressions (LinExpr) for affine parts
//! - Cone constraints (ConeConstraint) for nonlinear atoms
//!
//! Saddle-extremum atoms are routed through a `SaddleCanonTable`, an
//! explicit registration table scoped to one compilation session.

pub mod canonicalizer;
pub mod lin_expr;

pub use canonicalizer::{
    canonicalize, canonicalize_with, CanonContext, CanonResult, ConeConstraint, SaddleCanonFn,
    SaddleCanonTable,
};
pub use lin_expr::LinExpr;
