//! Curvature tracking for disciplined convexity analysis.
//!
//! This module implements the curvature rules that determine whether an
//! expression is convex, concave, affine, or unknown. Saddle atoms are
//! opaque to these rules (the saddle parser handles them); saddle-extremum
//! atoms are convex (sup) or concave (inf).

use crate::expr::Expr;
use crate::saddle::extremum::ExtremumMode;

/// Curvature of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Curvature {
    /// Constant value (most restrictive).
    Constant,
    /// Affine function (both convex and concave).
    Affine,
    /// Convex function.
    Convex,
    /// Concave function.
    Concave,
    /// Unknown curvature (not DCP-compliant).
    Unknown,
}

impl Curvature {
    /// Check if the curvature is convex (constant, affine, or convex).
    pub fn is_convex(self) -> bool {
        matches!(
            self,
            Curvature::Constant | Curvature::Affine | Curvature::Convex
        )
    }

    /// Check if the curvature is concave (constant, affine, or concave).
    pub fn is_concave(self) -> bool {
        matches!(
            self,
            Curvature::Constant | Curvature::Affine | Curvature::Concave
        )
    }

    /// Check if the curvature is affine (constant or affine).
    pub fn is_affine(self) -> bool {
        matches!(self, Curvature::Constant | Curvature::Affine)
    }

    /// Check if this is a constant.
    pub fn is_constant(self) -> bool {
        matches!(self, Curvature::Constant)
    }

    /// Negate the curvature (convex <-> concave).
    pub fn negate(self) -> Self {
        match self {
            Curvature::Convex => Curvature::Concave,
            Curvature::Concave => Curvature::Convex,
            other => other,
        }
    }
}

/// Combine curvatures for addition: a + b.
pub fn add_curvature(a: Curvature, b: Curvature) -> Curvature {
    use Curvature::*;
    match (a, b) {
        (Constant, x) | (x, Constant) => x,
        (Affine, Affine) => Affine,
        (Affine, x) | (x, Affine) => x,
        (Convex, Convex) => Convex,
        (Concave, Concave) => Concave,
        (Convex, Concave) | (Concave, Convex) => Unknown,
        (Unknown, _) | (_, Unknown) => Unknown,
    }
}

/// Combine curvatures for scalar multiplication: scalar * expr.
pub fn scalar_mul_curvature(scalar: f64, expr_curv: Curvature) -> Curvature {
    if scalar == 0.0 {
        Curvature::Constant
    } else if scalar > 0.0 {
        expr_curv
    } else {
        expr_curv.negate()
    }
}

impl Expr {
    /// Get the curvature of this expression.
    pub fn curvature(&self) -> Curvature {
        match self {
            // Leaves
            Expr::Variable(_) => Curvature::Affine,
            Expr::Constant(_) => Curvature::Constant,

            // Affine operations preserve/combine curvatures
            Expr::Add(a, b) => add_curvature(a.curvature(), b.curvature()),
            Expr::Neg(a) => a.curvature().negate(),
            Expr::Mul(a, b) => mul_curvature(a, b),
            Expr::MatMul(a, b) => matmul_curvature(a, b),
            Expr::Sum(a) => a.curvature(),
            Expr::Index(a, _) => a.curvature(),
            Expr::Transpose(a) => a.curvature(),

            // exp(x) is convex and increasing
            Expr::Exp(x) => {
                if x.curvature().is_convex() {
                    Curvature::Convex
                } else {
                    Curvature::Unknown
                }
            }
            // log(x) is concave and increasing
            Expr::Log(x) => {
                if x.curvature().is_concave() {
                    Curvature::Concave
                } else {
                    Curvature::Unknown
                }
            }
            Expr::Norm2(x) | Expr::SumSquares(x) => {
                if x.curvature().is_affine() {
                    Curvature::Convex
                } else {
                    Curvature::Unknown
                }
            }
            Expr::Maximum(exprs) => {
                if exprs.iter().all(|e| e.curvature().is_convex()) {
                    Curvature::Convex
                } else {
                    Curvature::Unknown
                }
            }
            Expr::Minimum(exprs) => {
                if exprs.iter().all(|e| e.curvature().is_concave()) {
                    Curvature::Concave
                } else {
                    Curvature::Unknown
                }
            }

            // Convex in one group, concave in the other: neither side of
            // plain DCP analysis may claim it.
            Expr::Saddle(_) => Curvature::Unknown,
            Expr::Extremum(ext) => match ext.mode() {
                ExtremumMode::Sup => Curvature::Convex,
                ExtremumMode::Inf => Curvature::Concave,
            },
        }
    }

    /// Check if this expression is convex.
    pub fn is_convex(&self) -> bool {
        self.curvature().is_convex()
    }

    /// Check if this expression is concave.
    pub fn is_concave(&self) -> bool {
        self.curvature().is_concave()
    }

    /// Check if this expression is affine.
    pub fn is_affine(&self) -> bool {
        self.curvature().is_affine()
    }
}

/// Handle elementwise/scalar multiplication curvature.
fn mul_curvature(a: &Expr, b: &Expr) -> Curvature {
    let ac = a.curvature();
    let bc = b.curvature();

    if ac.is_constant() && bc.is_constant() {
        return Curvature::Constant;
    }

    if ac.is_constant() {
        return const_mul_curvature(a, bc);
    }
    if bc.is_constant() {
        return const_mul_curvature(b, ac);
    }

    // Both non-constant: quadratic, not DCP
    Curvature::Unknown
}

fn const_mul_curvature(c: &Expr, other: Curvature) -> Curvature {
    if let Some(arr) = c.constant_value() {
        if let Some(scalar) = arr.as_scalar() {
            return scalar_mul_curvature(scalar, other);
        }
        // Elementwise product with a signed constant array
        if other.is_affine() {
            return Curvature::Affine;
        }
        if arr.is_nonneg() {
            return other;
        }
        if arr.is_nonpos() {
            return other.negate();
        }
    }
    Curvature::Unknown
}

/// Handle matrix multiplication curvature.
fn matmul_curvature(a: &Expr, b: &Expr) -> Curvature {
    let ac = a.curvature();
    let bc = b.curvature();

    // A constant matrix has entries of mixed sign in general, so only
    // affine arguments survive.
    if ac.is_constant() {
        return if bc.is_affine() { bc } else { Curvature::Unknown };
    }
    if bc.is_constant() {
        return if ac.is_affine() { ac } else { Curvature::Unknown };
    }

    Curvature::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{constant, variable};
    use std::sync::Arc;

    #[test]
    fn test_curvature_basics() {
        assert!(Curvature::Affine.is_convex());
        assert!(Curvature::Affine.is_concave());
        assert!(Curvature::Affine.is_affine());

        assert!(Curvature::Convex.is_convex());
        assert!(!Curvature::Convex.is_concave());

        assert!(!Curvature::Concave.is_convex());
        assert!(Curvature::Concave.is_concave());
    }

    #[test]
    fn test_negate_curvature() {
        assert_eq!(Curvature::Convex.negate(), Curvature::Concave);
        assert_eq!(Curvature::Concave.negate(), Curvature::Convex);
        assert_eq!(Curvature::Affine.negate(), Curvature::Affine);
    }

    #[test]
    fn test_add_curvature() {
        use Curvature::*;
        assert_eq!(add_curvature(Convex, Convex), Convex);
        assert_eq!(add_curvature(Concave, Concave), Concave);
        assert_eq!(add_curvature(Convex, Affine), Convex);
        assert_eq!(add_curvature(Convex, Concave), Unknown);
    }

    #[test]
    fn test_variable_is_affine() {
        let x = variable(5);
        assert!(x.is_affine());
        assert!(x.is_convex());
        assert!(x.is_concave());
    }

    #[test]
    fn test_constant_is_constant() {
        let c = constant(5.0);
        assert_eq!(c.curvature(), Curvature::Constant);
    }

    #[test]
    fn test_exp_composition() {
        let x = variable(());
        let e = Expr::Exp(Arc::new(x.clone()));
        assert_eq!(e.curvature(), Curvature::Convex);
        // exp of a convex expression stays convex
        let ee = Expr::Exp(Arc::new(e));
        assert_eq!(ee.curvature(), Curvature::Convex);
        // exp of a concave expression is not DCP
        let log = Expr::Log(Arc::new(x));
        assert_eq!(Expr::Exp(Arc::new(log)).curvature(), Curvature::Unknown);
    }

    #[test]
    fn test_neg_flips_curvature() {
        let x = variable(5);
        let n = Expr::Norm2(Arc::new(x));
        let neg_n = Expr::Neg(Arc::new(n));
        assert_eq!(neg_n.curvature(), Curvature::Concave);
    }
}
