//! Nonlinear atoms for convex optimization.
//!
//! These atoms have specific curvature properties (convex or concave)
//! and require DCP composition rules to be applied correctly.

use std::sync::Arc;

use crate::expr::Expr;

/// L2 norm: ||x||_2 = sqrt(sum(x_i^2)).
///
/// Properties:
/// - Curvature: Convex
/// - Sign: Non-negative
/// - Monotonicity: Increasing for x >= 0, decreasing for x <= 0
pub fn norm2(x: &Expr) -> Expr {
    Expr::Norm2(Arc::new(x.clone()))
}

/// Sum of squares: ||x||_2^2 = x' x.
///
/// Properties:
/// - Curvature: Convex
/// - Sign: Non-negative
/// - Monotonicity: Increasing for x >= 0, decreasing for x <= 0
pub fn sum_squares(x: &Expr) -> Expr {
    Expr::SumSquares(Arc::new(x.clone()))
}

/// Exponential function (elementwise): exp(x)
///
/// Convex when x is convex.
pub fn exp(x: &Expr) -> Expr {
    Expr::Exp(Arc::new(x.clone()))
}

/// Natural logarithm (elementwise): log(x)
///
/// Concave when x is concave (and positive).
pub fn log(x: &Expr) -> Expr {
    Expr::Log(Arc::new(x.clone()))
}

/// Maximum of expressions (element-wise if same shape).
///
/// Properties:
/// - Curvature: Convex (when all arguments are convex)
/// - Monotonicity: Increasing in all arguments
pub fn maximum(exprs: Vec<Expr>) -> Expr {
    if exprs.len() == 1 {
        return exprs.into_iter().next().unwrap();
    }
    Expr::Maximum(exprs.into_iter().map(Arc::new).collect())
}

/// Maximum of two expressions.
pub fn max2(a: &Expr, b: &Expr) -> Expr {
    maximum(vec![a.clone(), b.clone()])
}

/// Minimum of expressions (element-wise if same shape).
///
/// Properties:
/// - Curvature: Concave (when all arguments are concave)
/// - Monotonicity: Increasing in all arguments
pub fn minimum(exprs: Vec<Expr>) -> Expr {
    if exprs.len() == 1 {
        return exprs.into_iter().next().unwrap();
    }
    Expr::Minimum(exprs.into_iter().map(Arc::new).collect())
}

/// Minimum of two expressions.
pub fn min2(a: &Expr, b: &Expr) -> Expr {
    minimum(vec![a.clone(), b.clone()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dcp::Curvature;
    use crate::expr::variable;

    #[test]
    fn test_norm2_convex() {
        let x = variable(5);
        let n = norm2(&x);
        assert_eq!(n.curvature(), Curvature::Convex);
    }

    #[test]
    fn test_sum_squares_convex() {
        let x = variable(5);
        let s = sum_squares(&x);
        assert!(s.is_convex());
        assert!(!s.is_concave());
    }

    #[test]
    fn test_exp_convex() {
        let x = variable(());
        assert!(exp(&x).is_convex());
    }

    #[test]
    fn test_log_concave() {
        let x = variable(());
        assert!(log(&x).is_concave());
    }

    #[test]
    fn test_max_of_affine_convex() {
        let x = variable(5);
        let y = variable(5);
        let m = max2(&x, &y);
        assert!(m.is_convex());
        assert!(!m.is_concave());
    }

    #[test]
    fn test_min_of_affine_concave() {
        let x = variable(5);
        let y = variable(5);
        let m = min2(&x, &y);
        assert!(m.is_concave());
        assert!(!m.is_convex());
    }
}
