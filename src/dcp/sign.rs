//! Sign tracking.
//!
//! Tracks whether expressions are non-negative, non-positive, or of
//! unknown sign. Sign information drives the implicit-domain checks of
//! the saddle atoms: an atom whose weight argument is not certified
//! non-negative attaches an implicit constraint and emits a diagnostic.

use crate::expr::Expr;
use crate::saddle::atoms::SaddleAtomKind;

/// Sign of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sign {
    /// Expression is always >= 0.
    Nonnegative,
    /// Expression is always <= 0.
    Nonpositive,
    /// Expression is always == 0.
    Zero,
    /// Sign is unknown.
    Unknown,
}

impl Sign {
    /// Check if the sign is non-negative (>= 0).
    pub fn is_nonneg(self) -> bool {
        matches!(self, Sign::Nonnegative | Sign::Zero)
    }

    /// Check if the sign is non-positive (<= 0).
    pub fn is_nonpos(self) -> bool {
        matches!(self, Sign::Nonpositive | Sign::Zero)
    }

    /// Check if the sign is zero.
    pub fn is_zero(self) -> bool {
        matches!(self, Sign::Zero)
    }

    /// Negate the sign.
    pub fn negate(self) -> Self {
        match self {
            Sign::Nonnegative => Sign::Nonpositive,
            Sign::Nonpositive => Sign::Nonnegative,
            Sign::Zero => Sign::Zero,
            Sign::Unknown => Sign::Unknown,
        }
    }
}

/// Combine signs for addition: a + b.
pub fn add_sign(a: Sign, b: Sign) -> Sign {
    use Sign::*;
    match (a, b) {
        (Zero, x) | (x, Zero) => x,
        (Nonnegative, Nonnegative) => Nonnegative,
        (Nonpositive, Nonpositive) => Nonpositive,
        (Nonnegative, Nonpositive) | (Nonpositive, Nonnegative) => Unknown,
        (Unknown, _) | (_, Unknown) => Unknown,
    }
}

/// Combine signs for multiplication: a * b.
pub fn mul_sign(a: Sign, b: Sign) -> Sign {
    use Sign::*;
    match (a, b) {
        (Zero, _) | (_, Zero) => Zero,
        (Nonnegative, Nonnegative) | (Nonpositive, Nonpositive) => Nonnegative,
        (Nonnegative, Nonpositive) | (Nonpositive, Nonnegative) => Nonpositive,
        (Unknown, _) | (_, Unknown) => Unknown,
    }
}

impl Expr {
    /// Get the sign of this expression.
    pub fn sign(&self) -> Sign {
        match self {
            Expr::Variable(v) => {
                if v.nonneg {
                    Sign::Nonnegative
                } else if v.nonpos {
                    Sign::Nonpositive
                } else {
                    Sign::Unknown
                }
            }
            Expr::Constant(c) => {
                if c.value.is_nonneg() && c.value.is_nonpos() {
                    Sign::Zero
                } else if c.value.is_nonneg() {
                    Sign::Nonnegative
                } else if c.value.is_nonpos() {
                    Sign::Nonpositive
                } else {
                    Sign::Unknown
                }
            }

            Expr::Add(a, b) => add_sign(a.sign(), b.sign()),
            Expr::Neg(a) => a.sign().negate(),
            Expr::Mul(a, b) => mul_sign(a.sign(), b.sign()),
            Expr::MatMul(a, b) => {
                let as_ = a.sign();
                let bs = b.sign();
                if as_.is_zero() || bs.is_zero() {
                    Sign::Zero
                } else if (as_.is_nonneg() && bs.is_nonneg())
                    || (as_.is_nonpos() && bs.is_nonpos())
                {
                    Sign::Nonnegative
                } else {
                    Sign::Unknown
                }
            }
            Expr::Sum(a) => a.sign(),
            Expr::Index(a, _) => a.sign(),
            Expr::Transpose(a) => a.sign(),

            Expr::Norm2(_) | Expr::SumSquares(_) => Sign::Nonnegative,
            Expr::Exp(_) => Sign::Nonnegative,
            // log(x) straddles zero around x = 1
            Expr::Log(_) => Sign::Unknown,
            Expr::Maximum(exprs) => {
                if exprs.iter().any(|e| e.sign().is_nonneg()) {
                    Sign::Nonnegative
                } else if exprs.iter().all(|e| e.sign().is_nonpos()) {
                    Sign::Nonpositive
                } else {
                    Sign::Unknown
                }
            }
            Expr::Minimum(exprs) => {
                if exprs.iter().any(|e| e.sign().is_nonpos()) {
                    Sign::Nonpositive
                } else if exprs.iter().all(|e| e.sign().is_nonneg()) {
                    Sign::Nonnegative
                } else {
                    Sign::Unknown
                }
            }

            Expr::Saddle(atom) => match atom.kind() {
                // A pairing of two non-negative sides is non-negative; the
                // quadratic form needs its matrix argument PSD, which the
                // problem certifies, so x'Px >= 0.
                SaddleAtomKind::Inner => {
                    if atom.convex_arg().sign().is_nonneg()
                        && atom.concave_arg().sign().is_nonneg()
                    {
                        Sign::Nonnegative
                    } else {
                        Sign::Unknown
                    }
                }
                SaddleAtomKind::WeightedLogSumExp => Sign::Unknown,
                SaddleAtomKind::QuadForm => Sign::Nonnegative,
            },
            Expr::Extremum(ext) => ext.objective().sign(),
        }
    }

    /// Check if this expression is non-negative.
    pub fn is_nonneg(&self) -> bool {
        self.sign().is_nonneg()
    }

    /// Check if this expression is non-positive.
    pub fn is_nonpos(&self) -> bool {
        self.sign().is_nonpos()
    }
}
