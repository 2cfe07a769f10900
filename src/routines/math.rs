//! Mathematical utility functions for numerical stability
//!
//! This module provides stable implementations of the scalar functions used by the logistic loss.

use crate::routines::linalg::Float;

/// Compute the logistic sigmoid `1 / (1 + exp(-z))` without overflow.
///
/// For negative arguments the equivalent form `exp(z) / (1 + exp(z))` is used, so `exp` is only
/// ever evaluated at non-positive arguments.
///
/// # Example
/// ```ignore
/// let p = sigmoid(0.0);
/// // p == 0.5
/// ```
#[inline]
pub fn sigmoid<A: Float>(z: A) -> A {
    if z >= A::zero() {
        A::one() / (A::one() + (-z).exp())
    } else {
        let e = z.exp();
        e / (A::one() + e)
    }
}

/// Compute `log(1 + exp(z))` in a numerically stable way.
///
/// Uses `softplus(z) = max(z, 0) + log1p(exp(-|z|))`, which neither overflows for large positive
/// `z` nor loses precision for large negative `z`.
#[inline]
pub fn softplus<A: Float>(z: A) -> A {
    z.max(A::zero()) + (-z.abs()).exp().ln_1p()
}
