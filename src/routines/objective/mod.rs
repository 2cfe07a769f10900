//! Objective functions minimized by the optimizers
//!
//! An [Objective] is a stateful evaluator: [Objective::update] moves it to a new point and
//! recomputes the cached loss value and gradient there, optionally preparing the Hessian-vector
//! product as well. Everything read afterwards ([Objective::value], [Objective::gradient],
//! [Objective::hessian_product]) refers to that point until the next update.
//!
//! The gradient and Hessian operator are borrowed from the objective, so the borrow checker
//! rejects any attempt to hold them across the next call to [Objective::update].

use eyre::Result;
use ndarray::linalg::general_mat_vec_mul;
use ndarray::{Array2, ArrayView1, ArrayViewMut1};

use crate::routines::linalg::Float;

pub mod logistic;
pub mod quadratic;

pub use logistic::LogisticLoss;
pub use quadratic::Quadratic;

/// A linear map `v ↦ H·v`, typically a Hessian evaluated at the current point
pub trait LinearOperator<A: Float> {
    /// Length of the vectors the operator acts on
    fn dimension(&self) -> usize;

    /// Write `H·v` into `out`
    ///
    /// Both `v` and `out` must have length [LinearOperator::dimension].
    fn apply(&self, v: ArrayView1<'_, A>, out: ArrayViewMut1<'_, A>);
}

impl<A: Float, T: LinearOperator<A> + ?Sized> LinearOperator<A> for &T {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn apply(&self, v: ArrayView1<'_, A>, out: ArrayViewMut1<'_, A>) {
        (**self).apply(v, out)
    }
}

/// A dense square matrix acts as its own operator
impl<A: Float> LinearOperator<A> for Array2<A> {
    fn dimension(&self) -> usize {
        self.nrows()
    }

    fn apply(&self, v: ArrayView1<'_, A>, mut out: ArrayViewMut1<'_, A>) {
        general_mat_vec_mul(A::one(), self, &v, A::zero(), &mut out);
    }
}

/// Smooth, twice-differentiable function to be minimized
pub trait Objective<A: Float> {
    /// Hessian-vector product operator at the current point
    type Hessian<'a>: LinearOperator<A>
    where
        Self: 'a;

    /// Length of the parameter vector
    fn dimension(&self) -> usize;

    /// Move to `x`, recomputing the value and gradient
    ///
    /// When `need_hessian` is set the Hessian-vector product is prepared as well; otherwise
    /// [Objective::hessian_product] fails until the next update that asks for it.
    fn update(&mut self, x: ArrayView1<'_, A>, need_hessian: bool) -> Result<()>;

    /// Loss at the last updated point
    fn value(&self) -> A;

    /// Gradient at the last updated point
    fn gradient(&self) -> ArrayView1<'_, A>;

    /// Hessian-vector product operator at the last updated point
    fn hessian_product(&self) -> Result<Self::Hessian<'_>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    #[test]
    fn dense_matrix_operator() {
        let a = array![[2.0, 1.0], [1.0, 3.0]];
        let v = array![1.0, -1.0];
        let mut out = Array1::zeros(2);
        a.apply(v.view(), out.view_mut());
        assert_eq!(out, array![1.0, -2.0]);
        assert_eq!((&a).dimension(), 2);
    }
}
