use eyre::{bail, Result};
use ndarray::linalg::general_mat_vec_mul;
use ndarray::{Array1, Array2, ArrayView1};

use super::Objective;
use crate::routines::linalg::{self, Float};

/// Convex quadratic `f(x) = ½xᵀAx - bᵀx`
///
/// The gradient is `Ax - b` and the Hessian is the constant matrix `A`, which should be
/// symmetric. When `A` is also positive-definite the unique minimizer is `A⁻¹b`.
#[derive(Debug, Clone)]
pub struct Quadratic<A> {
    matrix: Array2<A>,
    rhs: Array1<A>,
    value: A,
    gradient: Array1<A>,
    hessian_ready: bool,
}

impl<A: Float> Quadratic<A> {
    /// Create a new quadratic from `A` and `b`
    ///
    /// # Errors
    ///
    /// Fails if `A` is not square, if `b` does not match its size, or if any entry is not finite.
    pub fn new(matrix: Array2<A>, rhs: Array1<A>) -> Result<Self> {
        let (rows, cols) = matrix.dim();
        if rows != cols {
            bail!("The quadratic term must be square, got {}x{}", rows, cols);
        }
        if rhs.len() != rows {
            bail!(
                "The linear term has length {}, but the quadratic term is {}x{}",
                rhs.len(),
                rows,
                cols
            );
        }
        if matrix.iter().chain(rhs.iter()).any(|v| !v.is_finite()) {
            bail!("The quadratic objective must have finite coefficients");
        }
        Ok(Self {
            gradient: Array1::zeros(rows),
            value: A::zero(),
            matrix,
            rhs,
            hessian_ready: false,
        })
    }

    /// `f(x) = Σ xᵢ²`, i.e. `A = 2I` and `b = 0`
    pub fn sum_of_squares(n: usize) -> Self {
        let two = A::lit(2.0);
        Self {
            matrix: Array2::from_diag_elem(n, two),
            rhs: Array1::zeros(n),
            value: A::zero(),
            gradient: Array1::zeros(n),
            hessian_ready: false,
        }
    }

    pub fn matrix(&self) -> &Array2<A> {
        &self.matrix
    }

    pub fn rhs(&self) -> &Array1<A> {
        &self.rhs
    }
}

impl<A: Float> Objective<A> for Quadratic<A> {
    type Hessian<'a> = &'a Array2<A> where Self: 'a;

    fn dimension(&self) -> usize {
        self.rhs.len()
    }

    fn update(&mut self, x: ArrayView1<'_, A>, need_hessian: bool) -> Result<()> {
        if x.len() != self.dimension() {
            bail!(
                "Point has length {}, but the objective has dimension {}",
                x.len(),
                self.dimension()
            );
        }
        // g = Ax - b
        linalg::copy(&self.rhs, &mut self.gradient);
        general_mat_vec_mul(A::one(), &self.matrix, &x, -A::one(), &mut self.gradient);
        // ½xᵀAx - bᵀx = ½(xᵀg - bᵀx)
        self.value = A::lit(0.5) * (linalg::dot(&x, &self.gradient) - linalg::dot(&self.rhs, &x));
        self.hessian_ready = need_hessian;
        Ok(())
    }

    fn value(&self) -> A {
        self.value
    }

    fn gradient(&self) -> ArrayView1<'_, A> {
        self.gradient.view()
    }

    fn hessian_product(&self) -> Result<Self::Hessian<'_>> {
        if !self.hessian_ready {
            bail!("The Hessian was not prepared by the last update");
        }
        Ok(&self.matrix)
    }
}
