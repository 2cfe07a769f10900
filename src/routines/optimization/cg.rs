//! Truncated conjugate gradient for the Newton system
//!
//! [cg_solve] approximately solves `H·d = -g` with the preconditioner-free CG iteration,
//! stopping on a relative residual tolerance, on the inner iteration budget, or as soon as a
//! search direction of non-positive curvature is met (Steihaug truncation).

use eyre::{bail, Result};
use ndarray::{Array1, ArrayBase, Data, Ix1};
use serde_derive::Serialize;

use crate::routines::linalg::{self, Float};
use crate::routines::objective::LinearOperator;

/// Scratch vectors used by [cg_solve]
///
/// `residual`, `search` and `product` hold `r`, `p` and `H·p` respectively. Their contents are
/// meaningless between solves and may be reused by the caller.
#[derive(Debug, Clone)]
pub struct CgScratch<A> {
    pub residual: Array1<A>,
    pub search: Array1<A>,
    pub product: Array1<A>,
}

impl<A: Float> CgScratch<A> {
    pub fn new(n: usize) -> Self {
        Self {
            residual: Array1::zeros(n),
            search: Array1::zeros(n),
            product: Array1::zeros(n),
        }
    }

    pub fn len(&self) -> usize {
        self.residual.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residual.is_empty()
    }
}

/// Stopping parameters for [cg_solve]
#[derive(Debug, Clone, Copy)]
pub struct CgOptions<A> {
    /// Relative tolerance: stop when `‖r‖ <= tol·‖r₀‖`
    pub tol: A,
    /// Absolute floor on the residual norm
    pub atol: A,
    /// Maximum number of inner iterations
    pub max_inner: usize,
}

/// Why the inner solve stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CgTermination {
    /// The residual met the tolerance
    Converged,
    /// A search direction with `pᵀHp <= 0` was found
    NegativeCurvature,
    /// The inner iteration budget was exhausted
    MaxIterations,
}

#[derive(Debug, Clone, Copy)]
pub struct CgOutcome<A> {
    /// Number of Hessian-vector products evaluated by the iteration
    pub iterations: usize,
    /// Norm of the residual when the solve stopped
    pub residual_norm: A,
    pub termination: CgTermination,
}

/// Approximately solve `H·d = -g`, updating `d` in place
///
/// `d` is the starting point, usually zero. When non-positive curvature is met on the first inner
/// step and `d` started at zero, `d` is set to the steepest-descent direction `-g`; later
/// detections keep the iterate reached so far.
///
/// # Errors
///
/// Fails if the vector lengths disagree with the operator, or if the residual or curvature stop
/// being finite.
pub fn cg_solve<A, S, H>(
    hop: &H,
    g: &ArrayBase<S, Ix1>,
    d: &mut Array1<A>,
    scratch: &mut CgScratch<A>,
    options: &CgOptions<A>,
) -> Result<CgOutcome<A>>
where
    A: Float,
    S: Data<Elem = A>,
    H: LinearOperator<A> + ?Sized,
{
    let n = hop.dimension();
    if g.len() != n || d.len() != n || scratch.len() != n {
        bail!(
            "CG dimension mismatch: operator {}, right-hand side {}, direction {}, scratch {}",
            n,
            g.len(),
            d.len(),
            scratch.len()
        );
    }
    let CgScratch {
        residual: r,
        search: p,
        product: hp,
    } = scratch;

    // r₀ = -g - H·d₀
    let warm_start = d.iter().any(|v| *v != A::zero());
    if warm_start {
        hop.apply(d.view(), hp.view_mut());
        linalg::copy(hp, r);
        linalg::axpy(A::one(), g, r);
        linalg::scale(-A::one(), r);
    } else {
        linalg::copy(g, r);
        linalg::scale(-A::one(), r);
    }

    let mut rr = linalg::dot(r, r);
    let r0_norm = rr.sqrt();
    if !r0_norm.is_finite() {
        bail!("CG initial residual is not finite");
    }
    let threshold = (options.tol * r0_norm).max(options.atol);
    if r0_norm == A::zero() || r0_norm <= threshold {
        return Ok(CgOutcome {
            iterations: 0,
            residual_norm: r0_norm,
            termination: CgTermination::Converged,
        });
    }

    linalg::copy(r, p);
    for k in 1..=options.max_inner {
        hop.apply(p.view(), hp.view_mut());
        let curvature = linalg::dot(p, hp);
        if !curvature.is_finite() {
            bail!("CG curvature is not finite at inner iteration {}", k);
        }
        if curvature <= A::zero() {
            if k == 1 && !warm_start {
                linalg::copy(p, d);
            }
            tracing::debug!(
                inner_iteration = k,
                curvature = %curvature,
                "CG stopped on non-positive curvature"
            );
            return Ok(CgOutcome {
                iterations: k,
                residual_norm: rr.sqrt(),
                termination: CgTermination::NegativeCurvature,
            });
        }

        let alpha = rr / curvature;
        linalg::axpy(alpha, p, d);
        linalg::axpy(-alpha, hp, r);

        let rr_next = linalg::dot(r, r);
        let r_norm = rr_next.sqrt();
        if !r_norm.is_finite() {
            bail!("CG residual is not finite at inner iteration {}", k);
        }
        if r_norm <= threshold {
            return Ok(CgOutcome {
                iterations: k,
                residual_norm: r_norm,
                termination: CgTermination::Converged,
            });
        }

        // p = r + β·p
        let beta = rr_next / rr;
        linalg::xpby(r, beta, p);
        rr = rr_next;
    }

    Ok(CgOutcome {
        iterations: options.max_inner,
        residual_norm: rr.sqrt(),
        termination: CgTermination::MaxIterations,
    })
}
