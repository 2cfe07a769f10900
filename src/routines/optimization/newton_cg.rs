//! Inexact (truncated) Newton method with a conjugate gradient inner solver
//!
//! Each outer iteration approximately solves the Newton system `H·d = -g` with [cg_solve] to a
//! relative tolerance chosen from the forcing sequence `min(√‖g‖₁, 0.5)`, checks that the result
//! is a descent direction, and takes a step along it with [backtracking].
//!
//! # Example
//! ```ignore
//! let mut f = Quadratic::<f64>::sum_of_squares(4);
//! let mut x = Array1::ones(4);
//! let outcome = solve(&mut f, &mut x, 1e-6, 10, 10)?;
//! assert!(outcome.is_converged());
//! ```

use eyre::{bail, Result};
use ndarray::Array1;
use serde_derive::Serialize;

use super::cg::{cg_solve, CgOptions, CgScratch, CgTermination};
use super::line_search::{backtracking, LineSearchOptions};
use crate::routines::linalg::{self, Float};
use crate::routines::objective::Objective;

/// Buffers shared by all outer iterations of a solve
#[derive(Debug, Clone)]
pub struct Workspace<A> {
    pub cg: CgScratch<A>,
    pub direction: Array1<A>,
}

impl<A: Float> Workspace<A> {
    pub fn new(n: usize) -> Self {
        Self {
            cg: CgScratch::new(n),
            direction: Array1::zeros(n),
        }
    }
}

/// How a solve terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    /// The largest gradient component fell below the tolerance
    Converged,
    /// No descent direction was found within the allowed number of attempts
    NoDescentDirection,
    /// The outer iteration budget was exhausted
    MaxIterationsReached,
}

#[derive(Debug, Clone, Copy)]
pub struct NewtonCgOptions<A> {
    /// Convergence tolerance on `max |gᵢ|`
    pub tol: A,
    /// Maximum number of outer iterations
    pub max_iter: usize,
    /// Maximum number of CG iterations per attempt
    pub max_inner: usize,
    /// Number of CG solves tried per outer iteration before giving up on finding a descent
    /// direction
    pub max_descent_attempts: usize,
    pub line_search: LineSearchOptions<A>,
}

impl<A: Float> Default for NewtonCgOptions<A> {
    fn default() -> Self {
        Self {
            tol: A::lit(1e-4),
            max_iter: 100,
            max_inner: 100,
            max_descent_attempts: 10,
            line_search: LineSearchOptions::default(),
        }
    }
}

impl<A: Float> NewtonCgOptions<A> {
    pub fn validate(&self) -> Result<()> {
        if !self.tol.is_finite() || self.tol <= A::zero() {
            bail!("The tolerance must be positive, got {}", self.tol);
        }
        if self.max_descent_attempts == 0 {
            bail!("At least one attempt at finding a descent direction is required");
        }
        self.line_search.validate()
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct NewtonCgOutcome<A> {
    pub status: Status,
    /// Outer iterations started
    pub iterations: usize,
    /// Newton steps that moved `x`
    ///
    /// A zero direction, for instance from `max_inner = 0`, is committed but not counted.
    pub steps: usize,
    /// CG iterations summed over all outer iterations and attempts
    pub inner_iterations: usize,
    /// Objective value at the last evaluated point
    pub value: A,
    /// `max |gᵢ|` at the start of the last outer iteration
    pub grad_max_abs: A,
    /// Length of the last committed step
    pub update_norm: A,
    /// Steps committed without satisfying the Armijo condition
    pub line_search_failures: usize,
}

impl<A> NewtonCgOutcome<A> {
    pub fn is_converged(&self) -> bool {
        self.status == Status::Converged
    }
}

/// Minimize `f` starting from `x` with default settings for everything but the stopping rules
pub fn solve<A, O>(
    f: &mut O,
    x: &mut Array1<A>,
    tol: A,
    max_iter: usize,
    max_inner: usize,
) -> Result<NewtonCgOutcome<A>>
where
    A: Float,
    O: Objective<A> + ?Sized,
{
    let options = NewtonCgOptions {
        tol,
        max_iter,
        max_inner,
        ..Default::default()
    };
    newton_cg(f, x, &options)
}

/// Minimize `f` starting from `x`, overwriting `x` with the final iterate
///
/// # Errors
///
/// Fails on invalid options, when `x` does not match the dimension of `f`, when the gradient or
/// an inner CG scalar stops being finite, or when the objective reports an error. `x` then holds
/// the last committed iterate.
pub fn newton_cg<A, O>(
    f: &mut O,
    x: &mut Array1<A>,
    options: &NewtonCgOptions<A>,
) -> Result<NewtonCgOutcome<A>>
where
    A: Float,
    O: Objective<A> + ?Sized,
{
    options.validate()?;
    let n = f.dimension();
    if x.len() != n {
        bail!(
            "Starting point has length {}, but the objective has dimension {}",
            x.len(),
            n
        );
    }
    let mut ws = Workspace::new(n);
    let line_search = LineSearchOptions {
        x_evaluated: true,
        ..options.line_search
    };

    let mut outcome = NewtonCgOutcome {
        status: Status::MaxIterationsReached,
        iterations: 0,
        steps: 0,
        inner_iterations: 0,
        value: A::zero(),
        grad_max_abs: A::zero(),
        update_norm: A::zero(),
        line_search_failures: 0,
    };

    while outcome.iterations < options.max_iter {
        outcome.iterations += 1;

        f.update(x.view(), true)?;
        let grad_norm = linalg::l1_norm(&f.gradient());
        let grad_max_abs = linalg::max_abs(&f.gradient());
        outcome.value = f.value();
        outcome.grad_max_abs = grad_max_abs;
        if !grad_norm.is_finite() || !grad_max_abs.is_finite() {
            bail!(
                "The gradient is not finite at outer iteration {}",
                outcome.iterations
            );
        }
        tracing::info!(
            iteration = outcome.iterations,
            grad_norm = %grad_norm,
            grad_max_abs = %grad_max_abs,
            loss = %outcome.value,
            "Newton-CG"
        );

        if grad_max_abs < options.tol {
            outcome.status = Status::Converged;
            return Ok(outcome);
        }

        let descent = find_descent_direction(f, grad_norm, options, &mut ws, &mut outcome)?;
        if !descent {
            tracing::warn!(
                iteration = outcome.iterations,
                attempts = options.max_descent_attempts,
                "No descent direction found"
            );
            outcome.status = Status::NoDescentDirection;
            return Ok(outcome);
        }

        let Workspace { cg, direction } = &mut ws;
        let step = backtracking(f, x, direction, &mut cg.search, &line_search)?;
        if !step.accepted {
            outcome.line_search_failures += 1;
            tracing::warn!(
                iteration = outcome.iterations,
                alpha = %step.alpha,
                trials = step.trials,
                "Line search exhausted its trials, taking the smallest step"
            );
        }
        outcome.value = step.value;
        outcome.update_norm = step.alpha * linalg::l2_norm(&*direction);

        linalg::copy(&cg.search, x);
        if outcome.update_norm > A::zero() {
            outcome.steps += 1;
        }
    }

    Ok(outcome)
}

/// Run CG with a tightening tolerance until it yields a direction with `g·d <= 0`
///
/// The direction is left in `ws.direction`. Returns `false` when every attempt produced an ascent
/// direction.
fn find_descent_direction<A, O>(
    f: &O,
    grad_norm: A,
    options: &NewtonCgOptions<A>,
    ws: &mut Workspace<A>,
    outcome: &mut NewtonCgOutcome<A>,
) -> Result<bool>
where
    A: Float,
    O: Objective<A> + ?Sized,
{
    let hessian = f.hessian_product()?;
    let gradient = f.gradient();
    let mut cg_options = CgOptions {
        tol: grad_norm.sqrt().min(A::lit(0.5)),
        atol: A::zero(),
        max_inner: options.max_inner,
    };

    for attempt in 1..=options.max_descent_attempts {
        if attempt > 1 {
            cg_options.tol = cg_options.tol / A::lit(10.0);
        }
        linalg::fill(&mut ws.direction, A::zero());

        let cg = cg_solve(&hessian, &gradient, &mut ws.direction, &mut ws.cg, &cg_options)?;
        outcome.inner_iterations += cg.iterations;

        let desc = linalg::dot(&gradient, &ws.direction);
        if !desc.is_finite() {
            bail!("The directional derivative is not finite");
        }
        tracing::debug!(
            attempt,
            inner_iterations = cg.iterations,
            residual = %cg.residual_norm,
            negative_curvature = cg.termination == CgTermination::NegativeCurvature,
            desc = %desc,
            "CG solve"
        );
        if desc <= A::zero() {
            return Ok(true);
        }
        tracing::warn!(
            attempt,
            tol = %cg_options.tol,
            "CG returned an ascent direction, tightening the tolerance"
        );
    }
    Ok(false)
}
