//! tncore is a truncated Newton optimizer for smooth, twice-differentiable objectives.
//!
//! The solver, [newton_cg](routines::optimization::newton_cg), approximately solves the Newton
//! system in every iteration with a conjugate gradient method that stops early on a loose
//! tolerance or on negative curvature, and globalizes the step with an Armijo backtracking line
//! search. Objectives only need to provide values, gradients and Hessian-vector products through
//! the [Objective](routines::objective::Objective) trait.
//!
//! A logistic regression loss is included, with [fit_logistic](entrypoints::fit_logistic) as a
//! configured entry point.

/// Entrypoints for fitting models
pub mod entrypoints;
/// Building blocks of the solver
pub mod routines;

pub mod prelude {
    pub use crate::entrypoints::{fit_logistic, LogisticFit};
    pub use crate::routines::data::{synthetic, Dataset};
    pub use crate::routines::linalg::{self, Float};
    pub use crate::routines::logger;
    pub use crate::routines::objective::{LinearOperator, LogisticLoss, Objective, Quadratic};
    pub use crate::routines::optimization::*;
    pub use crate::routines::settings::{self, Settings};
}
