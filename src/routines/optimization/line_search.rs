use eyre::{bail, Result};
use ndarray::Array1;
use serde_derive::{Deserialize, Serialize};

use crate::routines::linalg::{self, Float};
use crate::routines::objective::Objective;

/// Parameters of the backtracking line search
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LineSearchOptions<A> {
    /// First step length tried
    pub alpha0: A,
    /// Sufficient decrease constant of the Armijo condition
    pub c1: A,
    /// Factor applied to the step length after every rejected trial
    pub shrink: A,
    /// Maximum number of trial points
    pub max_trials: usize,
    /// Whether the objective already holds its value and gradient at `x`
    pub x_evaluated: bool,
}

impl<A: Float> Default for LineSearchOptions<A> {
    fn default() -> Self {
        Self {
            alpha0: A::one(),
            c1: A::lit(1e-4),
            shrink: A::lit(0.5),
            max_trials: 40,
            x_evaluated: true,
        }
    }
}

impl<A: Float> LineSearchOptions<A> {
    pub fn validate(&self) -> Result<()> {
        if !self.alpha0.is_finite() || self.alpha0 <= A::zero() {
            bail!("The initial step length must be positive, got {}", self.alpha0);
        }
        if !(self.c1 > A::zero() && self.c1 < A::one()) {
            bail!("The sufficient decrease constant must lie in (0, 1), got {}", self.c1);
        }
        if !(self.shrink > A::zero() && self.shrink < A::one()) {
            bail!("The shrink factor must lie in (0, 1), got {}", self.shrink);
        }
        if self.max_trials == 0 {
            bail!("The line search needs at least one trial");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LineSearchOutcome<A> {
    /// Step length of the returned trial point
    pub alpha: A,
    /// Objective value at the returned trial point
    pub value: A,
    /// Number of trial points evaluated
    pub trials: usize,
    /// Whether the Armijo condition holds at the returned point
    pub accepted: bool,
}

/// Armijo backtracking along `d` starting from `x`
///
/// Step lengths `alpha0, alpha0·shrink, alpha0·shrink², ...` are tried until
/// `f(x + alpha·d) <= f(x) + c1·alpha·(g·d)`. A trial value that is not finite always fails the
/// test. When the trial budget runs out, the smallest step length tried is returned with
/// `accepted` unset.
///
/// On return `trial` holds `x + alpha·d` for the returned `alpha`, and the objective has been
/// updated there without a Hessian.
pub fn backtracking<A, O>(
    f: &mut O,
    x: &Array1<A>,
    d: &Array1<A>,
    trial: &mut Array1<A>,
    options: &LineSearchOptions<A>,
) -> Result<LineSearchOutcome<A>>
where
    A: Float,
    O: Objective<A> + ?Sized,
{
    options.validate()?;
    let n = f.dimension();
    if x.len() != n || d.len() != n || trial.len() != n {
        bail!(
            "Line search dimension mismatch: objective {}, point {}, direction {}, trial {}",
            n,
            x.len(),
            d.len(),
            trial.len()
        );
    }

    if !options.x_evaluated {
        f.update(x.view(), false)?;
    }
    let f0 = f.value();
    let slope = linalg::dot(&f.gradient(), d);

    let mut alpha = options.alpha0;
    let mut value = f0;
    for trials in 1..=options.max_trials {
        linalg::linear_combination(trial, x, alpha, d);
        f.update(trial.view(), false)?;
        value = f.value();

        if value.is_finite() && value <= f0 + options.c1 * alpha * slope {
            tracing::debug!(alpha = %alpha, trials, value = %value, "Step accepted");
            return Ok(LineSearchOutcome {
                alpha,
                value,
                trials,
                accepted: true,
            });
        }
        if trials < options.max_trials {
            alpha = alpha * options.shrink;
        }
    }

    Ok(LineSearchOutcome {
        alpha,
        value,
        trials: options.max_trials,
        accepted: false,
    })
}
