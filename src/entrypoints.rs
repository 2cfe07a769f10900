use std::time::Instant;

use eyre::{Result, WrapErr};
use ndarray::{s, Array1, ArrayView1, ArrayView2};

use crate::routines::linalg::Float;
use crate::routines::objective::logistic::{self, LogisticLoss};
use crate::routines::objective::Objective;
use crate::routines::optimization::{newton_cg, NewtonCgOutcome};
use crate::routines::settings::Settings;

/// Parameters of a fitted logistic regression model together with the solver report
#[derive(Debug, Clone)]
pub struct LogisticFit<A> {
    params: Array1<A>,
    fit_intercept: bool,
    pub outcome: NewtonCgOutcome<A>,
}

impl<A: Float> LogisticFit<A> {
    /// Full parameter vector, intercept first when one was fitted
    pub fn params(&self) -> ArrayView1<'_, A> {
        self.params.view()
    }

    pub fn coefficients(&self) -> ArrayView1<'_, A> {
        self.params.slice(s![usize::from(self.fit_intercept)..])
    }

    pub fn intercept(&self) -> Option<A> {
        self.fit_intercept.then(|| self.params[0])
    }

    pub fn predict_proba(&self, features: ArrayView2<'_, A>) -> Result<Array1<A>> {
        logistic::predict_proba(features, self.params.view(), self.fit_intercept)
    }

    pub fn predict(&self, features: ArrayView2<'_, A>) -> Result<Array1<A>> {
        logistic::predict(features, self.params.view(), self.fit_intercept)
    }

    pub fn accuracy(&self, features: ArrayView2<'_, A>, labels: ArrayView1<'_, A>) -> Result<f64> {
        logistic::accuracy(features, labels, self.params.view(), self.fit_intercept)
    }
}

/// Fit a logistic regression model with the Newton-CG solver
///
/// The model configuration (`fit_intercept`, `l2`) and the solver options are taken from
/// `settings`. The solve starts from all-zero parameters. A solve that stops on the iteration
/// budget or without a descent direction still returns the parameters it reached; inspect
/// [LogisticFit::outcome] to tell the cases apart.
///
/// # Errors
///
/// Fails on invalid settings or data, or when the solver hits a numerical error.
pub fn fit_logistic<'a, A: Float>(
    features: ArrayView2<'a, A>,
    labels: ArrayView1<'a, A>,
    settings: &Settings,
) -> Result<LogisticFit<A>> {
    let now = Instant::now();
    settings.validate()?;
    let fit_intercept = settings.model.fit_intercept;

    let mut loss = LogisticLoss::new(features, labels, A::lit(settings.model.l2), fit_intercept)
        .wrap_err("Invalid training data")?;
    let mut params = Array1::zeros(loss.dimension());

    tracing::info!(
        "Fitting logistic regression on {} samples with {} features",
        features.nrows(),
        features.ncols()
    );
    let outcome = newton_cg(&mut loss, &mut params, &settings.newton_cg_options())?;

    if outcome.is_converged() {
        tracing::info!(
            "Converged after {} iterations ({} CG iterations), loss {}",
            outcome.iterations,
            outcome.inner_iterations,
            outcome.value
        );
    } else {
        tracing::warn!(
            "Stopped without converging ({:?}) after {} iterations, max |g| = {}",
            outcome.status,
            outcome.iterations,
            outcome.grad_max_abs
        );
    }
    tracing::info!("Total time: {:.2?}", now.elapsed());

    Ok(LogisticFit {
        params,
        fit_intercept,
        outcome,
    })
}
