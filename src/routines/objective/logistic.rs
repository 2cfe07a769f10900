//! Logistic regression loss
//!
//! The loss over `m` samples with features `X` (`m × p`) and labels `y ∈ {0, 1}` is
//!
//! ```text
//! f(w) = Σᵢ [softplus(zᵢ) - yᵢ·zᵢ] + λ‖β‖²,    zᵢ = xᵢ·β + β₀
//! ```
//!
//! where `β` are the coefficients and `β₀` the optional intercept. When an intercept is fitted it
//! is stored first in the parameter vector, which then has length `p + 1`. The intercept is not
//! penalised.
//!
//! ```text
//! ∇f   = [Σᵢ rᵢ ; Xᵀr + 2λβ],           rᵢ = σ(zᵢ) - yᵢ
//! H·v  = [Σᵢ uᵢ ; Xᵀu + 2λv_β],         uᵢ = sᵢ·(xᵢ·v_β + v₀),  sᵢ = σ(zᵢ)(1 - σ(zᵢ))
//! ```
//!
//! The Hessian is never formed; the curvature weights `sᵢ` are cached by [LogisticLoss::update]
//! and the product is computed with two matrix-vector products.

use std::cell::RefCell;

use eyre::{bail, Result};
use ndarray::linalg::general_mat_vec_mul;
use ndarray::{s, Array1, ArrayView1, ArrayView2, ArrayViewMut1, Zip};

use super::{LinearOperator, Objective};
use crate::routines::linalg::{self, Float};
use crate::routines::math::{sigmoid, softplus};

/// Logistic loss with optional intercept and L2 penalty
#[derive(Debug)]
pub struct LogisticLoss<'d, A> {
    features: ArrayView2<'d, A>,
    labels: ArrayView1<'d, A>,
    l2: A,
    fit_intercept: bool,
    value: A,
    gradient: Array1<A>,
    /// Linear predictor, replaced in place by the per-sample loss
    losses: Array1<A>,
    residuals: Array1<A>,
    curvature: Array1<A>,
    /// Scratch for `X·v` inside Hessian products
    projection: RefCell<Array1<A>>,
    hessian_ready: bool,
}

impl<'d, A: Float> LogisticLoss<'d, A> {
    /// Create the loss for a dataset
    ///
    /// # Errors
    ///
    /// Fails if the number of labels differs from the number of rows, if a label is not `0` or
    /// `1`, if a feature is not finite, or if `l2` is negative or not finite.
    pub fn new(
        features: ArrayView2<'d, A>,
        labels: ArrayView1<'d, A>,
        l2: A,
        fit_intercept: bool,
    ) -> Result<Self> {
        let (samples, _) = features.dim();
        if labels.len() != samples {
            bail!(
                "Found {} labels for {} samples",
                labels.len(),
                samples
            );
        }
        if let Some(label) = labels
            .iter()
            .find(|&&y| y != A::zero() && y != A::one())
        {
            bail!("Labels must be 0 or 1, found {}", label);
        }
        if features.iter().any(|v| !v.is_finite()) {
            bail!("Features must be finite");
        }
        if !l2.is_finite() || l2 < A::zero() {
            bail!("The L2 penalty must be finite and non-negative, got {}", l2);
        }

        let dimension = features.ncols() + usize::from(fit_intercept);
        Ok(Self {
            features,
            labels,
            l2,
            fit_intercept,
            value: A::zero(),
            gradient: Array1::zeros(dimension),
            losses: Array1::zeros(samples),
            residuals: Array1::zeros(samples),
            curvature: Array1::zeros(samples),
            projection: RefCell::new(Array1::zeros(samples)),
            hessian_ready: false,
        })
    }

    pub fn fit_intercept(&self) -> bool {
        self.fit_intercept
    }

    pub fn l2(&self) -> A {
        self.l2
    }

    pub fn samples(&self) -> usize {
        self.features.nrows()
    }

    fn offset(&self) -> usize {
        usize::from(self.fit_intercept)
    }
}

/// Write the linear predictor `X·β + β₀` for `params` into `out`.
fn linear_predictor<A: Float>(
    features: &ArrayView2<'_, A>,
    params: &ArrayView1<'_, A>,
    fit_intercept: bool,
    out: &mut Array1<A>,
) {
    let offset = usize::from(fit_intercept);
    general_mat_vec_mul(
        A::one(),
        features,
        &params.slice(s![offset..]),
        A::zero(),
        out,
    );
    if fit_intercept {
        let intercept = params[0];
        linalg::map_inplace(out, |z| z + intercept);
    }
}

impl<'d, A: Float> Objective<A> for LogisticLoss<'d, A> {
    type Hessian<'a> = LogisticHessian<'a, 'd, A> where Self: 'a;

    fn dimension(&self) -> usize {
        self.gradient.len()
    }

    fn update(&mut self, x: ArrayView1<'_, A>, need_hessian: bool) -> Result<()> {
        if x.len() != self.dimension() {
            bail!(
                "Point has length {}, but the objective has dimension {}",
                x.len(),
                self.dimension()
            );
        }
        let offset = self.offset();

        linear_predictor(&self.features, &x, self.fit_intercept, &mut self.losses);

        // The linear predictor is replaced by the per-sample loss
        Zip::from(&mut self.losses)
            .and(&mut self.residuals)
            .and(&mut self.curvature)
            .and(&self.labels)
            .par_for_each(|z, r, s, &y| {
                let p = sigmoid(*z);
                *r = p - y;
                *s = p * (A::one() - p);
                *z = softplus(*z) - y * *z;
            });

        let coefficients = x.slice(s![offset..]);
        let penalty = self.l2 * linalg::dot(&coefficients, &coefficients);
        self.value = linalg::sum(&self.losses) + penalty;

        // Xᵀr + 2λβ
        let two_l2 = A::lit(2.0) * self.l2;
        {
            let mut grad_coef = self.gradient.slice_mut(s![offset..]);
            linalg::copy(&coefficients, &mut grad_coef);
            general_mat_vec_mul(
                A::one(),
                &self.features.t(),
                &self.residuals,
                two_l2,
                &mut grad_coef,
            );
        }
        if self.fit_intercept {
            self.gradient[0] = linalg::sum(&self.residuals);
        }

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
        Ok(LogisticHessian { loss: self })
    }
}

/// Hessian-vector product of a [LogisticLoss] at its current point
#[derive(Debug)]
pub struct LogisticHessian<'a, 'd, A> {
    loss: &'a LogisticLoss<'d, A>,
}

impl<'a, 'd, A: Float> LinearOperator<A> for LogisticHessian<'a, 'd, A> {
    fn dimension(&self) -> usize {
        self.loss.dimension()
    }

    fn apply(&self, v: ArrayView1<'_, A>, mut out: ArrayViewMut1<'_, A>) {
        let loss = self.loss;
        let offset = loss.offset();
        let mut projection = loss.projection.borrow_mut();

        // u = s ⊙ (X·v_β + v₀)
        linear_predictor(&loss.features, &v, loss.fit_intercept, &mut projection);
        Zip::from(&mut *projection)
            .and(&loss.curvature)
            .par_for_each(|u, &s| *u = *u * s);

        // Xᵀu + 2λv_β
        let v_coef = v.slice(s![offset..]);
        let mut out_coef = out.slice_mut(s![offset..]);
        linalg::copy(&v_coef, &mut out_coef);
        general_mat_vec_mul(
            A::one(),
            &loss.features.t(),
            &*projection,
            A::lit(2.0) * loss.l2,
            &mut out_coef,
        );
        if loss.fit_intercept {
            out[0] = linalg::sum(&*projection);
        }
    }
}

/// Probability of the positive class for every row of `features`
///
/// `params` follows the layout of [LogisticLoss]: intercept first when `fit_intercept` is set.
pub fn predict_proba<A: Float>(
    features: ArrayView2<'_, A>,
    params: ArrayView1<'_, A>,
    fit_intercept: bool,
) -> Result<Array1<A>> {
    let expected = features.ncols() + usize::from(fit_intercept);
    if params.len() != expected {
        bail!(
            "Expected {} parameters for {} features, got {}",
            expected,
            features.ncols(),
            params.len()
        );
    }
    let mut proba = Array1::zeros(features.nrows());
    linear_predictor(&features, &params, fit_intercept, &mut proba);
    linalg::map_inplace(&mut proba, sigmoid);
    Ok(proba)
}

/// Predicted class (`0` or `1`) for every row of `features`, thresholding at 0.5
pub fn predict<A: Float>(
    features: ArrayView2<'_, A>,
    params: ArrayView1<'_, A>,
    fit_intercept: bool,
) -> Result<Array1<A>> {
    let threshold = A::lit(0.5);
    let mut labels = predict_proba(features, params, fit_intercept)?;
    linalg::map_inplace(&mut labels, |p| {
        if p >= threshold {
            A::one()
        } else {
            A::zero()
        }
    });
    Ok(labels)
}

/// Fraction of rows whose predicted class matches `labels`
pub fn accuracy<A: Float>(
    features: ArrayView2<'_, A>,
    labels: ArrayView1<'_, A>,
    params: ArrayView1<'_, A>,
    fit_intercept: bool,
) -> Result<f64> {
    if labels.len() != features.nrows() {
        bail!(
            "Found {} labels for {} samples",
            labels.len(),
            features.nrows()
        );
    }
    if labels.is_empty() {
        bail!("Accuracy is undefined for an empty dataset");
    }
    let predicted = predict(features, params, fit_intercept)?;
    let correct = predicted
        .iter()
        .zip(labels.iter())
        .filter(|(p, y)| p == y)
        .count();
    Ok(correct as f64 / labels.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn dataset() -> (Array2<f64>, Array1<f64>) {
        let features = array![
            [1.0, 2.0],
            [-1.0, 0.5],
            [0.3, -2.0],
            [2.0, 1.0],
            [-0.5, -1.5]
        ];
        let labels = array![1.0, 0.0, 0.0, 1.0, 1.0];
        (features, labels)
    }

    /// Central finite differences of the loss
    fn numerical_gradient(loss: &mut LogisticLoss<'_, f64>, x: &Array1<f64>) -> Array1<f64> {
        let h = 1e-6;
        Array1::from_shape_fn(x.len(), |i| {
            let mut xp = x.clone();
            let mut xm = x.clone();
            xp[i] += h;
            xm[i] -= h;
            loss.update(xp.view(), false).unwrap();
            let fp = loss.value();
            loss.update(xm.view(), false).unwrap();
            let fm = loss.value();
            (fp - fm) / (2.0 * h)
        })
    }

    #[test]
    fn reports_its_configuration() -> Result<()> {
        let (features, labels) = dataset();
        let loss = LogisticLoss::new(features.view(), labels.view(), 0.25, false)?;
        assert!(!loss.fit_intercept());
        assert_eq!(loss.l2(), 0.25);
        assert_eq!(loss.samples(), 5);
        assert_eq!(loss.dimension(), 2);
        Ok(())
    }

    #[test]
    fn value_at_origin() -> Result<()> {
        let (features, labels) = dataset();
        let mut loss = LogisticLoss::new(features.view(), labels.view(), 0.0, true)?;
        loss.update(Array1::zeros(3).view(), false)?;
        assert!((loss.value() - 5.0 * 2.0_f64.ln()).abs() < 1e-12);
        // Σ(0.5 - y) for the intercept
        assert!((loss.gradient()[0] - (2.5 - 3.0)).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn gradient_matches_finite_differences() -> Result<()> {
        let (features, labels) = dataset();
        for fit_intercept in [true, false] {
            let mut loss = LogisticLoss::new(features.view(), labels.view(), 0.3, fit_intercept)?;
            let x = if fit_intercept {
                array![0.2, -0.4, 0.7]
            } else {
                array![-0.4, 0.7]
            };
            let numerical = numerical_gradient(&mut loss, &x);
            loss.update(x.view(), false)?;
            for (a, n) in loss.gradient().iter().zip(numerical.iter()) {
                assert!((a - n).abs() < 1e-6, "analytic {} vs numerical {}", a, n);
            }
        }
        Ok(())
    }

    #[test]
    fn hessian_product_matches_gradient_differences() -> Result<()> {
        let (features, labels) = dataset();
        let mut loss = LogisticLoss::new(features.view(), labels.view(), 0.3, true)?;
        let x = array![0.2, -0.4, 0.7];
        let v = array![1.0, -2.0, 0.5];
        let h = 1e-6;

        loss.update((&x + &(&v * h)).view(), false)?;
        let gp = loss.gradient().to_owned();
        loss.update((&x - &(&v * h)).view(), false)?;
        let gm = loss.gradient().to_owned();
        let numerical = (gp - gm) / (2.0 * h);

        loss.update(x.view(), true)?;
        let mut hv = Array1::zeros(3);
        loss.hessian_product()?.apply(v.view(), hv.view_mut());
        for (a, n) in hv.iter().zip(numerical.iter()) {
            assert!((a - n).abs() < 1e-5, "analytic {} vs numerical {}", a, n);
        }
        Ok(())
    }

    #[test]
    fn update_is_idempotent() -> Result<()> {
        let (features, labels) = dataset();
        let mut loss = LogisticLoss::new(features.view(), labels.view(), 0.1, true)?;
        let x = array![0.5, 1.0, -1.0];
        loss.update(x.view(), true)?;
        let (v1, g1) = (loss.value(), loss.gradient().to_owned());
        loss.update(x.view(), true)?;
        assert_eq!(v1.to_bits(), loss.value().to_bits());
        assert_eq!(g1, loss.gradient());
        Ok(())
    }

    #[test]
    fn rejects_invalid_inputs() {
        let (features, labels) = dataset();
        let short = array![1.0, 0.0];
        assert!(LogisticLoss::new(features.view(), short.view(), 0.0, true).is_err());
        let bad = array![1.0, 0.0, 2.0, 1.0, 0.0];
        assert!(LogisticLoss::new(features.view(), bad.view(), 0.0, true).is_err());
        assert!(LogisticLoss::new(features.view(), labels.view(), -1.0, true).is_err());
    }

    #[test]
    fn predictions() -> Result<()> {
        let features = array![[1.0], [-1.0], [0.0]];
        let params = array![0.0, 10.0];
        let proba = predict_proba(features.view(), params.view(), true)?;
        assert!(proba[0] > 0.99 && proba[1] < 0.01);
        assert_eq!(proba[2], 0.5);
        let labels = predict(features.view(), params.view(), true)?;
        assert_eq!(labels, array![1.0, 0.0, 1.0]);
        let acc = accuracy(features.view(), array![1.0, 0.0, 0.0].view(), params.view(), true)?;
        assert!((acc - 2.0 / 3.0).abs() < 1e-12);
        assert!(predict_proba(features.view(), array![1.0].view(), true).is_err());
        Ok(())
    }
}
