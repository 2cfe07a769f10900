use eyre::{bail, Result};
use ndarray::{s, Array1, Array2};
use sobol_burley::sample;

use super::Dataset;

/// Number of dimensions available from the Sobol sampler
const MAX_DIMENSIONS: usize = 256;

/// Range of the generated features
const FEATURE_RANGE: (f64, f64) = (-10.0, 10.0);

/// Range of the generating parameters
const PARAM_RANGE: (f64, f64) = (-3.0, 3.0);

fn scaled(unscaled: f32, (lower, upper): (f64, f64)) -> f64 {
    lower + unscaled as f64 * (upper - lower)
}

/// Generates a binary classification problem from a scrambled Sobol sequence.
///
/// Each of the `n` samples is a point of a `p`-dimensional Sobol sequence scaled to
/// `[-10, 10]`. The generating parameters are drawn uniformly from `[-3, 3]` with a second seed,
/// and a sample is labelled `1` when its logistic probability under those parameters is at least
/// `0.5`, so the classes are linearly separable.
///
/// # Arguments
///
/// * `n` - The number of samples.
/// * `p` - The number of features, at most 256.
/// * `fit_intercept` - Whether the generating parameters include an intercept, stored first.
/// * `seed` - The seed for the Sobol sequence generator.
///
/// # Returns
///
/// A [Dataset] whose `params` field holds the generating parameters.
pub fn classification(n: usize, p: usize, fit_intercept: bool, seed: u32) -> Result<Dataset> {
    if p == 0 || p > MAX_DIMENSIONS {
        bail!(
            "The number of features must be between 1 and {}, got {}",
            MAX_DIMENSIONS,
            p
        );
    }
    let n_points = u32::try_from(n)?;

    let features = Array2::from_shape_fn((n_points as usize, p), |(i, j)| {
        scaled(sample(i as u32, j as u32, seed), FEATURE_RANGE)
    });

    let n_params = p + usize::from(fit_intercept);
    let param_seed = seed.wrapping_add(1);
    let params = Array1::from_shape_fn(n_params, |j| {
        scaled(sample(j as u32, 0, param_seed), PARAM_RANGE)
    });

    // z = Xβ + β₀ and σ(z) >= 0.5 exactly when z >= 0
    let offset = usize::from(fit_intercept);
    let mut z = features.dot(&params.slice(s![offset..]));
    if fit_intercept {
        z += params[0];
    }
    let labels = z.mapv(|z| if z >= 0.0 { 1.0 } else { 0.0 });

    Ok(Dataset {
        features,
        labels,
        params: Some(params),
    })
}
