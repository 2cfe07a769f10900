//! Labelled datasets for classification
//!
//! A [Dataset] holds a feature matrix with one row per sample, the matching `0`/`1` labels and,
//! for generated data, the parameters the labels were drawn from.

use eyre::{bail, Result};
use ndarray::{Array1, Array2, Axis, Slice};

pub mod synthetic;

#[derive(Debug, Clone)]
pub struct Dataset {
    pub features: Array2<f64>,
    pub labels: Array1<f64>,
    /// Parameters used to generate the labels, intercept first when there is one
    pub params: Option<Array1<f64>>,
}

impl Dataset {
    pub fn new(features: Array2<f64>, labels: Array1<f64>) -> Result<Self> {
        if features.nrows() != labels.len() {
            bail!(
                "Found {} labels for {} samples",
                labels.len(),
                features.nrows()
            );
        }
        Ok(Dataset {
            features,
            labels,
            params: None,
        })
    }

    pub fn samples(&self) -> usize {
        self.features.nrows()
    }

    pub fn features(&self) -> usize {
        self.features.ncols()
    }

    /// Split into a leading and a trailing part
    ///
    /// The first `⌊fraction · samples⌋` rows go to the first dataset, the rest to the second.
    /// Both keep the generating parameters.
    ///
    /// # Errors
    ///
    /// Fails unless `fraction` lies in `[0, 1]`.
    pub fn split(&self, fraction: f64) -> Result<(Dataset, Dataset)> {
        if !(0.0..=1.0).contains(&fraction) {
            bail!("The split fraction must lie in [0, 1], got {}", fraction);
        }
        let at = (fraction * self.samples() as f64) as usize;
        let part = |rows: Slice| Dataset {
            features: self.features.slice_axis(Axis(0), rows).to_owned(),
            labels: self.labels.slice_axis(Axis(0), rows).to_owned(),
            params: self.params.clone(),
        };
        Ok((
            part(Slice::from(..at)),
            part(Slice::from(at..)),
        ))
    }

    /// Fraction of samples labelled `1`
    pub fn positive_rate(&self) -> f64 {
        if self.labels.is_empty() {
            return 0.0;
        }
        self.labels.sum() / self.labels.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn split_keeps_row_order() -> Result<()> {
        let features = array![[0.0], [1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0], [8.0], [9.0]];
        let labels = array![0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0];
        let data = Dataset::new(features, labels)?;

        let (train, test) = data.split(0.7)?;
        assert_eq!(train.samples(), 7);
        assert_eq!(test.samples(), 3);
        assert_eq!(test.features[[0, 0]], 7.0);
        assert_eq!(test.labels, array![1.0, 0.0, 1.0]);
        assert!(data.split(1.5).is_err());
        Ok(())
    }

    #[test]
    fn split_truncates_the_leading_part() -> Result<()> {
        let data = Dataset::new(Array2::zeros((7, 1)), array![1.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0])?;
        // 0.7 · 7 = 4.9
        let (train, test) = data.split(0.7)?;
        assert_eq!(train.samples(), 4);
        assert_eq!(test.samples(), 3);
        assert_eq!(train.positive_rate(), 0.75);
        assert_eq!(test.positive_rate(), 0.0);
        Ok(())
    }

    #[test]
    fn positive_rate_of_empty_dataset() -> Result<()> {
        let data = Dataset::new(Array2::zeros((0, 2)), Array1::zeros(0))?;
        assert_eq!(data.positive_rate(), 0.0);
        assert_eq!(data.features(), 2);
        Ok(())
    }

    #[test]
    fn rejects_mismatched_labels() {
        assert!(Dataset::new(Array2::zeros((3, 2)), Array1::zeros(2)).is_err());
    }
}
