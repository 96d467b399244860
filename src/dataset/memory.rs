use crate::error::{EstimatorError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Samples paired with their regression targets, held in memory.
#[derive(Clone, Debug, PartialEq)]
pub struct InMemoryDataset<T> {
    x: Vec<T>,
    y: Vec<f64>,
}

impl<T: Clone> InMemoryDataset<T> {
    pub fn new(x: Vec<T>, y: Vec<f64>) -> Result<Self> {
        if x.len() != y.len() {
            return Err(EstimatorError::InvalidInput(format!(
                "x and y must have same length ({} vs {})",
                x.len(),
                y.len()
            )));
        }
        if x.is_empty() {
            return Err(EstimatorError::EmptyDataset("dataset is empty".into()));
        }
        Ok(Self { x, y })
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn samples(&self) -> &[T] {
        &self.x
    }

    pub fn targets(&self) -> &[f64] {
        &self.y
    }

    fn select(&self, indices: &[usize]) -> Self {
        Self {
            x: indices.iter().map(|&i| self.x[i].clone()).collect(),
            y: indices.iter().map(|&i| self.y[i]).collect(),
        }
    }

    /// Shuffle with `seed` and hold out `ceil(len * test_fraction)` samples.
    ///
    /// Returns `(train, test)`. Both parts must be non-empty.
    pub fn train_test_split(&self, test_fraction: f64, seed: u64) -> Result<(Self, Self)> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(EstimatorError::Config(format!(
                "test fraction must be in (0, 1), got {test_fraction}"
            )));
        }
        let n = self.len();
        let n_test = (n as f64 * test_fraction).ceil() as usize;
        if n_test == 0 || n_test >= n {
            return Err(EstimatorError::EmptyDataset(format!(
                "{n} samples are too few for a train/test split"
            )));
        }

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);
        let (test_idx, train_idx) = indices.split_at(n_test);

        Ok((self.select(train_idx), self.select(test_idx)))
    }
}
