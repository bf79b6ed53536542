//!
//! # Sensitivity selector
//!
//! Selects the interaction matrix elements that are worth sampling: the elements
//! with a magnitude larger than a threshold at the home position, randomly
//! downsampled to a working set small enough to make sparse builds cheap.

use nalgebra::DMatrix;
use rand::{rngs::StdRng, seq::index, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{ConfigurationError, IndexSet, Result};

/// Random sampling modes of the sensitive elements
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sampling {
    /// Elements are drawn uniformly with replacement: the working set may
    /// contain the same element several times
    #[default]
    WithReplacement,
    /// Elements are drawn uniformly without replacement
    WithoutReplacement,
}

/// Mask of the elements with a magnitude strictly larger than `threshold`
pub fn sensitivity_mask(imat: &DMatrix<f64>, threshold: f64) -> DMatrix<bool> {
    imat.map(|x| x.abs() > threshold)
}

/// Coordinates of the sensitive elements in row-major order
pub fn candidates(imat: &DMatrix<f64>, threshold: f64) -> Vec<(usize, usize)> {
    let mask = sensitivity_mask(imat, threshold);
    (0..mask.nrows())
        .flat_map(|row| (0..mask.ncols()).map(move |col| (row, col)))
        .filter(|&idx| mask[idx])
        .collect()
}

/// Draws `target_count` sensitive elements of `imat` with the given random
/// number generator
///
/// Fails if there are less sensitive elements than `target_count`.
pub fn select_indices<R: Rng>(
    imat: &DMatrix<f64>,
    threshold: f64,
    target_count: usize,
    sampling: Sampling,
    rng: &mut R,
) -> Result<IndexSet> {
    let candidates = candidates(imat, threshold);
    if candidates.len() < target_count {
        return Err(ConfigurationError::InsufficientSensitivity {
            available: candidates.len(),
            requested: target_count,
        }
        .into());
    }
    let indices: IndexSet = match sampling {
        Sampling::WithReplacement => (0..target_count)
            .map(|_| candidates[rng.gen_range(0..candidates.len())])
            .collect(),
        Sampling::WithoutReplacement => index::sample(rng, candidates.len(), target_count)
            .into_iter()
            .map(|i| candidates[i])
            .collect(),
    };
    log::info!(
        "Selected {} ({} unique) out of {} sensitive elements (|imat|>{:e})",
        indices.len(),
        indices.n_unique(),
        candidates.len(),
        threshold
    );
    Ok(indices)
}

/// Sensitivity selector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivitySelector {
    /// magnitude threshold
    pub threshold: f64,
    /// size of the working set
    pub target_count: usize,
    pub sampling: Sampling,
    /// random generator seed, the generator is seeded from the OS entropy if `None`
    pub seed: Option<u64>,
}
/// Default properties:
///  * threshold   : 1e-3
///  * target count: 1000
///  * sampling    : with replacement
///  * seed        : none
impl Default for SensitivitySelector {
    fn default() -> Self {
        Self {
            threshold: 1e-3,
            target_count: 1000,
            sampling: Sampling::default(),
            seed: None,
        }
    }
}
impl SensitivitySelector {
    pub fn threshold(self, threshold: f64) -> Self {
        Self { threshold, ..self }
    }
    pub fn target_count(self, target_count: usize) -> Self {
        Self {
            target_count,
            ..self
        }
    }
    pub fn sampling(self, sampling: Sampling) -> Self {
        Self { sampling, ..self }
    }
    pub fn seed(self, seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..self
        }
    }
    /// Selects the working set of the home interaction matrix
    pub fn select(&self, imat: &DMatrix<f64>) -> Result<IndexSet> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        select_indices(
            imat,
            self.threshold,
            self.target_count,
            self.sampling,
            &mut rng,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn home() -> DMatrix<f64> {
        DMatrix::from_row_slice(
            3,
            4,
            &[
                0.5, 0.0, -2e-3, 1e-3, //
                0.0, -0.1, 0.0, 5e-4, //
                1.0, 0.0, 0.0, -3.0,
            ],
        )
    }

    #[test]
    fn row_major_candidates() {
        assert_eq!(
            candidates(&home(), 1e-3),
            vec![(0, 0), (0, 2), (1, 1), (2, 0), (2, 3)]
        );
    }

    #[test]
    fn above_threshold() {
        let imat = home();
        let indices = SensitivitySelector::default()
            .target_count(100)
            .seed(1)
            .select(&imat);
        // 5 candidates only
        assert!(indices.unwrap_err().is_configuration());
        let indices = select_indices(
            &imat,
            1e-3,
            100,
            Sampling::WithReplacement,
            &mut StdRng::seed_from_u64(1),
        );
        assert!(indices.is_err());
        let indices = select_indices(
            &imat,
            1e-3,
            5,
            Sampling::WithReplacement,
            &mut StdRng::seed_from_u64(1),
        )
        .unwrap();
        assert_eq!(indices.len(), 5);
        assert!(indices.iter().all(|&idx| imat[idx].abs() > 1e-3));
    }

    #[test]
    fn with_replacement_duplicates() {
        let imat = DMatrix::from_element(40, 25, 1.0);
        let indices = select_indices(
            &imat,
            1e-3,
            1000,
            Sampling::WithReplacement,
            &mut StdRng::seed_from_u64(0),
        )
        .unwrap();
        assert_eq!(indices.len(), 1000);
        assert!(indices.n_unique() < 1000);
        let imat = DMatrix::from_element(1, 1, 1.0);
        let indices = select_indices(
            &imat,
            1e-3,
            1,
            Sampling::WithReplacement,
            &mut StdRng::seed_from_u64(0),
        )
        .unwrap();
        assert_eq!(indices, IndexSet::from(vec![(0, 0)]));
    }

    #[test]
    fn without_replacement_unique() {
        let imat = DMatrix::from_element(10, 10, 1.0);
        let indices = SensitivitySelector::default()
            .target_count(100)
            .sampling(Sampling::WithoutReplacement)
            .seed(3)
            .select(&imat)
            .unwrap();
        assert_eq!(indices.n_unique(), 100);
    }

    #[test]
    fn seeded_is_reproducible() {
        let imat = DMatrix::from_fn(20, 30, |i, j| ((i * 30 + j) as f64).sin());
        let selector = SensitivitySelector::default().target_count(50).seed(42);
        assert_eq!(selector.select(&imat).unwrap(), selector.select(&imat).unwrap());
    }

    #[test]
    fn insufficient_without_replacement() {
        let err = SensitivitySelector::default()
            .target_count(5)
            .sampling(Sampling::WithoutReplacement)
            .select(&DMatrix::from_element(2, 2, 1.0))
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
