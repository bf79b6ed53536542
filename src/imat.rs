//!
//! # Interaction matrix builder
//!
//! Builds the interaction matrix of the DM layers, either in full or only at the
//! elements of an [`IndexSet`].

use indicatif::ProgressBar;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::{slice, time::Instant};

use crate::{
    geometry::LayerConfig,
    system::{Geometry, Simulator},
    ConfigurationError, Result, SimulationFailure,
};

/// Ordered `(row, col)` coordinates of interaction matrix elements
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSet(Vec<(usize, usize)>);
impl IndexSet {
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn iter(&self) -> slice::Iter<'_, (usize, usize)> {
        self.0.iter()
    }
    pub fn as_slice(&self) -> &[(usize, usize)] {
        &self.0
    }
    /// Number of distinct elements
    pub fn n_unique(&self) -> usize {
        let mut indices = self.0.clone();
        indices.sort_unstable();
        indices.dedup();
        indices.len()
    }
}
impl From<Vec<(usize, usize)>> for IndexSet {
    fn from(indices: Vec<(usize, usize)>) -> Self {
        Self(indices)
    }
}
impl FromIterator<(usize, usize)> for IndexSet {
    fn from_iter<T: IntoIterator<Item = (usize, usize)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
impl<'a> IntoIterator for &'a IndexSet {
    type Item = &'a (usize, usize);
    type IntoIter = slice::Iter<'a, (usize, usize)>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Interaction matrix
///
/// Rows are measurements and columns are actuators.
/// A sparse interaction matrix holds the elements at the coordinates of an
/// [`IndexSet`], in the same order.
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionMatrix {
    Full(DMatrix<f64>),
    Sparse(DVector<f64>),
}
impl InteractionMatrix {
    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full(_))
    }
    /// Number of elements
    pub fn len(&self) -> usize {
        match self {
            Self::Full(m) => m.len(),
            Self::Sparse(v) => v.len(),
        }
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Returns the full matrix, `None` if sparse
    pub fn full(&self) -> Option<&DMatrix<f64>> {
        match self {
            Self::Full(m) => Some(m),
            Self::Sparse(_) => None,
        }
    }
    /// Elements, column-wise if full
    pub fn as_slice(&self) -> &[f64] {
        match self {
            Self::Full(m) => m.as_slice(),
            Self::Sparse(v) => v.as_slice(),
        }
    }
    /// Returns the elements of a full matrix at the given indices
    pub fn restrict(&self, indices: &IndexSet) -> Result<DVector<f64>> {
        let Self::Full(m) = self else {
            return Err(ConfigurationError::SparseRestriction.into());
        };
        let (nrows, ncols) = m.shape();
        indices
            .iter()
            .map(|&(row, col)| {
                m.get((row, col)).copied().ok_or(
                    SimulationFailure::IndexOutOfBounds {
                        row,
                        col,
                        nrows,
                        ncols,
                    }
                    .into(),
                )
            })
            .collect::<Result<Vec<f64>>>()
            .map(DVector::from_vec)
    }
    /// Returns the elements at the given indices
    ///
    /// A sparse matrix is assumed to be already sampled at `indices`.
    pub fn into_samples(self, indices: &IndexSet) -> Result<DVector<f64>> {
        match self {
            Self::Sparse(values) => Ok(values),
            full => full.restrict(indices),
        }
    }
}
impl From<DMatrix<f64>> for InteractionMatrix {
    fn from(m: DMatrix<f64>) -> Self {
        Self::Full(m)
    }
}
impl From<DVector<f64>> for InteractionMatrix {
    fn from(v: DVector<f64>) -> Self {
        Self::Sparse(v)
    }
}

/// Interaction matrix build strategies
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildStrategy {
    /// The layer geometries are merged into a single geometry and the simulator
    /// is called once, either for the full matrix or for the requested elements
    #[default]
    Merged,
    /// The simulator is called for the full matrix of each layer and the matrices
    /// are concatenated along the actuator axis, after removing the invalid
    /// measurements if `filter` is set
    ///
    /// Requested elements are gathered from the concatenated matrix.
    PerLayer { filter: bool },
}

/// Interaction matrix builder
#[derive(Debug, Clone)]
pub struct ImatBuilder<S> {
    simulator: S,
    strategy: BuildStrategy,
}
impl<S: Simulator> ImatBuilder<S> {
    pub fn new(simulator: S, strategy: BuildStrategy) -> Self {
        Self {
            simulator,
            strategy,
        }
    }
    pub fn simulator(&self) -> &S {
        &self.simulator
    }
    pub fn strategy(&self) -> BuildStrategy {
        self.strategy
    }
    /// Builds the interaction matrix, in full if `indices` is `None`
    pub fn build(
        &self,
        layers: &[LayerConfig],
        indices: Option<&IndexSet>,
    ) -> Result<InteractionMatrix> {
        self.build_with_progress(layers, indices, None)
    }
    /// Builds the interaction matrix, reporting the progress of full builds
    pub fn build_with_progress(
        &self,
        layers: &[LayerConfig],
        indices: Option<&IndexSet>,
        pb: Option<ProgressBar>,
    ) -> Result<InteractionMatrix> {
        let geoms = layers
            .iter()
            .map(|layer| self.simulator.layer(layer))
            .collect::<Result<Vec<_>>>()?;
        match self.strategy {
            BuildStrategy::Merged => {
                let geom = self.simulator.merge(geoms)?;
                match indices {
                    None => self.full(&[geom], false, pb).map(InteractionMatrix::Full),
                    Some(indices) => geom.imat_sparse(indices).map(InteractionMatrix::Sparse),
                }
            }
            BuildStrategy::PerLayer { filter } => {
                let imat = InteractionMatrix::Full(self.full(&geoms, filter, pb)?);
                match indices {
                    None => Ok(imat),
                    Some(indices) => imat.restrict(indices).map(InteractionMatrix::Sparse),
                }
            }
        }
    }
    /// Computes the full interaction matrix of each geometry and concatenates them
    fn full(
        &self,
        geoms: &[S::Geometry],
        filter: bool,
        pb: Option<ProgressBar>,
    ) -> Result<DMatrix<f64>> {
        let ncols: usize = geoms.iter().map(|g| g.n_actuator()).sum();
        if let Some(pb) = pb.as_ref() {
            pb.set_length(ncols as u64);
        }
        let now = Instant::now();
        let mut nrows: Option<usize> = None;
        let mut data: Vec<f64> = vec![];
        let mut single = None;
        for geom in geoms {
            let mut imat = geom.imat(pb.as_ref())?;
            if filter {
                let valid = geom.valid_measurements();
                if valid.len() != imat.nrows() {
                    return Err(SimulationFailure::MeasurementMismatch {
                        expected: imat.nrows(),
                        found: valid.len(),
                    }
                    .into());
                }
                let rows: Vec<usize> = valid
                    .iter()
                    .enumerate()
                    .filter_map(|(i, v)| v.then_some(i))
                    .collect();
                imat = imat.select_rows(rows.iter());
            }
            match nrows {
                Some(expected) if imat.nrows() != expected => {
                    return Err(SimulationFailure::MeasurementMismatch {
                        expected,
                        found: imat.nrows(),
                    }
                    .into());
                }
                Some(_) => (),
                None => nrows = Some(imat.nrows()),
            }
            if geoms.len() == 1 {
                single = Some(imat);
            } else {
                // column-major storage: appending the blocks concatenates the columns
                if data.is_empty() {
                    data.reserve_exact(imat.nrows() * ncols);
                }
                data.extend_from_slice(imat.as_slice());
            }
        }
        pb.as_ref().map(|pb| pb.finish());
        let nrows = nrows.unwrap_or(0);
        log::debug!(
            "Full {}x{} interaction matrix built in {:.3}s",
            nrows,
            ncols,
            now.elapsed().as_secs_f64()
        );
        Ok(single.unwrap_or_else(|| DMatrix::from_vec(nrows, ncols, data)))
    }
}
