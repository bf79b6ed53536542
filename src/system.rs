//!
//! # Interaction matrix simulator
//!
//! The interaction matrix of the system is computed by a simulator that turns the
//! geometry of the DM layers into a [`Geometry`] handle.
//! A handle returns either the full interaction matrix or only some of its elements,
//! the latter being much cheaper as the cost is proportional to the number of
//! computed elements.
//!
//! [`Instrument`] is a geometric model of a multi-conjugate system:
//! Shack-Hartmann slopes measured along the lines of sight to guide stars at finite
//! altitude, and DMs made of Gaussian actuators on a square grid.

use indicatif::ProgressBar;
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use std::sync::Arc;

use crate::{
    geometry::LayerConfig, imat::IndexSet, ConfigurationError, FromBuilder, Result,
    SimulationFailure,
};

mod builder;
pub mod optics;
pub use builder::InstrumentBuilder;
use optics::{coupling_to_sigma, Actuator, Measurement};

/// Interface to an interaction matrix simulator
pub trait Simulator {
    type Geometry: Geometry;
    /// Returns the system geometry of a single DM layer
    fn layer(&self, layer: &LayerConfig) -> Result<Self::Geometry>;
    /// Merges the geometries of several DM layers sharing the same measurements
    fn merge(&self, geometries: Vec<Self::Geometry>) -> Result<Self::Geometry>;
}

/// Interface to the system geometry handle of a [`Simulator`]
pub trait Geometry {
    /// Number of measurements (interaction matrix rows)
    fn n_measurement(&self) -> usize;
    /// Number of actuators (interaction matrix columns)
    fn n_actuator(&self) -> usize;
    /// Computes the full interaction matrix
    ///
    /// The progress bar, if any, is incremented once per actuator.
    fn imat(&self, pb: Option<&ProgressBar>) -> Result<DMatrix<f64>>;
    /// Computes the interaction matrix elements at the given indices, in the same order
    fn imat_sparse(&self, indices: &IndexSet) -> Result<DVector<f64>>;
    /// Flags the measurements that are valid
    fn valid_measurements(&self) -> Vec<bool>;
}

/// Geometric multi-conjugate adaptive optics model
#[derive(Debug, Clone)]
pub struct Instrument {
    pub(crate) gsalt: f64,
    pub(crate) coupling: f64,
    pub(crate) nactux: usize,
    pub(crate) measurements: Arc<[Measurement]>,
    pub(crate) valid: Arc<[bool]>,
    pub(crate) builder: Arc<InstrumentBuilder>,
}
impl FromBuilder for Instrument {
    type ComponentBuilder = InstrumentBuilder;
}
impl Instrument {
    /// Returns the builder the instrument was built from
    pub fn builder_ref(&self) -> &InstrumentBuilder {
        &self.builder
    }
    pub fn n_measurement(&self) -> usize {
        self.measurements.len()
    }
    /// Number of actuators of a single DM
    pub fn n_actuator(&self) -> usize {
        self.nactux * self.nactux
    }
    fn check(&self, layer: &LayerConfig) -> std::result::Result<(), ConfigurationError> {
        let LayerConfig {
            altitude,
            pitch,
            perturbation: (dx, dy),
        } = *layer;
        if !(pitch.is_finite() && pitch > 0.) {
            return Err(ConfigurationError::Pitch(pitch));
        }
        if !(altitude >= 0. && altitude < self.gsalt) {
            return Err(ConfigurationError::Altitude {
                altitude,
                gsalt: self.gsalt,
            });
        }
        if !(dx.is_finite() && dy.is_finite()) {
            return Err(ConfigurationError::Perturbation(dx, dy));
        }
        Ok(())
    }
}

impl Simulator for Instrument {
    type Geometry = SystemGeom;
    /// Lays out the DM actuators on a square grid centered on the optical axis
    /// and shifted by the layer perturbation
    fn layer(&self, layer: &LayerConfig) -> Result<SystemGeom> {
        self.check(layer)?;
        let sigma = coupling_to_sigma(self.coupling, layer.pitch);
        let (dx, dy) = layer.perturbation;
        let c = 0.5 * (self.nactux - 1) as f64;
        let actuators = (0..self.nactux)
            .flat_map(|i| (0..self.nactux).map(move |j| (i, j)))
            .map(|(i, j)| Actuator {
                sigma,
                position: [
                    (j as f64 - c) * layer.pitch + dx,
                    (i as f64 - c) * layer.pitch + dy,
                    layer.altitude,
                ],
            })
            .collect();
        Ok(SystemGeom {
            measurements: self.measurements.clone(),
            valid: self.valid.clone(),
            actuators,
        })
    }
    fn merge(&self, geometries: Vec<SystemGeom>) -> Result<SystemGeom> {
        let mut iter = geometries.into_iter();
        let mut merged = iter.next().ok_or(ConfigurationError::EmptyMerge)?;
        for geom in iter {
            if geom.n_measurement() != merged.n_measurement() {
                return Err(SimulationFailure::MeasurementMismatch {
                    expected: merged.n_measurement(),
                    found: geom.n_measurement(),
                }
                .into());
            }
            merged.actuators.extend(geom.actuators);
        }
        Ok(merged)
    }
}

/// [`Instrument`] system geometry
#[derive(Debug, Clone)]
pub struct SystemGeom {
    measurements: Arc<[Measurement]>,
    valid: Arc<[bool]>,
    actuators: Vec<Actuator>,
}
impl SystemGeom {
    #[inline]
    fn eval(&self, row: usize, col: usize) -> f64 {
        self.measurements[row].slope(&self.actuators[col])
    }
}
impl Geometry for SystemGeom {
    fn n_measurement(&self) -> usize {
        self.measurements.len()
    }
    fn n_actuator(&self) -> usize {
        self.actuators.len()
    }
    /// Computes the interaction matrix actuator after actuator, in parallel
    fn imat(&self, pb: Option<&ProgressBar>) -> Result<DMatrix<f64>> {
        let (nrows, ncols) = (self.n_measurement(), self.n_actuator());
        let mut data = vec![0f64; nrows * ncols];
        if nrows > 0 {
            data.par_chunks_mut(nrows)
                .enumerate()
                .for_each(|(col, column)| {
                    column
                        .iter_mut()
                        .enumerate()
                        .for_each(|(row, x)| *x = self.eval(row, col));
                    pb.map(|pb| pb.inc(1));
                });
        }
        Ok(DMatrix::from_vec(nrows, ncols, data))
    }
    fn imat_sparse(&self, indices: &IndexSet) -> Result<DVector<f64>> {
        let (nrows, ncols) = (self.n_measurement(), self.n_actuator());
        let values = indices
            .iter()
            .map(|&(row, col)| {
                if row < nrows && col < ncols {
                    Ok(self.eval(row, col))
                } else {
                    Err(SimulationFailure::IndexOutOfBounds {
                        row,
                        col,
                        nrows,
                        ncols,
                    })
                }
            })
            .collect::<std::result::Result<Vec<f64>, _>>()?;
        Ok(DVector::from_vec(values))
    }
    fn valid_measurements(&self) -> Vec<bool> {
        self.valid.to_vec()
    }
}
