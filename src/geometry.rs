//! Deformable mirrors geometry
//!
//! The system has 3 DMs conjugated to fixed altitudes with fixed actuator pitches,
//! only their lateral shifts (the misregistration) are unknown.

use serde::{Deserialize, Serialize};
use std::{fmt, ops::Index};

use crate::{ConfigurationError, Result};

/// Number of DM layers
pub const N_LAYER: usize = 3;
/// DM conjugation altitudes [m]: ground, mid and high layers
pub const DM_ALTITUDES: [f64; N_LAYER] = [0.0, 6000.0, 13500.0];
/// DM actuator pitches [m]
pub const DM_PITCHES: [f64; N_LAYER] = [0.22, 0.25, 0.30];

/// DMs lateral shifts `[dm1x, dm1y, dm2x, dm2y, dm3x, dm3y]` in meters
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerturbationVector([f64; 2 * N_LAYER]);

impl PerturbationVector {
    pub fn new(values: [f64; 2 * N_LAYER]) -> Self {
        Self(values)
    }
    /// The home position: no misregistration
    pub fn zeros() -> Self {
        Self::default()
    }
    /// Builds a perturbation vector from a slice that must have exactly 6 elements
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        let values: [f64; 2 * N_LAYER] = values
            .try_into()
            .map_err(|_| ConfigurationError::PerturbationLength(values.len()))?;
        Ok(Self(values))
    }
    /// The (x,y) shift of DM `layer`
    pub fn pair(&self, layer: usize) -> (f64, f64) {
        (self.0[2 * layer], self.0[2 * layer + 1])
    }
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.0.iter()
    }
    /// Largest absolute difference with another perturbation vector
    pub fn max_abs_diff(&self, other: &Self) -> f64 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0f64, f64::max)
    }
}

impl From<[f64; 2 * N_LAYER]> for PerturbationVector {
    fn from(values: [f64; 2 * N_LAYER]) -> Self {
        Self(values)
    }
}

impl Index<usize> for PerturbationVector {
    type Output = f64;
    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl fmt::Display for PerturbationVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, x) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:+.8}", x)?;
        }
        write!(f, "]")
    }
}

/// A DM layer: conjugation altitude, actuator pitch and lateral shift
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    /// altitude [m]
    pub altitude: f64,
    /// actuator pitch [m]
    pub pitch: f64,
    /// (x,y) shift [m]
    pub perturbation: (f64, f64),
}

/// Returns the 3 DM layers shifted according to the perturbation vector
pub fn configure(perturbation: &PerturbationVector) -> [LayerConfig; N_LAYER] {
    std::array::from_fn(|i| LayerConfig {
        altitude: DM_ALTITUDES[i],
        pitch: DM_PITCHES[i],
        perturbation: perturbation.pair(i),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layers() {
        let p = PerturbationVector::new([1., 2., 3., 4., 5., 6.]);
        let layers = configure(&p);
        assert_eq!(layers.len(), 3);
        assert_eq!(layers.map(|l| l.altitude), [0.0, 6000.0, 13500.0]);
        assert_eq!(layers.map(|l| l.pitch), [0.22, 0.25, 0.30]);
        assert_eq!(
            layers.map(|l| l.perturbation),
            [(1., 2.), (3., 4.), (5., 6.)]
        );
    }

    #[test]
    fn home() {
        configure(&PerturbationVector::zeros())
            .iter()
            .for_each(|l| assert_eq!(l.perturbation, (0., 0.)));
    }

    #[test]
    fn wrong_length() {
        let err = PerturbationVector::from_slice(&[0.; 5]).unwrap_err();
        assert!(err.is_configuration());
        assert!(PerturbationVector::from_slice(&[0.; 6]).is_ok());
    }
}
