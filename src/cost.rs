//!
//! # Misregistration cost
//!
//! Discrepancy between the reference interaction matrix, sampled once at the
//! working set of elements, and the interaction matrix of a trial misregistration
//! sampled at the same elements.

use nalgebra::DVector;

use crate::{
    configure, system::Simulator, ImatBuilder, IndexSet, PerturbationVector, Result,
    SimulationFailure,
};

/// Residual and cost functions of the misregistration fit
///
/// Every evaluation is one sparse interaction matrix build.
pub struct MisregistrationCost<'a, S> {
    builder: &'a ImatBuilder<S>,
    reference: &'a DVector<f64>,
    indices: &'a IndexSet,
}
impl<'a, S: Simulator> MisregistrationCost<'a, S> {
    pub fn new(
        builder: &'a ImatBuilder<S>,
        reference: &'a DVector<f64>,
        indices: &'a IndexSet,
    ) -> Self {
        Self {
            builder,
            reference,
            indices,
        }
    }
    /// Number of residuals
    pub fn len(&self) -> usize {
        self.reference.len()
    }
    pub fn is_empty(&self) -> bool {
        self.reference.is_empty()
    }
    /// Signed residuals: reference minus trial interaction matrix elements
    pub fn residual(&self, trial: &PerturbationVector) -> Result<DVector<f64>> {
        let values = self
            .builder
            .build(&configure(trial), Some(self.indices))?
            .into_samples(self.indices)?;
        if values.len() != self.reference.len() {
            return Err(SimulationFailure::SampleMismatch {
                expected: self.reference.len(),
                found: values.len(),
            }
            .into());
        }
        Ok(self.reference - values)
    }
    /// Frobenius norm of the residuals
    pub fn cost(&self, trial: &PerturbationVector) -> Result<f64> {
        self.residual(trial).map(|r| r.norm())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BuildStrategy, Builder, Instrument, InstrumentBuilder};

    fn builder() -> ImatBuilder<Instrument> {
        let instrument = InstrumentBuilder::default()
            .teldiam(2.0)
            .nsubx(6)
            .nactux(7)
            .on_ring(4, 15.0)
            .build()
            .unwrap();
        ImatBuilder::new(instrument, BuildStrategy::Merged)
    }

    fn setup(builder: &ImatBuilder<Instrument>) -> (DVector<f64>, IndexSet) {
        let indices: IndexSet = (0..40).map(|k| ((k * 7) % 288, (k * 5) % 147)).collect();
        let truth = PerturbationVector::new([0.02, 0.01, -0.03, 0.02, 0.0, 0.05]);
        let reference = builder
            .build(&configure(&truth), Some(&indices))
            .unwrap()
            .as_slice()
            .to_vec();
        (DVector::from_vec(reference), indices)
    }

    #[test]
    fn zero_at_truth() {
        let builder = builder();
        let (reference, indices) = setup(&builder);
        let cost = MisregistrationCost::new(&builder, &reference, &indices);
        let truth = PerturbationVector::new([0.02, 0.01, -0.03, 0.02, 0.0, 0.05]);
        assert_eq!(cost.cost(&truth).unwrap(), 0.0);
        assert!(cost.cost(&PerturbationVector::zeros()).unwrap() > 0.0);
    }

    #[test]
    fn idempotent() {
        let builder = builder();
        let (reference, indices) = setup(&builder);
        let cost = MisregistrationCost::new(&builder, &reference, &indices);
        let p = PerturbationVector::new([0.1, -0.1, 0.05, 0.0, 0.01, 0.02]);
        assert_eq!(cost.residual(&p).unwrap(), cost.residual(&p).unwrap());
        assert_eq!(cost.len(), 40);
    }

    #[test]
    fn cost_is_residual_norm() {
        let builder = builder();
        let (reference, indices) = setup(&builder);
        let cost = MisregistrationCost::new(&builder, &reference, &indices);
        let p = PerturbationVector::zeros();
        let r = cost.residual(&p).unwrap();
        let norm = r.iter().map(|x| x * x).sum::<f64>().sqrt();
        approx::assert_relative_eq!(cost.cost(&p).unwrap(), norm, max_relative = 1e-12);
    }

    #[test]
    fn sample_mismatch() {
        let builder = builder();
        let (_, indices) = setup(&builder);
        let reference = DVector::zeros(3);
        let cost = MisregistrationCost::new(&builder, &reference, &indices);
        assert!(cost
            .residual(&PerturbationVector::zeros())
            .unwrap_err()
            .is_simulation());
    }
}
