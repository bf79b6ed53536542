//! Failures of a custom interaction matrix simulator propagate out of the calibration

use indicatif::ProgressBar;
use misreg::{
    BuildStrategy, Calibration, Geometry, ImatBuilder, IndexSet, LayerConfig,
    PerturbationVector, Reference, Result, SensitivitySelector, SimulationFailure, Simulator,
    SolverFamily,
};
use nalgebra::{DMatrix, DVector};

/// Simulator failing as soon as a DM is misregistered
struct Rigid;

struct RigidGeom {
    shift: f64,
}
impl Geometry for RigidGeom {
    fn n_measurement(&self) -> usize {
        4
    }
    fn n_actuator(&self) -> usize {
        3
    }
    fn imat(&self, _pb: Option<&ProgressBar>) -> Result<DMatrix<f64>> {
        if self.shift > 0. {
            return Err(SimulationFailure::Simulator("misregistered DM".into()).into());
        }
        Ok(DMatrix::from_fn(4, 3, |i, j| (1 + i + j) as f64))
    }
    fn imat_sparse(&self, indices: &IndexSet) -> Result<DVector<f64>> {
        let imat = self.imat(None)?;
        Ok(DVector::from_iterator(
            indices.len(),
            indices.iter().map(|&idx| imat[idx]),
        ))
    }
    fn valid_measurements(&self) -> Vec<bool> {
        vec![true; 4]
    }
}

impl Simulator for Rigid {
    type Geometry = RigidGeom;
    fn layer(&self, layer: &LayerConfig) -> Result<RigidGeom> {
        let (dx, dy) = layer.perturbation;
        Ok(RigidGeom {
            shift: dx.abs() + dy.abs(),
        })
    }
    fn merge(&self, geometries: Vec<RigidGeom>) -> Result<RigidGeom> {
        Ok(RigidGeom {
            shift: geometries.iter().map(|g| g.shift).sum(),
        })
    }
}

fn calibration(solver: SolverFamily) -> Calibration<Rigid> {
    Calibration::new(
        ImatBuilder::new(Rigid, BuildStrategy::Merged),
        SensitivitySelector::default().target_count(5).seed(0),
        solver,
        PerturbationVector::new([0.1, 0., 0., 0., 0., 0.]),
    )
}

fn reference() -> Reference {
    let indices = IndexSet::from(vec![(0, 0), (1, 2), (3, 1)]);
    // (0, 0) is off by 1
    let values = DVector::from_vec(vec![2., 4., 5.]);
    Reference { indices, values }
}

#[test]
fn initialize() {
    let err = calibration(SolverFamily::least_squares())
        .initialize()
        .unwrap_err();
    assert!(err.is_simulation());
}

#[test]
fn least_squares() {
    let err = calibration(SolverFamily::least_squares())
        .optimize(&reference())
        .unwrap_err();
    assert!(err.is_simulation());
}

#[test]
fn nelder_mead() {
    let err = calibration(SolverFamily::minimize())
        .optimize(&reference())
        .unwrap_err();
    assert!(err.is_simulation());
}

#[test]
fn home_position() -> anyhow::Result<()> {
    let calibration = calibration(SolverFamily::least_squares());
    let reference = reference();
    let cost = misreg::MisregistrationCost::new(
        calibration.imat_builder(),
        &reference.values,
        &reference.indices,
    );
    assert_eq!(cost.cost(&PerturbationVector::zeros())?, 1.);
    Ok(())
}
