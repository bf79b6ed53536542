use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use nalgebra::{storage::Owned, DMatrix, DVector, Dyn};
use std::cell::{Cell, RefCell};

use super::Solution;
use crate::{system::Simulator, MisregError, MisregistrationCost, PerturbationVector, Result};

/// Levenberg-Marquardt view of the misregistration residuals
struct Problem<'a, 'b, S> {
    cost: &'a MisregistrationCost<'b, S>,
    params: DVector<f64>,
    residuals: Option<DVector<f64>>,
    failure: RefCell<Option<MisregError>>,
    n_evaluations: Cell<usize>,
    n_jacobians: Cell<usize>,
}
impl<'a, 'b, S: Simulator> Problem<'a, 'b, S> {
    fn new(cost: &'a MisregistrationCost<'b, S>, x0: &PerturbationVector) -> Self {
        let mut this = Self {
            cost,
            params: DVector::from_column_slice(x0.as_slice()),
            residuals: None,
            failure: RefCell::new(None),
            n_evaluations: Cell::new(0),
            n_jacobians: Cell::new(0),
        };
        this.residuals = this.evaluate(&this.params);
        this
    }
    /// Residuals at `x`, the first failure is kept and stops the solver
    fn evaluate(&self, x: &DVector<f64>) -> Option<DVector<f64>> {
        self.n_evaluations.set(self.n_evaluations.get() + 1);
        match PerturbationVector::from_slice(x.as_slice())
            .and_then(|p| self.cost.residual(&p))
        {
            Ok(r) => Some(r),
            Err(e) => {
                log::debug!("residuals evaluation failed at {:?}: {e}", x.as_slice());
                self.failure.borrow_mut().get_or_insert(e);
                None
            }
        }
    }
}

impl<S: Simulator> LeastSquaresProblem<f64, Dyn, Dyn> for Problem<'_, '_, S> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &DVector<f64>) {
        self.params.copy_from(x);
        self.residuals = self.evaluate(x);
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        self.residuals.clone()
    }

    /// Forward finite differences with a step of `sqrt(eps) * max(1, |x|)`
    fn jacobian(&self) -> Option<DMatrix<f64>> {
        self.n_jacobians.set(self.n_jacobians.get() + 1);
        let r0 = self.residuals.as_ref()?;
        let mut jacobian = DMatrix::zeros(r0.len(), self.params.len());
        let eps = f64::EPSILON.sqrt();
        for j in 0..self.params.len() {
            let mut x = self.params.clone();
            x[j] += eps * x[j].abs().max(1.0);
            let h = x[j] - self.params[j];
            let r = self.evaluate(&x)?;
            jacobian.set_column(j, &((r - r0) / h));
        }
        Some(jacobian)
    }
}

pub(super) fn solve<S: Simulator>(
    cost: &MisregistrationCost<'_, S>,
    x0: &PerturbationVector,
    ftol: f64,
    xtol: f64,
    gtol: f64,
    patience: usize,
) -> Result<Solution> {
    let problem = Problem::new(cost, x0);
    let (problem, report) = LevenbergMarquardt::new()
        .with_ftol(ftol)
        .with_xtol(xtol)
        .with_gtol(gtol)
        .with_patience(patience)
        .minimize(problem);
    if let Some(e) = problem.failure.into_inner() {
        return Err(e);
    }
    let estimate = PerturbationVector::from_slice(problem.params.as_slice())?;
    Ok(Solution {
        estimate,
        converged: report.termination.was_successful(),
        n_iterations: problem.n_jacobians.get(),
        n_evaluations: problem.n_evaluations.get(),
        cost: problem
            .residuals
            .as_ref()
            .map_or(f64::NAN, |r| r.norm()),
        termination: format!("Levenberg-Marquardt: {:?}", report.termination),
    })
}
