use argmin::{
    core::{CostFunction, Executor, State, TerminationReason, TerminationStatus},
    solver::neldermead::NelderMead,
};

use super::Solution;
use crate::{
    system::Simulator, ConfigurationError, MisregError, MisregistrationCost, PerturbationVector,
    Result,
};

/// Frobenius norm of the residuals as an argmin cost function
struct Problem<'a, 'b, S> {
    cost: &'a MisregistrationCost<'b, S>,
}
impl<S: Simulator> CostFunction for Problem<'_, '_, S> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
        let p = PerturbationVector::from_slice(param)?;
        Ok(self.cost.cost(&p)?)
    }
}

/// Recovers the crate error from an argmin error, argmin own errors are solver errors
fn into_misreg(e: argmin::core::Error) -> MisregError {
    e.downcast::<MisregError>()
        .unwrap_or_else(|e| ConfigurationError::Solver(e.to_string()).into())
}

pub(super) fn solve<S: Simulator>(
    cost: &MisregistrationCost<'_, S>,
    x0: &PerturbationVector,
    max_iters: u64,
    sd_tolerance: f64,
    initial_step: f64,
) -> Result<Solution> {
    let x0 = x0.as_slice().to_vec();
    let simplex: Vec<Vec<f64>> = std::iter::once(x0.clone())
        .chain((0..x0.len()).map(|i| {
            let mut x = x0.clone();
            x[i] += initial_step;
            x
        }))
        .collect();
    let solver = NelderMead::new(simplex)
        .with_sd_tolerance(sd_tolerance)
        .map_err(|e| ConfigurationError::Solver(e.to_string()))?;

    let res = Executor::new(Problem { cost }, solver)
        .configure(|state| state.max_iters(max_iters))
        .run()
        .map_err(into_misreg)?;

    let state = res.state();
    let best = state
        .get_best_param()
        .ok_or_else(|| ConfigurationError::Solver("Nelder-Mead returned no estimate".into()))?;
    let estimate = PerturbationVector::from_slice(best)?;
    let status = state.get_termination_status();
    Ok(Solution {
        estimate,
        converged: matches!(
            status,
            TerminationStatus::Terminated(TerminationReason::SolverConverged)
        ),
        n_iterations: state.get_iter() as usize,
        n_evaluations: state
            .get_func_counts()
            .get("cost_count")
            .map_or(0, |&n| n as usize),
        cost: state.get_best_cost(),
        termination: format!("Nelder-Mead: {status:?}"),
    })
}
