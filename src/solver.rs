//!
//! # Misregistration solvers
//!
//! The misregistration is found either by nonlinear least squares on the residuals
//! ([Levenberg-Marquardt](https://docs.rs/levenberg-marquardt)) or by minimizing the
//! Frobenius norm of the residuals with a derivative free method
//! ([Nelder-Mead](https://docs.rs/argmin)).
//! A solver that stops without converging is not an error: the best estimate is
//! returned with [`Solution::converged`] set to `false`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{
    system::Simulator, ConfigurationError, MisregistrationCost, PerturbationVector, Result,
};

mod least_squares;
mod minimize;

/// Solver families and their settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SolverFamily {
    /// Levenberg-Marquardt on the signed residuals with a forward finite differences
    /// Jacobian
    LeastSquares {
        /// relative reduction of the sum of squares
        ftol: f64,
        /// relative change of the solution
        xtol: f64,
        /// orthogonality between the residuals and the Jacobian columns
        gtol: f64,
        /// the solver stops after `patience * (n + 1)` residual evaluations
        patience: usize,
    },
    /// Nelder-Mead on the Frobenius norm of the residuals
    Minimize {
        /// maximum number of iterations
        max_iters: u64,
        /// standard deviation of the cost over the simplex at convergence
        sd_tolerance: f64,
        /// size of the initial simplex [m]
        initial_step: f64,
    },
}
impl Default for SolverFamily {
    fn default() -> Self {
        Self::least_squares()
    }
}
impl SolverFamily {
    /// Least squares with the default Levenberg-Marquardt settings
    pub fn least_squares() -> Self {
        let tol = f64::EPSILON.sqrt();
        Self::LeastSquares {
            ftol: tol,
            xtol: tol,
            gtol: 0.,
            patience: 100,
        }
    }
    /// Nelder-Mead minimization with a 5cm initial simplex
    pub fn minimize() -> Self {
        Self::Minimize {
            max_iters: 2000,
            sd_tolerance: 1e-12,
            initial_step: 0.05,
        }
    }
    fn check(&self) -> std::result::Result<(), ConfigurationError> {
        let positive = |x: f64| x.is_finite() && x >= 0.;
        match *self {
            Self::LeastSquares {
                ftol,
                xtol,
                gtol,
                patience,
            } => {
                if !(positive(ftol) && positive(xtol) && positive(gtol)) {
                    return Err(ConfigurationError::Solver(format!(
                        "tolerances must be positive, found ftol={ftol}, xtol={xtol}, gtol={gtol}"
                    )));
                }
                if patience == 0 {
                    return Err(ConfigurationError::Solver("patience must be > 0".into()));
                }
            }
            Self::Minimize {
                max_iters,
                sd_tolerance,
                initial_step,
            } => {
                if max_iters == 0 {
                    return Err(ConfigurationError::Solver("max_iters must be > 0".into()));
                }
                if !positive(sd_tolerance) {
                    return Err(ConfigurationError::Solver(format!(
                        "sd_tolerance must be positive, found {sd_tolerance}"
                    )));
                }
                if !(initial_step.is_finite() && initial_step > 0.) {
                    return Err(ConfigurationError::Solver(format!(
                        "initial_step must be > 0, found {initial_step}"
                    )));
                }
            }
        }
        Ok(())
    }
    /// Finds the misregistration minimizing the cost, starting from `x0`
    pub fn solve<S: Simulator>(
        &self,
        cost: &MisregistrationCost<'_, S>,
        x0: &PerturbationVector,
    ) -> Result<Solution> {
        self.check()?;
        let solution = match *self {
            Self::LeastSquares {
                ftol,
                xtol,
                gtol,
                patience,
            } => least_squares::solve(cost, x0, ftol, xtol, gtol, patience)?,
            Self::Minimize {
                max_iters,
                sd_tolerance,
                initial_step,
            } => minimize::solve(cost, x0, max_iters, sd_tolerance, initial_step)?,
        };
        if solution.converged {
            log::info!("{}", solution.termination);
        } else {
            log::warn!("solver did not converge: {}", solution.termination);
        }
        Ok(solution)
    }
}

/// Solver result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    /// best misregistration estimate
    pub estimate: PerturbationVector,
    /// `true` if the solver convergence criteria are met
    pub converged: bool,
    /// number of solver iterations
    pub n_iterations: usize,
    /// number of sparse interaction matrix builds
    pub n_evaluations: usize,
    /// Frobenius norm of the residuals at the estimate
    pub cost: f64,
    /// solver termination reason
    pub termination: String,
}
impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, " estimate    : {}", self.estimate)?;
        writeln!(f, " converged   : {}", self.converged)?;
        writeln!(f, " termination : {}", self.termination)?;
        writeln!(f, " iterations  : {}", self.n_iterations)?;
        writeln!(f, " evaluations : {}", self.n_evaluations)?;
        write!(f, " cost        : {:.6e}", self.cost)
    }
}
