//!
//! # Misregistration calibration
//!
//! The calibration is a two steps process:
//!  1. [`Calibration::initialize`] builds the home interaction matrix, selects the
//!     working set of elements and samples the reference interaction matrix,
//!  2. [`Calibration::optimize`] fits the misregistration to the reference, starting
//!     from zero misregistration.
//!
//! ```no_run
//! use misreg::{Builder, Calibration, FromBuilder, InstrumentBuilder};
//!
//! let calibration = Calibration::builder()
//!     .instrument(InstrumentBuilder::default().teldiam(2.0).nsubx(10).nactux(17))
//!     .seed(1)
//!     .build()?;
//! let reference = calibration.initialize()?;
//! let report = calibration.optimize(&reference)?;
//! println!("{report}");
//! # Ok::<(), misreg::MisregError>(())
//! ```

use indicatif::{ProgressBar, ProgressStyle};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{self, Display},
    fs::File,
    path::Path,
    time::{Duration, Instant},
};

use crate::{
    configure, system::Simulator, FromBuilder, ImatBuilder, IndexSet, Instrument,
    InteractionMatrix, MisregistrationCost, PerturbationVector, Result, SensitivitySelector,
    SimulationFailure, Solution, SolverFamily,
};

mod builder;
pub use builder::{CalibrationBuilder, GROUND_TRUTH};

/// Reference interaction matrix sampled at the working set of elements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    /// working set of interaction matrix elements
    pub indices: IndexSet,
    /// interaction matrix elements of the misregistered system
    pub values: DVector<f64>,
}
impl Reference {
    pub fn len(&self) -> usize {
        self.indices.len()
    }
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// DM misregistration calibration
pub struct Calibration<S = Instrument> {
    imat_builder: ImatBuilder<S>,
    selector: SensitivitySelector,
    solver: SolverFamily,
    truth: PerturbationVector,
    progress: bool,
}
impl FromBuilder for Calibration {
    type ComponentBuilder = CalibrationBuilder;
}
impl<S: Simulator> Calibration<S> {
    /// Creates a calibration for any interaction matrix simulator
    pub fn new(
        imat_builder: ImatBuilder<S>,
        selector: SensitivitySelector,
        solver: SolverFamily,
        truth: PerturbationVector,
    ) -> Self {
        Self {
            imat_builder,
            selector,
            solver,
            truth,
            progress: false,
        }
    }
    pub fn imat_builder(&self) -> &ImatBuilder<S> {
        &self.imat_builder
    }
    pub fn truth(&self) -> &PerturbationVector {
        &self.truth
    }
    /// Builds the home interaction matrix, selects the working set and samples
    /// the reference interaction matrix at the ground truth
    pub fn initialize(&self) -> Result<Reference> {
        let pb = self.progress.then(|| {
            let pb = ProgressBar::new(0);
            if let Ok(style) = ProgressStyle::with_template(
                "{msg} [{eta_precise}] {bar:50.cyan/blue} {pos:>7}/{len:7}",
            ) {
                pb.set_style(style);
            }
            pb.set_message("Home interaction matrix");
            pb
        });
        let now = Instant::now();
        let home = self.imat_builder.build_with_progress(
            &configure(&PerturbationVector::zeros()),
            None,
            pb,
        )?;
        let InteractionMatrix::Full(home) = home else {
            return Err(SimulationFailure::Simulator(
                "the home interaction matrix must be a full matrix".into(),
            )
            .into());
        };
        log::info!(
            "home {}x{} interaction matrix built in {:.3}s",
            home.nrows(),
            home.ncols(),
            now.elapsed().as_secs_f64()
        );
        let indices = self.selector.select(&home)?;
        let values = self
            .imat_builder
            .build(&configure(&self.truth), Some(&indices))?
            .into_samples(&indices)?;
        log::info!(
            "reference interaction matrix sampled at {} elements",
            values.len()
        );
        Ok(Reference { indices, values })
    }
    /// Fits the misregistration to the reference, starting from zero
    pub fn optimize(&self, reference: &Reference) -> Result<Report> {
        let cost = MisregistrationCost::new(
            &self.imat_builder,
            &reference.values,
            &reference.indices,
        );
        let now = Instant::now();
        let solution = self.solver.solve(&cost, &PerturbationVector::zeros())?;
        let elapsed = now.elapsed().as_secs_f64();
        log::info!("misregistration fitted in {:.3}s", elapsed);
        Ok(Report {
            solution,
            truth: self.truth,
            elapsed,
            n_sample: reference.len(),
            n_unique: reference.indices.n_unique(),
        })
    }
    /// Initializes and optimizes the calibration
    pub fn run(&self) -> Result<Report> {
        let reference = self.initialize()?;
        self.optimize(&reference)
    }
    /// Mean duration of a sparse interaction matrix build at the home position,
    /// sampled at the reference working set
    pub fn time_sparse_build(&self, reference: &Reference, repeats: usize) -> Result<Duration> {
        let layers = configure(&PerturbationVector::zeros());
        let n = repeats.max(1);
        let now = Instant::now();
        for _ in 0..n {
            self.imat_builder.build(&layers, Some(&reference.indices))?;
        }
        let mean = now.elapsed().div_f64(n as f64);
        log::info!(
            "sparse interaction matrix build ({} elements): {:.3}ms",
            reference.len(),
            mean.as_secs_f64() * 1e3
        );
        Ok(mean)
    }
}

/// Calibration report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub solution: Solution,
    /// misregistration of the reference interaction matrix
    pub truth: PerturbationVector,
    /// optimization duration [s]
    pub elapsed: f64,
    /// size of the working set
    pub n_sample: usize,
    /// number of distinct elements in the working set
    pub n_unique: usize,
}
impl Report {
    /// Largest absolute difference between the estimate and the truth
    pub fn error(&self) -> f64 {
        self.solution.estimate.max_abs_diff(&self.truth)
    }
    pub fn dump<P: AsRef<Path> + Display>(&self, path: P) -> Result<()> {
        let mut file = File::create(&path)?;
        serde_pickle::to_writer(&mut file, self, Default::default())?;
        log::info!("report written to {}", path);
        Ok(())
    }
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_pickle::from_reader(file, Default::default())?)
    }
}
impl Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Elapsed time: {:.3}s", self.elapsed)?;
        writeln!(
            f,
            "Working set : {} elements ({} unique)",
            self.n_sample, self.n_unique
        )?;
        writeln!(f, "Solver result:")?;
        writeln!(f, "{}", self.solution)?;
        writeln!(f, "Recovered : {}", self.solution.estimate)?;
        writeln!(f, "True      : {}", self.truth)?;
        write!(f, "Max error : {:.3e}m", self.error())
    }
}
