//!
//! # Deformable mirrors misregistration
//!
//! Estimates the lateral shifts of the deformable mirrors (DMs) of a multi-conjugate
//! adaptive optics system by fitting a parametric interaction matrix model to an
//! interaction matrix sampled at a few sensitive elements.
//!
//! The pipeline is:
//!  1. build the full interaction matrix at the home position (no misregistration),
//!  2. select a bounded set of elements whose magnitude exceeds a threshold,
//!  3. sample the interaction matrix of the misregistered system at those elements only,
//!  4. fit the misregistration with a nonlinear solver starting from zero.
//!
//! Every component is created with the builder associated to it:
//! ```no_run
//! use misreg::{Builder, Calibration, FromBuilder};
//!
//! let calibration = Calibration::builder().seed(7).build()?;
//! let report = calibration.run()?;
//! println!("{report}");
//! # Ok::<(), misreg::MisregError>(())
//! ```

pub mod calibration;
pub mod cost;
pub mod error;
pub mod geometry;
pub mod imat;
pub mod sensitivity;
pub mod solver;
pub mod system;

#[doc(inline)]
pub use self::calibration::{Calibration, CalibrationBuilder, Reference, Report};
#[doc(inline)]
pub use self::cost::MisregistrationCost;
#[doc(inline)]
pub use self::error::{ConfigurationError, MisregError, SimulationFailure};
#[doc(inline)]
pub use self::geometry::{configure, LayerConfig, PerturbationVector, N_LAYER};
#[doc(inline)]
pub use self::imat::{BuildStrategy, ImatBuilder, IndexSet, InteractionMatrix};
#[doc(inline)]
pub use self::sensitivity::{Sampling, SensitivitySelector};
#[doc(inline)]
pub use self::solver::{Solution, SolverFamily};
#[doc(inline)]
pub use self::system::{Geometry, Instrument, InstrumentBuilder, Simulator, SystemGeom};

pub type Result<T> = std::result::Result<T, MisregError>;

/// Builder type trait
pub trait Builder: Default {
    type Component;
    fn new() -> Self {
        Default::default()
    }
    fn build(self) -> Result<Self::Component>;
}

/// Gives access to the builder of a component
pub trait FromBuilder {
    type ComponentBuilder: Builder;
    fn builder() -> Self::ComponentBuilder {
        Self::ComponentBuilder::new()
    }
}
