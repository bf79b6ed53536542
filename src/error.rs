use std::path::PathBuf;

/// Invalid inputs to the pipeline, raised before or instead of any computation
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("expected a perturbation vector of length 6, found {0}")]
    PerturbationLength(usize),
    #[error("DM pitch must be positive and finite, found {0}m")]
    Pitch(f64),
    #[error("DM altitude must be within [0, {gsalt}[m, found {altitude}m")]
    Altitude { altitude: f64, gsalt: f64 },
    #[error("DM perturbation must be finite, found ({0}, {1})")]
    Perturbation(f64, f64),
    #[error("invalid instrument {name}: {value}")]
    Instrument { name: &'static str, value: f64 },
    #[error("cannot merge an empty list of system geometries")]
    EmptyMerge,
    #[error("only {available} sensitive elements above threshold, {requested} requested")]
    InsufficientSensitivity { available: usize, requested: usize },
    #[error("a sparse interaction matrix cannot be restricted to other elements")]
    SparseRestriction,
    #[error("invalid solver settings: {0}")]
    Solver(String),
    #[error("cannot open configuration file: {1}")]
    Open(#[source] std::io::Error, PathBuf),
    #[error("cannot create configuration file: {1}")]
    Create(#[source] std::io::Error, PathBuf),
    #[error("cannot read configuration file: {1}")]
    Read(#[source] std::io::Error, PathBuf),
    #[error("cannot write configuration file: {1}")]
    Write(#[source] std::io::Error, PathBuf),
    #[error("cannot deserialize configuration from toml")]
    Load(#[from] toml::de::Error),
    #[error("cannot serialize configuration into toml")]
    Save(#[from] toml::ser::Error),
}

/// Failures of the interaction matrix simulator during a build
#[derive(Debug, thiserror::Error)]
pub enum SimulationFailure {
    #[error("element ({row}, {col}) is outside the {nrows}x{ncols} interaction matrix")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        nrows: usize,
        ncols: usize,
    },
    #[error("layer interaction matrices have {found} measurements, expected {expected}")]
    MeasurementMismatch { expected: usize, found: usize },
    #[error("expected {expected} interaction matrix samples, found {found}")]
    SampleMismatch { expected: usize, found: usize },
    #[error("interaction matrix simulator failed: {0}")]
    Simulator(String),
}

#[derive(Debug, thiserror::Error)]
pub enum MisregError {
    #[error("misregistration configuration error")]
    Configuration(#[from] ConfigurationError),
    #[error("interaction matrix simulation failure")]
    Simulation(#[from] SimulationFailure),
    #[error("cannot write or read the report")]
    Pickle(#[from] serde_pickle::Error),
    #[error("cannot access the report file")]
    Io(#[from] std::io::Error),
}

impl MisregError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
    pub fn is_simulation(&self) -> bool {
        matches!(self, Self::Simulation(_))
    }
}
