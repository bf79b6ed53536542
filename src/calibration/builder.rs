use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{Read, Write},
    path::Path,
};

use super::Calibration;
use crate::{
    BuildStrategy, Builder, ConfigurationError, ImatBuilder, InstrumentBuilder,
    PerturbationVector, Result, Sampling, SensitivitySelector, SolverFamily,
};

/// Misregistration applied to the reference interaction matrix
pub const GROUND_TRUTH: [f64; 6] = [
    0.00174467,
    0.07772004,
    0.02740716,
    -0.2432777,
    0.09846721,
    -0.07259582,
];

/// [`Calibration`] builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBuilder {
    pub instrument: InstrumentBuilder,
    pub strategy: BuildStrategy,
    pub solver: SolverFamily,
    pub selector: SensitivitySelector,
    /// misregistration of the reference interaction matrix
    pub truth: PerturbationVector,
    /// displays a progress bar during the full interaction matrix build
    pub progress: bool,
}
/// Default properties:
///  * instrument: [`InstrumentBuilder::default`]
///  * strategy  : merged
///  * solver    : least squares
///  * selector  : [`SensitivitySelector::default`]
///  * truth     : `[0.00174467, 0.07772004, 0.02740716, -0.2432777, 0.09846721, -0.07259582]`
///  * progress  : false
impl Default for CalibrationBuilder {
    fn default() -> Self {
        Self {
            instrument: InstrumentBuilder::default(),
            strategy: BuildStrategy::default(),
            solver: SolverFamily::default(),
            selector: SensitivitySelector::default(),
            truth: PerturbationVector::new(GROUND_TRUTH),
            progress: false,
        }
    }
}
impl CalibrationBuilder {
    /// Load the calibration builder from a toml
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file =
            File::open(path).map_err(|e| ConfigurationError::Open(e, path.to_path_buf()))?;
        let mut toml = String::new();
        file.read_to_string(&mut toml)
            .map_err(|e| ConfigurationError::Read(e, path.to_path_buf()))?;
        let builder: Self = toml::from_str(&toml).map_err(ConfigurationError::from)?;
        log::info!("calibration configuration loaded from {}", path.display());
        Ok(builder)
    }
    /// Save the calibration builder into a toml
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let toml = toml::to_string_pretty(self).map_err(ConfigurationError::from)?;
        let mut file =
            File::create(path).map_err(|e| ConfigurationError::Create(e, path.to_path_buf()))?;
        write!(file, "# ::misreg::CalibrationBuilder\n\n{}", toml)
            .map_err(|e| ConfigurationError::Write(e, path.to_path_buf()))?;
        Ok(())
    }
    pub fn instrument(self, instrument: InstrumentBuilder) -> Self {
        Self { instrument, ..self }
    }
    pub fn strategy(self, strategy: BuildStrategy) -> Self {
        Self { strategy, ..self }
    }
    pub fn solver(self, solver: SolverFamily) -> Self {
        Self { solver, ..self }
    }
    pub fn selector(self, selector: SensitivitySelector) -> Self {
        Self { selector, ..self }
    }
    /// Set the sensitivity threshold
    pub fn threshold(self, threshold: f64) -> Self {
        Self {
            selector: self.selector.threshold(threshold),
            ..self
        }
    }
    /// Set the number of sampled interaction matrix elements
    pub fn target_count(self, target_count: usize) -> Self {
        Self {
            selector: self.selector.target_count(target_count),
            ..self
        }
    }
    pub fn sampling(self, sampling: Sampling) -> Self {
        Self {
            selector: self.selector.sampling(sampling),
            ..self
        }
    }
    /// Seed the random selection of the interaction matrix elements
    pub fn seed(self, seed: u64) -> Self {
        Self {
            selector: self.selector.seed(seed),
            ..self
        }
    }
    pub fn truth<T: Into<PerturbationVector>>(self, truth: T) -> Self {
        Self {
            truth: truth.into(),
            ..self
        }
    }
    pub fn progress(self) -> Self {
        Self {
            progress: true,
            ..self
        }
    }
}

impl Builder for CalibrationBuilder {
    type Component = Calibration;
    /// Build the instrument and the `Calibration`
    fn build(self) -> Result<Calibration> {
        let instrument = self.instrument.build()?;
        let mut calibration = Calibration::new(
            ImatBuilder::new(instrument, self.strategy),
            self.selector,
            self.solver,
            self.truth,
        );
        calibration.progress = self.progress;
        Ok(calibration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_roundtrip() -> anyhow::Result<()> {
        let path = std::env::temp_dir().join("misreg_calibration_builder.toml");
        let builder = CalibrationBuilder::default()
            .instrument(InstrumentBuilder::default().nsubx(8).nactux(11))
            .strategy(BuildStrategy::PerLayer { filter: true })
            .solver(SolverFamily::minimize())
            .target_count(200)
            .seed(11);
        builder.save(&path)?;
        assert_eq!(CalibrationBuilder::load(&path)?, builder);
        Ok(())
    }

    #[test]
    fn missing_file() {
        let err = CalibrationBuilder::load("/nonexistent/misreg.toml").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn default_truth() {
        let builder = CalibrationBuilder::default();
        assert_eq!(builder.truth[3], -0.2432777);
        assert_eq!(builder.strategy, BuildStrategy::Merged);
        assert_eq!(builder.selector.sampling, Sampling::WithReplacement);
    }
}
