use serde::{Deserialize, Serialize};
use skyangle::Conversion;
use std::{
    f64::consts::PI,
    fs::File,
    io::{Read, Write},
    path::Path,
    sync::Arc,
};

use super::{
    optics::{Line, Measurement, SlopeAxis},
    Instrument,
};
use crate::{Builder, ConfigurationError, Result};

/// [`Instrument`] builder
///
/// The instrument constants are shared by all the DM layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentBuilder {
    /// telescope diameter [m]
    pub teldiam: f64,
    /// central obstruction ratio
    pub cobs: f64,
    /// Fried parameter [m]
    pub r0: f64,
    /// DM actuator coupling
    pub coupling: f64,
    /// number of actuators across each DM
    pub nactux: usize,
    /// number of subapertures across each wavefront sensor
    pub nsubx: usize,
    /// wavefront sensor guide star directions (x,y) [arcsec]
    pub wfs_dirs: Vec<(f64, f64)>,
    /// guide star altitude [m]
    pub gsalt: f64,
}
/// Default properties:
///  * telescope diameter : 8m
///  * central obstruction: 0.16
///  * r0                 : 12cm
///  * actuator coupling  : 0.3
///  * actuators across   : 41
///  * subapertures across: 40
///  * guide stars        : 8 laser guide stars on a 17.5arcsec radius ring at 90km
impl Default for InstrumentBuilder {
    fn default() -> Self {
        Self {
            teldiam: 8.0,
            cobs: 0.16,
            r0: 0.12,
            coupling: 0.3,
            nactux: 41,
            nsubx: 40,
            wfs_dirs: ring(8, 17.5),
            gsalt: 90e3,
        }
    }
}

fn ring(n: usize, radius: f64) -> Vec<(f64, f64)> {
    (0..n)
        .map(|i| 2. * PI * i as f64 / n as f64)
        .map(|theta| (radius * theta.cos(), radius * theta.sin()))
        .collect()
}

impl InstrumentBuilder {
    /// Load the instrument builder from a toml
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file =
            File::open(path).map_err(|e| ConfigurationError::Open(e, path.to_path_buf()))?;
        let mut toml = String::new();
        file.read_to_string(&mut toml)
            .map_err(|e| ConfigurationError::Read(e, path.to_path_buf()))?;
        Ok(toml::from_str(&toml).map_err(ConfigurationError::from)?)
    }
    /// Save the instrument builder into a toml
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let toml = toml::to_string_pretty(self).map_err(ConfigurationError::from)?;
        let mut file =
            File::create(path).map_err(|e| ConfigurationError::Create(e, path.to_path_buf()))?;
        write!(file, "# ::misreg::InstrumentBuilder\n\n{}", toml)
            .map_err(|e| ConfigurationError::Write(e, path.to_path_buf()))?;
        Ok(())
    }
    /// Set the telescope diameter in meters
    pub fn teldiam(self, teldiam: f64) -> Self {
        Self { teldiam, ..self }
    }
    /// Set the central obstruction ratio
    pub fn cobs(self, cobs: f64) -> Self {
        Self { cobs, ..self }
    }
    /// Set the Fried parameter in meters
    pub fn r0(self, r0: f64) -> Self {
        Self { r0, ..self }
    }
    /// Set the coupling between neighbouring actuators
    pub fn coupling(self, coupling: f64) -> Self {
        Self { coupling, ..self }
    }
    /// Set the number of actuators across the DMs
    pub fn nactux(self, nactux: usize) -> Self {
        Self { nactux, ..self }
    }
    /// Set the number of subapertures across the wavefront sensors
    pub fn nsubx(self, nsubx: usize) -> Self {
        Self { nsubx, ..self }
    }
    /// Set the guide star directions in arcsec
    pub fn wfs_dirs(self, wfs_dirs: Vec<(f64, f64)>) -> Self {
        Self { wfs_dirs, ..self }
    }
    /// Set `n` guide stars evenly distributed on a ring of radius `radius` arcsec
    pub fn on_ring(self, n: usize, radius: f64) -> Self {
        Self {
            wfs_dirs: ring(n, radius),
            ..self
        }
    }
    /// Set the guide star altitude in meters
    pub fn gsalt(self, gsalt: f64) -> Self {
        Self { gsalt, ..self }
    }
    fn check(&self) -> std::result::Result<(), ConfigurationError> {
        let invalid = |name, value| Err(ConfigurationError::Instrument { name, value });
        if !(self.teldiam.is_finite() && self.teldiam > 0.) {
            return invalid("telescope diameter", self.teldiam);
        }
        if !(0. ..1.).contains(&self.cobs) {
            return invalid("central obstruction", self.cobs);
        }
        if !(self.r0.is_finite() && self.r0 > 0.) {
            return invalid("r0", self.r0);
        }
        if !(self.coupling > 0. && self.coupling < 1.) {
            return invalid("actuator coupling", self.coupling);
        }
        if self.nactux == 0 {
            return invalid("number of actuators across", 0.);
        }
        if self.nsubx == 0 {
            return invalid("number of subapertures across", 0.);
        }
        if self.wfs_dirs.is_empty() {
            return invalid("number of guide stars", 0.);
        }
        if let Some(&(x, y)) = self
            .wfs_dirs
            .iter()
            .find(|(x, y)| !(x.is_finite() && y.is_finite()))
        {
            return invalid("guide star direction", if x.is_finite() { y } else { x });
        }
        if !(self.gsalt.is_finite() && self.gsalt > 0.) {
            return invalid("guide star altitude", self.gsalt);
        }
        Ok(())
    }
}

impl Builder for InstrumentBuilder {
    type Component = Instrument;
    /// Build the `Instrument`
    ///
    /// The wavefront sensor measurements are laid out guide star after guide star,
    /// subaperture after subaperture (row-major), x-slope then y-slope.
    fn build(self) -> Result<Instrument> {
        self.check()?;
        let d = self.teldiam / self.nsubx as f64;
        let (r_out, r_in) = (0.5 * self.teldiam, 0.5 * self.cobs * self.teldiam);
        let mut measurements = vec![];
        let mut valid = vec![];
        for &(tx, ty) in &self.wfs_dirs {
            let theta = (tx.from_arcsec(), ty.from_arcsec());
            for i in 0..self.nsubx {
                for j in 0..self.nsubx {
                    let x0 = (j as f64 - 0.5 * self.nsubx as f64 + 0.5) * d;
                    let y0 = (i as f64 - 0.5 * self.nsubx as f64 + 0.5) * d;
                    let r = x0.hypot(y0);
                    let line = Line::to_guide_star(x0, y0, theta, self.gsalt);
                    for axis in [SlopeAxis::X, SlopeAxis::Y] {
                        measurements.push(Measurement {
                            line,
                            axis,
                            gsalt: self.gsalt,
                        });
                        valid.push(r <= r_out && r >= r_in);
                    }
                }
            }
        }
        log::info!(
            "Instrument: {:.1}m telescope, {} guide stars at {:.0}km, {} measurements ({} valid)",
            self.teldiam,
            self.wfs_dirs.len(),
            self.gsalt * 1e-3,
            measurements.len(),
            valid.iter().filter(|v| **v).count()
        );
        Ok(Instrument {
            gsalt: self.gsalt,
            coupling: self.coupling,
            nactux: self.nactux,
            measurements: measurements.into(),
            valid: valid.into(),
            builder: Arc::new(self),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ring() {
        let builder = InstrumentBuilder::default();
        assert_eq!(builder.wfs_dirs.len(), 8);
        builder
            .wfs_dirs
            .iter()
            .for_each(|(x, y)| assert!((x.hypot(*y) - 17.5).abs() < 1e-12));
    }

    #[test]
    fn invalid_coupling() {
        let err = InstrumentBuilder::default().coupling(1.5).build().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn invalid_cobs() {
        let err = InstrumentBuilder::default().cobs(-0.1).build().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn no_guide_star() {
        let err = InstrumentBuilder::default()
            .wfs_dirs(vec![])
            .build()
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn toml_roundtrip() -> anyhow::Result<()> {
        let path = std::env::temp_dir().join("misreg_instrument_builder.toml");
        let builder = InstrumentBuilder::default().nsubx(10).teldiam(2.0);
        builder.save(&path)?;
        assert_eq!(InstrumentBuilder::load(&path)?, builder);
        Ok(())
    }
}
