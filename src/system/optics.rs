//! Line-of-sight geometry and Gaussian influence functions

/// Standard deviation of a Gaussian influence function with the given coupling
/// between actuators separated by `pitch`
pub fn coupling_to_sigma(coupling: f64, pitch: f64) -> f64 {
    pitch / (-2.0 * coupling.ln()).sqrt()
}

#[inline]
fn gaussian(x: f64) -> f64 {
    (-0.5 * x * x).exp()
}

/// A line of sight through the atmosphere
///
/// The line crosses the pupil plane at `(x0, y0)` and its `(x, y)` coordinates
/// change by `(xz, yz)` per meter of altitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    x0: f64,
    xz: f64,
    y0: f64,
    yz: f64,
}
impl Line {
    pub fn new(x0: f64, xz: f64, y0: f64, yz: f64) -> Self {
        Self { x0, xz, y0, yz }
    }
    /// Line from the pupil point `(x0, y0)` to a guide star at `gsalt` meters
    /// in the direction `(theta_x, theta_y)` (radians)
    pub fn to_guide_star(x0: f64, y0: f64, theta: (f64, f64), gsalt: f64) -> Self {
        Self {
            x0,
            xz: theta.0 - x0 / gsalt,
            y0,
            yz: theta.1 - y0 / gsalt,
        }
    }
    /// The `(x, y)` coordinates of the line at the given altitude
    #[inline]
    pub fn position_at_altitude(&self, altitude: f64) -> (f64, f64) {
        (self.x0 + self.xz * altitude, self.y0 + self.yz * altitude)
    }
}

/// Gaussian actuator of a DM
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Actuator {
    /// standard deviation [m]
    pub sigma: f64,
    /// `[x, y, altitude]` [m]
    pub position: [f64; 3],
}
impl Actuator {
    /// Gradient of the influence function where the line crosses the DM
    #[inline]
    pub fn gradient(&self, line: &Line) -> (f64, f64) {
        let [x, y, z] = self.position;
        let (px, py) = line.position_at_altitude(z);
        let (dx, dy) = (px - x, py - y);
        let s2 = self.sigma * self.sigma;
        let f = gaussian((dx * dx + dy * dy).sqrt() / self.sigma);
        (-f * dx / s2, -f * dy / s2)
    }
}

/// Slope measurement direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlopeAxis {
    X,
    Y,
}

/// Slope measurement of a Shack-Hartmann subaperture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub line: Line,
    pub axis: SlopeAxis,
    /// guide star altitude [m]
    pub gsalt: f64,
}
impl Measurement {
    /// Slope, in the pupil plane, of the actuator influence function
    ///
    /// The cone effect shrinks the subaperture footprint at the DM altitude by
    /// `1 - z/gsalt`.
    #[inline]
    pub fn slope(&self, actuator: &Actuator) -> f64 {
        let (gx, gy) = actuator.gradient(&self.line);
        let cone = 1.0 - actuator.position[2] / self.gsalt;
        cone * match self.axis {
            SlopeAxis::X => gx,
            SlopeAxis::Y => gy,
        }
    }
}
