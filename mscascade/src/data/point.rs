use serde::{Deserialize, Serialize};

/// A two dimensional data point, either (m/z, intensity) or (retention time, intensity)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

/// The atomic unit of a feature: retention time, m/z and intensity
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Triple {
    pub rt: f64,
    pub mz: f64,
    pub intensity: f64,
}

impl Triple {
    pub fn new(rt: f64, mz: f64, intensity: f64) -> Self {
        Triple { rt, mz, intensity }
    }

    /// Projection onto the chromatographic plane
    pub fn time_point(&self) -> Point {
        Point::new(self.rt, self.intensity)
    }

    /// Projection onto the spectral plane
    pub fn mass_point(&self) -> Point {
        Point::new(self.mz, self.intensity)
    }
}
