use super::fmt_vec3;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Incident X-ray beam
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beam {
    /// Unit vector pointing from the sample towards the source
    pub direction: Vector3<f64>,
    /// Wavelength in Angstrom
    pub wavelength: f64,
    pub divergence: f64,
    pub sigma_divergence: f64,
    pub polarization_normal: Vector3<f64>,
    pub polarization_fraction: f64,
}

impl Beam {
    pub fn new(direction: Vector3<f64>, wavelength: f64) -> Self {
        Self {
            direction: direction.normalize(),
            wavelength,
            divergence: 0.0,
            sigma_divergence: 0.0,
            polarization_normal: Vector3::new(0.0, 1.0, 0.0),
            polarization_fraction: 0.999,
        }
    }

    pub fn with_polarization(mut self, normal: Vector3<f64>, fraction: f64) -> Self {
        self.polarization_normal = normal.normalize();
        self.polarization_fraction = fraction;
        self
    }

    pub fn with_divergence(mut self, divergence: f64, sigma_divergence: f64) -> Self {
        self.divergence = divergence;
        self.sigma_divergence = sigma_divergence;
        self
    }

    /// Incident wave vector, pointing away from the source with length 1/wavelength
    pub fn s0(&self) -> Vector3<f64> {
        -self.direction / self.wavelength
    }
}

impl fmt::Display for Beam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "    wavelength: {}", self.wavelength)?;
        writeln!(
            f,
            "    sample to source direction : {}",
            fmt_vec3(&self.direction)
        )?;
        writeln!(f, "    divergence: {}", self.divergence)?;
        writeln!(f, "    sigma divergence: {}", self.sigma_divergence)?;
        writeln!(
            f,
            "    polarization normal: {}",
            fmt_vec3(&self.polarization_normal)
        )?;
        write!(f, "    polarization fraction: {}", self.polarization_fraction)
    }
}
