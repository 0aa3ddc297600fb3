use super::{fmt_mat3, fmt_vec3};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Single-axis rotation goniometer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goniometer {
    pub rotation_axis: Vector3<f64>,
    pub fixed_rotation: Matrix3<f64>,
    pub setting_rotation: Matrix3<f64>,
}

impl Goniometer {
    pub fn new(
        rotation_axis: Vector3<f64>,
        fixed_rotation: Matrix3<f64>,
        setting_rotation: Matrix3<f64>,
    ) -> Self {
        Self {
            rotation_axis: rotation_axis.normalize(),
            fixed_rotation,
            setting_rotation,
        }
    }

    /// Rotation about +x with no fixed or setting rotation
    pub fn single_axis() -> Self {
        Self::new(
            Vector3::new(1.0, 0.0, 0.0),
            Matrix3::identity(),
            Matrix3::identity(),
        )
    }
}

impl Default for Goniometer {
    fn default() -> Self {
        Self::single_axis()
    }
}

impl fmt::Display for Goniometer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "    Rotation axis:  {}", fmt_vec3(&self.rotation_axis))?;
        writeln!(f, "    Fixed rotation:  {}", fmt_mat3(&self.fixed_rotation))?;
        write!(f, "    Setting rotation:{}", fmt_mat3(&self.setting_rotation))
    }
}
