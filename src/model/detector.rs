use super::{fmt_vec2, fmt_vec3};
use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Index;

/// A flat detector panel in the laboratory frame
///
/// Pixel `(x, y)` sits at `origin + fast_axis * x * pixel_size.x + slow_axis * y * pixel_size.y`
/// with all lengths in millimetres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    pub name: String,
    #[serde(rename = "type")]
    pub sensor_type: String,
    pub fast_axis: Vector3<f64>,
    pub slow_axis: Vector3<f64>,
    pub origin: Vector3<f64>,
    pub pixel_size: Vector2<f64>,
    pub image_size: Vector2<usize>,
    pub trusted_range: Vector2<f64>,
}

impl Panel {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        sensor_type: impl Into<String>,
        fast_axis: Vector3<f64>,
        slow_axis: Vector3<f64>,
        origin: Vector3<f64>,
        pixel_size: Vector2<f64>,
        image_size: Vector2<usize>,
        trusted_range: Vector2<f64>,
    ) -> Self {
        Self {
            name: name.into(),
            sensor_type: sensor_type.into(),
            fast_axis: fast_axis.normalize(),
            slow_axis: slow_axis.normalize(),
            origin,
            pixel_size,
            image_size,
            trusted_range,
        }
    }

    pub fn normal(&self) -> Vector3<f64> {
        self.fast_axis.cross(&self.slow_axis)
    }

    pub fn pixel_to_millimeter(&self, px: Vector2<f64>) -> Vector2<f64> {
        px.component_mul(&self.pixel_size)
    }

    pub fn millimeter_to_pixel(&self, mm: Vector2<f64>) -> Vector2<f64> {
        mm.component_div(&self.pixel_size)
    }

    /// Laboratory coordinate (mm) of a fractional pixel position
    pub fn lab_coord(&self, px: Vector2<f64>) -> Vector3<f64> {
        let mm = self.pixel_to_millimeter(px);
        self.origin + self.fast_axis * mm.x + self.slow_axis * mm.y
    }

    /// Perpendicular distance from the sample to the panel plane
    pub fn distance(&self) -> f64 {
        self.origin.dot(&self.normal()).abs()
    }

    pub fn is_value_in_trusted_range(&self, value: f64) -> bool {
        self.trusted_range.x < value && value < self.trusted_range.y
    }
}

impl fmt::Display for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Panel:")?;
        writeln!(f, "  name: {}", self.name)?;
        writeln!(f, "  type: {}", self.sensor_type)?;
        writeln!(f, "  pixel_size:{}", fmt_vec2(&self.pixel_size))?;
        writeln!(f, "  image_size: {}", fmt_vec2(&self.image_size))?;
        writeln!(f, "  trusted_range: {}", fmt_vec2(&self.trusted_range))?;
        writeln!(f, "  fast_axis: {}", fmt_vec3(&self.fast_axis))?;
        writeln!(f, "  slow_axis: {}", fmt_vec3(&self.slow_axis))?;
        write!(f, "  origin: {}", fmt_vec3(&self.origin))
    }
}

/// Ordered collection of panels
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Detector {
    panels: Vec<Panel>,
}

impl Detector {
    pub fn new(panels: Vec<Panel>) -> Self {
        Self { panels }
    }

    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }
}

impl Index<usize> for Detector {
    type Output = Panel;

    fn index(&self, index: usize) -> &Panel {
        &self.panels[index]
    }
}

impl fmt::Display for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, panel) in self.panels.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", panel)?;
        }
        Ok(())
    }
}
