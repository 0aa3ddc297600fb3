pub mod beam;
pub mod detector;
pub mod goniometer;
pub mod raw_data;
pub mod scan;

pub use beam::Beam;
pub use detector::{Detector, Panel};
pub use goniometer::Goniometer;
pub use raw_data::{PixelArray, RawData, TotalCounts};
pub use scan::Scan;

use nalgebra::{Matrix3, Vector2, Vector3};

/// Render a vector the way the instrument model text blocks show them: `{x,y,z}`
pub(crate) fn fmt_vec3(v: &Vector3<f64>) -> String {
    format!("{{{},{},{}}}", v.x, v.y, v.z)
}

pub(crate) fn fmt_vec2<T: std::fmt::Display + nalgebra::Scalar>(v: &Vector2<T>) -> String {
    format!("{{{},{}}}", v.x, v.y)
}

/// Row-major rendering of a 3x3 matrix
pub(crate) fn fmt_mat3(m: &Matrix3<f64>) -> String {
    let values: Vec<String> = (0..3)
        .flat_map(|r| (0..3).map(move |c| (r, c)))
        .map(|(r, c)| m[(r, c)].to_string())
        .collect();
    format!("{{{}}}", values.join(","))
}
