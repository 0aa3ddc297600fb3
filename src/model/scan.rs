use crate::error::{DiffractError, Result};
use std::fmt;

/// A rotation image series: numbering, oscillation and per-image timing
#[derive(Debug, Clone, PartialEq)]
pub struct Scan {
    image_range: (i32, i32),
    oscillation: (f64, f64),
    exposure_times: Vec<f64>,
    epochs: Vec<f64>,
}

impl Scan {
    /// Build a scan, checking the image range and that there is one epoch per image.
    ///
    /// Exposure times are not length-checked: a list longer than the image count is kept as is.
    pub fn new(
        image_range: (i32, i32),
        oscillation: (f64, f64),
        exposure_times: Vec<f64>,
        epochs: Vec<f64>,
    ) -> Result<Self> {
        if image_range.0 > image_range.1 {
            return Err(DiffractError::InvalidScan(format!(
                "image range {{{},{}}} is reversed",
                image_range.0, image_range.1
            )));
        }
        let scan = Self {
            image_range,
            oscillation,
            exposure_times,
            epochs,
        };
        if scan.epochs.len() != scan.num_images() {
            return Err(DiffractError::InvalidScan(format!(
                "{} epochs for {} images",
                scan.epochs.len(),
                scan.num_images()
            )));
        }
        Ok(scan)
    }

    pub fn image_range(&self) -> (i32, i32) {
        self.image_range
    }

    pub fn oscillation(&self) -> (f64, f64) {
        self.oscillation
    }

    pub fn exposure_times(&self) -> &[f64] {
        &self.exposure_times
    }

    pub fn epochs(&self) -> &[f64] {
        &self.epochs
    }

    pub fn num_images(&self) -> usize {
        (i64::from(self.image_range.1) - i64::from(self.image_range.0) + 1) as usize
    }

    /// Angular range swept by the whole scan, in degrees
    pub fn oscillation_range(&self) -> (f64, f64) {
        let (start, step) = self.oscillation;
        (start, start + self.num_images() as f64 * step)
    }

    /// Start angle and width of one image, addressed by its image number
    pub fn image_oscillation(&self, index: i32) -> (f64, f64) {
        let (start, step) = self.oscillation;
        let offset = f64::from(index - self.image_range.0);
        (start + offset * step, step)
    }

    /// Rotation angle at a fractional image number
    pub fn angle_from_image_index(&self, index: f64) -> f64 {
        let (start, step) = self.oscillation;
        start + (index - f64::from(self.image_range.0)) * step
    }

    /// Fractional image number at a rotation angle, `None` for a still (zero step) scan
    pub fn image_index_from_angle(&self, angle: f64) -> Option<f64> {
        let (start, step) = self.oscillation;
        if step == 0.0 {
            return None;
        }
        Some(f64::from(self.image_range.0) + (angle - start) / step)
    }

    pub fn is_image_index_valid(&self, index: i32) -> bool {
        self.image_range.0 <= index && index <= self.image_range.1
    }
}

impl fmt::Display for Scan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "    number of images:   {}", self.num_images())?;
        writeln!(
            f,
            "    image range:   {{{},{}}}",
            self.image_range.0, self.image_range.1
        )?;
        writeln!(
            f,
            "    oscillation:   {{{},{}}}",
            self.oscillation.0, self.oscillation.1
        )?;
        write!(
            f,
            "    exposure time: {}",
            self.exposure_times.first().copied().unwrap_or(0.0)
        )?;
        if let Some(&epoch) = self.epochs.first() {
            let secs = epoch.floor();
            let nanos = ((epoch - secs) * 1e9) as u32;
            let date_str = chrono::DateTime::from_timestamp(secs as i64, nanos)
                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| epoch.to_string());
            write!(f, "\n    epoch:         {}", date_str)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn five_image_scan() -> Scan {
        Scan::new(
            (1, 5),
            (10.0, 0.5),
            vec![1.0; 5],
            vec![0.0, 1.0, 2.0, 3.0, 4.0],
        )
        .unwrap()
    }

    #[test]
    fn test_num_images() {
        assert_eq!(five_image_scan().num_images(), 5);
        let single = Scan::new((7, 7), (0.0, 1.0), vec![1.0], vec![0.0]).unwrap();
        assert_eq!(single.num_images(), 1);
    }

    #[test]
    fn test_reversed_range_rejected() {
        let err = Scan::new((5, 1), (0.0, 1.0), vec![], vec![]).unwrap_err();
        assert!(matches!(err, DiffractError::InvalidScan(_)));
    }

    #[test]
    fn test_epoch_count_must_match() {
        let err = Scan::new((1, 3), (0.0, 1.0), vec![1.0; 3], vec![0.0]).unwrap_err();
        assert!(matches!(err, DiffractError::InvalidScan(_)));
    }

    #[test]
    fn test_extra_exposure_times_accepted() {
        let scan = Scan::new((1, 2), (0.0, 1.0), vec![1.0; 4], vec![0.0, 1.0]).unwrap();
        assert_eq!(scan.exposure_times().len(), 4);
    }

    #[test]
    fn test_oscillation_helpers() {
        let scan = five_image_scan();
        assert_eq!(scan.oscillation_range(), (10.0, 12.5));
        assert_eq!(scan.image_oscillation(3), (11.0, 0.5));
        assert_eq!(scan.angle_from_image_index(2.5), 10.75);
        assert_eq!(scan.image_index_from_angle(10.75), Some(2.5));
    }

    #[test]
    fn test_still_scan_has_no_index_for_angle() {
        let still = Scan::new((1, 1), (0.0, 0.0), vec![0.1], vec![0.0]).unwrap();
        assert_eq!(still.image_index_from_angle(5.0), None);
    }

    #[test]
    fn test_image_index_validity() {
        let scan = five_image_scan();
        assert!(scan.is_image_index_valid(1));
        assert!(scan.is_image_index_valid(5));
        assert!(!scan.is_image_index_valid(0));
        assert!(!scan.is_image_index_valid(6));
    }

    #[test]
    fn test_display() {
        let scan = Scan::new((1, 1), (0.0, 1.0), vec![0.5], vec![1378816496.0]).unwrap();
        let text = scan.to_string();
        assert!(text.contains("image range:   {1,1}"));
        assert!(text.contains("oscillation:   {0,1}"));
        assert!(text.contains("exposure time: 0.5"));
        assert!(text.contains("epoch:         2013-09-10 12:34:56 UTC"));
    }
}
