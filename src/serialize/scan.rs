//! Conversion between [`Scan`] models and their plain mapping form.
//!
//! The mapping is the `scan` fragment of a serialized experiment:
//!
//! ```json
//! {
//!   "image_range": [1, 90],
//!   "oscillation": [0.0, 1.0],
//!   "exposure_time": [0.5],
//!   "epochs": [1378816496.0, 1378816497.0]
//! }
//! ```
//!
//! Reading a mapping repairs short `epochs` and `exposure_time` lists before the
//! model is built.

use crate::error::{DiffractError, Result};
use crate::model::Scan;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Exposure time entry: either one value for the whole scan or one per image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExposureTime {
    Single(f64),
    List(Vec<f64>),
}

impl ExposureTime {
    pub fn into_vec(self) -> Vec<f64> {
        match self {
            ExposureTime::Single(value) => vec![value],
            ExposureTime::List(values) => values,
        }
    }
}

impl From<Vec<f64>> for ExposureTime {
    fn from(values: Vec<f64>) -> Self {
        ExposureTime::List(values)
    }
}

impl From<f64> for ExposureTime {
    fn from(value: f64) -> Self {
        ExposureTime::Single(value)
    }
}

/// Serialized scan mapping. Fields serialize in declaration order.
///
/// Every field is optional so that a partial mapping can be completed from a template.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanDict {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_range: Option<(i32, i32)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oscillation: Option<(f64, f64)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposure_time: Option<ExposureTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epochs: Option<Vec<f64>>,
}

impl ScanDict {
    /// Field-wise selection: each recognized key comes from `self` when present, else from `template`
    pub fn merged_over(&self, template: &ScanDict) -> ScanDict {
        ScanDict {
            image_range: self.image_range.or(template.image_range),
            oscillation: self.oscillation.or(template.oscillation),
            exposure_time: self
                .exposure_time
                .clone()
                .or_else(|| template.exposure_time.clone()),
            epochs: self.epochs.clone().or_else(|| template.epochs.clone()),
        }
    }
}

/// Project a scan into its mapping form. No scan gives no mapping.
pub fn to_dict(scan: Option<&Scan>) -> Option<ScanDict> {
    let scan = scan?;
    Some(ScanDict {
        image_range: Some(scan.image_range()),
        oscillation: Some(scan.oscillation()),
        exposure_time: Some(ExposureTime::List(scan.exposure_times().to_vec())),
        epochs: Some(scan.epochs().to_vec()),
    })
}

/// Rebuild a scan from a mapping, filling missing keys from an optional template.
///
/// With no mapping the template alone is used; with neither the result is `None`.
pub fn from_dict(d: Option<&ScanDict>, t: Option<&ScanDict>) -> Result<Option<Scan>> {
    let d = match (d, t) {
        (None, None) => return Ok(None),
        (None, Some(t)) => return from_dict(Some(t), None),
        (Some(d), None) => d.clone(),
        (Some(d), Some(t)) => d.merged_over(t),
    };

    let image_range = d
        .image_range
        .ok_or(DiffractError::MissingField("image_range"))?;
    let oscillation = d
        .oscillation
        .ok_or(DiffractError::MissingField("oscillation"))?;
    let mut exposure_times = d
        .exposure_time
        .ok_or(DiffractError::MissingField("exposure_time"))?
        .into_vec();
    let mut epochs = d.epochs.ok_or(DiffractError::MissingField("epochs"))?;

    let num_images = i64::from(image_range.1) - i64::from(image_range.0) + 1;
    reconcile_epochs(&mut epochs, num_images)?;
    pad_exposure_times(&mut exposure_times, num_images);

    Scan::new(image_range, oscillation, exposure_times, epochs).map(Some)
}

/// Two epochs on a scan of more than two images describe a linear progression and are
/// extended to one per image. Any other count must match the image count exactly.
fn reconcile_epochs(epochs: &mut Vec<f64>, num_images: i64) -> Result<()> {
    let num_epochs = epochs.len() as i64;
    if num_images > 2 && num_epochs == 2 {
        let diff = epochs[1] - epochs[0];
        let offset = epochs[1];
        epochs.extend((0..num_images - 2).map(|i| offset + (i + 1) as f64 * diff));
        debug!(
            "Extended 2 epochs to {} with step {}",
            num_images, diff
        );
    } else if num_epochs != num_images {
        return Err(DiffractError::Reconciliation(
            "Num epochs does not match num images".to_string(),
        ));
    }
    Ok(())
}

/// Short lists are padded with their last value, an empty list with zeros.
/// Longer lists are left untouched.
fn pad_exposure_times(exposure_times: &mut Vec<f64>, num_images: i64) {
    let num_exposures = exposure_times.len() as i64;
    if num_exposures >= num_images {
        return;
    }
    let fill = exposure_times.last().copied().unwrap_or(0.0);
    debug!(
        "Padding {} exposure times to {} with {}",
        num_exposures, num_images, fill
    );
    exposure_times.resize(num_images as usize, fill);
}

/// Serialize a scan to JSON; no scan serializes as `null`
pub fn to_json_string(scan: Option<&Scan>) -> Result<String> {
    Ok(serde_json::to_string_pretty(&to_dict(scan))?)
}

/// Parse a JSON scan mapping (or `null`) and rebuild the scan
pub fn from_json_str(json: &str) -> Result<Option<Scan>> {
    let dict: Option<ScanDict> = serde_json::from_str(json)?;
    from_dict(dict.as_ref(), None)
}
