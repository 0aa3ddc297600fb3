//! FITS diffraction images. Every HDU holding a 2D image becomes one detector panel;
//! geometry keywords are read from the panel's own HDU first, then from the primary HDU.

use super::{read_leading_bytes, FormatHandler, ImageFile, ImageModels};
use crate::error::{DiffractError, Result};
use crate::model::{Beam, Detector, Goniometer, Panel, PixelArray, RawData, Scan};
use chrono::{DateTime, NaiveDateTime};
use fitrs::{Fits, FitsData, FitsDataArray, Hdu, HeaderValue};
use nalgebra::{Vector2, Vector3};
use std::path::{Path, PathBuf};
use tracing::debug;

const FITS_MAGIC: &[u8] = b"SIMPLE  =";

pub struct FitsFormat;

impl FormatHandler for FitsFormat {
    fn name(&self) -> &'static str {
        "FITS"
    }

    fn understand(&self, path: &Path) -> Result<bool> {
        Ok(read_leading_bytes(path, FITS_MAGIC.len())?.starts_with(FITS_MAGIC))
    }

    fn open(&self, path: &Path) -> Result<Box<dyn ImageFile>> {
        Ok(Box::new(FitsImage::open(path)?))
    }
}

/// Keyword lookup falling back from a panel HDU to the primary HDU
struct Keywords<'a> {
    hdu: &'a Hdu,
    primary: &'a Hdu,
}

impl Keywords<'_> {
    fn value(&self, key: &str) -> Option<&HeaderValue> {
        self.hdu.value(key).or_else(|| self.primary.value(key))
    }

    /// First of `keys` that is present, as a number
    fn number(&self, keys: &[&str]) -> Result<Option<f64>> {
        for key in keys {
            if let Some(value) = self.value(key) {
                return header_number(value).map(Some).ok_or_else(|| {
                    DiffractError::InvalidHeader {
                        key: key.to_string(),
                        value: format!("{:?}", value),
                    }
                });
            }
        }
        Ok(None)
    }

    fn required_number(&self, keys: &[&str]) -> Result<f64> {
        self.number(keys)?.ok_or_else(|| DiffractError::MissingHeader {
            key: keys.join("/"),
        })
    }

    fn string(&self, key: &str) -> Option<String> {
        match self.value(key) {
            Some(HeaderValue::CharacterString(s)) => Some(s.trim().to_string()),
            _ => None,
        }
    }
}

fn header_number(value: &HeaderValue) -> Option<f64> {
    match value {
        HeaderValue::IntegerNumber(n) => Some(*n as f64),
        HeaderValue::RealFloatingNumber(f) => Some(*f),
        HeaderValue::CharacterString(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub struct FitsImage {
    path: PathBuf,
    /// HDU index and expected pixel count of each panel
    panel_hdus: Vec<(usize, usize)>,
    models: ImageModels,
}

impl FitsImage {
    pub fn open(path: &Path) -> Result<Self> {
        let fits = Fits::open(path)?;
        let hdus: Vec<Hdu> = (0..).map_while(|i| fits.get(i)).collect();
        let primary = hdus
            .first()
            .ok_or_else(|| DiffractError::InvalidImage(format!("no HDU in {}", path.display())))?;

        let mut panels = Vec::new();
        let mut panel_hdus = Vec::new();
        for (index, hdu) in hdus.iter().enumerate() {
            let keywords = Keywords { hdu, primary };
            let naxis = keywords.number(&["NAXIS"])?.unwrap_or(0.0);
            if naxis < 2.0 {
                continue;
            }
            let panel = read_panel(&keywords, panels.len())?;
            debug!(
                "HDU {} of {} is panel {}",
                index,
                path.display(),
                panel.name
            );
            panel_hdus.push((index, pixel_count(panel.image_size.x, panel.image_size.y)?));
            panels.push(panel);
        }

        let first_panel = panel_hdus.first().ok_or_else(|| {
            DiffractError::InvalidImage(format!("no 2D image HDU in {}", path.display()))
        })?;
        let keywords = Keywords {
            hdu: &hdus[first_panel.0],
            primary,
        };

        let wavelength = keywords.required_number(&["WAVELEN", "WAVELENG"])?;
        let number = keywords.number(&["IMGNUM"])?.unwrap_or(1.0) as i32;
        let osc_start = keywords.number(&["OSCSTART"])?.unwrap_or(0.0);
        let osc_range = keywords.number(&["OSCRANGE"])?.unwrap_or(0.0);
        let exposure = keywords.number(&["EXPTIME", "EXPOSURE"])?.unwrap_or(0.0);
        let epoch = keywords
            .string("DATE-OBS")
            .and_then(|date| parse_iso_date(&date))
            .unwrap_or(0.0);

        let scan = Scan::new(
            (number, number),
            (osc_start, osc_range),
            vec![exposure],
            vec![epoch],
        )?;

        Ok(Self {
            path: path.to_path_buf(),
            panel_hdus,
            models: ImageModels {
                beam: Beam::new(Vector3::new(0.0, 0.0, 1.0), wavelength),
                goniometer: Goniometer::single_axis(),
                detector: Detector::new(panels),
                scan,
            },
        })
    }
}

fn read_panel(keywords: &Keywords<'_>, panel_index: usize) -> Result<Panel> {
    let width = axis_length("NAXIS1", keywords.required_number(&["NAXIS1"])?)?;
    let height = axis_length("NAXIS2", keywords.required_number(&["NAXIS2"])?)?;
    let pixel_x = keywords.required_number(&["PIXSIZE1"])?;
    let pixel_y = keywords.required_number(&["PIXSIZE2"])?;
    let distance = keywords.required_number(&["DISTANCE"])?;
    // Beam centre in pixels
    let beam_x = keywords.number(&["BEAMX"])?.unwrap_or(width as f64 / 2.0);
    let beam_y = keywords.number(&["BEAMY"])?.unwrap_or(height as f64 / 2.0);
    let saturation = keywords.number(&["SATURATE"])?.unwrap_or(65535.0);

    let name = keywords
        .hdu
        .value("EXTNAME")
        .and_then(|value| match value {
            HeaderValue::CharacterString(s) => Some(s.trim().to_string()),
            _ => None,
        })
        .unwrap_or_else(|| format!("PANEL{}", panel_index));
    let sensor_type = keywords
        .string("DETTYPE")
        .unwrap_or_else(|| "SENSOR_UNKNOWN".to_string());

    Ok(Panel::new(
        name,
        sensor_type,
        Vector3::new(1.0, 0.0, 0.0),
        Vector3::new(0.0, -1.0, 0.0),
        Vector3::new(-beam_x * pixel_x, beam_y * pixel_y, -distance),
        Vector2::new(pixel_x, pixel_y),
        Vector2::new(width, height),
        Vector2::new(-1.0, saturation),
    ))
}

/// Image axis length from a keyword value; must be a whole, non-negative number
fn axis_length(key: &str, value: f64) -> Result<usize> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value < usize::MAX as f64 {
        Ok(value as usize)
    } else {
        Err(DiffractError::InvalidHeader {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

fn pixel_count(width: usize, height: usize) -> Result<usize> {
    width
        .checked_mul(height)
        .ok_or_else(|| DiffractError::InvalidHeader {
            key: "NAXIS1/NAXIS2".to_string(),
            value: format!("{} x {} pixels overflows", width, height),
        })
}

impl ImageFile for FitsImage {
    fn models(&self) -> &ImageModels {
        &self.models
    }

    fn raw_data(&self) -> Result<RawData> {
        let fits = Fits::open(&self.path)?;
        let mut panels = Vec::with_capacity(self.panel_hdus.len());
        for &(index, expected) in &self.panel_hdus {
            let hdu = fits.get(index).ok_or_else(|| {
                DiffractError::InvalidImage(format!(
                    "HDU {} missing from {}",
                    index,
                    self.path.display()
                ))
            })?;
            let fits_data = hdu.read_data();
            let pixels = pixel_array(&fits_data)?;
            if pixels.len() != expected {
                return Err(DiffractError::InvalidImage(format!(
                    "Data size mismatch in HDU {}: expected {} pixels, got {}",
                    index,
                    expected,
                    pixels.len()
                )));
            }
            panels.push(pixels);
        }
        Ok(RawData::new(panels))
    }
}

fn pixel_array(data: &FitsData) -> Result<PixelArray> {
    match data {
        FitsData::Characters(_) => Err(DiffractError::InvalidImage(
            "FITS HDU contains character data, not image data".to_string(),
        )),
        FitsData::IntegersI32(FitsDataArray { data, .. }) => Ok(PixelArray::Integer(
            data.iter().map(|x| i64::from(x.unwrap_or(0))).collect(),
        )),
        FitsData::IntegersU32(FitsDataArray { data, .. }) => Ok(PixelArray::Integer(
            data.iter().map(|x| i64::from(x.unwrap_or(0))).collect(),
        )),
        FitsData::FloatingPoint32(FitsDataArray { data, .. }) => Ok(PixelArray::Real(
            data.iter().map(|&x| f64::from(x)).collect(),
        )),
        FitsData::FloatingPoint64(FitsDataArray { data, .. }) => {
            Ok(PixelArray::Real(data.to_vec()))
        }
    }
}

/// Seconds since the Unix epoch for an ISO 8601 `DATE-OBS`; values without a zone are UTC
fn parse_iso_date(date: &str) -> Option<f64> {
    let (secs, nanos) = match DateTime::parse_from_rfc3339(date) {
        Ok(dt) => (dt.timestamp(), dt.timestamp_subsec_nanos()),
        Err(_) => {
            let dt = NaiveDateTime::parse_from_str(date, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()?
                .and_utc();
            (dt.timestamp(), dt.timestamp_subsec_nanos())
        }
    };
    Some(secs as f64 + f64::from(nanos) / 1e9)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TotalCounts;

    enum Card<'a> {
        Int(&'a str, i64),
        Real(&'a str, f64),
        Str(&'a str, &'a str),
        Bool(&'a str, bool),
    }

    fn card_text(card: &Card<'_>) -> String {
        let text = match card {
            Card::Int(key, value) => format!("{:<8}= {:>20}", key, value),
            Card::Real(key, value) => format!("{:<8}= {:>20}", key, format!("{:?}", value)),
            Card::Str(key, value) => format!("{:<8}= '{:<8}'", key, value),
            Card::Bool(key, value) => {
                format!("{:<8}= {:>20}", key, if *value { "T" } else { "F" })
            }
        };
        format!("{:<80}", text)
    }

    fn pad_block(bytes: &mut Vec<u8>, fill: u8) {
        let rem = bytes.len() % 2880;
        if rem != 0 {
            bytes.resize(bytes.len() + 2880 - rem, fill);
        }
    }

    fn header_unit(cards: &[Card<'_>]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for card in cards {
            bytes.extend_from_slice(card_text(card).as_bytes());
        }
        bytes.extend_from_slice(format!("{:<80}", "END").as_bytes());
        pad_block(&mut bytes, b' ');
        bytes
    }

    fn int_data(pixels: &[i32]) -> Vec<u8> {
        let mut bytes: Vec<u8> = pixels.iter().flat_map(|p| p.to_be_bytes()).collect();
        pad_block(&mut bytes, 0);
        bytes
    }

    fn float_data(pixels: &[f32]) -> Vec<u8> {
        let mut bytes: Vec<u8> = pixels.iter().flat_map(|p| p.to_be_bytes()).collect();
        pad_block(&mut bytes, 0);
        bytes
    }

    fn geometry<'a>() -> Vec<Card<'a>> {
        vec![
            Card::Real("WAVELEN", 1.2),
            Card::Real("DISTANCE", 250.0),
            Card::Real("PIXSIZE1", 0.172),
            Card::Real("PIXSIZE2", 0.172),
            Card::Real("BEAMX", 1.5),
            Card::Real("BEAMY", 1.0),
            Card::Real("OSCSTART", 12.0),
            Card::Real("OSCRANGE", 0.1),
            Card::Real("EXPTIME", 0.05),
            Card::Str("DATE-OBS", "2013-09-10T12:34:56.5"),
            Card::Int("IMGNUM", 17),
        ]
    }

    fn single_panel_file(path: &Path) {
        let mut cards = vec![
            Card::Bool("SIMPLE", true),
            Card::Int("BITPIX", 32),
            Card::Int("NAXIS", 2),
            Card::Int("NAXIS1", 3),
            Card::Int("NAXIS2", 2),
        ];
        cards.extend(geometry());
        let mut bytes = header_unit(&cards);
        bytes.extend(int_data(&[1, 2, 3, 4, 5, 6]));
        std::fs::write(path, bytes).unwrap();
    }

    fn two_panel_file(path: &Path) {
        let mut primary = vec![
            Card::Bool("SIMPLE", true),
            Card::Int("BITPIX", 8),
            Card::Int("NAXIS", 0),
            Card::Bool("EXTEND", true),
        ];
        primary.extend(geometry());
        let mut bytes = header_unit(&primary);

        bytes.extend(header_unit(&[
            Card::Str("XTENSION", "IMAGE"),
            Card::Int("BITPIX", 32),
            Card::Int("NAXIS", 2),
            Card::Int("NAXIS1", 2),
            Card::Int("NAXIS2", 2),
            Card::Int("PCOUNT", 0),
            Card::Int("GCOUNT", 1),
            Card::Str("EXTNAME", "MOD0"),
        ]));
        bytes.extend(int_data(&[10, 20, 30, 40]));

        bytes.extend(header_unit(&[
            Card::Str("XTENSION", "IMAGE"),
            Card::Int("BITPIX", -32),
            Card::Int("NAXIS", 2),
            Card::Int("NAXIS1", 2),
            Card::Int("NAXIS2", 1),
            Card::Int("PCOUNT", 0),
            Card::Int("GCOUNT", 1),
            Card::Real("DISTANCE", 300.0),
        ]));
        bytes.extend(float_data(&[0.5, 0.25]));
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_understand() {
        let dir = tempfile::tempdir().unwrap();
        let fits = dir.path().join("image.fits");
        single_panel_file(&fits);
        assert!(FitsFormat.understand(&fits).unwrap());

        let other = dir.path().join("other.fits");
        std::fs::write(&other, b"SIMPLE").unwrap();
        assert!(!FitsFormat.understand(&other).unwrap());
    }

    #[test]
    fn test_single_panel_models() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.fits");
        single_panel_file(&path);

        let image = FitsImage::open(&path).unwrap();
        assert_eq!(image.beam().wavelength, 1.2);
        assert_eq!(image.detector().len(), 1);

        let panel = &image.detector()[0];
        assert_eq!(panel.name, "PANEL0");
        assert_eq!(panel.image_size, Vector2::new(3, 2));
        assert!((panel.origin.x + 1.5 * 0.172).abs() < 1e-12);
        assert!((panel.origin.y - 0.172).abs() < 1e-12);
        assert_eq!(panel.origin.z, -250.0);

        let scan = image.scan();
        assert_eq!(scan.image_range(), (17, 17));
        assert_eq!(scan.oscillation(), (12.0, 0.1));
        assert_eq!(scan.exposure_times(), &[0.05]);
        assert_eq!(scan.epochs(), &[1378816496.5]);
    }

    #[test]
    fn test_single_panel_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.fits");
        single_panel_file(&path);

        let raw = FitsImage::open(&path).unwrap().raw_data().unwrap();
        assert_eq!(raw.total_counts(), TotalCounts::Integer(21));
    }

    #[test]
    fn test_extension_panels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("multi.fits");
        two_panel_file(&path);

        let image = FitsImage::open(&path).unwrap();
        let detector = image.detector();
        assert_eq!(detector.len(), 2);
        assert_eq!(detector[0].name, "MOD0");
        assert_eq!(detector[1].name, "PANEL1");
        assert_eq!(detector[0].origin.z, -250.0);
        assert_eq!(detector[1].origin.z, -300.0);

        let raw = image.raw_data().unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw.total_counts(), TotalCounts::Real(100.75));
    }

    #[test]
    fn test_missing_wavelength() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nowave.fits");
        let mut bytes = header_unit(&[
            Card::Bool("SIMPLE", true),
            Card::Int("BITPIX", 32),
            Card::Int("NAXIS", 2),
            Card::Int("NAXIS1", 1),
            Card::Int("NAXIS2", 1),
            Card::Real("DISTANCE", 100.0),
            Card::Real("PIXSIZE1", 0.1),
            Card::Real("PIXSIZE2", 0.1),
        ]);
        bytes.extend(int_data(&[0]));
        std::fs::write(&path, bytes).unwrap();

        match FitsImage::open(&path) {
            Err(DiffractError::MissingHeader { key }) => assert_eq!(key, "WAVELEN/WAVELENG"),
            other => panic!("unexpected result: {:?}", other.err()),
        }
    }

    #[test]
    fn test_axis_length_validation() {
        assert_eq!(axis_length("NAXIS1", 2048.0).unwrap(), 2048);
        assert_eq!(axis_length("NAXIS1", 0.0).unwrap(), 0);
        for bad in [-1.0, 2.5, f64::NAN, f64::INFINITY, 1e30] {
            match axis_length("NAXIS2", bad) {
                Err(DiffractError::InvalidHeader { key, .. }) => assert_eq!(key, "NAXIS2"),
                other => panic!("{} accepted: {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_pixel_count_overflow() {
        assert_eq!(pixel_count(3, 2).unwrap(), 6);
        assert!(matches!(
            pixel_count(usize::MAX / 2, 3),
            Err(DiffractError::InvalidHeader { .. })
        ));
    }

    #[test]
    fn test_parse_iso_date() {
        assert_eq!(parse_iso_date("2013-09-10T12:34:56"), Some(1378816496.0));
        assert_eq!(parse_iso_date("2013-09-10T12:34:56Z"), Some(1378816496.0));
        assert_eq!(
            parse_iso_date("2013-09-10T14:34:56+02:00"),
            Some(1378816496.0)
        );
        assert_eq!(parse_iso_date("2013-09-10T12:34:56.25"), Some(1378816496.25));
        assert_eq!(parse_iso_date("last tuesday"), None);
    }
}
