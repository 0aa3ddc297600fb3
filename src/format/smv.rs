//! ADSC-style SMV images: an ASCII header of `KEY=VALUE;` records between braces,
//! padded to `HEADER_BYTES`, followed by unsigned 16-bit pixels.

use super::{read_leading_bytes, FormatHandler, ImageFile, ImageModels};
use crate::error::{DiffractError, Result};
use crate::model::{Beam, Detector, Goniometer, Panel, PixelArray, RawData, Scan};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use chrono::NaiveDateTime;
use nalgebra::{Vector2, Vector3};
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::trace;

const SNIFF_BYTES: usize = 512;

fn record_regex() -> &'static Regex {
    static RECORD: OnceLock<Regex> = OnceLock::new();
    RECORD.get_or_init(|| {
        Regex::new(r"([A-Za-z0-9_]+)\s*=\s*([^;]*);").expect("valid SMV record pattern")
    })
}

fn image_number_regex() -> &'static Regex {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    NUMBER.get_or_init(|| Regex::new(r"(\d+)$").expect("valid image number pattern"))
}

pub struct SmvFormat;

impl FormatHandler for SmvFormat {
    fn name(&self) -> &'static str {
        "SMV"
    }

    fn understand(&self, path: &Path) -> Result<bool> {
        let head = read_leading_bytes(path, SNIFF_BYTES)?;
        let text = String::from_utf8_lossy(&head);
        Ok(text
            .strip_prefix('{')
            .map(|rest| rest.trim_start().starts_with("HEADER_BYTES"))
            .unwrap_or(false))
    }

    fn open(&self, path: &Path) -> Result<Box<dyn ImageFile>> {
        Ok(Box::new(SmvImage::open(path)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Endianness {
    Little,
    Big,
}

pub struct SmvImage {
    path: PathBuf,
    header_bytes: usize,
    byte_order: Endianness,
    /// Offset one past the last pixel byte
    pixel_end: usize,
    models: ImageModels,
}

impl SmvImage {
    pub fn open(path: &Path) -> Result<Self> {
        let head = read_leading_bytes(path, SNIFF_BYTES)?;
        let header_bytes: usize = required(&parse_header(&head), "HEADER_BYTES")?;
        let file_len = std::fs::metadata(path)?.len();
        if header_bytes as u64 > file_len {
            return Err(DiffractError::InvalidHeader {
                key: "HEADER_BYTES".to_string(),
                value: format!("{} exceeds file length {}", header_bytes, file_len),
            });
        }
        let header = parse_header(&read_leading_bytes(path, header_bytes)?);
        trace!("SMV header of {}: {:?}", path.display(), header);

        let byte_order = match header.get("BYTE_ORDER").map(String::as_str) {
            None | Some("little_endian") => Endianness::Little,
            Some("big_endian") => Endianness::Big,
            Some(other) => {
                return Err(DiffractError::InvalidHeader {
                    key: "BYTE_ORDER".to_string(),
                    value: other.to_string(),
                })
            }
        };

        let width: usize = required(&header, "SIZE1")?;
        let height: usize = required(&header, "SIZE2")?;
        let pixel_end = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(2))
            .and_then(|n| n.checked_add(header_bytes))
            .ok_or_else(|| DiffractError::InvalidHeader {
                key: "SIZE1/SIZE2".to_string(),
                value: format!("{} x {} pixels overflows", width, height),
            })?;
        let pixel_size: f64 = required(&header, "PIXEL_SIZE")?;
        let distance: f64 = required(&header, "DISTANCE")?;
        let wavelength: f64 = required(&header, "WAVELENGTH")?;
        // Beam centre in mm, default to the middle of the image
        let beam_x =
            optional(&header, "BEAM_CENTER_X")?.unwrap_or(width as f64 * pixel_size / 2.0);
        let beam_y =
            optional(&header, "BEAM_CENTER_Y")?.unwrap_or(height as f64 * pixel_size / 2.0);

        let panel = Panel::new(
            "Panel",
            "SENSOR_CCD",
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, -1.0, 0.0),
            Vector3::new(-beam_x, beam_y, -distance),
            Vector2::new(pixel_size, pixel_size),
            Vector2::new(width, height),
            Vector2::new(-1.0, 65535.0),
        );

        let number = image_number(path);
        let osc_start = optional(&header, "OSC_START")?.unwrap_or(0.0);
        let osc_range = optional(&header, "OSC_RANGE")?.unwrap_or(0.0);
        let exposure = optional(&header, "TIME")?.unwrap_or(0.0);
        let epoch = header
            .get("DATE")
            .and_then(|date| parse_ctime(date))
            .unwrap_or(0.0);
        let scan = Scan::new(
            (number, number),
            (osc_start, osc_range),
            vec![exposure],
            vec![epoch],
        )?;

        Ok(Self {
            path: path.to_path_buf(),
            header_bytes,
            byte_order,
            pixel_end,
            models: ImageModels {
                beam: Beam::new(Vector3::new(0.0, 0.0, 1.0), wavelength),
                goniometer: Goniometer::single_axis(),
                detector: Detector::new(vec![panel]),
                scan,
            },
        })
    }
}

impl ImageFile for SmvImage {
    fn models(&self) -> &ImageModels {
        &self.models
    }

    fn raw_data(&self) -> Result<RawData> {
        let num_pixels = (self.pixel_end - self.header_bytes) / 2;
        let bytes = std::fs::read(&self.path)?;
        let pixel_bytes = bytes
            .get(self.header_bytes..self.pixel_end)
            .ok_or_else(|| {
                DiffractError::InvalidImage(format!(
                    "expected {} pixels after a {} byte header in {}",
                    num_pixels,
                    self.header_bytes,
                    self.path.display()
                ))
            })?;

        let mut pixels = vec![0u16; num_pixels];
        match self.byte_order {
            Endianness::Little => LittleEndian::read_u16_into(pixel_bytes, &mut pixels),
            Endianness::Big => BigEndian::read_u16_into(pixel_bytes, &mut pixels),
        }

        Ok(RawData::new(vec![PixelArray::Integer(
            pixels.into_iter().map(i64::from).collect(),
        )]))
    }
}

/// Collect `KEY=VALUE;` records from the brace-delimited header text
fn parse_header(data: &[u8]) -> HashMap<String, String> {
    let text = String::from_utf8_lossy(data);
    let body = match text.find('}') {
        Some(end) => &text[..end],
        None => &text[..],
    };

    record_regex()
        .captures_iter(body)
        .map(|caps| (caps[1].to_string(), caps[2].trim().to_string()))
        .collect()
}

fn optional<T: FromStr>(header: &HashMap<String, String>, key: &str) -> Result<Option<T>> {
    header
        .get(key)
        .map(|value| {
            value.parse::<T>().map_err(|_| DiffractError::InvalidHeader {
                key: key.to_string(),
                value: value.clone(),
            })
        })
        .transpose()
}

fn required<T: FromStr>(header: &HashMap<String, String>, key: &str) -> Result<T> {
    optional(header, key)?.ok_or_else(|| DiffractError::MissingHeader {
        key: key.to_string(),
    })
}

/// Image number from the trailing digits of the file stem, 1 if there are none
fn image_number(path: &Path) -> i32 {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| image_number_regex().captures(stem))
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(1)
}

/// Seconds since the Unix epoch for a ctime-style date such as `Tue Sep 10 12:34:56 2013`
fn parse_ctime(date: &str) -> Option<f64> {
    let normalized = date.split_whitespace().collect::<Vec<_>>().join(" ");
    NaiveDateTime::parse_from_str(&normalized, "%a %b %e %H:%M:%S %Y")
        .ok()
        .map(|dt| dt.and_utc().timestamp() as f64)
}
