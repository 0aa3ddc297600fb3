pub mod fits;
pub mod smv;

use crate::error::{DiffractError, Result};
use crate::model::{Beam, Detector, Goniometer, RawData, Scan};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

pub use fits::FitsFormat;
pub use smv::SmvFormat;

/// Instrument models read from one image file
#[derive(Debug, Clone, PartialEq)]
pub struct ImageModels {
    pub beam: Beam,
    pub goniometer: Goniometer,
    pub detector: Detector,
    pub scan: Scan,
}

/// An opened image file
pub trait ImageFile {
    fn models(&self) -> &ImageModels;

    /// Read the pixel data, one array per detector panel
    fn raw_data(&self) -> Result<RawData>;

    fn beam(&self) -> &Beam {
        &self.models().beam
    }

    fn goniometer(&self) -> &Goniometer {
        &self.models().goniometer
    }

    fn detector(&self) -> &Detector {
        &self.models().detector
    }

    fn scan(&self) -> &Scan {
        &self.models().scan
    }
}

/// A file format that can recognise and open image files
pub trait FormatHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Sniff the start of the file. Errors only when the file cannot be read.
    fn understand(&self, path: &Path) -> Result<bool>;

    fn open(&self, path: &Path) -> Result<Box<dyn ImageFile>>;
}

/// Ordered set of format handlers; the first one that understands a file wins
pub struct Registry {
    handlers: Vec<Box<dyn FormatHandler>>,
}

impl Registry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn register(&mut self, handler: Box<dyn FormatHandler>) {
        self.handlers.push(handler);
    }

    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    pub fn find(&self, path: &Path) -> Result<&dyn FormatHandler> {
        for handler in &self.handlers {
            if handler.understand(path)? {
                debug!("{} understood by {}", path.display(), handler.name());
                return Ok(handler.as_ref());
            }
        }
        Err(DiffractError::FormatNotFound {
            path: path.to_path_buf(),
        })
    }

    /// Find the handler for a file and open it
    pub fn open(&self, path: &Path) -> Result<Box<dyn ImageFile>> {
        self.find(path)?.open(path)
    }
}

impl Default for Registry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SmvFormat));
        registry.register(Box::new(FitsFormat));
        registry
    }
}

/// Read up to `len` bytes from the start of a file; shorter files give fewer bytes
pub(crate) fn read_leading_bytes(path: &Path, len: usize) -> Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut buffer = Vec::new();
    file.take(len as u64).read_to_end(&mut buffer)?;
    Ok(buffer)
}
