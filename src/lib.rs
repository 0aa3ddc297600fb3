pub mod cli;
pub mod commands;
pub mod error;
pub mod format;
pub mod model;
pub mod serialize;

// Re-export commonly used items
pub use error::{DiffractError, Result};
pub use format::{FormatHandler, ImageFile, Registry};
pub use model::{Beam, Detector, Goniometer, Panel, RawData, Scan};
