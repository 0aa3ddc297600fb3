use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading image files or rebuilding instrument models
#[derive(Error, Debug)]
pub enum DiffractError {
    #[error("No format handler understands {}", path.display())]
    FormatNotFound { path: PathBuf },

    #[error("{0}")]
    Reconciliation(String),

    #[error("Scan mapping has no '{0}' entry")]
    MissingField(&'static str),

    #[error("Invalid scan: {0}")]
    InvalidScan(String),

    #[error("Missing header keyword: {key}")]
    MissingHeader { key: String },

    #[error("Invalid value for header keyword {key}: {value}")]
    InvalidHeader { key: String, value: String },

    #[error("Invalid image data: {0}")]
    InvalidImage(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DiffractError>;
