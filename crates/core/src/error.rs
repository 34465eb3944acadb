//! Error types for regionbuf

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for regionbuf operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Dataset not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Shapefile error: {0}")]
    Shapefile(String),

    #[error("dBase error: {0}")]
    Dbase(String),

    #[error("Project document error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Unsupported geometry: {0}")]
    UnsupportedGeometry(String),

    /// A geoprocessing tool failed; the engine keeps the detailed messages.
    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Output already exists and overwrite is disabled: {}", .0.display())]
    OutputExists(PathBuf),

    #[error("Output {} cannot be written as a shapefile: {reason}", .path.display())]
    IncompatibleOutput { path: PathBuf, reason: String },

    #[error("Project error: {0}")]
    Project(String),
}

impl From<shapefile::Error> for Error {
    fn from(e: shapefile::Error) -> Self {
        Error::Shapefile(e.to_string())
    }
}

impl From<shapefile::dbase::Error> for Error {
    fn from(e: shapefile::dbase::Error) -> Self {
        Error::Dbase(e.to_string())
    }
}

/// Result type alias for regionbuf operations
pub type Result<T> = std::result::Result<T, Error>;
