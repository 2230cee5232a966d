use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown vector format: '{0}'")]
    UnknownFormat(String),
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("Layer '{layer}' not found in dataset '{path}', available layers: {}", .available.join(", "))]
    LayerNotFound {
        path: String,
        layer: String,
        available: Vec<String>,
    },
    #[error("Dataset '{path}' contains multiple layers, specify one of: {}", .layers.join(", "))]
    LayerAmbiguous { path: String, layers: Vec<String> },
    #[error("Malformed query: {0}")]
    MalformedQuery(String),
    #[error("Target already exists: {}", .0.display())]
    TargetExists(PathBuf),
    #[error("Driver does not support this operation: {driver} ({reason})")]
    UnsupportedDriver { driver: String, reason: String },
    #[error("Field '{field}' can not be written using the {driver} driver: {reason}")]
    SchemaIncompatible {
        driver: String,
        field: String,
        reason: String,
    },
    #[error("Invalid virtual path stage order: {0}")]
    InvalidStageOrder(String),
    #[error("Feature {index} does not match the collection schema: {reason}")]
    SchemaMismatch { index: usize, reason: String },
    #[error("Unsupported geometry: {0}")]
    UnsupportedGeometry(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Runtime error: {0}")]
    Runtime(String),
    #[error(transparent)]
    Infra(#[from] inf::Error),
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("GeoJSON error: {0}")]
    GeoJsonError(#[from] geojson::Error),
    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    GdalError(#[from] gdal::errors::GdalError),
    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl From<std::num::ParseIntError> for Error {
    fn from(err: std::num::ParseIntError) -> Self {
        Error::InvalidArgument(err.to_string())
    }
}

impl From<std::num::ParseFloatError> for Error {
    fn from(err: std::num::ParseFloatError) -> Self {
        Error::InvalidArgument(err.to_string())
    }
}
