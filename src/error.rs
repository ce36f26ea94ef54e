use std::io;
use std::result::Result as StdResult;
use thiserror::Error;
use tch::TchError;
use crate::ml::config::MLConfigError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("ML config error: {0}")]
    MLConfigError(#[from] MLConfigError),
    #[error("Unknown dataset: {0}")]
    UnknownDataset(String),
    #[error("Dataset error: {0}")]
    DatasetError(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("ML error: {0}")]
    MLError(String),
    #[error("Incompatible checkpoint {path}: {reason}")]
    IncompatibleCheckpoint { path: String, reason: String },
    #[error("No checkpoint found under {0}")]
    CheckpointNotFound(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Metrics error: {0}")]
    MetricsError(String),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl From<TchError> for Error {
    fn from(err: TchError) -> Self {
        Error::MLError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ParseError(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ConfigError(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::ConfigError(err.to_string())
    }
}

impl From<prometheus::Error> for Error {
    fn from(err: prometheus::Error) -> Self {
        Error::MetricsError(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::DatasetError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for Error {
    fn from(err: ndarray::ShapeError) -> Self {
        Error::InvalidInput(err.to_string())
    }
}

pub type Result<T> = StdResult<T, Error>;
