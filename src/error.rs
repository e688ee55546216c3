//! Error type shared by every stage of the conversion pipeline.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("line {line_number}: odd number of tokens in '{content}'")]
    OddTokenCount { line_number: usize, content: String },

    #[error("line {line_number}: value '{value}' for key {key} is not a valid number")]
    InvalidValue {
        line_number: usize,
        key: String,
        value: String,
    },

    #[error("gps altitude series has {gps} values but pressure altitude series has {pressure}")]
    MismatchedSeries { gps: usize, pressure: usize },

    #[error(
        "device {device_id}: {available} points carry both gps altitude and pressure, at least {required} are needed"
    )]
    InsufficientData {
        device_id: String,
        available: usize,
        required: usize,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl ConvertError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConvertError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;
