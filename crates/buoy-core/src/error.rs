use std::path::PathBuf;

use buoy_reader::ReaderError;
use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read pipeline config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid pipeline config {origin}: {source}")]
    Yaml {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid reader pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("unknown hooks '{0}'")]
    UnknownHooks(String),

    #[error("invalid pipeline config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Reader(#[from] ReaderError),

    #[error("no reader pattern matches '{file}'")]
    NoReader { file: String },

    #[error("dataset has no timestamps to name outputs after")]
    EmptyDataset,

    #[error("variable '{name}' has dimensions ({dims}) that cannot be exported as columns")]
    UnsupportedDims { name: String, dims: String },

    #[error("failed to build output table: {0}")]
    Polars(#[from] PolarsError),

    #[error("failed to serialize dataset metadata: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to render plot {}: {message}", .path.display())]
    Plot { path: PathBuf, message: String },

    #[error("{context} {}: {source}", .path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub(crate) fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            context,
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
