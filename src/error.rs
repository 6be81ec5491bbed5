use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by the chart store, the symbol table and the validator bridge.
///
/// Feature requests recover every variant into an empty result; only startup
/// failures reach the editor.
#[derive(Error, Debug)]
pub enum Error {
    #[error("no Chart.yaml found above {0}")]
    ChartNotFound(PathBuf),

    #[error("variable ${0} is not defined")]
    UnboundVariable(String),

    #[error("failed to parse values file {path}: {source}")]
    ValueFileParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("yaml validator unavailable: {0}")]
    ValidatorUnavailable(String),

    #[error("template trimming changed the line count from {expected} to {actual}")]
    TransformationInvariant { expected: usize, actual: usize },

    #[error("validator protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
