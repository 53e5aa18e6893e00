// src/error.rs

use std::path::PathBuf;

use thiserror::Error;

/// Errors that stop a run (or the single-file path) outright.
///
/// Row- and field-level problems never surface here; they are counted in the
/// [`ValidationReport`](crate::report::ValidationReport) instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no disclosure files found in {dir} matching `{pattern}`")]
    Catalog { dir: PathBuf, pattern: String },

    #[error("{path} has no fiscal-year token in its file name")]
    MissingFiscalYear { path: PathBuf },

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode {path}: {message}")]
    Artifact { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("worker task failed: {0}")]
    Task(String),

    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

/// A whole file could not be turned into text.
#[derive(Debug, Clone, Error)]
pub enum EncodingError {
    #[error("{path}: none of [{}] decode the file", tried.join(", "))]
    Undecodable { path: PathBuf, tried: Vec<String> },

    #[error("{path}: unreadable: {message}")]
    Unreadable { path: PathBuf, message: String },
}

/// A data row whose field count does not match the header.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: expected {expected} fields, found {found}")]
pub struct MalformedRowError {
    pub line: u64,
    pub expected: usize,
    pub found: usize,
}
