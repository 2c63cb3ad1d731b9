//! Error type shared by the library entry points.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CqaError {
    /// A document or input file could not be read.
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A document or report could not be written.
    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The JTBD mapping or shortdesc table is not valid YAML of the expected shape.
    #[error("failed to parse '{path}': {detail}")]
    MappingParse { path: PathBuf, detail: String },

    /// Structured mapping support is not compiled in or the mapping is missing.
    #[error("JTBD mapping unavailable: {reason}")]
    MappingUnavailable { reason: String },

    /// The prose linter could not be run to completion.
    #[error("linter failed: {detail}")]
    LinterFailed { detail: String },

    /// The prose linter produced output that is not the expected JSON.
    #[error("malformed linter output: {detail}")]
    LinterOutput { detail: String },

    #[error("report error: {detail}")]
    Report { detail: String },
}

pub type Result<T> = std::result::Result<T, CqaError>;
