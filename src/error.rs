use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything that can stop a run before a tree is produced.
#[derive(Error, Debug)]
pub enum KernelizeError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed tree in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path}:{line}:{column}: syntax error, expected one of: {expected}")]
    Syntax {
        path: PathBuf,
        line: usize,
        column: usize,
        expected: String,
    },

    #[error("cannot tell the input format of {path}; pass --format json or --format c")]
    UnsupportedInput { path: PathBuf },

    #[error("invalid configuration in {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, KernelizeError>;
