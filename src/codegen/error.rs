use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("invalid regex {pattern:?}: {reason}")]
    InvalidRegex { pattern: String, reason: regex::Error },

    #[error("unknown forced type {0:?}")]
    UnknownForcedType(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid script pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("cannot read {path}: {reason}")]
    Io {
        path: PathBuf,
        reason: std::io::Error,
    },

    #[error("{script}:{line}: {message}")]
    Parse {
        script: String,
        line: usize,
        message: String,
    },

    #[error("{script}:{line}: table {table} does not exist")]
    UnknownTable {
        script: String,
        line: usize,
        table: String,
    },

    #[error("{script}:{line}: table {table} already exists")]
    DuplicateTable {
        script: String,
        line: usize,
        table: String,
    },

    #[error("{script}:{line}: column {column} does not exist in {table}")]
    UnknownColumn {
        script: String,
        line: usize,
        table: String,
        column: String,
    },

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type CodegenResult<T> = Result<T, CodegenError>;

impl CodegenError {
    pub(crate) fn io(path: impl Into<PathBuf>, reason: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            reason,
        }
    }
}
