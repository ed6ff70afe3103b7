use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("task '{0}' not found")]
    UnknownTask(String),
    #[error("circular dependency: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
    #[error("task '{task}' failed: {status}")]
    TaskFailed { task: String, status: String },
    #[error("{path}: {reason}")]
    Io { path: PathBuf, reason: std::io::Error },
    #[error("invalid lint ruleset: {0}")]
    Ruleset(String),
    #[error("lint rule '{rule}' has an invalid pattern: {reason}")]
    RulePattern { rule: String, reason: regex::Error },
    #[error(transparent)]
    Pattern(#[from] glob::PatternError),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, reason: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            reason,
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
