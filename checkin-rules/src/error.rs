use std::path::PathBuf;

use thiserror::Error;

/// Errors returned when loading rules or applying editor commands.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rules path does not exist: {0}")]
    MissingPath(String),
    #[error("failed to read rules from {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse rules from {path}: {message}")]
    Parse { path: String, message: String },
    #[error("rule text is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("invalid node path: {0}")]
    InvalidPath(String),
    #[error("no node at path {path}")]
    NodeNotFound { path: String },
    #[error("{operation} is not possible on the root node")]
    RootOperation { operation: &'static str },
    #[error("node at {path} is not an and/or node")]
    NotAConnective { path: String },
    #[error("node at {path} is not a comparison")]
    NotAComparison { path: String },
    #[error("node at {path} has {children} children, only single-child nodes can be cut")]
    NotCollapsible { path: String, children: usize },
    #[error("normal form would have {terms} terms, the limit is {max}")]
    DnfTooLarge { terms: usize, max: usize },
    #[error("invalid catalog: {0}")]
    Catalog(String),
}

impl RuleError {
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RuleError::Io {
            path: path.into().display().to_string(),
            source,
        }
    }

    pub fn parse_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        RuleError::Parse {
            path: path.into().display().to_string(),
            message: message.into(),
        }
    }
}
