use thiserror::Error;

/// A rule-base syntax or consistency error, with the 1-based source line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("FCL line {line}: {msg}")]
pub struct FclError {
    pub line: usize,
    pub msg:  String,
}

impl FclError {
    pub(crate) fn new(line: usize, msg: impl Into<String>) -> Self {
        Self { line, msg: msg.into() }
    }
}

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("routing configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Fcl(#[from] FclError),

    #[error("unknown fuzzy variable {0:?}")]
    UnknownVariable(String),

    #[error("cannot read rule base {path}: {source}")]
    RuleBaseIo { path: String, source: std::io::Error },
}

pub type RoutingResult<T> = Result<T, RoutingError>;
