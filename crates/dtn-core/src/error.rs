//! Workspace-wide base error type.
//!
//! Sub-crates define their own error enums and either convert into `DtnError`
//! or wrap it as one variant, whichever keeps error sites clean.

use thiserror::Error;

use crate::{MessageId, NodeId};

/// The top-level error type for `dtn-core` and a common base for sub-crates.
#[derive(Debug, Error)]
pub enum DtnError {
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    #[error("message {0} not found")]
    MessageNotFound(MessageId),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shorthand result type for all `dtn-*` crates.
pub type DtnResult<T> = Result<T, DtnError>;
