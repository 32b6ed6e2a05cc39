use dtn_core::{NodeId, VertexId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MobilityError {
    #[error("invalid simulation area {width} x {height}")]
    InvalidArea { width: f64, height: f64 },

    #[error("invalid mobility parameter: {0}")]
    InvalidParameter(String),

    #[error("node {0} has no mobility data")]
    UnknownNode(NodeId),

    #[error("no route from {from} to {to}")]
    NoRoute { from: VertexId, to: VertexId },

    #[error("map has no vertices")]
    EmptyMap,

    #[error("trace line {line}: {msg}")]
    Trace { line: u64, msg: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type MobilityResult<T> = Result<T, MobilityError>;
