use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ContactError {
    #[error("expected {expected} entries, got {got}")]
    NodeCountMismatch { expected: usize, got: usize },

    #[error("radio range {0} is not a finite non-negative number")]
    InvalidRange(f64),
}

pub type ContactResult<T> = Result<T, ContactError>;
