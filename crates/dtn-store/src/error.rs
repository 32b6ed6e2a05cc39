use dtn_core::MessageId;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The buffer cannot make room for the message.  Recovered by the engine
    /// as a `MessageDropped(CapacityExceeded)` event.
    #[error("no room for {msg} ({size} bytes)")]
    CapacityExceeded { msg: MessageId, size: u64 },

    #[error("{0} is already buffered")]
    Duplicate(MessageId),

    #[error("{0} is not in the message table")]
    UnknownMessage(MessageId),
}

pub type StoreResult<T> = Result<T, StoreError>;
