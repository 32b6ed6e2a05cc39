//! `dtn-store` — messages and the per-node buffers that carry them.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                  |
//! |--------------|-----------------------------------------------------------|
//! | [`message`]  | `Message`, `Hop`                                          |
//! | [`table`]    | `MessageTable` (arena indexed by `MessageId`)             |
//! | [`buffer`]   | `MessageBuffer`, `BufferedCopy`, `Capacity`               |
//! | [`eviction`] | `EvictionPolicy` (drop-oldest, drop-largest, MOFO, SHLI…) |
//! | [`error`]    | `StoreError`, `StoreResult<T>`                            |
//!
//! # Ownership
//!
//! The `MessageTable` owns every `Message`.  Buffers hold `BufferedCopy`
//! records (a `MessageId` plus per-holder state); a message records its
//! holders as `NodeId`s.  Nothing holds a pointer into another table.

pub mod buffer;
pub mod error;
pub mod eviction;
pub mod message;
pub mod table;


pub use buffer::{BufferedCopy, Capacity, MessageBuffer};
pub use error::{StoreError, StoreResult};
pub use eviction::EvictionPolicy;
pub use message::{Hop, Message};
pub use table::MessageTable;
