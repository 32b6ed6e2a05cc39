//! `dtn-contact` — turns node positions into contact transitions.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                   |
//! |--------------|------------------------------------------------------------|
//! | [`detector`] | `ContactDetector`, `DetectionStrategy`, `ContactChange`    |
//! | [`log`]      | `Contact`, `ContactLog` (history + mean duration per pair) |
//! | [`error`]    | `ContactError`, `ContactResult<T>`                         |
//!
//! # Range rule
//!
//! Nodes `a` and `b` are in contact iff both are active and
//! `distance(a, b) <= min(range(a), range(b))`.  Every update reports all
//! `Down` transitions (ascending by pair) followed by all `Up` transitions
//! (ascending by pair), so replays are byte-identical.

pub mod detector;
pub mod error;
pub mod log;


pub use detector::{ContactChange, ContactDetector, DetectionStrategy};
pub use error::{ContactError, ContactResult};
pub use log::{Contact, ContactLog};
