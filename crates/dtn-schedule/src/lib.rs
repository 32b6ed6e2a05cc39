//! `dtn-schedule` — the discrete-event core: a time-ordered event queue that
//! owns a run's clock.  The simulator pops one action at a time from it and
//! fans the resulting events out to its observers.
//!
//! # Crate layout
//!
//! | Module          | Contents                                                  |
//! |-----------------|-----------------------------------------------------------|
//! | [`queue`]       | `EventQueue<E>` (`BTreeMap<SimTime, VecDeque<…>>`), `Scheduled<E>` |
//! | [`error`]       | `ScheduleError`, `ScheduleResult<T>`                      |
//!
//! # Ordering model (summary)
//!
//! ```text
//! pop order = ascending time, then ascending insertion sequence
//! now       = time of the last popped event (never decreases)
//! schedule(t, e) with t < now  →  ScheduleError::InvalidTime
//! ```
//!
//! The FIFO tie-break is what makes replay deterministic: given a fixed seed
//! and a fixed insertion order, two runs pop events in exactly the same order.

pub mod error;
pub mod queue;


pub use error::{ScheduleError, ScheduleResult};
pub use queue::{EventQueue, EventSeq, Scheduled};
