//! `dtn-core` — foundational types for the DTN simulator workspace.
//!
//! This crate is a dependency of every other `dtn-*` crate.  It has no
//! `dtn-*` dependencies and few external ones (`rand`, `rand_distr`,
//! `thiserror`, plus optional `serde` and `rand_chacha`).
//!
//! # What lives here
//!
//! | Module          | Contents                                              |
//! |-----------------|-------------------------------------------------------|
//! | [`ids`]         | `NodeId`, `MessageId`, `VertexId`, `EdgeId`           |
//! | [`geo`]         | `Coord`, `Area`, Euclidean distance                   |
//! | [`time`]        | `SimTime`, `SimDuration`, `SimConfig`                 |
//! | [`rng`]         | `SimRng` (global), `NodeRng` (per node), `Draws`      |
//! | [`event`]       | `SimEvent`, `TimedEvent`, `EventKind`, `DropReason`   |
//! | [`error`]       | `DtnError`, `DtnResult`                               |
//!
//! # Feature flags
//!
//! | Flag     | Effect                                                    |
//! |----------|-----------------------------------------------------------|
//! | `serde`  | Adds `Serialize`/`Deserialize` to all public types.       |
//! | `chacha` | Uses `ChaCha8Rng` instead of `SmallRng` as the generator. |

pub mod error;
pub mod event;
pub mod geo;
pub mod ids;
pub mod rng;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{DtnError, DtnResult};
pub use event::{DropReason, EventKind, SimEvent, TimedEvent};
pub use geo::{Area, Coord};
pub use ids::{EdgeId, MessageId, NodeId, VertexId};
pub use rng::{Draws, Generator, NodeRng, SimRng};
pub use time::{SimConfig, SimDuration, SimTime};
