//! `dtn-mobility` — where every node is at every simulated instant.
//!
//! # Crate layout
//!
//! | Module              | Contents                                               |
//! |---------------------|--------------------------------------------------------|
//! | [`model`]           | `MobilityModel` trait, `StaticMobility`                |
//! | [`path`]            | `Leg`, `Path` (append-only, linearly interpolated)     |
//! | [`planner`]         | `PathPlanner` trait, `PathModel<P>` driver             |
//! | [`random_waypoint`] | `RandomWaypoint`, `RandomWaypointParams`               |
//! | [`levy`]            | `LevyWalk`, `LevyWalkParams`                           |
//! | [`map`]             | `MapGraph` (CSR + R-tree), `MapGraphBuilder`, Dijkstra |
//! | [`map_movement`]    | `MapBasedMovement`, `MapMovementParams`                |
//! | [`trace`]           | `TracePlayback`, CSV trace loader                      |
//! | [`world`]           | `World` (boxed model + area)                           |
//! | [`error`]           | `MobilityError`, `MobilityResult<T>`                   |
//!
//! # Purity contract
//!
//! After `advance_to(t)`, `position(node, s)` for any `s <= t` is a pure
//! function of the seed: repeated queries return the same coordinate, and
//! later calls to `advance_to` never change it.  Path-based models achieve
//! this by only ever appending legs, each node drawing from its own
//! [`NodeRng`](dtn_core::NodeRng).

pub mod error;
pub mod levy;
pub mod map;
pub mod map_movement;
pub mod model;
pub mod path;
pub mod planner;
pub mod random_waypoint;
pub mod trace;
pub mod world;


pub use error::{MobilityError, MobilityResult};
pub use levy::{LevyWalk, LevyWalkParams};
pub use map::{MapGraph, MapGraphBuilder, MapRoute, load_segments_csv};
pub use map_movement::{MapBasedMovement, MapMovementParams};
pub use model::{MobilityModel, StaticMobility};
pub use path::{Leg, Path};
pub use planner::{PathModel, PathPlanner};
pub use random_waypoint::{RandomWaypoint, RandomWaypointParams};
pub use trace::{TracePlayback, TraceSample};
pub use world::World;
