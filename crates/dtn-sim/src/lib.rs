//! `dtn-sim` — the event-driven run loop of the DTN simulator.
//!
//! # Event loop
//!
//! ```text
//! while the next action is before end_time:
//!   WorldUpdate   — sweep expired copies, charge scan energy, advance
//!                   mobility, detect contact changes (downs, then ups).
//!                   Each new contact offers both buffers to the routing
//!                   policy, deliverable messages first.
//!   Create        — a message appears at its source and is offered on the
//!                   source's open contacts.
//!   Generate      — as Create, drawn from the random generator.
//!   Expire        — every remaining copy is dropped.
//!   TransferDone  — the receiver gets its copy (or the delivery is
//!                   recorded); the link starts its next queued transfer.
//! finish: close open contacts, notify observers.
//! ```
//!
//! Every state change is reported to a [`SimObserver`] as a
//! [`TimedEvent`](dtn_core::TimedEvent), in the order it happened.
//!
//! # Modules
//!
//! | Module        | Contents                                                 |
//! |---------------|----------------------------------------------------------|
//! | [`sim`]       | `Sim`: run, step, run_controlled, finish                 |
//! | [`builder`]   | `SimBuilder`                                             |
//! | [`config`]    | TOML `ScenarioConfig`                                    |
//! | [`node`]      | `NodeSpec`, `EnergySpec`                                 |
//! | [`generator`] | `MessageSpec`, `GeneratorConfig`                         |
//! | [`observer`]  | `SimObserver`, `ObserverSet`, `EventRecorder`            |
//! | [`stats`]     | `RunStats`                                               |
//! | [`control`]   | `ControlCommand`, `StopHandle`, `RunStatus`              |
//! | [`bridge`]    | `ConvergenceLayer`, `WireBundle`, `LoopbackAdapter`      |
//! | [`sweep`]     | `run_sweep`, `seed_sweep`                                |
//!
//! # Cargo features
//!
//! | Feature    | Effect                                                 |
//! |------------|--------------------------------------------------------|
//! | `parallel` | Runs sweep members on Rayon's thread pool.             |
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use dtn_sim::{NoopObserver, ScenarioConfig};
//!
//! let (cfg, dir) = ScenarioConfig::load("scenario.toml".as_ref())?;
//! let mut sim = cfg.build(Some(&dir))?;
//! sim.run(&mut NoopObserver)?;
//! ```

pub mod bridge;
pub mod builder;
pub mod config;
pub mod control;
pub mod error;
pub mod generator;
pub mod node;
pub mod observer;
pub mod sim;
pub mod stats;
pub mod sweep;

#[cfg(test)]
mod tests;

pub use bridge::{BridgeError, BridgeResult, Completion, ConvergenceLayer, LoopbackAdapter, WireBundle};
pub use builder::SimBuilder;
pub use config::{LoopbackConfig, MobilityConfig, NodeGroupConfig, ScenarioConfig};
pub use control::{ControlCommand, ParseCommandError, RunStatus, StopHandle};
pub use error::{SimError, SimResult};
pub use generator::{GeneratorConfig, MessageConfig, MessageGenerator, MessageSpec};
pub use node::{EnergySpec, NodeSpec};
pub use observer::{EventRecorder, NoopObserver, ObserverSet, SimObserver};
pub use sim::Sim;
pub use stats::RunStats;
pub use sweep::{run_one, run_sweep, seed_sweep, SweepResult};
