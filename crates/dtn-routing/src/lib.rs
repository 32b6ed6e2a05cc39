//! `dtn-routing` — routing policies and the fuzzy inference engine.
//!
//! # Crate layout
//!
//! | Module             | Contents                                                |
//! |--------------------|---------------------------------------------------------|
//! | [`policy`]         | `RoutingPolicy` trait                                   |
//! | [`decision`]       | `RoutingDecision`, `CopySplit`                          |
//! | [`context`]        | `DecisionContext` (per-decision snapshot)               |
//! | [`epidemic`]       | `Epidemic`, `DirectDelivery`                            |
//! | [`spray_and_wait`] | `SprayAndWait`, `SprayAndWaitParams`                    |
//! | [`spray_and_focus`]| `SprayAndFocus`, `SprayAndFocusParams`                  |
//! | [`predictability`] | `DeliveryPredictability`, `ProphetParams`               |
//! | [`prophet`]        | `Prophet`                                               |
//! | [`bubble_rap`]     | `BubbleRap`, `BubbleRapParams` (communities, centrality) |
//! | [`fuzzy`]          | FCL parser, `FuzzyEngine`, `FuzzyPolicy`                |
//! | [`config`]         | `RoutingConfig` (TOML `[routing]` section)              |
//! | [`error`]          | `RoutingError`, `FclError`, `RoutingResult<T>`          |
//!
//! # Who owns what
//!
//! The simulation engine owns buffers, transfers and the message table.
//! A policy sees a read-only [`DecisionContext`] per decision and keeps
//! only its own learnt state, updated through the contact hooks.

pub mod bubble_rap;
pub mod config;
pub mod context;
pub mod decision;
pub mod epidemic;
pub mod error;
pub mod fuzzy;
pub mod policy;
pub mod predictability;
pub mod prophet;
pub mod spray_and_focus;
pub mod spray_and_wait;

#[cfg(test)]
mod tests;

pub use bubble_rap::{BubbleRap, BubbleRapParams};
pub use config::{load_rule_base, RoutingConfig};
pub use context::DecisionContext;
pub use decision::{CopySplit, RoutingDecision};
pub use epidemic::{DirectDelivery, Epidemic};
pub use error::{FclError, RoutingError, RoutingResult};
pub use fuzzy::{Feature, FeatureBinding, FuzzyConfig, FuzzyEngine, FuzzyPolicy, RuleBase, Thresholds};
pub use policy::RoutingPolicy;
pub use predictability::{DeliveryPredictability, ProphetParams};
pub use prophet::Prophet;
pub use spray_and_focus::{SprayAndFocus, SprayAndFocusParams};
pub use spray_and_wait::{SprayAndWait, SprayAndWaitParams};
