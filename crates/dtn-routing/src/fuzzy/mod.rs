//! Fuzzy-logic routing: FCL parsing, Mamdani inference, and the policy
//! adapter that feeds network features into a rule base.

pub mod engine;
pub mod fcl;
pub mod policy;

pub use engine::FuzzyEngine;
pub use fcl::{parse_fcl, Defuzzifier, FuzzyVariable, Membership, RuleBase};
pub use policy::{Feature, FeatureBinding, FuzzyConfig, FuzzyPolicy, Thresholds};
